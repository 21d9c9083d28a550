//! Monthly partitions and the partitioned range reader.
//!
//! A series is stored in one partition per calendar month, keyed by `year * 12 + month - 1`.
//! A query window spanning several months is served by reading each partition in turn, newest
//! first, and merging the rows into a single ascending sequence.

use crate::cli::CommandLineArgs;
use crate::error::TimeSeriesError;
use crate::metrics::PARTITION_READS;
use crate::models::{QuerySpec, Sample, SensorRef};
use crate::resource_manager::ResourceManager;
use crate::series_store::{RangeRead, StoreError};

use chrono::{DateTime, Datelike, Utc};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{event, Level};

/// Key of a monthly partition: `year * 12 + month - 1`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PartitionKey(i64);

impl PartitionKey {
    /// Returns the key of the partition for `month` (1-12) of `year`.
    pub fn new(year: i32, month: u32) -> Self {
        Self(i64::from(year) * 12 + i64::from(month) - 1)
    }

    /// Returns the key of the partition holding `timestamp`.
    pub fn of(timestamp: &DateTime<Utc>) -> Self {
        Self::new(timestamp.year(), timestamp.month())
    }

    /// Returns the partitions covering `from..=to` in ascending order.
    ///
    /// Empty if `from` is later than `to`.
    pub fn span(
        from: &DateTime<Utc>,
        to: &DateTime<Utc>,
    ) -> impl DoubleEndedIterator<Item = PartitionKey> {
        (Self::of(from).0..=Self::of(to).0).map(PartitionKey)
    }

    pub fn value(self) -> i64 {
        self.0
    }

    pub fn year(self) -> i64 {
        self.0.div_euclid(12)
    }

    pub fn month(self) -> u32 {
        // rem_euclid(12) is in 0..12.
        self.0.rem_euclid(12) as u32 + 1
    }
}

impl fmt::Display for PartitionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year(), self.month())
    }
}

/// Deadline and retry policy applied to each partition read.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReadPolicy {
    /// Deadline of a single read attempt. No deadline if `None`.
    pub timeout: Option<Duration>,
    /// Number of retries after a transient failure.
    pub retries: u32,
    /// Delay before the first retry. Doubled for each further retry.
    pub backoff: Duration,
}

impl Default for ReadPolicy {
    fn default() -> Self {
        Self {
            timeout: Some(Duration::from_millis(5000)),
            retries: 2,
            backoff: Duration::from_millis(50),
        }
    }
}

impl From<&CommandLineArgs> for ReadPolicy {
    fn from(args: &CommandLineArgs) -> Self {
        Self {
            timeout: (args.read_timeout_ms > 0).then(|| Duration::from_millis(args.read_timeout_ms)),
            retries: args.read_retries,
            backoff: Duration::from_millis(args.retry_backoff_ms),
        }
    }
}

/// Result of a partitioned read.
///
/// A failed partition read stops the read. The samples of the partitions read before the
/// failure are kept alongside the error and must be treated as incomplete.
#[derive(Debug)]
pub struct RangeReadOutcome {
    /// Samples in ascending timestamp order
    pub samples: Vec<Sample>,
    /// Error of the failed partition read, if any
    pub error: Option<TimeSeriesError>,
}

/// Reads a query window from a partitioned series store.
pub struct PartitionedRangeReader {
    store: Arc<dyn RangeRead>,
    policy: ReadPolicy,
}

impl PartitionedRangeReader {
    /// Create and return a [PartitionedRangeReader].
    ///
    /// # Arguments
    ///
    /// * `store`: Series store to read partitions from
    /// * `policy`: Deadline and retry policy for each partition read
    pub fn new(store: Arc<dyn RangeRead>, policy: ReadPolicy) -> Self {
        Self { store, policy }
    }

    /// Read the samples of the query's sensor with `from <= timestamp <= to`.
    ///
    /// Partitions are read one at a time from the newest to the oldest, so that a failure
    /// loses the oldest data first.
    #[tracing::instrument(
        level = "DEBUG",
        skip(self, spec, resource_manager),
        fields(
            organization = spec.organization,
            project = %spec.project,
            subsystem = %spec.subsystem,
            datapoint = %spec.datapoint,
        )
    )]
    pub async fn read(
        &self,
        spec: &QuerySpec,
        resource_manager: &ResourceManager,
    ) -> RangeReadOutcome {
        let sensor = spec.sensor();
        let mut chunks = vec![];
        let mut error = None;
        for partition in PartitionKey::span(&spec.from, &spec.to).rev() {
            match self
                .read_partition(
                    spec.organization,
                    &sensor,
                    partition,
                    spec.from,
                    spec.to,
                    resource_manager,
                )
                .await
            {
                Ok(rows) => chunks.push(rows),
                Err(err) => {
                    event!(Level::ERROR, %partition, "{}", err);
                    if let TimeSeriesError::StorageRead { source, .. } = &err {
                        event!(Level::ERROR, "Caused by: {}", source);
                    }
                    error = Some(err);
                    break;
                }
            }
        }
        let samples = merge(chunks);
        event!(
            Level::DEBUG,
            samples = samples.len(),
            degraded = error.is_some(),
            "read series"
        );
        RangeReadOutcome { samples, error }
    }

    /// Read one partition, retrying transient failures.
    async fn read_partition(
        &self,
        organization: i64,
        sensor: &SensorRef<'_>,
        partition: PartitionKey,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        resource_manager: &ResourceManager,
    ) -> Result<Vec<Sample>, TimeSeriesError> {
        let mut backoff = self.policy.backoff;
        let mut attempt = 0;
        loop {
            // The connection permit is released before any backoff sleep.
            let result = {
                let _conn_permit = resource_manager.storage_connection().await?;
                self.read_once(organization, sensor, partition, from, to)
                    .await
            };
            match result {
                Ok(rows) => {
                    PARTITION_READS.with_label_values(&["ok"]).inc();
                    return Ok(rows);
                }
                Err(source) if source.is_transient() && attempt < self.policy.retries => {
                    PARTITION_READS.with_label_values(&["retry"]).inc();
                    event!(
                        Level::WARN,
                        %partition,
                        attempt,
                        "partition read failed, retrying in {:?}: {}",
                        backoff,
                        source
                    );
                    tokio::time::sleep(backoff).await;
                    backoff = backoff.saturating_mul(2);
                    attempt += 1;
                }
                Err(source) => {
                    let outcome = match source {
                        StoreError::Timeout(_) => "timeout",
                        _ => "error",
                    };
                    PARTITION_READS.with_label_values(&[outcome]).inc();
                    return Err(TimeSeriesError::StorageRead { partition, source });
                }
            }
        }
    }

    /// A single read attempt, bounded by the read deadline.
    async fn read_once(
        &self,
        organization: i64,
        sensor: &SensorRef<'_>,
        partition: PartitionKey,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Sample>, StoreError> {
        let read = self
            .store
            .range_read(organization, sensor, partition, from, to);
        match self.policy.timeout {
            Some(timeout) => tokio::time::timeout(timeout, read)
                .await
                .map_err(|_| StoreError::Timeout(timeout))?,
            None => read.await,
        }
    }
}

/// Merge per-partition rows, read newest partition first, into one ascending sequence.
///
/// Rows within a partition may arrive in any order. The sort is stable, so samples sharing a
/// timestamp keep their storage order.
fn merge(chunks: Vec<Vec<Sample>>) -> Vec<Sample> {
    let mut samples: Vec<Sample> = chunks.into_iter().rev().flatten().collect();
    samples.sort_by_key(|sample| sample.timestamp);
    samples
}
