//! Time-series query service.
//!
//! Orchestrates a query: validation, timezone resolution, the partitioned read and the
//! reduction of the samples read.

use crate::downsample::downsample;
use crate::error::TimeSeriesError;
use crate::metrics::EMITTED_POINTS;
use crate::models::{QuerySpec, Sample};
use crate::partition::{PartitionedRangeReader, RangeReadOutcome};
use crate::resource_manager::ResourceManager;
use crate::series_store::TimezoneLookup;
use crate::timezone::resolve_timezone;

use std::sync::Arc;
use tracing::{event, Level};
use validator::Validate;

/// Reduced samples of a query, with the storage error that cut the read short, if any.
#[derive(Debug)]
pub struct QueryOutcome {
    /// Reduced samples in ascending timestamp order
    pub samples: Vec<Sample>,
    /// Number of samples read from storage, before the reduction
    pub read: usize,
    /// Partition read error. If set, `samples` only cover the partitions read before it.
    pub error: Option<TimeSeriesError>,
}

impl QueryOutcome {
    /// Whether the samples are incomplete.
    pub fn is_degraded(&self) -> bool {
        self.error.is_some()
    }

    /// Returns the samples, or the storage error if the read was incomplete.
    pub fn into_result(self) -> Result<Vec<Sample>, TimeSeriesError> {
        match self.error {
            Some(error) => Err(error),
            None => Ok(self.samples),
        }
    }
}

/// Serves time-series queries.
pub struct TimeSeriesService {
    reader: PartitionedRangeReader,
    timezones: Arc<dyn TimezoneLookup>,
}

impl TimeSeriesService {
    /// Create and return a [TimeSeriesService].
    ///
    /// # Arguments
    ///
    /// * `reader`: Reader of the partitioned series store
    /// * `timezones`: Lookup of project timezones
    pub fn new(reader: PartitionedRangeReader, timezones: Arc<dyn TimezoneLookup>) -> Self {
        Self { reader, timezones }
    }

    /// Run a query.
    ///
    /// An invalid query is rejected before any storage access. A failed partition read does not
    /// fail the query: whatever was read is still reduced and returned together with the error.
    ///
    /// # Arguments
    ///
    /// * `spec`: Query to run
    /// * `resource_manager`: Limits concurrent storage reads and downsampling tasks
    #[tracing::instrument(level = "DEBUG", skip(self, resource_manager))]
    pub async fn query(
        &self,
        spec: &QuerySpec,
        resource_manager: &ResourceManager,
    ) -> Result<QueryOutcome, TimeSeriesError> {
        spec.validate()?;
        let tz = resolve_timezone(self.timezones.as_ref(), spec.organization, &spec.project).await;
        let RangeReadOutcome { samples, error } = self.reader.read(spec, resource_manager).await;
        let read = samples.len();

        let _task_permit = resource_manager.task().await?;
        let reduced = {
            let spec = spec.clone();
            tokio::task::spawn_blocking(move || downsample(&samples, &spec, &tz)).await?
        };

        EMITTED_POINTS
            .with_label_values(&[&spec.time_model.to_string()])
            .observe(reduced.len() as f64);
        event!(
            Level::INFO,
            read,
            points = reduced.len(),
            timezone = %tz,
            degraded = error.is_some(),
            "query served"
        );
        Ok(QueryOutcome {
            samples: reduced,
            read,
            error,
        })
    }
}
