//! Interfaces to the external series store and project configuration.
//!
//! The time-series core only depends on two operations: a bounded range read of one monthly
//! partition of a series, and the lookup of a project's timezone. Backends implement
//! [RangeRead] and [TimezoneLookup], and [SeriesWrite] to be loaded over the API.

use crate::models::{ProjectSettings, Sample, SensorRef};
use crate::partition::PartitionKey;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::time::Duration;
use thiserror::Error;

/// Series store error type
#[derive(Debug, Error)]
pub enum StoreError {
    /// Error from the sled database
    #[error("series database error")]
    Backend(#[from] sled::Error),

    /// Store temporarily unable to serve the request
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    /// Read did not complete within its deadline
    #[error("storage read timed out after {0:?}")]
    Timeout(Duration),

    /// Stored row could not be decoded
    #[error("corrupt series row: {0}")]
    Corrupt(String),

    /// Error (de)serialising project settings
    #[error("failed to (de)serialise project settings")]
    Serialization(#[from] serde_json::Error),

    /// Blocking storage task failed
    #[error("storage task failed")]
    TaskJoin(#[from] tokio::task::JoinError),
}

impl StoreError {
    /// Whether the read may succeed if attempted again.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable(_) | Self::Timeout(_))
    }
}

/// Bounded range read over one monthly partition of a series.
#[async_trait]
pub trait RangeRead: Send + Sync {
    /// Read the samples of `sensor` in `partition` with `from <= timestamp <= to`.
    ///
    /// Rows may be returned in any order.
    ///
    /// # Arguments
    ///
    /// * `organization`: Organization owning the series
    /// * `sensor`: Project, subsystem and datapoint of the series
    /// * `partition`: Monthly partition to read
    /// * `from`: Start of the window (inclusive)
    /// * `to`: End of the window (inclusive)
    async fn range_read(
        &self,
        organization: i64,
        sensor: &SensorRef<'_>,
        partition: PartitionKey,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Sample>, StoreError>;
}

/// Lookup of the timezone configured for a project.
#[async_trait]
pub trait TimezoneLookup: Send + Sync {
    /// Returns the IANA timezone identifier of the project. An unknown project or a project
    /// without a timezone yields an empty identifier.
    async fn project_timezone(&self, organization: i64, project: &str)
        -> Result<String, StoreError>;
}

/// Ingestion of samples and project settings.
#[async_trait]
pub trait SeriesWrite: Send + Sync {
    /// Store `samples` of `sensor`, each in the monthly partition of its timestamp.
    async fn write_samples(
        &self,
        organization: i64,
        sensor: &SensorRef<'_>,
        samples: &[Sample],
    ) -> Result<(), StoreError>;

    /// Insert or replace the settings of a project.
    async fn upsert_project(
        &self,
        organization: i64,
        settings: &ProjectSettings,
    ) -> Result<(), StoreError>;
}
