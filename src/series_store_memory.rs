//! In-memory series store.
//!
//! Rows are returned in insertion order, like a store that does not sort within a partition.

use crate::models::{ProjectSettings, Sample, SensorRef};
use crate::partition::PartitionKey;
use crate::series_store::{RangeRead, SeriesWrite, StoreError, TimezoneLookup};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use hashbrown::HashMap;
use tokio::sync::RwLock;

/// Key of one monthly partition of a series.
type SeriesKey = (i64, String, String, String, PartitionKey);

/// Series store held in process memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    /// Rows per series partition. A read-write lock synchronises access, optimised for reads.
    series: RwLock<HashMap<SeriesKey, Vec<Sample>>>,
    /// Project settings keyed by organization and project name.
    projects: RwLock<HashMap<(i64, String), ProjectSettings>>,
}

impl MemoryStore {
    /// Create and return an empty [MemoryStore].
    pub fn new() -> Self {
        Self::default()
    }

    /// Append samples to a series. Each sample lands in the partition of its timestamp.
    pub async fn insert(&self, organization: i64, sensor: &SensorRef<'_>, samples: &[Sample]) {
        let mut series = self.series.write().await;
        for sample in samples {
            series
                .entry(series_key(organization, sensor, PartitionKey::of(&sample.timestamp)))
                .or_default()
                .push(*sample);
        }
    }

    /// Insert or replace the settings of a project.
    pub async fn put_project(&self, organization: i64, settings: ProjectSettings) {
        self.projects
            .write()
            .await
            .insert((organization, settings.name.clone()), settings);
    }
}

fn series_key(organization: i64, sensor: &SensorRef<'_>, partition: PartitionKey) -> SeriesKey {
    (
        organization,
        sensor.project.to_string(),
        sensor.subsystem.to_string(),
        sensor.datapoint.to_string(),
        partition,
    )
}

#[async_trait]
impl RangeRead for MemoryStore {
    async fn range_read(
        &self,
        organization: i64,
        sensor: &SensorRef<'_>,
        partition: PartitionKey,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Sample>, StoreError> {
        let series = self.series.read().await;
        let rows = series
            .get(&series_key(organization, sensor, partition))
            .map(|rows| {
                rows.iter()
                    .filter(|sample| sample.timestamp >= from && sample.timestamp <= to)
                    .copied()
                    .collect()
            })
            .unwrap_or_default();
        Ok(rows)
    }
}

#[async_trait]
impl TimezoneLookup for MemoryStore {
    async fn project_timezone(
        &self,
        organization: i64,
        project: &str,
    ) -> Result<String, StoreError> {
        let projects = self.projects.read().await;
        Ok(projects
            .get(&(organization, project.to_string()))
            .map(|settings| settings.timezone.clone())
            .unwrap_or_default())
    }
}

#[async_trait]
impl SeriesWrite for MemoryStore {
    async fn write_samples(
        &self,
        organization: i64,
        sensor: &SensorRef<'_>,
        samples: &[Sample],
    ) -> Result<(), StoreError> {
        self.insert(organization, sensor, samples).await;
        Ok(())
    }

    async fn upsert_project(
        &self,
        organization: i64,
        settings: &ProjectSettings,
    ) -> Result<(), StoreError> {
        self.put_project(organization, settings.clone()).await;
        Ok(())
    }
}
