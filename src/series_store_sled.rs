//! On-disk series store backed by sled.
//!
//! Series rows live in the `timeseries` tree. Each key is the partition prefix
//! `<org>/<project>/<subsystem>/<datapoint>/<partition>/` followed by the sample timestamp in
//! milliseconds, encoded so that byte order matches time order. Values are big-endian `f64`.
//! Project settings live in the `projects` tree as JSON keyed by `<org>/<project>`.

use crate::models::{ProjectSettings, Sample, SensorRef};
use crate::partition::PartitionKey;
use crate::series_store::{RangeRead, SeriesWrite, StoreError, TimezoneLookup};

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use std::path::Path;

const SERIES_TREE: &str = "timeseries";
const PROJECTS_TREE: &str = "projects";

/// Series store backed by a sled database.
#[derive(Clone, Debug)]
pub struct SledStore {
    series: sled::Tree,
    projects: sled::Tree,
}

impl SledStore {
    /// Open (or create) the database at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let db = sled::open(path)?;
        Self::from_db(&db)
    }

    /// Create a database that is removed when dropped.
    pub fn temporary() -> Result<Self, StoreError> {
        let db = sled::Config::new().temporary(true).open()?;
        Self::from_db(&db)
    }

    fn from_db(db: &sled::Db) -> Result<Self, StoreError> {
        Ok(Self {
            series: db.open_tree(SERIES_TREE)?,
            projects: db.open_tree(PROJECTS_TREE)?,
        })
    }

    /// Store a sample in the partition of its timestamp, replacing any sample at the same
    /// millisecond.
    pub fn insert_sample(
        &self,
        organization: i64,
        sensor: &SensorRef<'_>,
        sample: &Sample,
    ) -> Result<(), StoreError> {
        let partition = PartitionKey::of(&sample.timestamp);
        let key = series_key(
            &partition_prefix(organization, sensor, partition),
            &sample.timestamp,
        );
        self.series.insert(key, &sample.value.to_be_bytes())?;
        Ok(())
    }

    /// Insert or replace the settings of a project.
    pub fn put_project(
        &self,
        organization: i64,
        settings: &ProjectSettings,
    ) -> Result<(), StoreError> {
        let value = serde_json::to_vec(settings)?;
        self.projects
            .insert(project_key(organization, &settings.name), value)?;
        Ok(())
    }

    /// Returns the settings of a project, if present.
    pub fn get_project(
        &self,
        organization: i64,
        project: &str,
    ) -> Result<Option<ProjectSettings>, StoreError> {
        match self.projects.get(project_key(organization, project))? {
            Some(value) => Ok(Some(serde_json::from_slice(&value)?)),
            None => Ok(None),
        }
    }
}

fn partition_prefix(organization: i64, sensor: &SensorRef<'_>, partition: PartitionKey) -> Vec<u8> {
    format!(
        "{}/{}/{}/{}/{}/",
        organization,
        sensor.project,
        sensor.subsystem,
        sensor.datapoint,
        partition.value()
    )
    .into_bytes()
}

fn project_key(organization: i64, project: &str) -> Vec<u8> {
    format!("{}/{}", organization, project).into_bytes()
}

/// Millisecond timestamp with the sign bit flipped, so that big-endian byte order sorts
/// negative timestamps before positive ones.
fn encode_timestamp(timestamp: &DateTime<Utc>) -> [u8; 8] {
    ((timestamp.timestamp_millis() as u64) ^ (1 << 63)).to_be_bytes()
}

fn decode_timestamp(bytes: [u8; 8]) -> Option<DateTime<Utc>> {
    let millis = (u64::from_be_bytes(bytes) ^ (1 << 63)) as i64;
    Utc.timestamp_millis_opt(millis).single()
}

fn series_key(prefix: &[u8], timestamp: &DateTime<Utc>) -> Vec<u8> {
    let mut key = Vec::with_capacity(prefix.len() + 8);
    key.extend_from_slice(prefix);
    key.extend_from_slice(&encode_timestamp(timestamp));
    key
}

fn decode_row(prefix_len: usize, key: &[u8], value: &[u8]) -> Result<Sample, StoreError> {
    let timestamp = key
        .get(prefix_len..)
        .and_then(|suffix| <[u8; 8]>::try_from(suffix).ok())
        .and_then(decode_timestamp)
        .ok_or_else(|| StoreError::Corrupt(format!("invalid key suffix of {} bytes", key.len())))?;
    let value = <[u8; 8]>::try_from(value)
        .map_err(|_| StoreError::Corrupt(format!("value has {} bytes", value.len())))?;
    Ok(Sample::new(timestamp, f64::from_be_bytes(value)))
}

#[async_trait]
impl RangeRead for SledStore {
    #[tracing::instrument(level = "DEBUG", skip(self))]
    async fn range_read(
        &self,
        organization: i64,
        sensor: &SensorRef<'_>,
        partition: PartitionKey,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Sample>, StoreError> {
        let prefix = partition_prefix(organization, sensor, partition);
        let start = series_key(&prefix, &from);
        let end = series_key(&prefix, &to);
        let tree = self.series.clone();
        tokio::task::spawn_blocking(move || {
            let mut rows = vec![];
            for row in tree.range(start..=end) {
                let (key, value) = row?;
                let sample = decode_row(prefix.len(), &key, &value)?;
                // Keys hold milliseconds; drop rows outside a sub-millisecond window bound.
                if sample.timestamp >= from && sample.timestamp <= to {
                    rows.push(sample);
                }
            }
            Ok(rows)
        })
        .await?
    }
}

#[async_trait]
impl TimezoneLookup for SledStore {
    async fn project_timezone(
        &self,
        organization: i64,
        project: &str,
    ) -> Result<String, StoreError> {
        Ok(self
            .get_project(organization, project)?
            .map(|settings| settings.timezone)
            .unwrap_or_default())
    }
}

#[async_trait]
impl SeriesWrite for SledStore {
    /// Writes all samples in one atomic batch.
    #[tracing::instrument(level = "DEBUG", skip(self, samples), fields(samples = samples.len()))]
    async fn write_samples(
        &self,
        organization: i64,
        sensor: &SensorRef<'_>,
        samples: &[Sample],
    ) -> Result<(), StoreError> {
        let mut batch = sled::Batch::default();
        for sample in samples {
            let prefix = partition_prefix(organization, sensor, PartitionKey::of(&sample.timestamp));
            batch.insert(
                series_key(&prefix, &sample.timestamp),
                &sample.value.to_be_bytes()[..],
            );
        }
        let tree = self.series.clone();
        tokio::task::spawn_blocking(move || tree.apply_batch(batch)).await??;
        Ok(())
    }

    async fn upsert_project(
        &self,
        organization: i64,
        settings: &ProjectSettings,
    ) -> Result<(), StoreError> {
        self.put_project(organization, settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::ts;

    const SENSOR: SensorRef<'static> = SensorRef {
        project: "house",
        subsystem: "boiler",
        datapoint: "temperature",
    };

    fn store_with(samples: &[Sample]) -> SledStore {
        let store = SledStore::temporary().unwrap();
        for sample in samples {
            store.insert_sample(1, &SENSOR, sample).unwrap();
        }
        store
    }

    #[test]
    fn timestamp_encoding_preserves_order() {
        let instants = [
            ts(1960, 1, 1, 0, 0),
            ts(1969, 12, 31, 23, 59),
            ts(1970, 1, 1, 0, 0),
            ts(2023, 1, 1, 0, 0),
        ];
        let encoded: Vec<[u8; 8]> = instants.iter().map(encode_timestamp).collect();
        assert!(encoded.windows(2).all(|pair| pair[0] < pair[1]));
        for (instant, bytes) in instants.iter().zip(encoded) {
            assert_eq!(Some(*instant), decode_timestamp(bytes));
        }
    }

    #[tokio::test]
    async fn range_read_is_ascending_and_inclusive() {
        let store = store_with(&[
            Sample::new(ts(2023, 1, 20, 0, 0), 3.0),
            Sample::new(ts(2023, 1, 10, 0, 0), 1.0),
            Sample::new(ts(2023, 1, 15, 0, 0), 2.0),
            Sample::new(ts(2023, 1, 25, 0, 0), 4.0),
            Sample::new(ts(2023, 2, 1, 0, 0), 5.0),
        ]);
        let rows = store
            .range_read(
                1,
                &SENSOR,
                PartitionKey::new(2023, 1),
                ts(2023, 1, 10, 0, 0),
                ts(2023, 1, 20, 0, 0),
            )
            .await
            .unwrap();
        let values: Vec<f64> = rows.iter().map(|s| s.value).collect();
        assert_eq!(vec![1.0, 2.0, 3.0], values);
    }

    #[tokio::test]
    async fn range_read_is_scoped_to_partition() {
        let store = store_with(&[
            Sample::new(ts(2023, 1, 31, 23, 0), 1.0),
            Sample::new(ts(2023, 2, 1, 0, 0), 2.0),
        ]);
        let rows = store
            .range_read(
                1,
                &SENSOR,
                PartitionKey::new(2023, 2),
                ts(2023, 1, 1, 0, 0),
                ts(2023, 3, 1, 0, 0),
            )
            .await
            .unwrap();
        assert_eq!(vec![Sample::new(ts(2023, 2, 1, 0, 0), 2.0)], rows);
    }

    #[tokio::test]
    async fn range_read_does_not_match_longer_datapoint_names() {
        let store = store_with(&[Sample::new(ts(2023, 1, 10, 0, 0), 1.0)]);
        let other = SensorRef {
            datapoint: "temperature2",
            ..SENSOR
        };
        store
            .insert_sample(1, &other, &Sample::new(ts(2023, 1, 11, 0, 0), 9.0))
            .unwrap();
        let rows = store
            .range_read(
                1,
                &SENSOR,
                PartitionKey::new(2023, 1),
                ts(2023, 1, 1, 0, 0),
                ts(2023, 2, 1, 0, 0),
            )
            .await
            .unwrap();
        assert_eq!(vec![Sample::new(ts(2023, 1, 10, 0, 0), 1.0)], rows);
    }

    #[tokio::test]
    async fn range_read_corrupt_value() {
        let store = store_with(&[]);
        let prefix = partition_prefix(1, &SENSOR, PartitionKey::new(2023, 1));
        store
            .series
            .insert(series_key(&prefix, &ts(2023, 1, 10, 0, 0)), &[1u8, 2, 3])
            .unwrap();
        let error = store
            .range_read(
                1,
                &SENSOR,
                PartitionKey::new(2023, 1),
                ts(2023, 1, 1, 0, 0),
                ts(2023, 2, 1, 0, 0),
            )
            .await
            .unwrap_err();
        assert_eq!("corrupt series row: value has 3 bytes", error.to_string());
    }

    #[tokio::test]
    async fn write_samples_across_partitions() {
        let store = store_with(&[]);
        let samples = [
            Sample::new(ts(2023, 2, 1, 0, 0), 2.0),
            Sample::new(ts(2023, 1, 31, 23, 0), 1.0),
            Sample::new(ts(2023, 2, 1, 0, 0), 3.0),
        ];
        store.write_samples(1, &SENSOR, &samples).await.unwrap();
        let january = store
            .range_read(
                1,
                &SENSOR,
                PartitionKey::new(2023, 1),
                ts(2023, 1, 1, 0, 0),
                ts(2023, 3, 1, 0, 0),
            )
            .await
            .unwrap();
        assert_eq!(vec![samples[1]], january);
        // The later write at the same millisecond wins.
        let february = store
            .range_read(
                1,
                &SENSOR,
                PartitionKey::new(2023, 2),
                ts(2023, 1, 1, 0, 0),
                ts(2023, 3, 1, 0, 0),
            )
            .await
            .unwrap();
        assert_eq!(vec![samples[2]], february);
    }

    #[tokio::test]
    async fn upsert_project_replaces_settings() {
        let store = store_with(&[]);
        let mut settings = ProjectSettings {
            name: "house".to_string(),
            timezone: "Europe/Oslo".to_string(),
            ..Default::default()
        };
        store.upsert_project(1, &settings).await.unwrap();
        settings.timezone = "America/New_York".to_string();
        store.upsert_project(1, &settings).await.unwrap();
        assert_eq!(
            "America/New_York",
            store.project_timezone(1, "house").await.unwrap()
        );
    }

    #[tokio::test]
    async fn project_settings() {
        let store = store_with(&[]);
        let settings = ProjectSettings {
            name: "house".to_string(),
            title: "Summer house".to_string(),
            timezone: "Europe/Helsinki".to_string(),
            ..Default::default()
        };
        store.put_project(1, &settings).unwrap();
        assert_eq!(Some(settings), store.get_project(1, "house").unwrap());
        assert_eq!(None, store.get_project(1, "cabin").unwrap());
        assert_eq!(
            "Europe/Helsinki",
            store.project_timezone(1, "house").await.unwrap()
        );
        assert_eq!("", store.project_timezone(1, "cabin").await.unwrap());
    }
}
