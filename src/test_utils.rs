use crate::models::*;

use chrono::{DateTime, Duration, TimeZone, Utc};

/// Create a UTC timestamp from date and time components.
pub(crate) fn ts(year: i32, month: u32, day: u32, hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, hour, minute, 0)
        .unwrap()
}

/// Create a sample at `t` seconds after the Unix epoch.
pub(crate) fn sample_at(t: i64, value: f64) -> Sample {
    Sample::new(Utc.timestamp_opt(t, 0).unwrap(), value)
}

/// Create `count` samples spaced by `step`, starting at `start`, with values 0, 1, 2, ...
pub(crate) fn series(start: DateTime<Utc>, step: Duration, count: usize) -> Vec<Sample> {
    (0..count)
        .map(|i| Sample::new(start + step * i as i32, i as f64))
        .collect()
}

/// Create a QuerySpec object with only required fields set.
pub(crate) fn get_test_query_spec() -> QuerySpec {
    QuerySpec {
        organization: 1,
        project: "house".to_string(),
        subsystem: "boiler".to_string(),
        datapoint: "temperature".to_string(),
        from: ts(2023, 1, 1, 0, 0),
        to: ts(2023, 1, 31, 0, 0),
        max_points: 100,
        aggregation: Aggregation::Sample,
        time_model: TimeModel::None,
        align: false,
    }
}

/// Create a QuerySpec object with all fields set.
pub(crate) fn get_test_query_spec_optional() -> QuerySpec {
    QuerySpec {
        aggregation: Aggregation::Average,
        time_model: TimeModel::Weekly,
        align: true,
        ..get_test_query_spec()
    }
}
