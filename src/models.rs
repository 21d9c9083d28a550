//! Data types and associated functions and methods

use crate::partition::PartitionKey;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::Display;
use validator::{Validate, ValidationError};

/// A single time-series reading.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Serialize)]
pub struct Sample {
    /// Instant of the reading
    #[serde(rename = "ts")]
    pub timestamp: DateTime<Utc>,
    /// Value of the reading
    pub value: f64,
}

impl Sample {
    /// Return a new Sample object.
    pub fn new(timestamp: DateTime<Utc>, value: f64) -> Self {
        Sample { timestamp, value }
    }
}

/// Reducer applied to the samples of a window or calendar bucket.
#[derive(Clone, Copy, Debug, Default, Deserialize, Display, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Aggregation {
    /// Last sample of the range
    #[default]
    #[serde(alias = "")]
    Sample,
    /// Difference between the last sample and the sample preceding the range
    Delta,
    /// Minimum of the range
    Min,
    /// Maximum of the range
    Max,
    /// Sum of the range
    Sum,
    /// Arithmetic mean of the range
    Average,
}

/// Calendar period used to bucket samples.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CalendarPeriod {
    Day,
    Week,
    Month,
}

/// Reduction policy requested by the caller.
#[derive(Clone, Copy, Debug, Default, Deserialize, Display, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum TimeModel {
    /// Fixed-count decimation to at most `max_points` samples
    #[default]
    #[serde(alias = "")]
    None,
    /// One point per local calendar day
    Daily,
    /// One point per local ISO week
    Weekly,
    /// One point per local calendar month
    Monthly,
}

impl TimeModel {
    /// Returns the calendar period for calendar-aligned models, or `None` for decimation.
    pub fn period(self) -> Option<CalendarPeriod> {
        match self {
            Self::None => None,
            Self::Daily => Some(CalendarPeriod::Day),
            Self::Weekly => Some(CalendarPeriod::Week),
            Self::Monthly => Some(CalendarPeriod::Month),
        }
    }
}

/// Identifies one sensor series: project, subsystem and datapoint names.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SensorRef<'a> {
    pub project: &'a str,
    pub subsystem: &'a str,
    pub datapoint: &'a str,
}

/// A time-series query
#[derive(Clone, Debug, Deserialize, PartialEq, Validate)]
#[serde(deny_unknown_fields)]
#[validate(schema(function = "validate_query_spec"))]
pub struct QuerySpec {
    /// Organization owning the project
    pub organization: i64,
    /// Project name
    #[validate(
        length(min = 1, message = "project must not be empty"),
        custom = "validate_name"
    )]
    pub project: String,
    /// Subsystem name
    #[validate(
        length(min = 1, message = "subsystem must not be empty"),
        custom = "validate_name"
    )]
    pub subsystem: String,
    /// Datapoint name
    #[validate(
        length(min = 1, message = "datapoint must not be empty"),
        custom = "validate_datapoint_name"
    )]
    pub datapoint: String,
    /// Start of the window (inclusive)
    pub from: DateTime<Utc>,
    /// End of the window (inclusive)
    pub to: DateTime<Utc>,
    /// Upper bound on the number of points returned by decimation
    #[validate(range(min = 1, message = "max_points must be greater than 0"))]
    pub max_points: usize,
    /// Reducer for each window or bucket
    #[serde(default)]
    pub aggregation: Aggregation,
    /// Decimation or calendar bucketing
    #[serde(default)]
    pub time_model: TimeModel,
    /// Label points with aligned boundaries instead of sample timestamps
    #[serde(default)]
    pub align: bool,
}

impl QuerySpec {
    /// Returns the sensor this query addresses.
    pub fn sensor(&self) -> SensorRef<'_> {
        SensorRef {
            project: &self.project,
            subsystem: &self.subsystem,
            datapoint: &self.datapoint,
        }
    }
}

/// Checks a name against `[a-zA-Z][a-zA-Z0-9_.-]*` plus any `extra` characters.
fn check_name(name: &str, extra: &[char]) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() => chars
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-') || extra.contains(&c)),
        _ => false,
    }
}

/// Validate a project or subsystem name
fn validate_name(name: &str) -> Result<(), ValidationError> {
    if !check_name(name, &[]) {
        return Err(ValidationError::new(
            "name must start with a letter and contain only letters, digits, '_', '.' or '-'",
        ));
    }
    Ok(())
}

/// Validate a datapoint name
fn validate_datapoint_name(name: &str) -> Result<(), ValidationError> {
    if !check_name(name, &['$', '[', ']']) {
        return Err(ValidationError::new(
            "datapoint must start with a letter and contain only letters, digits, '_', '.', '-', '$', '[' or ']'",
        ));
    }
    Ok(())
}

/// Maximum number of monthly partitions a query window may span (20 years).
pub const MAX_QUERY_PARTITIONS: i64 = 240;

/// Validate query spec
fn validate_query_spec(spec: &QuerySpec) -> Result<(), ValidationError> {
    if spec.from > spec.to {
        let mut error = ValidationError::new("from must not be later than to");
        error.add_param("from".into(), &spec.from.to_rfc3339());
        error.add_param("to".into(), &spec.to.to_rfc3339());
        return Err(error);
    }
    let partitions =
        PartitionKey::of(&spec.to).value() - PartitionKey::of(&spec.from).value() + 1;
    if partitions > MAX_QUERY_PARTITIONS {
        let mut error =
            ValidationError::new("query window spans too many monthly partitions");
        error.add_param("partitions".into(), &partitions);
        error.add_param("max_partitions".into(), &MAX_QUERY_PARTITIONS);
        return Err(error);
    }
    Ok(())
}

/// Path parameters addressing the series a write goes to.
#[derive(Clone, Debug, Deserialize, PartialEq, Validate)]
pub struct SeriesPath {
    pub organization: i64,
    #[validate(custom = "validate_name")]
    pub project: String,
    #[validate(custom = "validate_name")]
    pub subsystem: String,
    #[validate(custom = "validate_datapoint_name")]
    pub datapoint: String,
}

impl SeriesPath {
    /// Returns the sensor this path addresses.
    pub fn sensor(&self) -> SensorRef<'_> {
        SensorRef {
            project: &self.project,
            subsystem: &self.subsystem,
            datapoint: &self.datapoint,
        }
    }
}

/// Validate an IANA timezone identifier. Empty means UTC.
fn validate_timezone(timezone: &str) -> Result<(), ValidationError> {
    if !timezone.is_empty() && timezone.parse::<chrono_tz::Tz>().is_err() {
        let mut error = ValidationError::new("timezone must be an IANA timezone identifier");
        error.add_param("timezone".into(), &timezone);
        return Err(error);
    }
    Ok(())
}

/// Settings of a project as held by the configuration store.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize, Validate)]
pub struct ProjectSettings {
    #[validate(custom = "validate_name")]
    pub name: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub country: String,
    /// IANA timezone identifier
    #[serde(default)]
    #[validate(custom = "validate_timezone")]
    pub timezone: String,
    #[serde(default)]
    pub geolocation: String,
}

/// Reduced sequence returned to the caller, with its delivery metadata.
#[derive(Debug)]
pub struct QueryResponse {
    /// Reduced samples in ascending timestamp order
    pub samples: Vec<Sample>,
    /// Whether a partition read failed and the samples are incomplete
    pub degraded: bool,
}

impl QueryResponse {
    /// Return a QueryResponse object
    pub fn new(samples: Vec<Sample>, degraded: bool) -> QueryResponse {
        QueryResponse { samples, degraded }
    }
}
