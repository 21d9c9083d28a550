//! Resolution of a project's timezone.

use crate::error::TimeSeriesError;
use crate::metrics::TIMEZONE_FALLBACKS;
use crate::series_store::TimezoneLookup;

use chrono_tz::Tz;

/// Returns the timezone of `project`.
///
/// A project without a timezone is served in UTC. A failed lookup or an unknown zone identifier
/// is logged as a warning and also falls back to UTC.
pub async fn resolve_timezone(
    lookup: &dyn TimezoneLookup,
    organization: i64,
    project: &str,
) -> Tz {
    match lookup_timezone(lookup, organization, project).await {
        Ok(tz) => tz,
        Err(err) => {
            tracing::warn!("{}, falling back to UTC", err);
            TIMEZONE_FALLBACKS.inc();
            Tz::UTC
        }
    }
}

async fn lookup_timezone(
    lookup: &dyn TimezoneLookup,
    organization: i64,
    project: &str,
) -> Result<Tz, TimeSeriesError> {
    let id = lookup
        .project_timezone(organization, project)
        .await
        .map_err(|err| TimeSeriesError::TimezoneLookup {
            project: project.to_string(),
            reason: err.to_string(),
        })?;
    let id = id.trim();
    if id.is_empty() {
        return Ok(Tz::UTC);
    }
    id.parse::<Tz>()
        .map_err(|_| TimeSeriesError::TimezoneLookup {
            project: project.to_string(),
            reason: format!("unknown zone {}", id),
        })
}
