//! HTTP API: router, handlers and response rendering.

use crate::app_state::SharedAppState;
use crate::error::TimeSeriesError;
use crate::metrics::{metrics_handler, record_response_metrics, request_counter};
use crate::models;
use crate::validated_json::ValidatedJson;

use axum::{
    extract::rejection::{JsonRejection, PathRejection},
    extract::{Path, State},
    http::header,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use tower::Layer;
use tower_http::normalize_path::{NormalizePath, NormalizePathLayer};
use tower_http::trace::TraceLayer;
use tracing::{event, Level};
use validator::Validate;

static HEADER_COUNT: header::HeaderName = header::HeaderName::from_static("x-timeseries-count");
static HEADER_DEGRADED: header::HeaderName =
    header::HeaderName::from_static("x-timeseries-degraded");

impl IntoResponse for models::QueryResponse {
    /// Render the samples as a JSON array of `{"ts", "value"}` objects.
    fn into_response(self) -> Response {
        match serde_json::to_vec(&self.samples) {
            Ok(body) => (
                [
                    (&header::CONTENT_TYPE, mime::APPLICATION_JSON.to_string()),
                    (&HEADER_COUNT, self.samples.len().to_string()),
                    (&HEADER_DEGRADED, self.degraded.to_string()),
                ],
                body,
            )
                .into_response(),
            Err(err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to serialise response: {}", err),
            )
                .into_response(),
        }
    }
}

/// [tower_http::normalize_path::NormalizePath] wrapping the [axum::Router], so that paths with
/// a trailing slash are routed.
pub type Service = NormalizePath<Router>;

/// Returns the router of the API.
///
/// # Arguments
///
/// * `state`: Shared application state
pub fn router(state: SharedAppState) -> Router {
    fn v1() -> Router<SharedAppState> {
        Router::new()
            .route("/query", post(query))
            .route(
                "/series/:organization/:project/:subsystem/:datapoint",
                post(write_series),
            )
            .route("/projects/:organization", put(upsert_project))
    }

    Router::new()
        .route("/health", get(health))
        .route("/metrics", get(metrics_handler))
        .nest("/v1", v1())
        .layer(
            TraceLayer::new_for_http()
                .on_request(request_counter)
                .on_response(record_response_metrics),
        )
        .with_state(state)
}

/// Returns the service to serve.
///
/// # Arguments
///
/// * `state`: Shared application state
pub fn service(state: SharedAppState) -> Service {
    NormalizePathLayer::trim_trailing_slash().layer(router(state))
}

async fn health() -> &'static str {
    "OK"
}

/// Handler for time-series queries.
///
/// A query whose storage read failed part way returns the reduced partial data, marked with
/// the degraded header, even if the reduction leaves no points. If no sample was read the
/// storage error is returned instead.
async fn query(
    State(state): State<SharedAppState>,
    ValidatedJson(spec): ValidatedJson<models::QuerySpec>,
) -> Result<models::QueryResponse, TimeSeriesError> {
    let outcome = state
        .service
        .query(&spec, &state.resource_manager)
        .await?;
    match outcome.error {
        Some(error) if outcome.read == 0 => Err(error),
        error => Ok(models::QueryResponse::new(
            outcome.samples,
            error.is_some(),
        )),
    }
}

fn invalid_write<E>(error: E) -> TimeSeriesError
where
    E: std::error::Error + Send + Sync + 'static,
{
    TimeSeriesError::InvalidWrite(Box::new(error))
}

/// Handler for sample ingestion.
///
/// The body is a JSON array of `{"ts", "value"}` objects. Accepted samples are stored in the
/// monthly partitions of their timestamps.
async fn write_series(
    State(state): State<SharedAppState>,
    path: Result<Path<models::SeriesPath>, PathRejection>,
    samples: Result<Json<Vec<models::Sample>>, JsonRejection>,
) -> Result<StatusCode, TimeSeriesError> {
    let Path(path) = path.map_err(invalid_write)?;
    path.validate().map_err(invalid_write)?;
    let Json(samples) = samples.map_err(invalid_write)?;
    state
        .writer
        .write_samples(path.organization, &path.sensor(), &samples)
        .await
        .map_err(TimeSeriesError::StorageWrite)?;
    event!(
        Level::INFO,
        organization = path.organization,
        project = %path.project,
        samples = samples.len(),
        "samples stored"
    );
    Ok(StatusCode::ACCEPTED)
}

/// Handler for project settings, which hold the timezone of calendar queries.
async fn upsert_project(
    State(state): State<SharedAppState>,
    organization: Result<Path<i64>, PathRejection>,
    settings: Result<Json<models::ProjectSettings>, JsonRejection>,
) -> Result<StatusCode, TimeSeriesError> {
    let Path(organization) = organization.map_err(invalid_write)?;
    let Json(settings) = settings.map_err(invalid_write)?;
    settings.validate().map_err(invalid_write)?;
    state
        .writer
        .upsert_project(organization, &settings)
        .await
        .map_err(TimeSeriesError::StorageWrite)?;
    event!(
        Level::INFO,
        organization,
        project = %settings.name,
        timezone = %settings.timezone,
        "project settings stored"
    );
    Ok(StatusCode::NO_CONTENT)
}
