//! Error handling.

use crate::partition::PartitionKey;
use crate::series_store::StoreError;

use axum::{
    extract::rejection::JsonRejection,
    http::header,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use std::error::Error;
use thiserror::Error;
use tokio::sync::AcquireError;
use tracing::{event, Level};

/// Time-series service error type
///
/// This type encapsulates the various errors that may occur.
/// Each variant may result in a different API error response.
#[derive(Debug, Error)]
pub enum TimeSeriesError {
    /// Error deserialising the query
    #[error("query is not valid")]
    QueryJsonRejection(#[from] JsonRejection),

    /// Error validating the query (single error)
    #[error("query is not valid")]
    InvalidQuerySingle(#[from] validator::ValidationError),

    /// Error validating the query (multiple errors)
    #[error("query is not valid")]
    InvalidQuery(#[from] validator::ValidationErrors),

    /// Error reading one monthly partition of a series
    #[error("failed to read partition {partition} of the series")]
    StorageRead {
        partition: PartitionKey,
        #[source]
        source: StoreError,
    },

    /// Error in the path or body of a write request
    #[error("write request is not valid")]
    InvalidWrite(#[source] Box<dyn Error + Send + Sync>),

    /// Error writing samples or project settings
    #[error("failed to write to the series store")]
    StorageWrite(#[source] StoreError),

    /// Error resolving the timezone of a project
    #[error("cannot resolve timezone of project {project}: {reason}")]
    TimezoneLookup { project: String, reason: String },

    /// Error acquiring a semaphore
    #[error("error acquiring resources")]
    SemaphoreAcquireError(#[from] AcquireError),

    /// Error joining a downsampling task
    #[error("downsampling task failed")]
    TaskJoin(#[from] tokio::task::JoinError),

    /// Error converting between integer types
    #[error(transparent)]
    TryFromInt(#[from] std::num::TryFromIntError),
}

impl IntoResponse for TimeSeriesError {
    /// Convert from a `TimeSeriesError` into an [axum::response::Response].
    fn into_response(self) -> Response {
        ErrorResponse::from(self).into_response()
    }
}

/// Body of error response
///
/// Implements serde (de)serialise.
#[derive(Deserialize, Serialize)]
struct ErrorBody {
    /// Main error message
    message: String,

    /// Optional list of causes
    #[serde(skip_serializing_if = "Option::is_none")]
    caused_by: Option<Vec<String>>,
}

impl ErrorBody {
    /// Return a new ErrorBody
    ///
    /// # Arguments
    ///
    /// * `error`: The error that occurred
    fn new<E>(error: &E) -> Self
    where
        E: std::error::Error + Send + Sync,
    {
        let message = error.to_string();
        let mut caused_by = None;
        let mut current = error.source();
        while let Some(source) = current {
            let mut causes: Vec<String> = caused_by.unwrap_or_default();
            causes.push(source.to_string());
            caused_by = Some(causes);
            current = source.source();
        }
        // Remove duplicate entries.
        if let Some(caused_by) = caused_by.as_mut() {
            caused_by.dedup()
        }
        ErrorBody { message, caused_by }
    }
}

/// A response to send in error cases
///
/// Implements serde (de)serialise.
#[derive(Deserialize, Serialize)]
struct ErrorResponse {
    /// HTTP status of the response
    #[serde(skip)]
    status: StatusCode,

    /// Response body
    error: ErrorBody,
}

impl ErrorResponse {
    /// Return a new ErrorResponse
    ///
    /// # Arguments
    ///
    /// * `status`: HTTP status of the response
    /// * `error`: The error that occurred. This will be formatted into a suitable `ErrorBody`
    fn new<E>(status: StatusCode, error: &E) -> Self
    where
        E: std::error::Error + Send + Sync,
    {
        ErrorResponse {
            status,
            error: ErrorBody::new(error),
        }
    }

    /// Return a 400 bad request ErrorResponse
    fn bad_request<E>(error: &E) -> Self
    where
        E: std::error::Error + Send + Sync,
    {
        Self::new(StatusCode::BAD_REQUEST, error)
    }

    /// Return a 500 internal server error ErrorResponse
    fn internal_server_error<E>(error: &E) -> Self
    where
        E: std::error::Error + Send + Sync,
    {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, error)
    }

    /// Return a 504 gateway timeout ErrorResponse
    fn gateway_timeout<E>(error: &E) -> Self
    where
        E: std::error::Error + Send + Sync,
    {
        Self::new(StatusCode::GATEWAY_TIMEOUT, error)
    }
}

impl From<TimeSeriesError> for ErrorResponse {
    /// Convert from a `TimeSeriesError` into an `ErrorResponse`.
    fn from(error: TimeSeriesError) -> Self {
        let response = match &error {
            // Bad request
            TimeSeriesError::QueryJsonRejection(_)
            | TimeSeriesError::InvalidQuerySingle(_)
            | TimeSeriesError::InvalidQuery(_)
            | TimeSeriesError::InvalidWrite(_) => Self::bad_request(&error),

            // Gateway timeout
            TimeSeriesError::StorageRead {
                partition: _,
                source: StoreError::Timeout(_),
            } => Self::gateway_timeout(&error),

            // Internal server error
            TimeSeriesError::StorageRead {
                partition: _,
                source: _,
            }
            | TimeSeriesError::StorageWrite(_)
            | TimeSeriesError::TimezoneLookup {
                project: _,
                reason: _,
            }
            | TimeSeriesError::SemaphoreAcquireError(_)
            | TimeSeriesError::TaskJoin(_)
            | TimeSeriesError::TryFromInt(_) => Self::internal_server_error(&error),
        };

        // Log server errors.
        if response.status.is_server_error() {
            event!(Level::ERROR, "{}", error.to_string());
            let mut current = error.source();
            while let Some(source) = current {
                event!(Level::ERROR, "Caused by: {}", source.to_string());
                current = source.source();
            }
        }

        response
    }
}

impl IntoResponse for ErrorResponse {
    /// Convert from an `ErrorResponse` into an `axum::response::Response`.
    ///
    /// Renders the response as JSON.
    fn into_response(self) -> Response {
        let json_body = serde_json::to_string_pretty(&self);
        match json_body {
            Err(err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to serialise error response: {}", err),
            )
                .into_response(),
            Ok(json_body) => (
                self.status,
                [(&header::CONTENT_TYPE, mime::APPLICATION_JSON.to_string())],
                json_body,
            )
                .into_response(),
        }
    }
}
