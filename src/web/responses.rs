//! HTTP response types and error mapping.
//!
//! All error responses share the JSON shape `{"error": ..., "details": ...}`
//! with the status code derived from the error taxonomy, so clients can
//! always distinguish "no sources" from "you sent garbage" from "the proxy
//! refused to fetch that".

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::errors::{AppError, SourceError, WebError};
use crate::models::StreamingSource;

/// Body of `GET /sources`.
#[derive(Debug, Serialize)]
pub struct SourcesResponse {
    pub success: bool,
    pub sources: Vec<StreamingSource>,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

fn source_error_status(error: &SourceError) -> StatusCode {
    match error {
        SourceError::InvalidInput { .. } => StatusCode::BAD_REQUEST,
        SourceError::SsrfRejected { .. } => StatusCode::FORBIDDEN,
        SourceError::ParseFailure { .. } | SourceError::AllStrategiesFailed { .. } => {
            StatusCode::NOT_FOUND
        }
        SourceError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
        // Relay the origin's own status where it is a valid client/server
        // error; anything else degrades to 502.
        SourceError::Http { status, .. } => {
            StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY)
        }
        SourceError::UpstreamUnavailable { .. } => StatusCode::BAD_GATEWAY,
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error, details) = match &self {
            AppError::Source(source) => (
                source_error_status(source),
                source.to_string(),
                source.trace_summary(),
            ),
            AppError::Web(web) => match web {
                WebError::MissingParameter { parameter } => (
                    StatusCode::BAD_REQUEST,
                    format!("missing required parameter: {parameter}"),
                    None,
                ),
                other => (StatusCode::BAD_REQUEST, other.to_string(), None),
            },
            AppError::Http(e) => (StatusCode::BAD_GATEWAY, e.to_string(), None),
            other => (StatusCode::INTERNAL_SERVER_ERROR, other.to_string(), None),
        };

        (status, Json(ErrorBody { error, details })).into_response()
    }
}
