//! HTTP-facing error type.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::aggregation::AggregationError;

/// Errors returned by handlers.
///
/// Variants that carry a status use it; everything else becomes a 500. The
/// body never exposes internal details of 5xx failures.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{message}")]
    Status { status: StatusCode, message: String },

    #[error(transparent)]
    Aggregation(#[from] AggregationError),

    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::Status {
            status: StatusCode::NOT_FOUND,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::Status {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// The status carried by the error itself, if any.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Status { status, .. } => Some(*status),
            Self::Aggregation(AggregationError::Disabled) => Some(StatusCode::SERVICE_UNAVAILABLE),
            Self::Aggregation(_) => Some(StatusCode::BAD_GATEWAY),
            Self::Internal(_) => None,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status().unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        let message = if status.is_server_error() {
            tracing::error!(status = status.as_u16(), error = %self, "Request failed");
            status
                .canonical_reason()
                .unwrap_or("Internal Server Error")
                .to_string()
        } else {
            self.to_string()
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}
