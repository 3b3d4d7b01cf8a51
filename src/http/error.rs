//! Probe error taxonomy and HTTP mapping.
//!
//! Every probe failure maps to a distinct user-visible status:
//! - invalid parameters → 400
//! - downstream timeout → 504
//! - other downstream failures → 502
//! - unexpected internal faults → 500
//!
//! Resource-pool timeouts are not represented here: they are per-task
//! outcomes inside a fan-out result, never whole-request failures.

use std::time::Duration;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::downstream::DownstreamError;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("downstream service timeout after {0:?}")]
    DownstreamTimeout(Duration),

    #[error("downstream service error: {0}")]
    DownstreamUnavailable(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::InvalidParameter(_) => StatusCode::BAD_REQUEST,
            ApiError::DownstreamTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
            ApiError::DownstreamUnavailable(_) => StatusCode::BAD_GATEWAY,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<DownstreamError> for ApiError {
    fn from(error: DownstreamError) -> Self {
        match error {
            DownstreamError::Timeout(elapsed) => ApiError::DownstreamTimeout(elapsed),
            other => ApiError::DownstreamUnavailable(other.to_string()),
        }
    }
}

impl From<tokio::task::JoinError> for ApiError {
    fn from(error: tokio::task::JoinError) -> Self {
        ApiError::Internal(format!("worker task failed: {error}"))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
