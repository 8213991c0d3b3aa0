//! Response rendering for the REST API.
//!
//! Every body is indented JSON. Errors render as `{"error": "<message>"}`
//! with the appropriate HTTP status; if even that cannot be marshaled the
//! raw error string is written directly, so a failed response is never
//! re-marshaled into another failure.

use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::telemetry::QueueStatsSnapshot;
use crate::types::Error;

/// `GET /` body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HomeResponse {
    pub uptime: String,
    pub version: String,
}

/// `GET /queues/{name}` body. `data` is empty when the queue held nothing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueGetResponse {
    pub data: String,
}

/// Error body shared by every endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// `GET /stats` and `GET /queues` body.
pub type StatsResponse = HashMap<String, QueueStatsSnapshot>;

/// Render a value as an indented-JSON response.
pub(crate) fn json_response<T: Serialize>(status: StatusCode, value: &T) -> Response {
    match serde_json::to_vec_pretty(value) {
        Ok(body) => (
            status,
            [(header::CONTENT_TYPE, "application/json")],
            body,
        )
            .into_response(),
        Err(e) => ApiError::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("failed to marshal response: {}", e),
        )
        .into_response(),
    }
}

/// A response with a status code and zero body bytes.
pub(crate) fn empty_response(status: StatusCode) -> Response {
    (status, [(header::CONTENT_TYPE, "application/json")]).into_response()
}

/// An error on its way to the wire: HTTP status plus message.
#[derive(Debug)]
pub(crate) struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub(crate) fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    /// Status from the error's own kind, message verbatim.
    pub(crate) fn from_error(err: &Error) -> Self {
        let status = StatusCode::from_u16(err.http_status())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        Self::new(status, err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorResponse {
            error: self.message,
        };
        match serde_json::to_vec_pretty(&body) {
            Ok(encoded) => (
                self.status,
                [(header::CONTENT_TYPE, "application/json")],
                encoded,
            )
                .into_response(),
            // Worst case: write the raw error string with the status.
            Err(_) => (self.status, body.error).into_response(),
        }
    }
}
