//! Error handling for the mock server.
//!
//! Request-level failures map to an HTTP response; sink failures are
//! reported through tracing and never reach the caller.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::fmt;

/// Error type for mock server operations.
#[derive(Debug, Clone)]
pub enum MockServerError {
    /// Request body is not valid JSON or not a JSON object.
    MalformedRequest(String),
    /// Writing a diagnostic record to one of the log sinks failed.
    LogSink { sink: String, message: String },
}

impl fmt::Display for MockServerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MalformedRequest(msg) => write!(f, "Malformed request body: {}", msg),
            Self::LogSink { sink, message } => {
                write!(f, "Failed to write to log sink '{}': {}", sink, message)
            }
        }
    }
}

impl std::error::Error for MockServerError {}

/// Error response structure for JSON serialization.
#[derive(Serialize)]
struct ErrorResponseBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    message: String,
    r#type: &'static str,
}

impl MockServerError {
    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::MalformedRequest(_) => StatusCode::BAD_REQUEST,
            Self::LogSink { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get the error type string.
    pub fn error_type(&self) -> &'static str {
        match self {
            Self::MalformedRequest(_) => "invalid_request_error",
            Self::LogSink { .. } => "log_sink_error",
        }
    }
}

impl IntoResponse for MockServerError {
    fn into_response(self) -> Response {
        let body = ErrorResponseBody {
            error: ErrorDetail {
                message: self.to_string(),
                r#type: self.error_type(),
            },
        };

        (self.status_code(), Json(body)).into_response()
    }
}
