//! HTTP error types for the `leadfunnel` server.
//!
//! Funnel failures never reach here: they are rendered into the page as
//! inline errors or notices, and posts that make no sense for the current
//! step redirect back to it. What remains is a server-side fault, which
//! maps to a JSON body with a machine-readable `error` field and a
//! human-readable `message`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

/// Application-level error returned from HTTP handlers.
#[derive(Debug)]
pub enum AppError {
    /// Internal server error. The message is shown to the visitor, so it
    /// must not carry paths or backend detail.
    Internal(String),
}

/// JSON error response body.
#[derive(Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_type, message) = match self {
            Self::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", msg),
        };

        let body = ErrorBody {
            error: error_type,
            message,
        };

        (status, axum::Json(body)).into_response()
    }
}
