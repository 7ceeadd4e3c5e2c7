//! Typed error for the webhook handler.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

/// Converts to a JSON response: `{"error": "message"}`.
#[derive(Debug)]
pub enum ApiError {
    /// 400 Bad Request: the body is not a Telegram update.
    BadRequest(String),
    /// 403 Forbidden: missing or wrong secret token header.
    Forbidden(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            Self::Forbidden(msg) => (StatusCode::FORBIDDEN, msg),
        };
        let body = serde_json::json!({"error": message});
        (status, Json(body)).into_response()
    }
}
