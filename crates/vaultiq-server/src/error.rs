//! HTTP-facing error wrapper, grounded on `chat_server_rust`'s
//! `shared::error::AppError` / Axum `IntoResponse` pattern.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use vaultiq_core::config::Family;
use vaultiq_core::Error as CoreError;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("not found")]
    NotFound,

    #[error(transparent)]
    Core(#[from] CoreError),
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    code: u16,
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            ApiError::NotFound => (StatusCode::NOT_FOUND, "not found".to_string()),
            ApiError::Core(CoreError::InvalidInput(msg)) => (StatusCode::BAD_REQUEST, msg.clone()),
            ApiError::Core(CoreError::NotConfigured(family)) => (
                StatusCode::SERVICE_UNAVAILABLE,
                format!("family not configured: {}", describe_family(*family)),
            ),
            ApiError::Core(CoreError::BackendAbsent(msg)) => {
                tracing::error!(error = %msg, "backend absent");
                (StatusCode::SERVICE_UNAVAILABLE, "backend unavailable".to_string())
            }
            ApiError::Core(CoreError::BackendTransient(msg)) => {
                tracing::warn!(error = %msg, "backend transient error");
                (StatusCode::GATEWAY_TIMEOUT, "backend timed out".to_string())
            }
            ApiError::Core(err @ (CoreError::Store(_) | CoreError::Cache(_) | CoreError::Serde(_))) => {
                tracing::error!(error = %err, "unexpected core error");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal error".to_string())
            }
        };

        let status_code = status.as_u16();
        (status, Json(ErrorResponse { code: status_code, message })).into_response()
    }
}

fn describe_family(family: Family) -> &'static str {
    match family {
        Family::Session => "SESSION",
        Family::Revocation => "REVOCATION",
        Family::UserSessionIndex => "USER_SESSION_INDEX",
        Family::ActivityLog => "ACTIVITY_LOG",
    }
}
