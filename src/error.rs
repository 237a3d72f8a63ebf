use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::io;

/// Request-level errors. Only the worker health route can produce these.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Failed to read heartbeat: {0}")]
    Heartbeat(#[from] io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::Heartbeat(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        tracing::error!(error = %self, status = status.as_u16(), "Request failed");

        let body = json!({
            "status": "error",
            "error": self.to_string(),
        });

        (status, Json(body)).into_response()
    }
}
