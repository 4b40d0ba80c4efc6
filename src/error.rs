use axum::{http::StatusCode, response::IntoResponse, Json};
use thiserror::Error;
use tracing::{error, warn};
use uuid::Uuid;

pub type Result<T> = std::result::Result<T, AppError>;

/// Error taxonomy for the meal-logging pipeline. Every lower-level failure
/// is converted into one of these before it reaches a handler; an error is
/// terminal for the triggering request only.
#[derive(Debug, Error)]
pub enum AppError {
    /// Bad user input (profile numbers, missing upload fields, bad base64).
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The external vision call failed or timed out.
    #[error("estimation service error: {0}")]
    EstimationService(String),

    /// The vision model answered, but the response could not be parsed
    /// into a meal record.
    #[error("estimation parse error: {0}")]
    EstimationParse(String),

    /// Storage layer failure (database or photo store).
    #[error("persistence error: {0}")]
    Persistence(String),

    /// Delete/update/read on a record id that does not exist.
    #[error("meal not found: {0}")]
    NotFound(Uuid),
}

impl From<sqlx::Error> for AppError {
    fn from(e: sqlx::Error) -> Self {
        AppError::Persistence(e.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let (status, hint) = match &self {
            AppError::InvalidInput(_) => (StatusCode::BAD_REQUEST, None),
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, None),
            AppError::EstimationService(_) => {
                (StatusCode::BAD_GATEWAY, Some("try again"))
            }
            AppError::EstimationParse(_) => (
                StatusCode::BAD_GATEWAY,
                Some("enter the meal name manually and try again"),
            ),
            AppError::Persistence(_) => (StatusCode::INTERNAL_SERVER_ERROR, None),
        };

        if status.is_server_error() || status == StatusCode::BAD_GATEWAY {
            error!(%status, error = %self, "request failed");
        } else {
            warn!(%status, error = %self, "request rejected");
        }

        let mut body = serde_json::json!({ "error": self.to_string() });
        if let Some(hint) = hint {
            body["hint"] = serde_json::Value::String(hint.to_string());
        }
        (status, Json(body)).into_response()
    }
}
