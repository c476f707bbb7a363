use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use exobooking_core::RejectionReason;
use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    AuthenticationError(String),
    #[error("{0}")]
    AuthorizationError(String),
    #[error("{0}")]
    ValidationError(String),
    #[error(transparent)]
    Rejected(#[from] RejectionReason),
}

impl AppError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            AppError::AuthenticationError(_) => (StatusCode::UNAUTHORIZED, "unauthorized"),
            AppError::AuthorizationError(_) => (StatusCode::FORBIDDEN, "forbidden"),
            AppError::ValidationError(_) => (StatusCode::BAD_REQUEST, "invalid_input"),
            AppError::Rejected(reason) => {
                let status = match reason {
                    RejectionReason::InvalidInput(_) => StatusCode::BAD_REQUEST,
                    RejectionReason::NotFound => StatusCode::NOT_FOUND,
                    RejectionReason::InsufficientCapacity { .. }
                    | RejectionReason::CapacityBelowCommitted { .. }
                    | RejectionReason::AlreadyCancelled => StatusCode::CONFLICT,
                    RejectionReason::StorageFailure(_) => StatusCode::INTERNAL_SERVER_ERROR,
                    RejectionReason::Timeout => StatusCode::SERVICE_UNAVAILABLE,
                };
                (status, reason.code())
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        let message = match &self {
            AppError::Rejected(RejectionReason::StorageFailure(detail)) => {
                tracing::error!("Internal Server Error: {}", detail);
                "Internal Server Error".to_string()
            }
            other => other.to_string(),
        };

        let body = Json(json!({
            "success": false,
            "code": code,
            "message": message,
        }));

        (status, body).into_response()
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::ValidationError(rejection.body_text())
    }
}
