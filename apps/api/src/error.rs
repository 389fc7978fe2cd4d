use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use lykos_core::AppError;
use serde::Serialize;

/// API error payload.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    message: String,
}

/// HTTP API error wrapper around core application errors.
#[derive(Debug)]
pub struct ApiError(pub AppError);

impl From<AppError> for ApiError {
    fn from(value: AppError) -> Self {
        Self(value)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        // Every authentication rejection collapses into one status and one
        // message so the response carries no reason oracle. The specific
        // cause is logged server-side where the error was raised.
        let (status, message) = match self.0 {
            AppError::Validation(ref detail) => (StatusCode::BAD_REQUEST, detail.clone()),
            AppError::NotFound(ref detail) => (StatusCode::NOT_FOUND, detail.clone()),
            AppError::Conflict(ref detail) => (StatusCode::CONFLICT, detail.clone()),
            AppError::Unauthenticated(_) | AppError::Locked(_) | AppError::Expired(_) => (
                StatusCode::UNAUTHORIZED,
                "authentication required".to_owned(),
            ),
            AppError::Forbidden(ref detail) => (StatusCode::FORBIDDEN, detail.clone()),
            AppError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal server error".to_owned(),
            ),
        };

        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self.0, "request failed");
        }

        (status, Json(ErrorResponse { message })).into_response()
    }
}

/// Standard API result type.
pub type ApiResult<T> = Result<T, ApiError>;
