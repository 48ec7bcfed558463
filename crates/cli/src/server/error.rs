use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use grounded_core::AppError;
use serde_json::json;

/// Failures surfaced over HTTP as `{ "error": message }`.
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    /// Provider rejected our credentials
    BadGateway(String),
    /// Provider rate limited or unreachable after retries
    Unavailable(String),
    Internal(String),
}

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        let message = err.to_string();
        match err {
            AppError::Unauthorized(_) => ApiError::BadGateway(message),
            AppError::RateLimited(_) | AppError::ProviderTransient(_) => {
                ApiError::Unavailable(message)
            }
            _ => ApiError::Internal(message),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::BadGateway(msg) => (StatusCode::BAD_GATEWAY, msg),
            ApiError::Unavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        tracing::error!(status = status.as_u16(), "Request failed: {}", message);

        let body = Json(json!({ "error": message }));
        (status, body).into_response()
    }
}
