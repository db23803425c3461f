use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

/// C6's error taxonomy (§7), mapped to HTTP status codes via `IntoResponse`.
/// This is the "central middleware" the original's decorator-based exception
/// funneling becomes.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("invalid application description: {0}")]
    InvalidDescription(String),

    #[error("invalid execution name: {0}")]
    NameInvalid(String),

    #[error("not found")]
    NotFound,

    #[error("forbidden")]
    Forbidden,

    #[error("quota exceeded")]
    QuotaExceeded,

    #[error("execution is not running")]
    NotRunning,

    #[error("master unavailable: {0}")]
    MasterUnavailable(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<zoe_domain::DomainError> for ApiError {
    fn from(e: zoe_domain::DomainError) -> Self {
        ApiError::InvalidDescription(e.reason().to_string())
    }
}

impl From<zoe_store::StoreError> for ApiError {
    fn from(e: zoe_store::StoreError) -> Self {
        ApiError::Internal(e.to_string())
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::InvalidDescription(_) | ApiError::NameInvalid(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::Forbidden => StatusCode::FORBIDDEN,
            ApiError::QuotaExceeded => StatusCode::PAYMENT_REQUIRED,
            ApiError::NotRunning => StatusCode::BAD_REQUEST,
            ApiError::MasterUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = Json(json!({ "error": self.to_string() }));
        (status, body).into_response()
    }
}
