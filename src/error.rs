use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

use crate::models::ride::RideStatus;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid transition from {from} to {to}")]
    InvalidTransition { from: RideStatus, to: RideStatus },

    #[error("pricing unavailable: {0}")]
    PricingUnavailable(String),

    #[error("no driver available: {0}")]
    NoDriverAvailable(String),

    #[error("payment authorization failed: {0}")]
    PaymentAuthorization(String),

    #[error("persistence error: {0}")]
    Persistence(String),

    #[error("retrieval error: {0}")]
    Retrieval(String),

    #[error("update error: {0}")]
    Update(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::InvalidTransition { .. } => StatusCode::CONFLICT,
            AppError::NoDriverAvailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::PricingUnavailable(_)
            | AppError::PaymentAuthorization(_)
            | AppError::Persistence(_)
            | AppError::Retrieval(_)
            | AppError::Update(_)
            | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "error": self.to_string()
        }));

        (self.status_code(), body).into_response()
    }
}
