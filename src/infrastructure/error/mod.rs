use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::dispatch::{DispatchError, JoinError};
use crate::storage::StoreError;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("Delivery disabled: {0}")]
    DeliveryDisabled(String),

    #[error("Dispatch failed: {0}")]
    DispatchFailed(String),

    #[error("Gone: {0}")]
    Gone(String),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<DispatchError> for AppError {
    fn from(err: DispatchError) -> Self {
        match err {
            DispatchError::InvalidRequest(msg) => AppError::Validation(msg),
            DispatchError::UnknownEvent(id) => AppError::NotFound(format!("Event {id} not found")),
            DispatchError::InvitationNotFound => {
                AppError::NotFound("Invitation not found".to_string())
            }
            DispatchError::Disabled(msg) => AppError::DeliveryDisabled(msg),
            DispatchError::RateLimited(msg) => AppError::RateLimited(msg),
            DispatchError::SendFailed(msg) => AppError::DispatchFailed(msg),
            DispatchError::Store(e) => AppError::Store(e),
        }
    }
}

impl From<JoinError> for AppError {
    fn from(err: JoinError) -> Self {
        match err {
            JoinError::NotFound => AppError::NotFound(err.to_string()),
            // One generic message for both, so the response does not leak
            // whether a token was deactivated or merely outlived its event.
            JoinError::Inactive | JoinError::Expired => AppError::Gone(err.to_string()),
            JoinError::Store(e) => AppError::Store(e),
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Serialize)]
struct ErrorBody {
    code: String,
    message: String,
}

/// Check if running in production mode (based on RUN_MODE env var)
fn is_production() -> bool {
    std::env::var("RUN_MODE")
        .map(|m| m == "production" || m == "prod")
        .unwrap_or(false)
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, client_message, log_message) = match &self {
            AppError::Config(e) => {
                let log_msg = e.to_string();
                let client_msg = if is_production() {
                    "Configuration error".to_string()
                } else {
                    log_msg.clone()
                };
                (StatusCode::INTERNAL_SERVER_ERROR, "CONFIG_ERROR", client_msg, log_msg)
            }
            AppError::Validation(msg) => (
                StatusCode::BAD_REQUEST,
                "VALIDATION_ERROR",
                msg.clone(),
                msg.clone(),
            ),
            AppError::NotFound(msg) => (
                StatusCode::NOT_FOUND,
                "NOT_FOUND",
                msg.clone(),
                msg.clone(),
            ),
            AppError::RateLimited(msg) => (
                StatusCode::TOO_MANY_REQUESTS,
                "RATE_LIMITED",
                msg.clone(),
                msg.clone(),
            ),
            AppError::DeliveryDisabled(msg) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "DELIVERY_DISABLED",
                msg.clone(),
                msg.clone(),
            ),
            AppError::DispatchFailed(msg) => (
                StatusCode::BAD_GATEWAY,
                "DISPATCH_FAILED",
                msg.clone(),
                msg.clone(),
            ),
            AppError::Gone(msg) => (
                StatusCode::GONE,
                "INVITATION_INVALID",
                msg.clone(),
                msg.clone(),
            ),
            AppError::Store(e) => {
                let log_msg = e.to_string();
                let client_msg = if is_production() {
                    "Service temporarily unavailable".to_string()
                } else {
                    log_msg.clone()
                };
                (StatusCode::INTERNAL_SERVER_ERROR, "STORE_ERROR", client_msg, log_msg)
            }
            AppError::Internal(e) => {
                let log_msg = e.clone();
                let client_msg = if is_production() {
                    "Internal server error".to_string()
                } else {
                    log_msg.clone()
                };
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", client_msg, log_msg)
            }
        };

        // Always log the detailed error server-side
        tracing::error!(
            code = %code,
            status = %status.as_u16(),
            message = %log_message,
            "API error"
        );

        let body = ErrorResponse {
            error: ErrorBody {
                code: code.to_string(),
                message: client_message,
            },
        };

        (status, Json(body)).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
