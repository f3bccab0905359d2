use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::utils::{error_codes, error_to_api_response};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),
    #[error("invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

/// HTTP 接口层错误
#[derive(Debug, Error)]
pub enum FaucetError {
    #[error("unauthorized")]
    Unauthorized,
    #[error("invalid event: {0}")]
    InvalidEvent(String),
    #[error("faucet is shutting down")]
    Unavailable,
}

impl IntoResponse for FaucetError {
    fn into_response(self) -> Response {
        let (status, code, msg) = match &self {
            FaucetError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                error_codes::AUTH_FAILED,
                "未授权访问".to_string(),
            ),
            FaucetError::InvalidEvent(reason) => (
                StatusCode::BAD_REQUEST,
                error_codes::VALIDATION_ERROR,
                reason.clone(),
            ),
            FaucetError::Unavailable => (
                StatusCode::SERVICE_UNAVAILABLE,
                error_codes::INTERNAL_ERROR,
                self.to_string(),
            ),
        };

        (status, error_to_api_response::<()>(code, msg)).into_response()
    }
}
