// HTTP error handling

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::sdm::SdmError;

/// Result type for HTTP handlers
pub type AppResult<T> = Result<T, AppError>;

/// Application error with HTTP status code
#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub message: String,
}

impl AppError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, message)
    }

    pub fn internal_server_error(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    /// Map an SDM failure, keeping auth rejections visible to the client.
    ///
    /// Anything else becomes a 500 carrying `fallback`.
    pub fn from_sdm(err: SdmError, fallback: &str) -> Self {
        match err {
            SdmError::Unauthorized(msg) => {
                tracing::warn!("SDM rejected credentials: {}", msg);
                Self::unauthorized(msg)
            }
            SdmError::Forbidden(msg) => {
                tracing::warn!("SDM denied access: {}", msg);
                Self::forbidden(msg)
            }
            other => {
                tracing::error!("{}: {}", fallback, other);
                Self::internal_server_error(fallback)
            }
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.status, self.message)
    }
}

impl std::error::Error for AppError {}

/// Error response JSON structure
#[derive(Debug, Serialize, Deserialize)]
struct ErrorResponse {
    error: String,
    status: u16,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status;
        let body = Json(ErrorResponse {
            error: self.message,
            status: status.as_u16(),
        });

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sdm_auth_errors_pass_through() {
        let err = AppError::from_sdm(SdmError::Unauthorized("expired".to_string()), "x");
        assert_eq!(err.status, StatusCode::UNAUTHORIZED);

        let err = AppError::from_sdm(SdmError::Forbidden("nope".to_string()), "x");
        assert_eq!(err.status, StatusCode::FORBIDDEN);
    }

    #[test]
    fn test_other_sdm_errors_hidden() {
        let err = AppError::from_sdm(
            SdmError::Network("connection reset".to_string()),
            "Failed to stop camera stream",
        );
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.message, "Failed to stop camera stream");
    }
}
