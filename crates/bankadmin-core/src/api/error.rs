use reqwest::StatusCode;
use thiserror::Error;

use crate::models::ErrorBody;
use crate::utils::truncate_string;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Session expired: {0}")]
    SessionExpired(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Access denied: {0}")]
    AccessDenied(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Request rejected ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("Rate limited - please wait before retrying")]
    RateLimited,

    #[error("Server error: {0}")]
    ServerError(String),

    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

impl ApiError {
    /// The `message`/`error` field of a JSON error envelope, if the body is one.
    pub fn envelope_message(body: &str) -> Option<String> {
        serde_json::from_str::<ErrorBody>(body)
            .ok()
            .and_then(ErrorBody::into_message)
    }

    /// Pull the human-readable message out of an error body. Falls back to the
    /// raw (truncated) body when it is not the usual JSON envelope.
    pub fn extract_message(body: &str) -> String {
        Self::envelope_message(body)
            .unwrap_or_else(|| truncate_string(body.trim(), MAX_ERROR_BODY_LENGTH))
    }

    pub fn from_status(status: StatusCode, body: &str) -> Self {
        let message = Self::extract_message(body);
        match status.as_u16() {
            401 => ApiError::Unauthorized(message),
            403 => ApiError::AccessDenied(message),
            404 => ApiError::NotFound(message),
            429 => ApiError::RateLimited,
            500..=599 => ApiError::ServerError(message),
            code => ApiError::Rejected {
                status: code,
                message,
            },
        }
    }

    /// True for failures caused by the transport rather than the backend
    pub fn is_network(&self) -> bool {
        matches!(self, ApiError::NetworkError(_))
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, ApiError::NetworkError(e) if e.is_timeout())
    }
}
