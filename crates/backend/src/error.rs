//! Error types for the storage, scraping and notification paths, plus the
//! HTTP-facing `ApiError`.
//!
//! Only `ApiError` ever reaches a client. The other errors are logged by the
//! poll cycle or the registration handler and then dropped, so one failing
//! calendar or message never stops the rest.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::path::PathBuf;
use thiserror::Error;

/// Failure reading or writing the storage file.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Failed to access storage file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file exists but does not hold a valid store document
    #[error("Storage file {path} is corrupt: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to serialize store: {0}")]
    Serialize(#[source] serde_json::Error),
}

/// Failure fetching a calendar page.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} answered with status {status}")]
    Status { url: String, status: u16 },

    #[error("No adapter for calendar URL {0}")]
    UnsupportedUrl(String),
}

/// Failure delivering one chat notification.
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("Request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Chat API answered with status {0}")]
    Status(u16),

    #[error("Chat API reported error: {0}")]
    Api(String),

    #[error("Unreadable chat API response: {0}")]
    InvalidResponse(String),
}

/// Failure of a whole poll cycle.
#[derive(Debug, Error)]
pub enum PollError {
    #[error("A poll cycle is already running")]
    AlreadyRunning,

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// API error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Error type for the JSON API handlers
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    /// Missing or wrong bearer token
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Poll error: {0}")]
    Poll(#[from] PollError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_message, details) = match &self {
            ApiError::Store(e) => {
                tracing::error!("Storage error: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Storage unavailable".to_string(),
                    Some(e.to_string()),
                )
            }
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg.clone(), None),
            ApiError::Poll(PollError::AlreadyRunning) => {
                (StatusCode::CONFLICT, self.to_string(), None)
            }
            ApiError::Poll(PollError::Store(e)) => {
                tracing::error!("Storage error: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Storage unavailable".to_string(),
                    Some(e.to_string()),
                )
            }
        };

        let body = Json(ErrorResponse {
            error: error_message,
            details,
        });

        (status, body).into_response()
    }
}

/// Result type alias for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
