//! Error types for OCE.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum OceError {
    #[error("Malformed request: {0}")]
    MalformedRequest(String),

    #[error("Session notes error: {0}")]
    Notes(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl OceError {
    pub fn code(&self) -> i32 {
        match self {
            OceError::MalformedRequest(_) => -32600,
            OceError::Notes(_) => -32004,
            OceError::Config(_) => -32010,
            OceError::Io(_) => -32006,
            OceError::Json(_) => -32700,
            OceError::Internal(_) => -32603,
        }
    }

    /// True when the caller sent something we cannot process
    pub fn is_client_error(&self) -> bool {
        matches!(self, OceError::MalformedRequest(_) | OceError::Json(_))
    }
}

pub type Result<T> = std::result::Result<T, OceError>;
