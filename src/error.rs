//! Error types for the downloader
//!
//! Mirrors the failure taxonomy of the retrieval pipeline: the auth exchange is
//! fatal, while page, form and record failures are isolated to their unit of
//! work and surface in the [`DownloadReport`](crate::services::DownloadReport).

use std::fmt;

use thiserror::Error;

use crate::models::FormKey;

/// Why a backend request was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureReason {
    /// HTTP 404
    NotFound,
    /// HTTP 401
    Unauthorized,
    /// Any other non-200 status (0 when no status was received)
    Unknown(u16),
}

impl FailureReason {
    /// Classify a non-200 HTTP status
    pub fn from_status(status: u16) -> Self {
        match status {
            404 => Self::NotFound,
            401 => Self::Unauthorized,
            other => Self::Unknown(other),
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "Not Found"),
            Self::Unauthorized => write!(f, "Unauthorized"),
            Self::Unknown(0) => write!(f, "Unknown"),
            Self::Unknown(status) => write!(f, "Unknown (HTTP {})", status),
        }
    }
}

/// The main error type for downloader operations
#[derive(Error, Debug)]
pub enum DownloadError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// File I/O errors
    #[error("I/O error: {0}")]
    Io(String),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(String),

    /// Key material could not be parsed
    #[error("Key error: {0}")]
    Key(String),

    /// Credential encryption failed
    #[error("Encryption error: {0}")]
    Encryption(String),

    /// The token exchange was rejected
    #[error("Auth Failed: {reason}")]
    Auth { reason: FailureReason },

    /// A form definition could not be fetched
    #[error("Download Failed for {key}: {reason}")]
    Resolve { key: FormKey, reason: FailureReason },

    /// A single record could not be decrypted
    #[error("Decryption failed: {0}")]
    Decryption(String),

    /// A signed page did not verify
    #[error("Signature invalid: {0}")]
    SignatureInvalid(String),

    /// Transport-level failure
    #[error("Network error: {0}")]
    Network(String),

    /// Table or archive serialization errors
    #[error("Export error: {0}")]
    Export(String),
}

impl DownloadError {
    /// Human-readable message for the operator
    ///
    /// Distinguishes a bad backend address, bad credentials and an
    /// unauthorized download; everything else gets a generic message.
    pub fn user_message(&self) -> String {
        match self {
            Self::Auth {
                reason: FailureReason::NotFound,
            } => "The backend address could not be reached. Please check the address.".into(),
            Self::Auth {
                reason: FailureReason::Unauthorized,
            } => "The username or password is incorrect.".into(),
            Self::Resolve {
                reason: FailureReason::Unauthorized,
                ..
            } => "You are not authorized to download this data.".into(),
            other => format!("The download failed: {}", other),
        }
    }
}

impl From<std::io::Error> for DownloadError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<serde_json::Error> for DownloadError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json(err.to_string())
    }
}

impl From<reqwest::Error> for DownloadError {
    fn from(err: reqwest::Error) -> Self {
        Self::Network(err.to_string())
    }
}

/// Result type alias for downloader operations
pub type DownloadResult<T> = Result<T, DownloadError>;
