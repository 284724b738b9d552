use std::path::PathBuf;

use thiserror::Error;

/// Result alias for state store operations.
pub type LedgerResult<T> = Result<T, LedgerError>;

/// Error type surfaced by state store operations.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("storage error: {0}")]
    Storage(String),
    #[error("serialization error: {0}")]
    Serialization(String),
    /// The snapshot exists but cannot be trusted. Callers must not fall back
    /// to an empty state, otherwise every ticker would be re-baselined.
    #[error("snapshot {path} is unreadable: {reason}")]
    Corrupt { path: PathBuf, reason: String },
}

impl From<std::io::Error> for LedgerError {
    fn from(value: std::io::Error) -> Self {
        Self::Storage(value.to_string())
    }
}

impl From<serde_json::Error> for LedgerError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serialization(value.to_string())
    }
}
