//! Unified error handling for the binary.

use crate::config::ConfigError;

/// Application error type.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Sync error: {0}")]
    Engine(#[from] marksync_engine::Error),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Sync directory {0} does not exist")]
    MissingDirectory(String),

    #[error("Cancelled, nothing was changed")]
    Cancelled,
}

impl AppError {
    /// Process exit code for this error. A declined confirmation is told
    /// apart from a failure.
    pub fn exit_code(&self) -> u8 {
        match self {
            AppError::Cancelled => 2,
            _ => 1,
        }
    }
}

/// Result type alias for the binary.
pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancelled_has_its_own_exit_code() {
        assert_eq!(AppError::Cancelled.exit_code(), 2);
        assert_eq!(
            AppError::MissingDirectory("/nope".into()).exit_code(),
            1
        );
    }

    #[test]
    fn engine_errors_convert() {
        let err: AppError = marksync_engine::Error::Fetch("timeout".into()).into();
        assert!(matches!(err, AppError::Engine(_)));
        assert!(err.to_string().contains("timeout"));
    }
}
