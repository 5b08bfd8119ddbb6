//! Error types for the marksync engine.

use crate::Identity;
use thiserror::Error;

/// All possible errors from the marksync engine.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    // Fatal before any action is applied
    #[error("fetch failed: {0}")]
    Fetch(String),

    #[error("could not parse local record {handle}: {reason}")]
    Parse { handle: String, reason: String },

    // Store errors
    #[error("{operation} failed for {target}: {message}")]
    Store {
        operation: String,
        target: String,
        message: String,
    },

    #[error("watermark error: {0}")]
    Watermark(String),

    // Run control
    #[error("sync aborted while resolving conflict on {0}")]
    Aborted(Identity),

    #[error("identity {0} was scheduled for more than one action")]
    DuplicateAction(Identity),
}

impl Error {
    /// Build a store error for a failed operation.
    pub fn store(
        operation: impl Into<String>,
        target: impl Into<String>,
        message: impl ToString,
    ) -> Self {
        Error::Store {
            operation: operation.into(),
            target: target.into(),
            message: message.to_string(),
        }
    }
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, Error>;
