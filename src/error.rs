use std::path::PathBuf;

use thiserror::Error;

/// Failures that end a streaming session or its persistence step.
///
/// An occluded frame is not an error; sources report it as
/// [`crate::ingest::Extraction::Occluded`].
#[derive(Debug, Error)]
pub enum StreamError {
    #[error("cannot reach tracking source at {address}: {reason}")]
    Connection { address: String, reason: String },

    #[error("tracked entity mode {mode} not supported: {reason}")]
    Configuration { mode: String, reason: String },

    #[error("failed to persist frame log to {}: {source}", .path.display())]
    Persistence {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("frame log serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("unexpected failure: {0}")]
    Unexpected(String),
}

impl StreamError {
    pub fn connection(address: impl Into<String>, reason: impl ToString) -> Self {
        Self::Connection {
            address: address.into(),
            reason: reason.to_string(),
        }
    }

    pub fn unexpected(reason: impl ToString) -> Self {
        Self::Unexpected(reason.to_string())
    }
}
