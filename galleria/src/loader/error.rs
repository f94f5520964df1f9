//! Load failure types.

use thiserror::Error;

/// Why an image load did not produce bytes.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LoadError {
    /// The HTTP client could not be constructed.
    #[error("Failed to create HTTP client: {0}")]
    Client(String),

    /// The request could not be sent or its body not read.
    #[error("Request for {url} failed: {reason}")]
    Request { url: String, reason: String },

    /// The server answered with a non-success status.
    #[error("HTTP {status} from {url}")]
    Status { url: String, status: u16 },

    /// The task was removed from the backlog before it started.
    #[error("Load of {url} was drained before it started")]
    Drained { url: String },

    /// The load was lost without producing an outcome.
    #[error("Load of {url} was abandoned")]
    Abandoned { url: String },
}

impl LoadError {
    /// URL of the failed load, when there is one.
    pub fn url(&self) -> Option<&str> {
        match self {
            LoadError::Client(_) => None,
            LoadError::Request { url, .. }
            | LoadError::Status { url, .. }
            | LoadError::Drained { url }
            | LoadError::Abandoned { url } => Some(url),
        }
    }

    /// Whether the load never started because the backlog was drained.
    pub fn is_drained(&self) -> bool {
        matches!(self, LoadError::Drained { .. })
    }
}
