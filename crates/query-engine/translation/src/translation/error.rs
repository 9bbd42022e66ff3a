//! Errors for talking to the language model.

use std::time::Duration;

use thiserror::Error;

/// A failure reaching the model or understanding its reply.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModelError {
    #[error("model request timed out after {} seconds", .0.as_secs())]
    Timeout(Duration),
    #[error("API request failed")]
    Transport(String),
    #[error("API error: {0}")]
    Status(u16),
    #[error("Invalid API response format")]
    InvalidFormat(String),
    #[error("Invalid API response structure")]
    InvalidStructure,
}

impl ModelError {
    /// Transport failures, rate limiting and server errors are worth another attempt.
    pub fn is_transient(&self) -> bool {
        match self {
            ModelError::Transport(_) => true,
            ModelError::Status(status) => *status == 429 || *status >= 500,
            ModelError::Timeout(_) | ModelError::InvalidFormat(_) | ModelError::InvalidStructure => {
                false
            }
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, ModelError::Timeout(_))
    }
}
