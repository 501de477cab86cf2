//! Error types shared by senders.

use thiserror::Error;

/// Errors that can occur while sending, flushing or closing a sender.
#[derive(Debug, Error)]
pub enum SendError {
    /// The sender was closed and no longer accepts messages.
    #[error("sender {0} is closed")]
    Closed(String),

    /// A level or message was rejected.
    #[error("invalid message: {0}")]
    InvalidMessage(String),

    /// The requested priority is not a usable level.
    #[error("invalid priority: {0}")]
    InvalidPriority(String),

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization or deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// An error raised by a sender implemented in another crate.
    #[error(transparent)]
    Other(Box<dyn std::error::Error + Send + Sync>),

    /// Several errors collected during one operation (usually close).
    #[error("{}", join_messages(.0))]
    Multiple(Vec<SendError>),
}

fn join_messages(errors: &[SendError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl SendError {
    /// Wraps an arbitrary error.
    pub fn other<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Other(Box::new(err))
    }

    /// Folds a list of errors into a single result.
    ///
    /// No errors yields `Ok(())`, exactly one is returned as-is, and more
    /// than one is wrapped in [`SendError::Multiple`].
    pub fn join(mut errors: Vec<SendError>) -> Result<()> {
        match errors.len() {
            0 => Ok(()),
            1 => Err(errors.remove(0)),
            _ => Err(Self::Multiple(errors)),
        }
    }
}

/// Result type alias for sender operations.
pub type Result<T> = std::result::Result<T, SendError>;
