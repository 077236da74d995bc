//! Error types for the barback library

use barback_ssh::TransportError;
use thiserror::Error;

/// Main error type for barback operations
#[derive(Debug, Error)]
pub enum Error {
    /// Transport-level failure from the SSH layer
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// No session registered under the given identifier
    #[error("Session not found: {0}")]
    SessionNotFound(String),

    /// The session already has a backup or restore in flight
    #[error("Operation already in progress for session {0}")]
    OperationInProgress(String),
}

impl Error {
    /// Whether this error reports a connection-establishment failure.
    pub fn is_connect_failure(&self) -> bool {
        matches!(
            self,
            Self::Transport(
                TransportError::ConnectTimeout
                    | TransportError::Connection(_)
                    | TransportError::Authentication(_)
            )
        )
    }
}
