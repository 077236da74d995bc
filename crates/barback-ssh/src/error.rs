//! SSH-specific error types

use thiserror::Error;
use std::io;

/// Transport-specific errors
#[derive(Debug, Error)]
pub enum TransportError {
    /// Connection handshake did not complete in time
    #[error("Connection timed out")]
    ConnectTimeout,

    /// SSH connection error
    #[error("SSH connection error: {0}")]
    Connection(String),

    /// Authentication error
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Command attempted while the transport is down
    #[error("Not connected")]
    NotConnected,

    /// Remote command exited non-zero
    #[error("{message}")]
    CommandFailed {
        /// Exit code of the failed command
        code: i32,
        /// Captured standard error, or a fallback naming the exit code
        message: String,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl TransportError {
    /// Build a [`TransportError::CommandFailed`] from an exit code and the
    /// captured standard error, falling back to the exit code when the
    /// command produced no stderr output.
    pub fn command_failed(code: i32, stderr: &str) -> Self {
        let message = if stderr.trim().is_empty() {
            format!("command failed with exit code {}", code)
        } else {
            stderr.trim_end().to_string()
        };
        Self::CommandFailed { code, message }
    }
}

impl From<ssh2::Error> for TransportError {
    fn from(err: ssh2::Error) -> Self {
        Self::Connection(err.to_string())
    }
}
