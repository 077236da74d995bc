//! # Barback SSH
//!
//! SSH command execution layer for barback.
//!
//! One [`SshExecutor`] owns one authenticated connection to one remote host
//! and executes shell commands on it strictly one at a time, returning the
//! captured output once the remote process exits.

#![warn(missing_docs)]

/// Connection configuration
pub mod config;

/// Remote command execution
pub mod executor;

/// SSH-specific error types
pub mod error;

pub use config::{AuthMethod, SshConfig};
pub use executor::{CommandOutput, Connector, RemoteExecutor, SshConnector, SshExecutor};
pub use error::TransportError;
