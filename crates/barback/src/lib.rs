//! # Barback
//!
//! Remote backup session and orchestration library.
//!
//! Barback connects to Linux hosts over SSH, drives `tar` on them to create
//! and extract backup archives, and reports operation lifecycle events to
//! any number of observers. A [`SessionRegistry`] owns one
//! [`SessionHandle`] per live connection; the [`Orchestrator`] runs at most
//! one backup or restore per session at a time and publishes its progress
//! through an [`EventBroadcaster`].

#![warn(missing_docs)]

pub use barback_ssh as ssh;

/// Error types for the barback library
pub mod error;

/// Operation lifecycle events
pub mod event;

/// Event fan-out to observers
pub mod broadcast;

/// Session creation, lookup and teardown
pub mod registry;

/// Backup and restore orchestration
pub mod orchestrator;

/// Remote host probes and output parsing
pub mod probe;

#[cfg(test)]
pub(crate) mod test_util;

pub use broadcast::EventBroadcaster;
pub use error::Error;
pub use event::{BackupEvent, BackupStatus, RestoreStatus, SessionEvent};
pub use orchestrator::{Orchestrator, OrchestratorConfig};
pub use probe::{BackupRecord, SystemSnapshot};
pub use registry::{SessionHandle, SessionRegistry};

/// Result type alias for barback operations
pub type Result<T> = std::result::Result<T, Error>;
