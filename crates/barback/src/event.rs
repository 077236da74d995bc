//! Operation lifecycle events
//!
//! Events are the only way backup/restore results reach observers: the
//! orchestrator publishes one event per state-machine transition, tagged
//! with the originating session, and the dashboard consumes them as JSON
//! of the form `{"type": "backup-progress", "sessionId": "...", ...}`.

use serde::{Deserialize, Serialize};

/// Progress status of a backup operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackupStatus {
    /// Archive name generated, command being built
    Starting,
    /// Archive command dispatched to the remote host
    Running,
    /// Operation stopped on request
    Stopped,
}

/// Progress status of a restore operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RestoreStatus {
    /// Restore accepted, extract command being built
    Starting,
    /// Extract command dispatched to the remote host
    Extracting,
}

/// Lifecycle event emitted by the orchestrator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum BackupEvent {
    /// Backup phase transition
    #[serde(rename_all = "camelCase")]
    BackupProgress {
        /// Current phase
        status: BackupStatus,
        /// Optional human-readable detail
        #[serde(skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
    /// Backup finished successfully
    #[serde(rename_all = "camelCase")]
    BackupComplete {
        /// Generated archive name
        backup_name: String,
        /// Full path of the archive on the remote host
        path: String,
        /// Human-readable archive size as reported by the remote host
        size: String,
        /// Completion timestamp (ISO 8601)
        timestamp: String,
    },
    /// Backup or restore failed
    #[serde(rename_all = "camelCase")]
    BackupError {
        /// Failure message
        message: String,
    },
    /// Restore phase transition
    #[serde(rename_all = "camelCase")]
    RestoreProgress {
        /// Current phase
        status: RestoreStatus,
    },
    /// Restore finished successfully
    #[serde(rename_all = "camelCase")]
    RestoreComplete {
        /// Identifier of the restored archive
        backup_id: String,
        /// Completion timestamp (ISO 8601)
        timestamp: String,
    },
}

/// An orchestrator event tagged with its originating session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionEvent {
    /// Session the event belongs to
    pub session_id: String,
    /// The lifecycle event itself
    #[serde(flatten)]
    pub event: BackupEvent,
}

impl SessionEvent {
    /// Tag an event with its session identifier.
    pub fn new(session_id: impl Into<String>, event: BackupEvent) -> Self {
        Self {
            session_id: session_id.into(),
            event,
        }
    }
}
