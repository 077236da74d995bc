//! Backup and restore orchestration
//!
//! The orchestrator drives a session's executor through the command
//! sequence implementing a backup or restore, enforcing single-flight
//! execution per session and publishing one event per state-machine
//! transition:
//!
//! ```text
//! idle -> starting -> running -> completing -> idle      (success)
//! idle -> starting -> running -> failed -> idle           (error)
//! running -> stopping -> idle                              (stop, backup only)
//! ```

use crate::registry::{SessionHandle, SessionRegistry};
use crate::{
    BackupEvent, BackupRecord, BackupStatus, EventBroadcaster, Result, RestoreStatus, SessionEvent,
};
use chrono::{DateTime, SecondsFormat, Utc};
use std::sync::Arc;
use tracing::{debug, error, info};

/// Best-effort remote kill issued on stop requests.
///
/// Matches by command substring host-wide, so it is not scoped to this
/// session's own tar process, and stopping never guarantees the in-flight
/// remote process actually died. Carried over from the original system
/// as a known limitation.
const STOP_BACKUP_COMMAND: &str = r#"pkill -f "tar -czf""#;

/// Phase of a session's operation slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OperationPhase {
    /// No operation in flight
    #[default]
    Idle,
    /// Operation accepted, command being prepared
    Starting,
    /// Remote command dispatched
    Running,
    /// Remote command succeeded, terminal bookkeeping in progress
    Completing,
    /// Stop requested while running
    Stopping,
    /// Remote command failed
    Failed,
}

/// Kind of operation occupying the slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    /// Archive creation
    Backup,
    /// Archive extraction
    Restore,
}

/// Per-session operation slot
///
/// Tracks at most one in-flight backup or restore. The sequence number
/// changes whenever the slot is claimed or forcibly released, which lets a
/// background task detect that a stop superseded it and discard its result.
#[derive(Debug, Default)]
pub struct OperationSlot {
    phase: OperationPhase,
    kind: Option<OperationKind>,
    seq: u64,
}

/// Orchestrator configuration
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Remote scratch directory holding the archives
    pub scratch_dir: String,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            scratch_dir: "/tmp".to_string(),
        }
    }
}

/// Drives backup and restore operations for registered sessions
///
/// Cheap to clone; clones share the registry and the broadcaster.
#[derive(Clone)]
pub struct Orchestrator {
    registry: Arc<SessionRegistry>,
    events: EventBroadcaster,
    config: OrchestratorConfig,
}

impl Orchestrator {
    /// Create an orchestrator over the given registry and broadcaster.
    pub fn new(
        registry: Arc<SessionRegistry>,
        events: EventBroadcaster,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            registry,
            events,
            config,
        }
    }

    /// The registry this orchestrator operates on.
    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    /// The broadcaster lifecycle events are published to.
    pub fn events(&self) -> &EventBroadcaster {
        &self.events
    }

    /// Start a backup of `backup_path` on the session's remote host.
    ///
    /// Returns as soon as the operation slot is claimed; the backup itself
    /// proceeds in a background task and reports through the broadcaster.
    /// Fails with [`crate::Error::OperationInProgress`] if the session
    /// already has an operation in flight — there is no queueing.
    pub async fn start_backup(
        &self,
        session_id: &str,
        backup_path: &str,
        exclude_paths: &[String],
    ) -> Result<()> {
        let handle = self.registry.get(session_id).await?;
        let seq = self.claim(&handle, OperationKind::Backup).await?;

        info!("Starting backup of {} for session {}", backup_path, session_id);

        let backup_path = if backup_path.is_empty() {
            "/".to_string()
        } else {
            backup_path.to_string()
        };
        let exclude_paths = exclude_paths.to_vec();
        let orchestrator = self.clone();
        tokio::spawn(async move {
            orchestrator
                .run_backup(handle, seq, backup_path, exclude_paths)
                .await;
        });

        Ok(())
    }

    /// Stop an in-flight backup, best-effort.
    ///
    /// A stop on a session with no active backup is a no-op that emits no
    /// event. Returns whether a stop was actually issued. Errors from the
    /// remote kill are swallowed: "no matching process" is an expected
    /// outcome, not a failure.
    pub async fn stop_backup(&self, session_id: &str) -> Result<bool> {
        let handle = self.registry.get(session_id).await?;

        {
            let mut slot = handle.slot().lock().await;
            let backup_active = slot.kind == Some(OperationKind::Backup)
                && matches!(slot.phase, OperationPhase::Starting | OperationPhase::Running);
            if !backup_active {
                debug!("Stop requested with no backup in flight for session {}", session_id);
                return Ok(false);
            }
            slot.phase = OperationPhase::Stopping;
        }

        info!("Stopping backup for session {}", session_id);

        // The in-flight tar occupies the session's command queue, so the
        // kill goes out on the control path rather than behind it.
        if let Err(e) = handle.executor().exec_control(STOP_BACKUP_COMMAND).await {
            debug!("Stop command for session {} reported: {}", session_id, e);
        }

        {
            let mut slot = handle.slot().lock().await;
            // Invalidates the in-flight task so its eventual result is
            // discarded; the remote process may outlive this transition.
            slot.seq += 1;
            slot.phase = OperationPhase::Idle;
            slot.kind = None;
        }

        self.events.publish(SessionEvent::new(
            session_id,
            BackupEvent::BackupProgress {
                status: BackupStatus::Stopped,
                message: None,
            },
        ));

        Ok(true)
    }

    /// Start a restore of `backup_id` onto the session's filesystem root.
    ///
    /// Destructive and irreversible: no pre-restore snapshot is taken.
    /// Shares the single operation slot with backups, so it fails with
    /// [`crate::Error::OperationInProgress`] while either kind is active.
    pub async fn start_restore(&self, session_id: &str, backup_id: &str) -> Result<()> {
        let handle = self.registry.get(session_id).await?;
        let seq = self.claim(&handle, OperationKind::Restore).await?;

        info!("Starting restore from {} for session {}", backup_id, session_id);

        let backup_id = backup_id.to_string();
        let orchestrator = self.clone();
        tokio::spawn(async move {
            orchestrator.run_restore(handle, seq, backup_id).await;
        });

        Ok(())
    }

    /// List the backup archives present on the session's remote host.
    ///
    /// The remote filesystem is the authoritative source; nothing is
    /// persisted locally. No matching archives yields an empty list.
    pub async fn list_backups(&self, session_id: &str) -> Result<Vec<BackupRecord>> {
        let handle = self.registry.get(session_id).await?;
        let command = format!(
            "ls -lh --time-style=long-iso {}/backup-*.tar.gz 2>/dev/null || true",
            self.config.scratch_dir
        );
        let output = handle.executor().exec(&command).await?;
        Ok(crate::probe::parse_backup_listing(&output.stdout))
    }

    async fn run_backup(
        &self,
        handle: Arc<SessionHandle>,
        seq: u64,
        backup_path: String,
        exclude_paths: Vec<String>,
    ) {
        let session_id = handle.id().to_string();

        // A stop may land between the claim and this task's first poll; an
        // operation that no longer owns the slot must not emit anything.
        if !self.advance(&handle, seq, OperationPhase::Starting).await {
            return;
        }
        self.events.publish(SessionEvent::new(
            &session_id,
            BackupEvent::BackupProgress {
                status: BackupStatus::Starting,
                message: Some(format!("Backing up {}", backup_path)),
            },
        ));

        let backup_name = archive_name(Utc::now());
        let dest = format!("{}/{}", self.config.scratch_dir, backup_name);
        let command = build_tar_command(&dest, &backup_path, &exclude_paths);

        if !self.advance(&handle, seq, OperationPhase::Running).await {
            return;
        }
        // Emitted before the command resolves: exec blocks until the remote
        // process exits, and observers need to know the long step began.
        self.events.publish(SessionEvent::new(
            &session_id,
            BackupEvent::BackupProgress {
                status: BackupStatus::Running,
                message: Some("Creating backup archive...".to_string()),
            },
        ));

        match handle.executor().exec(&command).await {
            Ok(_) => {
                if !self.advance(&handle, seq, OperationPhase::Completing).await {
                    debug!("Backup for session {} superseded before completion", session_id);
                    return;
                }

                let size_probe = format!("du -h {} | cut -f1", dest);
                let size = match handle.executor().exec(&size_probe).await {
                    Ok(output) => output.stdout.trim().to_string(),
                    Err(e) => {
                        self.finish_failed(&handle, seq, &session_id, e.to_string()).await;
                        return;
                    }
                };

                self.events.publish(SessionEvent::new(
                    &session_id,
                    BackupEvent::BackupComplete {
                        backup_name: backup_name.clone(),
                        path: dest,
                        size,
                        timestamp: iso_timestamp(Utc::now()),
                    },
                ));
                self.release(&handle, seq).await;
                info!("Backup completed: {}", backup_name);
            }
            Err(e) => {
                self.finish_failed(&handle, seq, &session_id, e.to_string()).await;
            }
        }
    }

    async fn run_restore(&self, handle: Arc<SessionHandle>, seq: u64, backup_id: String) {
        let session_id = handle.id().to_string();

        if !self.advance(&handle, seq, OperationPhase::Starting).await {
            return;
        }
        self.events.publish(SessionEvent::new(
            &session_id,
            BackupEvent::RestoreProgress {
                status: RestoreStatus::Starting,
            },
        ));

        let command = format!("tar -xzf {}/{} -C /", self.config.scratch_dir, backup_id);

        if !self.advance(&handle, seq, OperationPhase::Running).await {
            return;
        }
        self.events.publish(SessionEvent::new(
            &session_id,
            BackupEvent::RestoreProgress {
                status: RestoreStatus::Extracting,
            },
        ));

        match handle.executor().exec(&command).await {
            Ok(_) => {
                if !self.advance(&handle, seq, OperationPhase::Completing).await {
                    debug!("Restore for session {} superseded before completion", session_id);
                    return;
                }
                self.events.publish(SessionEvent::new(
                    &session_id,
                    BackupEvent::RestoreComplete {
                        backup_id,
                        timestamp: iso_timestamp(Utc::now()),
                    },
                ));
                self.release(&handle, seq).await;
                info!("Restore completed for session {}", session_id);
            }
            Err(e) => {
                self.finish_failed(&handle, seq, &session_id, e.to_string()).await;
            }
        }
    }

    /// Claim the session's operation slot, rejecting if one is in flight.
    async fn claim(&self, handle: &SessionHandle, kind: OperationKind) -> Result<u64> {
        let mut slot = handle.slot().lock().await;
        if slot.phase != OperationPhase::Idle {
            return Err(crate::Error::OperationInProgress(handle.id().to_string()));
        }
        slot.seq += 1;
        slot.phase = OperationPhase::Starting;
        slot.kind = Some(kind);
        Ok(slot.seq)
    }

    /// Transition the slot, unless the operation was superseded by a stop.
    async fn advance(&self, handle: &SessionHandle, seq: u64, next: OperationPhase) -> bool {
        let mut slot = handle.slot().lock().await;
        if slot.seq != seq
            || matches!(slot.phase, OperationPhase::Idle | OperationPhase::Stopping)
        {
            return false;
        }
        slot.phase = next;
        true
    }

    /// Return the slot to idle if this operation still owns it.
    async fn release(&self, handle: &SessionHandle, seq: u64) {
        let mut slot = handle.slot().lock().await;
        if slot.seq == seq {
            slot.phase = OperationPhase::Idle;
            slot.kind = None;
        }
    }

    /// Terminal error path: exactly one error event per failed operation.
    async fn finish_failed(
        &self,
        handle: &SessionHandle,
        seq: u64,
        session_id: &str,
        message: String,
    ) {
        if !self.advance(handle, seq, OperationPhase::Failed).await {
            debug!("Discarding result of superseded operation for session {}", session_id);
            return;
        }
        error!("Operation failed for session {}: {}", session_id, message);
        self.events.publish(SessionEvent::new(
            session_id,
            BackupEvent::BackupError { message },
        ));
        self.release(handle, seq).await;
    }
}

/// Archive name of the form `backup-<ISO 8601, ':' and '.' as '-'>.tar.gz`.
pub(crate) fn archive_name(at: DateTime<Utc>) -> String {
    format!("backup-{}.tar.gz", iso_timestamp(at).replace([':', '.'], "-"))
}

/// ISO 8601 timestamp with millisecond precision, e.g.
/// `2024-01-01T00:00:00.000Z`.
pub(crate) fn iso_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Build the archive command: recursive compressed archive of `backup_path`
/// rooted at `/`, one quoted exclusion clause per non-empty exclude path.
pub(crate) fn build_tar_command(dest: &str, backup_path: &str, exclude_paths: &[String]) -> String {
    let excludes: Vec<String> = exclude_paths
        .iter()
        .filter(|p| !p.trim().is_empty())
        .map(|p| format!("--exclude='{}'", p))
        .collect();

    let mut relative = backup_path.trim_start_matches('/');
    if relative.is_empty() {
        relative = ".";
    }

    if excludes.is_empty() {
        format!("tar -czf {} -C / {} 2>&1", dest, relative)
    } else {
        format!("tar -czf {} {} -C / {} 2>&1", dest, excludes.join(" "), relative)
    }
}
