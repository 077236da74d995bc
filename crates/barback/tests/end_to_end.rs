//! End-to-end scenarios through the public API: open a session, drive
//! backup/restore operations, observe the broadcast events.

use async_trait::async_trait;
use barback::ssh::{CommandOutput, Connector, RemoteExecutor, SshConfig, TransportError};
use barback::{
    BackupEvent, BackupStatus, EventBroadcaster, Orchestrator, OrchestratorConfig, RestoreStatus,
    SessionEvent, SessionRegistry,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::broadcast::Receiver;

/// Minimal scripted transport: every command succeeds after a short delay,
/// `du` reports a fixed size, and all commands are captured.
struct ScriptedExecutor {
    host: String,
    commands: Mutex<Vec<String>>,
    delay: Duration,
    connected: AtomicBool,
    exec_gate: tokio::sync::Mutex<()>,
}

impl ScriptedExecutor {
    fn new(host: &str, delay: Duration) -> Self {
        Self {
            host: host.to_string(),
            commands: Mutex::new(Vec::new()),
            delay,
            connected: AtomicBool::new(true),
            exec_gate: tokio::sync::Mutex::new(()),
        }
    }
}

#[async_trait]
impl RemoteExecutor for ScriptedExecutor {
    async fn exec(&self, command: &str) -> Result<CommandOutput, TransportError> {
        // One command at a time, like the live transport.
        let _gate = self.exec_gate.lock().await;
        self.commands.lock().unwrap().push(command.to_string());
        tokio::time::sleep(self.delay).await;
        let stdout = if command.starts_with("du -h") {
            "850M\n".to_string()
        } else {
            String::new()
        };
        Ok(CommandOutput {
            stdout,
            stderr: String::new(),
            exit_code: 0,
        })
    }

    async fn exec_control(&self, command: &str) -> Result<CommandOutput, TransportError> {
        self.commands.lock().unwrap().push(command.to_string());
        Ok(CommandOutput {
            stdout: String::new(),
            stderr: String::new(),
            exit_code: 0,
        })
    }

    async fn disconnect(&self) {
        self.connected.store(false, Ordering::SeqCst);
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn host(&self) -> &str {
        &self.host
    }
}

struct ScriptedConnector {
    executor: Arc<ScriptedExecutor>,
}

#[async_trait]
impl Connector for ScriptedConnector {
    async fn connect(
        &self,
        _config: &SshConfig,
    ) -> Result<Arc<dyn RemoteExecutor>, TransportError> {
        Ok(Arc::clone(&self.executor) as Arc<dyn RemoteExecutor>)
    }
}

async fn next_event(rx: &mut Receiver<SessionEvent>) -> SessionEvent {
    tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("timed out waiting for event")
        .expect("event channel closed")
}

fn orchestrator_for(executor: Arc<ScriptedExecutor>) -> Orchestrator {
    let connector = ScriptedConnector { executor };
    let registry = Arc::new(SessionRegistry::new(Arc::new(connector)));
    Orchestrator::new(
        registry,
        EventBroadcaster::default(),
        OrchestratorConfig::default(),
    )
}

#[tokio::test]
async fn backup_round_trip_reports_progress_then_completion() {
    let executor = Arc::new(ScriptedExecutor::new("web01", Duration::from_millis(50)));
    let orchestrator = orchestrator_for(Arc::clone(&executor));

    let config = SshConfig::with_password("web01", 22, "root", "secret");
    let handle = orchestrator.registry().open(config).await.unwrap();
    let session_id = handle.id().to_string();
    assert!(session_id.starts_with("web01-"));

    let mut rx = orchestrator.events().subscribe();

    // The start call itself returns immediately, before the archive command
    // has resolved.
    let started = std::time::Instant::now();
    orchestrator
        .start_backup(&session_id, "/data", &[])
        .await
        .unwrap();
    assert!(started.elapsed() < Duration::from_millis(40));

    let starting = next_event(&mut rx).await;
    assert_eq!(starting.session_id, session_id);
    assert!(matches!(
        starting.event,
        BackupEvent::BackupProgress { status: BackupStatus::Starting, .. }
    ));

    assert!(matches!(
        next_event(&mut rx).await.event,
        BackupEvent::BackupProgress { status: BackupStatus::Running, .. }
    ));

    match next_event(&mut rx).await.event {
        BackupEvent::BackupComplete {
            backup_name, size, ..
        } => {
            assert!(backup_name.starts_with("backup-"));
            assert!(backup_name.ends_with(".tar.gz"));
            assert_eq!(size, "850M");
        }
        other => panic!("expected backup-complete, got {:?}", other),
    }

    orchestrator.registry().close(&session_id).await;
    assert!(!executor.is_connected());
}

#[tokio::test]
async fn restore_on_fresh_session_succeeds_without_prior_backup() {
    let executor = Arc::new(ScriptedExecutor::new("db01", Duration::from_millis(10)));
    let orchestrator = orchestrator_for(Arc::clone(&executor));

    let config = SshConfig::with_password("db01", 22, "root", "secret");
    let handle = orchestrator.registry().open(config).await.unwrap();
    let session_id = handle.id().to_string();

    let mut rx = orchestrator.events().subscribe();
    orchestrator
        .start_restore(&session_id, "backup-X.tar.gz")
        .await
        .unwrap();

    assert!(matches!(
        next_event(&mut rx).await.event,
        BackupEvent::RestoreProgress { status: RestoreStatus::Starting }
    ));
    assert!(matches!(
        next_event(&mut rx).await.event,
        BackupEvent::RestoreProgress { status: RestoreStatus::Extracting }
    ));
    match next_event(&mut rx).await.event {
        BackupEvent::RestoreComplete { backup_id, .. } => {
            assert_eq!(backup_id, "backup-X.tar.gz");
        }
        other => panic!("expected restore-complete, got {:?}", other),
    }

    let commands = executor.commands.lock().unwrap().clone();
    assert_eq!(commands, vec!["tar -xzf /tmp/backup-X.tar.gz -C /".to_string()]);
}

#[tokio::test]
async fn sessions_run_operations_independently() {
    // Two sessions against the same orchestrator: an in-flight backup on one
    // must not block the other.
    let executor = Arc::new(ScriptedExecutor::new("shared", Duration::from_millis(150)));
    let orchestrator = orchestrator_for(Arc::clone(&executor));

    let first = orchestrator
        .registry()
        .open(SshConfig::with_password("web01", 22, "root", "pw"))
        .await
        .unwrap();
    // id generation includes millis; a second open in the same instant for a
    // different host still yields a distinct id.
    let second = orchestrator
        .registry()
        .open(SshConfig::with_password("db01", 22, "root", "pw"))
        .await
        .unwrap();

    orchestrator
        .start_backup(first.id(), "/data", &[])
        .await
        .unwrap();
    orchestrator
        .start_backup(second.id(), "/var", &[])
        .await
        .unwrap();

    // Same session, second attempt: rejected while the first is in flight.
    assert!(orchestrator
        .start_backup(first.id(), "/data", &[])
        .await
        .is_err());
}
