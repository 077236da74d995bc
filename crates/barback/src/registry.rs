//! Session creation, lookup and teardown

use crate::orchestrator::OperationSlot;
use crate::{Error, Result};
use barback_ssh::{Connector, RemoteExecutor, SshConfig};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};

/// A caller-visible handle to one live remote session
///
/// Aggregates the executor and the session's single operation slot in one
/// struct, so connection state and operation state cannot drift apart.
pub struct SessionHandle {
    id: String,
    executor: Arc<dyn RemoteExecutor>,
    slot: Mutex<OperationSlot>,
}

impl SessionHandle {
    fn new(id: String, executor: Arc<dyn RemoteExecutor>) -> Self {
        Self {
            id,
            executor,
            slot: Mutex::new(OperationSlot::default()),
        }
    }

    /// The opaque session identifier.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The executor owning this session's connection.
    pub fn executor(&self) -> &Arc<dyn RemoteExecutor> {
        &self.executor
    }

    pub(crate) fn slot(&self) -> &Mutex<OperationSlot> {
        &self.slot
    }
}

impl std::fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionHandle")
            .field("id", &self.id)
            .field("host", &self.executor.host())
            .finish()
    }
}

/// Registry mapping session identifiers to live executors
///
/// The registry exclusively owns the identifier-to-executor mapping; every
/// stored executor is connected, and disconnecting one removes it in the
/// same step.
pub struct SessionRegistry {
    connector: Arc<dyn Connector>,
    sessions: RwLock<HashMap<String, Arc<SessionHandle>>>,
}

impl SessionRegistry {
    /// Create a registry that connects sessions through `connector`.
    pub fn new(connector: Arc<dyn Connector>) -> Self {
        Self {
            connector,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Connect to a remote host and register the session.
    ///
    /// Propagates connect timeouts and authentication/network failures from
    /// the transport layer.
    pub async fn open(&self, config: SshConfig) -> Result<Arc<SessionHandle>> {
        let executor = self.connector.connect(&config).await?;

        // Host plus wall-clock millis is unique at this system's scale.
        let id = format!("{}-{}", config.host, now_millis());
        let handle = Arc::new(SessionHandle::new(id.clone(), executor));

        self.sessions
            .write()
            .await
            .insert(id.clone(), Arc::clone(&handle));

        info!("Session {} opened to {}", id, config.host);
        Ok(handle)
    }

    /// Look up a session by identifier.
    pub async fn get(&self, session_id: &str) -> Result<Arc<SessionHandle>> {
        self.sessions
            .read()
            .await
            .get(session_id)
            .cloned()
            .ok_or_else(|| Error::SessionNotFound(session_id.to_string()))
    }

    /// Disconnect and remove a session.
    ///
    /// Removing an unknown identifier is a no-op, not an error.
    pub async fn close(&self, session_id: &str) {
        let removed = self.sessions.write().await.remove(session_id);
        match removed {
            Some(handle) => {
                handle.executor().disconnect().await;
                info!("Session {} closed", session_id);
            }
            None => debug!("Close requested for unknown session {}", session_id),
        }
    }

    /// Disconnect and remove every session. Used at process shutdown.
    pub async fn shutdown(&self) {
        let drained: Vec<_> = self.sessions.write().await.drain().collect();
        for (id, handle) in drained {
            handle.executor().disconnect().await;
            info!("Session {} closed on shutdown", id);
        }
    }

    /// Number of currently registered sessions.
    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }
}

fn now_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis()
}
