//! Remote command execution

use crate::{AuthMethod, SshConfig, TransportError};
use async_trait::async_trait;
use ssh2::Session;
use std::io::Read;
use std::net::{TcpStream, ToSocketAddrs};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Captured result of one remote command execution
///
/// Produced once per command and never mutated afterwards.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    /// Captured standard output
    pub stdout: String,
    /// Captured standard error
    pub stderr: String,
    /// Exit status of the remote process
    pub exit_code: i32,
}

/// Remote command execution over one live connection
///
/// Commands execute sequentially; implementations must not run two commands
/// concurrently against the same connection. There is no partial-result
/// streaming: all output is buffered until the remote process exits.
/// [`RemoteExecutor::exec_control`] is the one exemption from the
/// serialization rule.
#[async_trait]
pub trait RemoteExecutor: Send + Sync {
    /// Execute a shell command on the remote host.
    ///
    /// Fails with [`TransportError::NotConnected`] if the transport is down
    /// and [`TransportError::CommandFailed`] if the remote exit status is
    /// non-zero.
    async fn exec(&self, command: &str) -> Result<CommandOutput, TransportError>;

    /// Execute a shell command out-of-band on the remote host.
    ///
    /// Does not queue behind an in-flight [`RemoteExecutor::exec`] call.
    /// Used for cancellation, where waiting on the very command being
    /// cancelled would defeat the point.
    async fn exec_control(&self, command: &str) -> Result<CommandOutput, TransportError>;

    /// Tear down the connection. Safe to call when already disconnected.
    async fn disconnect(&self);

    /// Whether the connection is currently up.
    fn is_connected(&self) -> bool;

    /// The remote hostname this executor is bound to.
    fn host(&self) -> &str;
}

/// Factory seam for producing connected executors
///
/// The session registry is driven through this trait so tests can inject a
/// fake transport in place of a live SSH connection.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Connect to the remote host described by `config`.
    async fn connect(&self, config: &SshConfig)
        -> Result<Arc<dyn RemoteExecutor>, TransportError>;
}

/// SSH executor backed by libssh2
///
/// The ssh2 API is blocking, so every session operation runs on the tokio
/// blocking pool. The session sits behind a mutex that is held for the full
/// duration of a command, which serializes execution per connection.
pub struct SshExecutor {
    config: SshConfig,
    session: Arc<Mutex<Option<Session>>>,
}

impl SshExecutor {
    /// Connect to the remote host and authenticate.
    ///
    /// Fails with [`TransportError::ConnectTimeout`] when the handshake does
    /// not complete within the configured timeout, and with
    /// [`TransportError::Connection`] / [`TransportError::Authentication`]
    /// on network or credential failures.
    pub async fn connect(config: SshConfig) -> Result<Self, TransportError> {
        info!(
            "Connecting to {}@{}:{}",
            config.username, config.host, config.port
        );

        let timeout = Duration::from_secs(config.connect_timeout);
        let connect_config = config.clone();
        let session = tokio::time::timeout(
            timeout,
            tokio::task::spawn_blocking(move || Self::connect_blocking(&connect_config)),
        )
        .await
        .map_err(|_| TransportError::ConnectTimeout)?
        .map_err(|e| TransportError::Connection(format!("connect task failed: {}", e)))??;

        info!("SSH connected to {}", config.host);
        Ok(Self {
            config,
            session: Arc::new(Mutex::new(Some(session))),
        })
    }

    fn connect_blocking(config: &SshConfig) -> Result<Session, TransportError> {
        let addr = config
            .addr()
            .to_socket_addrs()
            .map_err(|e| TransportError::Connection(format!("address resolution failed: {}", e)))?
            .next()
            .ok_or_else(|| {
                TransportError::Connection(format!("no address found for {}", config.addr()))
            })?;

        let tcp = TcpStream::connect_timeout(&addr, Duration::from_secs(config.connect_timeout))
            .map_err(|e| TransportError::Connection(format!("TCP connect failed: {}", e)))?;

        let mut session = Session::new()?;
        session.set_tcp_stream(tcp);
        session.handshake()?;

        match &config.auth {
            AuthMethod::Password(password) => session
                .userauth_password(&config.username, password)
                .map_err(|e| TransportError::Authentication(e.to_string()))?,
            AuthMethod::PrivateKey { key, passphrase } => session
                .userauth_pubkey_memory(&config.username, None, key, passphrase.as_deref())
                .map_err(|e| TransportError::Authentication(e.to_string()))?,
        }

        if !session.authenticated() {
            return Err(TransportError::Authentication(format!(
                "authentication rejected for user {}",
                config.username
            )));
        }

        Ok(session)
    }

    fn exec_blocking(
        session: &Arc<Mutex<Option<Session>>>,
        command: &str,
    ) -> Result<CommandOutput, TransportError> {
        // Held across the whole command: one command at a time per connection.
        let guard = session
            .lock()
            .map_err(|_| TransportError::Connection("session lock poisoned".to_string()))?;
        let session = guard.as_ref().ok_or(TransportError::NotConnected)?;
        Self::exec_on(session, command)
    }

    /// Dial a fresh connection, run one command on it, tear it down.
    ///
    /// libssh2 sessions are not safe to share across threads, so a command
    /// that must not wait for the in-flight one gets its own connection.
    fn control_blocking(config: &SshConfig, command: &str) -> Result<CommandOutput, TransportError> {
        let session = Self::connect_blocking(config)?;
        let result = Self::exec_on(&session, command);
        if let Err(e) = session.disconnect(None, "closing control session", None) {
            warn!("Error closing control session to {}: {}", config.host, e);
        }
        result
    }

    fn exec_on(session: &Session, command: &str) -> Result<CommandOutput, TransportError> {
        let mut channel = session.channel_session()?;
        channel.exec(command)?;

        let mut stdout = String::new();
        channel.read_to_string(&mut stdout)?;

        let mut stderr = String::new();
        channel.stderr().read_to_string(&mut stderr)?;

        channel.wait_close()?;
        let exit_code = channel.exit_status()?;

        debug!("Remote command exited with status {}", exit_code);

        if exit_code != 0 {
            return Err(TransportError::command_failed(exit_code, &stderr));
        }

        Ok(CommandOutput {
            stdout,
            stderr,
            exit_code,
        })
    }
}

#[async_trait]
impl RemoteExecutor for SshExecutor {
    async fn exec(&self, command: &str) -> Result<CommandOutput, TransportError> {
        if !self.is_connected() {
            return Err(TransportError::NotConnected);
        }

        debug!("Executing remote command: {}", command);

        let session = Arc::clone(&self.session);
        let command = command.to_string();
        tokio::task::spawn_blocking(move || Self::exec_blocking(&session, &command))
            .await
            .map_err(|e| TransportError::Connection(format!("exec task failed: {}", e)))?
    }

    async fn exec_control(&self, command: &str) -> Result<CommandOutput, TransportError> {
        if !self.is_connected() {
            return Err(TransportError::NotConnected);
        }

        debug!("Executing control command: {}", command);

        let config = self.config.clone();
        let command = command.to_string();
        let timeout = Duration::from_secs(config.connect_timeout);
        tokio::time::timeout(
            timeout,
            tokio::task::spawn_blocking(move || Self::control_blocking(&config, &command)),
        )
        .await
        .map_err(|_| TransportError::ConnectTimeout)?
        .map_err(|e| TransportError::Connection(format!("control task failed: {}", e)))?
    }

    async fn disconnect(&self) {
        let session = Arc::clone(&self.session);
        let host = self.config.host.clone();
        let result = tokio::task::spawn_blocking(move || {
            let taken = session.lock().ok().and_then(|mut guard| guard.take());
            if let Some(session) = taken {
                if let Err(e) = session.disconnect(None, "closing session", None) {
                    warn!("Error disconnecting from {}: {}", host, e);
                }
            }
        })
        .await;

        if let Err(e) = result {
            warn!("Disconnect task failed: {}", e);
        }
    }

    fn is_connected(&self) -> bool {
        self.session
            .lock()
            .map(|guard| guard.is_some())
            .unwrap_or(false)
    }

    fn host(&self) -> &str {
        &self.config.host
    }
}

/// Connector producing live [`SshExecutor`] instances
#[derive(Debug, Clone, Default)]
pub struct SshConnector;

#[async_trait]
impl Connector for SshConnector {
    async fn connect(
        &self,
        config: &SshConfig,
    ) -> Result<Arc<dyn RemoteExecutor>, TransportError> {
        let executor = SshExecutor::connect(config.clone()).await?;
        Ok(Arc::new(executor))
    }
}
