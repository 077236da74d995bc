//! Test doubles shared by the unit tests.

use async_trait::async_trait;
use barback_ssh::{
    CommandOutput, Connector, RemoteExecutor, SshConfig, TransportError,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Scriptable in-memory executor capturing every command it receives.
///
/// Honors the [`RemoteExecutor`] serialization contract: `exec` holds a
/// lock for the full duration of a command, so two execs against the same
/// fake queue exactly as they would against a live connection. Only
/// `exec_control` bypasses the queue.
#[derive(Default)]
pub struct FakeExecutor {
    host: String,
    commands: Mutex<Vec<String>>,
    responses: Mutex<Vec<(String, String)>>,
    failures: Mutex<Vec<String>>,
    delay: Option<Duration>,
    disconnected: AtomicBool,
    exec_gate: tokio::sync::Mutex<()>,
}

impl FakeExecutor {
    pub fn new(host: &str) -> Self {
        Self {
            host: host.to_string(),
            ..Self::default()
        }
    }

    /// Delay every exec call, to keep an operation in flight during a test.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Respond with `stdout` to any command containing `pattern`.
    pub fn respond(self, pattern: &str, stdout: &str) -> Self {
        self.responses
            .lock()
            .unwrap()
            .push((pattern.to_string(), stdout.to_string()));
        self
    }

    /// Fail any command containing `pattern` with a non-zero exit.
    pub fn fail_on(self, pattern: &str) -> Self {
        self.failures.lock().unwrap().push(pattern.to_string());
        self
    }

    /// Every command executed so far, in order.
    pub fn commands(&self) -> Vec<String> {
        self.commands.lock().unwrap().clone()
    }

    pub fn was_disconnected(&self) -> bool {
        self.disconnected.load(Ordering::SeqCst)
    }

    fn respond_to(&self, command: &str) -> Result<CommandOutput, TransportError> {
        let failing = self
            .failures
            .lock()
            .unwrap()
            .iter()
            .any(|p| command.contains(p));
        if failing {
            return Err(TransportError::command_failed(2, "simulated failure"));
        }

        let stdout = self
            .responses
            .lock()
            .unwrap()
            .iter()
            .find(|(pattern, _)| command.contains(pattern))
            .map(|(_, stdout)| stdout.clone())
            .unwrap_or_default();

        Ok(CommandOutput {
            stdout,
            stderr: String::new(),
            exit_code: 0,
        })
    }
}

#[async_trait]
impl RemoteExecutor for FakeExecutor {
    async fn exec(&self, command: &str) -> Result<CommandOutput, TransportError> {
        let _gate = self.exec_gate.lock().await;
        self.commands.lock().unwrap().push(command.to_string());

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        self.respond_to(command)
    }

    async fn exec_control(&self, command: &str) -> Result<CommandOutput, TransportError> {
        self.commands.lock().unwrap().push(command.to_string());
        self.respond_to(command)
    }

    async fn disconnect(&self) {
        self.disconnected.store(true, Ordering::SeqCst);
    }

    fn is_connected(&self) -> bool {
        !self.disconnected.load(Ordering::SeqCst)
    }

    fn host(&self) -> &str {
        &self.host
    }
}

/// Connector handing out pre-built fakes instead of dialing SSH.
pub struct FakeConnector {
    executors: Mutex<Vec<Arc<FakeExecutor>>>,
    fail_with: Mutex<Option<TransportError>>,
}

impl FakeConnector {
    /// Connector producing a fresh plain fake per connect call.
    pub fn new() -> Self {
        Self {
            executors: Mutex::new(Vec::new()),
            fail_with: Mutex::new(None),
        }
    }

    /// Queue a specific executor for the next connect call.
    pub fn with_executor(executor: Arc<FakeExecutor>) -> Self {
        let connector = Self::new();
        connector.executors.lock().unwrap().push(executor);
        connector
    }

    /// Make the next connect call fail.
    pub fn failing(error: TransportError) -> Self {
        let connector = Self::new();
        *connector.fail_with.lock().unwrap() = Some(error);
        connector
    }
}

#[async_trait]
impl Connector for FakeConnector {
    async fn connect(
        &self,
        config: &SshConfig,
    ) -> Result<Arc<dyn RemoteExecutor>, TransportError> {
        if let Some(error) = self.fail_with.lock().unwrap().take() {
            return Err(error);
        }
        let queued = self.executors.lock().unwrap().pop();
        let executor =
            queued.unwrap_or_else(|| Arc::new(FakeExecutor::new(&config.host)));
        Ok(executor)
    }
}
