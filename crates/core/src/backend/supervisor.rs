//! Lifecycle supervision of the analysis service process.
//!
//! The supervisor owns the child process handle exclusively. Starting spawns
//! the service, forwards its output to the log, waits a grace interval, and
//! probes the status endpoint before declaring readiness. Failures are
//! reported to the caller as [`BackendError::Unavailable`], never as panics.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::{watch, Mutex};
use tracing::{debug, info, warn};

use crate::backend::client::BackendClient;
use crate::config::BackendConfig;
use crate::errors::BackendError;

// ---------------------------------------------------------------------------
// Ready state
// ---------------------------------------------------------------------------

/// Readiness of the supervised analysis service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadyState {
    /// Spawned, readiness not yet confirmed.
    Starting,
    /// The status endpoint answered `ready`.
    Ready,
    /// Spawn or readiness probe failed.
    Failed,
    /// Not running.
    Stopped,
}

impl std::fmt::Display for ReadyState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Starting => write!(f, "starting"),
            Self::Ready => write!(f, "ready"),
            Self::Failed => write!(f, "failed"),
            Self::Stopped => write!(f, "stopped"),
        }
    }
}

// ---------------------------------------------------------------------------
// Supervisor
// ---------------------------------------------------------------------------

/// Starts, monitors, and restarts the external analysis service.
pub struct ProcessSupervisor {
    config: BackendConfig,
    client: BackendClient,
    child: Mutex<Option<Child>>,
    state_tx: watch::Sender<ReadyState>,
}

impl ProcessSupervisor {
    pub fn new(config: BackendConfig, client: BackendClient) -> Self {
        let (state_tx, _) = watch::channel(ReadyState::Stopped);
        Self {
            config,
            client,
            child: Mutex::new(None),
            state_tx,
        }
    }

    /// Current readiness state.
    pub fn state(&self) -> ReadyState {
        *self.state_tx.borrow()
    }

    /// True iff the service passed its last readiness probe.
    pub fn is_ready(&self) -> bool {
        self.state() == ReadyState::Ready
    }

    /// Subscribe to readiness transitions.
    pub fn subscribe(&self) -> watch::Receiver<ReadyState> {
        self.state_tx.subscribe()
    }

    /// PID of the running service, if any.
    pub async fn pid(&self) -> Option<u32> {
        self.child.lock().await.as_ref().and_then(|c| c.id())
    }

    /// Start the analysis service for `workspace` and wait for readiness.
    ///
    /// Any previously running service is stopped first, so a dual-process
    /// state is unreachable. On spawn or probe failure the state transitions
    /// to `Failed` and the error is returned for the caller to surface as a
    /// notification.
    pub async fn start(&self, workspace: &Path) -> Result<(), BackendError> {
        self.stop().await;
        let _ = self.state_tx.send(ReadyState::Starting);

        let python = self.resolve_python().await;
        info!(python = %python.display(), module = %self.config.server_module, "starting analysis backend");

        let mut command = Command::new(&python);
        command
            .arg("-m")
            .arg(&self.config.server_module)
            .arg("--workspace")
            .arg(workspace)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(ref dir) = self.config.backend_dir {
            command.current_dir(dir).env("PYTHONPATH", dir);
        }

        let mut child = match command.spawn() {
            Ok(child) => child,
            Err(source) => {
                let _ = self.state_tx.send(ReadyState::Failed);
                return Err(BackendError::SpawnFailed {
                    command: python.display().to_string(),
                    source,
                });
            }
        };

        forward_output(&mut child);
        debug!(pid = child.id(), "backend process spawned");
        *self.child.lock().await = Some(child);

        // The service needs a moment to bind its port; probing immediately
        // would report a false failure.
        tokio::time::sleep(self.config.startup_grace()).await;

        match self.client.probe_ready().await {
            Ok(true) => {
                let _ = self.state_tx.send(ReadyState::Ready);
                info!("analysis backend is ready");
                Ok(())
            }
            Ok(false) => {
                let _ = self.state_tx.send(ReadyState::Failed);
                Err(BackendError::Unavailable(
                    "status endpoint did not report ready".into(),
                ))
            }
            Err(e) => {
                let _ = self.state_tx.send(ReadyState::Failed);
                Err(BackendError::Unavailable(format!(
                    "readiness probe failed: {e}"
                )))
            }
        }
    }

    /// Stop the analysis service. Safe to call when nothing is running.
    pub async fn stop(&self) {
        let mut guard = self.child.lock().await;
        if let Some(mut child) = guard.take() {
            info!(pid = child.id(), "stopping analysis backend");
            if let Err(e) = child.start_kill() {
                warn!(error = %e, "failed to signal backend process");
            }
            let _ = child.wait().await;
        }
        let _ = self.state_tx.send(ReadyState::Stopped);
    }

    /// Stop-then-start. Used after a configuration change.
    pub async fn restart(&self, workspace: &Path) -> Result<(), BackendError> {
        self.stop().await;
        self.start(workspace).await
    }

    /// Resolve the service executable: configured override first, then a
    /// `python3` probe, then the least-specific default `python`.
    async fn resolve_python(&self) -> PathBuf {
        if let Some(ref configured) = self.config.python_path {
            return configured.clone();
        }

        let probe = Command::new("python3")
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await;
        match probe {
            Ok(status) if status.success() => PathBuf::from("python3"),
            _ => {
                debug!("python3 probe failed, falling back to python");
                PathBuf::from("python")
            }
        }
    }
}

/// Forward the child's stdout/stderr to the log. Observational only; output
/// never affects control flow.
fn forward_output(child: &mut Child) {
    if let Some(stdout) = child.stdout.take() {
        tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                debug!(target: "gittracker::backend", "{line}");
            }
        });
    }
    if let Some(stderr) = child.stderr.take() {
        tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                warn!(target: "gittracker::backend", "{line}");
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn test_config() -> BackendConfig {
        BackendConfig {
            python_path: Some(PathBuf::from("/nonexistent/bin/python")),
            server_url: "http://127.0.0.1:1".into(),
            startup_grace_ms: 1,
            request_timeout_secs: 1,
            ..BackendConfig::default()
        }
    }

    fn test_client(config: &BackendConfig) -> BackendClient {
        BackendClient::new(config.server_url.clone(), Duration::from_secs(1)).unwrap()
    }

    #[tokio::test]
    async fn test_start_with_invalid_executable_fails() {
        let config = test_config();
        let client = test_client(&config);
        let supervisor = ProcessSupervisor::new(config, client);

        let result = supervisor.start(Path::new("/tmp")).await;
        assert!(matches!(result, Err(BackendError::SpawnFailed { .. })));
        assert_eq!(supervisor.state(), ReadyState::Failed);
        assert!(!supervisor.is_ready());
    }

    #[tokio::test]
    async fn test_stop_is_idempotent() {
        let config = test_config();
        let client = test_client(&config);
        let supervisor = ProcessSupervisor::new(config, client);

        supervisor.stop().await;
        supervisor.stop().await;
        assert_eq!(supervisor.state(), ReadyState::Stopped);
        assert!(supervisor.pid().await.is_none());
    }

    #[tokio::test]
    async fn test_subscribe_observes_transitions() {
        let config = test_config();
        let client = test_client(&config);
        let supervisor = ProcessSupervisor::new(config, client);
        let rx = supervisor.subscribe();

        let _ = supervisor.start(Path::new("/tmp")).await;
        assert_eq!(*rx.borrow(), ReadyState::Failed);
    }
}
