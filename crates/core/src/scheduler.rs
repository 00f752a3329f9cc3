//! Analysis scheduling with single-flight de-duplication.
//!
//! At most one analysis run is in flight at any instant. A concurrent
//! trigger does not queue a second request; it awaits the in-flight run's
//! outcome on a watch channel. The periodic timer re-arms only after a run
//! completes, so a slow analysis can never overlap the next tick.

use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{watch, Notify};
use tokio::time;
use tracing::{error, info, warn};

use crate::backend::client::BackendClient;
use crate::backend::supervisor::ProcessSupervisor;
use crate::errors::AnalysisError;
use crate::models::{AnalysisStatus, BranchInfo};
use crate::registry::ConflictRegistry;

// ---------------------------------------------------------------------------
// Run outcome
// ---------------------------------------------------------------------------

/// Completed-run summary broadcast to concurrent callers.
#[derive(Debug, Clone)]
pub struct AnalysisOutcome {
    pub run: u64,
    /// Conflict count on success, error text on failure.
    pub result: Result<usize, String>,
}

/// Branch summaries captured from the most recent successful analysis.
#[derive(Debug, Clone, Default)]
pub struct RepoOverview {
    pub branches: Vec<BranchInfo>,
    pub current_branch: Option<String>,
    pub last_analyzed: Option<DateTime<Utc>>,
}

// ---------------------------------------------------------------------------
// Scheduler
// ---------------------------------------------------------------------------

/// Triggers analysis runs on demand and on a timer, serializing attempts.
pub struct AnalysisScheduler {
    client: BackendClient,
    supervisor: Arc<ProcessSupervisor>,
    registry: Arc<ConflictRegistry>,
    frequency: Duration,
    /// Single-flight guard.
    running: AtomicBool,
    runs: AtomicU64,
    status: RwLock<AnalysisStatus>,
    last_error: RwLock<Option<String>>,
    overview: RwLock<RepoOverview>,
    outcome_tx: watch::Sender<Option<AnalysisOutcome>>,
}

impl AnalysisScheduler {
    pub fn new(
        client: BackendClient,
        supervisor: Arc<ProcessSupervisor>,
        registry: Arc<ConflictRegistry>,
        frequency: Duration,
    ) -> Self {
        let (outcome_tx, _) = watch::channel(None);
        Self {
            client,
            supervisor,
            registry,
            frequency,
            running: AtomicBool::new(false),
            runs: AtomicU64::new(0),
            status: RwLock::new(AnalysisStatus::Idle),
            last_error: RwLock::new(None),
            overview: RwLock::new(RepoOverview::default()),
            outcome_tx,
        }
    }

    /// Current run status. `Running` while a run is in flight, `Idle`
    /// otherwise; the last failure stays observable via [`Self::last_error`].
    pub fn status(&self) -> AnalysisStatus {
        self.status.read().expect("scheduler lock poisoned").clone()
    }

    /// Error text of the most recent failed run, cleared by a success.
    pub fn last_error(&self) -> Option<String> {
        self.last_error
            .read()
            .expect("scheduler lock poisoned")
            .clone()
    }

    /// Branch summaries from the last successful analysis.
    pub fn overview(&self) -> RepoOverview {
        self.overview
            .read()
            .expect("scheduler lock poisoned")
            .clone()
    }

    /// Completed-run count.
    pub fn runs(&self) -> u64 {
        self.runs.load(Ordering::SeqCst)
    }

    /// Trigger an analysis of `workspace`.
    ///
    /// Returns the number of detected conflicts. If a run is already in
    /// flight, this call shares its outcome instead of starting another
    /// request. When the backend is not ready the call fails fast without
    /// touching the network, and the existing registry contents stay intact.
    pub async fn trigger_analysis(&self, workspace: &Path) -> Result<usize, AnalysisError> {
        if !self.supervisor.is_ready() {
            return Err(AnalysisError::BackendUnavailable {
                state: self.supervisor.state().to_string(),
            });
        }

        // Subscribe before the guard so a run completing between the failed
        // compare-exchange and the await below cannot be missed.
        let mut outcome_rx = self.outcome_tx.subscribe();
        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            outcome_rx
                .changed()
                .await
                .map_err(|_| AnalysisError::SharedRunFailed("scheduler shut down".into()))?;
            let outcome = outcome_rx
                .borrow()
                .clone()
                .ok_or_else(|| AnalysisError::SharedRunFailed("no outcome recorded".into()))?;
            return match outcome.result {
                Ok(count) => Ok(count),
                Err(detail) => Err(AnalysisError::SharedRunFailed(detail)),
            };
        }

        let run = self.runs.fetch_add(1, Ordering::SeqCst) + 1;
        *self.status.write().expect("scheduler lock poisoned") = AnalysisStatus::Running;
        info!(run, workspace = %workspace.display(), "starting analysis run");

        let result = match self.client.analyze(workspace).await {
            Ok(analysis) => {
                let count = analysis.conflicts.len();
                self.registry.replace(analysis.conflicts);
                *self.overview.write().expect("scheduler lock poisoned") = RepoOverview {
                    branches: analysis.branches,
                    current_branch: analysis.current_branch,
                    last_analyzed: Some(Utc::now()),
                };
                *self.status.write().expect("scheduler lock poisoned") =
                    AnalysisStatus::Succeeded;
                *self.last_error.write().expect("scheduler lock poisoned") = None;
                info!(run, conflicts = count, "analysis run succeeded");
                Ok(count)
            }
            Err(e) => {
                // Fail soft: the last good registry snapshot is preserved.
                let detail = e.to_string();
                *self.status.write().expect("scheduler lock poisoned") = AnalysisStatus::Failed;
                *self.last_error.write().expect("scheduler lock poisoned") =
                    Some(detail.clone());
                error!(run, error = %detail, "analysis run failed");
                Err(AnalysisError::RequestFailed(e))
            }
        };

        // Terminal status is transient; the scheduler rests at Idle with the
        // failure observable through last_error. The Idle write must precede
        // the guard release: once the guard drops, a new run may set Running,
        // and a late Idle write would mask it.
        *self.status.write().expect("scheduler lock poisoned") = AnalysisStatus::Idle;
        // Release the guard before publishing so a waiter that lost the
        // guard is guaranteed to see this outcome.
        self.running.store(false, Ordering::SeqCst);
        let summary = AnalysisOutcome {
            run,
            result: result.as_ref().map(|c| *c).map_err(|e| e.to_string()),
        };
        let _ = self.outcome_tx.send(Some(summary));

        result
    }

    /// Periodic analysis loop.
    ///
    /// Sleeps `frequency` after each completed run (success or failure)
    /// rather than on a fixed wall-clock grid. Stops when `shutdown` is
    /// notified.
    pub async fn run(&self, workspace: &Path, shutdown: Arc<Notify>) {
        info!(
            frequency_secs = self.frequency.as_secs(),
            "analysis scheduler started"
        );
        loop {
            tokio::select! {
                _ = time::sleep(self.frequency) => {
                    if let Err(e) = self.trigger_analysis(workspace).await {
                        warn!(error = %e, "scheduled analysis skipped or failed");
                    }
                }
                _ = shutdown.notified() => {
                    info!("analysis scheduler stopping");
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BackendConfig;

    fn unreachable_setup() -> (Arc<ProcessSupervisor>, BackendClient, Arc<ConflictRegistry>) {
        let config = BackendConfig {
            server_url: "http://127.0.0.1:1".into(),
            ..BackendConfig::default()
        };
        let client =
            BackendClient::new(config.server_url.clone(), Duration::from_millis(200)).unwrap();
        let supervisor = Arc::new(ProcessSupervisor::new(config, client.clone()));
        (supervisor, client, Arc::new(ConflictRegistry::new()))
    }

    #[tokio::test]
    async fn test_trigger_fails_fast_when_backend_not_ready() {
        let (supervisor, client, registry) = unreachable_setup();
        let scheduler = AnalysisScheduler::new(
            client,
            supervisor,
            registry.clone(),
            Duration::from_secs(300),
        );

        let result = scheduler.trigger_analysis(Path::new("/tmp")).await;
        assert!(matches!(
            result,
            Err(AnalysisError::BackendUnavailable { .. })
        ));
        // No run was attempted, so no status churn and no registry change.
        assert_eq!(scheduler.runs(), 0);
        assert_eq!(scheduler.status(), AnalysisStatus::Idle);
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_initial_observables() {
        let (supervisor, client, registry) = unreachable_setup();
        let scheduler =
            AnalysisScheduler::new(client, supervisor, registry, Duration::from_secs(300));
        assert_eq!(scheduler.status(), AnalysisStatus::Idle);
        assert!(scheduler.last_error().is_none());
        assert!(scheduler.overview().last_analyzed.is_none());
    }
}
