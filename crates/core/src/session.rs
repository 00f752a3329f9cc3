//! Per-workspace session wiring the supervisor, scheduler, registry, and
//! suggestion correlator together behind one handle.
//!
//! The session is the only type the host embedding needs to hold. Panel
//! requests enter through [`TrackerSession::handle_panel_request`]; every
//! failure leaves as a notification or panel event, never a panic.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tokio::sync::{mpsc, Notify};
use tracing::{info, warn};

use crate::backend::client::BackendClient;
use crate::backend::supervisor::ProcessSupervisor;
use crate::backend::CompareResult;
use crate::config::AppConfig;
use crate::editor::{EditorBridge, NoticeLevel, PanelEvent, PanelRequest, StatusSummary};
use crate::errors::{AnalysisError, BackendError, CoreError, SuggestionError};
use crate::models::Conflict;
use crate::registry::ConflictRegistry;
use crate::scheduler::AnalysisScheduler;
use crate::suggest::{SuggestionCorrelator, SuggestionEvent};

const SUGGESTION_EVENT_BUFFER: usize = 32;

/// One tracked workspace: the supervised backend, its conflict state, and
/// the request paths into it.
pub struct TrackerSession {
    workspace: PathBuf,
    client: BackendClient,
    supervisor: Arc<ProcessSupervisor>,
    registry: Arc<ConflictRegistry>,
    scheduler: Arc<AnalysisScheduler>,
    correlator: Arc<SuggestionCorrelator>,
    suggestion_events: Mutex<Option<mpsc::Receiver<SuggestionEvent>>>,
}

impl TrackerSession {
    /// Wire up a session for `workspace` from validated configuration.
    pub fn new(config: &AppConfig, workspace: impl Into<PathBuf>) -> Result<Self, CoreError> {
        let workspace = workspace.into();
        let client = BackendClient::new(
            config.backend.server_url.clone(),
            config.backend.request_timeout(),
        )?;
        let supervisor = Arc::new(ProcessSupervisor::new(
            config.backend.clone(),
            client.clone(),
        ));
        let registry = Arc::new(ConflictRegistry::new());
        let scheduler = Arc::new(AnalysisScheduler::new(
            client.clone(),
            supervisor.clone(),
            registry.clone(),
            config.analysis.frequency(),
        ));
        let (events_tx, events_rx) = mpsc::channel(SUGGESTION_EVENT_BUFFER);
        let correlator = Arc::new(SuggestionCorrelator::new(
            client.clone(),
            scheduler.clone(),
            workspace.clone(),
            events_tx,
        ));

        info!(workspace = %workspace.display(), "session created");
        Ok(Self {
            workspace,
            client,
            supervisor,
            registry,
            scheduler,
            correlator,
            suggestion_events: Mutex::new(Some(events_rx)),
        })
    }

    pub fn workspace(&self) -> &Path {
        &self.workspace
    }

    pub fn registry(&self) -> &Arc<ConflictRegistry> {
        &self.registry
    }

    pub fn supervisor(&self) -> &Arc<ProcessSupervisor> {
        &self.supervisor
    }

    pub fn scheduler(&self) -> &Arc<AnalysisScheduler> {
        &self.scheduler
    }

    /// Take the suggestion event receiver. Yields `Some` exactly once; the
    /// embedding either forwards these events itself or runs
    /// [`Self::pump_suggestion_events`], which consumes the receiver.
    pub fn take_suggestion_events(&self) -> Option<mpsc::Receiver<SuggestionEvent>> {
        self.suggestion_events
            .lock()
            .expect("session lock poisoned")
            .take()
    }

    /// Pump suggestion outcomes into panel events and notifications.
    ///
    /// Converts each [`SuggestionEvent`] into its `PanelEvent` counterpart,
    /// raising a warning notification for failures. Runs until the
    /// correlator closes the event channel or the panel receiver drops;
    /// returns immediately if the receiver was already taken.
    pub async fn pump_suggestion_events(
        &self,
        editor: &dyn EditorBridge,
        panel_tx: mpsc::Sender<PanelEvent>,
    ) {
        let Some(mut events) = self.take_suggestion_events() else {
            warn!("suggestion event receiver already taken, pump not started");
            return;
        };
        while let Some(event) = events.recv().await {
            let panel_event = match event {
                SuggestionEvent::Delivered {
                    conflict_id,
                    suggestion,
                } => PanelEvent::SuggestionDelivered {
                    conflict_id,
                    suggestion,
                },
                SuggestionEvent::Failed {
                    conflict_id,
                    detail,
                } => {
                    editor.notify(NoticeLevel::Warning, &detail);
                    PanelEvent::SuggestionFailed {
                        conflict_id,
                        detail,
                    }
                }
            };
            if panel_tx.send(panel_event).await.is_err() {
                break;
            }
        }
    }

    // -----------------------------------------------------------------------
    // Backend lifecycle
    // -----------------------------------------------------------------------

    /// Start the analysis backend and wait for readiness.
    pub async fn start_backend(&self) -> Result<(), BackendError> {
        self.supervisor.start(&self.workspace).await
    }

    pub async fn stop_backend(&self) {
        self.supervisor.stop().await;
    }

    /// Stop-then-start, used after a configuration change.
    pub async fn restart_backend(&self) -> Result<(), BackendError> {
        self.supervisor.restart(&self.workspace).await
    }

    // -----------------------------------------------------------------------
    // Analysis
    // -----------------------------------------------------------------------

    /// Trigger an analysis now. Shares an in-flight run if one exists.
    pub async fn refresh(&self) -> Result<usize, AnalysisError> {
        self.scheduler.trigger_analysis(&self.workspace).await
    }

    /// Drive the periodic analysis loop until `shutdown` is notified.
    pub async fn run_scheduler(&self, shutdown: Arc<Notify>) {
        self.scheduler.run(&self.workspace, shutdown).await;
    }

    // -----------------------------------------------------------------------
    // Read paths
    // -----------------------------------------------------------------------

    /// Full contents of `file` on two branches, for a diff view.
    pub async fn compare(
        &self,
        branch1: &str,
        branch2: &str,
        file: &str,
    ) -> Result<CompareResult, BackendError> {
        self.client.compare(branch1, branch2, file).await
    }

    /// Conflicts scoped to one file, fetched from the service.
    pub async fn file_conflicts(&self, file: &str) -> Result<Vec<Conflict>, BackendError> {
        self.client.file_conflicts(file).await
    }

    /// The service's last-known conflict set, without re-analyzing. Useful
    /// right after attach, before the first scheduled run.
    pub async fn cached_conflicts(&self) -> Result<Vec<Conflict>, BackendError> {
        self.client.conflicts().await
    }

    /// Snapshot of the observable state for the status indicator.
    pub fn status_summary(&self) -> StatusSummary {
        StatusSummary {
            backend: self.supervisor.state(),
            analysis: self.scheduler.status(),
            conflict_count: self.registry.len(),
        }
    }

    // -----------------------------------------------------------------------
    // Panel protocol
    // -----------------------------------------------------------------------

    /// Handle one request from the interactive panel.
    ///
    /// Returns the event to post back to the panel, if the request resolves
    /// synchronously. A `Suggest` request returns `None`; its outcome
    /// arrives later on the suggestion event channel.
    pub async fn handle_panel_request(
        &self,
        request: PanelRequest,
        editor: &dyn EditorBridge,
    ) -> Option<PanelEvent> {
        let event = match request {
            PanelRequest::Suggest { conflict_id } => match self.registry.get(&conflict_id) {
                Some(conflict) => {
                    self.correlator.request_suggestion(conflict);
                    None
                }
                None => {
                    let err = SuggestionError::ConflictNotFound(conflict_id.clone());
                    editor.notify(NoticeLevel::Warning, &err.to_string());
                    Some(PanelEvent::SuggestionFailed {
                        conflict_id,
                        detail: err.to_string(),
                    })
                }
            },
            PanelRequest::Apply {
                conflict_id,
                suggestion,
            } => match self.registry.get(&conflict_id) {
                Some(conflict) => {
                    match self
                        .correlator
                        .apply_resolution(&conflict, &suggestion, editor)
                        .await
                    {
                        Ok(applied) => {
                            editor.notify(
                                NoticeLevel::Info,
                                &format!("resolution applied to {}", applied.target_file),
                            );
                            Some(PanelEvent::ResolutionApplied {
                                conflict_id,
                                file: applied.target_file,
                            })
                        }
                        Err(e) => {
                            warn!(conflict_id = %conflict_id, error = %e, "apply failed");
                            editor.notify(NoticeLevel::Error, &e.to_string());
                            Some(PanelEvent::ApplyFailed {
                                conflict_id,
                                detail: e.to_string(),
                            })
                        }
                    }
                }
                None => {
                    let err = SuggestionError::ConflictNotFound(conflict_id.clone());
                    editor.notify(NoticeLevel::Warning, &err.to_string());
                    Some(PanelEvent::ApplyFailed {
                        conflict_id,
                        detail: err.to_string(),
                    })
                }
            },
            PanelRequest::Refresh => match self.refresh().await {
                Ok(count) => Some(PanelEvent::ConflictsUpdated { count }),
                Err(e) => {
                    warn!(error = %e, "panel-requested analysis failed");
                    editor.notify(NoticeLevel::Warning, &e.to_string());
                    Some(PanelEvent::AnalysisFailed {
                        detail: e.to_string(),
                    })
                }
            },
        };

        editor.set_status(&self.status_summary());
        event
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::supervisor::ReadyState;
    use crate::errors::ApplyError;
    use crate::models::AnalysisStatus;
    use async_trait::async_trait;
    use std::ops::Range;

    /// Records notifications; rejects every edit.
    struct RecordingEditor {
        notices: Mutex<Vec<(NoticeLevel, String)>>,
    }

    impl RecordingEditor {
        fn new() -> Self {
            Self {
                notices: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl EditorBridge for RecordingEditor {
        async fn replace_lines(
            &self,
            file: &Path,
            _lines: Range<usize>,
            _text: &str,
        ) -> Result<(), ApplyError> {
            Err(ApplyError::EditRejected {
                file: file.display().to_string(),
                detail: "read-only document".into(),
            })
        }

        fn notify(&self, level: NoticeLevel, message: &str) {
            self.notices
                .lock()
                .unwrap()
                .push((level, message.to_string()));
        }

        fn set_status(&self, _summary: &StatusSummary) {}
    }

    fn unreachable_session() -> TrackerSession {
        let mut config = AppConfig::default();
        config.backend.server_url = "http://127.0.0.1:1".into();
        config.backend.request_timeout_secs = 1;
        TrackerSession::new(&config, "/tmp/ws").unwrap()
    }

    #[tokio::test]
    async fn test_initial_status_summary() {
        let session = unreachable_session();
        let summary = session.status_summary();
        assert_eq!(summary.backend, ReadyState::Stopped);
        assert_eq!(summary.analysis, AnalysisStatus::Idle);
        assert_eq!(summary.conflict_count, 0);
    }

    #[tokio::test]
    async fn test_suggestion_events_taken_once() {
        let session = unreachable_session();
        assert!(session.take_suggestion_events().is_some());
        assert!(session.take_suggestion_events().is_none());
    }

    #[tokio::test]
    async fn test_refresh_fails_without_backend() {
        let session = unreachable_session();
        let editor = RecordingEditor::new();
        let event = session
            .handle_panel_request(PanelRequest::Refresh, &editor)
            .await;
        assert!(matches!(event, Some(PanelEvent::AnalysisFailed { .. })));
        assert_eq!(editor.notices.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_suggest_unknown_conflict() {
        let session = unreachable_session();
        let editor = RecordingEditor::new();
        let event = session
            .handle_panel_request(
                PanelRequest::Suggest {
                    conflict_id: "nope".into(),
                },
                &editor,
            )
            .await;
        assert!(matches!(
            event,
            Some(PanelEvent::SuggestionFailed { ref conflict_id, .. }) if conflict_id == "nope"
        ));
    }

    #[tokio::test]
    async fn test_suggestion_pump_converts_events() {
        let session = Arc::new(unreachable_session());
        session
            .registry()
            .replace(vec![Conflict::new("a.ts", "main", "dev", 1, 2, "l", "r")]);
        let editor = Arc::new(RecordingEditor::new());
        let (panel_tx, mut panel_rx) = mpsc::channel(8);

        let pump_session = session.clone();
        let pump_editor = editor.clone();
        tokio::spawn(async move {
            pump_session
                .pump_suggestion_events(pump_editor.as_ref(), panel_tx)
                .await;
        });

        // The backend is unreachable, so the request fails and the pump must
        // surface it as a panel event plus a warning notification.
        let immediate = session
            .handle_panel_request(
                PanelRequest::Suggest {
                    conflict_id: "a.ts:main:dev:1:2".into(),
                },
                editor.as_ref(),
            )
            .await;
        assert!(immediate.is_none());

        let panel_event = tokio::time::timeout(
            std::time::Duration::from_secs(5),
            panel_rx.recv(),
        )
        .await
        .expect("no panel event arrived")
        .unwrap();
        assert!(matches!(
            panel_event,
            PanelEvent::SuggestionFailed { ref conflict_id, .. }
                if conflict_id == "a.ts:main:dev:1:2"
        ));
        assert!(editor
            .notices
            .lock()
            .unwrap()
            .iter()
            .any(|(level, _)| *level == NoticeLevel::Warning));
    }

    #[tokio::test]
    async fn test_apply_rejected_edit_becomes_event_and_notice() {
        let session = unreachable_session();
        session
            .registry()
            .replace(vec![Conflict::new("a.ts", "main", "dev", 1, 2, "l", "r")]);
        let editor = RecordingEditor::new();

        let event = session
            .handle_panel_request(
                PanelRequest::Apply {
                    conflict_id: "a.ts:main:dev:1:2".into(),
                    suggestion: "merged".into(),
                },
                &editor,
            )
            .await;
        assert!(matches!(event, Some(PanelEvent::ApplyFailed { .. })));
        let notices = editor.notices.lock().unwrap();
        assert_eq!(notices[0].0, NoticeLevel::Error);
        assert!(notices[0].1.contains("read-only"));
    }
}
