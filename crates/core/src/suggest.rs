//! The suggestion request/response protocol, per conflict.
//!
//! State machine: `NoRequest -> Pending -> {Delivered, Failed}`, with
//! `Pending -> Stale` when a newer request for the same conflict supersedes
//! it. There is no in-flight cancellation; a stale response is simply
//! discarded on arrival. Requests are issued as detached tasks -- the
//! invocation that fires a request and the one that consumes its result are
//! different, connected only by the event channel.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use chrono::Utc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::backend::client::BackendClient;
use crate::editor::EditorBridge;
use crate::errors::{ApplyError, SuggestionError};
use crate::models::{AppliedResolution, Conflict, SuggestionRequest, SuggestionStatus};
use crate::scheduler::AnalysisScheduler;

/// Delivery-side events, consumed by the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SuggestionEvent {
    Delivered {
        conflict_id: String,
        suggestion: String,
    },
    Failed {
        conflict_id: String,
        detail: String,
    },
}

/// Correlates asynchronous suggestion requests and applies chosen
/// resolutions back into documents.
pub struct SuggestionCorrelator {
    client: BackendClient,
    scheduler: Arc<AnalysisScheduler>,
    workspace: PathBuf,
    /// Latest request per conflict ID. Older sequence numbers are stale.
    requests: Mutex<HashMap<String, SuggestionRequest>>,
    seq: AtomicU64,
    events_tx: mpsc::Sender<SuggestionEvent>,
}

impl SuggestionCorrelator {
    pub fn new(
        client: BackendClient,
        scheduler: Arc<AnalysisScheduler>,
        workspace: PathBuf,
        events_tx: mpsc::Sender<SuggestionEvent>,
    ) -> Self {
        Self {
            client,
            scheduler,
            workspace,
            requests: Mutex::new(HashMap::new()),
            seq: AtomicU64::new(0),
            events_tx,
        }
    }

    /// Current request state for a conflict, if any was ever issued.
    pub fn request_status(&self, conflict_id: &str) -> Option<SuggestionRequest> {
        self.requests
            .lock()
            .expect("correlator lock poisoned")
            .get(conflict_id)
            .cloned()
    }

    /// Issue a suggestion request for `conflict`.
    ///
    /// Any pending request for the same conflict is marked stale; its
    /// eventual response will be discarded. The returned sequence number
    /// identifies this request; delivery arrives on the event channel, not
    /// to this caller.
    pub fn request_suggestion(self: &Arc<Self>, conflict: Conflict) -> u64 {
        let seq = self.register_request(&conflict.id);
        info!(conflict_id = %conflict.id, seq, "requesting resolution suggestion");

        let this = Arc::clone(self);
        tokio::spawn(async move {
            let result = this
                .client
                .suggest_resolution(&conflict)
                .await
                .map_err(|e| e.to_string());
            this.on_response(&conflict.id, seq, result).await;
        });
        seq
    }

    /// Record a new pending request, superseding a prior pending one.
    fn register_request(&self, conflict_id: &str) -> u64 {
        let seq = self.seq.fetch_add(1, Ordering::SeqCst) + 1;
        let mut requests = self.requests.lock().expect("correlator lock poisoned");
        if let Some(prev) = requests.get_mut(conflict_id) {
            if prev.status == SuggestionStatus::Pending {
                debug!(conflict_id, superseded_seq = prev.seq, "marking prior request stale");
                prev.status = SuggestionStatus::Stale;
            }
        }
        requests.insert(
            conflict_id.to_string(),
            SuggestionRequest {
                conflict_id: conflict_id.to_string(),
                seq,
                requested_at: Utc::now(),
                status: SuggestionStatus::Pending,
            },
        );
        seq
    }

    /// Handle a response for request `seq`. Applied only if it is still the
    /// newest request for its conflict; otherwise discarded silently.
    async fn on_response(&self, conflict_id: &str, seq: u64, result: Result<String, String>) {
        let latest = {
            let mut requests = self.requests.lock().expect("correlator lock poisoned");
            match requests.get_mut(conflict_id) {
                Some(req) if req.seq == seq => {
                    req.status = if result.is_ok() {
                        SuggestionStatus::Delivered
                    } else {
                        SuggestionStatus::Failed
                    };
                    true
                }
                _ => false,
            }
        };
        if !latest {
            debug!(conflict_id, seq, "discarding stale suggestion response");
            return;
        }

        let event = match result {
            Ok(suggestion) => {
                info!(conflict_id, seq, "suggestion delivered");
                SuggestionEvent::Delivered {
                    conflict_id: conflict_id.to_string(),
                    suggestion,
                }
            }
            Err(detail) => {
                let err = SuggestionError::RequestFailed {
                    conflict_id: conflict_id.to_string(),
                    detail,
                };
                warn!(conflict_id, seq, error = %err, "suggestion request failed");
                SuggestionEvent::Failed {
                    conflict_id: conflict_id.to_string(),
                    detail: err.to_string(),
                }
            }
        };
        if self.events_tx.send(event).await.is_err() {
            debug!(conflict_id, "suggestion event receiver dropped");
        }
    }

    /// Apply `suggestion` over the conflict's original line range and
    /// trigger a fresh analysis.
    ///
    /// The conflict's 1-based inclusive `line_start..=line_end` becomes a
    /// 0-based half-open span; the suggestion is newline-terminated and the
    /// edit commits transactionally through the editor bridge. On success
    /// the registry is refreshed by re-analysis, never patched locally --
    /// resolving one conflict can shift the line numbers of others in the
    /// same file. An apply failure triggers no re-analysis.
    pub async fn apply_resolution(
        &self,
        conflict: &Conflict,
        suggestion: &str,
        editor: &dyn EditorBridge,
    ) -> Result<AppliedResolution, ApplyError> {
        if conflict.line_start == 0 || conflict.line_end < conflict.line_start {
            return Err(ApplyError::InvalidRange {
                file: conflict.file.clone(),
                line_start: conflict.line_start,
                line_end: conflict.line_end,
            });
        }

        let lines = (conflict.line_start as usize - 1)..(conflict.line_end as usize);
        let mut text = suggestion.to_string();
        if !text.ends_with('\n') {
            text.push('\n');
        }

        editor
            .replace_lines(Path::new(&conflict.file), lines.clone(), &text)
            .await?;
        info!(
            conflict_id = %conflict.id,
            file = %conflict.file,
            lines = ?lines,
            "resolution applied"
        );

        // Refresh from the authoritative detector; a failure here is
        // surfaced through the scheduler's own observables.
        if let Err(e) = self.scheduler.trigger_analysis(&self.workspace).await {
            warn!(error = %e, "post-apply re-analysis failed");
        }

        Ok(AppliedResolution {
            conflict_id: conflict.id.clone(),
            target_file: conflict.file.clone(),
            replaced_lines: lines,
            inserted_text: text,
        })
    }
}
