//! Abstract capability surface of the host editor.
//!
//! The orchestration layer never touches a concrete UI toolkit. Everything
//! it needs from the host -- transactional text edits, notifications, a
//! status indicator, and a two-way panel protocol -- is expressed here as
//! plain traits and typed messages.

use std::ops::Range;
use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::backend::supervisor::ReadyState;
use crate::errors::ApplyError;
use crate::models::AnalysisStatus;

// ---------------------------------------------------------------------------
// Editor bridge
// ---------------------------------------------------------------------------

/// Severity of a transient notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Warning,
    Error,
}

/// Data behind the persistent status indicator.
#[derive(Debug, Clone)]
pub struct StatusSummary {
    pub backend: ReadyState,
    pub analysis: AnalysisStatus,
    pub conflict_count: usize,
}

impl std::fmt::Display for StatusSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "backend {} | analysis {} | {} conflict{}",
            self.backend,
            self.analysis,
            self.conflict_count,
            if self.conflict_count == 1 { "" } else { "s" }
        )
    }
}

/// Host-editor capabilities the orchestration layer depends on.
///
/// `replace_lines` must be transactional: either the whole edit is applied
/// and persisted, or none of it is.
#[async_trait]
pub trait EditorBridge: Send + Sync {
    /// Replace `lines` (0-based, half-open) of `file` with `text` and
    /// persist the document.
    async fn replace_lines(
        &self,
        file: &Path,
        lines: Range<usize>,
        text: &str,
    ) -> Result<(), ApplyError>;

    /// Show a transient, non-blocking notification.
    fn notify(&self, level: NoticeLevel, message: &str);

    /// Update the persistent status indicator.
    fn set_status(&self, summary: &StatusSummary);
}

// ---------------------------------------------------------------------------
// Panel protocol
// ---------------------------------------------------------------------------

/// Requests from the interactive panel to the orchestration layer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PanelRequest {
    /// Ask for a resolution suggestion for one conflict.
    Suggest { conflict_id: String },
    /// Apply a previously delivered suggestion.
    Apply {
        conflict_id: String,
        suggestion: String,
    },
    /// Re-run the analysis.
    Refresh,
}

/// Events from the orchestration layer to the panel.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PanelEvent {
    SuggestionDelivered {
        conflict_id: String,
        suggestion: String,
    },
    SuggestionFailed {
        conflict_id: String,
        detail: String,
    },
    ResolutionApplied {
        conflict_id: String,
        file: String,
    },
    ApplyFailed {
        conflict_id: String,
        detail: String,
    },
    ConflictsUpdated {
        count: usize,
    },
    AnalysisFailed {
        detail: String,
    },
}

// ---------------------------------------------------------------------------
// Line splicing
// ---------------------------------------------------------------------------

/// Replace `lines` (0-based, half-open) of `original` with `replacement`.
///
/// `replacement` is treated as newline-terminated; output lines always end
/// with `\n`. Used by bridge implementations that edit whole documents.
pub fn splice_lines(
    file: &str,
    original: &str,
    lines: Range<usize>,
    replacement: &str,
) -> Result<String, ApplyError> {
    let all: Vec<&str> = original.lines().collect();
    if lines.end > all.len() {
        return Err(ApplyError::RangeOutOfBounds {
            file: file.to_string(),
            actual_lines: all.len(),
            line_start: lines.start as u32 + 1,
            line_end: lines.end as u32,
        });
    }

    let mut out = String::with_capacity(original.len() + replacement.len());
    for line in &all[..lines.start] {
        out.push_str(line);
        out.push('\n');
    }
    out.push_str(replacement);
    if !replacement.ends_with('\n') {
        out.push('\n');
    }
    for line in &all[lines.end..] {
        out.push_str(line);
        out.push('\n');
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn numbered(n: usize) -> String {
        (1..=n).map(|i| format!("line {i}\n")).collect()
    }

    #[test]
    fn test_splice_replaces_exact_lines() {
        let original = numbered(15);
        // Conflict lines 10..=12 (1-based) -> 9..12 (0-based half-open).
        let result = splice_lines("a.ts", &original, 9..12, "merged\n").unwrap();
        let lines: Vec<&str> = result.lines().collect();
        assert_eq!(lines.len(), 13);
        assert_eq!(lines[8], "line 9");
        assert_eq!(lines[9], "merged");
        assert_eq!(lines[10], "line 13");
        assert_eq!(lines[12], "line 15");
    }

    #[test]
    fn test_splice_appends_missing_newline() {
        let result = splice_lines("a.ts", "one\ntwo\n", 0..1, "uno").unwrap();
        assert_eq!(result, "uno\ntwo\n");
    }

    #[test]
    fn test_splice_out_of_bounds() {
        let result = splice_lines("a.ts", "one\ntwo\n", 1..5, "x\n");
        assert!(matches!(
            result,
            Err(ApplyError::RangeOutOfBounds {
                actual_lines: 2,
                ..
            })
        ));
    }

    #[test]
    fn test_panel_message_wire_format() {
        let req = PanelRequest::Suggest {
            conflict_id: "c1".into(),
        };
        let value = serde_json::to_value(&req).unwrap();
        assert_eq!(value["type"], "suggest");
        assert_eq!(value["conflict_id"], "c1");

        let event: PanelEvent = serde_json::from_str(
            r#"{"type":"conflicts_updated","count":3}"#,
        )
        .unwrap();
        assert_eq!(event, PanelEvent::ConflictsUpdated { count: 3 });
    }

    #[test]
    fn test_status_summary_display() {
        let summary = StatusSummary {
            backend: ReadyState::Ready,
            analysis: AnalysisStatus::Idle,
            conflict_count: 1,
        };
        assert_eq!(summary.to_string(), "backend ready | analysis idle | 1 conflict");
    }
}
