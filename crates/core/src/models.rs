//! Domain model types shared across the GitTracker orchestration layer.
//!
//! These types mirror the analysis service's JSON wire format (camelCase for
//! the line-range fields) and carry no host-editor types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Conflict
// ---------------------------------------------------------------------------

/// A detected region of overlapping change between two branches in one file.
///
/// Immutable once produced by an analysis run; a full run replaces the whole
/// set. `id` is unique within one registry snapshot but is recomputed across
/// runs -- consumers must not assume identifier stability between analyses.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Conflict {
    /// Derived identifier, stable within a snapshot.
    #[serde(default)]
    pub id: String,
    /// File path, relative to the workspace root.
    pub file: String,
    /// First branch involved.
    pub branch1: String,
    /// Second branch involved.
    pub branch2: String,
    /// First conflicting line, 1-based inclusive.
    #[serde(rename = "lineStart")]
    pub line_start: u32,
    /// Last conflicting line, 1-based inclusive.
    #[serde(rename = "lineEnd")]
    pub line_end: u32,
    /// Content of the region on `branch1`.
    pub content1: String,
    /// Content of the region on `branch2`.
    pub content2: String,
}

impl Conflict {
    /// Create a conflict with its identifier derived from the key fields.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        file: impl Into<String>,
        branch1: impl Into<String>,
        branch2: impl Into<String>,
        line_start: u32,
        line_end: u32,
        content1: impl Into<String>,
        content2: impl Into<String>,
    ) -> Self {
        let mut conflict = Self {
            id: String::new(),
            file: file.into(),
            branch1: branch1.into(),
            branch2: branch2.into(),
            line_start,
            line_end,
            content1: content1.into(),
            content2: content2.into(),
        };
        conflict.id = conflict.derived_id();
        conflict
    }

    /// The identifier scheme used by the analysis service:
    /// `file:branch1:branch2:lineStart:lineEnd`.
    pub fn derived_id(&self) -> String {
        format!(
            "{}:{}:{}:{}:{}",
            self.file, self.branch1, self.branch2, self.line_start, self.line_end
        )
    }

    /// Fill in `id` if the service omitted it.
    pub fn ensure_id(&mut self) {
        if self.id.is_empty() {
            self.id = self.derived_id();
        }
    }
}

// ---------------------------------------------------------------------------
// Repository state (supplemental analysis payload)
// ---------------------------------------------------------------------------

/// Summary of a git branch as reported by the analysis service.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BranchInfo {
    pub name: String,
    #[serde(default)]
    pub tracking: Option<String>,
    #[serde(default)]
    pub last_commit: Option<String>,
    #[serde(default)]
    pub last_commit_date: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
}

/// Repository-wide state returned by a full analysis.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RepositoryState {
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub current_branch: Option<String>,
    #[serde(default)]
    pub branches: Vec<BranchInfo>,
    #[serde(default)]
    pub conflicts: Vec<Conflict>,
    #[serde(default)]
    pub last_analyzed: Option<String>,
}

// ---------------------------------------------------------------------------
// Analysis run status
// ---------------------------------------------------------------------------

/// Status of the (at most one) analysis run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisStatus {
    Idle,
    Running,
    Succeeded,
    Failed,
}

impl std::fmt::Display for AnalysisStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Running => write!(f, "running"),
            Self::Succeeded => write!(f, "succeeded"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

// ---------------------------------------------------------------------------
// Suggestion protocol
// ---------------------------------------------------------------------------

/// Status of a suggestion request for one conflict.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SuggestionStatus {
    /// Sent, awaiting a response.
    Pending,
    /// Response arrived and was the latest request for its conflict.
    Delivered,
    /// Superseded by a newer request; its eventual response is discarded.
    Stale,
    /// The request errored. A retry issues a fresh request.
    Failed,
}

impl std::fmt::Display for SuggestionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Delivered => write!(f, "delivered"),
            Self::Stale => write!(f, "stale"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// A tracked suggestion request, keyed by conflict ID.
#[derive(Debug, Clone)]
pub struct SuggestionRequest {
    pub conflict_id: String,
    /// Monotonic sequence; only the newest sequence for a conflict may
    /// deliver.
    pub seq: u64,
    pub requested_at: DateTime<Utc>,
    pub status: SuggestionStatus,
}

// ---------------------------------------------------------------------------
// Applied resolution
// ---------------------------------------------------------------------------

/// Ephemeral record of a successful apply, used to drive the post-apply
/// re-analysis. Not persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedResolution {
    pub conflict_id: String,
    pub target_file: String,
    /// Replaced span as 0-based half-open line indices.
    pub replaced_lines: std::ops::Range<usize>,
    pub inserted_text: String,
}
