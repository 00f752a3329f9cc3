//! Error types for the GitTracker core library.
//!
//! Each subsystem has its own error type derived with `thiserror`, and a
//! top-level [`CoreError`] enum unifies them all for callers that want a
//! single error type. No error here is allowed to escape a component
//! boundary as a panic; callers convert them into notifications and status
//! indicators.

use thiserror::Error;

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

/// Unified error type for the entire core library.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error(transparent)]
    Analysis(#[from] AnalysisError),

    #[error(transparent)]
    Suggestion(#[from] SuggestionError),

    #[error(transparent)]
    Apply(#[from] ApplyError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

// ---------------------------------------------------------------------------
// Backend process / transport errors
// ---------------------------------------------------------------------------

/// Errors from the backend process supervisor and HTTP transport.
#[derive(Debug, Error)]
pub enum BackendError {
    /// The backend process failed to start or did not pass its readiness
    /// probe. Scheduling is disabled until a restart succeeds.
    #[error("backend unavailable: {0}")]
    Unavailable(String),

    /// Spawning the backend executable failed.
    #[error("failed to spawn backend process '{command}': {source}")]
    SpawnFailed {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// HTTP-level transport error (connection refused, timeout, TLS).
    #[error("backend HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    /// The backend returned a non-success status code.
    #[error("backend API error (HTTP {status}): {body}")]
    ApiError { status: u16, body: String },

    /// The backend response could not be decoded.
    #[error("backend response parse error: {0}")]
    ParseError(String),
}

// ---------------------------------------------------------------------------
// Analysis errors
// ---------------------------------------------------------------------------

/// Errors from the analysis scheduler.
///
/// A failed analysis never clears the conflict registry; the last good
/// snapshot is preserved.
#[derive(Debug, Error)]
pub enum AnalysisError {
    /// The supervisor reports the backend is not ready; the request was
    /// rejected before any network call.
    #[error("analysis rejected: backend is not ready ({state})")]
    BackendUnavailable { state: String },

    /// The `/analyze` request itself failed.
    #[error("analysis request failed: {0}")]
    RequestFailed(#[from] BackendError),

    /// An in-flight run this caller was waiting on failed.
    #[error("shared analysis run failed: {0}")]
    SharedRunFailed(String),
}

// ---------------------------------------------------------------------------
// Suggestion errors
// ---------------------------------------------------------------------------

/// Errors from the suggestion request/response protocol.
#[derive(Debug, Error)]
pub enum SuggestionError {
    /// The `/suggest-resolution` request failed. The caller may retry by
    /// issuing a new request, which supersedes this one.
    #[error("suggestion request failed for conflict '{conflict_id}': {detail}")]
    RequestFailed { conflict_id: String, detail: String },

    /// No conflict with this ID exists in the current registry snapshot.
    #[error("conflict not found: {0}")]
    ConflictNotFound(String),
}

// ---------------------------------------------------------------------------
// Apply errors
// ---------------------------------------------------------------------------

/// Errors from applying a chosen resolution to a document.
///
/// An apply failure leaves both the document and the conflict registry
/// untouched, and does not trigger a re-analysis.
#[derive(Debug, Error)]
pub enum ApplyError {
    /// The conflict's line range is not valid (`line_start` must be >= 1 and
    /// `line_end` >= `line_start`).
    #[error("invalid line range {line_start}..={line_end} for '{file}'")]
    InvalidRange {
        file: String,
        line_start: u32,
        line_end: u32,
    },

    /// The target document does not contain the conflict's line range.
    #[error("'{file}' has {actual_lines} lines, cannot replace lines {line_start}..={line_end}")]
    RangeOutOfBounds {
        file: String,
        actual_lines: usize,
        line_start: u32,
        line_end: u32,
    },

    /// The host editor rejected the edit; nothing was applied.
    #[error("edit rejected for '{file}': {detail}")]
    EditRejected { file: String, detail: String },

    /// I/O failure while committing the edit.
    #[error("apply I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

/// Errors from configuration loading and validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file not found.
    #[error("configuration file not found: {0}")]
    FileNotFound(String),

    /// TOML parse error.
    #[error("configuration parse error: {0}")]
    ParseError(String),

    /// A config value is invalid.
    #[error("invalid configuration value for '{field}': {detail}")]
    InvalidValue { field: String, detail: String },

    /// Generic I/O error reading the config file.
    #[error("configuration I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_messages() {
        let err = BackendError::Unavailable("probe failed".into());
        assert_eq!(err.to_string(), "backend unavailable: probe failed");

        let err = AnalysisError::BackendUnavailable {
            state: "failed".into(),
        };
        assert!(err.to_string().contains("not ready"));

        let err = ApplyError::RangeOutOfBounds {
            file: "a.ts".into(),
            actual_lines: 3,
            line_start: 10,
            line_end: 12,
        };
        assert!(err.to_string().contains("a.ts"));
        assert!(err.to_string().contains("10..=12"));

        let err = SuggestionError::ConflictNotFound("c1".into());
        assert_eq!(err.to_string(), "conflict not found: c1");
    }

    #[test]
    fn test_core_error_from_subsystem() {
        let backend_err = BackendError::Unavailable("spawn".into());
        let core_err: CoreError = backend_err.into();
        assert!(matches!(core_err, CoreError::Backend(_)));

        let apply_err = ApplyError::InvalidRange {
            file: "x".into(),
            line_start: 2,
            line_end: 1,
        };
        let core_err: CoreError = apply_err.into();
        assert!(matches!(core_err, CoreError::Apply(_)));
    }
}
