//! HTTP client for the analysis service.
//!
//! All requests and responses are JSON against a configurable local
//! endpoint. Every request carries an explicit timeout; there is no retry
//! logic here -- callers decide whether a failure is retried.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::errors::BackendError;
use crate::models::{BranchInfo, Conflict, RepositoryState};

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct StatusResponse {
    status: String,
}

#[derive(Debug, Deserialize)]
struct ConflictsResponse {
    #[serde(default)]
    conflicts: Vec<Conflict>,
}

#[derive(Debug, Deserialize)]
struct SuggestResponse {
    suggestion: String,
}

#[derive(Debug, Serialize)]
struct AnalyzeRequest<'a> {
    workspace: &'a str,
}

#[derive(Debug, Serialize)]
struct SuggestRequest<'a> {
    conflict: &'a Conflict,
}

/// Result of a full analysis run: the conflict set plus branch summaries.
#[derive(Debug, Clone, Default)]
pub struct AnalysisResult {
    pub conflicts: Vec<Conflict>,
    pub branches: Vec<BranchInfo>,
    pub current_branch: Option<String>,
}

/// Full-text contents of one file on two branches, for a two-way diff view.
#[derive(Debug, Clone, Deserialize)]
pub struct CompareResult {
    pub content1: String,
    pub content2: String,
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Asynchronous client for the analysis service's REST API.
#[derive(Clone)]
pub struct BackendClient {
    http: reqwest::Client,
    base_url: String,
}

impl BackendClient {
    /// Build a client for `base_url` with a per-request `timeout`.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, BackendError> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        info!(base_url = %base_url, timeout_secs = timeout.as_secs(), "created BackendClient");
        Ok(Self { http, base_url })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// `GET /status` -- readiness probe. True iff the service answers with
    /// `status == "ready"`.
    #[instrument(skip(self))]
    pub async fn probe_ready(&self) -> Result<bool, BackendError> {
        let resp = self.http.get(self.url("/status")).send().await?;
        let resp = check_response(resp).await?;
        let status: StatusResponse = decode(resp).await?;
        debug!(status = %status.status, "probed backend status");
        Ok(status.status == "ready")
    }

    /// `POST /analyze` -- run a full analysis of `workspace`. The service
    /// replies with the full repository state; the conflict set and branch
    /// summaries are what the orchestration layer keeps.
    #[instrument(skip(self))]
    pub async fn analyze(&self, workspace: &Path) -> Result<AnalysisResult, BackendError> {
        let workspace = workspace.display().to_string();
        let body = AnalyzeRequest {
            workspace: &workspace,
        };
        let resp = self
            .http
            .post(self.url("/analyze"))
            .json(&body)
            .send()
            .await?;
        let resp = check_response(resp).await?;
        let mut state: RepositoryState = decode(resp).await?;
        for conflict in &mut state.conflicts {
            conflict.ensure_id();
        }
        debug!(
            conflicts = state.conflicts.len(),
            branches = state.branches.len(),
            "analysis completed"
        );
        Ok(AnalysisResult {
            conflicts: state.conflicts,
            branches: state.branches,
            current_branch: state.current_branch,
        })
    }

    /// `GET /conflicts` -- last-known results without re-analyzing.
    #[instrument(skip(self))]
    pub async fn conflicts(&self) -> Result<Vec<Conflict>, BackendError> {
        let resp = self.http.get(self.url("/conflicts")).send().await?;
        let resp = check_response(resp).await?;
        let mut parsed: ConflictsResponse = decode(resp).await?;
        for conflict in &mut parsed.conflicts {
            conflict.ensure_id();
        }
        debug!(count = parsed.conflicts.len(), "fetched cached conflicts");
        Ok(parsed.conflicts)
    }

    /// `GET /compare` -- full file contents on two branches.
    #[instrument(skip(self))]
    pub async fn compare(
        &self,
        branch1: &str,
        branch2: &str,
        file: &str,
    ) -> Result<CompareResult, BackendError> {
        let resp = self
            .http
            .get(self.url("/compare"))
            .query(&[("branch1", branch1), ("branch2", branch2), ("file", file)])
            .send()
            .await?;
        let resp = check_response(resp).await?;
        let compared: CompareResult = decode(resp).await?;
        debug!(branch1, branch2, file, "fetched branch contents for compare");
        Ok(compared)
    }

    /// `GET /file-conflicts` -- conflicts scoped to one file.
    #[instrument(skip(self))]
    pub async fn file_conflicts(&self, file: &str) -> Result<Vec<Conflict>, BackendError> {
        let resp = self
            .http
            .get(self.url("/file-conflicts"))
            .query(&[("file", file)])
            .send()
            .await?;
        let resp = check_response(resp).await?;
        let mut parsed: ConflictsResponse = decode(resp).await?;
        for conflict in &mut parsed.conflicts {
            conflict.ensure_id();
        }
        debug!(file, count = parsed.conflicts.len(), "fetched file conflicts");
        Ok(parsed.conflicts)
    }

    /// `POST /suggest-resolution` -- ask the service for a merged version of
    /// the conflicting region.
    #[instrument(skip(self, conflict), fields(conflict_id = %conflict.id))]
    pub async fn suggest_resolution(&self, conflict: &Conflict) -> Result<String, BackendError> {
        let body = SuggestRequest { conflict };
        let resp = self
            .http
            .post(self.url("/suggest-resolution"))
            .json(&body)
            .send()
            .await?;
        let resp = check_response(resp).await?;
        let parsed: SuggestResponse = decode(resp).await?;
        debug!(
            suggestion_len = parsed.suggestion.len(),
            "received resolution suggestion"
        );
        Ok(parsed.suggestion)
    }
}

/// Cap on how much of an error body is carried into the error message.
const ERROR_BODY_LIMIT: usize = 256;

/// Map a non-success response to [`BackendError::ApiError`], carrying a
/// truncated copy of the server's error body.
async fn check_response(resp: reqwest::Response) -> Result<reqwest::Response, BackendError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = match resp.text().await {
        Ok(text) if !text.is_empty() => text.chars().take(ERROR_BODY_LIMIT).collect(),
        _ => format!("HTTP {status}"),
    };
    Err(BackendError::ApiError {
        status: status.as_u16(),
        body,
    })
}

/// Decode a JSON body, mapping decode failures to [`BackendError::ParseError`]
/// instead of folding them into the transport error.
async fn decode<T: serde::de::DeserializeOwned>(
    resp: reqwest::Response,
) -> Result<T, BackendError> {
    resp.json()
        .await
        .map_err(|e| BackendError::ParseError(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let client =
            BackendClient::new("http://127.0.0.1:5000/", Duration::from_secs(5)).unwrap();
        assert_eq!(client.url("/status"), "http://127.0.0.1:5000/status");
    }

    #[test]
    fn test_analyze_response_fills_missing_ids() {
        let json = r#"{
            "conflicts": [{
                "file": "a.ts", "branch1": "main", "branch2": "dev",
                "lineStart": 1, "lineEnd": 2, "content1": "x", "content2": "y"
            }],
            "current_branch": "main"
        }"#;
        let mut state: RepositoryState = serde_json::from_str(json).unwrap();
        for c in &mut state.conflicts {
            c.ensure_id();
        }
        assert_eq!(state.conflicts[0].id, "a.ts:main:dev:1:2");
        assert_eq!(state.current_branch.as_deref(), Some("main"));
        assert!(state.branches.is_empty());
    }

    #[test]
    fn test_suggest_request_wire_shape() {
        let conflict = Conflict::new("a.ts", "main", "dev", 1, 2, "x", "y");
        let body = SuggestRequest {
            conflict: &conflict,
        };
        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(value["conflict"]["lineStart"], 1);
        assert_eq!(value["conflict"]["file"], "a.ts");
    }
}
