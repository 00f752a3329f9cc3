//! Filesystem-backed editor bridge.
//!
//! The daemon has no interactive editor, so resolutions are applied straight
//! to files on disk. Writes go through a temp file in the target's directory
//! and a rename, so a partially-written document is never observable. The
//! notification and status hooks map onto the log.

use std::io::Write;
use std::ops::Range;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::{error, info, warn};

use gittracker_core::editor::{EditorBridge, NoticeLevel, StatusSummary};
use gittracker_core::errors::ApplyError;

/// Applies line edits directly to workspace files.
pub struct FsEditor {
    workspace: PathBuf,
}

impl FsEditor {
    pub fn new(workspace: impl Into<PathBuf>) -> Self {
        Self {
            workspace: workspace.into(),
        }
    }

    fn resolve(&self, file: &Path) -> PathBuf {
        if file.is_absolute() {
            file.to_path_buf()
        } else {
            self.workspace.join(file)
        }
    }
}

#[async_trait]
impl EditorBridge for FsEditor {
    async fn replace_lines(
        &self,
        file: &Path,
        lines: Range<usize>,
        text: &str,
    ) -> Result<(), ApplyError> {
        let path = self.resolve(file);
        let original = std::fs::read_to_string(&path)?;
        let updated = gittracker_core::editor::splice_lines(
            &file.display().to_string(),
            &original,
            lines,
            text,
        )?;

        let dir = path.parent().unwrap_or(Path::new("."));
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        tmp.write_all(updated.as_bytes())?;
        tmp.persist(&path).map_err(|e| ApplyError::IoError(e.error))?;
        info!(file = %path.display(), "wrote resolved file");
        Ok(())
    }

    fn notify(&self, level: NoticeLevel, message: &str) {
        match level {
            NoticeLevel::Info => info!("{message}"),
            NoticeLevel::Warning => warn!("{message}"),
            NoticeLevel::Error => error!("{message}"),
        }
    }

    fn set_status(&self, summary: &StatusSummary) {
        info!(status = %summary, "status updated");
    }
}
