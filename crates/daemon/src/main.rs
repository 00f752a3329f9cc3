//! GitTracker daemon entry point.
//!
//! Loads configuration, starts the analysis backend, runs the periodic
//! analysis scheduler against a workspace, and handles graceful shutdown.

mod fs_editor;
mod signals;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use gittracker_core::config::AppConfig;
use gittracker_core::editor::{EditorBridge, NoticeLevel, PanelEvent};
use gittracker_core::session::TrackerSession;

use fs_editor::FsEditor;

// ---------------------------------------------------------------------------
// CLI arguments
// ---------------------------------------------------------------------------

/// GitTracker headless analysis daemon.
#[derive(Parser, Debug)]
#[command(
    name = "gittracker-daemon",
    version,
    about = "Periodic git conflict analysis daemon"
)]
struct Args {
    /// Path to the TOML configuration file. Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Workspace (git repository) to analyze.
    #[arg(short, long)]
    workspace: PathBuf,

    /// Override the log level from the config file (trace, debug, info, warn, error).
    #[arg(long)]
    log_level: Option<String>,
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Load configuration
    let config = match args.config {
        Some(ref path) => {
            AppConfig::load_and_validate(path).context("failed to load configuration file")?
        }
        None => AppConfig::default(),
    };

    // Initialize tracing
    let log_level = args
        .log_level
        .as_deref()
        .unwrap_or(&config.daemon.log_level);
    let filter = EnvFilter::try_new(log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .init();

    // Startup banner
    info!("========================================");
    info!("  GitTracker Daemon v{}", env!("CARGO_PKG_VERSION"));
    info!("========================================");
    info!("Workspace     : {}", args.workspace.display());
    info!("Backend URL   : {}", config.backend.server_url);
    info!("Frequency     : {}s", config.analysis.frequency_secs);
    info!("Log level     : {}", log_level);
    info!("========================================");

    let session = Arc::new(
        TrackerSession::new(&config, &args.workspace).context("failed to create session")?,
    );
    // All user-facing messages go through the editor bridge; the daemon's
    // bridge maps them onto the log and applies edits straight to disk.
    let editor = Arc::new(FsEditor::new(&args.workspace));

    // Backend startup is non-fatal; the scheduler rejects runs until a later
    // restart succeeds, and every rejection is logged.
    if let Err(e) = session.start_backend().await {
        editor.notify(
            NoticeLevel::Error,
            &format!("analysis backend failed to start: {e}"),
        );
    }

    // Pump suggestion outcomes into panel events; the daemon has no panel,
    // so they land in the log.
    let (panel_tx, mut panel_rx) = tokio::sync::mpsc::channel(32);
    {
        let session = session.clone();
        let editor = editor.clone();
        tokio::spawn(async move {
            session
                .pump_suggestion_events(editor.as_ref(), panel_tx)
                .await;
        });
    }
    tokio::spawn(async move {
        while let Some(event) = panel_rx.recv().await {
            match event {
                PanelEvent::SuggestionDelivered { conflict_id, .. } => {
                    info!(conflict_id = %conflict_id, "suggestion delivered");
                }
                PanelEvent::SuggestionFailed {
                    conflict_id,
                    detail,
                } => {
                    warn!(conflict_id = %conflict_id, detail = %detail, "suggestion failed");
                }
                other => info!(event = ?other, "panel event"),
            }
        }
    });

    // Run one analysis up front so the first results don't wait a full tick.
    match session.refresh().await {
        Ok(count) => info!(conflicts = count, "initial analysis complete"),
        Err(e) => editor.notify(NoticeLevel::Warning, &format!("initial analysis failed: {e}")),
    }
    editor.set_status(&session.status_summary());

    // Periodic scheduler with cooperative shutdown
    let shutdown = Arc::new(tokio::sync::Notify::new());
    let scheduler_shutdown = shutdown.clone();
    let scheduler_session = session.clone();
    let scheduler_handle = tokio::spawn(async move {
        scheduler_session.run_scheduler(scheduler_shutdown).await;
    });

    signals::wait_for_shutdown().await;
    info!("Shutdown signal received, stopping...");

    shutdown.notify_waiters();
    match tokio::time::timeout(std::time::Duration::from_secs(10), scheduler_handle).await {
        Ok(Ok(())) => info!("scheduler stopped gracefully"),
        Ok(Err(e)) => warn!("scheduler task error: {}", e),
        Err(_) => warn!("scheduler did not stop within 10s, forcing shutdown"),
    }

    session.stop_backend().await;
    info!("GitTracker daemon stopped.");
    Ok(())
}
