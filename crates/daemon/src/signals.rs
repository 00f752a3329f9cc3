//! Shutdown signal handling.
//!
//! Resolves once SIGINT (Ctrl+C) or, on Unix, SIGTERM arrives, so the caller
//! can run its shutdown sequence.

use tracing::info;

#[cfg(unix)]
pub async fn wait_for_shutdown() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut term =
        signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
    tokio::select! {
        _ = tokio::signal::ctrl_c() => info!("received SIGINT (Ctrl+C)"),
        _ = term.recv() => info!("received SIGTERM"),
    }
}

#[cfg(not(unix))]
pub async fn wait_for_shutdown() {
    let _ = tokio::signal::ctrl_c().await;
    info!("received Ctrl+C");
}
