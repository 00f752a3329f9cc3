//! GitTracker core library.
//!
//! This crate provides the orchestration layer between a host editor and the
//! external git-conflict analysis service: backend process supervision and
//! transport, analysis scheduling, the conflict registry and its tree view,
//! and the suggestion request/apply protocol.

pub mod backend;
pub mod config;
pub mod editor;
pub mod errors;
pub mod models;
pub mod registry;
pub mod scheduler;
pub mod session;
pub mod suggest;
pub mod tree;

// Re-exports for convenience.
pub use backend::{BackendClient, ProcessSupervisor, ReadyState};
pub use config::AppConfig;
pub use editor::EditorBridge;
pub use errors::CoreError;
pub use registry::ConflictRegistry;
pub use scheduler::AnalysisScheduler;
pub use session::TrackerSession;
pub use suggest::SuggestionCorrelator;
