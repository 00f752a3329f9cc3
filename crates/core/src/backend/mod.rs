//! Interface to the external analysis service.
//!
//! The backend subsystem has two halves:
//! 1. **Supervision** -- spawning, probing, and stopping the service process.
//! 2. **Transport** -- the JSON-over-HTTP client the rest of the layer uses.

pub mod client;
pub mod supervisor;

pub use client::{BackendClient, CompareResult};
pub use supervisor::{ProcessSupervisor, ReadyState};
