//! # dms-startup — Startup Orchestration & CLI
//!
//! Wires the schema pipeline into a process: reads configuration, builds
//! the schema source and providers, runs the ordered startup tasks, and
//! checks the backend fingerprint before the process may serve.
//!
//! ## Startup Sequence
//!
//! 1. **Load and Build Effective Schema** (order 100): load, validate,
//!    normalize, fingerprint, merge and publish.
//! 2. **Initialize Backend Mapping** (order 200): provision or verify the
//!    stored fingerprint against the one just computed.
//!
//! Tasks run one at a time in ascending order. The first failure aborts
//! the sequence; no later task runs.
//!
//! ## Crate Policy
//!
//! - Library code returns typed errors; only the binary uses `anyhow`.
//! - Cancellation is observed between tasks through a
//!   `tokio::sync::watch` receiver and is never reported as a failure.

pub mod backend;
pub mod commands;
pub mod config;
pub mod orchestrator;
pub mod tasks;

pub use backend::{BackendMappingError, BackendMappingInitializer, FingerprintFileStore, StoredFingerprint};
pub use config::{ConfigError, StartupConfig};
pub use orchestrator::{
    cancellation_channel, CancellationSignal, StartupError, StartupOrchestrator, StartupPhase,
    StartupTask, TaskError, TaskRecord,
};
pub use tasks::{BackendMappingInitializationTask, LoadAndBuildEffectiveSchemaTask};
