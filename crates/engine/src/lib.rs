//! # Hookwarden Engine
//!
//! Scope resolution and hook script lifecycle for hookwarden.
//!
//! This crate turns host events into exactly one installed hook script per
//! (hook kind, repository):
//!
//! - **Resolver**: picks the authoritative scope (repository, project or global)
//! - **Lifecycle**: idempotent install and uninstall of artifacts behind script records
//! - **Coordinator**: the event state machine, with project and global fan-out
//! - **Rebuild**: paged bulk rebuild with a pollable progress handle
//! - **Startup**: launch barrier and the run-once-per-cluster startup job
//! - **State**: redb-backed record store, plus in-memory fakes for tests

pub mod artifacts;
pub mod coordinator;
pub mod database;
pub mod environment;
pub mod lifecycle;
pub mod memory;
pub mod privilege;
pub mod rebuild;
pub mod records;
pub mod resolver;
pub mod startup;
pub mod state;
pub mod walker;

// Re-export error types from core
pub use hookwarden_core::{Error, Result};

// Re-export commonly used types
pub use artifacts::{FsArtifactStore, MemoryArtifactStore};
pub use coordinator::{Coordinator, HookChange, HookEvent, Host, InstallMode, TransitionReport};
pub use environment::StaticEnvironment;
pub use lifecycle::{InstallOutcome, LifecycleDeps, ScriptLifecycle, UninstallOutcome};
pub use memory::MemoryHost;
pub use privilege::{Elevated, LocalPrivilege};
pub use rebuild::{ProgressStore, RebuildProgress, Rebuilder};
pub use records::{RecordKey, ScriptRecord, ScriptRecords};
pub use resolver::{ActiveSource, ResolvedSource, Resolver};
pub use startup::{JobClaims, LaunchBarrier, LaunchSignal, STARTUP_JOB_ID, StartupJob};
pub use state::{MockPersistentState, PersistentState, RedbPersistentState};
pub use walker::{WalkVisitor, Walker};
