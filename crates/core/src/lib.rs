//! Core types for hookwarden
//!
//! This is the foundation crate (Layer 0) that all other hookwarden crates depend on.
//! It provides:
//! - The scope model (global, project, repository)
//! - Hook kinds, triggers and hook configuration
//! - Global policy entries and the personal-repository filter
//! - The error taxonomy
//! - Collaborator traits implemented by the host
//!
//! This crate has no dependencies on other hookwarden crates.

pub mod error;
pub mod hook;
pub mod policy;
pub mod scope;
pub mod traits;

pub use error::{Error, Result, ValidationError, ValidationField};
pub use hook::{HookConfig, HookKind, ScriptType, Trigger};
pub use policy::{GlobalPolicies, GlobalPolicy, PersonalRepoFilter};
pub use scope::{ProjectId, ProjectScope, RepositoryId, RepositoryScope, Scope, ScopeType};
pub use traits::{
    ArtifactId, ArtifactRequest, ArtifactStore, GlobalPolicySource, HookConfigStore, HookStatus,
    HostEnvironment, Inventory, Page, PageRequest, PrivilegeProvider,
};
