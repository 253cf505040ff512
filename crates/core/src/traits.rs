//! Collaborator traits implemented by the host
//!
//! The coordinator never talks to the source-control host directly. Everything
//! it needs (configuration, inventory, the artifact store, privilege and
//! deployment facts) is reached through these traits, so the engine can be
//! driven by the real host, by a file-backed description or by in-memory fakes
//! in tests.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::hook::{HookConfig, HookKind, ScriptType, Trigger};
use crate::policy::GlobalPolicies;
use crate::scope::{ProjectScope, RepositoryScope, Scope, ScopeType};
use crate::Result;

/// Effective enablement of a hook as seen from one scope
///
/// `source` is the level at which the effective setting is defined. A
/// repository whose setting comes from its project reports `Project`; a scope
/// with no setting anywhere reports `Global`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HookStatus {
    /// Whether the hook is enabled
    pub enabled: bool,
    /// Level the setting comes from
    pub source: ScopeType,
}

impl HookStatus {
    /// Status of a scope with no setting at any level
    pub const UNSET: Self = Self {
        enabled: false,
        source: ScopeType::Global,
    };

    /// Whether the scope at `level` carries its own setting
    pub fn is_own(self, level: ScopeType) -> bool {
        self.source == level
    }

    /// Whether the scope at `level` inherits its setting
    pub fn is_inherited(self, level: ScopeType) -> bool {
        !self.is_own(level)
    }

    /// Whether the scope at `level` is enabled by its own setting
    pub fn is_enabled_at(self, level: ScopeType) -> bool {
        self.enabled && self.is_own(level)
    }
}

/// Read access to per-scope hook configuration and enablement
pub trait HookConfigStore {
    /// Configuration stored at exactly this scope, without inheritance
    fn hook_config(&self, scope: &Scope, hook: HookKind) -> Result<Option<HookConfig>>;

    /// Effective enablement of the hook at this scope
    fn hook_status(&self, scope: &Scope, hook: HookKind) -> Result<HookStatus>;
}

/// Source of global policy snapshots
pub trait GlobalPolicySource {
    /// Read a fresh, internally consistent snapshot of every global entry
    fn snapshot(&self) -> Result<GlobalPolicies>;
}

/// Identifier of an installed artifact, opaque to the coordinator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArtifactId(pub u64);

impl fmt::Display for ArtifactId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What to create in the artifact store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactRequest<'a> {
    /// Hook kind
    pub hook: HookKind,
    /// Pre or post script
    pub script_type: ScriptType,
    /// Repository the artifact serves
    pub repository: &'a RepositoryScope,
    /// Scope whose configuration produced the artifact
    pub source: &'a Scope,
    /// Configuration to run
    pub config: &'a HookConfig,
    /// Executable after safe-mode resolution
    pub executable: &'a Path,
}

/// The host's store of installed hook scripts
///
/// All operations are called with the privilege capability held.
pub trait ArtifactStore {
    /// Create an artifact and return its id
    fn create(&self, request: &ArtifactRequest<'_>) -> Result<ArtifactId>;

    /// Delete an artifact
    ///
    /// Returns `Ok(false)` when the artifact no longer exists.
    fn delete(&self, id: ArtifactId) -> Result<bool>;

    /// Bind an artifact to the triggers it should fire on in one repository
    fn bind_triggers(
        &self,
        id: ArtifactId,
        repository: &RepositoryScope,
        triggers: &[Trigger],
    ) -> Result<()>;
}

/// Scoped elevated-privilege capability
///
/// Callers pair every successful `acquire` with exactly one `release`; the
/// engine wraps this in a guard.
pub trait PrivilegeProvider {
    /// Acquire the capability, giving a reason for audit
    fn acquire(&self, reason: &str) -> Result<()>;

    /// Release a previously acquired capability
    fn release(&self);
}

/// Deployment facts needed for validation and scheduling
pub trait HostEnvironment {
    /// Whether the host runs as a multi-node cluster
    fn is_clustered(&self) -> bool;

    /// Number of nodes currently in the cluster
    fn node_count(&self) -> usize;

    /// Whether the acting caller holds system administrator rights
    fn caller_is_admin(&self) -> bool;

    /// Home directory; the shared home when clustered
    fn home_dir(&self) -> &Path;
}

/// A page request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    /// Offset of the first element
    pub start: usize,
    /// Maximum elements to return
    pub limit: usize,
}

impl PageRequest {
    /// First page of the given size
    pub fn first(limit: usize) -> Self {
        Self { start: 0, limit }
    }
}

/// One page of results
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    /// Elements in this page
    pub values: Vec<T>,
    /// Request for the following page, `None` on the last page
    pub next: Option<PageRequest>,
}

impl<T> Page<T> {
    /// Slice a page out of a complete list
    pub fn from_slice(all: &[T], request: PageRequest) -> Self
    where
        T: Clone,
    {
        let start = request.start.min(all.len());
        let end = start.saturating_add(request.limit.max(1)).min(all.len());
        let next = (end < all.len()).then_some(PageRequest {
            start: end,
            limit: request.limit,
        });
        Self {
            values: all[start..end].to_vec(),
            next,
        }
    }
}

/// Paged listing of projects, users and repositories
pub trait Inventory {
    /// Regular (non-personal) projects
    fn projects(&self, page: PageRequest) -> Result<Page<ProjectScope>>;

    /// Repositories of one project
    fn project_repositories(
        &self,
        project: &ProjectScope,
        page: PageRequest,
    ) -> Result<Page<RepositoryScope>>;

    /// Users that may own personal repositories
    fn users(&self, page: PageRequest) -> Result<Page<String>>;

    /// Personal repositories owned by a user
    fn personal_repositories(&self, user: &str, page: PageRequest)
    -> Result<Page<RepositoryScope>>;
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::panic)]

    use super::*;

    #[test]
    fn test_status_inheritance() {
        let inherited = HookStatus {
            enabled: true,
            source: ScopeType::Project,
        };
        assert!(inherited.is_inherited(ScopeType::Repository));
        assert!(!inherited.is_enabled_at(ScopeType::Repository));
        assert!(inherited.is_enabled_at(ScopeType::Project));

        assert!(HookStatus::UNSET.is_inherited(ScopeType::Repository));
        assert!(!HookStatus::UNSET.enabled);
    }

    #[test]
    fn test_page_from_slice() {
        let all: Vec<u32> = (0..25).collect();

        let first = Page::from_slice(&all, PageRequest::first(10));
        assert_eq!(first.values, (0..10).collect::<Vec<_>>());
        let second = Page::from_slice(&all, first.next.unwrap());
        assert_eq!(second.values.first(), Some(&10));
        let third = Page::from_slice(&all, second.next.unwrap());
        assert_eq!(third.values, (20..25).collect::<Vec<_>>());
        assert!(third.next.is_none());
    }

    #[test]
    fn test_page_past_end_is_empty() {
        let all = [1, 2, 3];
        let page = Page::from_slice(&all, PageRequest { start: 10, limit: 5 });
        assert!(page.values.is_empty());
        assert!(page.next.is_none());
    }
}
