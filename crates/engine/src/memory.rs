//! In-memory host for tests and embedding
//!
//! [`MemoryHost`] plays every read-side collaborator at once: it stores the
//! inventory, the per-scope hook settings and the global policy, and can be
//! switched offline to exercise store outages.

use hookwarden_core::{
    Error, GlobalPolicies, GlobalPolicy, GlobalPolicySource, HookConfig, HookConfigStore,
    HookKind, HookStatus, Inventory, Page, PageRequest, ProjectId, ProjectScope, RepositoryId,
    RepositoryScope, Result, Scope, ScopeType,
};
use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// First id handed to personal projects created on demand
const PERSONAL_PROJECT_BASE: u64 = 1_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum ScopeKey {
    Global,
    Project(ProjectId),
    Repository(RepositoryId),
}

impl From<&Scope> for ScopeKey {
    fn from(scope: &Scope) -> Self {
        match scope {
            Scope::Global => Self::Global,
            Scope::Project(project) => Self::Project(project.id),
            Scope::Repository(repo) => Self::Repository(repo.id),
        }
    }
}

#[derive(Debug, Clone)]
struct Setting {
    enabled: bool,
    config: Option<HookConfig>,
}

#[derive(Debug, Default)]
struct HostState {
    projects: Vec<ProjectScope>,
    repositories: Vec<RepositoryScope>,
    users: Vec<(String, ProjectScope)>,
    settings: HashMap<(ScopeKey, HookKind), Setting>,
    policies: GlobalPolicies,
    unavailable: bool,
}

/// Mutable in-memory host
#[derive(Debug, Default)]
pub struct MemoryHost {
    state: RwLock<HostState>,
}

impl MemoryHost {
    /// Empty host
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, HostState>> {
        let state = self
            .state
            .read()
            .map_err(|_| Error::StoreUnavailable("memory host lock poisoned".to_string()))?;
        if state.unavailable {
            return Err(Error::StoreUnavailable("memory host offline".to_string()));
        }
        Ok(state)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HostState> {
        self.state
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Simulate the host's stores going away (or coming back)
    pub fn set_unavailable(&self, unavailable: bool) {
        self.write().unavailable = unavailable;
    }

    /// Register a regular project
    pub fn add_project(&self, id: u64, key: &str) -> ProjectScope {
        let project = ProjectScope::new(id, key);
        self.write().projects.push(project.clone());
        project
    }

    /// Register a repository in a regular project
    pub fn add_repository(&self, project: &ProjectScope, id: u64, slug: &str) -> RepositoryScope {
        let repo = RepositoryScope::new(id, slug, project.clone());
        self.write().repositories.push(repo.clone());
        repo
    }

    /// Register a personal repository, creating the user on first use
    pub fn add_personal_repository(&self, user: &str, id: u64, slug: &str) -> RepositoryScope {
        let mut state = self.write();
        let project = match state.users.iter().find(|(name, _)| name == user) {
            Some((_, project)) => project.clone(),
            None => {
                let project_id = PERSONAL_PROJECT_BASE + state.users.len() as u64;
                let project = ProjectScope::new(project_id, format!("~{}", user.to_uppercase()));
                state.users.push((user.to_string(), project.clone()));
                project
            }
        };
        let repo = RepositoryScope::personal(id, slug, project);
        state.repositories.push(repo.clone());
        repo
    }

    /// Forget a repository and its settings
    pub fn remove_repository(&self, repo: &RepositoryScope) {
        let mut state = self.write();
        state.repositories.retain(|r| r.id != repo.id);
        state
            .settings
            .retain(|(key, _), _| *key != ScopeKey::Repository(repo.id));
    }

    /// Enable a hook at a scope with its own configuration
    pub fn enable(&self, scope: &Scope, hook: HookKind, config: HookConfig) {
        self.write().settings.insert(
            (ScopeKey::from(scope), hook),
            Setting {
                enabled: true,
                config: Some(config),
            },
        );
    }

    /// Enable a hook at a scope without storing a configuration
    pub fn enable_without_config(&self, scope: &Scope, hook: HookKind) {
        self.write().settings.insert(
            (ScopeKey::from(scope), hook),
            Setting {
                enabled: true,
                config: None,
            },
        );
    }

    /// Disable a hook at a scope, keeping any stored configuration
    pub fn disable(&self, scope: &Scope, hook: HookKind) {
        self.write()
            .settings
            .entry((ScopeKey::from(scope), hook))
            .and_modify(|s| s.enabled = false)
            .or_insert(Setting {
                enabled: false,
                config: None,
            });
    }

    /// Drop the scope's own setting so it inherits again
    pub fn inherit(&self, scope: &Scope, hook: HookKind) {
        self.write().settings.remove(&(ScopeKey::from(scope), hook));
    }

    /// Set or replace a global policy entry
    pub fn set_policy(&self, policy: GlobalPolicy) {
        self.write().policies.insert(policy);
    }

    /// Every registered repository
    pub fn repositories(&self) -> Vec<RepositoryScope> {
        self.write().repositories.clone()
    }
}

impl HookConfigStore for MemoryHost {
    fn hook_config(&self, scope: &Scope, hook: HookKind) -> Result<Option<HookConfig>> {
        let state = self.read()?;
        Ok(state
            .settings
            .get(&(ScopeKey::from(scope), hook))
            .and_then(|s| s.config.clone()))
    }

    fn hook_status(&self, scope: &Scope, hook: HookKind) -> Result<HookStatus> {
        let state = self.read()?;
        if let Some(setting) = state.settings.get(&(ScopeKey::from(scope), hook)) {
            return Ok(HookStatus {
                enabled: setting.enabled,
                source: scope.scope_type(),
            });
        }
        if let Scope::Repository(repo) = scope
            && !repo.personal
            && let Some(setting) = state
                .settings
                .get(&(ScopeKey::Project(repo.project.id), hook))
        {
            return Ok(HookStatus {
                enabled: setting.enabled,
                source: ScopeType::Project,
            });
        }
        Ok(HookStatus::UNSET)
    }
}

impl GlobalPolicySource for MemoryHost {
    fn snapshot(&self) -> Result<GlobalPolicies> {
        Ok(self.read()?.policies.clone())
    }
}

impl Inventory for MemoryHost {
    fn projects(&self, page: PageRequest) -> Result<Page<ProjectScope>> {
        Ok(Page::from_slice(&self.read()?.projects, page))
    }

    fn project_repositories(
        &self,
        project: &ProjectScope,
        page: PageRequest,
    ) -> Result<Page<RepositoryScope>> {
        let repositories: Vec<_> = self
            .read()?
            .repositories
            .iter()
            .filter(|r| !r.personal && r.project.id == project.id)
            .cloned()
            .collect();
        Ok(Page::from_slice(&repositories, page))
    }

    fn users(&self, page: PageRequest) -> Result<Page<String>> {
        let users: Vec<_> = self.read()?.users.iter().map(|(n, _)| n.clone()).collect();
        Ok(Page::from_slice(&users, page))
    }

    fn personal_repositories(
        &self,
        user: &str,
        page: PageRequest,
    ) -> Result<Page<RepositoryScope>> {
        let state = self.read()?;
        let Some((_, project)) = state.users.iter().find(|(name, _)| name == user) else {
            return Ok(Page::from_slice(&[], page));
        };
        let repositories: Vec<_> = state
            .repositories
            .iter()
            .filter(|r| r.personal && r.project.id == project.id)
            .cloned()
            .collect();
        Ok(Page::from_slice(&repositories, page))
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::panic)]

    use super::*;

    #[test]
    fn test_status_follows_settings() {
        let host = MemoryHost::new();
        let project = host.add_project(1, "TEAM");
        let repo = host.add_repository(&project, 10, "app");
        let repo_scope = Scope::Repository(repo.clone());
        let project_scope = Scope::Project(project);

        assert_eq!(
            host.hook_status(&repo_scope, HookKind::PreReceive).unwrap(),
            HookStatus::UNSET
        );

        host.enable(&project_scope, HookKind::PreReceive, HookConfig::new("p"));
        let status = host.hook_status(&repo_scope, HookKind::PreReceive).unwrap();
        assert!(status.enabled);
        assert_eq!(status.source, ScopeType::Project);

        host.disable(&repo_scope, HookKind::PreReceive);
        let status = host.hook_status(&repo_scope, HookKind::PreReceive).unwrap();
        assert!(!status.enabled);
        assert_eq!(status.source, ScopeType::Repository);

        host.inherit(&repo_scope, HookKind::PreReceive);
        assert_eq!(
            host.hook_status(&repo_scope, HookKind::PreReceive)
                .unwrap()
                .source,
            ScopeType::Project
        );
    }

    #[test]
    fn test_disable_keeps_config() {
        let host = MemoryHost::new();
        let project = host.add_project(1, "TEAM");
        let scope = Scope::Project(project);
        host.enable(&scope, HookKind::MergeCheck, HookConfig::new("gate"));
        host.disable(&scope, HookKind::MergeCheck);
        assert!(host.hook_config(&scope, HookKind::MergeCheck).unwrap().is_some());
    }

    #[test]
    fn test_personal_repos_do_not_inherit() {
        let host = MemoryHost::new();
        let repo = host.add_personal_repository("alice", 20, "scratch");
        assert!(repo.personal);
        assert_eq!(repo.project.key, "~ALICE");

        host.enable(
            &Scope::Project(repo.project.clone()),
            HookKind::PreReceive,
            HookConfig::new("x"),
        );
        assert_eq!(
            host.hook_status(&Scope::Repository(repo), HookKind::PreReceive)
                .unwrap(),
            HookStatus::UNSET
        );
    }

    #[test]
    fn test_inventory_listing() {
        let host = MemoryHost::new();
        let team = host.add_project(1, "TEAM");
        host.add_repository(&team, 10, "a");
        host.add_repository(&team, 11, "b");
        host.add_personal_repository("bob", 20, "c");
        host.add_personal_repository("bob", 21, "d");

        let repos = host.project_repositories(&team, PageRequest::first(10)).unwrap();
        assert_eq!(repos.values.len(), 2);
        let users = host.users(PageRequest::first(10)).unwrap();
        assert_eq!(users.values, vec!["bob".to_string()]);
        let personal = host
            .personal_repositories("bob", PageRequest::first(10))
            .unwrap();
        assert_eq!(personal.values.len(), 2);
        assert!(host
            .personal_repositories("carol", PageRequest::first(10))
            .unwrap()
            .values
            .is_empty());
    }

    #[test]
    fn test_offline_host_fails_reads() {
        let host = MemoryHost::new();
        host.set_unavailable(true);
        assert!(matches!(
            host.snapshot(),
            Err(Error::StoreUnavailable(_))
        ));
        host.set_unavailable(false);
        assert!(host.snapshot().is_ok());
    }
}
