//! Hook scope resolution
//!
//! Decides which scope's configuration should drive a hook in a repository.
//! Priority, highest first:
//!
//! 1. the repository's own enabled configuration
//! 2. the project's enabled configuration (never for personal repositories)
//! 3. the global policy, when enabled and its filter admits the repository
//!
//! Resolution only reads; it never touches the record or artifact stores.

use hookwarden_core::{
    GlobalPolicies, HookConfig, HookConfigStore, HookKind, RepositoryScope, Result, Scope,
    ScopeType,
};

/// The scope that won resolution and the configuration it supplies
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveSource {
    /// Winning scope
    pub source: Scope,
    /// Configuration to install
    pub config: HookConfig,
}

/// Outcome of resolving one hook for one repository
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedSource {
    /// A scope supplies the hook
    Active(ActiveSource),
    /// No scope supplies the hook
    NoneActive,
}

impl ResolvedSource {
    /// Winning scope, if any
    pub fn source(&self) -> Option<&Scope> {
        match self {
            Self::Active(active) => Some(&active.source),
            Self::NoneActive => None,
        }
    }

    /// Level of the winning scope, if any
    pub fn source_type(&self) -> Option<ScopeType> {
        self.source().map(Scope::scope_type)
    }
}

/// Resolver over the host's configuration store
#[derive(Clone, Copy)]
pub struct Resolver<'a> {
    configs: &'a dyn HookConfigStore,
}

impl<'a> Resolver<'a> {
    /// Create a resolver
    pub fn new(configs: &'a dyn HookConfigStore) -> Self {
        Self { configs }
    }

    /// Resolve `hook` for `repository` against a policy snapshot
    pub fn resolve(
        &self,
        hook: HookKind,
        repository: &RepositoryScope,
        policies: &GlobalPolicies,
    ) -> Result<ResolvedSource> {
        let repo_scope = Scope::Repository(repository.clone());
        if let Some(config) = self.enabled_config(&repo_scope, hook)? {
            return Ok(active(repo_scope, config));
        }

        if !repository.personal {
            let project_scope = Scope::Project(repository.project.clone());
            if let Some(config) = self.enabled_config(&project_scope, hook)? {
                return Ok(active(project_scope, config));
            }
        }

        if let Some(policy) = policies.applicable(hook, repository) {
            if policy.config.has_executable() {
                return Ok(active(Scope::Global, policy.config.clone()));
            }
            tracing::warn!(hook = %hook, "Global policy is enabled without an executable");
        }

        Ok(ResolvedSource::NoneActive)
    }

    /// The scope's own configuration when the hook is enabled there
    ///
    /// An enabled scope without a usable configuration is skipped so the
    /// next level can take over.
    fn enabled_config(&self, scope: &Scope, hook: HookKind) -> Result<Option<HookConfig>> {
        let status = self.configs.hook_status(scope, hook)?;
        if !status.is_enabled_at(scope.scope_type()) {
            return Ok(None);
        }

        match self.configs.hook_config(scope, hook)? {
            Some(config) if config.has_executable() => Ok(Some(config)),
            _ => {
                tracing::warn!(hook = %hook, scope = %scope, "Hook enabled without configuration");
                Ok(None)
            }
        }
    }
}

fn active(source: Scope, config: HookConfig) -> ResolvedSource {
    ResolvedSource::Active(ActiveSource { source, config })
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::panic)]

    use super::*;
    use crate::memory::MemoryHost;
    use hookwarden_core::{GlobalPolicy, GlobalPolicySource, PersonalRepoFilter};

    struct Fixture {
        host: MemoryHost,
        repo: RepositoryScope,
        personal: RepositoryScope,
    }

    fn fixture() -> Fixture {
        let host = MemoryHost::new();
        let project = host.add_project(1, "TEAM");
        let repo = host.add_repository(&project, 10, "app");
        let personal = host.add_personal_repository("alice", 20, "scratch");
        Fixture {
            host,
            repo,
            personal,
        }
    }

    fn global(filter: PersonalRepoFilter) -> GlobalPolicy {
        GlobalPolicy {
            hook: HookKind::PreReceive,
            enabled: true,
            config: HookConfig::new("global-check"),
            filter,
        }
    }

    fn resolve(f: &Fixture, repo: &RepositoryScope) -> ResolvedSource {
        let policies = f.host.snapshot().unwrap();
        Resolver::new(&f.host)
            .resolve(HookKind::PreReceive, repo, &policies)
            .unwrap()
    }

    #[test]
    fn test_nothing_configured() {
        let f = fixture();
        assert_eq!(resolve(&f, &f.repo), ResolvedSource::NoneActive);
    }

    #[test]
    fn test_priority_order() {
        let f = fixture();
        let project = Scope::Project(f.repo.project.clone());
        let repo = Scope::Repository(f.repo.clone());

        f.host.set_policy(global(PersonalRepoFilter::ApplyToAll));
        assert_eq!(resolve(&f, &f.repo).source_type(), Some(ScopeType::Global));

        f.host
            .enable(&project, HookKind::PreReceive, HookConfig::new("project-check"));
        assert_eq!(resolve(&f, &f.repo).source_type(), Some(ScopeType::Project));

        f.host
            .enable(&repo, HookKind::PreReceive, HookConfig::new("repo-check"));
        let ResolvedSource::Active(active) = resolve(&f, &f.repo) else {
            panic!("expected an active source");
        };
        assert_eq!(active.source, repo);
        assert_eq!(active.config.executable_path, "repo-check");
    }

    #[test]
    fn test_disabled_repository_falls_through_to_project() {
        let f = fixture();
        let project = Scope::Project(f.repo.project.clone());
        let repo = Scope::Repository(f.repo.clone());

        f.host
            .enable(&project, HookKind::PreReceive, HookConfig::new("project-check"));
        f.host
            .enable(&repo, HookKind::PreReceive, HookConfig::new("repo-check"));
        f.host.disable(&repo, HookKind::PreReceive);

        assert_eq!(resolve(&f, &f.repo).source(), Some(&project));
    }

    #[test]
    fn test_personal_repository_skips_project() {
        let f = fixture();
        f.host.enable(
            &Scope::Project(f.personal.project.clone()),
            HookKind::PreReceive,
            HookConfig::new("personal-project"),
        );
        assert_eq!(resolve(&f, &f.personal), ResolvedSource::NoneActive);

        f.host.set_policy(global(PersonalRepoFilter::OnlyPersonal));
        assert_eq!(resolve(&f, &f.personal).source(), Some(&Scope::Global));
        assert_eq!(resolve(&f, &f.repo), ResolvedSource::NoneActive);
    }

    #[test]
    fn test_exclude_personal_filter() {
        let f = fixture();
        f.host.set_policy(global(PersonalRepoFilter::ExcludePersonal));
        assert_eq!(resolve(&f, &f.repo).source(), Some(&Scope::Global));
        assert_eq!(resolve(&f, &f.personal), ResolvedSource::NoneActive);
    }

    #[test]
    fn test_enabled_without_config_is_skipped() {
        let f = fixture();
        f.host.set_policy(global(PersonalRepoFilter::ApplyToAll));
        f.host
            .enable_without_config(&Scope::Repository(f.repo.clone()), HookKind::PreReceive);
        assert_eq!(resolve(&f, &f.repo).source(), Some(&Scope::Global));
    }

    #[test]
    fn test_global_without_executable_is_inactive() {
        let f = fixture();
        let mut policy = global(PersonalRepoFilter::ApplyToAll);
        policy.config.executable_path = "  ".into();
        f.host.set_policy(policy);
        assert_eq!(resolve(&f, &f.repo), ResolvedSource::NoneActive);
    }

    #[test]
    fn test_store_outage_propagates() {
        let f = fixture();
        let policies = f.host.snapshot().unwrap();
        f.host.set_unavailable(true);
        let result = Resolver::new(&f.host).resolve(HookKind::PreReceive, &f.repo, &policies);
        assert!(matches!(
            result,
            Err(hookwarden_core::Error::StoreUnavailable(_))
        ));
    }
}
