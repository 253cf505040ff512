//! Event coordinator
//!
//! Every host event funnels through [`Coordinator::handle`]. Whatever the event,
//! the work for one (hook, repository) unit is the same reconcile step:
//! resolve the winning source, uninstall every record from a losing source,
//! then make sure the winner is installed. That keeps at most one record per
//! (hook, repository) once an event settles, and makes re-delivered events
//! harmless.

use crate::lifecycle::{InstallOutcome, LifecycleDeps, ScriptLifecycle, UninstallOutcome};
use crate::resolver::{ResolvedSource, Resolver};
use crate::state::PersistentState;
use crate::walker::Walker;
use hookwarden_config::TriggerSettings;
use hookwarden_core::{
    ArtifactStore, Error, GlobalPolicies, GlobalPolicySource, HookConfig, HookConfigStore,
    HookKind, HostEnvironment, Inventory, PrivilegeProvider, RepositoryScope, Result, Scope,
};
use serde::Serialize;
use std::fmt;
use std::ops::AddAssign;
use std::path::PathBuf;

/// Host collaborators the coordinator reads and writes through
#[derive(Clone, Copy)]
pub struct Host<'a> {
    /// Per-scope hook configuration
    pub configs: &'a dyn HookConfigStore,
    /// Global policy snapshots
    pub policies: &'a dyn GlobalPolicySource,
    /// Projects, users and repositories
    pub inventory: &'a dyn Inventory,
    /// Installed artifacts
    pub artifacts: &'a dyn ArtifactStore,
    /// Elevated privilege
    pub privilege: &'a dyn PrivilegeProvider,
    /// Deployment facts
    pub environment: &'a dyn HostEnvironment,
}

/// Per-scope hook setting change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookChange {
    /// The scope enabled the hook with its own configuration
    Enabled,
    /// The scope disabled the hook
    Disabled,
    /// The scope dropped its own setting
    Inherited,
}

/// A host event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HookEvent {
    /// Hook enabled at a scope
    Enabled {
        /// Scope that changed
        scope: Scope,
        /// Hook kind
        hook: HookKind,
    },
    /// Hook disabled at a scope
    Disabled {
        /// Scope that changed
        scope: Scope,
        /// Hook kind
        hook: HookKind,
    },
    /// Scope went back to inheriting the hook
    Inherited {
        /// Scope that changed
        scope: Scope,
        /// Hook kind
        hook: HookKind,
    },
    /// Repository created
    RepositoryCreated(RepositoryScope),
    /// Repository deleted
    RepositoryDeleted(RepositoryScope),
    /// Global policy entry for a hook kind edited
    GlobalPolicyChanged(HookKind),
}

impl HookEvent {
    /// Build a setting-change event
    pub fn hook_change(change: HookChange, scope: Scope, hook: HookKind) -> Self {
        match change {
            HookChange::Enabled => Self::Enabled { scope, hook },
            HookChange::Disabled => Self::Disabled { scope, hook },
            HookChange::Inherited => Self::Inherited { scope, hook },
        }
    }

    /// Build a setting-change event from a host hook key
    ///
    /// Returns `None` for keys that belong to other plugins.
    pub fn from_hook_key(change: HookChange, scope: Scope, key: &str) -> Option<Self> {
        let Some(hook) = HookKind::from_key(key) else {
            tracing::debug!(key, "Ignoring event for foreign hook");
            return None;
        };
        Some(Self::hook_change(change, scope, hook))
    }
}

impl fmt::Display for HookEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Enabled { scope, hook } => write!(f, "enabled {hook} on {scope}"),
            Self::Disabled { scope, hook } => write!(f, "disabled {hook} on {scope}"),
            Self::Inherited { scope, hook } => write!(f, "inherited {hook} on {scope}"),
            Self::RepositoryCreated(repo) => write!(f, "created repository {repo}"),
            Self::RepositoryDeleted(repo) => write!(f, "deleted repository {repo}"),
            Self::GlobalPolicyChanged(hook) => write!(f, "global policy changed for {hook}"),
        }
    }
}

/// Aggregate outcome of processing an event or a bulk operation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TransitionReport {
    /// (hook, repository) units processed
    pub units: usize,
    /// Artifacts created
    pub created: usize,
    /// Artifacts deleted
    pub deleted: usize,
    /// Units whose winning artifact was already up to date
    pub unchanged: usize,
    /// Units that failed and were skipped
    pub failed: usize,
}

impl TransitionReport {
    /// Whether no unit failed
    pub fn is_success(&self) -> bool {
        self.failed == 0
    }
}

impl AddAssign for TransitionReport {
    fn add_assign(&mut self, other: Self) {
        self.units += other.units;
        self.created += other.created;
        self.deleted += other.deleted;
        self.unchanged += other.unchanged;
        self.failed += other.failed;
    }
}

impl fmt::Display for TransitionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} created, {} deleted, {} unchanged, {} failed",
            self.created, self.deleted, self.unchanged, self.failed
        )
    }
}

/// How the winning source is brought into place
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallMode {
    /// Skip the install when the recorded fingerprint already matches
    Ensure,
    /// Always replace the artifact
    Replace,
}

/// Drives resolution and the script lifecycle from host events
pub struct Coordinator<'a, P: PersistentState> {
    host: Host<'a>,
    lifecycle: ScriptLifecycle<'a, P>,
}

impl<'a, P: PersistentState> Coordinator<'a, P> {
    /// Create a coordinator writing records to `db`
    pub fn new(host: Host<'a>, db: &'a P, triggers: &'a TriggerSettings) -> Self {
        let deps = LifecycleDeps {
            artifacts: host.artifacts,
            privilege: host.privilege,
            environment: host.environment,
            triggers,
        };
        Self {
            host,
            lifecycle: ScriptLifecycle::new(db, deps),
        }
    }

    /// Host collaborators
    pub fn host(&self) -> Host<'a> {
        self.host
    }

    /// The underlying lifecycle
    pub fn lifecycle(&self) -> &ScriptLifecycle<'a, P> {
        &self.lifecycle
    }

    /// Resolver over the host's configuration
    pub fn resolver(&self) -> Resolver<'a> {
        Resolver::new(self.host.configs)
    }

    /// Fresh global policy snapshot
    pub fn snapshot(&self) -> Result<GlobalPolicies> {
        self.host.policies.snapshot()
    }

    /// Process one host event
    ///
    /// Configuration problems with the changed scope are returned as errors.
    /// Failures of individual (hook, repository) units are logged and counted
    /// in the report instead.
    #[tracing::instrument(skip_all, fields(event = %event))]
    pub fn handle(&self, event: &HookEvent) -> Result<TransitionReport> {
        let report = match event {
            HookEvent::Enabled { scope, hook } => self.on_enabled(scope, *hook)?,
            HookEvent::Disabled { scope, hook } => self.on_disabled(scope, *hook)?,
            HookEvent::Inherited { scope, hook } => self.on_inherited(scope, *hook)?,
            HookEvent::RepositoryCreated(repo) => self.on_repository_created(repo)?,
            HookEvent::RepositoryDeleted(repo) => self.on_repository_deleted(repo),
            HookEvent::GlobalPolicyChanged(hook) => {
                let policies = self.snapshot()?;
                self.reconcile_all(*hook, &policies)?
            }
        };

        if report.is_success() {
            tracing::debug!(%report, "Event processed");
        } else {
            tracing::warn!(%report, "Event processed with failures");
        }
        Ok(report)
    }

    fn on_enabled(&self, scope: &Scope, hook: HookKind) -> Result<TransitionReport> {
        let policies = self.snapshot()?;
        self.validated_config(scope, hook, &policies)?;

        match scope {
            Scope::Repository(repo) => {
                Ok(self.run_unit(hook, repo, &policies, InstallMode::Replace))
            }
            _ => self.reconcile_scope(scope, hook, &policies),
        }
    }

    fn on_disabled(&self, scope: &Scope, hook: HookKind) -> Result<TransitionReport> {
        let policies = self.snapshot()?;
        self.reconcile_scope(scope, hook, &policies)
    }

    fn on_inherited(&self, scope: &Scope, hook: HookKind) -> Result<TransitionReport> {
        match scope {
            Scope::Global => {
                tracing::debug!(hook = %hook, "Global scope has nothing to inherit from");
                return Ok(TransitionReport::default());
            }
            Scope::Repository(repo) if repo.personal => {
                tracing::debug!(hook = %hook, repository = %repo, "Personal repository has no project to inherit from");
                return Ok(TransitionReport::default());
            }
            _ => {}
        }
        let policies = self.snapshot()?;
        self.reconcile_scope(scope, hook, &policies)
    }

    fn on_repository_created(&self, repo: &RepositoryScope) -> Result<TransitionReport> {
        let policies = self.snapshot()?;
        let mut report = TransitionReport::default();
        for hook in HookKind::ALL {
            report += self.run_unit(hook, repo, &policies, InstallMode::Ensure);
        }
        Ok(report)
    }

    /// Remove every record targeting the repository, whatever its source
    fn on_repository_deleted(&self, repo: &RepositoryScope) -> TransitionReport {
        let mut report = TransitionReport::default();
        let records = match self.lifecycle.records().for_repository(repo.id) {
            Ok(records) => records,
            Err(e) => {
                tracing::error!(repository = %repo, error = %e, "Failed to list hook scripts of deleted repository");
                report.failed += 1;
                return report;
            }
        };

        for (key, _) in records {
            report.units += 1;
            match self.lifecycle.uninstall_key(&key) {
                Ok(UninstallOutcome::Success) => report.deleted += 1,
                Ok(UninstallOutcome::AlreadyAbsent) => {}
                Err(e) => {
                    tracing::error!(key = %key, repository = %repo, error = %e, "Failed to remove hook script");
                    report.failed += 1;
                }
            }
        }
        report
    }

    /// Reconcile every repository affected by a change at `scope`
    fn reconcile_scope(
        &self,
        scope: &Scope,
        hook: HookKind,
        policies: &GlobalPolicies,
    ) -> Result<TransitionReport> {
        match scope {
            Scope::Global => self.reconcile_all(hook, policies),
            Scope::Project(project) => {
                let mut report = TransitionReport::default();
                Walker::new(self.host.inventory).walk_project(
                    project,
                    &mut |repo: &RepositoryScope| -> Result<()> {
                        report += self.run_unit(hook, repo, policies, InstallMode::Ensure);
                        Ok(())
                    },
                )?;
                Ok(report)
            }
            Scope::Repository(repo) => Ok(self.run_unit(hook, repo, policies, InstallMode::Ensure)),
        }
    }

    /// Reconcile one hook kind across every repository
    fn reconcile_all(&self, hook: HookKind, policies: &GlobalPolicies) -> Result<TransitionReport> {
        let mut report = TransitionReport::default();
        Walker::new(self.host.inventory).walk(&mut |repo: &RepositoryScope| -> Result<()> {
            report += self.run_unit(hook, repo, policies, InstallMode::Ensure);
            Ok(())
        })?;
        Ok(report)
    }

    /// Reconcile every hook kind for one repository
    pub fn reconcile_repository(
        &self,
        repo: &RepositoryScope,
        policies: &GlobalPolicies,
        mode: InstallMode,
    ) -> TransitionReport {
        let mut report = TransitionReport::default();
        for hook in HookKind::ALL {
            report += self.run_unit(hook, repo, policies, mode);
        }
        report
    }

    /// Reconcile one unit, turning a failure into a counted, logged report
    fn run_unit(
        &self,
        hook: HookKind,
        repo: &RepositoryScope,
        policies: &GlobalPolicies,
        mode: InstallMode,
    ) -> TransitionReport {
        match self.reconcile(hook, repo, policies, mode) {
            Ok(report) => report,
            Err(e) => {
                tracing::error!(hook = %hook, repository = %repo, error = %e, "Failed to update hook script");
                TransitionReport {
                    units: 1,
                    failed: 1,
                    ..TransitionReport::default()
                }
            }
        }
    }

    /// Bring one (hook, repository) unit in line with resolution
    pub fn reconcile(
        &self,
        hook: HookKind,
        repo: &RepositoryScope,
        policies: &GlobalPolicies,
        mode: InstallMode,
    ) -> Result<TransitionReport> {
        let resolved = self.resolver().resolve(hook, repo, policies)?;
        let winner = resolved.source();
        let mut report = TransitionReport {
            units: 1,
            ..TransitionReport::default()
        };

        for candidate in [
            Scope::Repository(repo.clone()),
            Scope::Project(repo.project.clone()),
            Scope::Global,
        ] {
            if winner == Some(&candidate) {
                continue;
            }
            if self.lifecycle.uninstall(hook, &candidate, repo)? == UninstallOutcome::Success {
                report.deleted += 1;
            }
        }

        if let ResolvedSource::Active(active) = resolved {
            match mode {
                InstallMode::Replace => {
                    self.lifecycle
                        .install(hook, &active.source, repo, &active.config)?;
                    report.created += 1;
                }
                InstallMode::Ensure => {
                    match self
                        .lifecycle
                        .ensure_installed(hook, &active.source, repo, &active.config)?
                    {
                        InstallOutcome::Installed(_) => report.created += 1,
                        InstallOutcome::Unchanged(_) => report.unchanged += 1,
                    }
                }
            }
        }

        Ok(report)
    }

    /// Configuration stored for `hook` at `scope`, validated
    fn validated_config(
        &self,
        scope: &Scope,
        hook: HookKind,
        policies: &GlobalPolicies,
    ) -> Result<HookConfig> {
        let config = match scope {
            Scope::Global => policies.get(hook).map(|policy| policy.config.clone()),
            _ => self.host.configs.hook_config(scope, hook)?,
        };
        let config = config.ok_or_else(|| Error::ConfigurationMissing {
            hook,
            scope: scope.to_string(),
        })?;
        self.lifecycle.validate(&config)?;
        Ok(config)
    }

    /// Validate the configuration stored for `hook` at `scope`
    ///
    /// Returns the executable artifacts would run.
    pub fn validate(&self, scope: &Scope, hook: HookKind) -> Result<PathBuf> {
        let policies = self.snapshot()?;
        let config = self.validated_config(scope, hook, &policies)?;
        self.lifecycle.resolve_executable(&config)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::panic)]

    use super::*;
    use crate::artifacts::MemoryArtifactStore;
    use crate::environment::StaticEnvironment;
    use crate::memory::MemoryHost;
    use crate::privilege::LocalPrivilege;
    use crate::records::RecordKey;
    use crate::state::MockPersistentState;
    use hookwarden_core::{GlobalPolicy, PersonalRepoFilter, ScopeType, ValidationField};
    use std::fs;
    use tempfile::TempDir;

    struct World {
        _home: TempDir,
        host: MemoryHost,
        db: MockPersistentState,
        artifacts: MemoryArtifactStore,
        privilege: LocalPrivilege,
        environment: StaticEnvironment,
        triggers: TriggerSettings,
    }

    impl World {
        fn new() -> Self {
            let home = TempDir::new().unwrap();
            let dir = home.path().join(crate::lifecycle::SAFE_DIR);
            fs::create_dir_all(&dir).unwrap();
            for name in ["global.sh", "project.sh", "repo.sh"] {
                let path = dir.join(name);
                fs::write(&path, "#!/bin/sh\n").unwrap();
                #[cfg(unix)]
                {
                    use std::os::unix::fs::PermissionsExt;
                    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
                }
            }
            let environment = StaticEnvironment::new(home.path());
            Self {
                _home: home,
                host: MemoryHost::new(),
                db: MockPersistentState::new(),
                artifacts: MemoryArtifactStore::new(),
                privilege: LocalPrivilege::new(true),
                environment,
                triggers: TriggerSettings::default(),
            }
        }

        fn coordinator(&self) -> Coordinator<'_, MockPersistentState> {
            let host = Host {
                configs: &self.host,
                policies: &self.host,
                inventory: &self.host,
                artifacts: &self.artifacts,
                privilege: &self.privilege,
                environment: &self.environment,
            };
            Coordinator::new(host, &self.db, &self.triggers)
        }

        fn records_for(&self, repo: &RepositoryScope) -> Vec<RecordKey> {
            self.coordinator()
                .lifecycle()
                .records()
                .for_repository(repo.id)
                .unwrap()
                .into_iter()
                .map(|(key, _)| key)
                .collect()
        }
    }

    fn safe(name: &str) -> HookConfig {
        HookConfig::new(name).with_safe_mode(true)
    }

    #[test]
    fn test_project_enable_fans_out_to_children() {
        let w = World::new();
        let project = w.host.add_project(1, "TEAM");
        let a = w.host.add_repository(&project, 10, "a");
        let b = w.host.add_repository(&project, 11, "b");
        let scope = Scope::Project(project);
        w.host.enable(&scope, HookKind::PreReceive, safe("project.sh"));

        let report = w
            .coordinator()
            .handle(&HookEvent::Enabled {
                scope,
                hook: HookKind::PreReceive,
            })
            .unwrap();

        assert_eq!(report.created, 2);
        assert_eq!(report.failed, 0);
        for repo in [&a, &b] {
            let keys = w.records_for(repo);
            assert_eq!(keys.len(), 1);
            assert_eq!(keys[0].source_type, ScopeType::Project);
        }
    }

    #[test]
    fn test_enabled_without_config_is_reported() {
        let w = World::new();
        let project = w.host.add_project(1, "TEAM");
        let repo = w.host.add_repository(&project, 10, "a");
        let scope = Scope::Repository(repo);
        w.host.enable_without_config(&scope, HookKind::PreReceive);

        let err = w
            .coordinator()
            .handle(&HookEvent::Enabled {
                scope,
                hook: HookKind::PreReceive,
            })
            .unwrap_err();
        assert!(matches!(err, Error::ConfigurationMissing { .. }));
    }

    #[test]
    fn test_enabled_with_invalid_config_installs_nothing() {
        let w = World::new();
        let project = w.host.add_project(1, "TEAM");
        let repo = w.host.add_repository(&project, 10, "a");
        let scope = Scope::Repository(repo.clone());
        w.host.enable(&scope, HookKind::PreReceive, safe("missing.sh"));

        let err = w
            .coordinator()
            .handle(&HookEvent::Enabled {
                scope,
                hook: HookKind::PreReceive,
            })
            .unwrap_err();
        let Error::ConfigurationInvalid(invalid) = err else {
            panic!("expected a validation failure");
        };
        assert_eq!(invalid.field, ValidationField::Executable);
        assert!(w.records_for(&repo).is_empty());
    }

    #[test]
    fn test_global_policy_change_removes_filtered_records() {
        let w = World::new();
        let project = w.host.add_project(1, "TEAM");
        let shared = w.host.add_repository(&project, 10, "a");
        let personal = w.host.add_personal_repository("ann", 20, "notes");
        let mut policy = GlobalPolicy {
            hook: HookKind::PostReceive,
            enabled: true,
            config: safe("global.sh"),
            filter: PersonalRepoFilter::ApplyToAll,
        };
        w.host.set_policy(policy.clone());

        let coordinator = w.coordinator();
        let report = coordinator
            .handle(&HookEvent::Enabled {
                scope: Scope::Global,
                hook: HookKind::PostReceive,
            })
            .unwrap();
        assert_eq!(report.created, 2);

        policy.filter = PersonalRepoFilter::ExcludePersonal;
        w.host.set_policy(policy);
        let report = coordinator
            .handle(&HookEvent::GlobalPolicyChanged(HookKind::PostReceive))
            .unwrap();
        assert_eq!(report.deleted, 1);
        assert_eq!(report.unchanged, 1);
        assert!(w.records_for(&personal).is_empty());
        assert_eq!(w.records_for(&shared).len(), 1);
    }

    #[test]
    fn test_duplicate_delivery_is_harmless() {
        let w = World::new();
        let project = w.host.add_project(1, "TEAM");
        let repo = w.host.add_repository(&project, 10, "a");
        let scope = Scope::Project(project);
        w.host.enable(&scope, HookKind::MergeCheck, safe("project.sh"));
        let event = HookEvent::Enabled {
            scope,
            hook: HookKind::MergeCheck,
        };

        let coordinator = w.coordinator();
        coordinator.handle(&event).unwrap();
        let again = coordinator.handle(&event).unwrap();

        assert_eq!(again.created, 0);
        assert_eq!(again.unchanged, 1);
        assert_eq!(w.records_for(&repo).len(), 1);
        assert_eq!(w.artifacts.live_count(), 1);
    }

    #[test]
    fn test_unit_failures_are_counted_not_raised() {
        let w = World::new();
        let project = w.host.add_project(1, "TEAM");
        w.host.add_repository(&project, 10, "a");
        w.host.add_repository(&project, 11, "b");
        w.host.set_policy(GlobalPolicy {
            hook: HookKind::PreReceive,
            enabled: true,
            config: safe("global.sh"),
            filter: PersonalRepoFilter::ApplyToAll,
        });

        w.artifacts.set_unavailable(true);
        let report = w
            .coordinator()
            .handle(&HookEvent::GlobalPolicyChanged(HookKind::PreReceive))
            .unwrap();
        assert_eq!(report.units, 2);
        assert_eq!(report.failed, 2);
        assert!(!report.is_success());
        assert_eq!(w.privilege.held(), 0);
    }

    #[test]
    fn test_repository_created_resolves_every_kind() {
        let w = World::new();
        let project = w.host.add_project(1, "TEAM");
        w.host.enable(
            &Scope::Project(project.clone()),
            HookKind::PreReceive,
            safe("project.sh"),
        );
        w.host.set_policy(GlobalPolicy {
            hook: HookKind::MergeCheck,
            enabled: true,
            config: safe("global.sh"),
            filter: PersonalRepoFilter::ApplyToAll,
        });

        let repo = w.host.add_repository(&project, 10, "fresh");
        let report = w
            .coordinator()
            .handle(&HookEvent::RepositoryCreated(repo.clone()))
            .unwrap();

        assert_eq!(report.units, 3);
        assert_eq!(report.created, 2);
        let mut sources: Vec<_> = w
            .records_for(&repo)
            .into_iter()
            .map(|key| (key.hook, key.source_type))
            .collect();
        sources.sort();
        assert_eq!(
            sources,
            vec![
                (HookKind::PreReceive, ScopeType::Project),
                (HookKind::MergeCheck, ScopeType::Global),
            ]
        );
    }

    #[test]
    fn test_inherited_on_global_is_noop() {
        let w = World::new();
        let report = w
            .coordinator()
            .handle(&HookEvent::Inherited {
                scope: Scope::Global,
                hook: HookKind::PreReceive,
            })
            .unwrap();
        assert_eq!(report, TransitionReport::default());
    }

    #[test]
    fn test_validate_returns_resolved_executable() {
        let w = World::new();
        let project = w.host.add_project(1, "TEAM");
        let scope = Scope::Project(project);
        w.host.enable(&scope, HookKind::PreReceive, safe("project.sh"));

        let path = w.coordinator().validate(&scope, HookKind::PreReceive).unwrap();
        assert!(path.ends_with("external-hooks/project.sh"));
        assert!(matches!(
            w.coordinator().validate(&scope, HookKind::MergeCheck),
            Err(Error::ConfigurationMissing { .. })
        ));
    }

    #[test]
    fn test_foreign_hook_keys_are_ignored() {
        assert!(HookEvent::from_hook_key(HookChange::Enabled, Scope::Global, "other-plugin-hook").is_none());
        assert_eq!(
            HookEvent::from_hook_key(
                HookChange::Disabled,
                Scope::Global,
                "external-merge-check-hook"
            ),
            Some(HookEvent::Disabled {
                scope: Scope::Global,
                hook: HookKind::MergeCheck
            })
        );
    }
}
