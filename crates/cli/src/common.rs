//! Common utilities and types shared across CLI commands

use crate::error::{CommandError, Result};
use hookwarden_config::inventory::personal_project_key;
use hookwarden_config::{Config, FilePolicySource, HostInventory};
use hookwarden_core::{ProjectScope, RepositoryId, RepositoryScope, Scope};
use hookwarden_engine::database::open_db;
use hookwarden_engine::{
    Coordinator, FsArtifactStore, Host, LaunchBarrier, LaunchSignal, LocalPrivilege,
    RedbPersistentState, ScriptRecords, StaticEnvironment,
};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// A `--scope` argument before it is looked up in the inventory
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScopeArg {
    /// `global`
    Global,
    /// `project:KEY`
    Project(String),
    /// `repo:KEY/slug`, or `user:NAME/slug` stored as `~NAME/slug`
    Repository(String),
}

impl FromStr for ScopeArg {
    type Err = CommandError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || CommandError::InvalidScope(s.to_string());

        if s == "global" {
            return Ok(Self::Global);
        }
        let (kind, rest) = s.split_once(':').ok_or_else(invalid)?;
        if rest.is_empty() {
            return Err(invalid());
        }
        match kind {
            "project" => Ok(Self::Project(rest.to_string())),
            "repo" => Ok(Self::Repository(RepositoryArg::from_str(rest)?.0)),
            "user" => Ok(Self::Repository(RepositoryArg::from_str(&format!("~{rest}"))?.0)),
            _ => Err(invalid()),
        }
    }
}

impl fmt::Display for ScopeArg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Global => f.write_str("global"),
            Self::Project(key) => write!(f, "project:{key}"),
            Self::Repository(path) => match path.strip_prefix('~') {
                Some(personal) => write!(f, "user:{personal}"),
                None => write!(f, "repo:{path}"),
            },
        }
    }
}

/// A `--repo` argument: `KEY/slug` or `~user/slug`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryArg(pub String);

impl RepositoryArg {
    fn parts(&self) -> (&str, &str) {
        self.0.split_once('/').unwrap_or((self.0.as_str(), ""))
    }

    /// Build a repository scope for a repository no longer in the inventory
    ///
    /// Only the id matters for cleanup; the project id is unknown and left at 0.
    pub fn detached(&self, id: u64) -> RepositoryScope {
        let (owner, slug) = self.parts();
        match owner.strip_prefix('~') {
            Some(user) => {
                RepositoryScope::personal(id, slug, ProjectScope::new(0, personal_project_key(user)))
            }
            None => RepositoryScope::new(id, slug, ProjectScope::new(0, owner)),
        }
    }
}

impl FromStr for RepositoryArg {
    type Err = CommandError;

    fn from_str(s: &str) -> Result<Self> {
        match s.split_once('/') {
            Some((owner, slug))
                if !owner.is_empty() && owner != "~" && !slug.is_empty() && !slug.contains('/') =>
            {
                Ok(Self(s.to_string()))
            }
            _ => Err(CommandError::InvalidScope(s.to_string())),
        }
    }
}

impl fmt::Display for RepositoryArg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Runtime context for CLI commands
///
/// Owns every collaborator the engine borrows: the record database, the host
/// inventory, the global policy file, the artifact directory and the
/// privilege and environment providers.
pub struct RuntimeContext {
    /// Shared configuration
    pub config: Arc<Config>,
    /// Script record store
    pub database: RedbPersistentState,
    /// Host inventory and per-scope hook settings
    pub inventory: HostInventory,
    /// Global hook policies
    pub policies: FilePolicySource,
    /// Installed hook scripts
    pub artifacts: FsArtifactStore,
    /// Elevated-privilege provider
    pub privilege: LocalPrivilege,
    /// Host facts
    pub environment: StaticEnvironment,
    /// Startup barrier, signalled as each collaborator comes up
    pub barrier: LaunchBarrier,
}

impl RuntimeContext {
    /// Open every collaborator named by `config`
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened, the inventory cannot
    /// be parsed, or the artifact directory cannot be created.
    pub fn load(config: Config) -> Result<Self> {
        let barrier = LaunchBarrier::new();
        let environment = StaticEnvironment::from_config(&config)?;
        let privilege = LocalPrivilege::new(config.general.elevation);
        barrier.signal(LaunchSignal::ConfigLoaded);

        let state_dir = config.state_dir()?;
        let database = open_db(&state_dir)?;
        let recorded = ScriptRecords::new(&database).highest_artifact()?;
        let artifacts = FsArtifactStore::open_after(config.artifact_dir()?, recorded)?;
        barrier.signal(LaunchSignal::StoreOpened);

        let inventory = HostInventory::load(&config.inventory_path()?)?;
        let policies = FilePolicySource::new(config.global_hooks_path()?);
        barrier.signal(LaunchSignal::HostReady);

        tracing::debug!(
            state_dir = %state_dir.display(),
            artifacts = %artifacts.dir().display(),
            policies = %policies.path().display(),
            "Runtime context ready"
        );

        Ok(Self {
            config: Arc::new(config),
            database,
            inventory,
            policies,
            artifacts,
            privilege,
            environment,
            barrier,
        })
    }

    /// Coordinator wired to this context
    pub fn coordinator(&self) -> Coordinator<'_, RedbPersistentState> {
        Coordinator::new(
            Host {
                configs: &self.inventory,
                policies: &self.policies,
                inventory: &self.inventory,
                artifacts: &self.artifacts,
                privilege: &self.privilege,
                environment: &self.environment,
            },
            &self.database,
            &self.config.triggers,
        )
    }

    /// Look a scope argument up in the inventory
    pub fn scope(&self, arg: &ScopeArg) -> Result<Scope> {
        match arg {
            ScopeArg::Global => Ok(Scope::Global),
            ScopeArg::Project(key) => self
                .inventory
                .find_project(key)
                .cloned()
                .map(Scope::Project)
                .ok_or_else(|| CommandError::UnknownScope {
                    kind: "project",
                    name: key.clone(),
                }),
            ScopeArg::Repository(path) => self
                .repository(&RepositoryArg(path.clone()))
                .map(Scope::Repository),
        }
    }

    /// Look a repository argument up in the inventory
    pub fn repository(&self, arg: &RepositoryArg) -> Result<RepositoryScope> {
        self.inventory
            .find_repository(&arg.0)
            .cloned()
            .ok_or_else(|| CommandError::UnknownScope {
                kind: "repository",
                name: arg.0.clone(),
            })
    }

    /// Display name of a repository id, falling back to the bare id
    pub fn repository_label(&self, id: RepositoryId) -> String {
        self.inventory
            .repositories()
            .find(|r| r.id == id)
            .map_or_else(|| format!("#{id}"), ToString::to_string)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::panic)]
    use super::*;

    #[test]
    fn test_parse_scope_forms() {
        assert_eq!("global".parse::<ScopeArg>().unwrap(), ScopeArg::Global);
        assert_eq!(
            "project:TEAM".parse::<ScopeArg>().unwrap(),
            ScopeArg::Project("TEAM".to_string())
        );
        assert_eq!(
            "repo:TEAM/app".parse::<ScopeArg>().unwrap(),
            ScopeArg::Repository("TEAM/app".to_string())
        );
        assert_eq!(
            "user:ann/notes".parse::<ScopeArg>().unwrap(),
            ScopeArg::Repository("~ann/notes".to_string())
        );
    }

    #[test]
    fn test_parse_scope_rejects_malformed() {
        for bad in ["", "GLOBAL", "project:", "repo:TEAM", "repo:/app", "team:X", "user:ann"] {
            assert!(
                matches!(bad.parse::<ScopeArg>(), Err(CommandError::InvalidScope(_))),
                "{bad} should be rejected"
            );
        }
    }

    #[test]
    fn test_scope_display_round_trips_user_form() {
        let arg: ScopeArg = "user:ann/notes".parse().unwrap();
        assert_eq!(arg.to_string(), "user:ann/notes");
        let arg: ScopeArg = "repo:TEAM/app".parse().unwrap();
        assert_eq!(arg.to_string(), "repo:TEAM/app");
    }

    #[test]
    fn test_detached_repository() {
        let repo = "TEAM/app".parse::<RepositoryArg>().unwrap().detached(42);
        assert_eq!(repo.id, RepositoryId(42));
        assert_eq!(repo.project.key, "TEAM");
        assert!(!repo.personal);

        let repo = "~ann/notes".parse::<RepositoryArg>().unwrap().detached(7);
        assert!(repo.personal);
        assert_eq!(repo.project.key, personal_project_key("ann"));
        assert_eq!(repo.slug, "notes");
    }
}
