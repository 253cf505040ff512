//! Script lifecycle
//!
//! Creates, replaces and deletes the single artifact behind each script record.
//! Each artifact create or delete runs under its own [`Elevated`] guard, and the
//! record bucket is only ever written from here.

use crate::privilege::Elevated;
use crate::records::{RecordKey, ScriptRecord, ScriptRecords, fingerprint};
use crate::state::PersistentState;
use hookwarden_config::TriggerSettings;
use hookwarden_core::{
    ArtifactId, ArtifactRequest, ArtifactStore, HookConfig, HookKind, HostEnvironment,
    PrivilegeProvider, RepositoryScope, Result, Scope, ValidationError,
};
use std::path::{Component, Path, PathBuf};

/// Directory under the home directory that holds safe-mode executables
pub const SAFE_DIR: &str = "external-hooks";

/// Result of an idempotent install
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallOutcome {
    /// A new artifact was created
    Installed(ArtifactId),
    /// The recorded artifact already matches the configuration
    Unchanged(ArtifactId),
}

impl InstallOutcome {
    /// Artifact now backing the record
    pub fn artifact(self) -> ArtifactId {
        match self {
            Self::Installed(id) | Self::Unchanged(id) => id,
        }
    }
}

/// Result of an uninstall
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UninstallOutcome {
    /// The artifact was deleted and its record removed
    Success,
    /// Nothing was installed, or the artifact was already gone
    AlreadyAbsent,
}

/// Collaborators the lifecycle writes through
#[derive(Clone, Copy)]
pub struct LifecycleDeps<'a> {
    /// Artifact store
    pub artifacts: &'a dyn ArtifactStore,
    /// Elevated privilege for artifact operations
    pub privilege: &'a dyn PrivilegeProvider,
    /// Deployment facts for validation
    pub environment: &'a dyn HostEnvironment,
    /// Trigger bindings per hook kind
    pub triggers: &'a TriggerSettings,
}

/// Idempotent install and uninstall over the record and artifact stores
pub struct ScriptLifecycle<'a, P: PersistentState> {
    records: ScriptRecords<'a, P>,
    deps: LifecycleDeps<'a>,
}

impl<'a, P: PersistentState> ScriptLifecycle<'a, P> {
    /// Create a lifecycle over a state store
    pub fn new(db: &'a P, deps: LifecycleDeps<'a>) -> Self {
        Self {
            records: ScriptRecords::new(db),
            deps,
        }
    }

    /// Typed view of the record bucket
    pub fn records(&self) -> &ScriptRecords<'a, P> {
        &self.records
    }

    /// Install `config` for `hook` in `repository`, sourced from `source`
    ///
    /// Any artifact already recorded under the same key is deleted first. Calling
    /// this twice with the same arguments leaves one equivalent artifact.
    pub fn install(
        &self,
        hook: HookKind,
        source: &Scope,
        repository: &RepositoryScope,
        config: &HookConfig,
    ) -> Result<ArtifactId> {
        let key = RecordKey::new(hook, source, repository);
        let triggers = self.deps.triggers.triggers_for(hook);
        let executable = self.resolve_executable(config)?;

        if let Some(previous) = self.records.get(&key)? {
            let removed = {
                let _elevated = Elevated::acquire(self.deps.privilege, "replace hook script")?;
                self.deps.artifacts.delete(previous.artifact())?
            };
            if !removed {
                tracing::debug!(key = %key, artifact_id = %previous.artifact(), "Replaced artifact was already absent");
            }
            self.records.remove(&key)?;
        }

        let request = ArtifactRequest {
            hook,
            script_type: hook.script_type(),
            repository,
            source,
            config,
            executable: &executable,
        };
        let id = {
            let _elevated = Elevated::acquire(self.deps.privilege, "install hook script")?;
            self.deps.artifacts.create(&request)?
        };
        self.records
            .put(&key, &ScriptRecord::new(id, fingerprint(config, &triggers)))?;
        self.deps.artifacts.bind_triggers(id, repository, &triggers)?;

        tracing::info!(
            hook = %hook,
            source = %source,
            repository = %repository,
            artifact_id = %id,
            "Installed hook script"
        );
        Ok(id)
    }

    /// Install unless the recorded artifact already runs exactly this
    /// configuration with the current triggers
    pub fn ensure_installed(
        &self,
        hook: HookKind,
        source: &Scope,
        repository: &RepositoryScope,
        config: &HookConfig,
    ) -> Result<InstallOutcome> {
        let key = RecordKey::new(hook, source, repository);
        if let Some(existing) = self.records.get(&key)? {
            let wanted = fingerprint(config, &self.deps.triggers.triggers_for(hook));
            if existing.fingerprint == wanted {
                tracing::trace!(key = %key, "Hook script up to date");
                return Ok(InstallOutcome::Unchanged(existing.artifact()));
            }
        }
        self.install(hook, source, repository, config)
            .map(InstallOutcome::Installed)
    }

    /// Remove the artifact recorded for `hook` in `repository` from `source`
    pub fn uninstall(
        &self,
        hook: HookKind,
        source: &Scope,
        repository: &RepositoryScope,
    ) -> Result<UninstallOutcome> {
        self.uninstall_key(&RecordKey::new(hook, source, repository))
    }

    /// Remove the artifact recorded under `key`
    ///
    /// The record is dropped whether or not the artifact still existed. If the
    /// artifact store fails the record is kept so a later rebuild can retry.
    pub fn uninstall_key(&self, key: &RecordKey) -> Result<UninstallOutcome> {
        let Some(record) = self.records.get(key)? else {
            tracing::debug!(key = %key, "Hook script already absent");
            return Ok(UninstallOutcome::AlreadyAbsent);
        };

        let removed = {
            let _elevated = Elevated::acquire(self.deps.privilege, "remove hook script")?;
            self.deps.artifacts.delete(record.artifact())?
        };
        self.records.remove(key)?;

        if removed {
            tracing::info!(key = %key, artifact_id = %record.artifact(), "Removed hook script");
            Ok(UninstallOutcome::Success)
        } else {
            tracing::debug!(key = %key, artifact_id = %record.artifact(), "Hook script already absent");
            Ok(UninstallOutcome::AlreadyAbsent)
        }
    }

    /// Check a configuration before it is accepted
    ///
    /// Returns the resolved executable on success.
    pub fn validate(&self, config: &HookConfig) -> std::result::Result<PathBuf, ValidationError> {
        validate(self.deps.environment, config)
    }

    /// Executable an artifact should run for `config`
    pub fn resolve_executable(&self, config: &HookConfig) -> Result<PathBuf> {
        Ok(resolve_executable(self.deps.environment.home_dir(), config)?)
    }
}

/// Validate a configuration against the deployment
pub fn validate(
    environment: &dyn HostEnvironment,
    config: &HookConfig,
) -> std::result::Result<PathBuf, ValidationError> {
    if !config.has_executable() {
        return Err(ValidationError::executable(
            "Executable is blank, please specify something",
        ));
    }

    if !config.safe_mode {
        if environment.is_clustered() {
            return Err(ValidationError::safe_mode(
                "The host is running as a cluster. You must use the \"safe mode\" option.",
            ));
        }
        if !environment.caller_is_admin() {
            return Err(ValidationError::safe_mode(
                "You should be a system administrator to edit this hook without safe mode",
            ));
        }
    }

    let executable = resolve_executable(environment.home_dir(), config)?;
    let metadata = std::fs::metadata(&executable)
        .map_err(|_| ValidationError::executable("Executable does not exist"))?;
    if !metadata.is_file() || !is_executable(&metadata) {
        return Err(ValidationError::executable(
            "Specified path is not executable file. Check executable flag.",
        ));
    }
    Ok(executable)
}

#[cfg(unix)]
fn is_executable(metadata: &std::fs::Metadata) -> bool {
    use std::os::unix::fs::PermissionsExt;
    metadata.permissions().mode() & 0o111 != 0
}

#[cfg(not(unix))]
fn is_executable(_metadata: &std::fs::Metadata) -> bool {
    true
}

/// Resolve the executable a configuration names
///
/// Safe-mode paths are taken relative to `<home>/external-hooks`; a path that
/// climbs out of that directory does not exist as far as the caller is
/// concerned.
pub fn resolve_executable(
    home: &Path,
    config: &HookConfig,
) -> std::result::Result<PathBuf, ValidationError> {
    let exe = config.executable_path.trim();
    if !config.safe_mode {
        return Ok(PathBuf::from(exe));
    }

    let mut relative = PathBuf::new();
    for component in Path::new(exe).components() {
        match component {
            Component::Normal(part) => relative.push(part),
            Component::CurDir | Component::RootDir | Component::Prefix(_) => {}
            Component::ParentDir => {
                if !relative.pop() {
                    return Err(ValidationError::executable("Executable does not exist"));
                }
            }
        }
    }
    if relative.as_os_str().is_empty() {
        return Err(ValidationError::executable("Executable does not exist"));
    }
    Ok(home.join(SAFE_DIR).join(relative))
}
