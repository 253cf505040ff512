//! File-backed global hook policy
//!
//! The policy file holds one table per hook kind:
//!
//! ```toml
//! [pre-receive]
//! enabled = true
//! exe = "/opt/hooks/check-commit"
//! params = ["--strict"]
//! filterPersonalRepositories = "exclude-personal"
//! ```
//!
//! The file is read again for every snapshot, so an edit takes effect on the
//! next resolution without a restart.

use hookwarden_core::{
    Error, GlobalPolicies, GlobalPolicy, GlobalPolicySource, HookConfig, HookKind,
    PersonalRepoFilter, Result,
};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Personal-repository filter given by name or by the host's numeric id
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterSetting {
    /// Numeric id (0 = all, 1 = only personal, 2 = exclude personal)
    Id(u8),
    /// Named filter
    Name(PersonalRepoFilter),
}

impl Default for FilterSetting {
    fn default() -> Self {
        Self::Name(PersonalRepoFilter::default())
    }
}

impl FilterSetting {
    fn resolve(self) -> Result<PersonalRepoFilter> {
        match self {
            Self::Name(filter) => Ok(filter),
            Self::Id(id) => PersonalRepoFilter::from_id(id).ok_or_else(|| {
                Error::Message(format!("Unknown personal repository filter id: {id}"))
            }),
        }
    }
}

/// One global hook table
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GlobalHookEntry {
    /// Whether the policy is switched on
    #[serde(default)]
    pub enabled: bool,

    /// Executable to run
    #[serde(default)]
    pub exe: Option<String>,

    /// Arguments
    #[serde(default)]
    pub params: Vec<String>,

    /// Run without blocking
    #[serde(default, rename = "async")]
    pub run_async: bool,

    /// Resolve the executable under the sandboxed hooks directory
    #[serde(default)]
    pub safe_path: bool,

    /// Personal-repository filter
    #[serde(default)]
    pub filter_personal_repositories: FilterSetting,
}

impl GlobalHookEntry {
    fn into_policy(self, hook: HookKind) -> Result<GlobalPolicy> {
        Ok(GlobalPolicy {
            hook,
            enabled: self.enabled,
            config: HookConfig {
                executable_path: self.exe.unwrap_or_default(),
                arguments: self.params,
                run_async: self.run_async,
                safe_mode: self.safe_path,
            },
            filter: self.filter_personal_repositories.resolve()?,
        })
    }
}

/// Parse a policy document into a snapshot
///
/// Tables for hooks this coordinator does not manage are skipped with a warning.
pub fn parse_policies(content: &str) -> Result<GlobalPolicies> {
    let tables: IndexMap<String, GlobalHookEntry> = toml::from_str(content)
        .map_err(|e| Error::Message(format!("Failed to parse global hooks: {e}")))?;

    let mut policies = GlobalPolicies::new();
    for (name, entry) in tables {
        let Ok(hook) = name.parse::<HookKind>() else {
            tracing::warn!(table = %name, "Ignoring global settings for unknown hook");
            continue;
        };
        policies.insert(entry.into_policy(hook)?);
    }
    Ok(policies)
}

/// Global policy source reading a TOML file
#[derive(Debug, Clone)]
pub struct FilePolicySource {
    path: PathBuf,
}

impl FilePolicySource {
    /// Create a source for the given file
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the policy file
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl GlobalPolicySource for FilePolicySource {
    fn snapshot(&self) -> Result<GlobalPolicies> {
        if !self.path.exists() {
            tracing::debug!(path = %self.path.display(), "No global hooks file");
            return Ok(GlobalPolicies::new());
        }

        let content = fs::read_to_string(&self.path).map_err(|e| {
            Error::Message(format!(
                "Failed to read global hooks {}: {e}",
                self.path.display()
            ))
        })?;
        parse_policies(&content)
    }
}
