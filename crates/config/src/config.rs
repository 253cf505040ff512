//! Configuration management
//!
//! This module handles loading hookwarden configuration from `hookwarden.toml`.

use crate::Result;
use crate::triggers::TriggerSettings;
use hookwarden_core::Error;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// General configuration section
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneralConfig {
    /// Directory holding the script record database
    #[serde(default)]
    pub state_dir: Option<PathBuf>,

    /// Home directory; safe-mode executables live in `<homeDir>/external-hooks`
    #[serde(default)]
    pub home_dir: Option<PathBuf>,

    /// Directory of the file-backed artifact store
    #[serde(default)]
    pub artifact_dir: Option<PathBuf>,

    /// Host description (projects, users, repositories and their hook settings)
    #[serde(default)]
    pub inventory: Option<PathBuf>,

    /// Global hook policy file
    #[serde(default)]
    pub global_hooks: Option<PathBuf>,

    /// Whether the host runs as a cluster
    #[serde(default)]
    pub clustered: bool,

    /// Number of cluster nodes
    #[serde(default = "default_nodes")]
    pub nodes: usize,

    /// Upper bound of the randomized startup delay, in seconds
    #[serde(default = "default_startup_offset")]
    pub startup_offset_secs: u64,

    /// Whether the elevated-privilege capability can be acquired
    #[serde(default = "default_elevation")]
    pub elevation: bool,

    /// Whether the acting caller is a system administrator
    #[serde(default)]
    pub admin: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            state_dir: None,
            home_dir: None,
            artifact_dir: None,
            inventory: None,
            global_hooks: None,
            clustered: false,
            nodes: default_nodes(),
            startup_offset_secs: default_startup_offset(),
            elevation: default_elevation(),
            admin: false,
        }
    }
}

fn default_nodes() -> usize {
    1
}

fn default_startup_offset() -> u64 {
    10
}

fn default_elevation() -> bool {
    true
}

/// Hookwarden configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// General configuration section
    #[serde(default)]
    pub general: GeneralConfig,

    /// Trigger overrides
    #[serde(default)]
    pub triggers: TriggerSettings,

    /// Directory relative paths resolve against (not serialized)
    #[serde(skip)]
    base_dir: Option<PathBuf>,
}

impl Config {
    /// Load configuration from a file
    ///
    /// Relative paths inside the file resolve against the file's directory.
    ///
    /// # Errors
    ///
    /// Returns error if file cannot be read or TOML parsing fails
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            Error::Message(format!("Failed to read config file {}: {e}", path.display()))
        })?;

        let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
        Self::from_toml_str(&content, base_dir).map_err(|e| {
            Error::Message(format!("Failed to parse config file {}: {e}", path.display()))
        })
    }

    /// Load configuration from a TOML string
    ///
    /// # Errors
    ///
    /// Returns error if TOML parsing fails
    pub fn from_toml_str(toml_content: &str, base_dir: &Path) -> Result<Self> {
        let mut config: Self = toml::from_str(toml_content)
            .map_err(|e| Error::Message(format!("Failed to parse config TOML: {e}")))?;
        config.resolve_relative_paths(base_dir);
        Ok(config)
    }

    /// Load the file at `path`, or the default location, or fall back to defaults
    ///
    /// An explicitly named file must exist; a missing default file is not an error.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            return Self::load(path);
        }

        match crate::dirs::default_config_file() {
            Some(default) if default.exists() => Self::load(default),
            _ => {
                tracing::debug!("No config file found, using defaults");
                let mut config = Self::default();
                if let Some(dir) = crate::dirs::config_dir() {
                    config.base_dir = Some(dir);
                }
                Ok(config)
            }
        }
    }

    fn resolve_relative_paths(&mut self, base_dir: &Path) {
        self.base_dir = Some(base_dir.to_path_buf());

        let general = &mut self.general;
        for path in [
            &mut general.state_dir,
            &mut general.home_dir,
            &mut general.artifact_dir,
            &mut general.inventory,
            &mut general.global_hooks,
        ]
        .into_iter()
        .flatten()
        {
            *path = resolve_path(path, base_dir);
        }
    }

    fn base_dir(&self) -> Result<PathBuf> {
        self.base_dir
            .clone()
            .or_else(crate::dirs::config_dir)
            .ok_or_else(|| Error::Message("Cannot determine config directory".to_string()))
    }

    /// Directory holding the script record database
    pub fn state_dir(&self) -> Result<PathBuf> {
        self.general
            .state_dir
            .clone()
            .or_else(crate::dirs::state_dir)
            .ok_or_else(|| Error::Message("Cannot determine state directory".to_string()))
    }

    /// Home directory used for safe-mode executable resolution
    pub fn home_dir(&self) -> Result<PathBuf> {
        self.general
            .home_dir
            .clone()
            .or_else(crate::dirs::data_dir)
            .ok_or_else(|| Error::Message("Cannot determine home directory".to_string()))
    }

    /// Directory of the file-backed artifact store
    pub fn artifact_dir(&self) -> Result<PathBuf> {
        match &self.general.artifact_dir {
            Some(dir) => Ok(dir.clone()),
            None => Ok(self.state_dir()?.join("artifacts")),
        }
    }

    /// Path of the host description file
    pub fn inventory_path(&self) -> Result<PathBuf> {
        match &self.general.inventory {
            Some(path) => Ok(path.clone()),
            None => Ok(self.base_dir()?.join("inventory.toml")),
        }
    }

    /// Path of the global hook policy file
    pub fn global_hooks_path(&self) -> Result<PathBuf> {
        match &self.general.global_hooks {
            Some(path) => Ok(path.clone()),
            None => Ok(self.base_dir()?.join("global-hooks.toml")),
        }
    }
}

/// Expand `~` and resolve a relative path against `base_dir`
fn resolve_path(path: &Path, base_dir: &Path) -> PathBuf {
    let path_str = path.to_string_lossy();

    if let Some(stripped) = path_str.strip_prefix("~/") {
        if let Some(home) = ::dirs::home_dir() {
            return home.join(stripped);
        }
    } else if path_str == "~"
        && let Some(home) = ::dirs::home_dir()
    {
        return home;
    }

    if path.is_relative() {
        base_dir.join(path)
    } else {
        path.to_path_buf()
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::panic)]

    use super::*;
    use hookwarden_core::{HookKind, Trigger};

    #[test]
    fn test_defaults() {
        let config = Config::from_toml_str("", Path::new("/etc/hookwarden")).unwrap();
        assert_eq!(config.general.nodes, 1);
        assert_eq!(config.general.startup_offset_secs, 10);
        assert!(config.general.elevation);
        assert!(!config.general.clustered);
        assert!(!config.general.admin);
        assert_eq!(
            config.inventory_path().unwrap(),
            PathBuf::from("/etc/hookwarden/inventory.toml")
        );
        assert_eq!(
            config.global_hooks_path().unwrap(),
            PathBuf::from("/etc/hookwarden/global-hooks.toml")
        );
    }

    #[test]
    fn test_relative_paths_resolve_against_base() {
        let config = Config::from_toml_str(
            r#"
[general]
stateDir = "state"
homeDir = "/srv/shared"
artifactDir = "./scripts"
"#,
            Path::new("/etc/hookwarden"),
        )
        .unwrap();

        assert_eq!(
            config.state_dir().unwrap(),
            PathBuf::from("/etc/hookwarden/state")
        );
        assert_eq!(config.home_dir().unwrap(), PathBuf::from("/srv/shared"));
        assert_eq!(
            config.artifact_dir().unwrap(),
            PathBuf::from("/etc/hookwarden/./scripts")
        );
    }

    #[test]
    fn test_artifact_dir_defaults_under_state_dir() {
        let config = Config::from_toml_str(
            "[general]\nstateDir = \"/var/lib/hookwarden\"\n",
            Path::new("/etc"),
        )
        .unwrap();
        assert_eq!(
            config.artifact_dir().unwrap(),
            PathBuf::from("/var/lib/hookwarden/artifacts")
        );
    }

    #[test]
    fn test_cluster_and_triggers() {
        let config = Config::from_toml_str(
            r#"
[general]
clustered = true
nodes = 3
startupOffsetSecs = 30
admin = true

[triggers]
mergeCheck = ["pull-request-merge"]
preReceive = ["repo-push"]
"#,
            Path::new("/"),
        )
        .unwrap();

        assert!(config.general.clustered);
        assert_eq!(config.general.nodes, 3);
        assert_eq!(config.general.startup_offset_secs, 30);
        assert!(config.general.admin);
        assert_eq!(
            config.triggers.triggers_for(HookKind::PreReceive),
            vec![Trigger::RepoPush]
        );
    }

    #[test]
    fn test_invalid_toml_is_rejected() {
        let err = Config::from_toml_str("[general\nnodes = ", Path::new("/")).unwrap_err();
        assert!(err.to_string().contains("Failed to parse config TOML"));
    }
}
