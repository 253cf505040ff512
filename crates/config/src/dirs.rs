//! XDG directory utilities
//!
//! Default locations follow the XDG Base Directory specification:
//! - `XDG_CONFIG_HOME` defaults to ~/.config
//! - `XDG_DATA_HOME` defaults to ~/.local/share
//! - `XDG_STATE_HOME` defaults to ~/.local/state

use std::path::PathBuf;
use xdg::BaseDirectories;

const PREFIX: &str = "hookwarden";

/// Get the hookwarden config directory
///
/// Returns `$XDG_CONFIG_HOME/hookwarden` or `~/.config/hookwarden`
#[must_use]
pub fn config_dir() -> Option<PathBuf> {
    BaseDirectories::with_prefix(PREFIX).get_config_home()
}

/// Get the hookwarden data directory
///
/// Safe-mode executables are looked up below this directory unless the
/// configuration names another home.
#[must_use]
pub fn data_dir() -> Option<PathBuf> {
    BaseDirectories::with_prefix(PREFIX).get_data_home()
}

/// Get the hookwarden state directory
///
/// Holds the script record database and the file-backed artifact store.
#[must_use]
pub fn state_dir() -> Option<PathBuf> {
    BaseDirectories::with_prefix(PREFIX).get_state_home()
}

/// Get the default config file path
#[must_use]
pub fn default_config_file() -> Option<PathBuf> {
    config_dir().map(|d| d.join("hookwarden.toml"))
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::panic)]
    use super::*;

    #[test]
    fn test_dirs_contain_prefix() {
        for dir in [config_dir(), data_dir(), state_dir()].into_iter().flatten() {
            assert!(
                dir.to_string_lossy().contains("hookwarden"),
                "path should contain 'hookwarden': {dir:?}"
            );
            assert!(dir.is_absolute(), "path should be absolute: {dir:?}");
        }
    }

    #[test]
    fn test_default_config_file_is_child_of_config_dir() {
        if let (Some(dir), Some(file)) = (config_dir(), default_config_file()) {
            assert!(file.starts_with(&dir));
            assert_eq!(
                file.file_name().and_then(|n| n.to_str()),
                Some("hookwarden.toml")
            );
        }
    }

    #[test]
    fn test_state_and_data_dirs_differ() {
        if let (Some(data), Some(state)) = (data_dir(), state_dir()) {
            assert_ne!(data, state);
        }
    }
}
