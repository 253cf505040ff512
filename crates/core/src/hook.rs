//! Hook kinds, triggers and hook configuration

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Plugin namespace prepended to hook ids by the host
pub const PLUGIN_KEY: &str = "com.ngs.stash.externalhooks.external-hooks";

/// The hook kinds this coordinator manages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HookKind {
    /// Runs before refs are updated and may reject the push
    PreReceive,
    /// Runs after refs are updated
    PostReceive,
    /// Gates pull request merges
    MergeCheck,
}

/// Whether a script runs before or after the change is accepted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScriptType {
    /// Pre-acceptance script
    Pre,
    /// Post-acceptance script
    Post,
}

impl HookKind {
    /// Every managed hook kind, in resolution order
    pub const ALL: [HookKind; 3] = [Self::PreReceive, Self::PostReceive, Self::MergeCheck];

    /// Host hook id
    pub fn key(self) -> &'static str {
        match self {
            Self::PreReceive => "external-pre-receive-hook",
            Self::PostReceive => "external-post-receive-hook",
            Self::MergeCheck => "external-merge-check-hook",
        }
    }

    /// Short name used in configuration files and on the command line
    pub fn name(self) -> &'static str {
        match self {
            Self::PreReceive => "pre-receive",
            Self::PostReceive => "post-receive",
            Self::MergeCheck => "merge-check",
        }
    }

    /// Map a host hook key to a managed kind
    ///
    /// Accepts the bare id and the plugin-qualified `plugin:id` form. Keys of
    /// hooks this coordinator does not manage yield `None`.
    pub fn from_key(key: &str) -> Option<Self> {
        let id = key
            .strip_prefix(PLUGIN_KEY)
            .and_then(|rest| rest.strip_prefix(':'))
            .unwrap_or(key);
        Self::ALL.into_iter().find(|kind| kind.key() == id)
    }

    /// Script type of the artifact installed for this kind
    pub fn script_type(self) -> ScriptType {
        match self {
            Self::PostReceive => ScriptType::Post,
            Self::PreReceive | Self::MergeCheck => ScriptType::Pre,
        }
    }

    /// Triggers bound when no override is configured
    pub fn default_triggers(self) -> &'static [Trigger] {
        const PUSH_TRIGGERS: &[Trigger] = &[
            Trigger::RepoPush,
            Trigger::FileEdit,
            Trigger::TagDelete,
            Trigger::TagCreate,
            Trigger::BranchDelete,
            Trigger::BranchCreate,
        ];
        const POST_TRIGGERS: &[Trigger] = &[
            Trigger::RepoPush,
            Trigger::FileEdit,
            Trigger::TagDelete,
            Trigger::TagCreate,
            Trigger::BranchDelete,
            Trigger::BranchCreate,
            Trigger::PullRequestMerge,
        ];

        match self {
            Self::PreReceive => PUSH_TRIGGERS,
            Self::PostReceive => POST_TRIGGERS,
            Self::MergeCheck => &[Trigger::PullRequestMerge],
        }
    }
}

impl fmt::Display for HookKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for HookKind {
    type Err = Error;

    /// Parses either the short name (`pre-receive`) or a host hook key
    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.name() == s)
            .or_else(|| Self::from_key(s))
            .ok_or_else(|| Error::Message(format!("Unknown hook: {s}")))
    }
}

/// Host events an installed script is bound to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Trigger {
    /// Push to the repository
    RepoPush,
    /// File edited through the web interface
    FileEdit,
    /// Tag created
    TagCreate,
    /// Tag deleted
    TagDelete,
    /// Branch created
    BranchCreate,
    /// Branch deleted
    BranchDelete,
    /// Pull request merged
    PullRequestMerge,
}

impl Trigger {
    /// Every known trigger
    pub const ALL: [Trigger; 7] = [
        Self::RepoPush,
        Self::FileEdit,
        Self::TagCreate,
        Self::TagDelete,
        Self::BranchCreate,
        Self::BranchDelete,
        Self::PullRequestMerge,
    ];

    /// Host trigger id
    pub fn id(self) -> &'static str {
        match self {
            Self::RepoPush => "repo-push",
            Self::FileEdit => "file-edit",
            Self::TagCreate => "tag-create",
            Self::TagDelete => "tag-delete",
            Self::BranchCreate => "branch-create",
            Self::BranchDelete => "branch-delete",
            Self::PullRequestMerge => "pull-request-merge",
        }
    }

    /// Look up a trigger by host id
    pub fn from_id(id: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|trigger| trigger.id() == id)
    }
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

/// Configuration of an external hook at one scope
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HookConfig {
    /// Executable to run
    #[serde(rename = "exe")]
    pub executable_path: String,

    /// Arguments passed to the executable, one per entry
    #[serde(default, rename = "params")]
    pub arguments: Vec<String>,

    /// Run without blocking the triggering operation
    #[serde(default, rename = "async")]
    pub run_async: bool,

    /// Resolve the executable under the sandboxed hooks directory
    #[serde(default, rename = "safePath")]
    pub safe_mode: bool,
}

impl HookConfig {
    /// Create a configuration with no arguments
    pub fn new(executable_path: impl Into<String>) -> Self {
        Self {
            executable_path: executable_path.into(),
            arguments: Vec::new(),
            run_async: false,
            safe_mode: false,
        }
    }

    /// Set the arguments
    #[must_use]
    pub fn with_arguments<I, S>(mut self, arguments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.arguments = arguments.into_iter().map(Into::into).collect();
        self
    }

    /// Set the safe-mode flag
    #[must_use]
    pub fn with_safe_mode(mut self, safe_mode: bool) -> Self {
        self.safe_mode = safe_mode;
        self
    }

    /// Set the async flag
    #[must_use]
    pub fn with_async(mut self, run_async: bool) -> Self {
        self.run_async = run_async;
        self
    }

    /// Split a host parameter blob into arguments
    ///
    /// The host stores parameters as one text field with CRLF line endings.
    /// Empty lines are kept so positional arguments survive.
    pub fn parse_params(params: &str) -> Vec<String> {
        if params.is_empty() {
            return Vec::new();
        }
        params.split("\r\n").map(str::to_string).collect()
    }

    /// Whether an executable is named at all
    pub fn has_executable(&self) -> bool {
        !self.executable_path.trim().is_empty()
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::panic)]

    use super::*;

    #[test]
    fn test_from_key_accepts_bare_and_qualified() {
        assert_eq!(
            HookKind::from_key("external-merge-check-hook"),
            Some(HookKind::MergeCheck)
        );
        assert_eq!(
            HookKind::from_key(
                "com.ngs.stash.externalhooks.external-hooks:external-post-receive-hook"
            ),
            Some(HookKind::PostReceive)
        );
        assert_eq!(HookKind::from_key("some-other-plugin:hook"), None);
    }

    #[test]
    fn test_parse_short_names() {
        assert_eq!("pre-receive".parse::<HookKind>().unwrap(), HookKind::PreReceive);
        assert_eq!(
            "external-pre-receive-hook".parse::<HookKind>().unwrap(),
            HookKind::PreReceive
        );
        assert!("post-commit".parse::<HookKind>().is_err());
    }

    #[test]
    fn test_default_triggers() {
        let pre = HookKind::PreReceive.default_triggers();
        assert_eq!(pre.len(), 6);
        assert!(!pre.contains(&Trigger::PullRequestMerge));

        let post = HookKind::PostReceive.default_triggers();
        assert_eq!(post.len(), 7);
        assert!(post.contains(&Trigger::PullRequestMerge));

        assert_eq!(
            HookKind::MergeCheck.default_triggers(),
            &[Trigger::PullRequestMerge]
        );
    }

    #[test]
    fn test_script_type() {
        assert_eq!(HookKind::PostReceive.script_type(), ScriptType::Post);
        assert_eq!(HookKind::PreReceive.script_type(), ScriptType::Pre);
        assert_eq!(HookKind::MergeCheck.script_type(), ScriptType::Pre);
    }

    #[test]
    fn test_trigger_ids() {
        for trigger in Trigger::ALL {
            assert_eq!(Trigger::from_id(trigger.id()), Some(trigger));
        }
        assert_eq!(Trigger::from_id("repo-fork"), None);
    }

    #[test]
    fn test_parse_params_keeps_empty_lines() {
        assert!(HookConfig::parse_params("").is_empty());
        assert_eq!(
            HookConfig::parse_params("--strict\r\n\r\nlast"),
            vec!["--strict", "", "last"]
        );
    }

    #[test]
    fn test_has_executable() {
        assert!(!HookConfig::new("   ").has_executable());
        assert!(HookConfig::new("/bin/true").has_executable());
    }

    #[test]
    fn test_config_deserializes_host_field_names() {
        let config: HookConfig = serde_json::from_value(serde_json::json!({
            "exe": "check.sh",
            "params": ["a"],
            "async": true,
            "safePath": true
        }))
        .unwrap();
        assert_eq!(config.executable_path, "check.sh");
        assert_eq!(config.arguments, vec!["a"]);
        assert!(config.run_async);
        assert!(config.safe_mode);
    }
}
