//! Error types for CLI commands
//!
//! Engine failures arrive as [`hookwarden_core::Error`]; everything the CLI
//! itself detects (bad arguments, unknown scopes, failed units) is modelled
//! here with thiserror.

use thiserror::Error;

/// Errors that can occur during command execution
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum CommandError {
    /// A `--scope` argument that does not follow any accepted form
    #[error(
        "Invalid scope '{0}': expected global, project:KEY, repo:KEY/slug or user:NAME/slug"
    )]
    InvalidScope(String),

    /// A scope or repository not present in the host inventory
    #[error("Unknown {kind}: {name}")]
    UnknownScope {
        /// What was looked up (project, repository)
        kind: &'static str,
        /// The name as given on the command line
        name: String,
    },

    /// Unknown hook name
    #[error("Unknown hook '{0}': expected pre-receive, post-receive or merge-check")]
    UnknownHook(String),

    /// No rebuild progress handle with the given id
    #[error("No rebuild with id {0}")]
    ProgressNotFound(u64),

    /// Startup signals that never arrived
    #[error("Startup barrier did not fire, still waiting for: {0}")]
    NotReady(String),

    /// Some units of work failed and were skipped
    #[error("{failed} out of {total} units failed")]
    TransitionFailed {
        /// Number of units that failed
        failed: usize,
        /// Total number of units
        total: usize,
    },

    /// Engine or configuration error
    #[error(transparent)]
    Core(#[from] hookwarden_core::Error),

    /// JSON output error
    #[error("Failed to render JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias for command operations
pub type Result<T> = std::result::Result<T, CommandError>;

impl CommandError {
    /// Whether this error means the administrator must fix a hook configuration
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Core(e) if e.is_configuration())
    }
}
