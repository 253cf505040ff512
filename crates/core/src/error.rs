//! Error types for hookwarden
//!
//! Every crate in the workspace reports failures through [`Error`]. Removing an
//! artifact that is already gone is not an error: it is reported as an
//! `UninstallOutcome` by the engine.

use std::fmt;

use thiserror::Error;

use crate::hook::HookKind;

/// Base error type shared by all crates
#[derive(Error, Debug)]
pub enum Error {
    /// A hook configuration was rejected by validation
    #[error("Invalid hook configuration: {0}")]
    ConfigurationInvalid(#[from] ValidationError),

    /// A scope claims the hook is enabled but no configuration is stored for it
    #[error("Hook {hook} is enabled on {scope} but has no stored configuration")]
    ConfigurationMissing {
        /// Hook whose configuration is missing
        hook: HookKind,
        /// Display form of the scope
        scope: String,
    },

    /// The elevated-privilege capability could not be acquired
    #[error("Privilege denied: {0}")]
    PrivilegeDenied(String),

    /// The script record store or the artifact store cannot be reached
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error message
    #[error("{0}")]
    Message(String),
}

impl Error {
    /// Whether this error is a configuration problem the administrator must fix
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::ConfigurationInvalid(_) | Self::ConfigurationMissing { .. }
        )
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// The configuration field a validation failure belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValidationField {
    /// The executable path
    Executable,
    /// The safe-mode flag
    SafeMode,
}

impl ValidationField {
    /// Field name as presented to an administrator form
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Executable => "exe",
            Self::SafeMode => "safe_path",
        }
    }
}

impl fmt::Display for ValidationField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A validation failure attributed to one configuration field
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{field}: {message}")]
pub struct ValidationError {
    /// Offending field
    pub field: ValidationField,
    /// Human-readable reason
    pub message: String,
}

impl ValidationError {
    /// Failure on the executable field
    pub fn executable(message: impl Into<String>) -> Self {
        Self {
            field: ValidationField::Executable,
            message: message.into(),
        }
    }

    /// Failure on the safe-mode field
    pub fn safe_mode(message: impl Into<String>) -> Self {
        Self {
            field: ValidationField::SafeMode,
            message: message.into(),
        }
    }
}
