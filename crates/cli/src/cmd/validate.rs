//! Validate command implementation
//!
//! Checks the configuration stored for a hook at a scope the same way an
//! enable would, without installing anything.

use clap::Args;
use hookwarden_core::{Error, HookKind};
use owo_colors::OwoColorize;
use std::path::PathBuf;

use crate::command::Command;
use crate::common::{RuntimeContext, ScopeArg};
use crate::error::{CommandError, Result};

/// Validate a stored hook configuration
#[derive(Debug, Args)]
pub struct ValidateCommand {
    /// Hook name (pre-receive, post-receive, merge-check) or host hook key
    #[arg(long)]
    pub hook: String,

    /// global, project:KEY, repo:KEY/slug or user:NAME/slug
    #[arg(long)]
    pub scope: ScopeArg,
}

impl Command for ValidateCommand {
    type Output = PathBuf;

    fn execute(&self, context: &RuntimeContext) -> Result<PathBuf> {
        let hook = self
            .hook
            .parse::<HookKind>()
            .map_err(|_| CommandError::UnknownHook(self.hook.clone()))?;
        let scope = context.scope(&self.scope)?;

        match context.coordinator().validate(&scope, hook) {
            Ok(executable) => {
                println!(
                    "{} {} on {}: {}",
                    "✓".bright_green(),
                    hook.name().bright_white().bold(),
                    scope,
                    executable.display()
                );
                Ok(executable)
            }
            Err(Error::ConfigurationInvalid(validation)) => {
                println!(
                    "{} {} on {}: {} {}",
                    "✗".bright_red(),
                    hook.name().bright_white().bold(),
                    scope,
                    validation.field.to_string().yellow(),
                    validation.message
                );
                Err(Error::ConfigurationInvalid(validation).into())
            }
            Err(e) => Err(e.into()),
        }
    }
}
