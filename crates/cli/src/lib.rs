//! Hookwarden CLI library
//!
//! This library contains all the CLI logic for hookwarden, making it reusable
//! for testing and integration with other tools.

pub mod cmd;
pub mod command;
pub mod common;
pub mod error;
pub mod stats;
pub mod ui;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use command::Command;
use common::RuntimeContext;

/// Hookwarden - hook scope resolution and script lifecycle
#[derive(Parser)]
#[command(name = "hookwarden")]
#[command(about = "Keep exactly one hook script per hook and repository")]
#[command(version)]
#[command(long_about = "Keep exactly one hook script per hook and repository

Hook settings live at three levels: global, project and repository. For each
hook and repository the most specific enabled level wins, and hookwarden makes
sure the installed script always matches the winner.

Deliver host events with `hookwarden event`, rebuild everything with
`hookwarden rebuild`, and run the run-once startup job with `hookwarden start`.")]
pub struct Cli {
    /// Path to the config file
    #[arg(long, env = "HOOKWARDEN_CONFIG", value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose output (shows DEBUG level logs)
    #[arg(short, long)]
    pub verbose: bool,

    /// Write logs to a file (useful for debugging)
    #[arg(long, env = "HOOKWARDEN_LOG_FILE", value_name = "FILE")]
    pub log_file: Option<PathBuf>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands for hookwarden CLI
#[derive(Subcommand)]
pub enum Commands {
    /// Deliver a host event (setting change, repository lifecycle, global policy edit)
    Event(cmd::event::EventCommand),

    /// Rebuild every hook script from the current settings
    #[command(long_about = "Rebuild every hook script from the current settings

Walks every repository page by page, resolves each managed hook and recreates
its script. Progress is stored under a numeric id that `hookwarden progress`
can poll while the rebuild runs.

Exits with a non-zero status when any repository failed.")]
    Rebuild(cmd::rebuild::RebuildCommand),

    /// Show the progress of a rebuild
    Progress(cmd::progress::ProgressCommand),

    /// Show installed hook scripts
    Status(cmd::status::StatusCommand),

    /// Validate the configuration stored for a hook at a scope
    Validate(cmd::validate::ValidateCommand),

    /// Run the startup rebuild (once per cluster)
    Start(cmd::start::StartCommand),
}

/// Execute the command based on the command type
fn execute_command(command: &Commands, context: &RuntimeContext) -> error::Result<()> {
    match command {
        Commands::Event(event_cmd) => event_cmd.execute(context)?,
        Commands::Rebuild(rebuild_cmd) => rebuild_cmd.execute(context)?,
        Commands::Progress(progress_cmd) => {
            progress_cmd.execute(context)?;
        }
        Commands::Status(status_cmd) => status_cmd.execute(context)?,
        Commands::Validate(validate_cmd) => {
            validate_cmd.execute(context)?;
        }
        Commands::Start(start_cmd) => start_cmd.execute(context)?,
    }

    Ok(())
}

/// Main entry point for the CLI logic
///
/// # Errors
///
/// Returns an error if:
/// - Logging initialization fails
/// - Configuration loading fails
/// - The record database or host inventory cannot be opened
/// - Command execution fails, including when any unit of work failed
pub fn run(cli: Cli) -> Result<()> {
    hookwarden_config::logging::init(cli.verbose, cli.log_file.as_deref())?;

    let config = hookwarden_config::Config::load_or_default(cli.config.as_deref())
        .context("Failed to load configuration")?;
    let context = RuntimeContext::load(config).context("Failed to open hookwarden state")?;

    execute_command(&cli.command, &context)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::panic)]
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_event_enabled() {
        let cli = Cli::try_parse_from([
            "hookwarden",
            "event",
            "enabled",
            "--hook",
            "pre-receive",
            "--scope",
            "repo:TEAM/app",
            "--json",
        ])
        .unwrap();

        let Commands::Event(event) = cli.command else {
            panic!("expected event command");
        };
        assert!(event.json);
        match event.event {
            cmd::event::EventKind::Enabled(args) => {
                assert_eq!(args.hook, "pre-receive");
                assert_eq!(
                    args.scope,
                    common::ScopeArg::Repository("TEAM/app".to_string())
                );
            }
            _ => panic!("expected enabled event"),
        }
    }

    #[test]
    fn test_parse_rejects_bad_scope() {
        let result = Cli::try_parse_from([
            "hookwarden",
            "event",
            "disabled",
            "--hook",
            "pre-receive",
            "--scope",
            "everything",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_repo_deleted_with_id() {
        let cli = Cli::try_parse_from([
            "hookwarden",
            "event",
            "repo-deleted",
            "--repo",
            "~ann/notes",
            "--id",
            "20",
        ])
        .unwrap();

        let Commands::Event(event) = cli.command else {
            panic!("expected event command");
        };
        let cmd::event::EventKind::RepoDeleted(args) = event.event else {
            panic!("expected repo-deleted event");
        };
        assert_eq!(args.repo.0, "~ann/notes");
        assert_eq!(args.id, Some(20));
    }

    #[test]
    fn test_parse_global_flags() {
        let cli = Cli::try_parse_from([
            "hookwarden",
            "--config",
            "/etc/hookwarden.toml",
            "-v",
            "progress",
            "3",
        ])
        .unwrap();
        assert!(cli.verbose);
        assert_eq!(cli.config, Some(PathBuf::from("/etc/hookwarden.toml")));
        let Commands::Progress(progress) = cli.command else {
            panic!("expected progress command");
        };
        assert_eq!(progress.id, Some(3));
    }
}
