//! Progress command implementation
//!
//! Polls a rebuild progress handle.

use clap::Args;
use hookwarden_engine::{ProgressStore, RebuildProgress};
use owo_colors::OwoColorize;

use crate::command::Command;
use crate::common::RuntimeContext;
use crate::error::{CommandError, Result};

/// Show the progress of a rebuild
#[derive(Debug, Args)]
pub struct ProgressCommand {
    /// Rebuild id (default: the most recent rebuild)
    pub id: Option<u64>,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

impl Command for ProgressCommand {
    type Output = Option<RebuildProgress>;

    fn execute(&self, context: &RuntimeContext) -> Result<Option<RebuildProgress>> {
        let store = ProgressStore::new(&context.database);
        let progress = match self.id {
            Some(id) => Some(store.get(id)?.ok_or(CommandError::ProgressNotFound(id))?),
            None => store.latest()?,
        };

        if self.json {
            println!("{}", serde_json::to_string_pretty(&progress)?);
        } else {
            match &progress {
                Some(progress) => display(progress),
                None => println!("{} no rebuild has run yet", "●".dimmed()),
            }
        }
        Ok(progress)
    }
}

fn display(progress: &RebuildProgress) {
    let state = if progress.aborted {
        "aborted".bright_red().to_string()
    } else if progress.finished {
        "finished".bright_green().to_string()
    } else if progress.started {
        "running".bright_yellow().to_string()
    } else {
        "pending".dimmed().to_string()
    };
    println!(
        "Rebuild {} {state}: {}/{} ({:.0}%)",
        format!("#{}", progress.id).bright_white().bold(),
        progress.current,
        progress.total,
        progress.ratio() * 100.0
    );
}
