//! Rebuild command implementation
//!
//! Recreates every hook script from the current settings, showing progress.

use clap::Args;
use hookwarden_engine::{InstallMode, Rebuilder};
use owo_colors::OwoColorize;
use serde::Serialize;

use crate::command::Command;
use crate::common::RuntimeContext;
use crate::error::Result;
use crate::stats::{ensure_success, print_summary};
use crate::ui::progress::{create_progress_bar, update_progress_bar};

/// Rebuild all hook scripts
#[derive(Debug, Args)]
pub struct RebuildCommand {
    /// Keep scripts whose configuration is unchanged instead of recreating them
    #[arg(long)]
    pub keep_unchanged: bool,

    /// Repositories fetched per inventory page
    #[arg(long, value_name = "N")]
    pub page_size: Option<usize>,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Serialize)]
struct RebuildOutput {
    id: u64,
    total: u64,
    report: hookwarden_engine::TransitionReport,
}

impl Command for RebuildCommand {
    type Output = ();

    fn execute(&self, context: &RuntimeContext) -> Result<()> {
        let coordinator = context.coordinator();
        let mut rebuilder = Rebuilder::new(&coordinator, &context.database);
        if self.keep_unchanged {
            rebuilder = rebuilder.with_mode(InstallMode::Ensure);
        }
        if let Some(page_size) = self.page_size {
            rebuilder = rebuilder.with_page_size(page_size);
        }

        let (progress, report) = if self.json {
            rebuilder.run(&mut |_| {})?
        } else {
            let pb = create_progress_bar("Rebuilding");
            let result = rebuilder.run(&mut |progress| update_progress_bar(&pb, progress));
            pb.finish_and_clear();
            result?
        };

        if self.json {
            let output = RebuildOutput {
                id: progress.id,
                total: progress.total,
                report,
            };
            println!("{}", serde_json::to_string_pretty(&output)?);
        } else {
            println!(
                "Rebuild {} finished: {} units",
                format!("#{}", progress.id).bright_white().bold(),
                progress.total
            );
            print_summary(&report);
        }

        ensure_success(&report)
    }
}
