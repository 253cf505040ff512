//! Start command implementation
//!
//! Runs the startup rebuild once the launch barrier has fired. On a cluster
//! only the node that claims the job rebuilds; the others return immediately.

use clap::Args;
use hookwarden_engine::StartupJob;
use owo_colors::OwoColorize;
use std::time::Duration;

use crate::command::Command;
use crate::common::RuntimeContext;
use crate::error::{CommandError, Result};
use crate::stats::{ensure_success, print_summary};
use crate::ui::progress::create_spinner;

/// Run the startup rebuild
#[derive(Debug, Args)]
pub struct StartCommand {
    /// Name of this node in the job claim
    #[arg(long, env = "HOOKWARDEN_NODE", default_value = "local")]
    pub node: String,
}

impl Command for StartCommand {
    type Output = ();

    fn execute(&self, context: &RuntimeContext) -> Result<()> {
        if !context.barrier.has_fired() {
            let pending: Vec<String> = context
                .barrier
                .pending()
                .iter()
                .map(|signal| format!("{signal:?}"))
                .collect();
            return Err(CommandError::NotReady(pending.join(", ")));
        }

        let coordinator = context.coordinator();
        let max_offset = Duration::from_secs(context.config.general.startup_offset_secs);
        let job = StartupJob::new(&coordinator, &context.database, self.node.clone())
            .with_max_offset(max_offset);

        let spinner = create_spinner("Creating hook scripts");
        let result = job.run(&mut |progress| {
            spinner.set_message(format!(
                "Creating hook scripts {}/{}",
                progress.current, progress.total
            ));
        });
        spinner.finish_and_clear();

        match result? {
            Some((progress, report)) => {
                println!(
                    "Startup rebuild {} finished on {}",
                    format!("#{}", progress.id).bright_white().bold(),
                    self.node
                );
                print_summary(&report);
                ensure_success(&report)
            }
            None => {
                println!(
                    "{} startup rebuild already claimed by another node",
                    "●".dimmed()
                );
                Ok(())
            }
        }
    }
}
