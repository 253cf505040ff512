//! Status command implementation
//!
//! Lists the script records: which scope's configuration is installed in which
//! repository, and under which artifact.

use clap::Args;
use hookwarden_engine::ScriptRecords;
use owo_colors::OwoColorize;
use serde::Serialize;

use crate::command::Command;
use crate::common::{RepositoryArg, RuntimeContext};
use crate::error::Result;

/// Show installed hook scripts
#[derive(Debug, Args)]
pub struct StatusCommand {
    /// Only show one repository (KEY/slug or ~user/slug)
    #[arg(long)]
    pub repo: Option<RepositoryArg>,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// One installed script
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusEntry {
    /// Repository display name
    pub repository: String,
    /// Repository id
    pub repository_id: u64,
    /// Hook name
    pub hook: &'static str,
    /// Scope level the configuration came from
    pub source: String,
    /// Id token of that scope
    pub source_id: String,
    /// Installed artifact
    pub artifact: u64,
    /// Short configuration fingerprint
    pub fingerprint: String,
}

impl StatusCommand {
    /// Collect the entries this command would print, ordered by repository
    pub fn entries(&self, context: &RuntimeContext) -> Result<Vec<StatusEntry>> {
        let records = ScriptRecords::new(&context.database);
        let records = match &self.repo {
            Some(arg) => records.for_repository(context.repository(arg)?.id)?,
            None => records.all()?,
        };

        let mut entries: Vec<StatusEntry> = records
            .into_iter()
            .map(|(key, record)| StatusEntry {
                repository: context.repository_label(key.repository),
                repository_id: key.repository.0,
                hook: key.hook.name(),
                source: key.source_type.to_string(),
                source_id: key.source_id,
                artifact: record.artifact_id,
                fingerprint: record.short_fingerprint(),
            })
            .collect();
        entries.sort_by(|a, b| (a.repository_id, a.hook).cmp(&(b.repository_id, b.hook)));
        Ok(entries)
    }
}

impl Command for StatusCommand {
    type Output = ();

    fn execute(&self, context: &RuntimeContext) -> Result<()> {
        let entries = self.entries(context)?;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&entries)?);
            return Ok(());
        }

        if entries.is_empty() {
            println!("{} no hook scripts installed", "●".dimmed());
            return Ok(());
        }

        let mut current: Option<u64> = None;
        for entry in &entries {
            if current != Some(entry.repository_id) {
                if current.is_some() {
                    println!();
                }
                println!("{}", entry.repository.bright_white().bold());
                current = Some(entry.repository_id);
            }
            println!(
                "  {} {:14} {:10} {} {}",
                "●".bright_green(),
                entry.hook,
                entry.source.cyan(),
                format!("artifact {}", entry.artifact).dimmed(),
                entry.fingerprint.dimmed()
            );
        }
        Ok(())
    }
}
