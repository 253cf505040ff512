//! Event command implementation
//!
//! Feeds one host event into the coordinator and reports what changed.

use clap::{Args, Subcommand};
use hookwarden_core::HookKind;
use hookwarden_engine::{HookChange, HookEvent};
use owo_colors::OwoColorize;
use tracing::debug;

use crate::command::Command;
use crate::common::{RepositoryArg, RuntimeContext, ScopeArg};
use crate::error::{CommandError, Result};
use crate::stats::{ensure_success, print_report};

/// Deliver a host event
#[derive(Debug, Args)]
pub struct EventCommand {
    /// The event to deliver
    #[command(subcommand)]
    pub event: EventKind,

    /// Print the transition report as JSON
    #[arg(long, global = true)]
    pub json: bool,
}

/// Host events
#[derive(Debug, Subcommand)]
pub enum EventKind {
    /// A hook was enabled on a scope
    Enabled(HookChangeArgs),
    /// A hook was disabled on a scope
    Disabled(HookChangeArgs),
    /// A scope's own setting was removed so it inherits from its parent
    Inherited(HookChangeArgs),
    /// A repository was created
    RepoCreated(RepositoryArgs),
    /// A repository was deleted
    RepoDeleted(DeletedRepositoryArgs),
    /// The global policy for a hook was edited
    GlobalChanged(GlobalChangedArgs),
}

/// Arguments of a hook setting change
#[derive(Debug, Args)]
pub struct HookChangeArgs {
    /// Hook name (pre-receive, post-receive, merge-check) or host hook key
    #[arg(long)]
    pub hook: String,

    /// global, project:KEY, repo:KEY/slug or user:NAME/slug
    #[arg(long)]
    pub scope: ScopeArg,
}

/// Arguments naming a repository
#[derive(Debug, Args)]
pub struct RepositoryArgs {
    /// KEY/slug or ~user/slug
    #[arg(long)]
    pub repo: RepositoryArg,
}

/// Arguments naming a deleted repository
#[derive(Debug, Args)]
pub struct DeletedRepositoryArgs {
    /// KEY/slug or ~user/slug
    #[arg(long)]
    pub repo: RepositoryArg,

    /// Repository id, for repositories already removed from the inventory
    #[arg(long)]
    pub id: Option<u64>,
}

/// Arguments of a global policy change
#[derive(Debug, Args)]
pub struct GlobalChangedArgs {
    /// Hook name or host hook key
    #[arg(long)]
    pub hook: String,
}

/// Map a short hook name to its host key; host keys pass through
fn hook_key(hook: &str) -> &str {
    HookKind::ALL
        .into_iter()
        .find(|kind| kind.name() == hook)
        .map_or(hook, |kind| kind.key())
}

impl EventCommand {
    /// Translate the arguments into a coordinator event
    ///
    /// Returns `None` for setting changes on hooks hookwarden does not manage.
    pub fn to_event(&self, context: &RuntimeContext) -> Result<Option<HookEvent>> {
        let change = |change: HookChange, args: &HookChangeArgs| -> Result<Option<HookEvent>> {
            let scope = context.scope(&args.scope)?;
            Ok(HookEvent::from_hook_key(change, scope, hook_key(&args.hook)))
        };

        match &self.event {
            EventKind::Enabled(args) => change(HookChange::Enabled, args),
            EventKind::Disabled(args) => change(HookChange::Disabled, args),
            EventKind::Inherited(args) => change(HookChange::Inherited, args),
            EventKind::RepoCreated(args) => {
                Ok(Some(HookEvent::RepositoryCreated(context.repository(&args.repo)?)))
            }
            EventKind::RepoDeleted(args) => {
                let repo = match (context.repository(&args.repo), args.id) {
                    (Ok(repo), _) => repo,
                    (Err(_), Some(id)) => {
                        debug!(repo = %args.repo, id, "Repository not in inventory, using id");
                        args.repo.detached(id)
                    }
                    (Err(e), None) => return Err(e),
                };
                Ok(Some(HookEvent::RepositoryDeleted(repo)))
            }
            EventKind::GlobalChanged(args) => {
                let hook = args
                    .hook
                    .parse::<HookKind>()
                    .map_err(|_| CommandError::UnknownHook(args.hook.clone()))?;
                Ok(Some(HookEvent::GlobalPolicyChanged(hook)))
            }
        }
    }
}

impl Command for EventCommand {
    type Output = ();

    fn execute(&self, context: &RuntimeContext) -> Result<()> {
        let Some(event) = self.to_event(context)? else {
            if !self.json {
                println!("{} hook is not managed by hookwarden, ignoring", "●".dimmed());
            }
            return Ok(());
        };

        let report = context.coordinator().handle(&event)?;
        print_report(&report, self.json)?;
        ensure_success(&report)
    }
}
