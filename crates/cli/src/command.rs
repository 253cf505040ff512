//! Command trait for hookwarden CLI
//!
//! Every subcommand implements [`Command`] and receives the shared
//! [`RuntimeContext`], so commands can be exercised in tests without going
//! through argument parsing.

use crate::common::RuntimeContext;
use crate::error::Result;

/// Trait for all hookwarden commands
///
/// # Example
///
/// ```rust,ignore
/// use crate::command::Command;
/// use crate::common::RuntimeContext;
/// use crate::error::Result;
/// use clap::Args;
///
/// #[derive(Debug, Args)]
/// pub struct MyCommand {
///     #[arg(long)]
///     pub json: bool,
/// }
///
/// impl Command for MyCommand {
///     type Output = ();
///
///     fn execute(&self, context: &RuntimeContext) -> Result<()> {
///         let coordinator = context.coordinator();
///         Ok(())
///     }
/// }
/// ```
pub trait Command {
    /// The type returned by this command
    type Output;

    /// Execute the command with the given runtime context
    ///
    /// # Errors
    ///
    /// Returns a `CommandError` if the command fails or any unit of work it
    /// drove failed.
    fn execute(&self, context: &RuntimeContext) -> Result<Self::Output>;
}
