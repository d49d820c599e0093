//! Base command trait

use crate::{CommandContext, CommandResult};
use async_trait::async_trait;

/// A sub-command of the `mongr8` binary
#[async_trait]
pub trait BaseCommand: Send + Sync {
	/// Name as typed on the command line
	fn name(&self) -> &str;

	fn description(&self) -> &str;

	async fn execute(&self, ctx: &CommandContext) -> CommandResult<()>;
}
