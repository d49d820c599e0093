//! # mongr8 Commands
//!
//! The `mongr8` command line: `init-migration`, `create-collection`,
//! `generate-migration`, `apply-migration` and `consolidate-migration`.
//!
//! Generation needs the application's declared schema, so applications build
//! their own small binary:
//!
//! ```rust,no_run
//! use mongr8_commands::{SchemaProvider, execute_from_command_line};
//! use mongr8_db::schema::{Collection, Field, Metadata};
//!
//! struct AppSchema;
//!
//! impl SchemaProvider for AppSchema {
//! 	fn collections() -> Vec<Collection> {
//! 		vec![Collection::new(Metadata::new("users")).field(Field::string("name"))]
//! 	}
//! }
//!
//! #[tokio::main]
//! async fn main() {
//! 	if let Err(e) = execute_from_command_line::<AppSchema>().await {
//! 		eprintln!("Error: {}", e);
//! 		std::process::exit(1);
//! 	}
//! }
//! ```

pub mod base;
pub mod builtin;
pub mod cli;
pub mod context;
pub mod logging;
pub mod provider;

pub use base::BaseCommand;
pub use builtin::{
	ApplyMigrationCommand, ConsolidateMigrationCommand, CreateCollectionCommand,
	GenerateMigrationCommand, InitMigrationCommand,
};
pub use cli::{Cli, Commands, SchemaFlags, execute_from_command_line, run_command};
pub use context::CommandContext;
pub use provider::{EmptyProvider, SchemaProvider};

use mongr8_conf::SettingsError;
use mongr8_db::migrations::MigrationError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CommandError {
	#[error("Invalid arguments: {0}")]
	InvalidArguments(String),

	#[error("Execution error: {0}")]
	ExecutionError(String),

	#[error(transparent)]
	Settings(#[from] SettingsError),

	#[error(transparent)]
	Migration(#[from] MigrationError),
}

pub type CommandResult<T> = Result<T, CommandError>;
