//! CLI runner for mongr8
//!
//! Parses the command line, loads layered settings, installs logging and
//! dispatches to the built-in commands.

use crate::base::BaseCommand;
use crate::logging::init_logging;
use crate::provider::SchemaProvider;
use crate::{
	ApplyMigrationCommand, CommandContext, CommandResult, ConsolidateMigrationCommand,
	CreateCollectionCommand, GenerateMigrationCommand, InitMigrationCommand,
};
use clap::{Args, Parser, Subcommand};
use mongr8_conf::Settings;
use mongr8_conf::settings::SETTINGS_FILE;
use mongr8_db::schema::Collection;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;

/// mongr8 schema migration CLI
///
/// This is the parser used by `execute_from_command_line()`.
/// Can also be used directly for testing CLI parsing behavior.
#[derive(Debug, Parser)]
#[command(name = "mongr8")]
#[command(about = "MongoDB schema migrations", long_about = None)]
#[command(version)]
pub struct Cli {
	/// Subcommand to execute
	#[command(subcommand)]
	pub command: Commands,

	/// Verbosity level (can be repeated for more output)
	#[arg(short, long, action = clap::ArgAction::Count, global = true)]
	pub verbosity: u8,

	/// Settings file
	#[arg(long, value_name = "PATH", global = true)]
	pub config: Option<PathBuf>,

	/// Overrides `migrations_dir` from the settings
	#[arg(long, value_name = "DIR", global = true)]
	pub migrations_dir: Option<PathBuf>,
}

/// Switches shared by `generate-migration` and `apply-migration`
#[derive(Debug, Clone, Default, PartialEq, Eq, Args)]
pub struct SchemaFlags {
	/// Sort collections, fields and indexes before diffing
	#[arg(long)]
	pub use_sorted_schema: bool,

	/// Convert between any two scalar types
	#[arg(long)]
	pub use_force_conversion: bool,

	/// Maintain $jsonSchema validators
	#[arg(long)]
	pub use_schema_validation: bool,

	/// Migration description
	#[arg(long, value_name = "TEXT")]
	pub desc: Option<String>,
}

impl SchemaFlags {
	fn apply_to(&self, ctx: &mut CommandContext) {
		ctx.set_flag("use-sorted-schema", self.use_sorted_schema);
		ctx.set_flag("use-force-conversion", self.use_force_conversion);
		ctx.set_flag("use-schema-validation", self.use_schema_validation);
		if let Some(desc) = &self.desc {
			ctx.set_option("desc".to_string(), desc.clone());
		}
	}
}

/// Command-line interface commands
#[derive(Debug, Clone, Subcommand)]
pub enum Commands {
	/// Create the migrations directory and a settings file
	InitMigration,

	/// Write a Rust scaffold declaring a collection
	CreateCollection {
		/// Collection name
		#[arg(value_name = "NAME")]
		name: String,

		/// Scaffold file (default: schema/<NAME>.rs)
		#[arg(long, value_name = "PATH")]
		out: Option<PathBuf>,
	},

	/// Generate a migration from schema changes
	GenerateMigration {
		#[command(flatten)]
		flags: SchemaFlags,
	},

	/// Apply pending migrations
	ApplyMigration {
		#[command(flatten)]
		flags: SchemaFlags,

		/// Run each migration in a transaction
		#[arg(long)]
		use_transaction: bool,

		/// Apply against an empty in-memory database instead
		#[arg(long)]
		dry_run: bool,
	},

	/// Replace all migrations with one that builds the current schema
	ConsolidateMigration,
}

/// Execute commands from command-line arguments
///
/// `P` supplies the declared schema to `generate-migration`.
///
/// # Examples
///
/// ```rust,no_run
/// use mongr8_commands::{EmptyProvider, execute_from_command_line};
///
/// #[tokio::main]
/// async fn main() {
/// 	if let Err(e) = execute_from_command_line::<EmptyProvider>().await {
/// 		eprintln!("Error: {}", e);
/// 		std::process::exit(1);
/// 	}
/// }
/// ```
pub async fn execute_from_command_line<P: SchemaProvider>() -> CommandResult<()> {
	let cli = Cli::parse();

	let config = cli
		.config
		.clone()
		.unwrap_or_else(|| PathBuf::from(SETTINGS_FILE));
	let mut settings = Settings::load(&config)?;
	if let Some(dir) = &cli.migrations_dir {
		settings.migrations_dir = dir.clone();
	}
	init_logging(cli.verbosity, &settings.log_level);

	let cancellation = CancellationToken::new();
	let on_interrupt = cancellation.clone();
	let interrupt = tokio::spawn(async move {
		if tokio::signal::ctrl_c().await.is_ok() {
			tracing::warn!("interrupted, cancelling");
			on_interrupt.cancel();
		}
	});

	let mut ctx = CommandContext::new(settings);
	ctx.set_verbosity(cli.verbosity);
	if let Some(config) = cli.config {
		ctx.set_option("config".to_string(), config.to_string_lossy().into_owned());
	}

	let result = run_command(cli.command, ctx, P::collections(), cancellation).await;
	interrupt.abort();
	result
}

/// Execute a parsed command
///
/// For most use cases, prefer using `execute_from_command_line()` instead.
pub async fn run_command(
	command: Commands,
	mut ctx: CommandContext,
	desired: Vec<Collection>,
	cancellation: CancellationToken,
) -> CommandResult<()> {
	match command {
		Commands::InitMigration => InitMigrationCommand.execute(&ctx).await,
		Commands::CreateCollection { name, out } => {
			ctx.add_arg(name);
			if let Some(out) = out {
				ctx.set_option("out".to_string(), out.to_string_lossy().into_owned());
			}
			CreateCollectionCommand.execute(&ctx).await
		}
		Commands::GenerateMigration { flags } => {
			flags.apply_to(&mut ctx);
			GenerateMigrationCommand::new(desired).execute(&ctx).await
		}
		Commands::ApplyMigration {
			flags,
			use_transaction,
			dry_run,
		} => {
			flags.apply_to(&mut ctx);
			ctx.set_flag("use-transaction", use_transaction);
			ctx.set_flag("dry-run", dry_run);
			ApplyMigrationCommand::new()
				.with_cancellation(cancellation)
				.execute(&ctx)
				.await
		}
		Commands::ConsolidateMigration => ConsolidateMigrationCommand.execute(&ctx).await,
	}
}
