//! Built-in commands
//!
//! The five `mongr8` sub-commands.

use crate::base::BaseCommand;
use crate::{CommandContext, CommandError, CommandResult};
use async_trait::async_trait;
use mongr8_conf::settings::SETTINGS_FILE;
use mongr8_db::migrations::{
	FilesystemRepository, MigrationError, MigrationExecutor, MigrationGenerator,
	MigrationRepository, consolidate,
};
use mongr8_db::nosql::{InMemoryBackend, MongoDBBackend};
use mongr8_db::schema::Collection;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;

/// Create the migrations directory and a settings file
pub struct InitMigrationCommand;

#[async_trait]
impl BaseCommand for InitMigrationCommand {
	fn name(&self) -> &str {
		"init-migration"
	}

	fn description(&self) -> &str {
		"Create the migrations directory and mongr8.toml"
	}

	async fn execute(&self, ctx: &CommandContext) -> CommandResult<()> {
		let migrations_dir = ctx.migrations_dir();
		tokio::fs::create_dir_all(&migrations_dir)
			.await
			.map_err(|e| {
				CommandError::ExecutionError(format!(
					"Failed to create {}: {}",
					migrations_dir.display(),
					e
				))
			})?;
		ctx.verbose(&format!("Migrations directory: {}", migrations_dir.display()));

		let settings_path = ctx
			.option("config")
			.map(PathBuf::from)
			.unwrap_or_else(|| PathBuf::from(SETTINGS_FILE));
		if tokio::fs::try_exists(&settings_path).await.unwrap_or(false) {
			ctx.warning(&format!(
				"{} already exists, leaving it unchanged",
				settings_path.display()
			));
		} else {
			let content = ctx.settings.to_toml()?;
			write_new(&settings_path, &content).await?;
			ctx.verbose(&format!("Wrote {}", settings_path.display()));
		}

		ctx.success("Migrations initialized");
		Ok(())
	}
}

/// Write a Rust scaffold declaring a collection
pub struct CreateCollectionCommand;

impl CreateCollectionCommand {
	/// Collection names become Rust identifiers in the scaffold
	fn check_name(name: &str) -> CommandResult<()> {
		let valid = name
			.chars()
			.next()
			.is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
			&& name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
		if valid {
			Ok(())
		} else {
			Err(CommandError::InvalidArguments(format!(
				"collection name '{}' must be letters, digits and underscores",
				name
			)))
		}
	}

	pub fn scaffold(name: &str) -> String {
		format!(
			r#"use mongr8_db::schema::{{Collection, Field, Metadata}};

pub fn {name}() -> Collection {{
	Collection::new(Metadata::new("{name}")).fields([
		Field::string("name"),
	])
}}
"#
		)
	}
}

#[async_trait]
impl BaseCommand for CreateCollectionCommand {
	fn name(&self) -> &str {
		"create-collection"
	}

	fn description(&self) -> &str {
		"Write a Rust scaffold declaring a collection"
	}

	async fn execute(&self, ctx: &CommandContext) -> CommandResult<()> {
		let name = ctx
			.arg(0)
			.ok_or_else(|| CommandError::InvalidArguments("missing collection name".to_string()))?;
		Self::check_name(name)?;

		let path = ctx
			.option("out")
			.map(PathBuf::from)
			.unwrap_or_else(|| PathBuf::from("schema").join(format!("{}.rs", name)));
		if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
			tokio::fs::create_dir_all(parent).await.map_err(|e| {
				CommandError::ExecutionError(format!("Failed to create {}: {}", parent.display(), e))
			})?;
		}
		write_new(&path, &Self::scaffold(name)).await?;

		ctx.success(&format!("Created {}", path.display()));
		Ok(())
	}
}

/// Diff the declared schema against the stored history and save the result
pub struct GenerateMigrationCommand {
	desired: Vec<Collection>,
}

impl GenerateMigrationCommand {
	pub fn new(desired: Vec<Collection>) -> Self {
		Self { desired }
	}
}

#[async_trait]
impl BaseCommand for GenerateMigrationCommand {
	fn name(&self) -> &str {
		"generate-migration"
	}

	fn description(&self) -> &str {
		"Generate a migration from schema changes"
	}

	async fn execute(&self, ctx: &CommandContext) -> CommandResult<()> {
		if self.desired.is_empty() {
			return Err(CommandError::InvalidArguments(
				"no collections declared; build a binary whose SchemaProvider returns your schema"
					.to_string(),
			));
		}

		let options = ctx.migration_options();
		let mut repository = FilesystemRepository::new(ctx.migrations_dir());
		let history = repository.list().await?;
		ctx.verbose(&format!("Loaded {} migration(s)", history.len()));

		let generated =
			MigrationGenerator::new(&options).generate(&self.desired, &history, chrono::Utc::now())?;
		match generated {
			Some(migration) => {
				repository.save(&migration).await?;
				ctx.success(&format!(
					"Created migration {} ({} sub-action(s))",
					migration.id,
					migration.len()
				));
			}
			None => ctx.info("No changes detected"),
		}
		Ok(())
	}
}

/// Apply pending migrations
pub struct ApplyMigrationCommand {
	cancellation: CancellationToken,
}

impl ApplyMigrationCommand {
	pub fn new() -> Self {
		Self {
			cancellation: CancellationToken::new(),
		}
	}

	/// Stop between driver calls once `token` is cancelled
	pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
		self.cancellation = token;
		self
	}
}

impl Default for ApplyMigrationCommand {
	fn default() -> Self {
		Self::new()
	}
}

#[async_trait]
impl BaseCommand for ApplyMigrationCommand {
	fn name(&self) -> &str {
		"apply-migration"
	}

	fn description(&self) -> &str {
		"Apply pending migrations"
	}

	async fn execute(&self, ctx: &CommandContext) -> CommandResult<()> {
		let repository = FilesystemRepository::new(ctx.migrations_dir());
		let migrations = repository.list().await?;
		if migrations.is_empty() {
			ctx.info("No migrations found");
			return Ok(());
		}

		let settings = &ctx.settings;
		let dry_run = ctx.has_option("dry-run");
		let executor = if dry_run {
			ctx.warning("Dry run: applying against an empty in-memory database");
			MigrationExecutor::new(InMemoryBackend::new(), ctx.migration_options())
		} else {
			ctx.verbose(&format!(
				"Connecting to {} ({})",
				settings.database_name, settings.database_url
			));
			let backend = MongoDBBackend::connect(&settings.database_url, &settings.database_name)
				.await
				.map_err(MigrationError::from)?;
			MigrationExecutor::new(backend, ctx.migration_options())
		};
		let executor = executor
			.with_timeout(settings.timeout())
			.with_cancellation(self.cancellation.clone())
			.with_history_collection(settings.history_collection.clone());

		let report = executor.apply(&migrations).await?;

		for id in &report.skipped {
			ctx.verbose(&format!("Skipped {} (already applied)", id));
		}
		if report.applied.is_empty() {
			ctx.info("No migrations to apply");
		} else {
			for id in &report.applied {
				ctx.info(&format!("Applied {}", id));
			}
			let verb = if dry_run { "Would apply" } else { "Applied" };
			ctx.success(&format!("{} {} migration(s)", verb, report.applied.len()));
		}
		Ok(())
	}
}

/// Fold the stored history into a single migration file
pub struct ConsolidateMigrationCommand;

#[async_trait]
impl BaseCommand for ConsolidateMigrationCommand {
	fn name(&self) -> &str {
		"consolidate-migration"
	}

	fn description(&self) -> &str {
		"Replace all migrations with one that builds the current schema"
	}

	async fn execute(&self, ctx: &CommandContext) -> CommandResult<()> {
		let mut repository = FilesystemRepository::new(ctx.migrations_dir());
		let history = repository.list().await?;
		if history.len() == 1 {
			ctx.info("History is already a single migration");
			return Ok(());
		}
		let Some(consolidated) = consolidate(&history)? else {
			ctx.info("No migrations to consolidate");
			return Ok(());
		};

		for migration in &history {
			repository.delete(&migration.id).await?;
		}
		if let Err(e) = repository.save(&consolidated).await {
			tracing::warn!(error = %e, "consolidated migration not saved, restoring history");
			for migration in &history {
				if let Err(restore) = repository.save(migration).await {
					tracing::warn!(migration = %migration.id, error = %restore, "restore failed");
				}
			}
			return Err(e.into());
		}

		ctx.success(&format!(
			"Consolidated {} migration(s) into {}",
			history.len(),
			consolidated.id
		));
		Ok(())
	}
}

/// Create `path` with `content`, refusing to overwrite
async fn write_new(path: &Path, content: &str) -> CommandResult<()> {
	use tokio::io::AsyncWriteExt;

	let mut file = tokio::fs::OpenOptions::new()
		.write(true)
		.create_new(true)
		.open(path)
		.await
		.map_err(|e| match e.kind() {
			std::io::ErrorKind::AlreadyExists => {
				CommandError::InvalidArguments(format!("{} already exists", path.display()))
			}
			_ => CommandError::ExecutionError(format!("Failed to create {}: {}", path.display(), e)),
		})?;
	file.write_all(content.as_bytes())
		.await
		.map_err(|e| CommandError::ExecutionError(format!("Failed to write {}: {}", path.display(), e)))?;
	file.flush()
		.await
		.map_err(|e| CommandError::ExecutionError(format!("Failed to write {}: {}", path.display(), e)))
}
