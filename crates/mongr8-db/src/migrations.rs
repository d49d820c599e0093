//! # Migrations
//!
//! Generation, storage and application of migrations.
//!
//! - [`MigrationGenerator`] diffs the declared schema against the schema
//!   replayed from history and emits a new [`Migration`].
//! - [`FilesystemRepository`] stores migrations as JSON files.
//! - [`MigrationExecutor`] applies pending migrations, one transaction per
//!   migration, and records each in the history collection.
//! - [`consolidate`] folds a whole history into a single migration.
//!
//! ## Example
//!
//! ```rust,no_run
//! use mongr8_db::migrations::{
//! 	FilesystemRepository, MigrationExecutor, MigrationGenerator, MigrationOptions,
//! 	MigrationRepository,
//! };
//! use mongr8_db::nosql::MongoDBBackend;
//! use mongr8_db::schema::{Collection, Field, Metadata};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let options = MigrationOptions::default();
//! let mut repository = FilesystemRepository::new("./migrations");
//! let history = repository.list().await?;
//!
//! let desired = vec![Collection::new(Metadata::new("users")).field(Field::string("name"))];
//! if let Some(migration) =
//! 	MigrationGenerator::new(&options).generate(&desired, &history, chrono::Utc::now())?
//! {
//! 	repository.save(&migration).await?;
//! }
//!
//! let backend = MongoDBBackend::builder().database("app").build().await?;
//! let report = MigrationExecutor::new(backend, options)
//! 	.apply(&repository.list().await?)
//! 	.await?;
//! println!("applied {:?}", report.applied);
//! # Ok(())
//! # }
//! ```

pub mod action;
pub mod consolidate;
pub mod executor;
pub mod generator;
pub mod history;
pub mod migration;
pub mod pipeline;
pub mod repository;

pub use action::{Action, ActionSchema, SubAction, SubActionError, SubActionType};
pub use consolidate::consolidate;
pub use executor::{ApplyReport, MigrationExecutor, SubActionState};
pub use generator::MigrationGenerator;
pub use history::{HistoryState, reconstruct};
pub use migration::{Migration, next_id};
pub use repository::{MigrationRepository, filesystem::FilesystemRepository};

use crate::nosql::NoSQLError;
use crate::schema::SchemaError;
use crate::sync::SyncError;
use std::fmt;
use thiserror::Error;

/// Switches shared by generation and application
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MigrationOptions {
	/// Sort collections, fields and indexes before diffing
	pub use_sorted_schema: bool,
	/// Convert between any two scalar types
	pub use_force_conversion: bool,
	/// Maintain `$jsonSchema` validators on collections
	pub use_schema_validation: bool,
	/// Run each migration inside a session transaction
	pub use_transaction: bool,
	/// Description of the generated migration
	pub desc: String,
}

impl MigrationOptions {
	pub(crate) fn sync_options(&self) -> crate::sync::SyncOptions {
		crate::sync::SyncOptions {
			use_force_conversion: self.use_force_conversion,
		}
	}
}

/// Outcome of the abort that followed a failed migration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RollbackStatus {
	Ok,
	Failed,
	/// No transaction was open
	Skipped,
}

impl fmt::Display for RollbackStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			RollbackStatus::Ok => write!(f, "ok"),
			RollbackStatus::Failed => write!(f, "failed"),
			RollbackStatus::Skipped => write!(f, "skipped"),
		}
	}
}

#[derive(Debug, Error)]
pub enum MigrationError {
	#[error("Corrupt migration history: {0}")]
	CorruptHistory(String),

	#[error("Invalid migration: {0}")]
	InvalidMigration(String),

	#[error(transparent)]
	InvalidSubAction(#[from] SubActionError),

	#[error("Migration not found: {0}")]
	NotFound(String),

	#[error("Migration already exists: {0}")]
	AlreadyExists(String),

	/// A new migration has the same `Up` actions as an existing one
	#[error("Duplicate operations: {0}")]
	DuplicateOperations(String),

	#[error("Driver error: {0}")]
	Driver(#[from] NoSQLError),

	#[error("Cancelled: {0}")]
	Cancelled(String),

	/// A migration failed and its transaction was aborted
	#[error("Migration {migration} failed (rollback={rollback}): {source}")]
	Apply {
		migration: String,
		rollback: RollbackStatus,
		#[source]
		source: Box<MigrationError>,
	},

	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),

	#[error("JSON error: {0}")]
	Json(#[from] serde_json::Error),

	#[error(transparent)]
	Schema(#[from] SchemaError),

	#[error(transparent)]
	Sync(#[from] SyncError),
}

pub type Result<T> = std::result::Result<T, MigrationError>;

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	#[rstest]
	#[case(RollbackStatus::Ok, "rollback=ok")]
	#[case(RollbackStatus::Failed, "rollback=failed")]
	fn test_apply_error_reports_rollback(#[case] rollback: RollbackStatus, #[case] expected: &str) {
		// Arrange
		let error = MigrationError::Apply {
			migration: "20240101_000000".to_string(),
			rollback,
			source: Box::new(MigrationError::Driver(NoSQLError::ExecutionError(
				"index build failed".to_string(),
			))),
		};

		// Act
		let message = error.to_string();

		// Assert
		assert!(message.contains(expected), "{}", message);
		assert!(message.contains("index build failed"));
		assert!(std::error::Error::source(&error).is_some());
	}
}
