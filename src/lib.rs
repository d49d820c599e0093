//! # mongr8
//!
//! Schema migrations for MongoDB, declared in Rust.
//!
//! Collections are described as typed trees of fields and indexes. mongr8
//! diffs the declared schema against the schema replayed from the stored
//! migration history, writes the difference as a new migration, and applies
//! pending migrations to a database in order.
//!
//! ## Feature Flags
//!
//! - `db` - schema model, diff engine, migrations, MongoDB backend
//! - `conf` - layered settings (defaults, `mongr8.toml`, `MONGR8_*`)
//! - `commands` - the `mongr8` command line
//! - `full` (default) - all of the above
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use mongr8::prelude::*;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let desired = vec![
//! 	Collection::new(Metadata::new("users"))
//! 		.field(Field::string("name"))
//! 		.index(Index::single_field("name", 1)),
//! ];
//!
//! let options = MigrationOptions::default();
//! let mut repository = FilesystemRepository::new("migrations");
//! let history = repository.list().await?;
//! if let Some(migration) =
//! 	MigrationGenerator::new(&options).generate(&desired, &history, chrono::Utc::now())?
//! {
//! 	repository.save(&migration).await?;
//! }
//! # Ok(())
//! # }
//! ```

#[cfg(feature = "commands")]
pub use mongr8_commands as commands;
#[cfg(feature = "conf")]
pub use mongr8_conf as conf;
#[cfg(feature = "db")]
pub use mongr8_db as db;

#[cfg(feature = "conf")]
pub use mongr8_conf::{Settings, SettingsError};

#[cfg(feature = "db")]
pub use mongr8_db::Version;

/// Common imports
pub mod prelude {
	#[cfg(feature = "db")]
	pub use mongr8_db::migrations::{
		ApplyReport, FilesystemRepository, Migration, MigrationError, MigrationExecutor,
		MigrationGenerator, MigrationOptions, MigrationRepository,
	};
	#[cfg(feature = "db")]
	pub use mongr8_db::nosql::{InMemoryBackend, MongoDBBackend, SchemaBackend};
	#[cfg(feature = "db")]
	pub use mongr8_db::schema::{Collection, Field, FieldType, Index, Metadata};

	#[cfg(feature = "conf")]
	pub use mongr8_conf::Settings;

	#[cfg(feature = "commands")]
	pub use mongr8_commands::{SchemaProvider, execute_from_command_line};
}
