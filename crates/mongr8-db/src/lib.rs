//! # mongr8 Database
//!
//! Schema migrations for MongoDB.
//!
//! This crate provides:
//! - **Schema model** (`schema`): collections, typed field trees and indexes,
//!   validated when built
//! - **Dictionary** (`dictionary`): prototype documents, index models and
//!   `$jsonSchema` validators derived from the schema
//! - **Diff engine** (`sync`): signed-entity union of a desired and an
//!   existing schema, turned into ordered actions
//! - **Migrations** (`migrations`): history replay, generation, file storage,
//!   consolidation and the transactional executor
//! - **Backends** (`nosql`): the MongoDB driver and an in-memory catalog
//!
//! ## Quick Start
//!
//! ```rust
//! use mongr8_db::migrations::{MigrationGenerator, MigrationOptions};
//! use mongr8_db::schema::{Collection, Field, Index, Metadata};
//!
//! let desired = vec![
//! 	Collection::new(Metadata::new("users"))
//! 		.field(Field::string("name"))
//! 		.field(Field::int32("age"))
//! 		.index(Index::compound([("name", -1), ("age", 1)]).unwrap()),
//! ];
//!
//! let options = MigrationOptions::default();
//! let migration = MigrationGenerator::new(&options)
//! 	.generate(&desired, &[], chrono::Utc::now())
//! 	.unwrap()
//! 	.unwrap();
//! assert_eq!(migration.up[0].collection, "users");
//! ```

pub mod dictionary;
pub mod migrations;
pub mod nosql;
pub mod schema;
pub mod sync;
pub mod version;

pub use version::Version;
