//! # Schema model
//!
//! Typed declarations of the collections an application expects to find in
//! the database.
//!
//! A [`Collection`] is a [`Metadata`] header plus a tree of [`Field`]s and a
//! list of [`Index`]es. Values are built with constructor functions that
//! enforce the construction-time invariants (array arity, unique object
//! children, one-shot metadata options). Everything that needs the whole
//! schema in view, such as index paths or the reserved history collection
//! name, is checked by [`validate`] before the schema enters the diff engine.
//!
//! ## Example
//!
//! ```rust
//! use mongr8_db::schema::{Collection, Field, Index, Metadata, validate};
//!
//! let users = Collection::new(Metadata::new("users"))
//! 	.field(Field::string("name"))
//! 	.field(Field::int32("age"))
//! 	.index(Index::compound([("name", -1), ("age", 1)]).unwrap());
//!
//! validate(&[users]).unwrap();
//! ```

pub mod collection;
pub mod field;
pub mod index;
pub mod metadata;
pub mod validation;

pub use collection::Collection;
pub use field::{CoordinateKeys, Field, FieldType};
pub use index::{Index, IndexKey, IndexType, IndexValue};
pub use metadata::{CollectionKind, CollectionOptions, Metadata};
pub use validation::{HISTORY_COLLECTION, MAX_NAME_LENGTH, validate};

use thiserror::Error;

/// Violations of the schema invariants.
///
/// Raised by builders at construction time and by [`validate`]. A schema
/// that produces any of these never reaches the diff engine.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
	#[error("Duplicate collection: {0}")]
	DuplicateCollection(String),

	#[error("Collection name '{0}' is reserved")]
	ReservedCollection(String),

	#[error("Duplicate field '{field}' in {scope}")]
	DuplicateField { scope: String, field: String },

	#[error("Field '_id' in collection '{collection}' cannot be of type {field_type}")]
	InvalidIdType {
		collection: String,
		field_type: FieldType,
	},

	#[error("Invalid field name '{name}': {reason}")]
	InvalidFieldName { name: String, reason: String },

	#[error("Array field '{0}' accepts at most one element type")]
	TooManyArrayChildren(String),

	#[error("Index '{index}' on collection '{collection}' references unknown field '{field}'")]
	MissingIndexField {
		collection: String,
		index: String,
		field: String,
	},

	#[error("Duplicate index '{index}' on collection '{collection}'")]
	DuplicateIndex { collection: String, index: String },

	#[error("TTL index '{index}' on collection '{collection}' does not reference a timestamp field")]
	TtlWithoutTimestamp { collection: String, index: String },

	#[error("Invalid index: {0}")]
	InvalidIndex(String),

	#[error("Index rules cannot be changed on a raw index")]
	RawIndexRule,

	#[error("Invalid metadata for collection '{collection}': {reason}")]
	InvalidMetadata { collection: String, reason: String },

	#[error("Invalid field '{field}': {reason}")]
	InvalidField { field: String, reason: String },
}

pub type Result<T> = std::result::Result<T, SchemaError>;
