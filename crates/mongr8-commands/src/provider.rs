//! Schema providers

use mongr8_db::schema::Collection;

/// Supplies the desired schema to `generate-migration`
pub trait SchemaProvider {
	fn collections() -> Vec<Collection>;
}

/// Declares nothing; used by the bundled `mongr8` binary.
pub struct EmptyProvider;

impl SchemaProvider for EmptyProvider {
	fn collections() -> Vec<Collection> {
		Vec::new()
	}
}
