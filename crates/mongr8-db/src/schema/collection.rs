use super::{Field, Index, Metadata};
use serde::{Deserialize, Serialize};

/// A collection: metadata, top-level fields and indexes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Collection {
	pub metadata: Metadata,
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub fields: Vec<Field>,
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub indexes: Vec<Index>,
}

impl Collection {
	pub fn new(metadata: Metadata) -> Self {
		Self {
			metadata,
			fields: Vec::new(),
			indexes: Vec::new(),
		}
	}

	pub fn field(mut self, field: Field) -> Self {
		self.fields.push(field);
		self
	}

	pub fn fields(mut self, fields: impl IntoIterator<Item = Field>) -> Self {
		self.fields.extend(fields);
		self
	}

	pub fn index(mut self, index: Index) -> Self {
		self.indexes.push(index);
		self
	}

	pub fn name(&self) -> &str {
		&self.metadata.name
	}

	/// Sort collections, every field scope and the index list.
	///
	/// Makes generated migrations independent of declaration order.
	pub fn sort_all(collections: &mut [Collection]) {
		collections.sort_by(|a, b| a.metadata.name.cmp(&b.metadata.name));
		for collection in collections.iter_mut() {
			sort_fields(&mut collection.fields);
			collection.indexes.sort_by_key(Index::key);
		}
	}
}

fn sort_fields(fields: &mut [Field]) {
	fields.sort_by(|a, b| {
		a.name
			.cmp(&b.name)
			.then_with(|| a.field_type.cmp(&b.field_type))
	});
	for field in fields.iter_mut() {
		if field.field_type.is_composite() {
			sort_fields(&mut field.children);
		}
	}
}
