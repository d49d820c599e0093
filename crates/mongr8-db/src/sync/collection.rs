//! Collection, metadata and index comparison

use super::{Result, Signable, Signed, SyncError, SyncOptions, union};
use crate::schema::{Collection, Index, Metadata};

impl Signable for Metadata {
	fn key(&self) -> String {
		Metadata::key(self)
	}

	fn intersect(&self, _existing: &Self, _options: &SyncOptions) -> Result<Vec<Signed<Self>>> {
		Ok(Vec::new())
	}
}

impl Signable for Index {
	fn key(&self) -> String {
		Index::key(self)
	}

	// Equal keys mean equal indexes.
	fn intersect(&self, _existing: &Self, _options: &SyncOptions) -> Result<Vec<Signed<Self>>> {
		Ok(Vec::new())
	}
}

impl Signable for Collection {
	fn key(&self) -> String {
		self.metadata.name.clone()
	}

	/// Field and index differences, one per emitted collection.
	///
	/// Each result carries the collection metadata and a single field or a
	/// single index, flagged as an intersection.
	fn intersect(&self, existing: &Self, options: &SyncOptions) -> Result<Vec<Signed<Self>>> {
		if self.metadata.key() != existing.metadata.key() {
			return Err(SyncError::NoRedesign {
				collection: self.metadata.name.clone(),
			});
		}

		let mut result = Vec::new();

		for field in union(&self.fields, &existing.fields, options)? {
			let mut signed = field.map(|field| Collection {
				metadata: self.metadata.clone(),
				fields: vec![field],
				indexes: Vec::new(),
			});
			signed.is_intersection = true;
			result.push(signed);
		}

		for index in union(&self.indexes, &existing.indexes, options)? {
			let mut signed = index.map(|index| Collection {
				metadata: self.metadata.clone(),
				fields: Vec::new(),
				indexes: vec![index],
			});
			signed.is_intersection = true;
			result.push(signed);
		}

		Ok(result)
	}
}
