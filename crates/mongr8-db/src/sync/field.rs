//! Field comparison
//!
//! Like-named fields of the same composite type are compared child by child.
//! Every signed child is rewrapped in its parent so the result still reads
//! as a path from the collection root to the change.

use super::{Result, Signable, Signed, SyncError, SyncOptions, union};
use crate::schema::{Field, FieldType};

/// Whether a stored `from` value can be rewritten as `to` in place.
///
/// Any scalar converts to `String`, and numeric kinds convert among
/// themselves. Forced conversion opens every scalar pair.
pub fn can_convert(from: FieldType, to: FieldType, options: &SyncOptions) -> bool {
	if from == to || !from.is_scalar() || !to.is_scalar() {
		return false;
	}
	to == FieldType::String
		|| (from.is_numeric() && to.is_numeric())
		|| options.use_force_conversion
}

/// Conversions that may overflow or truncate stored values
pub fn is_lossy_conversion(from: FieldType, to: FieldType) -> bool {
	match (from, to) {
		(FieldType::Int64, FieldType::Int32)
		| (FieldType::Double, FieldType::Int32)
		| (FieldType::Double, FieldType::Int64) => true,
		(from, to) if from == to || to == FieldType::String => false,
		(from, to) => !(from.is_numeric() && to.is_numeric()),
	}
}

/// Structural equality that ignores `nullable`
pub(crate) fn same_shape(a: &Field, b: &Field) -> bool {
	a.name == b.name
		&& a.field_type == b.field_type
		&& a.coordinates == b.coordinates
		&& a.children.len() == b.children.len()
		&& a
			.children
			.iter()
			.zip(&b.children)
			.all(|(x, y)| same_shape(x, y))
}

fn shell(parent: &Field) -> Field {
	Field {
		children: Vec::new(),
		..parent.clone()
	}
}

impl Signable for Field {
	fn key(&self) -> String {
		self.name.clone()
	}

	fn intersect(&self, existing: &Self, options: &SyncOptions) -> Result<Vec<Signed<Self>>> {
		if self.field_type == existing.field_type {
			if self.field_type.is_composite() {
				let children = union(&self.children, &existing.children, options)?;
				let parent = shell(self);
				return Ok(children
					.into_iter()
					.map(|child| {
						let mut wrapped = child.map(|node| Field {
							children: vec![node],
							..parent.clone()
						});
						wrapped.is_intersection = true;
						wrapped.depth += 1;
						wrapped
					})
					.collect());
			}

			if same_shape(self, existing) {
				return Ok(Vec::new());
			}
			return Err(SyncError::ShapeChange {
				field: self.name.clone(),
				field_type: self.field_type,
			});
		} else if can_convert(existing.field_type, self.field_type, options) {
			let mut signed = Signed::convert(self.clone(), existing.clone());
			signed.is_intersection = true;
			return Ok(vec![signed]);
		}

		let mut plus = Signed::plus(self.clone());
		let mut minus = Signed::minus(existing.clone());
		plus.is_intersection = true;
		minus.is_intersection = true;
		Ok(vec![plus, minus])
	}
}
