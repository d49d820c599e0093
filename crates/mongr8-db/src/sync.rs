//! # Diff / sync engine
//!
//! Reconciles a desired schema with an existing one through a small algebra
//! of signed entities. [`union`] buckets both sides by [`Signable::key`]:
//! keys only on the existing side come out [`Sign::Minus`], keys only on the
//! desired side [`Sign::Plus`], and shared keys are handed to
//! [`Signable::intersect`] for a finer comparison.
//!
//! [`get_actions`] turns the signed collections into per-collection
//! [`Action`](crate::migrations::Action)s for `Up` and `Down`.
//!
//! Everything here is pure: no I/O, no shared state.

pub mod actions;
pub mod collection;
pub mod field;

pub use actions::get_actions;
pub use field::{can_convert, is_lossy_conversion};

use crate::migrations::action::SubActionError;
use crate::schema::SchemaError;
use indexmap::IndexMap;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Sign {
	Plus,
	Minus,
	Convert,
}

/// A schema entity tagged with the direction of its change
#[derive(Debug, Clone, PartialEq)]
pub struct Signed<T> {
	pub sign: Sign,
	pub entity: T,
	/// The pre-conversion entity, for [`Sign::Convert`]
	pub convert_from: Option<T>,
	/// Produced by comparing two entities that share a key
	pub is_intersection: bool,
	/// Levels between the root of `entity` and the node that changed
	pub depth: usize,
}

impl<T> Signed<T> {
	pub fn plus(entity: T) -> Self {
		Self::new(Sign::Plus, entity)
	}

	pub fn minus(entity: T) -> Self {
		Self::new(Sign::Minus, entity)
	}

	pub fn convert(entity: T, from: T) -> Self {
		Self {
			convert_from: Some(from),
			..Self::new(Sign::Convert, entity)
		}
	}

	fn new(sign: Sign, entity: T) -> Self {
		Self {
			sign,
			entity,
			convert_from: None,
			is_intersection: false,
			depth: 0,
		}
	}

	/// Rewrap the entity and its conversion source, keeping the sign.
	pub fn map<U>(self, mut wrap: impl FnMut(T) -> U) -> Signed<U> {
		Signed {
			sign: self.sign,
			entity: wrap(self.entity),
			convert_from: self.convert_from.map(&mut wrap),
			is_intersection: self.is_intersection,
			depth: self.depth,
		}
	}
}

/// Entities the engine can diff
pub trait Signable: Clone {
	/// Identity used to pair desired and existing entities
	fn key(&self) -> String;

	/// Signed differences between two entities with the same key.
	///
	/// `self` is the desired side.
	fn intersect(&self, existing: &Self, options: &SyncOptions) -> Result<Vec<Signed<Self>>>;
}

/// Knobs of the diff engine
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncOptions {
	/// Convert between any two scalar kinds instead of dropping and
	/// recreating the field
	pub use_force_conversion: bool,
}

#[non_exhaustive]
#[derive(Debug, Error)]
pub enum SyncError {
	#[error("Collection '{collection}' cannot be redesigned: its metadata changed")]
	NoRedesign { collection: String },

	#[error("Field '{field}' keeps type {field_type} but changes shape; rename it or change its type")]
	ShapeChange {
		field: String,
		field_type: crate::schema::FieldType,
	},

	#[error("Unexpected {sign:?} change for collection '{collection}'")]
	UnexpectedSign { collection: String, sign: Sign },

	#[error(transparent)]
	Schema(#[from] SchemaError),

	#[error(transparent)]
	SubAction(#[from] SubActionError),
}

pub type Result<T> = std::result::Result<T, SyncError>;

/// Signed union of a desired and an existing entity list.
///
/// Output order is minus entries, then plus entries, then intersections,
/// each group following the order of its source list.
pub fn union<T: Signable>(
	desired: &[T],
	existing: &[T],
	options: &SyncOptions,
) -> Result<Vec<Signed<T>>> {
	let desired_by_key: IndexMap<String, &T> =
		desired.iter().map(|entity| (entity.key(), entity)).collect();
	let existing_by_key: IndexMap<String, &T> =
		existing.iter().map(|entity| (entity.key(), entity)).collect();

	let mut result = Vec::new();

	for (key, entity) in &existing_by_key {
		if !desired_by_key.contains_key(key) {
			result.push(Signed::minus((*entity).clone()));
		}
	}

	for (key, entity) in &desired_by_key {
		if !existing_by_key.contains_key(key) {
			result.push(Signed::plus((*entity).clone()));
		}
	}

	for (key, entity) in &desired_by_key {
		if let Some(existing) = existing_by_key.get(key) {
			result.extend(entity.intersect(existing, options)?);
		}
	}

	Ok(result)
}
