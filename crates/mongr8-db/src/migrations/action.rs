//! Actions and sub-actions
//!
//! An [`Action`] groups the changes made to one collection inside a
//! migration. Each [`SubAction`] carries an [`ActionSchema`] describing
//! exactly what changes: for field operations a single path into the field
//! tree, ending `depth` levels down at the node being created, dropped or
//! converted.

use crate::schema::{Collection, Field, FieldType, Index, Metadata};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SubActionType {
	CreateCollection,
	CreateField,
	ConvertField,
	CreateIndex,
	DropIndex,
	DropField,
	DropCollection,
}

impl SubActionType {
	/// Position in the execution order of an action
	///
	/// Creation runs outside-in (collection, fields, indexes); drops run
	/// inside-out.
	pub fn rank(self) -> u8 {
		match self {
			SubActionType::CreateCollection => 0,
			SubActionType::CreateField => 1,
			SubActionType::ConvertField => 2,
			SubActionType::CreateIndex => 3,
			SubActionType::DropIndex => 4,
			SubActionType::DropField => 5,
			SubActionType::DropCollection => 6,
		}
	}

	pub fn is_field_operation(self) -> bool {
		matches!(
			self,
			SubActionType::CreateField | SubActionType::DropField | SubActionType::ConvertField
		)
	}

	pub fn is_index_operation(self) -> bool {
		matches!(self, SubActionType::CreateIndex | SubActionType::DropIndex)
	}
}

impl fmt::Display for SubActionType {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		fmt::Debug::fmt(self, f)
	}
}

/// A sub-action that cannot be turned into a driver call
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid {action_type} on '{collection}': {reason}")]
pub struct SubActionError {
	pub action_type: SubActionType,
	pub collection: String,
	pub reason: String,
}

fn is_zero(depth: &usize) -> bool {
	*depth == 0
}

/// What a sub-action changes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionSchema {
	pub metadata: Metadata,
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub fields: Vec<Field>,
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub indexes: Vec<Index>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub convert_from: Option<FieldType>,
	#[serde(default, skip_serializing_if = "is_zero")]
	pub depth: usize,
}

impl ActionSchema {
	fn empty(metadata: Metadata) -> Self {
		Self {
			metadata,
			fields: Vec::new(),
			indexes: Vec::new(),
			convert_from: None,
			depth: 0,
		}
	}

	/// The field node a field operation targets
	pub fn target_field(&self) -> Option<&Field> {
		self.fields.first()?.at_depth(self.depth)
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubAction {
	#[serde(rename = "type")]
	pub action_type: SubActionType,
	pub schema: ActionSchema,
}

impl SubAction {
	pub fn create_collection(collection: &Collection) -> Self {
		Self::for_collection(SubActionType::CreateCollection, collection)
	}

	/// Carries the whole collection so the inverse can recreate it.
	pub fn drop_collection(collection: &Collection) -> Self {
		Self::for_collection(SubActionType::DropCollection, collection)
	}

	fn for_collection(action_type: SubActionType, collection: &Collection) -> Self {
		Self {
			action_type,
			schema: ActionSchema {
				fields: collection.fields.clone(),
				indexes: collection.indexes.clone(),
				..ActionSchema::empty(collection.metadata.clone())
			},
		}
	}

	pub fn create_field(metadata: Metadata, field: Field, depth: usize) -> Self {
		Self::for_field(SubActionType::CreateField, metadata, field, depth)
	}

	pub fn drop_field(metadata: Metadata, field: Field, depth: usize) -> Self {
		Self::for_field(SubActionType::DropField, metadata, field, depth)
	}

	/// Convert the node at `depth` from `from` to the type it has in `field`.
	pub fn convert_field(metadata: Metadata, field: Field, from: FieldType, depth: usize) -> Self {
		let mut action = Self::for_field(SubActionType::ConvertField, metadata, field, depth);
		action.schema.convert_from = Some(from);
		action
	}

	fn for_field(action_type: SubActionType, metadata: Metadata, field: Field, depth: usize) -> Self {
		Self {
			action_type,
			schema: ActionSchema {
				fields: vec![field],
				depth,
				..ActionSchema::empty(metadata)
			},
		}
	}

	pub fn create_index(metadata: Metadata, index: Index) -> Self {
		Self::for_index(SubActionType::CreateIndex, metadata, index)
	}

	pub fn drop_index(metadata: Metadata, index: Index) -> Self {
		Self::for_index(SubActionType::DropIndex, metadata, index)
	}

	fn for_index(action_type: SubActionType, metadata: Metadata, index: Index) -> Self {
		Self {
			action_type,
			schema: ActionSchema {
				indexes: vec![index],
				..ActionSchema::empty(metadata)
			},
		}
	}

	pub fn collection(&self) -> &str {
		&self.schema.metadata.name
	}

	/// Check the sub-action is well formed before it becomes a driver call.
	pub fn validate(&self) -> Result<(), SubActionError> {
		let fail = |reason: &str| {
			Err(SubActionError {
				action_type: self.action_type,
				collection: self.collection().to_string(),
				reason: reason.to_string(),
			})
		};

		if self.collection().is_empty() {
			return fail("collection name is empty");
		}

		let schema = &self.schema;
		match self.action_type {
			SubActionType::CreateCollection | SubActionType::DropCollection => {
				if schema.convert_from.is_some() || schema.depth != 0 {
					return fail("collection operations take no conversion");
				}
			}
			SubActionType::CreateField | SubActionType::DropField | SubActionType::ConvertField => {
				if schema.fields.len() != 1 || !schema.indexes.is_empty() {
					return fail("requires exactly one field");
				}
				let Some(root) = schema.fields.first() else {
					return fail("requires exactly one field");
				};
				let mut node = root;
				for _ in 0..schema.depth {
					if !node.field_type.is_composite() || node.children.len() != 1 {
						return fail("field path must descend through single-child composites");
					}
					node = &node.children[0];
				}

				match (self.action_type, schema.convert_from) {
					(SubActionType::ConvertField, None) => {
						return fail("requires a source type");
					}
					(SubActionType::ConvertField, Some(from)) => {
						if from == node.field_type {
							return fail("source and target types are the same");
						}
						if !from.is_scalar() || !node.field_type.is_scalar() {
							return fail("only scalar fields can be converted");
						}
					}
					(_, Some(_)) => return fail("only ConvertField takes a source type"),
					_ => {}
				}
			}
			SubActionType::CreateIndex | SubActionType::DropIndex => {
				if schema.indexes.len() != 1 || !schema.fields.is_empty() {
					return fail("requires exactly one index");
				}
			}
		}
		Ok(())
	}

	/// The sub-action that undoes this one
	pub fn inverse(&self) -> SubAction {
		let action_type = match self.action_type {
			SubActionType::CreateCollection => SubActionType::DropCollection,
			SubActionType::DropCollection => SubActionType::CreateCollection,
			SubActionType::CreateField => SubActionType::DropField,
			SubActionType::DropField => SubActionType::CreateField,
			SubActionType::CreateIndex => SubActionType::DropIndex,
			SubActionType::DropIndex => SubActionType::CreateIndex,
			SubActionType::ConvertField => SubActionType::ConvertField,
		};
		let mut inverse = SubAction {
			action_type,
			schema: self.schema.clone(),
		};

		if self.action_type == SubActionType::ConvertField
			&& let Some(from) = self.schema.convert_from
			&& let Some(root) = inverse.schema.fields.first_mut()
		{
			let depth = self.schema.depth;
			let mut node = root;
			for _ in 0..depth {
				if node.children.is_empty() {
					break;
				}
				node = &mut node.children[0];
			}
			inverse.schema.convert_from = Some(node.field_type);
			node.field_type = from;
		}
		inverse
	}
}

/// All changes to one collection within a migration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Action {
	pub collection: String,
	pub sub_actions: Vec<SubAction>,
}

impl Action {
	pub fn new(collection: impl Into<String>) -> Self {
		Self {
			collection: collection.into(),
			sub_actions: Vec::new(),
		}
	}

	/// Order sub-actions by [`SubActionType::rank`], keeping ties in place.
	pub fn sort(&mut self) {
		self.sub_actions.sort_by_key(|sub| sub.action_type.rank());
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	fn meta() -> Metadata {
		Metadata::new("users")
	}

	#[rstest]
	fn test_field_operation_needs_one_field() {
		// Arrange
		let mut action = SubAction::create_field(meta(), Field::string("a"), 0);
		action.schema.fields.push(Field::string("b"));

		// Act
		let result = action.validate();

		// Assert
		assert!(result.is_err());
	}

	#[rstest]
	fn test_convert_needs_source_type() {
		// Arrange
		let mut action = SubAction::convert_field(meta(), Field::double("age"), FieldType::Int64, 0);
		action.schema.convert_from = None;

		// Act & Assert
		assert_eq!(
			action.validate().unwrap_err().reason,
			"requires a source type"
		);
	}

	#[rstest]
	fn test_convert_to_same_type_is_invalid() {
		let action = SubAction::convert_field(meta(), Field::double("age"), FieldType::Double, 0);
		assert!(action.validate().is_err());
	}

	#[rstest]
	fn test_index_operation_needs_one_index() {
		let mut action = SubAction::create_index(meta(), crate::schema::Index::text("bio"));
		action.schema.indexes.clear();
		assert!(action.validate().is_err());
	}

	#[rstest]
	fn test_depth_must_follow_single_children() {
		// Arrange
		let info = Field::object("info", [Field::string("a"), Field::string("b")]).unwrap();

		// Act
		let action = SubAction::drop_field(meta(), info, 1);

		// Assert
		assert!(action.validate().is_err());
	}

	#[rstest]
	fn test_drop_field_constructor_is_distinct() {
		let action = SubAction::drop_field(meta(), Field::string("bio"), 0);
		assert_eq!(action.action_type, SubActionType::DropField);
		action.validate().unwrap();
	}

	#[rstest]
	fn test_convert_inverse_swaps_types() {
		// Arrange
		let field = Field::object("info", [Field::double("score")]).unwrap();
		let action = SubAction::convert_field(meta(), field, FieldType::Int32, 1);

		// Act
		let inverse = action.inverse();

		// Assert
		assert_eq!(inverse.schema.convert_from, Some(FieldType::Double));
		assert_eq!(
			inverse.schema.target_field().unwrap().field_type,
			FieldType::Int32
		);
		assert_eq!(inverse.inverse(), action);
	}

	#[rstest]
	fn test_sort_orders_by_rank() {
		// Arrange
		let mut action = Action::new("users");
		action.sub_actions = vec![
			SubAction::drop_field(meta(), Field::string("old"), 0),
			SubAction::create_index(meta(), crate::schema::Index::text("bio")),
			SubAction::create_field(meta(), Field::string("bio"), 0),
		];

		// Act
		action.sort();

		// Assert
		let kinds: Vec<_> = action.sub_actions.iter().map(|s| s.action_type).collect();
		assert_eq!(
			kinds,
			vec![
				SubActionType::CreateField,
				SubActionType::CreateIndex,
				SubActionType::DropField
			]
		);
	}
}
