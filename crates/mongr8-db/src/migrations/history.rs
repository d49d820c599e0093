//! History replay
//!
//! Folds the `up` actions of every migration, in ID order, into the schema
//! they produce. That schema is the "existing" side of the next diff.

use super::action::{Action, SubAction, SubActionType};
use super::migration::Migration;
use super::{MigrationError, Result};
use crate::schema::field::ensure_unique_names;
use crate::schema::{Collection, Field, FieldType};
use indexmap::IndexMap;

/// Collections produced by a prefix of the history
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HistoryState {
	collections: IndexMap<String, Collection>,
}

impl HistoryState {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn get(&self, name: &str) -> Option<&Collection> {
		self.collections.get(name)
	}

	pub fn collections(&self) -> Vec<Collection> {
		self.collections.values().cloned().collect()
	}

	pub fn into_collections(self) -> Vec<Collection> {
		self.collections.into_values().collect()
	}

	/// Fold the `up` actions of one migration.
	pub fn apply(&mut self, migration: &Migration) -> Result<()> {
		self.apply_actions(&migration.up)
			.map_err(|e| match e {
				MigrationError::CorruptHistory(reason) => {
					MigrationError::CorruptHistory(format!("{}: {}", migration.id, reason))
				}
				other => other,
			})
	}

	/// Fold a list of actions, then check the result is a valid tree.
	pub fn apply_actions(&mut self, actions: &[Action]) -> Result<()> {
		for action in actions {
			for sub_action in &action.sub_actions {
				self.apply_sub_action(sub_action)?;
			}
		}
		self.ensure_consistent()
	}

	pub fn apply_sub_action(&mut self, sub_action: &SubAction) -> Result<()> {
		sub_action.validate()?;

		let schema = &sub_action.schema;
		let name = sub_action.collection();

		if sub_action.action_type == SubActionType::CreateCollection {
			if self.collections.contains_key(name) {
				return Err(corrupt(format!("collection '{}' created twice", name)));
			}
			self.collections.insert(
				name.to_string(),
				Collection {
					metadata: schema.metadata.clone(),
					fields: schema.fields.clone(),
					indexes: schema.indexes.clone(),
				},
			);
			return Ok(());
		}

		if sub_action.action_type == SubActionType::DropCollection {
			return match self.collections.shift_remove(name) {
				Some(_) => Ok(()),
				None => Err(corrupt(format!("dropped unknown collection '{}'", name))),
			};
		}

		let collection = self
			.collections
			.get_mut(name)
			.ok_or_else(|| corrupt(format!("{} on unknown collection '{}'", sub_action.action_type, name)))?;

		match sub_action.action_type {
			SubActionType::CreateField => {
				for field in &schema.fields {
					insert_field(&mut collection.fields, field, schema.depth, name)?;
				}
			}
			SubActionType::DropField => {
				for field in &schema.fields {
					remove_field(&mut collection.fields, field, schema.depth, name)?;
				}
			}
			SubActionType::ConvertField => {
				let from = schema
					.convert_from
					.ok_or_else(|| corrupt(format!("conversion on '{}' without a source type", name)))?;
				for field in &schema.fields {
					convert_field(&mut collection.fields, field, from, schema.depth, name)?;
				}
			}
			SubActionType::CreateIndex => {
				for index in &schema.indexes {
					let key = index.key();
					if collection.indexes.iter().any(|existing| existing.key() == key) {
						return Err(corrupt(format!("index {} created twice on '{}'", key, name)));
					}
					collection.indexes.push(index.clone());
				}
			}
			SubActionType::DropIndex => {
				for index in &schema.indexes {
					let key = index.key();
					let position = collection
						.indexes
						.iter()
						.position(|existing| existing.key() == key)
						.ok_or_else(|| corrupt(format!("dropped unknown index {} on '{}'", key, name)))?;
					collection.indexes.remove(position);
				}
			}
			SubActionType::CreateCollection | SubActionType::DropCollection => {}
		}
		Ok(())
	}

	/// Field names must be unique per scope once a migration is complete.
	///
	/// A replaced field briefly exists twice (new type added before the old
	/// one is dropped), so this only runs at migration boundaries.
	fn ensure_consistent(&self) -> Result<()> {
		for collection in self.collections.values() {
			ensure_unique_tree(collection.name(), &collection.fields)
				.map_err(|e| corrupt(e.to_string()))?;
		}
		Ok(())
	}
}

fn ensure_unique_tree(scope: &str, fields: &[Field]) -> crate::schema::Result<()> {
	ensure_unique_names(scope, fields)?;
	for field in fields {
		if field.field_type.is_composite() {
			ensure_unique_tree(&format!("{}.{}", scope, field.name), &field.children)?;
		}
	}
	Ok(())
}

fn corrupt(reason: String) -> MigrationError {
	MigrationError::CorruptHistory(reason)
}

/// The like-named composite the path continues through
fn parent_mut<'a>(scope: &'a mut [Field], node: &Field, collection: &str) -> Result<&'a mut Field> {
	let mut same_name = false;
	for field in scope.iter_mut() {
		if field.name != node.name {
			continue;
		}
		if field.field_type == node.field_type {
			return Ok(field);
		}
		same_name = true;
	}

	if same_name {
		Err(corrupt(format!(
			"field '{}' in '{}' is not a {}",
			node.name, collection, node.field_type
		)))
	} else {
		Err(corrupt(format!(
			"unknown parent field '{}' in '{}'",
			node.name, collection
		)))
	}
}

fn only_child<'a>(node: &'a Field, collection: &str) -> Result<&'a Field> {
	node.children.first().ok_or_else(|| {
		corrupt(format!(
			"field path through '{}' in '{}' ends early",
			node.name, collection
		))
	})
}

fn insert_field(scope: &mut Vec<Field>, node: &Field, depth: usize, collection: &str) -> Result<()> {
	if depth == 0 {
		if scope
			.iter()
			.any(|field| field.name == node.name && field.field_type == node.field_type)
		{
			return Err(corrupt(format!(
				"field '{}' created twice in '{}'",
				node.name, collection
			)));
		}
		scope.push(node.clone());
		return Ok(());
	}

	let child = only_child(node, collection)?;
	let parent = parent_mut(scope, node, collection)?;
	insert_field(&mut parent.children, child, depth - 1, collection)
}

fn remove_field(scope: &mut Vec<Field>, node: &Field, depth: usize, collection: &str) -> Result<()> {
	if depth == 0 {
		let position = scope
			.iter()
			.position(|field| field.name == node.name && field.field_type == node.field_type)
			.ok_or_else(|| {
				corrupt(format!(
					"dropped unknown field '{}' ({}) in '{}'",
					node.name, node.field_type, collection
				))
			})?;
		scope.remove(position);
		return Ok(());
	}

	let child = only_child(node, collection)?;
	let parent = parent_mut(scope, node, collection)?;
	remove_field(&mut parent.children, child, depth - 1, collection)
}

fn convert_field(
	scope: &mut [Field],
	node: &Field,
	from: FieldType,
	depth: usize,
	collection: &str,
) -> Result<()> {
	if depth == 0 {
		let field = scope
			.iter_mut()
			.find(|field| field.name == node.name && field.field_type == from)
			.ok_or_else(|| {
				corrupt(format!(
					"converted unknown field '{}' ({}) in '{}'",
					node.name, from, collection
				))
			})?;
		field.field_type = node.field_type;
		return Ok(());
	}

	let child = only_child(node, collection)?;
	let parent = parent_mut(scope, node, collection)?;
	convert_field(&mut parent.children, child, from, depth - 1, collection)
}

/// Replay a whole history.
///
/// Migrations are replayed in ID order; two migrations with the same ID are
/// a corrupt history.
pub fn reconstruct(history: &[Migration]) -> Result<Vec<Collection>> {
	let mut ordered: Vec<&Migration> = history.iter().collect();
	ordered.sort_by(|a, b| a.id.cmp(&b.id));

	if let Some(pair) = ordered.windows(2).find(|pair| pair[0].id == pair[1].id) {
		return Err(corrupt(format!("duplicate migration id {}", pair[0].id)));
	}

	let mut state = HistoryState::new();
	for migration in ordered {
		state.apply(migration)?;
	}
	Ok(state.into_collections())
}

/// Structural equality of two schemas.
///
/// Ignores declaration order and `nullable`, neither of which the diff
/// engine acts on.
pub fn same_schema(a: &[Collection], b: &[Collection]) -> bool {
	normalized(a) == normalized(b)
}

fn normalized(collections: &[Collection]) -> Vec<Collection> {
	let mut collections = collections.to_vec();
	Collection::sort_all(&mut collections);
	for collection in &mut collections {
		clear_nullable(&mut collection.fields);
	}
	collections
}

fn clear_nullable(fields: &mut [Field]) {
	for field in fields {
		field.nullable = false;
		clear_nullable(&mut field.children);
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::schema::{Index, Metadata};
	use rstest::rstest;

	fn users() -> Collection {
		Collection::new(Metadata::new("users")).field(Field::string("name"))
	}

	fn migration(id: &str, sub_actions: Vec<SubAction>) -> Migration {
		let mut migration = Migration::new(id, "");
		let mut action = Action::new("users");
		action.sub_actions = sub_actions;
		migration.up.push(action);
		migration
	}

	#[rstest]
	fn test_replay_in_id_order() {
		// Arrange
		let history = vec![
			migration(
				"20240102_000000",
				vec![SubAction::create_field(
					Metadata::new("users"),
					Field::int32("age"),
					0,
				)],
			),
			migration("20240101_000000", vec![SubAction::create_collection(&users())]),
		];

		// Act
		let collections = reconstruct(&history).unwrap();

		// Assert
		assert_eq!(
			collections,
			vec![users().field(Field::int32("age"))]
		);
	}

	#[rstest]
	fn test_duplicate_create_is_corrupt() {
		// Arrange
		let history = vec![
			migration("20240101_000000", vec![SubAction::create_collection(&users())]),
			migration("20240102_000000", vec![SubAction::create_collection(&users())]),
		];

		// Act
		let result = reconstruct(&history);

		// Assert
		assert!(matches!(result, Err(MigrationError::CorruptHistory(_))));
	}

	#[rstest]
	fn test_composite_type_mismatch_is_corrupt() {
		// Arrange
		let existing = users().field(Field::array("info", Field::string("")));
		let nested = Field::object("info", [Field::string("a")]).unwrap();
		let history = vec![
			migration("20240101_000000", vec![SubAction::create_collection(&existing)]),
			migration(
				"20240102_000000",
				vec![SubAction::create_field(Metadata::new("users"), nested, 1)],
			),
		];

		// Act
		let result = reconstruct(&history);

		// Assert
		let Err(MigrationError::CorruptHistory(reason)) = result else {
			panic!("expected a corrupt history");
		};
		assert!(reason.contains("is not a Object"), "{}", reason);
	}

	#[rstest]
	fn test_drop_unknown_index_is_corrupt() {
		let history = vec![
			migration("20240101_000000", vec![SubAction::create_collection(&users())]),
			migration(
				"20240102_000000",
				vec![SubAction::drop_index(Metadata::new("users"), Index::text("name"))],
			),
		];
		assert!(matches!(
			reconstruct(&history),
			Err(MigrationError::CorruptHistory(_))
		));
	}

	#[rstest]
	fn test_replacement_within_one_migration() {
		// Arrange
		let meta = Metadata::new("users");
		let history = vec![
			migration("20240101_000000", vec![SubAction::create_collection(&users())]),
			migration(
				"20240102_000000",
				vec![
					SubAction::create_field(meta.clone(), Field::int32("name"), 0),
					SubAction::drop_field(meta, Field::string("name"), 0),
				],
			),
		];

		// Act
		let collections = reconstruct(&history).unwrap();

		// Assert
		assert_eq!(collections[0].fields, vec![Field::int32("name")]);
	}

	#[rstest]
	fn test_unfinished_replacement_is_corrupt() {
		let history = vec![
			migration("20240101_000000", vec![SubAction::create_collection(&users())]),
			migration(
				"20240102_000000",
				vec![SubAction::create_field(Metadata::new("users"), Field::int32("name"), 0)],
			),
		];
		assert!(matches!(
			reconstruct(&history),
			Err(MigrationError::CorruptHistory(_))
		));
	}

	#[rstest]
	fn test_nested_conversion() {
		// Arrange
		let existing = users().field(Field::array("scores", Field::int32("")));
		let converted = Field::array("scores", Field::double(""));
		let history = vec![
			migration("20240101_000000", vec![SubAction::create_collection(&existing)]),
			migration(
				"20240102_000000",
				vec![SubAction::convert_field(
					Metadata::new("users"),
					converted.clone(),
					FieldType::Int32,
					1,
				)],
			),
		];

		// Act
		let collections = reconstruct(&history).unwrap();

		// Assert
		assert_eq!(collections[0].fields[1], converted);
	}

	#[rstest]
	fn test_same_schema_ignores_order_and_nullable() {
		let a = vec![users().field(Field::int32("age").nullable())];
		let b = vec![
			Collection::new(Metadata::new("users"))
				.field(Field::int32("age"))
				.field(Field::string("name")),
		];
		assert!(same_schema(&a, &b));
	}
}
