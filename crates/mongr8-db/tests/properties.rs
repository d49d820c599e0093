//! Property-based tests for the diff engine and history replay

use chrono::{TimeZone, Utc};
use mongr8_db::migrations::history::same_schema;
use mongr8_db::migrations::{HistoryState, Migration, MigrationGenerator, MigrationOptions, reconstruct};
use mongr8_db::schema::{Collection, Field, FieldType, Index, Metadata};
use mongr8_db::sync::{SyncOptions, get_actions};
use proptest::prelude::*;
use serde_json::{Map, Value, json};
use std::collections::BTreeMap;

fn leaf(name: &str, kind: FieldType) -> Field {
	match kind {
		FieldType::Int32 => Field::int32(name),
		FieldType::Int64 => Field::int64(name),
		FieldType::Double => Field::double(name),
		FieldType::Boolean => Field::boolean(name),
		FieldType::Timestamp => Field::timestamp(name),
		_ => Field::string(name),
	}
}

fn scalar_type() -> impl Strategy<Value = FieldType> + Clone {
	prop::sample::select(vec![
		FieldType::String,
		FieldType::Int32,
		FieldType::Int64,
		FieldType::Double,
		FieldType::Boolean,
		FieldType::Timestamp,
	])
}

/// Shape of a generated field, named when it is built
#[derive(Debug, Clone)]
enum Shape {
	Leaf(FieldType),
	Object(BTreeMap<String, Shape>),
	Array(Box<Shape>),
}

fn shape() -> impl Strategy<Value = Shape> + Clone {
	let leaf = scalar_type().prop_map(Shape::Leaf);
	leaf.prop_recursive(3, 12, 3, |inner| {
		prop_oneof![
			prop::collection::btree_map("[a-c]", inner.clone(), 1..3).prop_map(Shape::Object),
			inner.prop_map(|element| Shape::Array(Box::new(element))),
		]
	})
}

fn build(name: &str, shape: &Shape) -> Field {
	match shape {
		Shape::Leaf(kind) => leaf(name, *kind),
		Shape::Object(children) => Field::object(
			name,
			children.iter().map(|(child, shape)| build(child, shape)),
		)
		.unwrap(),
		Shape::Array(element) => Field::array(name, build("", element)),
	}
}

/// Small name alphabets so two generated schemas overlap often
fn collections_of(
	field: impl Strategy<Value = Shape> + Clone,
) -> impl Strategy<Value = Vec<Collection>> {
	let fields = prop::collection::btree_map(
		"[a-f]",
		(field, prop::option::of(any::<bool>())),
		0..5,
	);
	prop::collection::btree_map("[a-d]", fields, 0..4).prop_map(|collections| {
		collections
			.into_iter()
			.map(|(name, fields)| {
				let mut collection = Collection::new(Metadata::new(format!("c{}", name)));
				for (field, (shape, index)) in fields {
					collection = collection.field(build(&field, &shape));
					// Indexes only on top-level scalars
					if let (Shape::Leaf(_), Some(ascending)) = (&shape, index) {
						let direction = if ascending { 1 } else { -1 };
						collection = collection.index(Index::single_field(field, direction));
					}
				}
				collection
			})
			.collect()
	})
}

/// Flat schemas of scalar fields
fn schema() -> impl Strategy<Value = Vec<Collection>> {
	collections_of(scalar_type().prop_map(Shape::Leaf))
}

/// Schemas whose fields nest objects and arrays
fn nested_schema() -> impl Strategy<Value = Vec<Collection>> {
	collections_of(shape())
}

fn replay(collections: &[Collection]) -> HistoryState {
	let (up, _) = get_actions(collections, &[], &SyncOptions::default()).unwrap();
	let mut state = HistoryState::new();
	state.apply_actions(&up).unwrap();
	state
}

proptest! {
	/// Diffing a schema against itself emits nothing.
	#[test]
	fn prop_identical_schemas_are_minimal(collections in schema()) {
		let (up, down) = get_actions(&collections, &collections, &SyncOptions::default()).unwrap();
		prop_assert!(up.is_empty());
		prop_assert!(down.is_empty());
	}

	/// `Up` takes the existing schema to the desired one; `Down` takes it back.
	#[test]
	fn prop_up_then_down_restores(
		desired in schema(),
		existing in schema(),
		force in any::<bool>(),
	) {
		let options = SyncOptions { use_force_conversion: force };
		let (up, down) = get_actions(&desired, &existing, &options).unwrap();

		let mut state = replay(&existing);
		state.apply_actions(&up).unwrap();
		prop_assert!(same_schema(&state.collections(), &desired));

		state.apply_actions(&down).unwrap();
		prop_assert!(same_schema(&state.collections(), &existing));
	}

	/// Replay is deterministic and a replayed history has nothing left to generate.
	#[test]
	fn prop_history_replay_is_idempotent(first in schema(), second in schema()) {
		let options = MigrationOptions::default();
		let generator = MigrationGenerator::new(&options);
		let mut history: Vec<Migration> = Vec::new();
		for (hour, desired) in [(1, &first), (2, &second)] {
			let now = Utc.with_ymd_and_hms(2024, 1, 1, hour, 0, 0).unwrap();
			if let Some(migration) = generator.generate(desired, &history, now).unwrap() {
				history.push(migration);
			}
		}

		let once = reconstruct(&history).unwrap();
		let twice = reconstruct(&history).unwrap();
		prop_assert_eq!(&once, &twice);
		prop_assert!(same_schema(&once, &second));

		let now = Utc.with_ymd_and_hms(2024, 1, 1, 3, 0, 0).unwrap();
		prop_assert!(generator.generate(&second, &history, now).unwrap().is_none());
	}

	/// Up/Down inversion holds through nested objects and arrays.
	#[test]
	fn prop_nested_up_then_down_restores(
		desired in nested_schema(),
		existing in nested_schema(),
		force in any::<bool>(),
	) {
		let options = SyncOptions { use_force_conversion: force };
		let (up, down) = get_actions(&desired, &existing, &options).unwrap();

		let mut state = replay(&existing);
		state.apply_actions(&up).unwrap();
		prop_assert!(same_schema(&state.collections(), &desired));

		state.apply_actions(&down).unwrap();
		prop_assert!(same_schema(&state.collections(), &existing));
	}

	/// Replaying a nested history reproduces the declared schema.
	#[test]
	fn prop_nested_history_replay_is_idempotent(
		first in nested_schema(),
		second in nested_schema(),
	) {
		let options = MigrationOptions::default();
		let generator = MigrationGenerator::new(&options);
		let mut history: Vec<Migration> = Vec::new();
		for (hour, desired) in [(1, &first), (2, &second)] {
			let now = Utc.with_ymd_and_hms(2024, 1, 1, hour, 0, 0).unwrap();
			if let Some(migration) = generator.generate(desired, &history, now).unwrap() {
				history.push(migration);
			}
		}

		let replayed = reconstruct(&history).unwrap();
		prop_assert!(same_schema(&replayed, &second));

		let now = Utc.with_ymd_and_hms(2024, 1, 1, 3, 0, 0).unwrap();
		prop_assert!(generator.generate(&second, &history, now).unwrap().is_none());
	}

	/// The structural key does not depend on the order rules were given in.
	#[test]
	fn prop_index_key_ignores_rule_order(
		rules in Just(vec![
			("sparse", json!(true)),
			("unique", json!(true)),
			("hidden", json!(false)),
			("partialFilterExpression", json!({ "age": { "$gt": 1 }, "name": { "$exists": true } })),
		]).prop_shuffle(),
	) {
		let shuffled: Map<String, Value> = rules
			.iter()
			.map(|(rule, value)| (rule.to_string(), value.clone()))
			.collect();
		let mut reversed = Map::new();
		for (rule, value) in rules.iter().rev() {
			reversed.insert(rule.to_string(), value.clone());
		}

		let a = Index::raw([("name", 1), ("age", -1)], shuffled).unwrap();
		let b = Index::raw([("name", 1), ("age", -1)], reversed).unwrap();
		prop_assert_eq!(a.key(), b.key());
		prop_assert_eq!(a.display_name(), b.display_name());
	}
}
