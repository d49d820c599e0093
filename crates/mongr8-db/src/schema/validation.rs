//! Whole-schema validation
//!
//! Runs once over the desired schema before it is diffed or translated.

use super::field::ensure_unique_names;
use super::index::{COLLATION_KEYS, INDEX_RULES, RULE_COLLATION, RULE_PARTIAL_FILTER};
use super::{Collection, CollectionKind, Field, FieldType, Index, IndexType, IndexValue};
use super::{Result, SchemaError};
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};

/// Collection that records applied migrations; user schemas may not use it.
pub const HISTORY_COLLECTION: &str = "mongr8_migration_history";

pub const MAX_NAME_LENGTH: usize = 128;

const ID_TYPES: [FieldType; 4] = [
	FieldType::Int32,
	FieldType::Int64,
	FieldType::Double,
	FieldType::String,
];

/// Check every schema invariant across a set of collections.
pub fn validate(collections: &[Collection]) -> Result<()> {
	let mut seen = HashSet::new();
	for collection in collections {
		let name = collection.name();
		validate_collection_name(name)?;
		if name == HISTORY_COLLECTION {
			return Err(SchemaError::ReservedCollection(name.to_string()));
		}
		if !seen.insert(name) {
			return Err(SchemaError::DuplicateCollection(name.to_string()));
		}
		validate_collection(collection)?;
	}
	Ok(())
}

fn validate_collection_name(name: &str) -> Result<()> {
	let reason = if name.is_empty() {
		Some("collection name cannot be empty")
	} else if name.len() > MAX_NAME_LENGTH {
		Some("collection name is too long")
	} else if name.contains('$') {
		Some("collection name cannot contain '$'")
	} else if name.starts_with("system.") {
		Some("the system. prefix is reserved")
	} else {
		None
	};

	match reason {
		Some(reason) => Err(SchemaError::InvalidMetadata {
			collection: name.to_string(),
			reason: reason.to_string(),
		}),
		None => Ok(()),
	}
}

fn validate_collection(collection: &Collection) -> Result<()> {
	let name = collection.name();

	if collection.metadata.kind == CollectionKind::View {
		if collection.metadata.options.view_on.is_none() {
			return Err(SchemaError::InvalidMetadata {
				collection: name.to_string(),
				reason: "a view needs a source collection".to_string(),
			});
		}
		if !collection.fields.is_empty() || !collection.indexes.is_empty() {
			return Err(SchemaError::InvalidMetadata {
				collection: name.to_string(),
				reason: "a view cannot declare fields or indexes".to_string(),
			});
		}
		return Ok(());
	}

	validate_fields(name, &collection.fields, false)?;

	if let Some(id) = collection.fields.iter().find(|field| field.name == "_id")
		&& !ID_TYPES.contains(&id.field_type)
	{
		return Err(SchemaError::InvalidIdType {
			collection: name.to_string(),
			field_type: id.field_type,
		});
	}

	let paths = field_paths(&collection.fields);
	let mut index_keys = HashSet::new();
	for index in &collection.indexes {
		validate_index(name, index, &paths)?;
		if !index_keys.insert(index.key()) {
			return Err(SchemaError::DuplicateIndex {
				collection: name.to_string(),
				index: index.display_name(),
			});
		}
	}

	Ok(())
}

fn validate_fields(scope: &str, fields: &[Field], anonymous: bool) -> Result<()> {
	ensure_unique_names(scope, fields)?;

	for field in fields {
		validate_field_name(&field.name, anonymous)?;
		let path = if field.name.is_empty() {
			format!("{}.[]", scope)
		} else {
			format!("{}.{}", scope, field.name)
		};

		match field.field_type {
			FieldType::Array => {
				if field.children.len() > 1 {
					return Err(SchemaError::TooManyArrayChildren(field.name.clone()));
				}
				validate_fields(&path, &field.children, true)?;
			}
			FieldType::Object => validate_fields(&path, &field.children, false)?,
			FieldType::GeoJsonGeometryCollection => {
				if let Some(bad) = field
					.children
					.iter()
					.find(|child| !child.field_type.is_geo_json())
				{
					return Err(SchemaError::InvalidField {
						field: path,
						reason: format!("{} is not a GeoJSON geometry", bad.field_type),
					});
				}
			}
			_ => {
				if !field.children.is_empty() {
					return Err(SchemaError::InvalidField {
						field: path,
						reason: format!("{} fields cannot have children", field.field_type),
					});
				}
			}
		}
	}

	Ok(())
}

fn validate_field_name(name: &str, anonymous: bool) -> Result<()> {
	let reason = if name.is_empty() {
		(!anonymous).then_some("field name cannot be empty")
	} else if name.chars().count() > MAX_NAME_LENGTH {
		Some("field name is longer than 128 characters")
	} else if name.contains('.') {
		Some("field name cannot contain '.'")
	} else if name.starts_with('$') {
		Some("field name cannot start with '$'")
	} else {
		None
	};

	match reason {
		Some(reason) => Err(SchemaError::InvalidFieldName {
			name: name.to_string(),
			reason: reason.to_string(),
		}),
		None => Ok(()),
	}
}

/// Every dotted path reachable in the field tree, with the kinds found there.
///
/// Array elements do not add a path component, matching how MongoDB
/// addresses multikey paths.
pub(crate) fn field_paths(fields: &[Field]) -> HashMap<String, Vec<FieldType>> {
	let mut paths = HashMap::new();
	collect_paths("", fields, false, &mut paths);
	paths
}

fn collect_paths(
	prefix: &str,
	fields: &[Field],
	elements: bool,
	paths: &mut HashMap<String, Vec<FieldType>>,
) {
	for field in fields {
		let path = if elements || field.name.is_empty() {
			prefix.to_string()
		} else if prefix.is_empty() {
			field.name.clone()
		} else {
			format!("{}.{}", prefix, field.name)
		};

		if !path.is_empty() {
			paths
				.entry(path.clone())
				.or_insert_with(Vec::new)
				.push(field.field_type);
		}

		match field.field_type {
			FieldType::Array => collect_paths(&path, &field.children, true, paths),
			FieldType::Object => collect_paths(&path, &field.children, false, paths),
			FieldType::LegacyCoordinateEmbeddedDoc => {
				let keys = field.coordinates.clone().unwrap_or_default();
				for key in [keys.x_key(), keys.y_key()] {
					paths
						.entry(format!("{}.{}", path, key))
						.or_insert_with(Vec::new)
						.push(FieldType::Double);
				}
			}
			_ => {}
		}
	}
}

fn validate_index(
	collection: &str,
	index: &Index,
	paths: &HashMap<String, Vec<FieldType>>,
) -> Result<()> {
	let invalid = |reason: String| {
		SchemaError::InvalidIndex(format!(
			"{} on collection '{}': {}",
			index.display_name(),
			collection,
			reason
		))
	};

	let direction_ok = |value: &IndexValue| matches!(value, IndexValue::Int(1) | IndexValue::Int(-1));
	match index.index_type {
		IndexType::SingleField => {
			if index.keys.len() != 1 || !direction_ok(&index.keys[0].value) {
				return Err(invalid(
					"a single field index needs one field with direction 1 or -1".to_string(),
				));
			}
		}
		IndexType::Compound => {
			if index.keys.is_empty() || !index.keys.iter().all(|key| direction_ok(&key.value)) {
				return Err(invalid(
					"every compound index field needs direction 1 or -1".to_string(),
				));
			}
		}
		IndexType::Text | IndexType::Geo2dsphere | IndexType::Hashed => {
			if index.keys.len() != 1 {
				return Err(invalid(format!(
					"a {} index takes exactly one field",
					index.index_type
				)));
			}
		}
		IndexType::Raw => {
			if index.keys.is_empty() {
				return Err(invalid("a raw index needs at least one key".to_string()));
			}
		}
	}

	for key in &index.keys {
		if key.field.contains("$**") {
			continue;
		}
		if !paths.contains_key(&key.field) {
			return Err(SchemaError::MissingIndexField {
				collection: collection.to_string(),
				index: index.display_name(),
				field: key.field.clone(),
			});
		}
	}

	if index.index_type != IndexType::Raw
		&& let Some(rule) = index
			.rules
			.keys()
			.find(|rule| !INDEX_RULES.contains(&rule.as_str()))
	{
		return Err(invalid(format!("unknown rule '{}'", rule)));
	}

	if let Some(collation) = index.rules.get(RULE_COLLATION) {
		let Some(collation) = collation.as_object() else {
			return Err(invalid("collation must be a map".to_string()));
		};
		if let Some(key) = collation
			.keys()
			.find(|key| !COLLATION_KEYS.contains(&key.as_str()))
		{
			return Err(invalid(format!("unknown collation option '{}'", key)));
		}
	}

	if let Some(filter) = index.rules.get(RULE_PARTIAL_FILTER) {
		let Some(filter) = filter.as_object() else {
			return Err(invalid("partial filter expression must be a map".to_string()));
		};
		validate_filter_paths(collection, index, filter, paths)?;
	}

	if index.ttl().is_some() {
		let references_timestamp = index.keys.iter().any(|key| {
			paths
				.get(&key.field)
				.is_some_and(|kinds| kinds.contains(&FieldType::Timestamp))
		});
		if !references_timestamp {
			return Err(SchemaError::TtlWithoutTimestamp {
				collection: collection.to_string(),
				index: index.display_name(),
			});
		}
	}

	Ok(())
}

fn validate_filter_paths(
	collection: &str,
	index: &Index,
	filter: &Map<String, Value>,
	paths: &HashMap<String, Vec<FieldType>>,
) -> Result<()> {
	for (key, value) in filter {
		if key.starts_with('$') {
			let nested: Vec<&Map<String, Value>> = match value {
				Value::Array(items) => items.iter().filter_map(Value::as_object).collect(),
				Value::Object(map) => vec![map],
				_ => Vec::new(),
			};
			for map in nested {
				validate_filter_paths(collection, index, map, paths)?;
			}
		} else if !paths.contains_key(key) {
			return Err(SchemaError::MissingIndexField {
				collection: collection.to_string(),
				index: index.display_name(),
				field: key.clone(),
			});
		}
	}
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::schema::Metadata;
	use rstest::rstest;
	use serde_json::json;

	fn users() -> Collection {
		Collection::new(Metadata::new("users"))
			.field(Field::string("name"))
			.field(Field::int32("age"))
			.field(Field::timestamp("created_at"))
			.field(
				Field::object(
					"profile",
					[
						Field::string("bio"),
						Field::array("tags", Field::string("")),
					],
				)
				.unwrap(),
			)
			.field(Field::array(
				"orders",
				Field::object("", [Field::double("total")]).unwrap(),
			))
	}

	#[rstest]
	fn test_valid_schema_passes() {
		// Arrange
		let collection = users()
			.index(Index::compound([("name", -1), ("age", 1)]).unwrap())
			.index(Index::single_field("profile.tags", 1))
			.index(Index::single_field("orders.total", -1))
			.index(Index::single_field("created_at", 1).set_ttl(3600).unwrap())
			.index(
				Index::single_field("profile.bio", 1)
					.set_partial_expression(json!({"$or": [{"age": {"$gt": 18}}, {"name": {"$exists": true}}]}))
					.unwrap(),
			);

		// Act & Assert
		validate(&[collection]).unwrap();
	}

	#[rstest]
	fn test_duplicate_collection() {
		let result = validate(&[users(), users()]);
		assert_eq!(
			result.unwrap_err(),
			SchemaError::DuplicateCollection("users".to_string())
		);
	}

	#[rstest]
	fn test_reserved_collection() {
		let result = validate(&[Collection::new(Metadata::new(HISTORY_COLLECTION))]);
		assert!(matches!(result, Err(SchemaError::ReservedCollection(_))));
	}

	#[rstest]
	#[case(FieldType::Int32, true)]
	#[case(FieldType::Int64, true)]
	#[case(FieldType::Double, true)]
	#[case(FieldType::String, true)]
	#[case(FieldType::Boolean, false)]
	#[case(FieldType::Timestamp, false)]
	fn test_id_type(#[case] kind: FieldType, #[case] allowed: bool) {
		// Arrange
		let mut id = Field::string("_id");
		id.field_type = kind;
		let collection = Collection::new(Metadata::new("things")).field(id);

		// Act
		let result = validate(&[collection]);

		// Assert
		assert_eq!(result.is_ok(), allowed);
	}

	#[rstest]
	fn test_duplicate_nested_field_from_deserialized_input() {
		// Arrange
		let mut info = Field::object("info", [Field::string("a")]).unwrap();
		info.children.push(Field::int32("a"));
		let collection = Collection::new(Metadata::new("u")).field(info);

		// Act
		let result = validate(&[collection]);

		// Assert
		assert!(matches!(result, Err(SchemaError::DuplicateField { .. })));
	}

	#[rstest]
	#[case::missing("nickname")]
	#[case::nested_missing("profile.avatar")]
	fn test_index_on_unknown_field(#[case] path: &str) {
		let collection = users().index(Index::single_field(path, 1));
		assert!(matches!(
			validate(&[collection]),
			Err(SchemaError::MissingIndexField { .. })
		));
	}

	#[rstest]
	fn test_partial_filter_on_unknown_field() {
		let collection = users().index(
			Index::single_field("name", 1)
				.set_partial_expression(json!({"$and": [{"ghost": {"$exists": true}}]}))
				.unwrap(),
		);
		assert!(matches!(
			validate(&[collection]),
			Err(SchemaError::MissingIndexField { ref field, .. }) if field == "ghost"
		));
	}

	#[rstest]
	fn test_duplicate_index() {
		let collection = users()
			.index(Index::single_field("name", 1))
			.index(Index::single_field("name", 1));
		assert!(matches!(
			validate(&[collection]),
			Err(SchemaError::DuplicateIndex { .. })
		));
	}

	#[rstest]
	fn test_ttl_requires_timestamp() {
		let collection = users().index(Index::single_field("age", 1).set_ttl(60).unwrap());
		assert!(matches!(
			validate(&[collection]),
			Err(SchemaError::TtlWithoutTimestamp { .. })
		));
	}

	#[rstest]
	fn test_unknown_collation_option() {
		let collection = users().index(
			Index::single_field("name", 1)
				.set_collation(json!({"locale": "fr", "shouting": true}))
				.unwrap(),
		);
		assert!(matches!(validate(&[collection]), Err(SchemaError::InvalidIndex(_))));
	}

	#[rstest]
	#[case::empty("", false)]
	#[case::dotted("a.b", false)]
	#[case::dollar("$set", false)]
	#[case::long(&"x".repeat(129), false)]
	#[case::max(&"x".repeat(128), true)]
	fn test_field_names(#[case] name: &str, #[case] ok: bool) {
		let collection = Collection::new(Metadata::new("c")).field(Field::string(name));
		assert_eq!(validate(&[collection]).is_ok(), ok);
	}

	#[rstest]
	fn test_anonymous_array_element_allowed() {
		let collection =
			Collection::new(Metadata::new("c")).field(Field::array("xs", Field::int64("")));
		validate(&[collection]).unwrap();
	}

	#[rstest]
	fn test_index_direction_checked() {
		let collection = users().index(Index::single_field("name", 2));
		assert!(matches!(validate(&[collection]), Err(SchemaError::InvalidIndex(_))));
	}

	#[rstest]
	fn test_view_cannot_declare_fields() {
		let view = Collection::new(Metadata::view("adults", "users", vec![]))
			.field(Field::string("name"));
		assert!(matches!(
			validate(&[view]),
			Err(SchemaError::InvalidMetadata { .. })
		));
	}
}
