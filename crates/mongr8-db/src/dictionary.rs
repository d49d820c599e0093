//! # Dictionary
//!
//! Translates the typed schema into what the driver consumes: prototype
//! documents for fields, `(keys, options)` pairs for indexes, and
//! `$jsonSchema` validators.

pub mod index;
pub mod payload;
pub mod validator;

pub use index::{index_keys, index_model, index_options, index_rules};
pub use payload::{exemplar, geo_json_type, payload, prototype};
pub use validator::json_schema;

use bson::{Bson, Document};
use serde_json::Value;

/// Convert a JSON value to BSON.
///
/// Integers that fit in 32 bits become `Int32`, other integers `Int64`.
pub fn json_to_bson(value: &Value) -> Bson {
	match value {
		Value::Null => Bson::Null,
		Value::Bool(flag) => Bson::Boolean(*flag),
		Value::Number(number) => {
			if let Some(int) = number.as_i64() {
				match i32::try_from(int) {
					Ok(small) => Bson::Int32(small),
					Err(_) => Bson::Int64(int),
				}
			} else {
				Bson::Double(number.as_f64().unwrap_or_default())
			}
		}
		Value::String(text) => Bson::String(text.clone()),
		Value::Array(items) => Bson::Array(items.iter().map(json_to_bson).collect()),
		Value::Object(map) => Bson::Document(json_map_to_document(map)),
	}
}

pub fn json_map_to_document(map: &serde_json::Map<String, Value>) -> Document {
	map.iter()
		.map(|(key, value)| (key.clone(), json_to_bson(value)))
		.collect()
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;
	use serde_json::json;

	#[rstest]
	#[case(json!(7), Bson::Int32(7))]
	#[case(json!(5_000_000_000i64), Bson::Int64(5_000_000_000))]
	#[case(json!(1.5), Bson::Double(1.5))]
	#[case(json!("en"), Bson::String("en".to_string()))]
	#[case(json!(null), Bson::Null)]
	fn test_json_to_bson_scalars(#[case] input: Value, #[case] expected: Bson) {
		assert_eq!(json_to_bson(&input), expected);
	}

	#[rstest]
	fn test_json_to_bson_nested() {
		// Arrange
		let input = json!({"age": {"$gt": 18}, "tags": ["a"]});

		// Act
		let converted = json_to_bson(&input);

		// Assert
		let document = converted.as_document().unwrap();
		assert_eq!(
			document.get_document("age").unwrap().get_i32("$gt").unwrap(),
			18
		);
		assert_eq!(document.get_array("tags").unwrap().len(), 1);
	}
}
