//! `$jsonSchema` validators derived from field trees

use super::payload::geo_json_type;
use crate::schema::{Field, FieldType};
use bson::{Bson, Document, doc};

/// Build a `{$jsonSchema: ...}` validator for a collection's fields.
///
/// Top-level fields other than `_id` are required unless nullable. Nullable
/// fields also accept `null`.
pub fn json_schema(fields: &[Field]) -> Document {
	let mut schema = object_schema(fields);
	let required: Vec<Bson> = fields
		.iter()
		.filter(|field| !field.nullable && field.name != "_id")
		.map(|field| Bson::String(field.name.clone()))
		.collect();
	if !required.is_empty() {
		schema.insert("required", required);
	}
	doc! { "$jsonSchema": schema }
}

fn object_schema(fields: &[Field]) -> Document {
	let mut properties = Document::new();
	for field in fields {
		properties.insert(field.name.clone(), field_schema(field));
	}
	doc! {
		"bsonType": "object",
		"properties": properties,
	}
}

fn field_schema(field: &Field) -> Document {
	let mut schema = match field.field_type {
		FieldType::Array => {
			let mut schema = doc! { "bsonType": "array" };
			if let Some(child) = field.children.first() {
				schema.insert("items", field_schema(child));
			}
			schema
		}
		FieldType::Object => object_schema(&field.children),
		FieldType::LegacyCoordinateArray => doc! {
			"bsonType": "array",
			"minItems": 2,
			"maxItems": 2,
		},
		FieldType::LegacyCoordinateEmbeddedDoc => {
			let keys = field.coordinates.clone().unwrap_or_default();
			let number = doc! { "bsonType": ["double", "int", "long"] };
			let mut properties = Document::new();
			properties.insert(keys.x_key(), number.clone());
			properties.insert(keys.y_key(), number);
			doc! { "bsonType": "object", "properties": properties }
		}
		FieldType::GeoJsonGeometryCollection => doc! {
			"bsonType": "object",
			"required": ["type", "geometries"],
			"properties": {
				"type": { "enum": ["GeometryCollection"] },
				"geometries": { "bsonType": "array" },
			},
		},
		kind if kind.is_geo_json() => doc! {
			"bsonType": "object",
			"required": ["type", "coordinates"],
			"properties": {
				"type": { "enum": [geo_json_type(kind).unwrap_or("Point")] },
				"coordinates": { "bsonType": "array" },
			},
		},
		kind => doc! { "bsonType": kind.bson_alias() },
	};

	if field.nullable
		&& let Some(Bson::String(bson_type)) = schema.get("bsonType").cloned()
	{
		schema.insert("bsonType", vec![bson_type, "null".to_string()]);
	}
	schema
}
