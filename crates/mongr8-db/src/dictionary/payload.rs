//! Prototype documents for fields
//!
//! Every field kind maps to a sample value whose shape matches what a real
//! document would hold. `CreateCollection` inserts one exemplar built from
//! these, and `CreateField` writes them into existing documents.

use crate::schema::{Field, FieldType};
use bson::{Bson, DateTime, Document, doc};

/// `{name: prototype}` for one field
pub fn payload(field: &Field) -> Document {
	let mut document = Document::new();
	document.insert(field.name.clone(), prototype(field));
	document
}

/// One document holding the prototypes of all the given fields
pub fn exemplar(fields: &[Field]) -> Document {
	let mut document = Document::new();
	for field in fields {
		document.insert(field.name.clone(), prototype(field));
	}
	document
}

/// The sample value of a field
pub fn prototype(field: &Field) -> Bson {
	match field.field_type {
		FieldType::String => Bson::String(String::new()),
		FieldType::Int32 => Bson::Int32(0),
		FieldType::Int64 => Bson::Int64(0),
		FieldType::Double => Bson::Double(0.0),
		FieldType::Boolean => Bson::Boolean(false),
		FieldType::Timestamp => Bson::DateTime(DateTime::now()),
		FieldType::Array => Bson::Array(field.children.iter().map(prototype).collect()),
		FieldType::Object => Bson::Document(exemplar(&field.children)),
		FieldType::GeoJsonGeometryCollection => Bson::Document(doc! {
			"type": "GeometryCollection",
			"geometries": field.children.iter().map(prototype).collect::<Vec<_>>(),
		}),
		FieldType::LegacyCoordinateArray => Bson::Array(position(0.0, 0.0)),
		FieldType::LegacyCoordinateEmbeddedDoc => {
			let keys = field.coordinates.clone().unwrap_or_default();
			let mut document = Document::new();
			document.insert(keys.x_key(), 0.0);
			document.insert(keys.y_key(), 0.0);
			Bson::Document(document)
		}
		kind => Bson::Document(doc! {
			"type": geo_json_type(kind).unwrap_or("Point"),
			"coordinates": geo_coordinates(kind),
		}),
	}
}

/// The GeoJSON `type` string of a geometry kind
pub fn geo_json_type(kind: FieldType) -> Option<&'static str> {
	match kind {
		FieldType::GeoJsonPoint => Some("Point"),
		FieldType::GeoJsonLineString => Some("LineString"),
		FieldType::GeoJsonPolygonSingleRing | FieldType::GeoJsonPolygonMultipleRing => {
			Some("Polygon")
		}
		FieldType::GeoJsonMultiPoint => Some("MultiPoint"),
		FieldType::GeoJsonMultiLineString => Some("MultiLineString"),
		FieldType::GeoJsonMultiPolygon => Some("MultiPolygon"),
		FieldType::GeoJsonGeometryCollection => Some("GeometryCollection"),
		_ => None,
	}
}

fn position(x: f64, y: f64) -> Vec<Bson> {
	vec![Bson::Double(x), Bson::Double(y)]
}

fn line(points: &[(f64, f64)]) -> Bson {
	Bson::Array(
		points
			.iter()
			.map(|(x, y)| Bson::Array(position(*x, *y)))
			.collect(),
	)
}

// Rings are closed: the first and last positions are equal.
fn ring(x: f64, y: f64, side: f64) -> Bson {
	line(&[
		(x, y),
		(x + side, y),
		(x + side, y + side),
		(x, y + side),
		(x, y),
	])
}

fn geo_coordinates(kind: FieldType) -> Bson {
	match kind {
		FieldType::GeoJsonPoint => Bson::Array(position(0.0, 0.0)),
		FieldType::GeoJsonLineString => line(&[(0.0, 0.0), (1.0, 1.0)]),
		FieldType::GeoJsonPolygonSingleRing => Bson::Array(vec![ring(0.0, 0.0, 3.0)]),
		FieldType::GeoJsonPolygonMultipleRing => {
			Bson::Array(vec![ring(0.0, 0.0, 3.0), ring(1.0, 1.0, 1.0)])
		}
		FieldType::GeoJsonMultiPoint => line(&[(0.0, 0.0), (1.0, 1.0)]),
		FieldType::GeoJsonMultiLineString => Bson::Array(vec![
			line(&[(0.0, 0.0), (1.0, 1.0)]),
			line(&[(2.0, 2.0), (3.0, 3.0)]),
		]),
		FieldType::GeoJsonMultiPolygon => Bson::Array(vec![
			Bson::Array(vec![ring(0.0, 0.0, 1.0)]),
			Bson::Array(vec![ring(2.0, 2.0, 1.0)]),
		]),
		_ => Bson::Array(Vec::new()),
	}
}
