//! Field declarations
//!
//! A [`Field`] is a tagged node: its [`FieldType`] decides whether the
//! `children` list is meaningful. `Array` nodes hold at most one anonymous
//! exemplar child, `Object` nodes hold named children, and
//! `GeoJSONGeometryCollection` nodes hold the geometries they carry.

use super::{Result, SchemaError};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// Enumerated field kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum FieldType {
	String,
	Int32,
	Int64,
	Double,
	Boolean,
	Array,
	Object,
	Timestamp,
	#[serde(rename = "GeoJSONPoint")]
	GeoJsonPoint,
	#[serde(rename = "GeoJSONLineString")]
	GeoJsonLineString,
	#[serde(rename = "GeoJSONPolygonSingleRing")]
	GeoJsonPolygonSingleRing,
	#[serde(rename = "GeoJSONPolygonMultipleRing")]
	GeoJsonPolygonMultipleRing,
	#[serde(rename = "GeoJSONMultiPoint")]
	GeoJsonMultiPoint,
	#[serde(rename = "GeoJSONMultiLineString")]
	GeoJsonMultiLineString,
	#[serde(rename = "GeoJSONMultiPolygon")]
	GeoJsonMultiPolygon,
	#[serde(rename = "GeoJSONGeometryCollection")]
	GeoJsonGeometryCollection,
	LegacyCoordinateArray,
	LegacyCoordinateEmbeddedDoc,
}

impl FieldType {
	pub const ALL: [FieldType; 18] = [
		FieldType::String,
		FieldType::Int32,
		FieldType::Int64,
		FieldType::Double,
		FieldType::Boolean,
		FieldType::Array,
		FieldType::Object,
		FieldType::Timestamp,
		FieldType::GeoJsonPoint,
		FieldType::GeoJsonLineString,
		FieldType::GeoJsonPolygonSingleRing,
		FieldType::GeoJsonPolygonMultipleRing,
		FieldType::GeoJsonMultiPoint,
		FieldType::GeoJsonMultiLineString,
		FieldType::GeoJsonMultiPolygon,
		FieldType::GeoJsonGeometryCollection,
		FieldType::LegacyCoordinateArray,
		FieldType::LegacyCoordinateEmbeddedDoc,
	];

	/// `Int32`, `Int64` and `Double`
	pub fn is_numeric(self) -> bool {
		matches!(self, FieldType::Int32 | FieldType::Int64 | FieldType::Double)
	}

	/// Kinds whose children are diffed recursively
	pub fn is_composite(self) -> bool {
		matches!(self, FieldType::Array | FieldType::Object)
	}

	/// Kinds that hold a single BSON value
	pub fn is_scalar(self) -> bool {
		matches!(
			self,
			FieldType::String
				| FieldType::Int32
				| FieldType::Int64
				| FieldType::Double
				| FieldType::Boolean
				| FieldType::Timestamp
		)
	}

	/// GeoJSON geometries, excluding the geometry collection
	pub fn is_geo_json(self) -> bool {
		matches!(
			self,
			FieldType::GeoJsonPoint
				| FieldType::GeoJsonLineString
				| FieldType::GeoJsonPolygonSingleRing
				| FieldType::GeoJsonPolygonMultipleRing
				| FieldType::GeoJsonMultiPoint
				| FieldType::GeoJsonMultiLineString
				| FieldType::GeoJsonMultiPolygon
		)
	}

	/// The `$type` alias MongoDB uses for values of this kind
	pub fn bson_alias(self) -> &'static str {
		match self {
			FieldType::String => "string",
			FieldType::Int32 => "int",
			FieldType::Int64 => "long",
			FieldType::Double => "double",
			FieldType::Boolean => "bool",
			FieldType::Timestamp => "date",
			FieldType::Array | FieldType::LegacyCoordinateArray => "array",
			_ => "object",
		}
	}
}

impl fmt::Display for FieldType {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let name = match self {
			FieldType::String => "String",
			FieldType::Int32 => "Int32",
			FieldType::Int64 => "Int64",
			FieldType::Double => "Double",
			FieldType::Boolean => "Boolean",
			FieldType::Array => "Array",
			FieldType::Object => "Object",
			FieldType::Timestamp => "Timestamp",
			FieldType::GeoJsonPoint => "GeoJSONPoint",
			FieldType::GeoJsonLineString => "GeoJSONLineString",
			FieldType::GeoJsonPolygonSingleRing => "GeoJSONPolygonSingleRing",
			FieldType::GeoJsonPolygonMultipleRing => "GeoJSONPolygonMultipleRing",
			FieldType::GeoJsonMultiPoint => "GeoJSONMultiPoint",
			FieldType::GeoJsonMultiLineString => "GeoJSONMultiLineString",
			FieldType::GeoJsonMultiPolygon => "GeoJSONMultiPolygon",
			FieldType::GeoJsonGeometryCollection => "GeoJSONGeometryCollection",
			FieldType::LegacyCoordinateArray => "LegacyCoordinateArray",
			FieldType::LegacyCoordinateEmbeddedDoc => "LegacyCoordinateEmbeddedDoc",
		};
		f.write_str(name)
	}
}

/// Key names of a legacy `{x, y}` coordinate document
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CoordinateKeys {
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub x: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub y: Option<String>,
}

impl CoordinateKeys {
	pub fn x_key(&self) -> &str {
		self.x.as_deref().unwrap_or("x")
	}

	pub fn y_key(&self) -> &str {
		self.y.as_deref().unwrap_or("y")
	}
}

fn is_false(value: &bool) -> bool {
	!*value
}

/// A declared field
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Field {
	pub name: String,
	#[serde(rename = "type")]
	pub field_type: FieldType,
	#[serde(default, skip_serializing_if = "is_false")]
	pub nullable: bool,
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub children: Vec<Field>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub coordinates: Option<CoordinateKeys>,
}

macro_rules! leaf_constructors {
	($($(#[$doc:meta])* $fn_name:ident => $kind:ident),* $(,)?) => {
		$(
			$(#[$doc])*
			pub fn $fn_name(name: impl Into<String>) -> Self {
				Self::leaf(name, FieldType::$kind)
			}
		)*
	};
}

impl Field {
	fn leaf(name: impl Into<String>, field_type: FieldType) -> Self {
		Self {
			name: name.into(),
			field_type,
			nullable: false,
			children: Vec::new(),
			coordinates: None,
		}
	}

	leaf_constructors! {
		string => String,
		int32 => Int32,
		int64 => Int64,
		double => Double,
		boolean => Boolean,
		/// A date field; its prototype is the current time.
		timestamp => Timestamp,
		geo_point => GeoJsonPoint,
		geo_line_string => GeoJsonLineString,
		geo_polygon_single_ring => GeoJsonPolygonSingleRing,
		geo_polygon_multiple_ring => GeoJsonPolygonMultipleRing,
		geo_multi_point => GeoJsonMultiPoint,
		geo_multi_line_string => GeoJsonMultiLineString,
		geo_multi_polygon => GeoJsonMultiPolygon,
		/// A `[x, y]` pair.
		legacy_coordinate_array => LegacyCoordinateArray,
	}

	/// A legacy `{x, y}` coordinate document
	///
	/// Key names default to `x` and `y`; see [`Field::set_coordinate_x`].
	pub fn legacy_coordinate_embedded_doc(name: impl Into<String>) -> Self {
		let mut field = Self::leaf(name, FieldType::LegacyCoordinateEmbeddedDoc);
		field.coordinates = Some(CoordinateKeys::default());
		field
	}

	/// An array whose elements all look like `child`.
	///
	/// The child is an anonymous element; pass an empty name.
	///
	/// # Example
	///
	/// ```rust
	/// use mongr8_db::schema::Field;
	///
	/// let tags = Field::array("tags", Field::string(""));
	/// assert_eq!(tags.children.len(), 1);
	/// ```
	pub fn array(name: impl Into<String>, child: Field) -> Self {
		let mut field = Self::leaf(name, FieldType::Array);
		field.children.push(child);
		field
	}

	/// An array built from zero or one element types.
	///
	/// Fails with [`SchemaError::TooManyArrayChildren`] for more than one;
	/// heterogeneous arrays are not supported.
	pub fn array_of(name: impl Into<String>, children: impl IntoIterator<Item = Field>) -> Result<Self> {
		let mut field = Self::leaf(name, FieldType::Array);
		field.children = children.into_iter().collect();
		if field.children.len() > 1 {
			return Err(SchemaError::TooManyArrayChildren(field.name));
		}
		Ok(field)
	}

	/// An embedded document.
	///
	/// Fails with [`SchemaError::DuplicateField`] when two children share a name.
	pub fn object(name: impl Into<String>, children: impl IntoIterator<Item = Field>) -> Result<Self> {
		let mut field = Self::leaf(name, FieldType::Object);
		field.children = children.into_iter().collect();
		ensure_unique_names(&field.name, &field.children)?;
		Ok(field)
	}

	/// A GeoJSON `GeometryCollection` carrying the given geometries.
	pub fn geometry_collection(
		name: impl Into<String>,
		geometries: impl IntoIterator<Item = Field>,
	) -> Result<Self> {
		let mut field = Self::leaf(name, FieldType::GeoJsonGeometryCollection);
		field.children = geometries.into_iter().collect();
		if let Some(bad) = field
			.children
			.iter()
			.find(|child| !child.field_type.is_geo_json())
		{
			return Err(SchemaError::InvalidField {
				field: field.name.clone(),
				reason: format!("{} is not a GeoJSON geometry", bad.field_type),
			});
		}
		Ok(field)
	}

	/// Mark the field as accepting `null`.
	pub fn nullable(mut self) -> Self {
		self.nullable = true;
		self
	}

	/// Rename the `x` key of a legacy coordinate document. Callable once.
	pub fn set_coordinate_x(self, key: impl Into<String>) -> Result<Self> {
		self.set_coordinate(key.into(), true)
	}

	/// Rename the `y` key of a legacy coordinate document. Callable once.
	pub fn set_coordinate_y(self, key: impl Into<String>) -> Result<Self> {
		self.set_coordinate(key.into(), false)
	}

	fn set_coordinate(mut self, key: String, is_x: bool) -> Result<Self> {
		let axis = if is_x { "x" } else { "y" };
		let Some(coordinates) = self.coordinates.as_mut() else {
			return Err(SchemaError::InvalidField {
				field: self.name.clone(),
				reason: format!(
					"coordinate {} can only be set on a LegacyCoordinateEmbeddedDoc",
					axis
				),
			});
		};

		let slot = if is_x {
			&mut coordinates.x
		} else {
			&mut coordinates.y
		};
		if slot.is_some() {
			return Err(SchemaError::InvalidField {
				field: self.name.clone(),
				reason: format!("coordinate {} key already set", axis),
			});
		}
		*slot = Some(key);
		Ok(self)
	}

	/// Look up a direct child by name
	pub fn child(&self, name: &str) -> Option<&Field> {
		self.children.iter().find(|child| child.name == name)
	}

	/// Follow the single-child chain `depth` levels down.
	///
	/// Sub-action payloads describe one path into the tree: every composite
	/// above the changed node carries exactly one child.
	pub fn at_depth(&self, depth: usize) -> Option<&Field> {
		let mut node = self;
		for _ in 0..depth {
			node = node.children.first()?;
		}
		Some(node)
	}
}

pub(crate) fn ensure_unique_names(scope: &str, fields: &[Field]) -> Result<()> {
	let mut seen = HashSet::new();
	for field in fields {
		if !seen.insert(field.name.as_str()) {
			return Err(SchemaError::DuplicateField {
				scope: scope.to_string(),
				field: field.name.clone(),
			});
		}
	}
	Ok(())
}
