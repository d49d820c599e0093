//! Update documents and pipelines for field sub-actions
//!
//! A field sub-action names one path into the field tree. Object levels
//! become dotted keys; array levels become the all-positional `$[]` in
//! update paths and a `$map` in conversion pipelines.

use crate::dictionary::prototype;
use crate::schema::{Field, FieldType};
use crate::sync::{SyncOptions, can_convert};
use bson::{Bson, Document, doc};

/// Update path of the node at `depth`, e.g. `info.tags.$[]`
pub fn update_path(field: &Field, depth: usize) -> String {
	let mut path = field.name.clone();
	let mut node = field;
	for _ in 0..depth {
		let Some(child) = node.children.first() else {
			break;
		};
		if node.field_type == FieldType::Array {
			path.push_str(".$[]");
		} else {
			path.push('.');
			path.push_str(&child.name);
		}
		node = child;
	}
	path
}

/// Query path of the node at `depth`; array levels add no component.
pub fn query_path(field: &Field, depth: usize) -> String {
	let mut path = field.name.clone();
	let mut node = field;
	for _ in 0..depth {
		let Some(child) = node.children.first() else {
			break;
		};
		if node.field_type != FieldType::Array {
			path.push('.');
			path.push_str(&child.name);
		}
		node = child;
	}
	path
}

/// Filter restricting an update to documents where the outermost array on
/// the path exists. `$[]` fails on documents lacking it.
pub fn array_guard(field: &Field, depth: usize) -> Document {
	let mut node = field;
	for level in 0..depth {
		if node.field_type == FieldType::Array {
			let mut guard = Document::new();
			guard.insert(query_path(field, level), doc! { "$type": "array" });
			return guard;
		}
		let Some(child) = node.children.first() else {
			break;
		};
		node = child;
	}
	Document::new()
}

/// `$set` of the target node's prototype
pub fn set_update(field: &Field, depth: usize) -> Document {
	let target = field.at_depth(depth).unwrap_or(field);
	let mut set = Document::new();
	set.insert(update_path(field, depth), prototype(target));
	doc! { "$set": set }
}

pub fn unset_update(field: &Field, depth: usize) -> Document {
	let mut unset = Document::new();
	unset.insert(update_path(field, depth), "");
	doc! { "$unset": unset }
}

/// Filter matching documents where the target holds a value of `kind`
pub fn type_filter(field: &Field, depth: usize, kind: FieldType) -> Document {
	let mut filter = array_guard(field, depth);
	filter.insert(query_path(field, depth), doc! { "$type": kind.bson_alias() });
	filter
}

/// Filter for conversions: only documents holding the target
pub fn exists_filter(field: &Field, depth: usize) -> Document {
	let mut filter = Document::new();
	filter.insert(query_path(field, depth), doc! { "$exists": true });
	filter
}

/// Single-stage update pipeline converting the node at `depth` from `from`
/// to the type it has in `field`.
///
/// Sibling keys of every object on the path are preserved, and every array
/// level maps over its elements with its own alias (`alias_1`, `alias_2`...).
pub fn convert_pipeline(field: &Field, from: FieldType, depth: usize) -> Vec<Document> {
	let reference = format!("${}", field.name);
	let expression = convert_expression(field, &reference, from, depth, 0);
	let mut set = Document::new();
	set.insert(field.name.clone(), expression);
	vec![doc! { "$set": set }]
}

fn convert_expression(
	node: &Field,
	reference: &str,
	from: FieldType,
	remaining: usize,
	aliases: usize,
) -> Bson {
	let child = match node.children.first() {
		Some(child) if remaining > 0 => child,
		_ => return convert_leaf(reference, from, node.field_type),
	};

	if node.field_type == FieldType::Array {
		let alias = format!("alias_{}", aliases + 1);
		let inner = convert_expression(child, &format!("$${}", alias), from, remaining - 1, aliases + 1);
		return Bson::Document(doc! {
			"$map": {
				"input": reference,
				"as": alias,
				"in": inner,
			}
		});
	}

	let inner = convert_expression(
		child,
		&format!("{}.{}", reference, child.name),
		from,
		remaining - 1,
		aliases,
	);
	let mut replacement = Document::new();
	replacement.insert(child.name.clone(), inner);
	Bson::Document(doc! { "$mergeObjects": [reference, replacement] })
}

/// Conversion operator applied to `reference`.
///
/// Conversions outside the safe set (only reachable with forced conversion)
/// turn unconvertible values into `null` instead of failing the update.
fn convert_leaf(reference: &str, from: FieldType, to: FieldType) -> Bson {
	if !can_convert(from, to, &SyncOptions::default()) {
		return Bson::Document(doc! {
			"$convert": {
				"input": reference,
				"to": to.bson_alias(),
				"onError": Bson::Null,
				"onNull": Bson::Null,
			}
		});
	}

	let operator = match to {
		FieldType::String => "$toString",
		FieldType::Int32 => "$toInt",
		FieldType::Int64 => "$toLong",
		FieldType::Double => "$toDouble",
		FieldType::Boolean => "$toBool",
		FieldType::Timestamp => "$toDate",
		_ => "$toString",
	};
	let mut expression = Document::new();
	expression.insert(operator, reference);
	Bson::Document(expression)
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	#[rstest]
	fn test_paths_through_objects_and_arrays() {
		// Arrange
		let field = Field::object(
			"info",
			[Field::array(
				"tags",
				Field::object("", [Field::string("label")]).unwrap(),
			)],
		)
		.unwrap();

		// Act & Assert
		assert_eq!(update_path(&field, 3), "info.tags.$[].label");
		assert_eq!(query_path(&field, 3), "info.tags.label");
		assert_eq!(
			array_guard(&field, 3),
			doc! { "info.tags": { "$type": "array" } }
		);
		assert!(array_guard(&field, 1).is_empty());
	}

	#[rstest]
	fn test_set_nested_prototype() {
		let field = Field::object("info", [Field::int32("b")]).unwrap();
		assert_eq!(set_update(&field, 1), doc! { "$set": { "info.b": 0 } });
	}

	#[rstest]
	fn test_convert_top_level() {
		assert_eq!(
			convert_pipeline(&Field::double("age"), FieldType::Int64, 0),
			vec![doc! { "$set": { "age": { "$toDouble": "$age" } } }]
		);
	}

	#[rstest]
	fn test_convert_inside_array_of_objects() {
		// Arrange
		let field = Field::array(
			"items",
			Field::object("", [Field::string("price")]).unwrap(),
		);

		// Act
		let pipeline = convert_pipeline(&field, FieldType::Double, 2);

		// Assert
		assert_eq!(
			pipeline,
			vec![doc! {
				"$set": {
					"items": {
						"$map": {
							"input": "$items",
							"as": "alias_1",
							"in": {
								"$mergeObjects": [
									"$$alias_1",
									{ "price": { "$toString": "$$alias_1.price" } },
								]
							},
						}
					}
				}
			}]
		);
	}

	#[rstest]
	fn test_nested_arrays_get_distinct_aliases() {
		// Arrange
		let field = Field::array("grid", Field::array("", Field::int64("")));

		// Act
		let pipeline = convert_pipeline(&field, FieldType::Int32, 2);

		// Assert
		let set = pipeline[0].get_document("$set").unwrap();
		let outer = set.get_document("grid").unwrap().get_document("$map").unwrap();
		assert_eq!(outer.get_str("as").unwrap(), "alias_1");
		let inner = outer.get_document("in").unwrap().get_document("$map").unwrap();
		assert_eq!(inner.get_str("input").unwrap(), "$$alias_1");
		assert_eq!(inner.get_str("as").unwrap(), "alias_2");
		assert_eq!(
			inner.get_document("in").unwrap(),
			&doc! { "$toLong": "$$alias_2" }
		);
	}

	#[rstest]
	fn test_forced_conversion_nulls_failures() {
		let pipeline = convert_pipeline(&Field::int32("age"), FieldType::Timestamp, 0);
		assert_eq!(
			pipeline,
			vec![doc! {
				"$set": {
					"age": {
						"$convert": {
							"input": "$age",
							"to": "int",
							"onError": null,
							"onNull": null,
						}
					}
				}
			}]
		);
	}
}
