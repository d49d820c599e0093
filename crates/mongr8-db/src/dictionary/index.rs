//! Index translation
//!
//! Produces the ordered key document and the option set the driver needs to
//! build an index.

use super::{json_map_to_document, json_to_bson};
use crate::schema::index::{
	RULE_BACKGROUND, RULE_COLLATION, RULE_EXPIRE_AFTER_SECONDS, RULE_HIDDEN, RULE_PARTIAL_FILTER,
	RULE_SPARSE, RULE_UNIQUE,
};
use crate::schema::{Index, IndexValue, Result, SchemaError};
use bson::{Bson, Document};
use mongodb::IndexModel;
use mongodb::options::{Collation, IndexOptions};
use std::time::Duration;

/// Ordered `{field: direction}` document
pub fn index_keys(index: &Index) -> Document {
	let mut keys = Document::new();
	for key in &index.keys {
		let value = match &key.value {
			IndexValue::Int(direction) => Bson::Int32(*direction),
			IndexValue::Str(kind) => Bson::String(kind.clone()),
		};
		keys.insert(key.field.clone(), value);
	}
	keys
}

/// The rule map as a BSON document
pub fn index_rules(index: &Index) -> Document {
	index
		.rules
		.iter()
		.map(|(rule, value)| (rule.clone(), json_to_bson(value)))
		.collect()
}

/// Driver options for an index, named after [`Index::name`].
pub fn index_options(index: &Index) -> Result<IndexOptions> {
	let mut options = IndexOptions::default();
	options.name = Some(index.name());

	let flag = |rule: &str| index.rules.get(rule).and_then(serde_json::Value::as_bool);
	options.sparse = flag(RULE_SPARSE);
	options.background = flag(RULE_BACKGROUND);
	options.unique = flag(RULE_UNIQUE);
	options.hidden = flag(RULE_HIDDEN);

	if let Some(seconds) = index
		.rules
		.get(RULE_EXPIRE_AFTER_SECONDS)
		.and_then(serde_json::Value::as_u64)
	{
		options.expire_after = Some(Duration::from_secs(seconds));
	}

	if let Some(filter) = index
		.rules
		.get(RULE_PARTIAL_FILTER)
		.and_then(serde_json::Value::as_object)
	{
		options.partial_filter_expression = Some(json_map_to_document(filter));
	}

	if let Some(collation) = index
		.rules
		.get(RULE_COLLATION)
		.and_then(serde_json::Value::as_object)
	{
		let collation: Collation = bson::deserialize_from_document(json_map_to_document(collation))
			.map_err(|e| {
				SchemaError::InvalidIndex(format!("invalid collation on {}: {}", index.name(), e))
			})?;
		options.collation = Some(collation);
	}

	Ok(options)
}

/// Keys and options combined into the driver's index model
pub fn index_model(index: &Index) -> Result<IndexModel> {
	Ok(IndexModel::builder()
		.keys(index_keys(index))
		.options(index_options(index)?)
		.build())
}
