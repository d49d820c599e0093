//! Index declarations
//!
//! An index is its type, an ordered list of `(field, direction)` pairs and a
//! rule map. Rules are kept in a `BTreeMap` and nested maps are rendered
//! canonically, so the derived strings do not depend on insertion order.

use super::{Result, SchemaError};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;

pub const RULE_SPARSE: &str = "sparse";
pub const RULE_BACKGROUND: &str = "background";
pub const RULE_UNIQUE: &str = "unique";
pub const RULE_HIDDEN: &str = "hidden";
pub const RULE_PARTIAL_FILTER: &str = "partialFilterExpression";
pub const RULE_EXPIRE_AFTER_SECONDS: &str = "expireAfterSeconds";
pub const RULE_COLLATION: &str = "collation";

/// Rule names accepted on an index
pub const INDEX_RULES: [&str; 7] = [
	RULE_SPARSE,
	RULE_BACKGROUND,
	RULE_UNIQUE,
	RULE_HIDDEN,
	RULE_PARTIAL_FILTER,
	RULE_EXPIRE_AFTER_SECONDS,
	RULE_COLLATION,
];

/// Keys accepted inside a `collation` rule
pub const COLLATION_KEYS: [&str; 8] = [
	"locale",
	"caseLevel",
	"caseFirst",
	"strength",
	"numericOrdering",
	"alternate",
	"maxVariable",
	"backwards",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IndexType {
	SingleField,
	Compound,
	Text,
	Geo2dsphere,
	Hashed,
	Raw,
}

impl fmt::Display for IndexType {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		fmt::Debug::fmt(self, f)
	}
}

/// Direction of an index key: `1`, `-1`, or a named kind such as `"text"`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum IndexValue {
	Int(i32),
	Str(String),
}

impl From<i32> for IndexValue {
	fn from(value: i32) -> Self {
		IndexValue::Int(value)
	}
}

impl From<&str> for IndexValue {
	fn from(value: &str) -> Self {
		IndexValue::Str(value.to_string())
	}
}

impl From<String> for IndexValue {
	fn from(value: String) -> Self {
		IndexValue::Str(value)
	}
}

impl fmt::Display for IndexValue {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			IndexValue::Int(value) => write!(f, "{}", value),
			IndexValue::Str(value) => f.write_str(value),
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IndexKey {
	pub field: String,
	pub value: IndexValue,
}

impl IndexKey {
	pub fn new(field: impl Into<String>, value: impl Into<IndexValue>) -> Self {
		Self {
			field: field.into(),
			value: value.into(),
		}
	}
}

/// A declared index
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Index {
	#[serde(rename = "type")]
	pub index_type: IndexType,
	pub keys: Vec<IndexKey>,
	#[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
	pub rules: BTreeMap<String, Value>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub custom_name: Option<String>,
}

impl Index {
	fn with_keys(index_type: IndexType, keys: Vec<IndexKey>) -> Self {
		Self {
			index_type,
			keys,
			rules: BTreeMap::new(),
			custom_name: None,
		}
	}

	/// An ascending (`1`) or descending (`-1`) index on one field.
	pub fn single_field(field: impl Into<String>, direction: i32) -> Self {
		Self::with_keys(IndexType::SingleField, vec![IndexKey::new(field, direction)])
	}

	/// An index over several fields, in the given order.
	///
	/// # Example
	///
	/// ```rust
	/// use mongr8_db::schema::Index;
	///
	/// let index = Index::compound([("name", -1), ("age", 1)]).unwrap();
	/// assert_eq!(index.display_name(), "name_-1_age_1");
	/// ```
	pub fn compound<K: Into<String>>(keys: impl IntoIterator<Item = (K, i32)>) -> Result<Self> {
		let keys: Vec<_> = keys
			.into_iter()
			.map(|(field, direction)| IndexKey::new(field, direction))
			.collect();
		if keys.is_empty() {
			return Err(SchemaError::InvalidIndex(
				"a compound index needs at least one field".to_string(),
			));
		}
		Ok(Self::with_keys(IndexType::Compound, keys))
	}

	pub fn text(field: impl Into<String>) -> Self {
		Self::with_keys(IndexType::Text, vec![IndexKey::new(field, "text")])
	}

	pub fn geo_2dsphere(field: impl Into<String>) -> Self {
		Self::with_keys(IndexType::Geo2dsphere, vec![IndexKey::new(field, "2dsphere")])
	}

	pub fn hashed(field: impl Into<String>) -> Self {
		Self::with_keys(IndexType::Hashed, vec![IndexKey::new(field, "hashed")])
	}

	/// An index given verbatim as key and rule maps.
	///
	/// Rules of a raw index are fixed at construction; the rule setters
	/// reject it.
	pub fn raw<K, V>(keys: impl IntoIterator<Item = (K, V)>, rules: Map<String, Value>) -> Result<Self>
	where
		K: Into<String>,
		V: Into<IndexValue>,
	{
		let keys: Vec<_> = keys
			.into_iter()
			.map(|(field, value)| IndexKey::new(field, value))
			.collect();
		if keys.is_empty() {
			return Err(SchemaError::InvalidIndex(
				"a raw index needs at least one key".to_string(),
			));
		}
		let mut index = Self::with_keys(IndexType::Raw, keys);
		index.rules = rules.into_iter().collect();
		Ok(index)
	}

	fn set_rule(mut self, rule: &str, value: Value) -> Result<Self> {
		if self.index_type == IndexType::Raw {
			return Err(SchemaError::RawIndexRule);
		}
		self.rules.insert(rule.to_string(), value);
		Ok(self)
	}

	pub fn as_sparse(self) -> Result<Self> {
		self.set_rule(RULE_SPARSE, Value::Bool(true))
	}

	pub fn as_unique(self) -> Result<Self> {
		self.set_rule(RULE_UNIQUE, Value::Bool(true))
	}

	pub fn as_hidden(self) -> Result<Self> {
		self.set_rule(RULE_HIDDEN, Value::Bool(true))
	}

	pub fn as_background(self) -> Result<Self> {
		self.set_rule(RULE_BACKGROUND, Value::Bool(true))
	}

	/// Expire documents `seconds` after the indexed timestamp.
	pub fn set_ttl(self, seconds: i64) -> Result<Self> {
		if seconds < 0 {
			return Err(SchemaError::InvalidIndex(format!(
				"TTL must not be negative, got {}",
				seconds
			)));
		}
		self.set_rule(RULE_EXPIRE_AFTER_SECONDS, Value::from(seconds))
	}

	pub fn set_partial_expression(self, expression: Value) -> Result<Self> {
		if !expression.is_object() {
			return Err(SchemaError::InvalidIndex(
				"partial filter expression must be a map".to_string(),
			));
		}
		self.set_rule(RULE_PARTIAL_FILTER, expression)
	}

	pub fn set_collation(self, collation: Value) -> Result<Self> {
		if !collation.is_object() {
			return Err(SchemaError::InvalidIndex(
				"collation must be a map".to_string(),
			));
		}
		self.set_rule(RULE_COLLATION, collation)
	}

	pub fn set_custom_index_name(mut self, name: impl Into<String>) -> Result<Self> {
		if self.index_type == IndexType::Raw {
			return Err(SchemaError::RawIndexRule);
		}
		self.custom_name = Some(name.into());
		Ok(self)
	}

	/// Structural key: type, ordered fields and canonical rules.
	///
	/// Two indexes are the same index exactly when their keys are equal.
	pub fn key(&self) -> String {
		let fields = self
			.keys
			.iter()
			.map(|key| format!("{}:{}", key.field, key.value))
			.collect::<Vec<_>>()
			.join(",");
		let rules = self
			.rules
			.iter()
			.map(|(rule, value)| format!("{}={}", rule, canonical_json(value)))
			.collect::<Vec<_>>()
			.join(",");
		format!("{}({})[{}]", self.index_type, fields, rules)
	}

	/// Name derived from the key pairs and the rule paths
	pub fn display_name(&self) -> String {
		let mut parts: Vec<String> = self
			.keys
			.iter()
			.map(|key| format!("{}_{}", key.field, key.value))
			.collect();

		for (rule, value) in &self.rules {
			match value {
				Value::Bool(true) => parts.push(rule.clone()),
				Value::Object(map) => {
					let mut paths = Vec::new();
					flatten_paths(rule, map, &mut paths);
					parts.extend(paths);
				}
				other => parts.push(format!("{}_{}", rule, canonical_json(other))),
			}
		}

		parts.join("_")
	}

	/// The on-disk index name
	pub fn name(&self) -> String {
		self.custom_name
			.clone()
			.unwrap_or_else(|| self.display_name())
	}

	/// `expireAfterSeconds` if this is a TTL index
	pub fn ttl(&self) -> Option<i64> {
		self.rules
			.get(RULE_EXPIRE_AFTER_SECONDS)
			.and_then(Value::as_i64)
	}
}

fn flatten_paths(prefix: &str, map: &Map<String, Value>, out: &mut Vec<String>) {
	let mut keys: Vec<_> = map.keys().collect();
	keys.sort();
	for key in keys {
		let path = format!("{}.{}", prefix, key);
		match map.get(key) {
			Some(Value::Object(inner)) => flatten_paths(&path, inner, out),
			Some(Value::Array(items)) => {
				for (position, item) in items.iter().enumerate() {
					let item_path = format!("{}.{}", path, position);
					match item {
						Value::Object(inner) => flatten_paths(&item_path, inner, out),
						other => out.push(format!("{}_{}", item_path, canonical_json(other))),
					}
				}
			}
			Some(other) => out.push(format!("{}_{}", path, canonical_json(other))),
			None => {}
		}
	}
}

/// Render JSON with object keys sorted at every level.
pub(crate) fn canonical_json(value: &Value) -> String {
	match value {
		Value::Object(map) => {
			let mut entries: Vec<_> = map.iter().collect();
			entries.sort_by(|a, b| a.0.cmp(b.0));
			let body = entries
				.into_iter()
				.map(|(key, value)| format!("{}:{}", Value::String(key.clone()), canonical_json(value)))
				.collect::<Vec<_>>()
				.join(",");
			format!("{{{}}}", body)
		}
		Value::Array(items) => {
			let body = items
				.iter()
				.map(canonical_json)
				.collect::<Vec<_>>()
				.join(",");
			format!("[{}]", body)
		}
		other => other.to_string(),
	}
}
