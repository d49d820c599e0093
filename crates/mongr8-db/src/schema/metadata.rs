//! Collection metadata
//!
//! Metadata is fixed once a collection exists: any change to it is a
//! redesign the engine refuses to migrate.

use super::index::canonical_json;
use super::{Result, SchemaError};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CollectionKind {
	#[default]
	Default,
	View,
}

/// Options applied when the collection is created
///
/// `capped_size` doubles as the `capped` flag. Older migration files spell it
/// `size`; both are accepted when reading.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionOptions {
	#[serde(
		default,
		alias = "size",
		alias = "cappedSize",
		skip_serializing_if = "Option::is_none"
	)]
	pub capped_size: Option<u64>,
	#[serde(
		default,
		alias = "expiredAfterSeconds",
		skip_serializing_if = "Option::is_none"
	)]
	pub expire_after_seconds: Option<u64>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub view_on: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub pipeline: Option<Vec<Value>>,
}

impl CollectionOptions {
	pub fn is_capped(&self) -> bool {
		self.capped_size.is_some()
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
	pub name: String,
	#[serde(default)]
	pub kind: CollectionKind,
	#[serde(default)]
	pub options: CollectionOptions,
}

impl Metadata {
	/// Metadata for a regular collection
	pub fn new(name: impl Into<String>) -> Self {
		Self {
			name: name.into(),
			kind: CollectionKind::Default,
			options: CollectionOptions::default(),
		}
	}

	/// A read-only view over `view_on` defined by an aggregation pipeline
	pub fn view(name: impl Into<String>, view_on: impl Into<String>, pipeline: Vec<Value>) -> Self {
		Self {
			name: name.into(),
			kind: CollectionKind::View,
			options: CollectionOptions {
				view_on: Some(view_on.into()),
				pipeline: Some(pipeline),
				..CollectionOptions::default()
			},
		}
	}

	/// Cap the collection at `size_bytes`.
	///
	/// Fails if the collection already has a cap or a TTL.
	pub fn capped(mut self, size_bytes: u64) -> Result<Self> {
		self.ensure_unbounded("capped")?;
		if size_bytes == 0 {
			return Err(self.invalid("capped size must be positive"));
		}
		self.options.capped_size = Some(size_bytes);
		Ok(self)
	}

	/// Expire documents `seconds` after insertion.
	///
	/// Fails if the collection already has a cap or a TTL.
	pub fn ttl(mut self, seconds: u64) -> Result<Self> {
		self.ensure_unbounded("ttl")?;
		self.options.expire_after_seconds = Some(seconds);
		Ok(self)
	}

	fn ensure_unbounded(&self, option: &str) -> Result<()> {
		if self.kind == CollectionKind::View {
			return Err(self.invalid(&format!("{} cannot be set on a view", option)));
		}
		if self.options.capped_size.is_some() {
			return Err(self.invalid(&format!("{} conflicts with capped", option)));
		}
		if self.options.expire_after_seconds.is_some() {
			return Err(self.invalid(&format!("{} conflicts with ttl", option)));
		}
		Ok(())
	}

	fn invalid(&self, reason: &str) -> SchemaError {
		SchemaError::InvalidMetadata {
			collection: self.name.clone(),
			reason: reason.to_string(),
		}
	}

	/// Structural key of the metadata
	pub fn key(&self) -> String {
		let mut key = format!("{}:{:?}", self.name, self.kind);
		if let Some(size) = self.options.capped_size {
			key.push_str(&format!(":capped={}", size));
		}
		if let Some(seconds) = self.options.expire_after_seconds {
			key.push_str(&format!(":ttl={}", seconds));
		}
		if let Some(view_on) = &self.options.view_on {
			key.push_str(&format!(":viewOn={}", view_on));
		}
		if let Some(pipeline) = &self.options.pipeline {
			key.push_str(&format!(
				":pipeline={}",
				canonical_json(&Value::Array(pipeline.clone()))
			));
		}
		key
	}
}
