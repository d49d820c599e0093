//! Merging of configuration sources

use super::SettingsError;
use super::sources::ConfigSource;
use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde_json::Value;

/// Collects sources and merges them by priority
///
/// # Examples
///
/// ```
/// use mongr8_conf::settings::builder::SettingsBuilder;
/// use mongr8_conf::settings::sources::DefaultSource;
/// use serde_json::Value;
///
/// let merged = SettingsBuilder::new()
///     .add_source(DefaultSource::new().with_value("database_name", Value::from("shop")))
///     .build()
///     .unwrap();
/// assert_eq!(merged.get("database_name"), Some(&Value::from("shop")));
/// ```
#[derive(Default)]
pub struct SettingsBuilder {
	sources: Vec<Box<dyn ConfigSource>>,
}

impl SettingsBuilder {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn add_source(mut self, source: impl ConfigSource + 'static) -> Self {
		self.sources.push(Box::new(source));
		self
	}

	/// Load every source; a key from a higher-priority source wins.
	///
	/// Sources of equal priority apply in the order they were added.
	pub fn build(mut self) -> Result<MergedSettings, SettingsError> {
		self.sources.sort_by_key(|source| source.priority());

		let mut values = IndexMap::new();
		for source in &self.sources {
			let loaded = source.load().map_err(|e| SettingsError::Source {
				source_name: source.description(),
				error: e,
			})?;
			tracing::trace!(
				source = %source.description(),
				keys = loaded.len(),
				"configuration source loaded"
			);
			values.extend(loaded);
		}
		Ok(MergedSettings { values })
	}
}

/// The merged key-value view of all sources
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MergedSettings {
	values: IndexMap<String, Value>,
}

impl MergedSettings {
	pub fn get(&self, key: &str) -> Option<&Value> {
		self.values.get(key)
	}

	pub fn keys(&self) -> impl Iterator<Item = &String> {
		self.values.keys()
	}

	/// Deserialize into a typed settings struct
	pub fn into_typed<T: DeserializeOwned>(self) -> Result<T, SettingsError> {
		let object: serde_json::Map<String, Value> = self.values.into_iter().collect();
		serde_json::from_value(Value::Object(object)).map_err(SettingsError::Invalid)
	}
}
