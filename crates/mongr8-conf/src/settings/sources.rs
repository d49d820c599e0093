//! Configuration sources

use indexmap::IndexMap;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};

/// Prefix of the environment variables mongr8 reads
pub const ENV_PREFIX: &str = "MONGR8_";

/// Configuration source trait
pub trait ConfigSource: Send + Sync {
	/// Load configuration from this source
	fn load(&self) -> Result<IndexMap<String, Value>, SourceError>;

	/// Get the priority of this source (higher = more important)
	fn priority(&self) -> u8;

	/// Get a description of this source
	fn description(&self) -> String;
}

/// Error type for configuration sources
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),

	#[error("Parse error: {0}")]
	Parse(String),

	#[error("TOML error: {0}")]
	Toml(#[from] toml::de::Error),

	#[error("JSON error: {0}")]
	Json(#[from] serde_json::Error),
}

/// Environment variable configuration source
///
/// Keys lose the prefix and are lower-cased, so `MONGR8_DATABASE_NAME`
/// becomes `database_name`. Integer and boolean values are parsed.
pub struct EnvSource {
	prefix: String,
}

impl EnvSource {
	/// Read variables starting with [`ENV_PREFIX`]
	pub fn new() -> Self {
		Self::with_prefix(ENV_PREFIX)
	}

	/// Read variables starting with `prefix`
	///
	/// # Examples
	///
	/// ```
	/// use mongr8_conf::settings::sources::EnvSource;
	///
	/// let source = EnvSource::with_prefix("APP_");
	/// ```
	pub fn with_prefix(prefix: impl Into<String>) -> Self {
		Self {
			prefix: prefix.into(),
		}
	}
}

impl Default for EnvSource {
	fn default() -> Self {
		Self::new()
	}
}

impl ConfigSource for EnvSource {
	fn load(&self) -> Result<IndexMap<String, Value>, SourceError> {
		let mut config = IndexMap::new();

		for (key, value) in std::env::vars() {
			let Some(clean_key) = key.strip_prefix(&self.prefix) else {
				continue;
			};
			if clean_key.is_empty() {
				continue;
			}

			let parsed_value = if let Ok(num) = value.parse::<i64>() {
				Value::Number(num.into())
			} else if let Ok(b) = value.trim().to_lowercase().parse::<bool>() {
				Value::Bool(b)
			} else {
				Value::String(value)
			};

			config.insert(clean_key.to_lowercase(), parsed_value);
		}

		Ok(config)
	}

	fn priority(&self) -> u8 {
		100 // Highest priority
	}

	fn description(&self) -> String {
		format!("Environment variables (prefix: {})", self.prefix)
	}
}

/// TOML file configuration source
///
/// A missing file loads as empty.
pub struct TomlFileSource {
	path: PathBuf,
}

impl TomlFileSource {
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self { path: path.into() }
	}

	pub fn path(&self) -> &Path {
		&self.path
	}
}

impl ConfigSource for TomlFileSource {
	fn load(&self) -> Result<IndexMap<String, Value>, SourceError> {
		if !self.path.exists() {
			return Ok(IndexMap::new());
		}

		let content = fs::read_to_string(&self.path)?;
		let toml_value: toml::Value = toml::from_str(&content)?;

		let json_value = serde_json::to_value(&toml_value)?;
		let map = json_value
			.as_object()
			.ok_or_else(|| SourceError::Parse("Expected table at root".to_string()))?;

		Ok(map.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
	}

	fn priority(&self) -> u8 {
		50 // Medium priority
	}

	fn description(&self) -> String {
		format!("TOML file: {}", self.path.display())
	}
}

/// Default values configuration source
pub struct DefaultSource {
	values: IndexMap<String, Value>,
}

impl DefaultSource {
	pub fn new() -> Self {
		Self {
			values: IndexMap::new(),
		}
	}

	/// Add a default value for a configuration key
	///
	/// # Examples
	///
	/// ```
	/// use mongr8_conf::settings::sources::DefaultSource;
	/// use serde_json::Value;
	///
	/// let source = DefaultSource::new()
	///     .with_value("timeout_secs", Value::Number(30.into()));
	/// ```
	pub fn with_value(mut self, key: impl Into<String>, value: Value) -> Self {
		self.values.insert(key.into(), value);
		self
	}
}

impl Default for DefaultSource {
	fn default() -> Self {
		Self::new()
	}
}

impl ConfigSource for DefaultSource {
	fn load(&self) -> Result<IndexMap<String, Value>, SourceError> {
		Ok(self.values.clone())
	}

	fn priority(&self) -> u8 {
		0 // Lowest priority
	}

	fn description(&self) -> String {
		"Default values".to_string()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;
	use serial_test::serial;
	use std::env;
	use tempfile::TempDir;

	#[rstest]
	#[serial(env)]
	fn test_env_source_strips_prefix() {
		// SAFETY: Setting environment variables is unsafe in multi-threaded programs.
		// This test uses #[serial] to ensure exclusive access to environment variables.
		unsafe {
			env::set_var("MONGR8_DATABASE_NAME", "shop");
			env::set_var("MONGR8_TIMEOUT_SECS", "5");
			env::set_var("MONGR8_USE_TRANSACTION", "TRUE");
		}

		let config = EnvSource::new().load().unwrap();

		assert_eq!(
			config.get("database_name").unwrap(),
			&Value::String("shop".to_string())
		);
		assert_eq!(config.get("timeout_secs").unwrap(), &Value::from(5));
		assert_eq!(config.get("use_transaction").unwrap(), &Value::Bool(true));

		// SAFETY: Removing environment variables is unsafe in multi-threaded programs.
		// This test uses #[serial] to ensure exclusive access to environment variables.
		unsafe {
			env::remove_var("MONGR8_DATABASE_NAME");
			env::remove_var("MONGR8_TIMEOUT_SECS");
			env::remove_var("MONGR8_USE_TRANSACTION");
		}
	}

	#[rstest]
	fn test_toml_source() {
		let temp_dir = TempDir::new().unwrap();
		let config_path = temp_dir.path().join("mongr8.toml");
		fs::write(
			&config_path,
			"database_name = \"shop\"\ntimeout_secs = 10\n",
		)
		.unwrap();

		let config = TomlFileSource::new(&config_path).load().unwrap();

		assert_eq!(
			config.get("database_name").unwrap(),
			&Value::String("shop".to_string())
		);
		assert_eq!(config.get("timeout_secs").unwrap(), &Value::from(10));
	}

	#[rstest]
	fn test_toml_source_missing_file_is_empty() {
		let config = TomlFileSource::new("/nonexistent/mongr8.toml").load().unwrap();
		assert!(config.is_empty());
	}

	#[rstest]
	fn test_toml_source_rejects_invalid_toml() {
		let temp_dir = TempDir::new().unwrap();
		let config_path = temp_dir.path().join("mongr8.toml");
		fs::write(&config_path, "database_name = ").unwrap();

		let result = TomlFileSource::new(&config_path).load();

		assert!(matches!(result, Err(SourceError::Toml(_))));
	}

	#[rstest]
	fn test_source_priority() {
		assert_eq!(EnvSource::new().priority(), 100);
		assert_eq!(TomlFileSource::new("mongr8.toml").priority(), 50);
		assert_eq!(DefaultSource::new().priority(), 0);
	}
}
