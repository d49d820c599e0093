//! Typed settings

pub mod builder;
pub mod sources;

use builder::SettingsBuilder;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sources::{DefaultSource, EnvSource, SourceError, TomlFileSource};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Default name of the settings file
pub const SETTINGS_FILE: &str = "mongr8.toml";

#[derive(Debug, Error)]
pub enum SettingsError {
	#[error("Failed to load {source_name}: {error}")]
	Source {
		source_name: String,
		#[source]
		error: SourceError,
	},

	#[error("Invalid settings: {0}")]
	Invalid(#[source] serde_json::Error),
}

/// Everything the command line needs to reach a database and find migrations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
	pub database_url: String,
	pub database_name: String,
	pub migrations_dir: PathBuf,
	/// Budget for one whole `apply-migration` run
	pub timeout_secs: u64,
	/// `warn`, `info`, `debug` or `trace`
	pub log_level: String,
	pub history_collection: String,
}

impl Default for Settings {
	fn default() -> Self {
		Self {
			database_url: "mongodb://localhost:27017".to_string(),
			database_name: "mongr8".to_string(),
			migrations_dir: PathBuf::from("migrations"),
			timeout_secs: 30,
			log_level: "warn".to_string(),
			history_collection: "mongr8_migration_history".to_string(),
		}
	}
}

impl Settings {
	/// Defaults, then the TOML file at `path` if it exists, then `MONGR8_*`
	/// environment variables.
	pub fn load(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
		SettingsBuilder::new()
			.add_source(Self::default_source())
			.add_source(TomlFileSource::new(path.as_ref()))
			.add_source(EnvSource::new())
			.build()?
			.into_typed()
	}

	/// The defaults as a configuration source
	pub fn default_source() -> DefaultSource {
		let defaults = Self::default();
		DefaultSource::new()
			.with_value("database_url", Value::from(defaults.database_url))
			.with_value("database_name", Value::from(defaults.database_name))
			.with_value(
				"migrations_dir",
				Value::from(defaults.migrations_dir.to_string_lossy().into_owned()),
			)
			.with_value("timeout_secs", Value::from(defaults.timeout_secs))
			.with_value("log_level", Value::from(defaults.log_level))
			.with_value("history_collection", Value::from(defaults.history_collection))
	}

	pub fn timeout(&self) -> Duration {
		Duration::from_secs(self.timeout_secs)
	}

	/// The settings as a TOML document, as written by `init-migration`
	pub fn to_toml(&self) -> Result<String, SettingsError> {
		toml::to_string_pretty(self).map_err(|e| SettingsError::Source {
			source_name: SETTINGS_FILE.to_string(),
			error: SourceError::Parse(e.to_string()),
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	#[rstest]
	fn test_default_source_matches_defaults() {
		let merged = SettingsBuilder::new()
			.add_source(Settings::default_source())
			.build()
			.unwrap();

		let settings: Settings = merged.into_typed().unwrap();

		assert_eq!(settings, Settings::default());
	}

	#[rstest]
	fn test_wrong_type_is_invalid() {
		let merged = SettingsBuilder::new()
			.add_source(Settings::default_source().with_value("timeout_secs", Value::from("soon")))
			.build()
			.unwrap();

		let result = merged.into_typed::<Settings>();

		assert!(matches!(result, Err(SettingsError::Invalid(_))));
	}

	#[rstest]
	fn test_to_toml_round_trips() {
		let settings = Settings::default();
		let parsed: Settings = toml::from_str(&settings.to_toml().unwrap()).unwrap();
		assert_eq!(parsed, settings);
	}
}
