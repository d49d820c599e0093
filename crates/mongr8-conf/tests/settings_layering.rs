//! Integration tests for layered settings loading

use mongr8_conf::settings::{Settings, SettingsError};
use rstest::*;
use serial_test::serial;
use std::env;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

#[fixture]
fn temp_dir() -> TempDir {
	TempDir::new().expect("Failed to create temporary directory")
}

#[rstest]
#[serial(env)]
fn test_load_without_file_uses_defaults(temp_dir: TempDir) {
	// Act
	let settings = Settings::load(temp_dir.path().join("mongr8.toml")).unwrap();

	// Assert
	assert_eq!(settings, Settings::default());
}

#[rstest]
#[serial(env)]
fn test_file_overrides_defaults(temp_dir: TempDir) {
	// Arrange
	let path = temp_dir.path().join("mongr8.toml");
	fs::write(
		&path,
		r#"
database_name = "shop"
migrations_dir = "db/migrations"
timeout_secs = 120
"#,
	)
	.unwrap();

	// Act
	let settings = Settings::load(&path).unwrap();

	// Assert
	assert_eq!(settings.database_name, "shop");
	assert_eq!(settings.migrations_dir, PathBuf::from("db/migrations"));
	assert_eq!(settings.timeout_secs, 120);
	assert_eq!(settings.database_url, "mongodb://localhost:27017");
}

#[rstest]
#[serial(env)]
fn test_environment_overrides_file(temp_dir: TempDir) {
	// Arrange
	let path = temp_dir.path().join("mongr8.toml");
	fs::write(&path, "database_name = \"shop\"\nlog_level = \"info\"\n").unwrap();
	// SAFETY: Setting environment variables is unsafe in multi-threaded programs.
	// This test uses #[serial] to ensure exclusive access to environment variables.
	unsafe {
		env::set_var("MONGR8_DATABASE_NAME", "staging");
	}

	// Act
	let result = Settings::load(&path);

	// SAFETY: Removing environment variables is unsafe in multi-threaded programs.
	// This test uses #[serial] to ensure exclusive access to environment variables.
	unsafe {
		env::remove_var("MONGR8_DATABASE_NAME");
	}

	// Assert
	let settings = result.unwrap();
	assert_eq!(settings.database_name, "staging");
	assert_eq!(settings.log_level, "info");
}

#[rstest]
#[serial(env)]
fn test_malformed_file_names_the_source(temp_dir: TempDir) {
	// Arrange
	let path = temp_dir.path().join("mongr8.toml");
	fs::write(&path, "timeout_secs = [").unwrap();

	// Act
	let error = Settings::load(&path).unwrap_err();

	// Assert
	assert!(matches!(error, SettingsError::Source { .. }));
	assert!(error.to_string().contains("mongr8.toml"), "{}", error);
}
