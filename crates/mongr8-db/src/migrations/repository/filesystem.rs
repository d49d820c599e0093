//! Filesystem-based migration repository
//!
//! Persists migrations as pretty-printed `<ID>.json` files in one directory.

use super::{Migration, MigrationRepository, Result};
use crate::migrations::MigrationError;
use async_trait::async_trait;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

static MIGRATION_FILE: LazyLock<Regex> =
	LazyLock::new(|| Regex::new(r"^\d{8}_\d{6}\.json$").unwrap());

/// Repository that persists migrations as `.json` files
///
/// ```text
/// migrations/
///   20240301_120000.json
///   20240302_093000.json
/// ```
pub struct FilesystemRepository {
	/// Directory holding the migration files
	root_dir: PathBuf,
}

impl FilesystemRepository {
	/// Create a new FilesystemRepository
	///
	/// # Example
	///
	/// ```rust,no_run
	/// use mongr8_db::migrations::FilesystemRepository;
	/// let repo = FilesystemRepository::new("./migrations");
	/// ```
	pub fn new<P: AsRef<Path>>(root_dir: P) -> Self {
		Self {
			root_dir: root_dir.as_ref().to_path_buf(),
		}
	}

	pub fn root_dir(&self) -> &Path {
		&self.root_dir
	}

	/// Whether `file_name` names a migration file
	pub fn is_migration_file(file_name: &str) -> bool {
		MIGRATION_FILE.is_match(file_name)
	}

	/// Path of the file for `id`: `<root_dir>/<id>.json`
	///
	/// Only well-formed IDs are accepted, which also keeps the path inside
	/// the root directory.
	fn migration_path(&self, id: &str) -> Result<PathBuf> {
		let file_name = format!("{}.json", id);
		if !Self::is_migration_file(&file_name) {
			return Err(MigrationError::InvalidMigration(format!(
				"migration id '{}' does not match YYYYMMDD_HHMMSS",
				id
			)));
		}
		Ok(self.root_dir.join(file_name))
	}

	async fn read(&self, path: &Path) -> Result<Migration> {
		let content = tokio::fs::read_to_string(path).await.map_err(|e| {
			MigrationError::Io(std::io::Error::other(format!(
				"Failed to read {}: {}",
				path.display(),
				e
			)))
		})?;

		let migration: Migration = serde_json::from_str(&content).map_err(|e| {
			MigrationError::InvalidMigration(format!("Failed to parse {}: {}", path.display(), e))
		})?;

		let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or_default();
		if migration.id != stem {
			return Err(MigrationError::InvalidMigration(format!(
				"{} declares id '{}'",
				path.display(),
				migration.id
			)));
		}
		Ok(migration)
	}
}

#[async_trait]
impl MigrationRepository for FilesystemRepository {
	async fn save(&mut self, migration: &Migration) -> Result<()> {
		let path = self.migration_path(&migration.id)?;

		if tokio::fs::try_exists(&path).await.unwrap_or(false) {
			return Err(MigrationError::AlreadyExists(format!(
				"{}. If you want to replace it, please delete the existing file first.",
				path.display()
			)));
		}

		for existing in &self.list().await? {
			if existing.up == migration.up {
				return Err(MigrationError::DuplicateOperations(format!(
					"Migration '{}' has identical operations to existing migration '{}'",
					migration.id, existing.id
				)));
			}
		}

		tokio::fs::create_dir_all(&self.root_dir).await.map_err(|e| {
			MigrationError::Io(std::io::Error::other(format!(
				"Failed to create directory {}: {}",
				self.root_dir.display(),
				e
			)))
		})?;

		let content = serde_json::to_string_pretty(migration)?;
		tokio::fs::write(&path, content + "\n").await.map_err(|e| {
			MigrationError::Io(std::io::Error::other(format!(
				"Failed to write {}: {}",
				path.display(),
				e
			)))
		})?;

		tracing::debug!(migration = %migration.id, path = %path.display(), "migration saved");
		Ok(())
	}

	async fn get(&self, id: &str) -> Result<Migration> {
		let path = self.migration_path(id)?;

		if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
			return Err(MigrationError::NotFound(id.to_string()));
		}

		self.read(&path).await
	}

	async fn list(&self) -> Result<Vec<Migration>> {
		if !tokio::fs::try_exists(&self.root_dir).await.unwrap_or(false) {
			return Ok(vec![]);
		}

		let mut entries = tokio::fs::read_dir(&self.root_dir).await.map_err(|e| {
			MigrationError::Io(std::io::Error::other(format!(
				"Failed to read directory {}: {}",
				self.root_dir.display(),
				e
			)))
		})?;

		let mut migrations = Vec::new();
		while let Some(entry) = entries.next_entry().await.map_err(|e| {
			MigrationError::Io(std::io::Error::other(format!(
				"Failed to read directory entry: {}",
				e
			)))
		})? {
			let path = entry.path();
			let is_migration = path
				.file_name()
				.and_then(|s| s.to_str())
				.is_some_and(Self::is_migration_file);
			if !is_migration {
				continue;
			}
			migrations.push(self.read(&path).await?);
		}

		migrations.sort_by(|a, b| a.id.cmp(&b.id));
		Ok(migrations)
	}

	async fn delete(&mut self, id: &str) -> Result<()> {
		let path = self.migration_path(id)?;

		if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
			return Err(MigrationError::NotFound(id.to_string()));
		}

		tokio::fs::remove_file(&path).await.map_err(|e| {
			MigrationError::Io(std::io::Error::other(format!(
				"Failed to delete {}: {}",
				path.display(),
				e
			)))
		})?;

		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::migrations::action::{Action, SubAction};
	use crate::schema::{Collection, Metadata};
	use rstest::rstest;
	use serial_test::serial;
	use tempfile::TempDir;

	/// A migration creating a collection named after its ID, so every test
	/// migration has distinct operations.
	fn create_test_migration(id: &str) -> Migration {
		let name = format!("c_{}", id);
		let mut action = Action::new(name.clone());
		action
			.sub_actions
			.push(SubAction::create_collection(&Collection::new(Metadata::new(name))));
		let mut migration = Migration::new(id, "test");
		migration.up.push(action);
		migration
	}

	#[rstest]
	#[tokio::test]
	#[serial(filesystem_repository)]
	async fn test_filesystem_repository_save_and_get() {
		// Arrange
		let temp_dir = TempDir::new().unwrap();
		let mut repo = FilesystemRepository::new(temp_dir.path());
		let migration = create_test_migration("20240301_120000");

		// Act
		repo.save(&migration).await.unwrap();
		let retrieved = repo.get("20240301_120000").await.unwrap();

		// Assert
		assert!(temp_dir.path().join("20240301_120000.json").exists());
		assert_eq!(retrieved, migration);
	}

	#[rstest]
	#[tokio::test]
	#[serial(filesystem_repository)]
	async fn test_filesystem_repository_get_not_found() {
		// Arrange
		let temp_dir = TempDir::new().unwrap();
		let repo = FilesystemRepository::new(temp_dir.path());

		// Act
		let result = repo.get("20240301_120000").await;

		// Assert
		assert!(matches!(result.unwrap_err(), MigrationError::NotFound(_)));
	}

	#[rstest]
	#[tokio::test]
	#[serial(filesystem_repository)]
	async fn test_filesystem_repository_list_is_sorted() {
		// Arrange
		let temp_dir = TempDir::new().unwrap();
		let mut repo = FilesystemRepository::new(temp_dir.path());
		repo.save(&create_test_migration("20240302_000000"))
			.await
			.unwrap();
		repo.save(&create_test_migration("20240301_000000"))
			.await
			.unwrap();
		tokio::fs::write(temp_dir.path().join("notes.txt"), "ignored")
			.await
			.unwrap();

		// Act
		let migrations = repo.list().await.unwrap();

		// Assert
		let ids: Vec<_> = migrations.iter().map(|m| m.id.as_str()).collect();
		assert_eq!(ids, vec!["20240301_000000", "20240302_000000"]);
	}

	#[rstest]
	#[tokio::test]
	#[serial(filesystem_repository)]
	async fn test_filesystem_repository_list_missing_dir() {
		let repo = FilesystemRepository::new("/nonexistent/mongr8/migrations");
		assert!(repo.list().await.unwrap().is_empty());
	}

	#[rstest]
	#[tokio::test]
	#[serial(filesystem_repository)]
	async fn test_filesystem_repository_list_propagates_bad_files() {
		// Arrange
		let temp_dir = TempDir::new().unwrap();
		let repo = FilesystemRepository::new(temp_dir.path());
		tokio::fs::write(temp_dir.path().join("20240301_000000.json"), "{not json")
			.await
			.unwrap();

		// Act
		let result = repo.list().await;

		// Assert
		assert!(matches!(
			result.unwrap_err(),
			MigrationError::InvalidMigration(_)
		));
	}

	#[rstest]
	#[tokio::test]
	#[serial(filesystem_repository)]
	async fn test_filesystem_repository_id_must_match_file_name() {
		// Arrange
		let temp_dir = TempDir::new().unwrap();
		let repo = FilesystemRepository::new(temp_dir.path());
		let content = serde_json::to_string(&create_test_migration("20240301_000000")).unwrap();
		tokio::fs::write(temp_dir.path().join("20240302_000000.json"), content)
			.await
			.unwrap();

		// Act
		let result = repo.get("20240302_000000").await;

		// Assert
		let err = result.unwrap_err();
		assert!(matches!(err, MigrationError::InvalidMigration(_)));
		assert!(err.to_string().contains("declares id"));
	}

	#[rstest]
	#[tokio::test]
	#[serial(filesystem_repository)]
	async fn test_filesystem_repository_delete() {
		// Arrange
		let temp_dir = TempDir::new().unwrap();
		let mut repo = FilesystemRepository::new(temp_dir.path());
		repo.save(&create_test_migration("20240301_000000"))
			.await
			.unwrap();

		// Act
		repo.delete("20240301_000000").await.unwrap();

		// Assert
		assert!(!temp_dir.path().join("20240301_000000.json").exists());
		assert!(matches!(
			repo.delete("20240301_000000").await.unwrap_err(),
			MigrationError::NotFound(_)
		));
	}

	#[rstest]
	#[tokio::test]
	#[serial(filesystem_repository)]
	async fn test_filesystem_repository_save_prevents_overwrite() {
		// Arrange
		let temp_dir = TempDir::new().unwrap();
		let mut repo = FilesystemRepository::new(temp_dir.path());
		let migration = create_test_migration("20240301_000000");
		repo.save(&migration).await.unwrap();

		// Act
		let mut changed = migration.clone();
		changed.up.clear();
		let result = repo.save(&changed).await;

		// Assert
		let err = result.unwrap_err();
		assert!(matches!(err, MigrationError::AlreadyExists(_)));
		assert!(err.to_string().contains("already exists"));
	}

	#[rstest]
	#[tokio::test]
	#[serial(filesystem_repository)]
	async fn test_filesystem_repository_save_rejects_duplicate_operations() {
		// Arrange
		let temp_dir = TempDir::new().unwrap();
		let mut repo = FilesystemRepository::new(temp_dir.path());
		let first = create_test_migration("20240301_000000");
		repo.save(&first).await.unwrap();

		// Act
		let mut second = first.clone();
		second.id = "20240302_000000".to_string();
		let result = repo.save(&second).await;

		// Assert
		assert!(matches!(
			result.unwrap_err(),
			MigrationError::DuplicateOperations(_)
		));
	}

	#[rstest]
	#[case("../20240301_000000")]
	#[case("20240301_000000/x")]
	#[case("2024_01")]
	#[case("")]
	fn test_malformed_id_rejected(#[case] id: &str) {
		// Arrange
		let temp_dir = TempDir::new().unwrap();
		let repo = FilesystemRepository::new(temp_dir.path());

		// Act
		let result = repo.migration_path(id);

		// Assert
		assert!(matches!(
			result.unwrap_err(),
			MigrationError::InvalidMigration(_)
		));
	}
}
