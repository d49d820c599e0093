//! Migration storage

pub mod filesystem;

use super::{Migration, Result};
use async_trait::async_trait;

/// Persistent store of migrations
#[async_trait]
pub trait MigrationRepository: Send + Sync {
	/// Store a new migration. Never overwrites.
	async fn save(&mut self, migration: &Migration) -> Result<()>;

	async fn get(&self, id: &str) -> Result<Migration>;

	/// All stored migrations, ordered by ID
	async fn list(&self) -> Result<Vec<Migration>>;

	async fn delete(&mut self, id: &str) -> Result<()>;
}
