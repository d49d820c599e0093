//! Backend seam of the apply runtime
//!
//! The executor only ever talks to a [`SchemaSession`]: every schema and
//! data change of a migration goes through one session so it can share one
//! transaction.

use super::error::Result;
use async_trait::async_trait;
use bson::Document;
use mongodb::IndexModel;
use mongodb::options::{CreateCollectionOptions, UpdateModifications};

/// A database that can host migrations
///
/// # Example
///
/// ```rust,ignore
/// use mongr8_db::nosql::SchemaBackend;
///
/// async fn ping(backend: &dyn SchemaBackend) -> Result<()> {
///     let mut session = backend.start_session().await?;
///     session.find_latest("mongr8_migration_history", "id").await?;
///     Ok(())
/// }
/// ```
#[async_trait]
pub trait SchemaBackend: Send + Sync {
	/// Short name for logs
	fn backend_name(&self) -> &'static str;

	/// Open a session; all calls made through it share its transaction.
	async fn start_session(&self) -> Result<Box<dyn SchemaSession>>;
}

/// Operations the apply runtime needs, scoped to one session
#[async_trait]
pub trait SchemaSession: Send {
	async fn start_transaction(&mut self) -> Result<()>;

	async fn commit_transaction(&mut self) -> Result<()>;

	/// Roll back everything done since [`start_transaction`](Self::start_transaction).
	async fn abort_transaction(&mut self) -> Result<()>;

	/// Create a collection or view
	async fn create_collection(
		&mut self,
		name: &str,
		options: CreateCollectionOptions,
	) -> Result<()>;

	async fn drop_collection(&mut self, name: &str) -> Result<()>;

	async fn insert_one(&mut self, collection: &str, document: Document) -> Result<()>;

	/// Apply an update document or pipeline to every matching document.
	///
	/// Returns the number of modified documents.
	async fn update_many(
		&mut self,
		collection: &str,
		filter: Document,
		update: UpdateModifications,
	) -> Result<u64>;

	async fn create_index(&mut self, collection: &str, index: IndexModel) -> Result<()>;

	async fn drop_index(&mut self, collection: &str, name: &str) -> Result<()>;

	/// Replace the collection's `$jsonSchema` validator (`collMod`)
	async fn update_validator(&mut self, collection: &str, validator: Document) -> Result<()>;

	/// The document with the highest value of `field`, if any
	async fn find_latest(&mut self, collection: &str, field: &str) -> Result<Option<Document>>;
}
