//! MongoDB backend
//!
//! # Example
//!
//! ```rust,no_run
//! use mongr8_db::nosql::{MongoDBBackend, SchemaBackend};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let backend = MongoDBBackend::builder()
//!     .url("mongodb://localhost:27017")
//!     .database("myapp")
//!     .max_pool_size(10)
//!     .build()
//!     .await?;
//!
//! let mut session = backend.start_session().await?;
//! session.start_transaction().await?;
//! // ...
//! session.commit_transaction().await?;
//! # Ok(())
//! # }
//! ```

use crate::nosql::error::{NoSQLError, Result};
use crate::nosql::traits::{SchemaBackend, SchemaSession};
use async_trait::async_trait;
use bson::{Document, doc};
use mongodb::options::{CreateCollectionOptions, UpdateModifications};
use mongodb::{Client, ClientSession, Database, IndexModel};
use std::sync::Arc;

/// MongoDB backend implementation
///
/// Transactions require a replica set or a sharded cluster.
#[derive(Clone)]
pub struct MongoDBBackend {
	client: Arc<Client>,
	database_name: String,
}

/// Builder for configuring MongoDB connections
///
/// # Example
///
/// ```rust,no_run
/// use mongr8_db::nosql::MongoDBBackendBuilder;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let backend = MongoDBBackendBuilder::new()
///     .url("mongodb://localhost:27017")
///     .database("mydb")
///     .max_pool_size(100)
///     .min_pool_size(10)
///     .max_idle_time_secs(300)
///     .build()
///     .await?;
/// # Ok(())
/// # }
/// ```
pub struct MongoDBBackendBuilder {
	url: String,
	database: String,
	max_pool_size: Option<u32>,
	min_pool_size: Option<u32>,
	max_idle_time_secs: Option<u64>,
}

impl Default for MongoDBBackendBuilder {
	fn default() -> Self {
		Self::new()
	}
}

impl MongoDBBackendBuilder {
	/// Create a new builder with default settings
	pub fn new() -> Self {
		Self {
			url: "mongodb://localhost:27017".to_string(),
			database: "mongr8".to_string(),
			max_pool_size: None,
			min_pool_size: None,
			max_idle_time_secs: None,
		}
	}

	/// Set the MongoDB connection URL
	pub fn url(mut self, url: impl Into<String>) -> Self {
		self.url = url.into();
		self
	}

	/// Set the database name
	pub fn database(mut self, database: impl Into<String>) -> Self {
		self.database = database.into();
		self
	}

	/// Set the maximum connection pool size
	pub fn max_pool_size(mut self, size: u32) -> Self {
		self.max_pool_size = Some(size);
		self
	}

	/// Set the minimum connection pool size
	pub fn min_pool_size(mut self, size: u32) -> Self {
		self.min_pool_size = Some(size);
		self
	}

	/// Set the maximum idle time for connections in seconds
	pub fn max_idle_time_secs(mut self, secs: u64) -> Self {
		self.max_idle_time_secs = Some(secs);
		self
	}

	/// Build the MongoDB backend
	pub async fn build(self) -> Result<MongoDBBackend> {
		use mongodb::options::ClientOptions;
		use std::time::Duration;

		let mut options = ClientOptions::parse(&self.url)
			.await
			.map_err(|e| NoSQLError::ConnectionError(e.to_string()))?;

		if let Some(max_size) = self.max_pool_size {
			options.max_pool_size = Some(max_size);
		}

		if let Some(min_size) = self.min_pool_size {
			options.min_pool_size = Some(min_size);
		}

		if let Some(idle_time) = self.max_idle_time_secs {
			options.max_idle_time = Some(Duration::from_secs(idle_time));
		}

		let client = Client::with_options(options)
			.map_err(|e| NoSQLError::ConnectionError(e.to_string()))?;

		tracing::debug!(database = %self.database, "mongodb client configured");

		Ok(MongoDBBackend {
			client: Arc::new(client),
			database_name: self.database,
		})
	}
}

impl MongoDBBackend {
	/// Connect to MongoDB using a connection string and database name
	pub async fn connect(url: &str, database_name: &str) -> Result<Self> {
		Self::builder().url(url).database(database_name).build().await
	}

	/// Create a builder for configuring the MongoDB connection
	pub fn builder() -> MongoDBBackendBuilder {
		MongoDBBackendBuilder::new()
	}

	/// Get the MongoDB database instance
	pub fn database(&self) -> Database {
		self.client.database(&self.database_name)
	}

	pub fn database_name(&self) -> &str {
		&self.database_name
	}
}

#[async_trait]
impl SchemaBackend for MongoDBBackend {
	fn backend_name(&self) -> &'static str {
		"mongodb"
	}

	async fn start_session(&self) -> Result<Box<dyn SchemaSession>> {
		let session = self.client.start_session().await.map_err(|e| {
			NoSQLError::ConnectionError(format!("Failed to start MongoDB session: {}", e))
		})?;

		Ok(Box::new(MongoDBSession {
			session,
			database: self.database(),
		}))
	}
}

/// A driver session; every call is made inside it
pub struct MongoDBSession {
	session: ClientSession,
	database: Database,
}

impl MongoDBSession {
	fn collection(&self, name: &str) -> mongodb::Collection<Document> {
		self.database.collection::<Document>(name)
	}
}

#[async_trait]
impl SchemaSession for MongoDBSession {
	async fn start_transaction(&mut self) -> Result<()> {
		self.session.start_transaction().await.map_err(|e| {
			NoSQLError::TransactionError(format!("Failed to start MongoDB transaction: {}", e))
		})
	}

	async fn commit_transaction(&mut self) -> Result<()> {
		self.session.commit_transaction().await.map_err(|e| {
			NoSQLError::TransactionError(format!("Failed to commit MongoDB transaction: {}", e))
		})
	}

	async fn abort_transaction(&mut self) -> Result<()> {
		self.session.abort_transaction().await.map_err(|e| {
			NoSQLError::TransactionError(format!("Failed to rollback MongoDB transaction: {}", e))
		})
	}

	async fn create_collection(
		&mut self,
		name: &str,
		options: CreateCollectionOptions,
	) -> Result<()> {
		self.database
			.create_collection(name)
			.with_options(options)
			.session(&mut self.session)
			.await
			.map_err(NoSQLError::from)
	}

	async fn drop_collection(&mut self, name: &str) -> Result<()> {
		self.collection(name)
			.drop()
			.session(&mut self.session)
			.await
			.map_err(NoSQLError::from)
	}

	async fn insert_one(&mut self, collection: &str, document: Document) -> Result<()> {
		self.collection(collection)
			.insert_one(document)
			.session(&mut self.session)
			.await?;
		Ok(())
	}

	async fn update_many(
		&mut self,
		collection: &str,
		filter: Document,
		update: UpdateModifications,
	) -> Result<u64> {
		let result = self
			.collection(collection)
			.update_many(filter, update)
			.session(&mut self.session)
			.await?;
		Ok(result.modified_count)
	}

	async fn create_index(&mut self, collection: &str, index: IndexModel) -> Result<()> {
		self.collection(collection)
			.create_index(index)
			.session(&mut self.session)
			.await?;
		Ok(())
	}

	async fn drop_index(&mut self, collection: &str, name: &str) -> Result<()> {
		self.collection(collection)
			.drop_index(name)
			.session(&mut self.session)
			.await
			.map_err(NoSQLError::from)
	}

	async fn update_validator(&mut self, collection: &str, validator: Document) -> Result<()> {
		self.database
			.run_command(doc! { "collMod": collection, "validator": validator })
			.session(&mut self.session)
			.await?;
		Ok(())
	}

	async fn find_latest(&mut self, collection: &str, field: &str) -> Result<Option<Document>> {
		let mut sort = Document::new();
		sort.insert(field, -1);
		self.collection(collection)
			.find_one(Document::new())
			.sort(sort)
			.session(&mut self.session)
			.await
			.map_err(NoSQLError::from)
	}
}
