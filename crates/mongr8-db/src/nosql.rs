//! # NoSQL backends
//!
//! The database side of the apply runtime: a [`SchemaBackend`] hands out
//! [`SchemaSession`]s, and the executor runs every driver call of a
//! migration through one session.
//!
//! - [`MongoDBBackend`]: the `mongodb` driver.
//! - [`InMemoryBackend`]: a transactional in-memory catalog for tests and
//!   dry runs.

pub mod backends;
pub mod error;
pub mod traits;

pub use backends::memory::{InMemoryBackend, InMemorySession};
pub use backends::mongodb::{MongoDBBackend, MongoDBBackendBuilder, MongoDBSession};
pub use error::{NoSQLError, Result};
pub use traits::{SchemaBackend, SchemaSession};
