//! Backend error types

use thiserror::Error;

/// Result type for backend operations
pub type Result<T> = std::result::Result<T, NoSQLError>;

/// `NamespaceNotFound` and `IndexNotFound` server codes
const NOT_FOUND_CODES: [i32; 2] = [26, 27];

/// Failure of a backend call
///
/// Driver errors keep their kind through `From<mongodb::error::Error>`.
#[derive(Debug, Error)]
pub enum NoSQLError {
	/// The server could not be reached or the client could not be built
	#[error("Connection error: {0}")]
	ConnectionError(String),

	/// The server rejected a command
	#[error("Execution error: {0}")]
	ExecutionError(String),

	/// Collection or index not found
	#[error("Not found: {0}")]
	NotFound(String),

	/// Invalid operation or argument for the current state
	#[error("Invalid operation: {0}")]
	InvalidOperation(String),

	/// Transaction could not be started, committed or aborted
	#[error("Transaction error: {0}")]
	TransactionError(String),

	#[error("Authentication error: {0}")]
	AuthenticationError(String),
}

impl From<mongodb::error::Error> for NoSQLError {
	fn from(err: mongodb::error::Error) -> Self {
		use mongodb::error::ErrorKind;

		let message = err.to_string();
		match *err.kind {
			ErrorKind::Authentication { .. } => NoSQLError::AuthenticationError(message),
			ErrorKind::InvalidArgument { .. } => NoSQLError::InvalidOperation(message),
			ErrorKind::Io(_) | ErrorKind::ServerSelection { .. } => {
				NoSQLError::ConnectionError(message)
			}
			ErrorKind::Transaction { .. } => NoSQLError::TransactionError(message),
			ErrorKind::Command(ref command) if NOT_FOUND_CODES.contains(&command.code) => {
				NoSQLError::NotFound(message)
			}
			_ => NoSQLError::ExecutionError(message),
		}
	}
}
