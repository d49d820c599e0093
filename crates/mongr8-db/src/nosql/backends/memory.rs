//! In-memory backend
//!
//! A transactional catalog of collections held in process memory. It
//! understands the subset of MongoDB the apply runtime emits: `$set` and
//! `$unset` (dotted and `$[]` paths), `$exists`/`$type`/equality filters, and
//! `$set` pipelines built from `$map`, `$mergeObjects`, `$convert` and the
//! `$toX` operators.
//!
//! Used by the test suite and by `apply-migration --dry-run`.

use crate::nosql::error::{NoSQLError, Result};
use crate::nosql::traits::{SchemaBackend, SchemaSession};
use async_trait::async_trait;
use bson::{Bson, DateTime, Document};
use indexmap::IndexMap;
use mongodb::IndexModel;
use mongodb::options::{CreateCollectionOptions, UpdateModifications};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

/// One collection of the in-memory catalog
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MemoryCollection {
	pub capped_size: Option<u64>,
	pub expire_after_seconds: Option<u64>,
	pub view_on: Option<String>,
	pub validator: Option<Document>,
	pub documents: Vec<Document>,
	/// Index name to key document
	pub indexes: IndexMap<String, Document>,
}

type Catalog = BTreeMap<String, MemoryCollection>;

#[derive(Debug, Default)]
struct MemoryState {
	catalog: Catalog,
	operations: Vec<String>,
	failures: Vec<(String, String)>,
	latency: Option<Duration>,
}

/// In-memory [`SchemaBackend`]
///
/// Clones share the same catalog.
///
/// # Example
///
/// ```rust
/// use mongr8_db::nosql::{InMemoryBackend, SchemaBackend};
///
/// # async fn example() -> mongr8_db::nosql::Result<()> {
/// let backend = InMemoryBackend::new();
/// let mut session = backend.start_session().await?;
/// session.insert_one("users", bson::doc! { "name": "" }).await?;
/// assert_eq!(backend.collection("users").unwrap().documents.len(), 1);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct InMemoryBackend {
	state: Arc<Mutex<MemoryState>>,
}

impl InMemoryBackend {
	pub fn new() -> Self {
		Self::default()
	}

	/// Delay every call by `latency`
	pub fn with_latency(self, latency: Duration) -> Self {
		self.state.lock().latency = Some(latency);
		self
	}

	/// Make every `operation` on `collection` fail
	///
	/// `operation` is a [`SchemaSession`] method name, e.g. `"create_index"`.
	pub fn fail_on(&self, operation: &str, collection: &str) {
		self.state
			.lock()
			.failures
			.push((operation.to_string(), collection.to_string()));
	}

	pub fn collection(&self, name: &str) -> Option<MemoryCollection> {
		self.state.lock().catalog.get(name).cloned()
	}

	pub fn collection_names(&self) -> Vec<String> {
		self.state.lock().catalog.keys().cloned().collect()
	}

	/// Every call made so far, as `"<operation> <collection>"`
	pub fn operations(&self) -> Vec<String> {
		self.state.lock().operations.clone()
	}

	/// Record a call, honouring injected latency and failures.
	async fn enter(&self, operation: &str, collection: &str) -> Result<()> {
		let latency = self.state.lock().latency;
		if let Some(latency) = latency {
			tokio::time::sleep(latency).await;
		}

		let mut state = self.state.lock();
		state
			.operations
			.push(format!("{} {}", operation, collection).trim_end().to_string());
		if state
			.failures
			.iter()
			.any(|(op, coll)| op == operation && coll == collection)
		{
			return Err(NoSQLError::ExecutionError(format!(
				"injected failure: {} on {}",
				operation, collection
			)));
		}
		Ok(())
	}
}

#[async_trait]
impl SchemaBackend for InMemoryBackend {
	fn backend_name(&self) -> &'static str {
		"memory"
	}

	async fn start_session(&self) -> Result<Box<dyn SchemaSession>> {
		Ok(Box::new(InMemorySession {
			backend: self.clone(),
			snapshot: None,
		}))
	}
}

/// Session over an [`InMemoryBackend`]
///
/// A transaction snapshots the catalog; aborting restores the snapshot.
pub struct InMemorySession {
	backend: InMemoryBackend,
	snapshot: Option<Catalog>,
}

#[async_trait]
impl SchemaSession for InMemorySession {
	async fn start_transaction(&mut self) -> Result<()> {
		self.backend.enter("start_transaction", "").await?;
		if self.snapshot.is_some() {
			return Err(NoSQLError::TransactionError(
				"Transaction already in progress".to_string(),
			));
		}
		self.snapshot = Some(self.backend.state.lock().catalog.clone());
		Ok(())
	}

	async fn commit_transaction(&mut self) -> Result<()> {
		self.backend.enter("commit_transaction", "").await?;
		self.snapshot
			.take()
			.map(|_| ())
			.ok_or_else(|| NoSQLError::TransactionError("No transaction started".to_string()))
	}

	async fn abort_transaction(&mut self) -> Result<()> {
		self.backend.enter("abort_transaction", "").await?;
		let snapshot = self
			.snapshot
			.take()
			.ok_or_else(|| NoSQLError::TransactionError("No transaction started".to_string()))?;
		self.backend.state.lock().catalog = snapshot;
		Ok(())
	}

	async fn create_collection(
		&mut self,
		name: &str,
		options: CreateCollectionOptions,
	) -> Result<()> {
		self.backend.enter("create_collection", name).await?;
		let mut state = self.backend.state.lock();
		if state.catalog.contains_key(name) {
			return Err(NoSQLError::ExecutionError(format!(
				"Collection already exists: {}",
				name
			)));
		}
		let capped = options.capped.unwrap_or(false);
		state.catalog.insert(
			name.to_string(),
			MemoryCollection {
				capped_size: if capped { options.size } else { None },
				expire_after_seconds: options.expire_after_seconds.map(|d| d.as_secs()),
				view_on: options.view_on,
				validator: options.validator,
				..MemoryCollection::default()
			},
		);
		Ok(())
	}

	async fn drop_collection(&mut self, name: &str) -> Result<()> {
		self.backend.enter("drop_collection", name).await?;
		self.backend.state.lock().catalog.remove(name);
		Ok(())
	}

	async fn insert_one(&mut self, collection: &str, document: Document) -> Result<()> {
		self.backend.enter("insert_one", collection).await?;
		let mut state = self.backend.state.lock();
		let target = state.catalog.entry(collection.to_string()).or_default();
		if target.view_on.is_some() {
			return Err(NoSQLError::InvalidOperation(format!(
				"Namespace {} is a view",
				collection
			)));
		}
		target.documents.push(document);
		Ok(())
	}

	async fn update_many(
		&mut self,
		collection: &str,
		filter: Document,
		update: UpdateModifications,
	) -> Result<u64> {
		self.backend.enter("update_many", collection).await?;
		let mut state = self.backend.state.lock();
		let Some(target) = state.catalog.get_mut(collection) else {
			return Ok(0);
		};

		let mut modified = 0;
		for document in target.documents.iter_mut() {
			if !matches_filter(document, &filter) {
				continue;
			}
			let mut updated = document.clone();
			match &update {
				UpdateModifications::Document(update) => apply_update(&mut updated, update)?,
				UpdateModifications::Pipeline(pipeline) => apply_pipeline(&mut updated, pipeline)?,
				_ => {
					return Err(NoSQLError::InvalidOperation(
						"unsupported update modification".to_string(),
					));
				}
			}
			if updated != *document {
				*document = updated;
				modified += 1;
			}
		}
		Ok(modified)
	}

	async fn create_index(&mut self, collection: &str, index: IndexModel) -> Result<()> {
		self.backend.enter("create_index", collection).await?;
		let name = index
			.options
			.as_ref()
			.and_then(|options| options.name.clone())
			.unwrap_or_else(|| default_index_name(&index.keys));

		let mut state = self.backend.state.lock();
		let target = state.catalog.entry(collection.to_string()).or_default();
		match target.indexes.get(&name) {
			Some(keys) if *keys != index.keys => Err(NoSQLError::ExecutionError(format!(
				"An existing index has the same name as the requested index: {}",
				name
			))),
			Some(_) => Ok(()),
			None => {
				target.indexes.insert(name, index.keys);
				Ok(())
			}
		}
	}

	async fn drop_index(&mut self, collection: &str, name: &str) -> Result<()> {
		self.backend.enter("drop_index", collection).await?;
		let mut state = self.backend.state.lock();
		let target = state
			.catalog
			.get_mut(collection)
			.ok_or_else(|| NoSQLError::NotFound(format!("ns not found: {}", collection)))?;
		target
			.indexes
			.shift_remove(name)
			.map(|_| ())
			.ok_or_else(|| NoSQLError::NotFound(format!("index not found with name [{}]", name)))
	}

	async fn update_validator(&mut self, collection: &str, validator: Document) -> Result<()> {
		self.backend.enter("update_validator", collection).await?;
		let mut state = self.backend.state.lock();
		let target = state
			.catalog
			.get_mut(collection)
			.ok_or_else(|| NoSQLError::NotFound(format!("ns not found: {}", collection)))?;
		target.validator = Some(validator);
		Ok(())
	}

	async fn find_latest(&mut self, collection: &str, field: &str) -> Result<Option<Document>> {
		self.backend.enter("find_latest", collection).await?;
		let state = self.backend.state.lock();
		let Some(target) = state.catalog.get(collection) else {
			return Ok(None);
		};
		let key = |document: &Document| match document.get(field) {
			Some(Bson::String(text)) => text.clone(),
			Some(other) => other.to_string(),
			None => String::new(),
		};
		Ok(target
			.documents
			.iter()
			.max_by(|a, b| key(a).cmp(&key(b)))
			.cloned())
	}
}

fn default_index_name(keys: &Document) -> String {
	keys.iter()
		.map(|(field, value)| match value {
			Bson::String(text) => format!("{}_{}", field, text),
			other => format!("{}_{}", field, other),
		})
		.collect::<Vec<_>>()
		.join("_")
}

fn split(path: &str) -> Vec<&str> {
	path.split('.').collect()
}

/// `$type` alias of a value
fn type_alias(value: &Bson) -> &'static str {
	match value {
		Bson::Double(_) => "double",
		Bson::String(_) => "string",
		Bson::Document(_) => "object",
		Bson::Array(_) => "array",
		Bson::Boolean(_) => "bool",
		Bson::Null => "null",
		Bson::Int32(_) => "int",
		Bson::Int64(_) => "long",
		Bson::DateTime(_) => "date",
		_ => "unknown",
	}
}

/// Values reachable at `parts`, descending into arrays like a multikey query
fn collect_values<'a>(value: &'a Bson, parts: &[&str], out: &mut Vec<&'a Bson>) {
	let Some((head, rest)) = parts.split_first() else {
		if let Bson::Array(items) = value {
			out.extend(items.iter());
		}
		out.push(value);
		return;
	};
	match value {
		Bson::Document(document) => {
			if let Some(child) = document.get(*head) {
				collect_values(child, rest, out);
			}
		}
		Bson::Array(items) => {
			for item in items {
				collect_values(item, parts, out);
			}
		}
		_ => {}
	}
}

fn matches_filter(document: &Document, filter: &Document) -> bool {
	filter.iter().all(|(path, condition)| {
		let parts = split(path);
		let mut values = Vec::new();
		if let Some((head, rest)) = parts.split_first()
			&& let Some(value) = document.get(*head)
		{
			collect_values(value, rest, &mut values);
		}

		match condition {
			Bson::Document(operators) if operators.keys().all(|k| k.starts_with('$')) => {
				operators.iter().all(|(operator, argument)| match operator.as_str() {
					"$exists" => {
						let wanted = !matches!(argument, Bson::Boolean(false) | Bson::Int32(0));
						values.is_empty() != wanted
					}
					"$type" => values
						.iter()
						.any(|value| Some(type_alias(value)) == argument.as_str()),
					"$eq" => values.iter().any(|value| *value == argument),
					_ => false,
				})
			}
			expected => values.iter().any(|value| *value == expected),
		}
	})
}

fn set_path(target: &mut Bson, parts: &[&str], value: &Bson) {
	let Some((head, rest)) = parts.split_first() else {
		*target = value.clone();
		return;
	};
	if *head == "$[]" {
		if let Bson::Array(items) = target {
			for item in items {
				set_path(item, rest, value);
			}
		}
		return;
	}
	if let Bson::Document(document) = target {
		if !document.contains_key(*head) {
			if rest.is_empty() {
				document.insert(*head, value.clone());
				return;
			}
			document.insert(*head, Document::new());
		}
		if let Some(child) = document.get_mut(*head) {
			set_path(child, rest, value);
		}
	}
}

fn unset_path(target: &mut Bson, parts: &[&str]) {
	let Some((head, rest)) = parts.split_first() else {
		return;
	};
	if *head == "$[]" {
		if let Bson::Array(items) = target {
			for item in items {
				if rest.is_empty() {
					*item = Bson::Null;
				} else {
					unset_path(item, rest);
				}
			}
		}
		return;
	}
	if let Bson::Document(document) = target {
		if rest.is_empty() {
			document.remove(*head);
		} else if let Some(child) = document.get_mut(*head) {
			unset_path(child, rest);
		}
	}
}

fn with_root(document: &mut Document, apply: impl FnOnce(&mut Bson)) {
	let mut root = Bson::Document(std::mem::take(document));
	apply(&mut root);
	if let Bson::Document(updated) = root {
		*document = updated;
	}
}

fn apply_update(document: &mut Document, update: &Document) -> Result<()> {
	let mut changes = Vec::new();
	for (operator, fields) in update {
		let Bson::Document(fields) = fields else {
			return Err(NoSQLError::InvalidOperation(format!(
				"{} expects a document",
				operator
			)));
		};
		if operator != "$set" && operator != "$unset" {
			return Err(NoSQLError::InvalidOperation(format!(
				"Unsupported update operator: {}",
				operator
			)));
		}
		changes.push((operator.as_str(), fields));
	}

	with_root(document, |root| {
		for (operator, fields) in changes {
			for (path, value) in fields {
				if operator == "$set" {
					set_path(root, &split(path), value);
				} else {
					unset_path(root, &split(path));
				}
			}
		}
	});
	Ok(())
}

fn apply_pipeline(document: &mut Document, pipeline: &[Document]) -> Result<()> {
	for stage in pipeline {
		let Some((name, Bson::Document(spec))) = stage.iter().next() else {
			return Err(NoSQLError::InvalidOperation(
				"pipeline stage must be a single-key document".to_string(),
			));
		};
		if name != "$set" && name != "$addFields" {
			return Err(NoSQLError::InvalidOperation(format!(
				"Unsupported pipeline stage: {}",
				name
			)));
		}

		let mut values = Vec::new();
		for (path, expression) in spec {
			if let Some(value) = evaluate(expression, document, &HashMap::new())? {
				values.push((path.clone(), value));
			}
		}
		with_root(document, |root| {
			for (path, value) in &values {
				set_path(root, &split(path), value);
			}
		});
	}
	Ok(())
}

fn field_value(value: &Bson, parts: &[&str]) -> Option<Bson> {
	let mut current = value;
	for part in parts {
		match current {
			Bson::Document(document) => current = document.get(*part)?,
			_ => return None,
		}
	}
	Some(current.clone())
}

/// Evaluate an aggregation expression; `None` is a missing value.
fn evaluate(
	expression: &Bson,
	document: &Document,
	variables: &HashMap<String, Bson>,
) -> Result<Option<Bson>> {
	match expression {
		Bson::String(text) if text.starts_with("$$") => {
			let parts = split(&text[2..]);
			let Some((name, rest)) = parts.split_first() else {
				return Ok(None);
			};
			Ok(variables
				.get(*name)
				.and_then(|value| field_value(value, rest)))
		}
		Bson::String(text) if text.starts_with('$') => {
			let parts = split(&text[1..]);
			let Some((head, rest)) = parts.split_first() else {
				return Ok(None);
			};
			Ok(document.get(*head).and_then(|value| field_value(value, rest)))
		}
		Bson::Document(spec) => {
			if spec.len() == 1
				&& let Some((operator, argument)) = spec.iter().next()
				&& operator.starts_with('$')
			{
				return evaluate_operator(operator, argument, document, variables);
			}
			let mut result = Document::new();
			for (key, value) in spec {
				if let Some(value) = evaluate(value, document, variables)? {
					result.insert(key.clone(), value);
				}
			}
			Ok(Some(Bson::Document(result)))
		}
		Bson::Array(items) => {
			let mut result = Vec::with_capacity(items.len());
			for item in items {
				result.push(evaluate(item, document, variables)?.unwrap_or(Bson::Null));
			}
			Ok(Some(Bson::Array(result)))
		}
		literal => Ok(Some(literal.clone())),
	}
}

fn evaluate_operator(
	operator: &str,
	argument: &Bson,
	document: &Document,
	variables: &HashMap<String, Bson>,
) -> Result<Option<Bson>> {
	let target = match operator {
		"$toString" => Some("string"),
		"$toInt" => Some("int"),
		"$toLong" => Some("long"),
		"$toDouble" => Some("double"),
		"$toBool" => Some("bool"),
		"$toDate" => Some("date"),
		_ => None,
	};
	if let Some(target) = target {
		let input = evaluate(argument, document, variables)?.unwrap_or(Bson::Null);
		return convert(&input, target).map(Some).ok_or_else(|| {
			NoSQLError::ExecutionError(format!(
				"Failed to convert {} to {} in {}",
				input, target, operator
			))
		});
	}

	match operator {
		"$map" => {
			let spec = argument
				.as_document()
				.ok_or_else(|| NoSQLError::InvalidOperation("$map expects a document".to_string()))?;
			let alias = spec.get_str("as").unwrap_or("this").to_string();
			let body = spec.get("in").cloned().unwrap_or(Bson::Null);
			let input = match spec.get("input") {
				Some(input) => evaluate(input, document, variables)?,
				None => None,
			};
			match input {
				None | Some(Bson::Null) => Ok(Some(Bson::Null)),
				Some(Bson::Array(items)) => {
					let mut scope = variables.clone();
					let mut result = Vec::with_capacity(items.len());
					for item in items {
						scope.insert(alias.clone(), item);
						result.push(evaluate(&body, document, &scope)?.unwrap_or(Bson::Null));
					}
					Ok(Some(Bson::Array(result)))
				}
				Some(other) => Err(NoSQLError::ExecutionError(format!(
					"$map input must be an array, found {}",
					type_alias(&other)
				))),
			}
		}
		"$mergeObjects" => {
			let operands = match argument {
				Bson::Array(items) => items.clone(),
				single => vec![single.clone()],
			};
			let mut merged = Document::new();
			for operand in &operands {
				match evaluate(operand, document, variables)? {
					Some(Bson::Document(part)) => merged.extend(part),
					None | Some(Bson::Null) => {}
					Some(other) => {
						return Err(NoSQLError::ExecutionError(format!(
							"$mergeObjects requires object inputs, found {}",
							type_alias(&other)
						)));
					}
				}
			}
			Ok(Some(Bson::Document(merged)))
		}
		"$convert" => {
			let spec = argument.as_document().ok_or_else(|| {
				NoSQLError::InvalidOperation("$convert expects a document".to_string())
			})?;
			let target = spec.get_str("to").map_err(|_| {
				NoSQLError::InvalidOperation("$convert requires a 'to' type".to_string())
			})?;
			let input = match spec.get("input") {
				Some(input) => evaluate(input, document, variables)?,
				None => None,
			};
			let fallback = |key: &str| -> Result<Option<Bson>> {
				match spec.get(key) {
					Some(expression) => evaluate(expression, document, variables),
					None => Err(NoSQLError::ExecutionError(format!(
						"$convert failed and no {} was given",
						key
					))),
				}
			};
			match input {
				None | Some(Bson::Null) => fallback("onNull"),
				Some(value) => match convert(&value, target) {
					Some(converted) => Ok(Some(converted)),
					None => fallback("onError"),
				},
			}
		}
		other => Err(NoSQLError::InvalidOperation(format!(
			"Unsupported expression operator: {}",
			other
		))),
	}
}

fn as_i64(value: &Bson) -> Option<i64> {
	match value {
		Bson::Int32(n) => Some(i64::from(*n)),
		Bson::Int64(n) => Some(*n),
		Bson::Double(n) if n.is_finite() && n.abs() < 9.2e18 => Some(n.trunc() as i64),
		Bson::Boolean(flag) => Some(i64::from(*flag)),
		Bson::String(text) => text.trim().parse().ok(),
		_ => None,
	}
}

fn as_f64(value: &Bson) -> Option<f64> {
	match value {
		Bson::Int32(n) => Some(f64::from(*n)),
		Bson::Int64(n) => Some(*n as f64),
		Bson::Double(n) => Some(*n),
		Bson::Boolean(flag) => Some(if *flag { 1.0 } else { 0.0 }),
		Bson::String(text) => text.trim().parse().ok(),
		_ => None,
	}
}

/// Convert a value to the type named by a `$type` alias; `None` on failure.
fn convert(value: &Bson, target: &str) -> Option<Bson> {
	if *value == Bson::Null {
		return Some(Bson::Null);
	}
	match (target, value) {
		("string", Bson::String(text)) => Some(Bson::String(text.clone())),
		("string", Bson::Int32(n)) => Some(Bson::String(n.to_string())),
		("string", Bson::Int64(n)) => Some(Bson::String(n.to_string())),
		("string", Bson::Double(n)) => Some(Bson::String(n.to_string())),
		("string", Bson::Boolean(flag)) => Some(Bson::String(flag.to_string())),
		("string", Bson::DateTime(date)) => date.try_to_rfc3339_string().ok().map(Bson::String),
		("int", value) => as_i64(value)
			.and_then(|n| i32::try_from(n).ok())
			.map(Bson::Int32),
		("long", Bson::DateTime(date)) => Some(Bson::Int64(date.timestamp_millis())),
		("long", value) => as_i64(value).map(Bson::Int64),
		("double", Bson::DateTime(date)) => Some(Bson::Double(date.timestamp_millis() as f64)),
		("double", value) => as_f64(value).map(Bson::Double),
		("bool", Bson::String(_)) | ("bool", Bson::DateTime(_)) => Some(Bson::Boolean(true)),
		("bool", value) => as_f64(value).map(|n| Bson::Boolean(n != 0.0)),
		("date", Bson::DateTime(date)) => Some(Bson::DateTime(*date)),
		("date", Bson::Int64(n)) => Some(Bson::DateTime(DateTime::from_millis(*n))),
		("date", Bson::Double(n)) if n.is_finite() => {
			Some(Bson::DateTime(DateTime::from_millis(*n as i64)))
		}
		("date", Bson::String(text)) => DateTime::parse_rfc3339_str(text).ok().map(Bson::DateTime),
		_ => None,
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use bson::doc;
	use rstest::rstest;

	async fn seeded(documents: Vec<Document>) -> (InMemoryBackend, Box<dyn SchemaSession>) {
		let backend = InMemoryBackend::new();
		let mut session = backend.start_session().await.unwrap();
		for document in documents {
			session.insert_one("users", document).await.unwrap();
		}
		(backend, session)
	}

	fn documents(backend: &InMemoryBackend) -> Vec<Document> {
		backend.collection("users").unwrap().documents
	}

	#[rstest]
	#[tokio::test]
	async fn test_abort_restores_catalog() {
		// Arrange
		let (backend, mut session) = seeded(vec![doc! { "name": "a" }]).await;
		session.start_transaction().await.unwrap();
		session
			.create_collection("orders", CreateCollectionOptions::default())
			.await
			.unwrap();
		session.insert_one("users", doc! { "name": "b" }).await.unwrap();

		// Act
		session.abort_transaction().await.unwrap();

		// Assert
		assert_eq!(backend.collection_names(), vec!["users".to_string()]);
		assert_eq!(documents(&backend).len(), 1);
	}

	#[rstest]
	#[tokio::test]
	async fn test_set_through_arrays() {
		// Arrange
		let (backend, mut session) = seeded(vec![
			doc! { "items": [{ "price": 1 }, { "price": 2 }] },
			doc! { "other": true },
		])
		.await;

		// Act
		let modified = session
			.update_many(
				"users",
				doc! { "items": { "$type": "array" } },
				UpdateModifications::Document(doc! { "$set": { "items.$[].tax": 0.0 } }),
			)
			.await
			.unwrap();

		// Assert
		assert_eq!(modified, 1);
		assert_eq!(
			documents(&backend)[0],
			doc! { "items": [{ "price": 1, "tax": 0.0 }, { "price": 2, "tax": 0.0 }] }
		);
		assert_eq!(documents(&backend)[1], doc! { "other": true });
	}

	#[rstest]
	#[tokio::test]
	async fn test_unset_with_type_filter() {
		// Arrange
		let now = DateTime::now();
		let (backend, mut session) =
			seeded(vec![doc! { "age": now }, doc! { "age": 3 }]).await;

		// Act
		session
			.update_many(
				"users",
				doc! { "age": { "$type": "date" } },
				UpdateModifications::Document(doc! { "$unset": { "age": "" } }),
			)
			.await
			.unwrap();

		// Assert
		assert_eq!(documents(&backend), vec![doc! {}, doc! { "age": 3 }]);
	}

	#[rstest]
	#[tokio::test]
	async fn test_conversion_pipeline() {
		// Arrange
		let (backend, mut session) = seeded(vec![doc! {
			"info": { "score": 7, "label": "x" },
			"tags": [1, 2],
		}])
		.await;
		let pipeline = vec![doc! {
			"$set": {
				"info": { "$mergeObjects": ["$info", { "score": { "$toDouble": "$info.score" } }] },
				"tags": { "$map": { "input": "$tags", "as": "alias_1", "in": { "$toString": "$$alias_1" } } },
			}
		}];

		// Act
		session
			.update_many("users", doc! {}, UpdateModifications::Pipeline(pipeline))
			.await
			.unwrap();

		// Assert
		assert_eq!(
			documents(&backend)[0],
			doc! { "info": { "score": 7.0, "label": "x" }, "tags": ["1", "2"] }
		);
	}

	#[rstest]
	#[tokio::test]
	async fn test_strict_conversion_fails_and_convert_falls_back() {
		// Arrange
		let (_backend, mut session) = seeded(vec![doc! { "age": "old" }]).await;

		// Act
		let strict = session
			.update_many(
				"users",
				doc! {},
				UpdateModifications::Pipeline(vec![doc! { "$set": { "age": { "$toInt": "$age" } } }]),
			)
			.await;
		let forced = session
			.update_many(
				"users",
				doc! {},
				UpdateModifications::Pipeline(vec![doc! { "$set": { "age": {
					"$convert": { "input": "$age", "to": "int", "onError": null, "onNull": null }
				} } }]),
			)
			.await;

		// Assert
		assert!(matches!(strict, Err(NoSQLError::ExecutionError(_))));
		assert_eq!(forced.unwrap(), 1);
	}

	#[rstest]
	#[tokio::test]
	async fn test_injected_failure_and_log() {
		// Arrange
		let backend = InMemoryBackend::new();
		backend.fail_on("create_index", "users");
		let mut session = backend.start_session().await.unwrap();
		let model = IndexModel::builder().keys(doc! { "name": 1 }).build();

		// Act
		let result = session.create_index("users", model).await;

		// Assert
		assert!(result.is_err());
		assert_eq!(backend.operations(), vec!["create_index users".to_string()]);
	}

	#[rstest]
	#[tokio::test]
	async fn test_find_latest_by_string_order() {
		let (_backend, mut session) = seeded(vec![
			doc! { "id": "20240101_000000" },
			doc! { "id": "20240301_000000" },
			doc! { "id": "20240201_000000" },
		])
		.await;
		let latest = session.find_latest("users", "id").await.unwrap().unwrap();
		assert_eq!(latest.get_str("id").unwrap(), "20240301_000000");
	}
}
