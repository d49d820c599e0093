//! Migration executor
//!
//! Applies pending migrations through a [`SchemaBackend`]. Every migration is
//! its own unit: its sub-actions and its history entry share one session
//! transaction, so a failure leaves neither behind.
//!
//! Every driver call races the invocation deadline and the cancellation
//! token; losing either race aborts the open transaction.

use super::action::{Action, SubAction, SubActionType};
use super::history::{HistoryState, reconstruct};
use super::migration::Migration;
use super::pipeline::{
	array_guard, convert_pipeline, exists_filter, set_update, type_filter, unset_update,
	update_path,
};
use super::{MigrationError, MigrationOptions, Result, RollbackStatus};
use crate::dictionary::{exemplar, index_model, json_schema, json_to_bson};
use crate::nosql::{self, SchemaBackend, SchemaSession};
use crate::schema::{CollectionKind, Field, FieldType, HISTORY_COLLECTION};
use crate::version::Version;
use bson::{Bson, DateTime, Document};
use mongodb::options::{CreateCollectionOptions, UpdateModifications};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Time allowed for one whole `apply` invocation
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Lifecycle of one sub-action, logged at `debug`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubActionState {
	Pending,
	Executing,
	Completed,
	Failed,
}

/// What an `apply` invocation did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplyReport {
	/// IDs applied by this invocation, in order
	pub applied: Vec<String>,
	/// IDs at or below the watermark
	pub skipped: Vec<String>,
	/// Highest applied ID after the invocation
	pub watermark: Option<String>,
}

pub struct MigrationExecutor {
	backend: Arc<dyn SchemaBackend>,
	options: MigrationOptions,
	timeout: Duration,
	cancellation: CancellationToken,
	history_collection: String,
}

impl MigrationExecutor {
	pub fn new(backend: impl SchemaBackend + 'static, options: MigrationOptions) -> Self {
		Self::from_shared(Arc::new(backend), options)
	}

	pub fn from_shared(backend: Arc<dyn SchemaBackend>, options: MigrationOptions) -> Self {
		Self {
			backend,
			options,
			timeout: DEFAULT_TIMEOUT,
			cancellation: CancellationToken::new(),
			history_collection: HISTORY_COLLECTION.to_string(),
		}
	}

	pub fn with_timeout(mut self, timeout: Duration) -> Self {
		self.timeout = timeout;
		self
	}

	pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
		self.cancellation = token;
		self
	}

	/// Record applied migrations in `name` instead of [`HISTORY_COLLECTION`]
	pub fn with_history_collection(mut self, name: impl Into<String>) -> Self {
		self.history_collection = name.into();
		self
	}

	pub fn options(&self) -> &MigrationOptions {
		&self.options
	}

	/// Apply every migration whose ID is above the recorded watermark.
	///
	/// The whole history is replayed first; a corrupt history fails before
	/// any database call is made.
	pub async fn apply(&self, migrations: &[Migration]) -> Result<ApplyReport> {
		let deadline = Instant::now() + self.timeout;
		reconstruct(migrations)?;

		let mut ordered: Vec<&Migration> = migrations.iter().collect();
		ordered.sort_by(|a, b| a.id.cmp(&b.id));

		let mut session = self.guard(deadline, self.backend.start_session()).await?;
		let watermark = self.read_watermark(session.as_mut(), deadline).await?;
		tracing::info!(
			backend = self.backend.backend_name(),
			watermark = watermark.as_deref().unwrap_or(""),
			migrations = ordered.len(),
			"applying migrations"
		);

		let mut report = ApplyReport {
			watermark: watermark.clone(),
			..ApplyReport::default()
		};
		let mut state = HistoryState::new();
		for migration in ordered {
			state.apply(migration)?;

			if watermark
				.as_deref()
				.is_some_and(|applied| migration.id.as_str() <= applied)
			{
				tracing::debug!(migration = %migration.id, "already applied, skipping");
				report.skipped.push(migration.id.clone());
				continue;
			}

			self.apply_migration(session.as_mut(), migration, &state, deadline)
				.await?;
			tracing::info!(
				migration = %migration.id,
				sub_actions = migration.len(),
				"migration applied"
			);
			report.applied.push(migration.id.clone());
			report.watermark = Some(migration.id.clone());
		}
		Ok(report)
	}

	async fn read_watermark(
		&self,
		session: &mut dyn SchemaSession,
		deadline: Instant,
	) -> Result<Option<String>> {
		let Some(latest) = self
			.guard(deadline, session.find_latest(&self.history_collection, "id"))
			.await?
		else {
			return Ok(None);
		};

		if let Ok(recorded) = latest.get_str("version") {
			match recorded.parse::<Version>() {
				Ok(recorded) if !Version::current().is_at_least(&recorded) => {
					tracing::warn!(
						recorded = %recorded,
						current = %Version::current(),
						"history was written by a newer version"
					);
				}
				Ok(_) => {}
				Err(e) => tracing::warn!(error = %e, "unreadable version in history"),
			}
		}

		latest
			.get_str("id")
			.map(|id| Some(id.to_string()))
			.map_err(|_| {
				MigrationError::CorruptHistory(format!(
					"{} entry without a string id",
					self.history_collection
				))
			})
	}

	/// Run one migration and record it, inside a transaction if enabled.
	async fn apply_migration(
		&self,
		session: &mut dyn SchemaSession,
		migration: &Migration,
		state: &HistoryState,
		deadline: Instant,
	) -> Result<()> {
		let transactional = self.options.use_transaction;
		let mut in_transaction = false;

		let result: Result<()> = async {
			if transactional {
				self.guard(deadline, session.start_transaction()).await?;
				in_transaction = true;
			}
			for action in &migration.up {
				self.run_action(session, migration, action, deadline).await?;
			}
			if self.options.use_schema_validation {
				self.refresh_validators(session, migration, state, deadline)
					.await?;
			}
			self.record(session, migration, deadline).await?;
			if transactional {
				self.guard(deadline, session.commit_transaction()).await?;
				in_transaction = false;
			}
			Ok(())
		}
		.await;

		let Err(error) = result else {
			return Ok(());
		};

		let rollback = if in_transaction {
			match session.abort_transaction().await {
				Ok(()) => RollbackStatus::Ok,
				Err(e) => {
					tracing::warn!(migration = %migration.id, error = %e, "abort failed");
					RollbackStatus::Failed
				}
			}
		} else {
			RollbackStatus::Skipped
		};
		tracing::warn!(
			migration = %migration.id,
			rollback = %rollback,
			error = %error,
			"migration failed"
		);
		Err(MigrationError::Apply {
			migration: migration.id.clone(),
			rollback,
			source: Box::new(error),
		})
	}

	async fn run_action(
		&self,
		session: &mut dyn SchemaSession,
		migration: &Migration,
		action: &Action,
		deadline: Instant,
	) -> Result<()> {
		for sub_action in &action.sub_actions {
			log_state(migration, sub_action, SubActionState::Pending);
		}
		for sub_action in &action.sub_actions {
			log_state(migration, sub_action, SubActionState::Executing);
			match self.execute(session, action, sub_action, deadline).await {
				Ok(()) => log_state(migration, sub_action, SubActionState::Completed),
				Err(e) => {
					log_state(migration, sub_action, SubActionState::Failed);
					return Err(e);
				}
			}
		}
		Ok(())
	}

	async fn execute(
		&self,
		session: &mut dyn SchemaSession,
		action: &Action,
		sub_action: &SubAction,
		deadline: Instant,
	) -> Result<()> {
		sub_action.validate()?;
		let schema = &sub_action.schema;
		let collection = sub_action.collection();
		let depth = schema.depth;

		match sub_action.action_type {
			SubActionType::CreateCollection => {
				let options = self.collection_options(sub_action);
				self.guard(deadline, session.create_collection(collection, options))
					.await?;
				if schema.metadata.kind == CollectionKind::View {
					return Ok(());
				}
				self.guard(
					deadline,
					session.insert_one(collection, exemplar(&schema.fields)),
				)
				.await?;
				for index in &schema.indexes {
					self.guard(deadline, session.create_index(collection, index_model(index)?))
						.await?;
				}
			}
			SubActionType::CreateField => {
				let field = first_field(sub_action)?;
				self.guard(
					deadline,
					session.update_many(
						collection,
						array_guard(field, depth),
						UpdateModifications::Document(set_update(field, depth)),
					),
				)
				.await?;
			}
			SubActionType::DropField => {
				let field = first_field(sub_action)?;
				let path = update_path(field, depth);
				let filter = if let Some(created) = recreated_in(action, &path) {
					if path.ends_with("$[]") {
						// The elements were already overwritten by the new prototype.
						return Ok(());
					}
					let dropped = schema
						.target_field()
						.map(|target| target.field_type)
						.unwrap_or(field.field_type);
					if dropped.bson_alias() == created.bson_alias() {
						// `$type` cannot tell the new value from the old one, and `$set`
						// has already replaced it.
						return Ok(());
					}
					type_filter(field, depth, dropped)
				} else {
					array_guard(field, depth)
				};
				self.guard(
					deadline,
					session.update_many(
						collection,
						filter,
						UpdateModifications::Document(unset_update(field, depth)),
					),
				)
				.await?;
			}
			SubActionType::ConvertField => {
				let field = first_field(sub_action)?;
				let from = schema.convert_from.ok_or_else(|| {
					MigrationError::InvalidMigration(format!(
						"ConvertField on '{}' without a source type",
						collection
					))
				})?;
				self.guard(
					deadline,
					session.update_many(
						collection,
						exists_filter(field, depth),
						UpdateModifications::Pipeline(convert_pipeline(field, from, depth)),
					),
				)
				.await?;
			}
			SubActionType::CreateIndex => {
				for index in &schema.indexes {
					self.guard(deadline, session.create_index(collection, index_model(index)?))
						.await?;
				}
			}
			SubActionType::DropIndex => {
				for index in &schema.indexes {
					self.guard(deadline, session.drop_index(collection, &index.name()))
						.await?;
				}
			}
			SubActionType::DropCollection => {
				self.guard(deadline, session.drop_collection(collection))
					.await?;
			}
		}
		Ok(())
	}

	fn collection_options(&self, sub_action: &SubAction) -> CreateCollectionOptions {
		let metadata = &sub_action.schema.metadata;
		let mut options = CreateCollectionOptions::default();

		if let Some(size) = metadata.options.capped_size {
			options.capped = Some(true);
			options.size = Some(size);
		}
		if let Some(seconds) = metadata.options.expire_after_seconds {
			options.expire_after_seconds = Some(Duration::from_secs(seconds));
		}
		if let Some(view_on) = &metadata.options.view_on {
			options.view_on = Some(view_on.clone());
			options.pipeline = metadata.options.pipeline.as_ref().map(|stages| {
				stages
					.iter()
					.filter_map(|stage| match json_to_bson(stage) {
						Bson::Document(stage) => Some(stage),
						_ => None,
					})
					.collect()
			});
		}
		if self.options.use_schema_validation && metadata.kind != CollectionKind::View {
			options.validator = Some(json_schema(&sub_action.schema.fields));
		}
		options
	}

	/// `collMod` every surviving collection whose fields this migration changed
	///
	/// Validators follow the replayed history. A declared `nullable` change
	/// alone produces no migration, so it never reaches this point.
	async fn refresh_validators(
		&self,
		session: &mut dyn SchemaSession,
		migration: &Migration,
		state: &HistoryState,
		deadline: Instant,
	) -> Result<()> {
		for action in &migration.up {
			let fields_changed = action
				.sub_actions
				.iter()
				.any(|sub| sub.action_type.is_field_operation());
			let created = action
				.sub_actions
				.iter()
				.any(|sub| sub.action_type == SubActionType::CreateCollection);
			if !fields_changed || created {
				continue;
			}
			let Some(collection) = state.get(&action.collection) else {
				continue;
			};
			if collection.metadata.kind == CollectionKind::View {
				continue;
			}
			tracing::debug!(collection = %action.collection, "refreshing validator");
			self.guard(
				deadline,
				session.update_validator(&action.collection, json_schema(&collection.fields)),
			)
			.await?;
		}
		Ok(())
	}

	async fn record(
		&self,
		session: &mut dyn SchemaSession,
		migration: &Migration,
		deadline: Instant,
	) -> Result<()> {
		let mut entry = Document::new();
		entry.insert("id", migration.id.clone());
		entry.insert("desc", migration.desc.clone());
		entry.insert("applied_at", DateTime::now());
		entry.insert("version", Version::current().to_string());
		self.guard(deadline, session.insert_one(&self.history_collection, entry))
			.await
	}

	/// Race a driver call against the deadline and the cancellation token.
	async fn guard<T>(
		&self,
		deadline: Instant,
		call: impl Future<Output = nosql::Result<T>>,
	) -> Result<T> {
		tokio::select! {
			biased;
			_ = self.cancellation.cancelled() => {
				Err(MigrationError::Cancelled("cancellation requested".to_string()))
			}
			result = tokio::time::timeout_at(deadline, call) => match result {
				Ok(result) => Ok(result?),
				Err(_) => Err(MigrationError::Cancelled(format!(
					"deadline of {:?} exceeded",
					self.timeout
				))),
			},
		}
	}
}

fn first_field(sub_action: &SubAction) -> Result<&Field> {
	sub_action.schema.fields.first().ok_or_else(|| {
		MigrationError::InvalidMigration(format!(
			"{} on '{}' without a field",
			sub_action.action_type,
			sub_action.collection()
		))
	})
}

/// Kind written at `path` by a `CreateField` of the same action
fn recreated_in(action: &Action, path: &str) -> Option<FieldType> {
	action.sub_actions.iter().find_map(|other| {
		if other.action_type != SubActionType::CreateField {
			return None;
		}
		let field = other.schema.fields.first()?;
		if update_path(field, other.schema.depth) != path {
			return None;
		}
		other.schema.target_field().map(|target| target.field_type)
	})
}

fn log_state(migration: &Migration, sub_action: &SubAction, state: SubActionState) {
	tracing::debug!(
		migration = %migration.id,
		collection = %sub_action.collection(),
		action = %sub_action.action_type,
		state = ?state,
		"sub-action"
	);
}
