//! Migration generation

use super::action::SubActionType;
use super::history::reconstruct;
use super::migration::{Migration, next_id};
use super::{MigrationOptions, Result};
use crate::schema::{Collection, Field, validate};
use crate::sync::{get_actions, is_lossy_conversion};
use chrono::{DateTime, Utc};

/// Emits the migration that takes the recorded history to a declared schema
pub struct MigrationGenerator<'a> {
	options: &'a MigrationOptions,
}

impl<'a> MigrationGenerator<'a> {
	pub fn new(options: &'a MigrationOptions) -> Self {
		Self { options }
	}

	/// Diff `desired` against the replay of `history`.
	///
	/// Returns `None` when the history already describes `desired`.
	pub fn generate(
		&self,
		desired: &[Collection],
		history: &[Migration],
		now: DateTime<Utc>,
	) -> Result<Option<Migration>> {
		validate(desired)?;

		let mut desired = desired.to_vec();
		if self.options.use_sorted_schema {
			Collection::sort_all(&mut desired);
		}

		let existing = reconstruct(history)?;
		let drift = nullable_drift(&desired, &existing);
		if !drift.is_empty() {
			tracing::warn!(
				fields = ?drift,
				"nullable changes are not migrated; validators keep the recorded nullability"
			);
		}
		let (up, down) = get_actions(&desired, &existing, &self.options.sync_options())?;

		let latest = history.iter().map(|m| m.id.as_str()).max();
		let migration = Migration {
			id: next_id(now, latest),
			desc: self.options.desc.clone(),
			up,
			down,
		};

		if migration.is_empty() {
			tracing::info!("no changes detected");
			return Ok(None);
		}

		warn_lossy_conversions(&migration);
		tracing::info!(
			migration = %migration.id,
			actions = migration.up.len(),
			sub_actions = migration.len(),
			"migration generated"
		);
		Ok(Some(migration))
	}
}

/// Paths whose declared `nullable` differs from the recorded one.
///
/// The diff engine ignores `nullable`, so these never reach a migration.
pub(crate) fn nullable_drift(desired: &[Collection], existing: &[Collection]) -> Vec<String> {
	let mut drift = Vec::new();
	for collection in desired {
		let name = &collection.metadata.name;
		if let Some(current) = existing.iter().find(|c| &c.metadata.name == name) {
			collect_drift(name, &collection.fields, &current.fields, &mut drift);
		}
	}
	drift
}

fn collect_drift(prefix: &str, desired: &[Field], existing: &[Field], drift: &mut Vec<String>) {
	for field in desired {
		let Some(current) = existing
			.iter()
			.find(|f| f.name == field.name && f.field_type == field.field_type)
		else {
			continue;
		};
		let path = if field.name.is_empty() {
			format!("{}.[]", prefix)
		} else {
			format!("{}.{}", prefix, field.name)
		};
		if field.nullable != current.nullable {
			drift.push(path.clone());
		}
		collect_drift(&path, &field.children, &current.children, drift);
	}
}

/// Log every conversion, in either direction, that can lose stored data.
fn warn_lossy_conversions(migration: &Migration) {
	for (direction, actions) in [("up", &migration.up), ("down", &migration.down)] {
		for action in actions {
			for sub_action in &action.sub_actions {
				if sub_action.action_type != SubActionType::ConvertField {
					continue;
				}
				let (Some(from), Some(to)) = (
					sub_action.schema.convert_from,
					sub_action.schema.target_field(),
				) else {
					continue;
				};
				if is_lossy_conversion(from, to.field_type) {
					tracing::warn!(
						migration = %migration.id,
						direction,
						collection = %action.collection,
						from = %from,
						to = %to.field_type,
						"conversion may overflow or truncate stored values"
					);
				}
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::migrations::MigrationError;
	use crate::schema::{Field, Metadata};
	use chrono::TimeZone;
	use rstest::{fixture, rstest};

	#[fixture]
	fn now() -> DateTime<Utc> {
		Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
	}

	#[rstest]
	fn test_generate_then_nothing(now: DateTime<Utc>) {
		// Arrange
		let options = MigrationOptions::default();
		let generator = MigrationGenerator::new(&options);
		let desired = vec![Collection::new(Metadata::new("users")).field(Field::string("name"))];

		// Act
		let first = generator.generate(&desired, &[], now).unwrap().unwrap();
		let second = generator.generate(&desired, &[first.clone()], now).unwrap();

		// Assert
		assert_eq!(first.id, "20240301_120000");
		assert!(second.is_none());
	}

	#[rstest]
	fn test_nullable_only_change_generates_nothing(now: DateTime<Utc>) {
		// Arrange
		let options = MigrationOptions::default();
		let generator = MigrationGenerator::new(&options);
		let v1 = vec![Collection::new(Metadata::new("users")).field(Field::string("name"))];
		let v2 = vec![Collection::new(Metadata::new("users")).field(Field::string("name").nullable())];
		let first = generator.generate(&v1, &[], now).unwrap().unwrap();

		// Act
		let second = generator.generate(&v2, &[first], now).unwrap();

		// Assert
		assert!(second.is_none());
	}

	#[rstest]
	fn test_nullable_drift_reports_nested_paths() {
		// Arrange
		let desired = vec![
			Collection::new(Metadata::new("users"))
				.field(Field::string("name").nullable())
				.field(Field::array("tags", Field::string("").nullable()))
				.field(Field::int32("age")),
		];
		let existing = vec![
			Collection::new(Metadata::new("users"))
				.field(Field::string("name"))
				.field(Field::array("tags", Field::string("")))
				.field(Field::int64("age").nullable()),
		];

		// Act
		let drift = nullable_drift(&desired, &existing);

		// Assert
		assert_eq!(drift, vec!["users.name", "users.tags.[]"]);
	}

	#[rstest]
	fn test_id_follows_history(now: DateTime<Utc>) {
		// Arrange
		let options = MigrationOptions::default();
		let generator = MigrationGenerator::new(&options);
		let v1 = vec![Collection::new(Metadata::new("users"))];
		let v2 = vec![Collection::new(Metadata::new("users")).field(Field::string("name"))];
		let first = generator.generate(&v1, &[], now).unwrap().unwrap();

		// Act
		let second = generator.generate(&v2, &[first], now).unwrap().unwrap();

		// Assert
		assert_eq!(second.id, "20240301_120001");
	}

	#[rstest]
	fn test_invalid_schema_is_rejected(now: DateTime<Utc>) {
		// Arrange
		let options = MigrationOptions::default();
		let desired = vec![Collection::new(Metadata::new(crate::schema::HISTORY_COLLECTION))];

		// Act
		let result = MigrationGenerator::new(&options).generate(&desired, &[], now);

		// Assert
		assert!(matches!(result, Err(MigrationError::Schema(_))));
	}

	#[rstest]
	fn test_sorted_schema_ignores_declaration_order(now: DateTime<Utc>) {
		// Arrange
		let options = MigrationOptions {
			use_sorted_schema: true,
			..MigrationOptions::default()
		};
		let generator = MigrationGenerator::new(&options);
		let a = vec![
			Collection::new(Metadata::new("b")).fields([Field::string("y"), Field::string("x")]),
			Collection::new(Metadata::new("a")),
		];
		let b = vec![
			Collection::new(Metadata::new("a")),
			Collection::new(Metadata::new("b")).fields([Field::string("x"), Field::string("y")]),
		];

		// Act
		let from_a = generator.generate(&a, &[], now).unwrap().unwrap();
		let from_b = generator.generate(&b, &[], now).unwrap().unwrap();

		// Assert
		assert_eq!(from_a, from_b);
		assert_eq!(from_a.up[0].collection, "a");
	}
}
