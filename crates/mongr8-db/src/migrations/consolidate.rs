//! History compaction

use super::history::reconstruct;
use super::migration::Migration;
use super::Result;
use crate::sync::{SyncOptions, get_actions};

/// Fold a whole history into one migration.
///
/// The result creates the replayed schema from nothing and drops it on the
/// way down. It takes the last history ID, so a database already at that
/// watermark skips it while a fresh database gets the full schema in one
/// step. Returns `None` for an empty history.
pub fn consolidate(history: &[Migration]) -> Result<Option<Migration>> {
	let Some(latest) = history.iter().map(|m| m.id.as_str()).max() else {
		return Ok(None);
	};

	let collections = reconstruct(history)?;
	let (up, down) = get_actions(&collections, &[], &SyncOptions::default())?;

	tracing::info!(
		migrations = history.len(),
		collections = collections.len(),
		migration = %latest,
		"history consolidated"
	);

	Ok(Some(Migration {
		id: latest.to_string(),
		desc: format!("consolidation of {} migrations", history.len()),
		up,
		down,
	}))
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::migrations::{MigrationGenerator, MigrationOptions};
	use crate::migrations::action::SubActionType;
	use crate::migrations::history::same_schema;
	use crate::schema::{Collection, Field, Index, Metadata};
	use chrono::{TimeZone, Utc};
	use rstest::rstest;

	#[rstest]
	fn test_consolidated_history_replays_to_same_schema() {
		// Arrange
		let options = MigrationOptions::default();
		let generator = MigrationGenerator::new(&options);
		let now = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
		let v1 = vec![Collection::new(Metadata::new("users")).field(Field::int32("age"))];
		let v2 = vec![
			Collection::new(Metadata::new("users"))
				.field(Field::double("age"))
				.field(Field::string("name"))
				.index(Index::single_field("name", 1)),
		];
		let m1 = generator.generate(&v1, &[], now).unwrap().unwrap();
		let m2 = generator.generate(&v2, &[m1.clone()], now).unwrap().unwrap();
		let history = vec![m1, m2.clone()];

		// Act
		let merged = consolidate(&history).unwrap().unwrap();

		// Assert
		assert_eq!(merged.id, m2.id);
		assert_eq!(merged.len(), 1);
		assert_eq!(
			merged.up[0].sub_actions[0].action_type,
			SubActionType::CreateCollection
		);
		let replayed = reconstruct(&[merged]).unwrap();
		assert!(same_schema(&replayed, &v2));
	}

	#[rstest]
	fn test_empty_history() {
		assert!(consolidate(&[]).unwrap().is_none());
	}
}
