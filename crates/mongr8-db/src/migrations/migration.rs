//! Migration definition

use super::action::Action;
use chrono::{DateTime, NaiveDateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

/// Layout of migration IDs
pub const ID_FORMAT: &str = "%Y%m%d_%H%M%S";

/// A migration: paired `up` and `down` action lists
///
/// `down` undoes `up` exactly. Migrations are never modified once written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Migration {
	/// Sortable identifier (`YYYYMMDD_HHMMSS`)
	pub id: String,

	#[serde(default)]
	pub desc: String,

	#[serde(default)]
	pub up: Vec<Action>,

	#[serde(default)]
	pub down: Vec<Action>,
}

impl Migration {
	pub fn new(id: impl Into<String>, desc: impl Into<String>) -> Self {
		Self {
			id: id.into(),
			desc: desc.into(),
			up: Vec::new(),
			down: Vec::new(),
		}
	}

	/// Number of `up` sub-actions
	pub fn len(&self) -> usize {
		self.up.iter().map(|action| action.sub_actions.len()).sum()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}
}

/// ID for a migration generated at `now`.
///
/// IDs stay strictly ascending: when `now` does not sort after `latest`, the
/// result is `latest` plus one second.
pub fn next_id(now: DateTime<Utc>, latest: Option<&str>) -> String {
	let candidate = now.format(ID_FORMAT).to_string();
	let Some(latest) = latest else {
		return candidate;
	};
	if candidate.as_str() > latest {
		return candidate;
	}
	match NaiveDateTime::parse_from_str(latest, ID_FORMAT) {
		Ok(parsed) => (parsed + TimeDelta::seconds(1)).format(ID_FORMAT).to_string(),
		// Not an ID this crate wrote
		Err(_) => candidate,
	}
}
