//! Action assembly
//!
//! Turns signed collections into the `Up` and `Down` action lists of a
//! migration.

use super::{Result, Sign, Signed, SyncError, SyncOptions, union};
use crate::migrations::action::{Action, SubAction};
use crate::schema::{Collection, Field};
use indexmap::IndexMap;

/// Compute the actions that take `existing` to `desired`, and back.
///
/// Returns `(up, down)`. Within every action the sub-actions follow
/// [`SubActionType::rank`](crate::migrations::action::SubActionType::rank);
/// the down list is in reverse collection order so undoing runs backwards.
pub fn get_actions(
	desired: &[Collection],
	existing: &[Collection],
	options: &SyncOptions,
) -> Result<(Vec<Action>, Vec<Action>)> {
	let signed = union(desired, existing, options)?;

	let mut up: IndexMap<String, Action> = IndexMap::new();
	let mut down: IndexMap<String, Action> = IndexMap::new();

	for entry in &signed {
		let name = entry.entity.metadata.name.clone();
		let (forward, backward) = sub_actions(entry)?;
		up.entry(name.clone())
			.or_insert_with(|| Action::new(name.clone()))
			.sub_actions
			.push(forward);
		down.entry(name.clone())
			.or_insert_with(|| Action::new(name))
			.sub_actions
			.push(backward);
	}

	let up = finish(up.into_values())?;
	let mut down = finish(down.into_values())?;
	down.reverse();
	Ok((up, down))
}

fn finish(actions: impl Iterator<Item = Action>) -> Result<Vec<Action>> {
	let mut result = Vec::new();
	for mut action in actions {
		action.sort();
		for sub_action in &action.sub_actions {
			sub_action.validate()?;
		}
		result.push(action);
	}
	Ok(result)
}

/// The `(up, down)` sub-action pair for one signed collection
fn sub_actions(entry: &Signed<Collection>) -> Result<(SubAction, SubAction)> {
	let collection = &entry.entity;
	let unexpected = || SyncError::UnexpectedSign {
		collection: collection.metadata.name.clone(),
		sign: entry.sign,
	};

	if !entry.is_intersection {
		return match entry.sign {
			Sign::Plus => Ok((
				SubAction::create_collection(collection),
				SubAction::drop_collection(collection),
			)),
			Sign::Minus => Ok((
				SubAction::drop_collection(collection),
				SubAction::create_collection(collection),
			)),
			Sign::Convert => Err(unexpected()),
		};
	}

	let metadata = collection.metadata.clone();

	if let Some(field) = collection.fields.first() {
		let depth = entry.depth;
		return match entry.sign {
			Sign::Plus => Ok((
				SubAction::create_field(metadata.clone(), field.clone(), depth),
				SubAction::drop_field(metadata, field.clone(), depth),
			)),
			Sign::Minus => Ok((
				SubAction::drop_field(metadata.clone(), field.clone(), depth),
				SubAction::create_field(metadata, field.clone(), depth),
			)),
			Sign::Convert => {
				let from = entry
					.convert_from
					.as_ref()
					.and_then(|from| from.fields.first())
					.and_then(|from: &Field| from.at_depth(depth))
					.map(|node| node.field_type)
					.ok_or_else(unexpected)?;
				let up = SubAction::convert_field(metadata, field.clone(), from, depth);
				let down = up.inverse();
				Ok((up, down))
			}
		};
	}

	if let Some(index) = collection.indexes.first() {
		return match entry.sign {
			Sign::Plus => Ok((
				SubAction::create_index(metadata.clone(), index.clone()),
				SubAction::drop_index(metadata, index.clone()),
			)),
			Sign::Minus => Ok((
				SubAction::drop_index(metadata.clone(), index.clone()),
				SubAction::create_index(metadata, index.clone()),
			)),
			Sign::Convert => Err(unexpected()),
		};
	}

	Err(unexpected())
}
