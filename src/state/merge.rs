//! Partial-update application.

use crate::types::{Record, RecordId, RecordMap, RecordUpdate, RecordsDiff};
use serde_json::{Map, Value};

/// Merge `update` into `target`.
///
/// - `null` removes the field.
/// - Objects merge recursively into existing objects.
/// - Everything else (arrays included) replaces the old value wholesale.
pub fn merge_fields(target: &mut Map<String, Value>, update: &Map<String, Value>) {
    for (name, value) in update {
        match value {
            Value::Null => {
                target.remove(name);
            }
            Value::Object(nested) => {
                // Anything that is not already an object is replaced by a
                // fresh one, so nested nulls still mean "absent".
                let slot = target
                    .entry(name.clone())
                    .or_insert_with(|| Value::Object(Map::new()));
                if !slot.is_object() {
                    *slot = Value::Object(Map::new());
                }
                if let Value::Object(existing) = slot {
                    merge_fields(existing, nested);
                }
            }
            other => {
                target.insert(name.clone(), other.clone());
            }
        }
    }
}

/// Apply one record update. An absent record is created from the update.
///
/// The `id` key inside `update` is ignored; identifiers never change.
pub fn apply_update(existing: Option<&Record>, id: &RecordId, update: &RecordUpdate) -> Record {
    let mut record = existing.cloned().unwrap_or_else(|| Record::new(id.clone()));
    if update.contains_key("id") {
        let mut update = update.clone();
        update.remove("id");
        merge_fields(&mut record.fields, &update);
    } else {
        merge_fields(&mut record.fields, update);
    }
    record
}

/// Apply a whole diff to a snapshot, returning the new snapshot.
pub fn apply_diff(records: &RecordMap, diff: &RecordsDiff) -> RecordMap {
    let mut out = records.clone();
    for (id, update) in diff {
        match update {
            None => {
                out.remove(id);
            }
            Some(update) => {
                let merged = apply_update(out.get(id), id, update);
                out.insert(id.clone(), merged);
            }
        }
    }
    out
}
