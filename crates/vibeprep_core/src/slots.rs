//! crates/vibeprep_core/src/slots.rs
//!
//! Stored slot shapes and the merge rules applied to a day's slot list.
//!
//! Older documents keep slots as bare strings; newer ones as
//! `{"time_slot": ..., "task": ...}` objects. Storage adapters hand the raw
//! JSON array to `decode`, so the dual shape never leaves them. Writes always
//! use the object shape.

use std::collections::HashSet;

use serde_json::Value;
use tracing::warn;

use crate::domain::{Slot, Task};

/// A slot entry as it may appear in storage.
#[derive(Debug, Clone, PartialEq)]
pub enum StoredSlot {
    Legacy(String),
    WithTask { time_slot: String, task: Option<Task> },
}

impl StoredSlot {
    /// Reads one raw entry. `None` for entries that are neither a string nor an object.
    pub fn from_json(entry: Value) -> Option<Self> {
        match entry {
            Value::String(time_slot) => Some(StoredSlot::Legacy(time_slot)),
            Value::Object(mut fields) => {
                let time_slot = match fields.remove("time_slot") {
                    Some(Value::String(s)) => s,
                    _ => String::new(),
                };
                let task = fields.remove("task").and_then(decode_task);
                Some(StoredSlot::WithTask { time_slot, task })
            }
            _ => None,
        }
    }
}

impl From<StoredSlot> for Slot {
    fn from(stored: StoredSlot) -> Self {
        match stored {
            StoredSlot::Legacy(time_slot) => Slot::empty(time_slot),
            StoredSlot::WithTask { time_slot, task } => Slot { time_slot, task },
        }
    }
}

/// Normalizes a stored slot array entry by entry.
///
/// Strings become task-less slots, objects keep their `time_slot` and task,
/// anything else is skipped. A value that is not an array decodes to no slots.
pub fn decode(stored: Value) -> Vec<Slot> {
    match stored {
        Value::Array(entries) => entries
            .into_iter()
            .filter_map(StoredSlot::from_json)
            .map(Slot::from)
            .collect(),
        Value::Null => Vec::new(),
        other => {
            warn!(kind = json_kind(&other), "Stored slot list is not an array");
            Vec::new()
        }
    }
}

/// An empty or falsy task value means "no task". An undecodable one is dropped.
fn decode_task(raw: Value) -> Option<Task> {
    if is_falsy(&raw) {
        return None;
    }
    match serde_json::from_value(raw) {
        Ok(task) => Some(task),
        Err(e) => {
            warn!(error = %e, "Dropping undecodable stored task");
            None
        }
    }
}

fn is_falsy(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Drops entries whose `time_slot` is empty or whitespace.
pub fn visible(slots: Vec<Slot>) -> Vec<Slot> {
    slots.into_iter().filter(|s| !s.is_blank()).collect()
}

/// Appends the incoming slots whose `time_slot` is not yet taken.
///
/// Existing slots, and their tasks, are never modified. Within `incoming` the
/// first occurrence of a `time_slot` wins.
pub fn append_new(existing: Vec<Slot>, incoming: Vec<Slot>) -> Vec<Slot> {
    let mut taken: HashSet<String> = existing.iter().map(|s| s.time_slot.clone()).collect();
    let mut merged = existing;
    for slot in incoming {
        if taken.insert(slot.time_slot.clone()) {
            merged.push(slot);
        }
    }
    merged
}

/// Puts `task` on the slot named `time_slot`, replacing any previous task.
/// Returns `false` and leaves `slots` untouched if no such slot exists.
pub fn assign_task(slots: &mut [Slot], time_slot: &str, task: Task) -> bool {
    match slots.iter_mut().find(|s| s.time_slot == time_slot) {
        Some(slot) => {
            slot.task = Some(task);
            true
        }
        None => false,
    }
}

/// The first `time_slot` that occurs more than once, if any.
pub fn first_duplicate(slots: &[Slot]) -> Option<&str> {
    let mut seen = HashSet::new();
    slots
        .iter()
        .find(|s| !seen.insert(s.time_slot.as_str()))
        .map(|s| s.time_slot.as_str())
}
