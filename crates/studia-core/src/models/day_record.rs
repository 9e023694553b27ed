//! Day record model and lenient snapshot parsing

use std::fmt::Write as _;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::NoteEntry;
use crate::error::Error;

/// Field holding the note sequence.
pub const NOTES_FIELD: &str = "note";
/// Field holding the free-text memo.
pub const MEMO_FIELD: &str = "memo";
/// Field holding the reminder sequence.
pub const REMINDERS_FIELD: &str = "reminder";

/// Sparse sequences stored as numeric-keyed objects are re-expanded with holes
/// only below this index; beyond it entries are compacted in key order.
const MAX_SPARSE_INDEX: usize = 4096;

static HOLE: Value = Value::Null;

/// Log a field that is shown as empty because of its stored shape.
fn malformed(context: &str, reason: &str) {
    let error = Error::MalformedData {
        path: context.to_string(),
        reason: reason.to_string(),
    };
    tracing::warn!("{error}; showing it empty");
}

/// Notes, memo and reminders for one user on one day.
///
/// The default value is the empty day, which is also what an absent record
/// or an unreadable field turns into.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayRecord {
    pub notes: Vec<NoteEntry>,
    pub memo: String,
    pub reminders: Vec<String>,
}

impl DayRecord {
    /// Parse a snapshot value. `context` only labels log output.
    ///
    /// Never fails: each malformed field degrades to its empty value.
    #[must_use]
    pub fn from_snapshot(context: &str, value: Option<&Value>) -> Self {
        let Some(value) = value else {
            return Self::default();
        };
        let Value::Object(fields) = value else {
            malformed(context, "record is not an object");
            return Self::default();
        };

        Self {
            notes: parse_notes(context, fields),
            memo: parse_memo(context, fields),
            reminders: parse_reminders(context, fields),
        }
    }

    /// True when the day has nothing to show.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.notes.is_empty() && self.memo.is_empty() && self.reminders.is_empty()
    }

    /// Reminders joined one per bulleted line.
    #[must_use]
    pub fn reminder_lines(&self) -> String {
        let mut output = String::new();
        for (index, reminder) in self.reminders.iter().enumerate() {
            if index > 0 {
                output.push('\n');
            }
            let _ = write!(output, "• {reminder}");
        }
        output
    }

    /// Storage representation of the whole record.
    #[must_use]
    pub fn to_value(&self) -> Value {
        let mut fields = Map::new();
        if !self.notes.is_empty() {
            fields.insert(
                NOTES_FIELD.to_string(),
                Value::Array(self.notes.iter().map(note_to_value).collect()),
            );
        }
        fields.insert(MEMO_FIELD.to_string(), Value::String(self.memo.clone()));
        if !self.reminders.is_empty() {
            fields.insert(
                REMINDERS_FIELD.to_string(),
                Value::Array(self.reminders.iter().cloned().map(Value::String).collect()),
            );
        }
        Value::Object(fields)
    }
}

/// Storage representation of one note.
#[must_use]
pub fn note_to_value(note: &NoteEntry) -> Value {
    let mut fields = Map::new();
    fields.insert("subject".to_string(), Value::String(note.subject.clone()));
    fields.insert("content".to_string(), Value::String(note.content.clone()));
    Value::Object(fields)
}

/// Parse a stored note sequence, keeping every element at its position.
#[must_use]
pub fn parse_note_sequence(context: &str, value: &Value) -> Vec<NoteEntry> {
    parse_note_slots(context, value)
        .into_iter()
        .map(Option::unwrap_or_default)
        .collect()
}

/// Parse a stored note sequence slot by slot. Holes are `None`.
#[must_use]
pub fn parse_note_slots(context: &str, value: &Value) -> Vec<Option<NoteEntry>> {
    let Some(items) = sequence_items(value) else {
        malformed(context, "notes are not a sequence");
        return Vec::new();
    };

    items
        .into_iter()
        .enumerate()
        .map(|(index, item)| (!item.is_null()).then(|| parse_note(context, index, item)))
        .collect()
}

fn parse_notes(context: &str, fields: &Map<String, Value>) -> Vec<NoteEntry> {
    fields
        .get(NOTES_FIELD)
        .map(|value| parse_note_sequence(context, value))
        .unwrap_or_default()
}

fn parse_note(context: &str, index: usize, item: &Value) -> NoteEntry {
    let Value::Object(fields) = item else {
        malformed(context, &format!("note {index} is not an object"));
        return NoteEntry::default();
    };

    let text = |name: &str| match fields.get(name) {
        Some(Value::String(text)) => text.clone(),
        None => String::new(),
        Some(_) => {
            malformed(context, &format!("note {index} has a non-text {name}"));
            String::new()
        }
    };

    NoteEntry {
        subject: text("subject"),
        content: text("content"),
    }
}

fn parse_memo(context: &str, fields: &Map<String, Value>) -> String {
    match fields.get(MEMO_FIELD) {
        Some(Value::String(memo)) => memo.clone(),
        None => String::new(),
        Some(_) => {
            malformed(context, "memo is not text");
            String::new()
        }
    }
}

fn parse_reminders(context: &str, fields: &Map<String, Value>) -> Vec<String> {
    let Some(value) = fields.get(REMINDERS_FIELD) else {
        return Vec::new();
    };
    let Some(items) = sequence_items(value) else {
        malformed(context, "reminders are not a sequence");
        return Vec::new();
    };
    items.into_iter().map(display_string).collect()
}

/// Render any stored scalar the way it would print by default.
fn display_string(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Elements of an array, or of an object whose keys are all array indices.
fn sequence_items(value: &Value) -> Option<Vec<&Value>> {
    match value {
        Value::Array(items) => Some(items.iter().collect()),
        Value::Object(fields) if fields.is_empty() => Some(Vec::new()),
        Value::Object(fields) => {
            let mut indexed = fields
                .iter()
                .map(|(key, item)| key.parse::<usize>().ok().map(|index| (index, item)))
                .collect::<Option<Vec<_>>>()?;
            indexed.sort_by_key(|(index, _)| *index);

            let max_index = indexed.last().map_or(0, |(index, _)| *index);
            if max_index >= MAX_SPARSE_INDEX {
                return Some(indexed.into_iter().map(|(_, item)| item).collect());
            }

            let mut items = vec![&HOLE; max_index + 1];
            for (index, item) in indexed {
                items[index] = item;
            }
            Some(items)
        }
        _ => None,
    }
}
