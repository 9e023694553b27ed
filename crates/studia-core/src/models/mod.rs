//! Data models for Studia

mod day_record;
mod note;
mod settings;

pub use day_record::{
    note_to_value, parse_note_sequence, parse_note_slots, DayRecord, MEMO_FIELD, NOTES_FIELD, REMINDERS_FIELD,
};
pub use note::{NoteDraft, NoteEntry, SubjectChoice, PRESET_SUBJECTS};
pub use settings::Preferences;
