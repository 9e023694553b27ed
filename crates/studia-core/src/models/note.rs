//! Note model

use serde::{Deserialize, Serialize};

/// Subjects offered by the note editor before falling back to free text.
pub const PRESET_SUBJECTS: [&str; 3] = ["국어", "영어", "수학"];

/// A subject note inside a day record.
///
/// Notes have no identifier of their own: their position in the day's
/// sequence is what edits and deletes address.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteEntry {
    /// Subject label, e.g. a course name
    pub subject: String,
    /// Note body
    pub content: String,
}

impl NoteEntry {
    /// Create a note entry
    #[must_use]
    pub fn new(subject: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            content: content.into(),
        }
    }

    /// Check if note content is empty (whitespace-only counts as empty)
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.content.trim().is_empty()
    }
}

/// Subject picked in the note editor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubjectChoice {
    /// One of the preset subjects
    Preset(String),
    /// Use the free-text "other subject" buffer
    Other,
}

impl Default for SubjectChoice {
    fn default() -> Self {
        Self::Preset(PRESET_SUBJECTS[0].to_string())
    }
}

/// Unsaved note edit state, kept apart from the displayed record until commit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NoteDraft {
    pub subject: SubjectChoice,
    pub other_subject: String,
    pub content: String,
}

impl NoteDraft {
    /// Seed a draft from an existing note, mapping unknown subjects to `Other`.
    #[must_use]
    pub fn from_entry(entry: &NoteEntry) -> Self {
        if PRESET_SUBJECTS.contains(&entry.subject.as_str()) {
            Self {
                subject: SubjectChoice::Preset(entry.subject.clone()),
                other_subject: String::new(),
                content: entry.content.clone(),
            }
        } else {
            Self {
                subject: SubjectChoice::Other,
                other_subject: entry.subject.clone(),
                content: entry.content.clone(),
            }
        }
    }

    /// The subject that will be stored.
    #[must_use]
    pub fn resolved_subject(&self) -> String {
        match &self.subject {
            SubjectChoice::Preset(subject) => subject.clone(),
            SubjectChoice::Other => self.other_subject.trim().to_string(),
        }
    }

    /// Build the entry this draft commits.
    #[must_use]
    pub fn to_entry(&self) -> NoteEntry {
        NoteEntry::new(self.resolved_subject(), self.content.clone())
    }

    /// Whether committing this draft would be discarded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.content.trim().is_empty()
    }
}
