//! Day record rendering shared by front ends.

use std::fmt::Write as _;

use serde::{Deserialize, Serialize};

use crate::date_key::DateKey;
use crate::models::{DayRecord, NoteEntry};

/// Output format for a rendered day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExportFormat {
    Json,
    Markdown,
}

impl ExportFormat {
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Markdown => "md",
        }
    }
}

/// Serializable day representation used in JSON output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportDay {
    pub date: DateKey,
    pub label: String,
    pub notes: Vec<NoteEntry>,
    pub memo: String,
    pub reminders: Vec<String>,
}

#[must_use]
pub fn day_to_export_item(date: DateKey, record: &DayRecord) -> ExportDay {
    ExportDay {
        date,
        label: date.display_label(),
        notes: record.notes.clone(),
        memo: record.memo.clone(),
        reminders: record.reminders.clone(),
    }
}

/// Render a day as pretty-printed JSON.
pub fn render_json_day(date: DateKey, record: &DayRecord) -> serde_json::Result<String> {
    serde_json::to_string_pretty(&day_to_export_item(date, record))
}

/// Render a day as Markdown: a heading, numbered notes, memo and reminders.
#[must_use]
pub fn render_markdown_day(date: DateKey, record: &DayRecord) -> String {
    let mut output = String::new();
    let _ = writeln!(output, "# {}", date.display_label());

    if !record.notes.is_empty() {
        let _ = writeln!(output);
        let _ = writeln!(output, "## Notes");
        for (index, note) in record.notes.iter().enumerate() {
            let subject = if note.subject.is_empty() {
                "-"
            } else {
                note.subject.as_str()
            };
            let _ = writeln!(output, "{index}. **{subject}** {}", note.content);
        }
    }

    if !record.memo.is_empty() {
        let _ = writeln!(output);
        let _ = writeln!(output, "## Memo");
        let _ = writeln!(output, "{}", record.memo);
    }

    if !record.reminders.is_empty() {
        let _ = writeln!(output);
        let _ = writeln!(output, "## Reminders");
        let _ = writeln!(output, "{}", record.reminder_lines());
    }

    if record.is_empty() {
        let _ = writeln!(output);
        let _ = writeln!(output, "_Nothing recorded._");
    }

    output
}

/// Render a day in the selected format.
pub fn render_day(
    date: DateKey,
    record: &DayRecord,
    format: ExportFormat,
) -> serde_json::Result<String> {
    match format {
        ExportFormat::Json => render_json_day(date, record),
        ExportFormat::Markdown => Ok(render_markdown_day(date, record)),
    }
}

/// Deterministic default file name for a rendered day.
#[must_use]
pub fn suggested_export_file_name(date: DateKey, format: ExportFormat) -> String {
    format!("studia-{}.{}", date.as_storage_key(), format.extension())
}
