//! How local edits turn into scoped partial writes.
//!
//! Notes are addressed by position. Adding appends at the length the user
//! was looking at; a concurrent append from another device may land on the
//! same slot, in which case the later write wins. Deleting always splices a
//! fresh copy of the sequence.

use crate::date_key::DateKey;
use crate::error::Result;
use crate::models::{DayRecord, NoteDraft};
use crate::repository::RecordRepository;
use crate::store::{MemoryBackend, RemoteBackend, WriteAck};

/// Turns committed edits into repository writes.
pub struct ReconciliationPolicy<B: RemoteBackend = MemoryBackend> {
    repository: RecordRepository<B>,
}

impl<B: RemoteBackend> ReconciliationPolicy<B> {
    #[must_use]
    pub const fn new(repository: RecordRepository<B>) -> Self {
        Self { repository }
    }

    #[must_use]
    pub const fn repository(&self) -> &RecordRepository<B> {
        &self.repository
    }

    /// Append a note after the notes currently displayed.
    ///
    /// Blank content is discarded without writing and yields `Ok(None)`.
    pub async fn add_note(
        &self,
        date: DateKey,
        displayed: &DayRecord,
        draft: &NoteDraft,
    ) -> Result<Option<WriteAck>> {
        if draft.is_empty() {
            tracing::debug!("Discarding empty note for {date}");
            return Ok(None);
        }
        let index = displayed.notes.len();
        self.repository
            .write_note_at(date, index, &draft.to_entry())
            .await
            .map(Some)
    }

    /// Overwrite the note at `index`. Blank content is discarded.
    pub async fn edit_note(
        &self,
        date: DateKey,
        index: usize,
        draft: &NoteDraft,
    ) -> Result<Option<WriteAck>> {
        if draft.is_empty() {
            tracing::debug!("Discarding empty edit of note {index} on {date}");
            return Ok(None);
        }
        self.repository
            .write_note_at(date, index, &draft.to_entry())
            .await
            .map(Some)
    }

    pub async fn delete_note(&self, date: DateKey, index: usize) -> Result<WriteAck> {
        self.repository.delete_note_at(date, index).await
    }

    pub async fn replace_memo(&self, date: DateKey, memo: &str) -> Result<WriteAck> {
        self.repository.write_memo(date, memo).await
    }

    pub async fn replace_reminders(&self, date: DateKey, reminders: &[String]) -> Result<WriteAck> {
        self.repository.write_reminders(date, reminders).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{SessionHandle, UserId};
    use crate::models::{NoteEntry, SubjectChoice};
    use crate::store::SyncClient;
    use pretty_assertions::assert_eq;

    async fn policy(backend: &MemoryBackend) -> ReconciliationPolicy {
        let session = SessionHandle::signed_in(UserId::new("u1").unwrap());
        let client = SyncClient::new(backend.clone(), session).await.unwrap();
        ReconciliationPolicy::new(RecordRepository::new(client))
    }

    fn draft(subject: &str, content: &str) -> NoteDraft {
        NoteDraft {
            subject: SubjectChoice::Preset(subject.to_string()),
            other_subject: String::new(),
            content: content.to_string(),
        }
    }

    #[tokio::test]
    async fn add_appends_at_displayed_length() {
        let backend = MemoryBackend::new();
        let policy = policy(&backend).await;
        let day = DateKey::parse("20240101").unwrap();

        let displayed = DayRecord::default();
        policy
            .add_note(day, &displayed, &draft("국어", "first"))
            .await
            .unwrap();
        let displayed = policy.repository().read(day).await.unwrap();
        policy
            .add_note(day, &displayed, &draft("수학", "second"))
            .await
            .unwrap();

        assert_eq!(
            policy.repository().read(day).await.unwrap().notes,
            vec![NoteEntry::new("국어", "first"), NoteEntry::new("수학", "second")]
        );
    }

    #[tokio::test]
    async fn blank_content_is_discarded_without_writing() {
        let backend = MemoryBackend::new();
        let policy = policy(&backend).await;
        let day = DateKey::parse("20240101").unwrap();

        let added = policy
            .add_note(day, &DayRecord::default(), &draft("영어", "  \n "))
            .await
            .unwrap();
        let edited = policy.edit_note(day, 0, &draft("영어", "")).await.unwrap();

        assert_eq!(added, None);
        assert_eq!(edited, None);
        assert_eq!(backend.revision(), 0);
    }

    #[tokio::test]
    async fn stale_display_lets_the_later_append_win() {
        let backend = MemoryBackend::new();
        let phone = policy(&backend).await;
        let tablet = policy(&backend).await;
        let day = DateKey::parse("20240101").unwrap();
        let stale = DayRecord::default();

        phone.add_note(day, &stale, &draft("국어", "phone")).await.unwrap();
        tablet.add_note(day, &stale, &draft("영어", "tablet")).await.unwrap();

        assert_eq!(
            phone.repository().read(day).await.unwrap().notes,
            vec![NoteEntry::new("영어", "tablet")]
        );
    }

    #[tokio::test]
    async fn memo_and_reminders_are_full_replacements() {
        let backend = MemoryBackend::new();
        let policy = policy(&backend).await;
        let day = DateKey::parse("20240101").unwrap();

        policy.replace_memo(day, "first").await.unwrap();
        policy.replace_memo(day, "second").await.unwrap();
        policy
            .replace_reminders(day, &["a".to_string(), "b".to_string()])
            .await
            .unwrap();
        policy.replace_reminders(day, &["c".to_string()]).await.unwrap();

        let record = policy.repository().read(day).await.unwrap();
        assert_eq!(record.memo, "second");
        assert_eq!(record.reminders, vec!["c".to_string()]);
    }
}
