//! State behind the day screen: the selected date, its record, and the
//! unsaved edit buffers.

use std::fmt;

use thiserror::Error;

use crate::date_key::DateKey;
use crate::error::{Error, Result};
use crate::models::{DayRecord, NoteDraft};
use crate::reconcile::ReconciliationPolicy;
use crate::repository::{DaySubscription, RecordRepository};
use crate::store::{MemoryBackend, RemoteBackend, WriteAck};

/// Decides what the displayed record becomes when a snapshot arrives.
pub trait SnapshotPolicy {
    fn apply(&self, current: Option<&DayRecord>, incoming: DayRecord) -> DayRecord;
}

/// Every snapshot replaces the displayed record wholesale.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReplaceOnSnapshot;

impl SnapshotPolicy for ReplaceOnSnapshot {
    fn apply(&self, _current: Option<&DayRecord>, incoming: DayRecord) -> DayRecord {
        incoming
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewState {
    Loading,
    Loaded(DayRecord),
}

/// Which commit failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitAction {
    AddNote,
    EditNote(usize),
    DeleteNote(usize),
    Memo,
    Reminders,
}

impl fmt::Display for CommitAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AddNote => f.write_str("adding note"),
            Self::EditNote(index) => write!(f, "editing note {index}"),
            Self::DeleteNote(index) => write!(f, "deleting note {index}"),
            Self::Memo => f.write_str("saving memo"),
            Self::Reminders => f.write_str("saving reminders"),
        }
    }
}

/// A failed commit, kept so the screen can offer a retry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{action} failed: {message}")]
pub struct CommitError {
    pub action: CommitAction,
    pub message: String,
    pub retryable: bool,
}

impl CommitError {
    fn new(action: CommitAction, error: &Error) -> Self {
        Self {
            action,
            message: error.to_string(),
            retryable: error.is_retryable(),
        }
    }
}

pub type CommitResult<T> = std::result::Result<T, CommitError>;

/// View-model of one displayed day.
///
/// Owned by a single UI driver; every method takes `&mut self`.
pub struct DayViewModel<B: RemoteBackend = MemoryBackend, P: SnapshotPolicy = ReplaceOnSnapshot> {
    policy: ReconciliationPolicy<B>,
    snapshot_policy: P,
    date: DateKey,
    state: ViewState,
    subscription: Option<DaySubscription>,
    note_draft: NoteDraft,
    editing_note: Option<usize>,
    memo_buffer: String,
    reminder_buffer: String,
    last_error: Option<CommitError>,
}

impl<B: RemoteBackend> DayViewModel<B> {
    /// Open the day screen on `date`, replacing the record on every snapshot.
    pub async fn open(repository: RecordRepository<B>, date: DateKey) -> Result<Self> {
        Self::with_policy(repository, date, ReplaceOnSnapshot).await
    }
}

impl<B: RemoteBackend, P: SnapshotPolicy> DayViewModel<B, P> {
    pub async fn with_policy(
        repository: RecordRepository<B>,
        date: DateKey,
        snapshot_policy: P,
    ) -> Result<Self> {
        let mut view_model = Self {
            policy: ReconciliationPolicy::new(repository),
            snapshot_policy,
            date,
            state: ViewState::Loading,
            subscription: None,
            note_draft: NoteDraft::default(),
            editing_note: None,
            memo_buffer: String::new(),
            reminder_buffer: String::new(),
            last_error: None,
        };
        view_model.select_date(date).await?;
        Ok(view_model)
    }

    #[must_use]
    pub const fn date(&self) -> DateKey {
        self.date
    }

    #[must_use]
    pub const fn state(&self) -> &ViewState {
        &self.state
    }

    /// The displayed record, once loaded.
    #[must_use]
    pub const fn record(&self) -> Option<&DayRecord> {
        match &self.state {
            ViewState::Loading => None,
            ViewState::Loaded(record) => Some(record),
        }
    }

    #[must_use]
    pub fn display_label(&self) -> String {
        self.date.display_label()
    }

    #[must_use]
    pub const fn last_error(&self) -> Option<&CommitError> {
        self.last_error.as_ref()
    }

    pub fn clear_error(&mut self) {
        self.last_error = None;
    }

    /// Switch to another day. The old subscription is released first, so
    /// nothing from the previous date is applied afterwards.
    pub async fn select_date(&mut self, date: DateKey) -> Result<()> {
        if let Some(previous) = self.subscription.take() {
            previous.unsubscribe();
        }
        self.date = date;
        self.state = ViewState::Loading;
        self.reset_buffers();

        match self.policy.repository().subscribe(date).await {
            Ok(subscription) => {
                self.subscription = Some(subscription);
                self.apply_ready();
            }
            Err(Error::Unauthenticated) => return Err(Error::Unauthenticated),
            Err(error) => {
                tracing::warn!("Could not subscribe to {date}: {error}");
                self.state = ViewState::Loaded(DayRecord::default());
            }
        }
        Ok(())
    }

    pub async fn previous_day(&mut self) -> Result<()> {
        self.select_date(self.date.previous()).await
    }

    pub async fn next_day(&mut self) -> Result<()> {
        self.select_date(self.date.next()).await
    }

    /// Wait for the next snapshot of the selected date and apply it.
    pub async fn next_update(&mut self) -> Option<&DayRecord> {
        let record = self.subscription.as_mut()?.next().await?;
        self.apply(record);
        self.record()
    }

    /// Apply whatever has already been delivered. Returns whether anything was.
    pub fn apply_ready(&mut self) -> bool {
        let Some(record) = self.subscription.as_mut().and_then(DaySubscription::latest) else {
            return false;
        };
        self.apply(record);
        true
    }

    fn apply(&mut self, incoming: DayRecord) {
        let record = self.snapshot_policy.apply(self.record(), incoming);
        self.state = ViewState::Loaded(record);
    }

    fn displayed(&self) -> DayRecord {
        self.record().cloned().unwrap_or_default()
    }

    fn reset_buffers(&mut self) {
        self.note_draft = NoteDraft::default();
        self.editing_note = None;
        self.memo_buffer.clear();
        self.reminder_buffer.clear();
    }

    fn fail(&mut self, action: CommitAction, error: &Error) -> CommitError {
        tracing::warn!("Commit failed while {action}: {error}");
        let commit_error = CommitError::new(action, error);
        self.last_error = Some(commit_error.clone());
        commit_error
    }

    // Note editing

    #[must_use]
    pub const fn note_draft(&self) -> &NoteDraft {
        &self.note_draft
    }

    pub fn note_draft_mut(&mut self) -> &mut NoteDraft {
        &mut self.note_draft
    }

    /// Index of the note being edited; `None` while adding.
    #[must_use]
    pub const fn editing_note(&self) -> Option<usize> {
        self.editing_note
    }

    pub fn begin_note_add(&mut self) {
        self.note_draft = NoteDraft::default();
        self.editing_note = None;
    }

    /// Seed the draft from a displayed note.
    pub fn begin_note_edit(&mut self, index: usize) -> Result<()> {
        let note = self
            .record()
            .and_then(|record| record.notes.get(index))
            .ok_or_else(|| Error::InvalidInput(format!("no note at position {index}")))?;
        self.note_draft = NoteDraft::from_entry(note);
        self.editing_note = Some(index);
        Ok(())
    }

    pub fn cancel_note_edit(&mut self) {
        self.begin_note_add();
    }

    /// Commit the note draft: overwrite the edited note or append a new one.
    /// A blank draft is dropped and yields `Ok(None)`.
    pub async fn commit_note(&mut self) -> CommitResult<Option<WriteAck>> {
        let result = match self.editing_note {
            Some(index) => self
                .policy
                .edit_note(self.date, index, &self.note_draft)
                .await
                .map_err(|error| (CommitAction::EditNote(index), error)),
            None => self
                .policy
                .add_note(self.date, &self.displayed(), &self.note_draft)
                .await
                .map_err(|error| (CommitAction::AddNote, error)),
        };
        match result {
            Ok(ack) => {
                self.begin_note_add();
                Ok(ack)
            }
            Err((action, error)) => Err(self.fail(action, &error)),
        }
    }

    pub async fn delete_note(&mut self, index: usize) -> CommitResult<WriteAck> {
        match self.policy.delete_note(self.date, index).await {
            Ok(ack) => {
                if self.editing_note == Some(index) {
                    self.begin_note_add();
                }
                Ok(ack)
            }
            Err(error) => Err(self.fail(CommitAction::DeleteNote(index), &error)),
        }
    }

    // Memo editing

    #[must_use]
    pub fn memo_buffer(&self) -> &str {
        &self.memo_buffer
    }

    pub fn set_memo_buffer(&mut self, memo: impl Into<String>) {
        self.memo_buffer = memo.into();
    }

    pub fn begin_memo_edit(&mut self) {
        self.memo_buffer = self.displayed().memo;
    }

    pub fn cancel_memo_edit(&mut self) {
        self.begin_memo_edit();
    }

    pub async fn commit_memo(&mut self) -> CommitResult<WriteAck> {
        match self.policy.replace_memo(self.date, &self.memo_buffer).await {
            Ok(ack) => Ok(ack),
            Err(error) => Err(self.fail(CommitAction::Memo, &error)),
        }
    }

    // Reminder editing

    #[must_use]
    pub fn reminder_buffer(&self) -> &str {
        &self.reminder_buffer
    }

    pub fn set_reminder_buffer(&mut self, lines: impl Into<String>) {
        self.reminder_buffer = lines.into();
    }

    /// Seed the buffer with one reminder per line.
    pub fn begin_reminders_edit(&mut self) {
        self.reminder_buffer = self.displayed().reminders.join("\n");
    }

    pub fn cancel_reminders_edit(&mut self) {
        self.begin_reminders_edit();
    }

    pub async fn commit_reminders(&mut self) -> CommitResult<WriteAck> {
        let reminders = parse_reminder_lines(&self.reminder_buffer);
        match self.policy.replace_reminders(self.date, &reminders).await {
            Ok(ack) => Ok(ack),
            Err(error) => Err(self.fail(CommitAction::Reminders, &error)),
        }
    }
}

/// One reminder per non-blank line; a leading bullet is dropped.
#[must_use]
pub fn parse_reminder_lines(buffer: &str) -> Vec<String> {
    buffer
        .lines()
        .map(|line| {
            let line = line.trim();
            line.strip_prefix('•').map_or(line, str::trim_start)
        })
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}
