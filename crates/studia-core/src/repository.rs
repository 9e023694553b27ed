//! Day-record gateway scoped to the signed-in user.
//!
//! Records live at `calendar/{uid}/{YYYYMMDD}` with optional `note`, `memo`
//! and `reminder` fields. Every write targets the narrowest field it changes
//! so concurrent edits to sibling fields never clobber each other.

use serde_json::Value;

use crate::auth::{Reauthenticator, SessionHandle, UserId};
use crate::date_key::DateKey;
use crate::error::{Error, Result};
use crate::models::{
    note_to_value, parse_note_slots, DayRecord, NoteEntry, MEMO_FIELD, NOTES_FIELD,
    REMINDERS_FIELD,
};
use crate::store::{
    MemoryBackend, RemoteBackend, StorePath, Subscription, SyncClient, WriteAck, USER_SCOPE_ROOT,
};

/// Path of a user's whole calendar.
pub fn user_root(user: &UserId) -> Result<StorePath> {
    StorePath::root().child(USER_SCOPE_ROOT)?.child(user.as_str())
}

/// Path of one day record.
pub fn day_path(user: &UserId, date: DateKey) -> Result<StorePath> {
    user_root(user)?.child(date.as_storage_key())
}

/// Sole gateway to day records in the remote store.
pub struct RecordRepository<B: RemoteBackend = MemoryBackend> {
    client: SyncClient<B>,
}

impl<B: RemoteBackend> Clone for RecordRepository<B> {
    fn clone(&self) -> Self {
        Self {
            client: self.client.clone(),
        }
    }
}

impl<B: RemoteBackend> RecordRepository<B> {
    /// The repository scopes every path with the client's session, read at
    /// call time.
    #[must_use]
    pub const fn new(client: SyncClient<B>) -> Self {
        Self { client }
    }

    #[must_use]
    pub const fn client(&self) -> &SyncClient<B> {
        &self.client
    }

    #[must_use]
    pub fn session(&self) -> &SessionHandle {
        self.client.session()
    }

    fn day(&self, date: DateKey) -> Result<StorePath> {
        day_path(&self.session().require_user()?, date)
    }

    fn field(&self, date: DateKey, field: &str) -> Result<StorePath> {
        self.day(date)?.child(field)
    }

    /// Live view of one day. The first record arrives immediately.
    pub async fn subscribe(&self, date: DateKey) -> Result<DaySubscription> {
        let path = self.day(date)?;
        tracing::debug!("Subscribing to {date}");
        let inner = self.client.subscribe(&path).await?;
        Ok(DaySubscription { date, inner })
    }

    /// One-shot read. Anything but a missing session degrades to the empty day.
    pub async fn read(&self, date: DateKey) -> Result<DayRecord> {
        self.session().require_user()?;
        match self.subscribe(date).await {
            Ok(mut subscription) => Ok(subscription.next().await.unwrap_or_default()),
            Err(error) => {
                tracing::warn!("Reading {date} failed, showing an empty day: {error}");
                Ok(DayRecord::default())
            }
        }
    }

    /// Set exactly `note/{index}`, leaving every other note untouched.
    pub async fn write_note_at(
        &self,
        date: DateKey,
        index: usize,
        note: &NoteEntry,
    ) -> Result<WriteAck> {
        let path = self.field(date, NOTES_FIELD)?.index(index);
        self.client.set(&path, Some(note_to_value(note))).await
    }

    /// Remove one note by position.
    ///
    /// Reads the current sequence from the remote store, splices it and
    /// writes the whole sequence back. Fails when the store is unreachable
    /// rather than splicing a possibly stale local copy. Holes of a sparse
    /// sequence count for `index` but are not written back.
    pub async fn delete_note_at(&self, date: DateKey, index: usize) -> Result<WriteAck> {
        let path = self.field(date, NOTES_FIELD)?;
        let fresh = self.client.fetch_fresh(&path).await?;
        let mut slots = fresh
            .as_ref()
            .map(|value| parse_note_slots(&path.to_string(), value))
            .unwrap_or_default();

        if index >= slots.len() {
            return Err(Error::InvalidInput(format!(
                "note {index} does not exist ({} notes on {date})",
                slots.len()
            )));
        }
        slots.remove(index);

        let notes = slots.iter().flatten().map(note_to_value).collect::<Vec<_>>();
        let value = (!notes.is_empty()).then_some(Value::Array(notes));
        self.client.set(&path, value).await
    }

    /// Replace the memo. An empty memo is stored as-is.
    pub async fn write_memo(&self, date: DateKey, memo: &str) -> Result<WriteAck> {
        let path = self.field(date, MEMO_FIELD)?;
        self.client
            .set(&path, Some(Value::String(memo.to_string())))
            .await
    }

    /// Replace the whole reminder list.
    pub async fn write_reminders(&self, date: DateKey, reminders: &[String]) -> Result<WriteAck> {
        let path = self.field(date, REMINDERS_FIELD)?;
        let value = reminders.iter().cloned().map(Value::String).collect();
        self.client.set(&path, Some(Value::Array(value))).await
    }

    /// Remove every record of the signed-in user. Deleting nothing succeeds.
    pub async fn delete_user_data(&self) -> Result<WriteAck> {
        let user = self.session().require_user()?;
        tracing::info!("Deleting all records of {user:?}");
        self.client.remove(&user_root(&user)?).await
    }

    /// Re-verify the user, delete their records and sign out.
    pub async fn delete_account(&self, reauthenticator: &impl Reauthenticator) -> Result<()> {
        let user = self.session().require_user()?;
        reauthenticator.reauthenticate(&user).await?;
        self.delete_user_data().await?;
        self.session().sign_out();
        Ok(())
    }
}

/// Live day-record subscription.
#[derive(Debug)]
pub struct DaySubscription {
    date: DateKey,
    inner: Subscription,
}

impl DaySubscription {
    #[must_use]
    pub const fn date(&self) -> DateKey {
        self.date
    }

    fn parse(&self, value: Option<&Value>) -> DayRecord {
        DayRecord::from_snapshot(&self.inner.path().to_string(), value)
    }

    /// Wait for the next record. `None` once the client is gone.
    pub async fn next(&mut self) -> Option<DayRecord> {
        let snapshot = self.inner.next().await?;
        Some(self.parse(snapshot.value.as_ref()))
    }

    /// The newest already-delivered record, if any arrived since the last call.
    pub fn latest(&mut self) -> Option<DayRecord> {
        let snapshot = self.inner.latest()?;
        Some(self.parse(snapshot.value.as_ref()))
    }

    /// Stop delivery immediately.
    pub fn unsubscribe(self) {
        tracing::debug!("Unsubscribing from {}", self.date);
    }
}
