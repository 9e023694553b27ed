//! Durable queue of writes the remote store has not acknowledged yet

use std::str::FromStr;

use libsql::Connection;
use serde_json::Value;

use crate::error::{Error, Result};
use crate::store::{StorePath, WriteId};
use crate::util::unix_timestamp_millis;

/// A queued write as stored on disk.
#[derive(Debug, Clone, PartialEq)]
pub struct PersistedWrite {
    pub id: WriteId,
    pub path: StorePath,
    /// `None` removes the node
    pub value: Option<Value>,
}

/// Trait for offline queue storage operations (async)
#[allow(async_fn_in_trait)]
pub trait PendingWriteRepository {
    /// Append a write to the end of the queue
    async fn enqueue(&self, write: &PersistedWrite) -> Result<()>;

    /// Drop an acknowledged or rejected write
    async fn remove(&self, id: WriteId) -> Result<()>;

    /// All queued writes in the order they were issued
    async fn list(&self) -> Result<Vec<PersistedWrite>>;

    /// Forget every queued write
    async fn clear(&self) -> Result<()>;
}

/// libSQL implementation of `PendingWriteRepository`
pub struct LibSqlPendingWriteRepository<'a> {
    conn: &'a Connection,
}

impl<'a> LibSqlPendingWriteRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }
}

pub(super) fn encode_value(value: Option<&Value>) -> Result<libsql::Value> {
    Ok(match value {
        Some(value) => libsql::Value::Text(serde_json::to_string(value)?),
        None => libsql::Value::Null,
    })
}

pub(super) fn decode_value(raw: libsql::Value) -> Result<Option<Value>> {
    match raw {
        libsql::Value::Null => Ok(None),
        libsql::Value::Text(text) => Ok(Some(serde_json::from_str(&text)?)),
        other => Err(Error::Database(format!("unexpected stored value {other:?}"))),
    }
}

impl PendingWriteRepository for LibSqlPendingWriteRepository<'_> {
    async fn enqueue(&self, write: &PersistedWrite) -> Result<()> {
        self.conn
            .execute(
                "INSERT OR IGNORE INTO pending_writes (id, path, value, created_at)
                 VALUES (?, ?, ?, ?)",
                libsql::params![
                    write.id.as_str(),
                    write.path.to_string(),
                    encode_value(write.value.as_ref())?,
                    unix_timestamp_millis()
                ],
            )
            .await?;
        Ok(())
    }

    async fn remove(&self, id: WriteId) -> Result<()> {
        self.conn
            .execute("DELETE FROM pending_writes WHERE id = ?", [id.as_str()])
            .await?;
        Ok(())
    }

    async fn list(&self) -> Result<Vec<PersistedWrite>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, path, value FROM pending_writes ORDER BY seq ASC",
                (),
            )
            .await?;

        let mut writes = Vec::new();
        while let Some(row) = rows.next().await? {
            let id: String = row.get(0)?;
            let path: String = row.get(1)?;
            let value = row.get_value(2)?;

            let Ok(id) = WriteId::from_str(&id) else {
                tracing::warn!("Skipping queued write with invalid id {id}");
                continue;
            };
            let path = match StorePath::parse(&path) {
                Ok(path) => path,
                Err(error) => {
                    tracing::warn!("Skipping queued write {id}: {error}");
                    continue;
                }
            };
            writes.push(PersistedWrite {
                id,
                path,
                value: decode_value(value)?,
            });
        }
        Ok(writes)
    }

    async fn clear(&self) -> Result<()> {
        self.conn.execute("DELETE FROM pending_writes", ()).await?;
        Ok(())
    }
}
