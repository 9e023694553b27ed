//! On-disk copy of server values last seen by the sync client

use libsql::Connection;
use serde_json::Value;

use super::pending_repository::{decode_value, encode_value};
use crate::error::Result;
use crate::store::tree::{empty_tree, set_at};
use crate::store::StorePath;
use crate::util::unix_timestamp_millis;

/// Trait for cached node storage operations (async)
#[allow(async_fn_in_trait)]
pub trait NodeCacheRepository {
    /// Record the server value at `path`, superseding anything cached below it
    async fn put(&self, path: &StorePath, value: Option<&Value>) -> Result<()>;

    /// Rebuild the cached tree
    async fn load_tree(&self) -> Result<Value>;

    /// Forget everything
    async fn clear(&self) -> Result<()>;
}

/// libSQL implementation of `NodeCacheRepository`
pub struct LibSqlNodeCacheRepository<'a> {
    conn: &'a Connection,
}

impl<'a> LibSqlNodeCacheRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }
}

impl NodeCacheRepository for LibSqlNodeCacheRepository<'_> {
    async fn put(&self, path: &StorePath, value: Option<&Value>) -> Result<()> {
        if path.is_connected_signal() {
            return Ok(());
        }
        let key = path.to_string();
        if path.is_root() {
            self.clear().await?;
        } else {
            // substr instead of LIKE: '_' and '%' are legal in segments
            self.conn
                .execute(
                    "DELETE FROM cached_nodes
                     WHERE path = ?1 OR substr(path, 1, length(?1) + 1) = ?1 || '/'",
                    [key.as_str()],
                )
                .await?;
        }
        self.conn
            .execute(
                "INSERT INTO cached_nodes (path, value, updated_at) VALUES (?, ?, ?)",
                libsql::params![key, encode_value(value)?, unix_timestamp_millis()],
            )
            .await?;
        Ok(())
    }

    async fn load_tree(&self) -> Result<Value> {
        let mut rows = self
            .conn
            .query("SELECT path, value FROM cached_nodes ORDER BY seq ASC", ())
            .await?;

        let mut tree = empty_tree();
        while let Some(row) = rows.next().await? {
            let path: String = row.get(0)?;
            let value = decode_value(row.get_value(1)?)?;
            match StorePath::parse(&path) {
                Ok(path) => set_at(&mut tree, &path, value),
                Err(error) => tracing::warn!("Skipping cached node {path}: {error}"),
            }
        }
        Ok(tree)
    }

    async fn clear(&self) -> Result<()> {
        self.conn.execute("DELETE FROM cached_nodes", ()).await?;
        Ok(())
    }
}
