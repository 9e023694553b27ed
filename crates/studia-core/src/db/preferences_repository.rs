//! Preferences repository implementation

use crate::error::Result;
use crate::models::Preferences;
use libsql::Connection;

const OFFLINE_PERSISTENCE_KEY: &str = "offline_persistence";
const TUTORIAL_SEEN_KEY: &str = "tutorial_seen";

/// Trait for preference storage operations (async)
#[allow(async_fn_in_trait)]
pub trait PreferencesRepository {
    /// Load preferences, falling back to defaults for missing keys
    async fn load(&self) -> Result<Preferences>;

    /// Save preferences to the database
    async fn save(&self, preferences: &Preferences) -> Result<()>;
}

/// libSQL implementation of `PreferencesRepository`
pub struct LibSqlPreferencesRepository<'a> {
    conn: &'a Connection,
}

impl<'a> LibSqlPreferencesRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

const fn flag_str(value: bool) -> &'static str {
    if value {
        "true"
    } else {
        "false"
    }
}

impl PreferencesRepository for LibSqlPreferencesRepository<'_> {
    async fn load(&self) -> Result<Preferences> {
        let mut preferences = Preferences::default();

        if let Some(flag) = self
            .get_setting(OFFLINE_PERSISTENCE_KEY)
            .await?
            .as_deref()
            .and_then(parse_flag)
        {
            preferences.offline_persistence = flag;
        }

        if let Some(flag) = self
            .get_setting(TUTORIAL_SEEN_KEY)
            .await?
            .as_deref()
            .and_then(parse_flag)
        {
            preferences.tutorial_seen = flag;
        }

        Ok(preferences)
    }

    async fn save(&self, preferences: &Preferences) -> Result<()> {
        self.set_setting(
            OFFLINE_PERSISTENCE_KEY,
            flag_str(preferences.offline_persistence),
        )
        .await?;
        self.set_setting(TUTORIAL_SEEN_KEY, flag_str(preferences.tutorial_seen))
            .await?;
        Ok(())
    }
}

impl LibSqlPreferencesRepository<'_> {
    async fn get_setting(&self, key: &str) -> Result<Option<String>> {
        let mut rows = self
            .conn
            .query("SELECT value FROM settings WHERE key = ?", [key])
            .await?;

        if let Some(row) = rows.next().await? {
            Ok(Some(row.get(0)?))
        } else {
            Ok(None)
        }
    }

    async fn set_setting(&self, key: &str, value: &str) -> Result<()> {
        self.conn
            .execute(
                "INSERT OR REPLACE INTO settings (key, value) VALUES (?, ?)",
                [key, value],
            )
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;

    async fn setup() -> Database {
        Database::open_in_memory().await.unwrap()
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_load_default_preferences() {
        let db = setup().await;
        let repo = LibSqlPreferencesRepository::new(db.connection());

        assert_eq!(repo.load().await.unwrap(), Preferences::default());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_save_and_load_preferences() {
        let db = setup().await;
        let repo = LibSqlPreferencesRepository::new(db.connection());

        let preferences = Preferences {
            offline_persistence: false,
            tutorial_seen: true,
        };
        repo.save(&preferences).await.unwrap();

        assert_eq!(repo.load().await.unwrap(), preferences);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_unrecognized_flag_keeps_default() {
        let db = setup().await;
        let repo = LibSqlPreferencesRepository::new(db.connection());
        repo.set_setting(OFFLINE_PERSISTENCE_KEY, "maybe")
            .await
            .unwrap();

        assert!(repo.load().await.unwrap().offline_persistence);
    }
}
