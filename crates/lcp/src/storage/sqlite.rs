//! SQLite-backed snapshot storage
//!
//! One row per user: the serialized conversation collection plus its
//! last-updated timestamp. The payload is opaque JSON; all merging happens
//! in memory, so the schema never chases the conversation model.

use std::path::Path;
use std::sync::{Mutex, RwLock};

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use rusqlite_migration::{Migrations, M};

use super::traits::{SnapshotStats, SnapshotStore, DEFAULT_MAX_AGE_MINUTES};
use crate::models::{Conversation, ConversationId, ConversationPatch};

/// Database filename inside the Leadline data directory
const SNAPSHOT_DB_FILE: &str = "snapshots.sqlite";

/// Database migrations
///
/// Applied in order; the user_version pragma tracks which have run.
fn migrations() -> Migrations<'static> {
    Migrations::new(vec![M::up(
        r#"
        -- One snapshot row per user
        CREATE TABLE snapshots (
            user_id TEXT PRIMARY KEY,
            payload TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );
        "#,
    )])
}

/// SQLite-backed implementation of [`SnapshotStore`]
pub struct SqliteSnapshotStore {
    conn: Mutex<Connection>,
    user_id: RwLock<Option<String>>,
}

impl SqliteSnapshotStore {
    /// Open (or create) a snapshot database at the given path
    pub fn new(db_path: impl AsRef<Path>) -> Result<Self> {
        let mut conn = Connection::open(db_path.as_ref())
            .with_context(|| format!("Failed to open database at {:?}", db_path.as_ref()))?;

        // WAL keeps readers unblocked during writes; NORMAL syncs at
        // critical moments only, which is safe under WAL.
        conn.execute_batch(
            r#"
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
            "#,
        )?;

        migrations()
            .to_latest(&mut conn)
            .context("Failed to run database migrations")?;

        Ok(Self {
            conn: Mutex::new(conn),
            user_id: RwLock::new(None),
        })
    }

    /// Open the snapshot database at its default location
    /// (~/.local/share/leadline/snapshots.sqlite)
    pub fn open_default() -> Result<Self> {
        let dir = config::ensure_data_dir()?;
        Self::new(dir.join(SNAPSHOT_DB_FILE))
    }

    fn current_user(&self) -> Result<String> {
        match self.user_id.read().unwrap().as_ref() {
            Some(user) => Ok(user.clone()),
            None => bail!("snapshot store not initialized"),
        }
    }

    fn load_row(
        &self,
        conn: &Connection,
        user: &str,
    ) -> Result<Option<(Vec<Conversation>, DateTime<Utc>)>> {
        let row: Option<(String, String)> = conn
            .query_row(
                "SELECT payload, updated_at FROM snapshots WHERE user_id = ?",
                [user],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        let Some((payload, updated_at_str)) = row else {
            return Ok(None);
        };

        let conversations: Vec<Conversation> =
            serde_json::from_str(&payload).context("Failed to parse snapshot payload")?;
        let updated_at = DateTime::parse_from_rfc3339(&updated_at_str)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now());

        Ok(Some((conversations, updated_at)))
    }

    fn save_row(
        &self,
        conn: &Connection,
        user: &str,
        conversations: &[Conversation],
        updated_at: DateTime<Utc>,
    ) -> Result<()> {
        let payload =
            serde_json::to_string(conversations).context("Failed to serialize snapshot")?;
        conn.execute(
            "INSERT INTO snapshots (user_id, payload, updated_at)
             VALUES (?, ?, ?)
             ON CONFLICT(user_id) DO UPDATE SET
                payload = excluded.payload,
                updated_at = excluded.updated_at",
            params![user, payload, updated_at.to_rfc3339()],
        )?;
        Ok(())
    }
}

impl SnapshotStore for SqliteSnapshotStore {
    fn initialize(&self, user_id: &str) -> Result<()> {
        *self.user_id.write().unwrap() = Some(user_id.to_string());
        Ok(())
    }

    fn has_data(&self) -> Result<bool> {
        let user = self.current_user()?;
        let conn = self.conn.lock().unwrap();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM snapshots WHERE user_id = ?",
            [&user],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    fn is_stale(&self, max_age_minutes: i64) -> Result<bool> {
        let user = self.current_user()?;
        let conn = self.conn.lock().unwrap();
        let updated_at_str: Option<String> = conn
            .query_row(
                "SELECT updated_at FROM snapshots WHERE user_id = ?",
                [&user],
                |row| row.get(0),
            )
            .optional()?;

        let Some(updated_at_str) = updated_at_str else {
            return Ok(true);
        };
        let updated_at = DateTime::parse_from_rfc3339(&updated_at_str)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now());

        Ok((Utc::now() - updated_at).num_minutes() >= max_age_minutes)
    }

    fn store_conversations(&self, conversations: &[Conversation]) -> Result<()> {
        let user = self.current_user()?;
        let conn = self.conn.lock().unwrap();
        self.save_row(&conn, &user, conversations, Utc::now())
    }

    fn get_conversations(&self) -> Result<Option<Vec<Conversation>>> {
        let user = self.current_user()?;
        let conn = self.conn.lock().unwrap();
        Ok(self.load_row(&conn, &user)?.map(|(convs, _)| convs))
    }

    fn get_conversation(&self, id: &ConversationId) -> Result<Option<Conversation>> {
        let user = self.current_user()?;
        let conn = self.conn.lock().unwrap();
        Ok(self
            .load_row(&conn, &user)?
            .and_then(|(convs, _)| convs.into_iter().find(|c| c.id() == id)))
    }

    fn update_conversation(&self, id: &ConversationId, patch: &ConversationPatch) -> Result<()> {
        let user = self.current_user()?;
        let conn = self.conn.lock().unwrap();

        let Some((mut conversations, updated_at)) = self.load_row(&conn, &user)? else {
            return Ok(());
        };
        let Some(conversation) = conversations.iter_mut().find(|c| c.id() == id) else {
            return Ok(());
        };

        patch.apply(conversation);
        // Keep the original timestamp: a partial patch is not a refresh,
        // so staleness still forces a real refetch.
        self.save_row(&conn, &user, &conversations, updated_at)
    }

    fn remove_conversation(&self, id: &ConversationId) -> Result<()> {
        let user = self.current_user()?;
        let conn = self.conn.lock().unwrap();

        let Some((mut conversations, updated_at)) = self.load_row(&conn, &user)? else {
            return Ok(());
        };
        let before = conversations.len();
        conversations.retain(|c| c.id() != id);
        if conversations.len() == before {
            return Ok(());
        }

        self.save_row(&conn, &user, &conversations, updated_at)
    }

    fn clear(&self) -> Result<()> {
        let user = self.current_user()?;
        let conn = self.conn.lock().unwrap();
        conn.execute("DELETE FROM snapshots WHERE user_id = ?", [&user])?;
        Ok(())
    }

    fn stats(&self) -> Result<SnapshotStats> {
        let user = self.current_user()?;
        let conn = self.conn.lock().unwrap();
        let row = self.load_row(&conn, &user)?;

        let (is_stale, count, last_updated) = match &row {
            Some((convs, updated_at)) => (
                (Utc::now() - *updated_at).num_minutes() >= DEFAULT_MAX_AGE_MINUTES,
                convs.len(),
                Some(*updated_at),
            ),
            None => (true, 0, None),
        };

        Ok(SnapshotStats {
            has_data: row.is_some(),
            is_stale,
            conversation_count: count,
            last_updated,
        })
    }
}
