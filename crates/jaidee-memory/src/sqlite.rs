//! SQLite conversation log.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use jaidee_core::error::{JaideeError, Result};
use jaidee_core::traits::ConversationStore;
use jaidee_core::types::ConversationTurn;
use rusqlite::Connection;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

fn store_err(e: impl std::fmt::Display) -> JaideeError {
    JaideeError::Store(e.to_string())
}

pub struct SqliteConversationStore {
    conn: Mutex<Connection>,
}

impl SqliteConversationStore {
    /// Open (or create) the database file at `path`.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path).map_err(store_err)?;
        Self::from_connection(conn)
    }

    /// Private in-memory database, mostly for tests.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(store_err)?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS conversations (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id TEXT NOT NULL,
                timestamp TEXT NOT NULL,
                user_message TEXT NOT NULL,
                bot_response TEXT NOT NULL,
                token_count INTEGER NOT NULL DEFAULT 0,
                important_flag INTEGER NOT NULL DEFAULT 0
            );
            CREATE INDEX IF NOT EXISTS conversations_user_idx
                ON conversations (user_id, timestamp);",
        )
        .map_err(store_err)?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(store_err)
    }
}

/// A row whose timestamp cannot be read fails the whole query rather than
/// sorting to the wrong end of the history.
fn parse_ts(raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|d| d.with_timezone(&Utc))
        .map_err(|e| {
            tracing::warn!("⚠️ Unreadable turn timestamp '{raw}': {e}");
            rusqlite::Error::FromSqlConversionFailure(2, rusqlite::types::Type::Text, Box::new(e))
        })
}

#[async_trait]
impl ConversationStore for SqliteConversationStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn append_turn(&self, turn: &ConversationTurn) -> Result<i64> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO conversations
             (user_id, timestamp, user_message, bot_response, token_count, important_flag)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            rusqlite::params![
                turn.user_id,
                turn.timestamp.to_rfc3339(),
                turn.user_text,
                turn.bot_text,
                turn.token_count as i64,
                turn.is_important() as i32,
            ],
        )
        .map_err(store_err)?;
        let id = conn.last_insert_rowid();
        tracing::debug!("💾 Saved turn {id} for {}", turn.user_id);
        Ok(id)
    }

    async fn query_turns(&self, user_id: &str) -> Result<Vec<ConversationTurn>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT id, user_id, timestamp, user_message, bot_response, token_count
                 FROM conversations
                 WHERE user_id = ?1
                 ORDER BY timestamp DESC, id DESC",
            )
            .map_err(store_err)?;

        let rows = stmt
            .query_map(rusqlite::params![user_id], |row| {
                let id: i64 = row.get(0)?;
                let user_id: String = row.get(1)?;
                let timestamp: String = row.get(2)?;
                let user_text: String = row.get(3)?;
                let bot_text: String = row.get(4)?;
                let token_count: i64 = row.get(5)?;
                // importance is recomputed from the text, never read back
                Ok(ConversationTurn::with_id(
                    id,
                    &user_id,
                    parse_ts(&timestamp)?,
                    &user_text,
                    &bot_text,
                    token_count.max(0) as usize,
                ))
            })
            .map_err(store_err)?;

        let turns = rows
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(store_err)?;
        Ok(turns)
    }

    async fn delete_all_turns(&self, user_id: &str) -> Result<usize> {
        let conn = self.conn()?;
        let removed = conn
            .execute("DELETE FROM conversations WHERE user_id = ?1", rusqlite::params![user_id])
            .map_err(store_err)?;
        tracing::info!("🗑️ Cleared {removed} turns for {user_id}");
        Ok(removed)
    }
}
