//! `sqlite` store: all conversations in one database file.
//!
//! Layout: `{work_dir}/conversations.db` with three tables.
//! - `conversations`: id, title, created_at.
//! - `messages`: append-only rows; `seq` gives insertion order.
//! - `documents`: at most one artifact per conversation.
//!
//! A connection is opened per operation; WAL mode lets readers run alongside
//! the writer.

use std::path::{Path, PathBuf};

use rusqlite::{Connection, OptionalExtension, params};

use crate::error::AppError;
use crate::store::{
    ConversationInfo, ConversationStore, Role, StoredMessage, new_conversation_id, now_iso8601,
    title_or_default,
};

pub(crate) const DB_FILENAME: &str = "conversations.db";

/// Schema version stored in `PRAGMA user_version`.
pub(crate) const SCHEMA_VERSION: i64 = 1;

pub struct SqliteStore {
    db_path: PathBuf,
}

impl SqliteStore {
    pub fn open(work_dir: &Path) -> Result<Self, AppError> {
        std::fs::create_dir_all(work_dir)
            .map_err(|e| AppError::Store(format!("sqlite: create {}: {e}", work_dir.display())))?;
        let store = Self { db_path: work_dir.join(DB_FILENAME) };
        store.init_db()?;
        Ok(store)
    }

    fn init_db(&self) -> Result<(), AppError> {
        let conn = self.open_conn()?;
        let version: i64 = conn
            .query_row("PRAGMA user_version;", [], |row| row.get(0))
            .map_err(|e| AppError::Store(format!("sqlite: read schema version: {e}")))?;

        if version == 0 {
            conn.execute_batch(
                "
                CREATE TABLE IF NOT EXISTS conversations (
                    id TEXT PRIMARY KEY,
                    title TEXT NOT NULL,
                    created_at TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS messages (
                    seq INTEGER PRIMARY KEY AUTOINCREMENT,
                    conversation_id TEXT NOT NULL REFERENCES conversations(id),
                    role TEXT NOT NULL,
                    content TEXT NOT NULL,
                    created_at TEXT NOT NULL
                );

                CREATE INDEX IF NOT EXISTS messages_by_conversation
                    ON messages(conversation_id, seq);

                CREATE TABLE IF NOT EXISTS documents (
                    conversation_id TEXT PRIMARY KEY REFERENCES conversations(id),
                    content TEXT NOT NULL,
                    updated_at TEXT NOT NULL
                );

                PRAGMA user_version = 1;
                ",
            )
            .map_err(|e| AppError::Store(format!("sqlite: initialize schema: {e}")))?;
            return Ok(());
        }

        if version != SCHEMA_VERSION {
            return Err(AppError::Store(format!(
                "sqlite: unsupported schema version {version}, expected {SCHEMA_VERSION}"
            )));
        }
        Ok(())
    }

    fn open_conn(&self) -> Result<Connection, AppError> {
        let conn = Connection::open(&self.db_path)
            .map_err(|e| AppError::Store(format!("sqlite: open {}: {e}", self.db_path.display())))?;

        conn.pragma_update(None, "journal_mode", "WAL")
            .map_err(|e| AppError::Store(format!("sqlite: set journal_mode WAL: {e}")))?;
        conn.pragma_update(None, "foreign_keys", "ON")
            .map_err(|e| AppError::Store(format!("sqlite: set foreign_keys ON: {e}")))?;
        conn.pragma_update(None, "busy_timeout", 5000)
            .map_err(|e| AppError::Store(format!("sqlite: set busy_timeout: {e}")))?;

        Ok(conn)
    }

    fn require_conversation(conn: &Connection, id: &str) -> Result<(), AppError> {
        let found: Option<i64> = conn
            .query_row("SELECT 1 FROM conversations WHERE id = ?1", params![id], |row| row.get(0))
            .optional()
            .map_err(|e| AppError::Store(format!("sqlite: lookup conversation: {e}")))?;
        match found {
            Some(_) => Ok(()),
            None => Err(AppError::Store(format!("conversation not found: {id}"))),
        }
    }
}

impl ConversationStore for SqliteStore {
    fn store_type(&self) -> &str {
        "sqlite"
    }

    fn create_conversation(&self, title: &str) -> Result<ConversationInfo, AppError> {
        let info = ConversationInfo {
            id: new_conversation_id(),
            title: title_or_default(title),
            created_at: now_iso8601(),
        };
        let conn = self.open_conn()?;
        conn.execute(
            "INSERT INTO conversations (id, title, created_at) VALUES (?1, ?2, ?3)",
            params![info.id, info.title, info.created_at],
        )
        .map_err(|e| AppError::Store(format!("sqlite: insert conversation: {e}")))?;
        Ok(info)
    }

    fn conversation(&self, id: &str) -> Result<Option<ConversationInfo>, AppError> {
        let conn = self.open_conn()?;
        conn.query_row(
            "SELECT id, title, created_at FROM conversations WHERE id = ?1",
            params![id],
            |row| {
                Ok(ConversationInfo {
                    id: row.get(0)?,
                    title: row.get(1)?,
                    created_at: row.get(2)?,
                })
            },
        )
        .optional()
        .map_err(|e| AppError::Store(format!("sqlite: load conversation: {e}")))
    }

    fn set_title(&self, id: &str, title: &str) -> Result<(), AppError> {
        let conn = self.open_conn()?;
        let changed = conn
            .execute(
                "UPDATE conversations SET title = ?2 WHERE id = ?1",
                params![id, title_or_default(title)],
            )
            .map_err(|e| AppError::Store(format!("sqlite: update title: {e}")))?;
        if changed == 0 {
            return Err(AppError::Store(format!("conversation not found: {id}")));
        }
        Ok(())
    }

    fn append_message(&self, id: &str, role: Role, content: &str) -> Result<StoredMessage, AppError> {
        let conn = self.open_conn()?;
        Self::require_conversation(&conn, id)?;
        let message = StoredMessage { role, content: content.to_string(), created_at: now_iso8601() };
        conn.execute(
            "INSERT INTO messages (conversation_id, role, content, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![id, role.as_str(), message.content, message.created_at],
        )
        .map_err(|e| AppError::Store(format!("sqlite: insert message: {e}")))?;
        Ok(message)
    }

    fn recent_messages(&self, id: &str, n: usize) -> Result<Vec<StoredMessage>, AppError> {
        let conn = self.open_conn()?;
        Self::require_conversation(&conn, id)?;
        let limit = i64::try_from(n).unwrap_or(i64::MAX);
        let mut stmt = conn
            .prepare(
                "SELECT role, content, created_at FROM (
                     SELECT seq, role, content, created_at FROM messages
                     WHERE conversation_id = ?1
                     ORDER BY seq DESC
                     LIMIT ?2
                 ) ORDER BY seq ASC",
            )
            .map_err(|e| AppError::Store(format!("sqlite: prepare history query: {e}")))?;
        let rows = stmt
            .query_map(params![id, limit], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?, row.get::<_, String>(2)?))
            })
            .map_err(|e| AppError::Store(format!("sqlite: query history: {e}")))?;

        let mut messages = Vec::new();
        for row in rows {
            let (role, content, created_at) =
                row.map_err(|e| AppError::Store(format!("sqlite: map history row: {e}")))?;
            messages.push(StoredMessage { role: role.parse()?, content, created_at });
        }
        Ok(messages)
    }

    fn artifact(&self, id: &str) -> Result<Option<String>, AppError> {
        let conn = self.open_conn()?;
        conn.query_row(
            "SELECT content FROM documents WHERE conversation_id = ?1",
            params![id],
            |row| row.get(0),
        )
        .optional()
        .map_err(|e| AppError::Store(format!("sqlite: load artifact: {e}")))
    }

    fn save_artifact(&self, id: &str, text: &str) -> Result<(), AppError> {
        let conn = self.open_conn()?;
        Self::require_conversation(&conn, id)?;
        conn.execute(
            "INSERT INTO documents (conversation_id, content, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(conversation_id) DO UPDATE SET
                 content = excluded.content,
                 updated_at = excluded.updated_at",
            params![id, text, now_iso8601()],
        )
        .map_err(|e| AppError::Store(format!("sqlite: save artifact: {e}")))?;
        Ok(())
    }
}
