//! Conversation store: the persistence collaborator behind the chat pipeline.
//!
//! A store keeps, per conversation id:
//! - metadata (title, creation time),
//! - the ordered message history,
//! - at most one artifact document (the editor text).
//!
//! Stores are synchronous and `Send + Sync`; [`StoreHandle`] wraps them in
//! `spawn_blocking` for async callers. The pipeline never deletes and never
//! lists across conversations.
//!
//! ```text
//! StoreHandle ──► Arc<dyn ConversationStore>
//!                   ├── BasicStore    (directory per conversation)
//!                   ├── InMemoryStore (process-local)
//!                   └── SqliteStore   (feature = "isqlite")
//! ```

pub mod handle;
pub mod stores;

pub use handle::StoreHandle;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::config::{Config, StoreBackend};
use crate::error::AppError;

/// Author of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Role::User),
            "assistant" => Ok(Role::Assistant),
            other => Err(AppError::Store(format!("unknown message role: {other}"))),
        }
    }
}

/// A persisted chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredMessage {
    pub role: Role,
    pub content: String,
    /// ISO-8601 timestamp of when the message was stored.
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationInfo {
    pub id: String,
    pub title: String,
    pub created_at: String,
}

pub const DEFAULT_TITLE: &str = "New Chat";

/// Pluggable conversation store.
///
/// Every operation is scoped to one conversation id. Operations on an
/// unknown conversation fail with [`AppError::Store`], except [`artifact`]
/// and [`conversation`], which return `None`.
///
/// [`artifact`]: ConversationStore::artifact
/// [`conversation`]: ConversationStore::conversation
pub trait ConversationStore: Send + Sync {
    /// Unique type name for this store (e.g. `"basic"`).
    fn store_type(&self) -> &str;

    fn create_conversation(&self, title: &str) -> Result<ConversationInfo, AppError>;

    fn conversation(&self, id: &str) -> Result<Option<ConversationInfo>, AppError>;

    fn set_title(&self, id: &str, title: &str) -> Result<(), AppError>;

    fn append_message(&self, id: &str, role: Role, content: &str) -> Result<StoredMessage, AppError>;

    /// The last `n` messages in chronological order.
    fn recent_messages(&self, id: &str, n: usize) -> Result<Vec<StoredMessage>, AppError>;

    fn artifact(&self, id: &str) -> Result<Option<String>, AppError>;

    /// Create or overwrite the conversation's artifact. Last write wins.
    fn save_artifact(&self, id: &str, text: &str) -> Result<(), AppError>;
}

/// Construct the configured store rooted under `config.work_dir`.
pub fn build(config: &Config) -> Result<StoreHandle, AppError> {
    let store: Arc<dyn ConversationStore> = match config.store.backend {
        StoreBackend::Basic => Arc::new(stores::basic::BasicStore::open(&config.work_dir)?),
        #[cfg(feature = "isqlite")]
        StoreBackend::Sqlite => Arc::new(stores::sqlite::SqliteStore::open(&config.work_dir)?),
        #[cfg(not(feature = "isqlite"))]
        StoreBackend::Sqlite => {
            return Err(AppError::Config(
                "store backend 'sqlite' requires the isqlite feature".into(),
            ));
        }
    };
    tracing::info!(store_type = store.store_type(), "conversation store ready");
    Ok(StoreHandle::new(store))
}

pub(crate) fn now_iso8601() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

pub(crate) fn new_conversation_id() -> String {
    uuid::Uuid::now_v7().to_string()
}

pub(crate) fn title_or_default(title: &str) -> String {
    let t = title.trim();
    if t.is_empty() { DEFAULT_TITLE.to_string() } else { t.to_string() }
}
