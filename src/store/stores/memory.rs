//! `memory` store: process-local conversations, lost on exit.
//!
//! Not selectable from config; tests build it directly. It can be switched
//! into an unavailable state where every operation fails, to exercise the
//! callers' failure paths.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

use crate::error::AppError;
use crate::store::{
    ConversationInfo, ConversationStore, Role, StoredMessage, new_conversation_id, now_iso8601,
    title_or_default,
};

#[derive(Debug, Default)]
struct Conversation {
    info: Option<ConversationInfo>,
    messages: Vec<StoredMessage>,
    artifact: Option<String>,
}

#[derive(Debug, Default)]
pub struct InMemoryStore {
    conversations: Mutex<HashMap<String, Conversation>>,
    unavailable: AtomicBool,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent operation fail (or succeed again).
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<String, Conversation>>, AppError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(AppError::Store("store unavailable".into()));
        }
        self.conversations
            .lock()
            .map_err(|_| AppError::Store("memory store lock poisoned".into()))
    }
}

fn not_found(id: &str) -> AppError {
    AppError::Store(format!("conversation not found: {id}"))
}

impl ConversationStore for InMemoryStore {
    fn store_type(&self) -> &str {
        "memory"
    }

    fn create_conversation(&self, title: &str) -> Result<ConversationInfo, AppError> {
        let info = ConversationInfo {
            id: new_conversation_id(),
            title: title_or_default(title),
            created_at: now_iso8601(),
        };
        self.lock()?.insert(
            info.id.clone(),
            Conversation { info: Some(info.clone()), ..Default::default() },
        );
        Ok(info)
    }

    fn conversation(&self, id: &str) -> Result<Option<ConversationInfo>, AppError> {
        Ok(self.lock()?.get(id).and_then(|c| c.info.clone()))
    }

    fn set_title(&self, id: &str, title: &str) -> Result<(), AppError> {
        let mut map = self.lock()?;
        let info = map.get_mut(id).and_then(|c| c.info.as_mut()).ok_or_else(|| not_found(id))?;
        info.title = title_or_default(title);
        Ok(())
    }

    fn append_message(&self, id: &str, role: Role, content: &str) -> Result<StoredMessage, AppError> {
        let mut map = self.lock()?;
        let conv = map.get_mut(id).ok_or_else(|| not_found(id))?;
        let message = StoredMessage { role, content: content.to_string(), created_at: now_iso8601() };
        conv.messages.push(message.clone());
        Ok(message)
    }

    fn recent_messages(&self, id: &str, n: usize) -> Result<Vec<StoredMessage>, AppError> {
        let map = self.lock()?;
        let conv = map.get(id).ok_or_else(|| not_found(id))?;
        let start = conv.messages.len().saturating_sub(n);
        Ok(conv.messages[start..].to_vec())
    }

    fn artifact(&self, id: &str) -> Result<Option<String>, AppError> {
        Ok(self.lock()?.get(id).and_then(|c| c.artifact.clone()))
    }

    fn save_artifact(&self, id: &str, text: &str) -> Result<(), AppError> {
        let mut map = self.lock()?;
        let conv = map.get_mut(id).ok_or_else(|| not_found(id))?;
        conv.artifact = Some(text.to_string());
        Ok(())
    }
}
