//! [`StoreHandle`]: async-safe handle over a [`ConversationStore`].
//!
//! Cheaply cloneable (`Arc`-backed). All store I/O runs on
//! `tokio::task::spawn_blocking` so callers can hold this in async code.

use std::sync::Arc;

use crate::error::AppError;
use super::{ConversationInfo, ConversationStore, Role, StoredMessage};

#[derive(Clone)]
pub struct StoreHandle {
    store: Arc<dyn ConversationStore>,
}

impl std::fmt::Debug for StoreHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreHandle")
            .field("store_type", &self.store.store_type())
            .finish()
    }
}

impl StoreHandle {
    pub fn new(store: Arc<dyn ConversationStore>) -> Self {
        Self { store }
    }

    pub fn store_type(&self) -> &str {
        self.store.store_type()
    }

    /// Run a blocking store call on the blocking pool.
    async fn blocking<T, F>(&self, op: &'static str, f: F) -> Result<T, AppError>
    where
        T: Send + 'static,
        F: FnOnce(&dyn ConversationStore) -> Result<T, AppError> + Send + 'static,
    {
        let store = Arc::clone(&self.store);
        tokio::task::spawn_blocking(move || f(store.as_ref()))
            .await
            .map_err(|e| AppError::Store(format!("{op} join: {e}")))?
    }

    pub async fn create_conversation(&self, title: &str) -> Result<ConversationInfo, AppError> {
        let title = title.to_string();
        self.blocking("create_conversation", move |s| s.create_conversation(&title)).await
    }

    pub async fn conversation(&self, id: &str) -> Result<Option<ConversationInfo>, AppError> {
        let id = id.to_string();
        self.blocking("conversation", move |s| s.conversation(&id)).await
    }

    pub async fn set_title(&self, id: &str, title: &str) -> Result<(), AppError> {
        let id = id.to_string();
        let title = title.to_string();
        self.blocking("set_title", move |s| s.set_title(&id, &title)).await
    }

    pub async fn append_message(
        &self,
        id: &str,
        role: Role,
        content: &str,
    ) -> Result<StoredMessage, AppError> {
        let id = id.to_string();
        let content = content.to_string();
        self.blocking("append_message", move |s| s.append_message(&id, role, &content)).await
    }

    pub async fn recent_messages(&self, id: &str, n: usize) -> Result<Vec<StoredMessage>, AppError> {
        let id = id.to_string();
        self.blocking("recent_messages", move |s| s.recent_messages(&id, n)).await
    }

    pub async fn artifact(&self, id: &str) -> Result<Option<String>, AppError> {
        let id = id.to_string();
        self.blocking("artifact", move |s| s.artifact(&id)).await
    }

    pub async fn save_artifact(&self, id: &str, text: &str) -> Result<(), AppError> {
        let id = id.to_string();
        let text = text.to_string();
        self.blocking("save_artifact", move |s| s.save_artifact(&id, &text)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::stores::memory::InMemoryStore;

    #[tokio::test]
    async fn handle_forwards_to_store() {
        let handle = StoreHandle::new(Arc::new(InMemoryStore::new()));
        let conv = handle.create_conversation("").await.unwrap();
        handle.append_message(&conv.id, Role::User, "hi").await.unwrap();
        handle.save_artifact(&conv.id, "Draft").await.unwrap();

        let msgs = handle.recent_messages(&conv.id, 10).await.unwrap();
        assert_eq!(msgs.len(), 1);
        assert_eq!(handle.artifact(&conv.id).await.unwrap().as_deref(), Some("Draft"));
        assert_eq!(handle.store_type(), "memory");
    }
}
