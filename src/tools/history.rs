//! `conversation_memory`: recall the most recent messages of a conversation.

use serde::{Deserialize, Serialize};

use crate::store::{Role, StoreHandle};

use super::{ToolError, ToolPayload};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub role: Role,
    pub content: String,
    pub timestamp: String,
}

pub async fn recall(
    store: &StoreHandle,
    conversation_id: &str,
    last_n: usize,
) -> Result<ToolPayload, ToolError> {
    let messages: Vec<HistoryEntry> = store
        .recent_messages(conversation_id, last_n)
        .await?
        .into_iter()
        .map(|m| HistoryEntry { role: m.role, content: m.content, timestamp: m.created_at })
        .collect();
    Ok(ToolPayload::History { count: messages.len(), messages })
}
