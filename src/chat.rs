//! Chat service: the caller of the turn pipeline.
//!
//! `send` persists the user message, loads the recent history and the stored
//! artifact, runs one turn, then persists the reply. A fatal turn fault is
//! answered with [`GENERIC_FAILURE`] and no assistant message is stored.

use serde::Serialize;
use tracing::{error, info, warn};

use crate::agent::{ChatMessage, Pipeline, TurnState};
use crate::config::Config;
use crate::error::AppError;
use crate::llm::{LlmProvider, PromptTurn, providers};
use crate::prompt::{self, Prompts};
use crate::store::{self, ConversationInfo, Role, StoreHandle};
use crate::tools::knowledge::WikipediaClient;
use crate::tools::{KnowledgeSource, ToolId, ToolRegistry};

pub const GENERIC_FAILURE: &str = "I encountered an issue processing your request.";

/// What the user sees for one turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatReply {
    pub message: String,
    pub artifact: Option<String>,
    pub tools_used: Vec<ToolId>,
}

impl ChatReply {
    fn failure() -> Self {
        Self { message: GENERIC_FAILURE.to_string(), artifact: None, tools_used: Vec::new() }
    }
}

#[derive(Debug, Clone)]
pub struct ChatService {
    pipeline: Pipeline,
    store: StoreHandle,
    llm: LlmProvider,
    prompts: Prompts,
    history_window: usize,
}

impl ChatService {
    pub fn new(
        pipeline: Pipeline,
        store: StoreHandle,
        llm: LlmProvider,
        prompts: Prompts,
        history_window: usize,
    ) -> Self {
        Self { pipeline, store, llm, prompts, history_window }
    }

    /// Wire the configured provider, store, prompts and live knowledge source.
    pub fn from_config(config: &Config) -> Result<Self, AppError> {
        let llm = providers::build(&config.llm, config.llm_api_key.clone())?;
        let store = store::build(config)?;
        let prompts = Prompts::new(&config.prompts_dir);
        let wiki = WikipediaClient::from_config(&config.tools.wikipedia)
            .map_err(|e| AppError::Config(e.to_string()))?;
        Ok(Self::with_parts(llm, store, prompts, KnowledgeSource::Wikipedia(wiki), config))
    }

    /// Wire explicit collaborators; tool and history settings come from `config`.
    pub fn with_parts(
        llm: LlmProvider,
        store: StoreHandle,
        prompts: Prompts,
        knowledge: KnowledgeSource,
        config: &Config,
    ) -> Self {
        let registry = ToolRegistry::new(llm.clone(), prompts.clone(), store.clone(), knowledge);
        let pipeline = Pipeline::new(llm.clone(), prompts.clone(), registry, config.tools.clone());
        Self::new(pipeline, store, llm, prompts, config.store.history_window)
    }

    pub fn store(&self) -> &StoreHandle {
        &self.store
    }

    pub fn llm(&self) -> &LlmProvider {
        &self.llm
    }

    pub async fn create_conversation(&self, title: Option<&str>) -> Result<ConversationInfo, AppError> {
        let conv = self.store.create_conversation(title.unwrap_or_default()).await?;
        info!(conversation_id = %conv.id, title = %conv.title, "conversation created");
        Ok(conv)
    }

    pub async fn conversation(&self, id: &str) -> Result<Option<ConversationInfo>, AppError> {
        self.store.conversation(id).await
    }

    pub async fn artifact(&self, id: &str) -> Result<Option<String>, AppError> {
        self.store.artifact(id).await
    }

    /// Handle one user message.
    ///
    /// Errors only for invalid input or when the store cannot take the user
    /// message or load context; pipeline faults become the generic reply.
    pub async fn send(&self, conversation_id: &str, message: &str) -> Result<ChatReply, AppError> {
        if conversation_id.trim().is_empty() || message.trim().is_empty() {
            return Err(AppError::Chat("conversation id and message are required".into()));
        }
        if self.store.conversation(conversation_id).await?.is_none() {
            return Err(AppError::Chat(format!("conversation not found: {conversation_id}")));
        }

        // Measured before the append; the history window may be smaller than two.
        let first_message = self.store.recent_messages(conversation_id, 1).await?.is_empty();
        self.store.append_message(conversation_id, Role::User, message).await?;
        let history: Vec<ChatMessage> = self
            .store
            .recent_messages(conversation_id, self.history_window)
            .await?
            .into_iter()
            .map(ChatMessage::from)
            .collect();
        let artifact = self.store.artifact(conversation_id).await?.filter(|t| !t.is_empty());

        let result = match TurnState::new(conversation_id, history, artifact) {
            Ok(state) => self.pipeline.run_turn(state).await,
            Err(e) => Err(e),
        };
        let reply = match result {
            Ok(r) => ChatReply { message: r.message, artifact: r.artifact, tools_used: r.tools_used },
            Err(e) => {
                error!(conversation_id, error = %e, "turn failed");
                return Ok(ChatReply::failure());
            }
        };

        self.store.append_message(conversation_id, Role::Assistant, &reply.message).await?;
        info!(
            conversation_id,
            tools = ?reply.tools_used.iter().map(ToolId::as_str).collect::<Vec<_>>(),
            "turn completed"
        );

        if first_message {
            self.auto_title(conversation_id, message).await;
        }
        Ok(reply)
    }

    /// Name the conversation after its opening message. Failures are logged only.
    async fn auto_title(&self, conversation_id: &str, message: &str) {
        let prompt = self.prompts.render(prompt::TITLE, [("message", message)]);
        let title = match self.llm.complete_text(&[PromptTurn::user(prompt)]).await {
            Ok(raw) => clean_title(&raw),
            Err(e) => {
                warn!(conversation_id, error = %e, "failed to generate title");
                return;
            }
        };
        if title.is_empty() {
            warn!(conversation_id, "generated title was empty");
            return;
        }
        match self.store.set_title(conversation_id, &title).await {
            Ok(()) => info!(conversation_id, title = %title, "conversation titled"),
            Err(e) => warn!(conversation_id, error = %e, "failed to store title"),
        }
    }
}

/// Remove every quote character, then trim.
pub fn clean_title(raw: &str) -> String {
    raw.chars().filter(|c| !matches!(c, '"' | '\'')).collect::<String>().trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_title_strips_quotes() {
        assert_eq!(clean_title("  \"Cover Letter Draft\"\n"), "Cover Letter Draft");
        assert_eq!(clean_title("'Rust's History'"), "Rusts History");
        assert_eq!(clean_title("\"\""), "");
    }
}
