//! Dummy LLM provider: echoes the last user turn back prefixed with `[echo]`.
//! Lets the console run end-to-end without an API key.

use crate::llm::{LlmResponse, PromptRole, PromptTurn, ProviderError};

#[derive(Debug, Clone)]
pub struct DummyProvider;

impl DummyProvider {
    pub async fn complete(&self, turns: &[PromptTurn]) -> Result<LlmResponse, ProviderError> {
        let content = turns
            .iter()
            .rev()
            .find(|t| t.role == PromptRole::User)
            .map(|t| t.content.as_str())
            .unwrap_or_default();
        Ok(LlmResponse { text: format!("[echo] {content}"), usage: None })
    }
}
