//! Editor artifact tools: `read_text`, `write_text`, `update_text`.
//!
//! Write and update generate text through the language collaborator, then
//! persist it as the conversation's artifact before reporting success.

use tracing::debug;

use crate::llm::{LlmProvider, PromptTurn};
use crate::prompt::{self, Prompts};
use crate::store::StoreHandle;

use super::extract::word_count;
use super::{ToolError, ToolPayload};

pub async fn read(store: &StoreHandle, conversation_id: &str) -> Result<ToolPayload, ToolError> {
    let text = store.artifact(conversation_id).await?;
    let has_text = text.as_deref().is_some_and(|t| !t.is_empty());
    Ok(ToolPayload::Read { text: text.filter(|t| !t.is_empty()), has_text })
}

pub async fn write(
    llm: &LlmProvider,
    prompts: &Prompts,
    store: &StoreHandle,
    conversation_id: &str,
    prompt_text: &str,
    style: &str,
) -> Result<ToolPayload, ToolError> {
    let system = prompts.render(prompt::WRITE_SYSTEM, [("style", style)]);
    let text = llm
        .complete_text(&[PromptTurn::system(system), PromptTurn::user(prompt_text)])
        .await?;

    store.save_artifact(conversation_id, &text).await?;
    let words = word_count(&text);
    debug!(conversation_id, words, "artifact written");
    Ok(ToolPayload::Write { text, word_count: words })
}

pub async fn update(
    llm: &LlmProvider,
    prompts: &Prompts,
    store: &StoreHandle,
    conversation_id: &str,
    current_text: &str,
    instruction: &str,
) -> Result<ToolPayload, ToolError> {
    if current_text.is_empty() {
        return Err(ToolError::Precondition("no text to update; use write_text instead".into()));
    }
    let system = prompts.builder().layer(prompt::UPDATE_SYSTEM).build();
    let user = prompts.render(
        prompt::UPDATE,
        [("text", current_text), ("instruction", instruction)],
    );
    let text = llm.complete_text(&[PromptTurn::system(system), PromptTurn::user(user)]).await?;

    store.save_artifact(conversation_id, &text).await?;
    let words = word_count(&text);
    debug!(conversation_id, words, "artifact updated");
    Ok(ToolPayload::Update { text, changes_applied: instruction.to_string(), word_count: words })
}
