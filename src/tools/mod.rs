//! Tool registry: the fixed set of capabilities the pipeline can invoke.
//!
//! Every tool is a variant of the closed [`ToolId`] enum; [`ToolRegistry::execute`]
//! dispatches on the matching [`ToolInput`] variant and always yields exactly
//! one [`ToolOutcome`]. Faults inside a tool body are converted to
//! [`ToolOutcome::Failed`] at this boundary and never propagate.

pub mod artifact;
pub mod calc;
pub mod extract;
pub mod history;
pub mod knowledge;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;
use tracing::{debug, warn};

use crate::error::AppError;
use crate::llm::{LlmProvider, ProviderError};
use crate::prompt::Prompts;
use crate::store::StoreHandle;

pub use history::HistoryEntry;
pub use knowledge::{KnowledgeEntry, KnowledgeSource};

// ── Identity ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolId {
    ReadText,
    WriteText,
    UpdateText,
    WikipediaSearch,
    Calculator,
    ConversationMemory,
}

impl ToolId {
    pub const ALL: [ToolId; 6] = [
        ToolId::ReadText,
        ToolId::WriteText,
        ToolId::UpdateText,
        ToolId::WikipediaSearch,
        ToolId::Calculator,
        ToolId::ConversationMemory,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ToolId::ReadText => "read_text",
            ToolId::WriteText => "write_text",
            ToolId::UpdateText => "update_text",
            ToolId::WikipediaSearch => "wikipedia_search",
            ToolId::Calculator => "calculator",
            ToolId::ConversationMemory => "conversation_memory",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            ToolId::ReadText => "Read the current text content from the editor.",
            ToolId::WriteText => "Generate new text from a prompt and place it in the editor.",
            ToolId::UpdateText => "Revise the existing editor text according to an instruction.",
            ToolId::WikipediaSearch => "Search Wikipedia for factual background information.",
            ToolId::Calculator => "Evaluate an arithmetic expression.",
            ToolId::ConversationMemory => "Recall the most recent messages of the conversation.",
        }
    }

    /// Whether a successful run of this tool replaces the current artifact.
    pub fn touches_artifact(&self) -> bool {
        matches!(self, ToolId::ReadText | ToolId::WriteText | ToolId::UpdateText)
    }
}

impl fmt::Display for ToolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ToolId {
    type Err = ToolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ToolId::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| ToolError::UnknownTool(s.to_string()))
    }
}

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("unknown tool: {0}")]
    UnknownTool(String),
    #[error("language model: {0}")]
    Llm(#[from] ProviderError),
    #[error("{0}")]
    Store(#[from] AppError),
    #[error("lookup failed: {0}")]
    Lookup(String),
    #[error("invalid expression: {0}")]
    Calc(#[from] calc::CalcError),
    #[error("{0}")]
    Precondition(String),
}

// ── Inputs and outputs ────────────────────────────────────────────────────────

/// Tool-specific input, built by the executor from the turn state.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolInput {
    ReadText { conversation_id: String },
    WriteText { conversation_id: String, prompt: String, style: String },
    UpdateText { conversation_id: String, current_text: String, instruction: String },
    WikipediaSearch { query: String, max_results: usize },
    Calculator { expression: String },
    ConversationMemory { conversation_id: String, last_n: usize },
}

impl ToolInput {
    pub fn tool(&self) -> ToolId {
        match self {
            ToolInput::ReadText { .. } => ToolId::ReadText,
            ToolInput::WriteText { .. } => ToolId::WriteText,
            ToolInput::UpdateText { .. } => ToolId::UpdateText,
            ToolInput::WikipediaSearch { .. } => ToolId::WikipediaSearch,
            ToolInput::Calculator { .. } => ToolId::Calculator,
            ToolInput::ConversationMemory { .. } => ToolId::ConversationMemory,
        }
    }
}

/// Successful tool result.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolPayload {
    Read { text: Option<String>, has_text: bool },
    Write { text: String, word_count: usize },
    Update { text: String, changes_applied: String, word_count: usize },
    Lookup { query: String, results: Vec<KnowledgeEntry> },
    Calc { expression: String, result: f64 },
    History { messages: Vec<HistoryEntry>, count: usize },
}

impl ToolPayload {
    /// Text that becomes the current artifact, if this payload carries one.
    pub fn artifact_text(&self) -> Option<&str> {
        match self {
            ToolPayload::Read { text, .. } => text.as_deref(),
            ToolPayload::Write { text, .. } | ToolPayload::Update { text, .. } => Some(text),
            _ => None,
        }
    }

    /// Summary handed to the response synthesizer. Artifact text is left out
    /// so it cannot leak into the chat reply.
    pub fn evidence(&self) -> serde_json::Value {
        match self {
            ToolPayload::Read { has_text, text } => json!({
                "hasText": has_text,
                "wordCount": text.as_deref().map(extract::word_count).unwrap_or(0),
            }),
            ToolPayload::Write { word_count, .. } => json!({ "wordCount": word_count }),
            ToolPayload::Update { changes_applied, word_count, .. } => json!({
                "changesApplied": changes_applied,
                "wordCount": word_count,
            }),
            ToolPayload::Lookup { query, results } => json!({ "query": query, "results": results }),
            ToolPayload::Calc { expression, result } => json!({
                "expression": expression,
                "result": calc::format_number(*result),
            }),
            ToolPayload::History { messages, count } => json!({
                "count": count,
                "messages": messages,
            }),
        }
    }
}

/// Result of exactly one tool execution.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolOutcome {
    Succeeded(ToolPayload),
    Failed { error: String },
}

impl ToolOutcome {
    pub fn succeeded(&self) -> bool {
        matches!(self, ToolOutcome::Succeeded(_))
    }

    pub fn payload(&self) -> Option<&ToolPayload> {
        match self {
            ToolOutcome::Succeeded(p) => Some(p),
            ToolOutcome::Failed { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            ToolOutcome::Succeeded(_) => None,
            ToolOutcome::Failed { error } => Some(error),
        }
    }
}

// ── Registry ──────────────────────────────────────────────────────────────────

/// The tool bodies plus the collaborators they call. Cheap to clone.
#[derive(Debug, Clone)]
pub struct ToolRegistry {
    llm: LlmProvider,
    prompts: Prompts,
    store: StoreHandle,
    knowledge: KnowledgeSource,
}

impl ToolRegistry {
    pub fn new(
        llm: LlmProvider,
        prompts: Prompts,
        store: StoreHandle,
        knowledge: KnowledgeSource,
    ) -> Self {
        Self { llm, prompts, store, knowledge }
    }

    /// Run one tool. Never fails; faults become [`ToolOutcome::Failed`].
    pub async fn execute(&self, input: ToolInput) -> ToolOutcome {
        let tool = input.tool();
        debug!(tool = %tool, "executing tool");

        let result = match input {
            ToolInput::ReadText { conversation_id } => {
                artifact::read(&self.store, &conversation_id).await
            }
            ToolInput::WriteText { conversation_id, prompt, style } => {
                artifact::write(&self.llm, &self.prompts, &self.store, &conversation_id, &prompt, &style)
                    .await
            }
            ToolInput::UpdateText { conversation_id, current_text, instruction } => {
                artifact::update(
                    &self.llm,
                    &self.prompts,
                    &self.store,
                    &conversation_id,
                    &current_text,
                    &instruction,
                )
                .await
            }
            ToolInput::WikipediaSearch { query, max_results } => self
                .knowledge
                .lookup(&query, max_results)
                .await
                .map(|results| ToolPayload::Lookup { query, results }),
            ToolInput::Calculator { expression } => calc::evaluate(&expression)
                .map(|result| ToolPayload::Calc { expression, result })
                .map_err(ToolError::from),
            ToolInput::ConversationMemory { conversation_id, last_n } => {
                history::recall(&self.store, &conversation_id, last_n).await
            }
        };

        match result {
            Ok(payload) => ToolOutcome::Succeeded(payload),
            Err(e) => {
                warn!(tool = %tool, error = %e, "tool failed");
                ToolOutcome::Failed { error: e.to_string() }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::llm::providers::scripted::ScriptedProvider;
    use crate::store::stores::memory::InMemoryStore;
    use crate::store::Role;
    use knowledge::FixedKnowledge;

    fn registry(llm: ScriptedProvider, knowledge: KnowledgeSource) -> (ToolRegistry, StoreHandle) {
        let store = StoreHandle::new(Arc::new(InMemoryStore::new()));
        let reg = ToolRegistry::new(LlmProvider::Scripted(llm), Prompts::builtin(), store.clone(), knowledge);
        (reg, store)
    }

    #[test]
    fn tool_ids_round_trip_through_names() {
        for id in ToolId::ALL {
            assert_eq!(id.as_str().parse::<ToolId>().unwrap(), id);
            assert_eq!(serde_json::to_value(id).unwrap(), id.as_str());
        }
        assert!("delete_everything".parse::<ToolId>().is_err());
    }

    #[tokio::test]
    async fn write_saves_artifact_and_counts_words() {
        let llm = ScriptedProvider::with_replies(["Dear team, thank you."]);
        let (reg, store) = registry(llm.clone(), KnowledgeSource::Fixed(FixedKnowledge::default()));
        let conv = store.create_conversation("").await.unwrap();

        let outcome = reg
            .execute(ToolInput::WriteText {
                conversation_id: conv.id.clone(),
                prompt: "write a thank-you note".into(),
                style: "professional".into(),
            })
            .await;

        assert_eq!(
            outcome,
            ToolOutcome::Succeeded(ToolPayload::Write { text: "Dear team, thank you.".into(), word_count: 4 })
        );
        assert_eq!(store.artifact(&conv.id).await.unwrap().as_deref(), Some("Dear team, thank you."));
        let sent = llm.received();
        assert!(sent[0][0].content.contains("professional"));
        assert_eq!(sent[0][1].content, "write a thank-you note");
    }

    #[tokio::test]
    async fn llm_fault_becomes_failed_outcome() {
        let llm = ScriptedProvider::new();
        llm.push_fault("model overloaded");
        let (reg, store) = registry(llm, KnowledgeSource::Fixed(FixedKnowledge::default()));
        let conv = store.create_conversation("").await.unwrap();

        let outcome = reg
            .execute(ToolInput::UpdateText {
                conversation_id: conv.id.clone(),
                current_text: "Draft A".into(),
                instruction: "shorter".into(),
            })
            .await;

        assert!(!outcome.succeeded());
        assert!(outcome.error().unwrap().contains("model overloaded"));
        assert_eq!(store.artifact(&conv.id).await.unwrap(), None);
    }

    #[tokio::test]
    async fn calculator_and_lookup() {
        let entries = vec![KnowledgeEntry {
            title: "Rust".into(),
            summary: "A language.".into(),
            url: "https://en.wikipedia.org/wiki/Rust".into(),
        }];
        let (reg, _store) =
            registry(ScriptedProvider::new(), KnowledgeSource::Fixed(FixedKnowledge::new(entries)));

        let calc = reg.execute(ToolInput::Calculator { expression: "12 * 4".into() }).await;
        assert_eq!(
            calc.payload(),
            Some(&ToolPayload::Calc { expression: "12 * 4".into(), result: 48.0 })
        );

        let bad = reg.execute(ToolInput::Calculator { expression: "12 *".into() }).await;
        assert!(bad.error().unwrap().starts_with("invalid expression"));

        let hits = reg
            .execute(ToolInput::WikipediaSearch { query: "Rust".into(), max_results: 2 })
            .await;
        match hits.payload() {
            Some(ToolPayload::Lookup { results, .. }) => assert_eq!(results.len(), 1),
            other => panic!("unexpected payload: {other:?}"),
        }
    }

    #[tokio::test]
    async fn history_and_read() {
        let (reg, store) =
            registry(ScriptedProvider::new(), KnowledgeSource::Fixed(FixedKnowledge::default()));
        let conv = store.create_conversation("").await.unwrap();
        store.append_message(&conv.id, Role::User, "hello").await.unwrap();

        let read = reg.execute(ToolInput::ReadText { conversation_id: conv.id.clone() }).await;
        assert_eq!(read.payload(), Some(&ToolPayload::Read { text: None, has_text: false }));

        let recall = reg
            .execute(ToolInput::ConversationMemory { conversation_id: conv.id.clone(), last_n: 5 })
            .await;
        match recall.payload() {
            Some(ToolPayload::History { count, messages }) => {
                assert_eq!(*count, 1);
                assert_eq!(messages[0].content, "hello");
            }
            other => panic!("unexpected payload: {other:?}"),
        }
    }

    #[test]
    fn evidence_never_carries_artifact_text() {
        let p = ToolPayload::Write { text: "SECRET BODY".into(), word_count: 2 };
        assert!(!p.evidence().to_string().contains("SECRET"));
        assert_eq!(p.artifact_text(), Some("SECRET BODY"));
        let calc = ToolPayload::Calc { expression: "12 * 4".into(), result: 48.0 };
        assert_eq!(calc.evidence()["result"], "48");
    }
}
