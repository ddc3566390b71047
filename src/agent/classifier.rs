//! Intent classification.
//!
//! The language collaborator judges the intent; this module validates its
//! JSON reply. Anything unusable takes the fallback branch:
//! `ask_question` with no artifact needed, logged at `warn` and flagged in
//! the [`Classification`].

use serde::Deserialize;
use tracing::{debug, warn};

use crate::llm::{LlmProvider, PromptTurn};
use crate::prompt::{self, Prompts};

use super::state::{Intent, StateUpdate, TurnState};

/// Why classification fell back to the default intent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fallback {
    /// The collaborator call itself failed.
    ProviderFault(String),
    /// The reply was not the expected JSON object.
    Unparsable(String),
    /// The reply named an intent outside the closed set.
    UnknownIntent(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub intent: Intent,
    pub needs_artifact: bool,
    pub description: Option<String>,
    /// Set when the default intent was used instead of the collaborator's.
    pub fallback: Option<Fallback>,
}

impl Classification {
    fn fallback(reason: Fallback) -> Self {
        warn!(reason = ?reason, "intent classification fell back to ask_question");
        Self { intent: Intent::AskQuestion, needs_artifact: false, description: None, fallback: Some(reason) }
    }

    pub fn is_fallback(&self) -> bool {
        self.fallback.is_some()
    }

    pub fn into_update(self) -> StateUpdate {
        StateUpdate {
            classified_intent: Some(self.intent),
            needs_artifact: Some(self.needs_artifact),
            classifier_fallback: Some(self.fallback.is_some()),
            ..Default::default()
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawClassification {
    intent: String,
    #[serde(default, alias = "needs_text", rename = "needsText")]
    needs_text: bool,
    #[serde(default)]
    description: Option<String>,
}

/// Validate a raw collaborator reply.
pub fn parse(reply: &str) -> Classification {
    let body = strip_code_fence(reply);
    let raw: RawClassification = match serde_json::from_str(body) {
        Ok(raw) => raw,
        Err(e) => return Classification::fallback(Fallback::Unparsable(e.to_string())),
    };
    match raw.intent.trim().parse::<Intent>() {
        Ok(intent) => Classification {
            intent,
            needs_artifact: raw.needs_text,
            description: raw.description.filter(|d| !d.trim().is_empty()),
            fallback: None,
        },
        Err(_) => Classification::fallback(Fallback::UnknownIntent(raw.intent)),
    }
}

/// Models often wrap JSON in a Markdown fence; accept that, nothing looser.
fn strip_code_fence(reply: &str) -> &str {
    let trimmed = reply.trim();
    let Some(inner) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let inner = inner.strip_prefix("json").unwrap_or(inner);
    inner.strip_suffix("```").unwrap_or(inner).trim()
}

/// Classify the latest user message of `state`. Never fails.
pub async fn classify(llm: &LlmProvider, prompts: &Prompts, state: &TurnState) -> Classification {
    let message_count = state.messages().len().to_string();
    let has_text = state.current_artifact().is_some_and(|t| !t.is_empty()).to_string();
    let system = prompts.builder().layer(prompt::CLASSIFY_SYSTEM).build();
    let user = prompts.render(
        prompt::CLASSIFY,
        [
            ("message", state.latest_user_message()),
            ("has_text", has_text.as_str()),
            ("message_count", message_count.as_str()),
        ],
    );

    let classification = match llm.complete_text(&[PromptTurn::system(system), PromptTurn::user(user)]).await {
        Ok(reply) => parse(&reply),
        Err(e) => Classification::fallback(Fallback::ProviderFault(e.to_string())),
    };
    debug!(
        intent = %classification.intent,
        needs_artifact = classification.needs_artifact,
        fallback = classification.is_fallback(),
        "classified"
    );
    classification
}
