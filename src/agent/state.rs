//! Per-turn state and the partial updates stages return.
//!
//! A [`TurnState`] is an immutable snapshot. Stages read it and return a
//! [`StateUpdate`]; only the pipeline driver merges updates, producing the
//! next snapshot. Fields absent from an update keep their previous value.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::store::{Role, StoredMessage};
use crate::tools::{ToolId, ToolOutcome};

use super::pipeline::PipelineError;

// ── Intent ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    CreateText,
    UpdateText,
    AskQuestion,
    Research,
    Calculate,
}

impl Intent {
    pub const ALL: [Intent; 5] = [
        Intent::CreateText,
        Intent::UpdateText,
        Intent::AskQuestion,
        Intent::Research,
        Intent::Calculate,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Intent::CreateText => "create_text",
            Intent::UpdateText => "update_text",
            Intent::AskQuestion => "ask_question",
            Intent::Research => "research",
            Intent::Calculate => "calculate",
        }
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Intent {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Intent::ALL
            .into_iter()
            .find(|i| i.as_str() == s)
            .ok_or_else(|| format!("unknown intent: {s}"))
    }
}

// ── Messages and results ──────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: Role::Assistant, content: content.into() }
    }
}

impl From<StoredMessage> for ChatMessage {
    fn from(m: StoredMessage) -> Self {
        Self { role: m.role, content: m.content }
    }
}

/// What a turn hands back to its caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinalResult {
    pub message: String,
    pub artifact: Option<String>,
    pub tools_used: Vec<ToolId>,
}

/// Outcomes keyed by tool, in first-execution order. Re-inserting a tool
/// replaces its outcome in place.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToolOutcomes(Vec<(ToolId, ToolOutcome)>);

impl ToolOutcomes {
    pub fn insert(&mut self, tool: ToolId, outcome: ToolOutcome) {
        match self.0.iter_mut().find(|(t, _)| *t == tool) {
            Some(slot) => slot.1 = outcome,
            None => self.0.push((tool, outcome)),
        }
    }

    pub fn get(&self, tool: ToolId) -> Option<&ToolOutcome> {
        self.0.iter().find(|(t, _)| *t == tool).map(|(_, o)| o)
    }

    pub fn contains(&self, tool: ToolId) -> bool {
        self.get(tool).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ToolId, &ToolOutcome)> {
        self.0.iter().map(|(t, o)| (*t, o))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

// ── State ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct TurnState {
    messages: Vec<ChatMessage>,
    conversation_id: String,
    current_artifact: Option<String>,
    classified_intent: Option<Intent>,
    needs_artifact: bool,
    classifier_fallback: bool,
    selected_tools: Vec<ToolId>,
    tool_outcomes: ToolOutcomes,
    final_result: Option<FinalResult>,
}

impl TurnState {
    /// Fresh state for one turn, from persisted history and artifact.
    pub fn new(
        conversation_id: impl Into<String>,
        messages: Vec<ChatMessage>,
        current_artifact: Option<String>,
    ) -> Result<Self, PipelineError> {
        let conversation_id = conversation_id.into();
        if conversation_id.trim().is_empty() {
            return Err(PipelineError::InvalidState("conversation id is empty".into()));
        }
        Ok(Self {
            messages,
            conversation_id,
            current_artifact,
            classified_intent: None,
            needs_artifact: false,
            classifier_fallback: false,
            selected_tools: Vec::new(),
            tool_outcomes: ToolOutcomes::default(),
            final_result: None,
        })
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// Content of the most recent user message, or `""` when there is none.
    pub fn latest_user_message(&self) -> &str {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.as_str())
            .unwrap_or("")
    }

    pub fn conversation_id(&self) -> &str {
        &self.conversation_id
    }

    pub fn current_artifact(&self) -> Option<&str> {
        self.current_artifact.as_deref()
    }

    pub fn classified_intent(&self) -> Option<Intent> {
        self.classified_intent
    }

    pub fn needs_artifact(&self) -> bool {
        self.needs_artifact
    }

    /// Whether classification fell back to the default intent.
    pub fn classifier_fallback(&self) -> bool {
        self.classifier_fallback
    }

    pub fn selected_tools(&self) -> &[ToolId] {
        &self.selected_tools
    }

    pub fn tool_outcomes(&self) -> &ToolOutcomes {
        &self.tool_outcomes
    }

    pub fn final_result(&self) -> Option<&FinalResult> {
        self.final_result.as_ref()
    }

    pub fn into_final_result(self) -> Option<FinalResult> {
        self.final_result
    }

    /// Next snapshot: every field present in `update` overwrites, the rest
    /// carries over.
    pub(crate) fn merge(self, update: StateUpdate) -> Self {
        Self {
            messages: self.messages,
            conversation_id: self.conversation_id,
            current_artifact: match update.current_artifact {
                Some(next) => next,
                None => self.current_artifact,
            },
            classified_intent: update.classified_intent.or(self.classified_intent),
            needs_artifact: update.needs_artifact.unwrap_or(self.needs_artifact),
            classifier_fallback: update.classifier_fallback.unwrap_or(self.classifier_fallback),
            selected_tools: update.selected_tools.unwrap_or(self.selected_tools),
            tool_outcomes: update.tool_outcomes.unwrap_or(self.tool_outcomes),
            final_result: update.final_result.or(self.final_result),
        }
    }
}

/// Partial update returned by a stage.
///
/// `current_artifact` is doubly optional: `None` leaves the artifact alone,
/// `Some(None)` clears it.
#[derive(Debug, Clone, Default)]
pub struct StateUpdate {
    pub current_artifact: Option<Option<String>>,
    pub classified_intent: Option<Intent>,
    pub needs_artifact: Option<bool>,
    pub classifier_fallback: Option<bool>,
    pub selected_tools: Option<Vec<ToolId>>,
    pub tool_outcomes: Option<ToolOutcomes>,
    pub final_result: Option<FinalResult>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::ToolPayload;

    fn state() -> TurnState {
        TurnState::new(
            "c1",
            vec![ChatMessage::user("first"), ChatMessage::assistant("reply"), ChatMessage::user("second")],
            Some("Draft A".into()),
        )
        .unwrap()
    }

    #[test]
    fn empty_conversation_id_rejected() {
        assert!(TurnState::new("  ", vec![], None).is_err());
    }

    #[test]
    fn latest_user_message_skips_assistant_turns() {
        let mut s = state();
        assert_eq!(s.latest_user_message(), "second");
        s = TurnState::new("c1", vec![], None).unwrap();
        assert_eq!(s.latest_user_message(), "");
    }

    #[test]
    fn absent_fields_carry_over() {
        let s = state().merge(StateUpdate {
            classified_intent: Some(Intent::Research),
            needs_artifact: Some(true),
            ..Default::default()
        });
        let s = s.merge(StateUpdate::default());
        assert_eq!(s.classified_intent(), Some(Intent::Research));
        assert!(s.needs_artifact());
        assert_eq!(s.current_artifact(), Some("Draft A"));
    }

    #[test]
    fn explicit_none_and_false_are_honoured() {
        let s = state().merge(StateUpdate { needs_artifact: Some(true), ..Default::default() });
        let s = s.merge(StateUpdate {
            current_artifact: Some(None),
            needs_artifact: Some(false),
            ..Default::default()
        });
        assert_eq!(s.current_artifact(), None);
        assert!(!s.needs_artifact());
    }

    #[test]
    fn outcomes_overwrite_in_place() {
        let mut outcomes = ToolOutcomes::default();
        outcomes.insert(ToolId::ConversationMemory, ToolOutcome::Failed { error: "x".into() });
        outcomes.insert(ToolId::Calculator, ToolOutcome::Failed { error: "y".into() });
        outcomes.insert(
            ToolId::ConversationMemory,
            ToolOutcome::Succeeded(ToolPayload::History { messages: vec![], count: 0 }),
        );
        assert_eq!(outcomes.len(), 2);
        let order: Vec<_> = outcomes.iter().map(|(t, _)| t).collect();
        assert_eq!(order, [ToolId::ConversationMemory, ToolId::Calculator]);
        assert!(outcomes.get(ToolId::ConversationMemory).unwrap().succeeded());
    }

    #[test]
    fn intent_names() {
        for intent in Intent::ALL {
            assert_eq!(intent.as_str().parse::<Intent>().unwrap(), intent);
        }
        assert!("chitchat".parse::<Intent>().is_err());
    }
}
