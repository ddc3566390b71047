//! Executing stage: run the selected tools in order.
//!
//! Each tool's input is built from the state plus the artifact as it stands
//! after the previous tools, so a `read_text` ahead of `update_text` feeds
//! the update. A tool whose precondition does not hold is skipped and leaves
//! no outcome.

use tracing::debug;

use crate::config::ToolsConfig;
use crate::tools::extract;
use crate::tools::{ToolId, ToolInput, ToolRegistry};

use super::state::{StateUpdate, ToolOutcomes, TurnState};

/// Input for `tool`, or `None` when the tool should not run this turn.
pub fn build_input(
    tool: ToolId,
    state: &TurnState,
    current_artifact: Option<&str>,
    settings: &ToolsConfig,
) -> Option<ToolInput> {
    let conversation_id = state.conversation_id().to_string();
    let message = state.latest_user_message();

    match tool {
        ToolId::ReadText => Some(ToolInput::ReadText { conversation_id }),
        ToolId::WriteText => Some(ToolInput::WriteText {
            conversation_id,
            prompt: message.to_string(),
            style: settings.write_style.clone(),
        }),
        ToolId::UpdateText => current_artifact.filter(|t| !t.is_empty()).map(|text| {
            ToolInput::UpdateText {
                conversation_id,
                current_text: text.to_string(),
                instruction: message.to_string(),
            }
        }),
        ToolId::WikipediaSearch => Some(ToolInput::WikipediaSearch {
            query: extract::lookup_query(message),
            max_results: settings.lookup_max_results,
        }),
        ToolId::Calculator => {
            extract::math_expression(message).map(|expression| ToolInput::Calculator { expression })
        }
        ToolId::ConversationMemory => Some(ToolInput::ConversationMemory {
            conversation_id,
            last_n: settings.history_last_n,
        }),
    }
}

pub async fn execute(registry: &ToolRegistry, settings: &ToolsConfig, state: &TurnState) -> StateUpdate {
    let mut outcomes = ToolOutcomes::default();
    let mut artifact = state.current_artifact().map(str::to_string);

    for &tool in state.selected_tools() {
        let Some(input) = build_input(tool, state, artifact.as_deref(), settings) else {
            debug!(tool = %tool, "tool skipped: precondition not met");
            continue;
        };
        let outcome = registry.execute(input).await;
        if tool.touches_artifact() {
            if let Some(text) = outcome.payload().and_then(|p| p.artifact_text()) {
                artifact = Some(text.to_string());
            }
        }
        debug!(tool = %tool, succeeded = outcome.succeeded(), "tool finished");
        outcomes.insert(tool, outcome);
    }

    StateUpdate {
        tool_outcomes: Some(outcomes),
        current_artifact: Some(artifact),
        ..Default::default()
    }
}
