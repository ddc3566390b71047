//! Tool selection policy. Pure: same inputs, same list.

use crate::tools::ToolId;
use crate::tools::extract::is_greeting;

use super::pipeline::PipelineError;
use super::state::{Intent, StateUpdate, TurnState};

/// Ordered, duplicate-free tool list for `intent` and the user's `message`.
pub fn select_tools(intent: Intent, message: &str) -> Vec<ToolId> {
    let mut tools = vec![ToolId::ConversationMemory];

    let lowered = message.to_lowercase();
    if intent == Intent::UpdateText || lowered.contains("current") || lowered.contains("existing") {
        push_unique(&mut tools, ToolId::ReadText);
    }

    match intent {
        Intent::CreateText => {
            if !is_greeting(message) {
                push_unique(&mut tools, ToolId::WriteText);
            }
        }
        Intent::UpdateText => {
            push_unique(&mut tools, ToolId::ReadText);
            push_unique(&mut tools, ToolId::UpdateText);
        }
        Intent::Research => push_unique(&mut tools, ToolId::WikipediaSearch),
        Intent::Calculate => push_unique(&mut tools, ToolId::Calculator),
        Intent::AskQuestion => {}
    }
    tools
}

fn push_unique(tools: &mut Vec<ToolId>, tool: ToolId) {
    if !tools.contains(&tool) {
        tools.push(tool);
    }
}

/// Selecting stage. Fails only if classification has not run.
pub fn select(state: &TurnState) -> Result<StateUpdate, PipelineError> {
    let intent = state.classified_intent().ok_or(PipelineError::MissingIntent)?;
    let tools = select_tools(intent, state.latest_user_message());
    tracing::debug!(
        intent = %intent,
        tools = ?tools.iter().map(ToolId::as_str).collect::<Vec<_>>(),
        "tools selected"
    );
    Ok(StateUpdate { selected_tools: Some(tools), ..Default::default() })
}
