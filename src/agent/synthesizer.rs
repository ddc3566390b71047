//! Synthesizing stage: phrase the chat reply from what the tools did.

use tracing::debug;

use crate::llm::{LlmProvider, PromptTurn};
use crate::prompt::{self, Prompts};

use super::pipeline::PipelineError;
use super::state::{FinalResult, StateUpdate, ToolOutcomes, TurnState};

const NO_EVIDENCE: &str = "(no tool results)";

/// One `- tool: {json}` line per successful outcome, in execution order.
pub fn evidence(outcomes: &ToolOutcomes) -> String {
    let lines: Vec<String> = outcomes
        .iter()
        .filter_map(|(tool, outcome)| outcome.payload().map(|p| (tool, p)))
        .map(|(tool, payload)| format!("- {tool}: {}", payload.evidence()))
        .collect();
    if lines.is_empty() { NO_EVIDENCE.to_string() } else { lines.join("\n") }
}

pub async fn synthesize(
    llm: &LlmProvider,
    prompts: &Prompts,
    state: &TurnState,
) -> Result<StateUpdate, PipelineError> {
    let intent = state.classified_intent().ok_or(PipelineError::MissingIntent)?;
    let evidence = evidence(state.tool_outcomes());
    let system = prompts.builder().layer(prompt::RESPOND_SYSTEM).build();
    let user = prompts.render(
        prompt::RESPOND,
        [
            ("message", state.latest_user_message()),
            ("intent", intent.as_str()),
            ("evidence", evidence.as_str()),
        ],
    );

    let reply = llm
        .complete_text(&[PromptTurn::system(system), PromptTurn::user(user)])
        .await
        .map_err(PipelineError::Synthesis)?;
    debug!(chars = reply.len(), "reply synthesized");

    Ok(StateUpdate {
        final_result: Some(FinalResult {
            message: reply.trim().to_string(),
            artifact: state.current_artifact().map(str::to_string),
            tools_used: state.selected_tools().to_vec(),
        }),
        ..Default::default()
    })
}
