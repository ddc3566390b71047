//! Pipeline driver: one linear pass per chat turn.
//!
//! ```text
//! Start ─► Classifying ─► Selecting ─► Executing ─► Synthesizing ─► Done
//! ```
//!
//! Stages see an immutable [`TurnState`] and return a [`StateUpdate`]; the
//! driver is the only place updates are merged. Classification never fails.
//! A selecting or synthesizing fault ends the turn with [`PipelineError`].

use std::fmt;

use thiserror::Error;
use tracing::{debug, info};

use crate::config::ToolsConfig;
use crate::llm::{LlmProvider, ProviderError};
use crate::prompt::Prompts;
use crate::tools::ToolRegistry;

use super::state::{FinalResult, StateUpdate, TurnState};
use super::{classifier, executor, selector, synthesizer};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("invalid turn state: {0}")]
    InvalidState(String),
    #[error("tool selection ran before classification")]
    MissingIntent,
    #[error("reply synthesis failed: {0}")]
    Synthesis(#[source] ProviderError),
    #[error("turn finished without a result")]
    MissingResult,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Start,
    Classifying,
    Selecting,
    Executing,
    Synthesizing,
    Done,
}

impl Stage {
    /// The only successor of each stage. `Done` has none.
    pub fn next(self) -> Option<Stage> {
        match self {
            Stage::Start => Some(Stage::Classifying),
            Stage::Classifying => Some(Stage::Selecting),
            Stage::Selecting => Some(Stage::Executing),
            Stage::Executing => Some(Stage::Synthesizing),
            Stage::Synthesizing => Some(Stage::Done),
            Stage::Done => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Start => "start",
            Stage::Classifying => "classifying",
            Stage::Selecting => "selecting",
            Stage::Executing => "executing",
            Stage::Synthesizing => "synthesizing",
            Stage::Done => "done",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything a turn needs besides its state. Cheap to clone.
#[derive(Debug, Clone)]
pub struct Pipeline {
    llm: LlmProvider,
    prompts: Prompts,
    registry: ToolRegistry,
    tools: ToolsConfig,
}

impl Pipeline {
    pub fn new(llm: LlmProvider, prompts: Prompts, registry: ToolRegistry, tools: ToolsConfig) -> Self {
        Self { llm, prompts, registry, tools }
    }

    /// Run one turn and return only the externally consumed result.
    pub async fn run_turn(&self, initial: TurnState) -> Result<FinalResult, PipelineError> {
        self.run(initial).await?.into_final_result().ok_or(PipelineError::MissingResult)
    }

    /// Run one turn and return the final state, outcomes included.
    pub async fn run(&self, initial: TurnState) -> Result<TurnState, PipelineError> {
        info!(
            conversation_id = initial.conversation_id(),
            messages = initial.messages().len(),
            has_artifact = initial.current_artifact().is_some(),
            "turn started"
        );

        let mut state = initial;
        let mut stage = Stage::Start;
        while let Some(next) = stage.next() {
            stage = next;
            debug!(stage = %stage, "pipeline stage");
            let update = match stage {
                Stage::Start | Stage::Done => StateUpdate::default(),
                Stage::Classifying => {
                    classifier::classify(&self.llm, &self.prompts, &state).await.into_update()
                }
                Stage::Selecting => selector::select(&state)?,
                Stage::Executing => executor::execute(&self.registry, &self.tools, &state).await,
                Stage::Synthesizing => synthesizer::synthesize(&self.llm, &self.prompts, &state).await?,
            };
            state = state.merge(update);
        }

        info!(
            conversation_id = state.conversation_id(),
            intent = ?state.classified_intent(),
            tools = state.selected_tools().len(),
            outcomes = state.tool_outcomes().len(),
            "turn finished"
        );
        Ok(state)
    }
}
