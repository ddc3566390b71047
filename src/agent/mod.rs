//! The chat-turn agent: classify → select → execute → synthesize.

pub mod classifier;
pub mod executor;
pub mod pipeline;
pub mod selector;
pub mod state;
pub mod synthesizer;

pub use pipeline::{Pipeline, PipelineError, Stage};
pub use state::{ChatMessage, FinalResult, Intent, TurnState};
