//! Scripted LLM provider: replays a queue of canned replies in order.
//!
//! Each call to `complete` pops the next reply; a queued fault is returned
//! as `ProviderError::Request`. Every prompt received is recorded so callers
//! can assert on what was sent. Clones share the same queue and log.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use crate::llm::{LlmResponse, PromptTurn, ProviderError};

#[derive(Debug, Clone)]
enum Reply {
    Text(String),
    Fault(String),
}

#[derive(Debug, Default)]
struct Script {
    replies: VecDeque<Reply>,
    received: Vec<Vec<PromptTurn>>,
}

#[derive(Debug, Clone, Default)]
pub struct ScriptedProvider {
    script: Arc<Mutex<Script>>,
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a provider preloaded with text replies.
    pub fn with_replies<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let p = Self::new();
        for r in replies {
            p.push_reply(r);
        }
        p
    }

    pub fn push_reply(&self, text: impl Into<String>) {
        self.lock().replies.push_back(Reply::Text(text.into()));
    }

    pub fn push_fault(&self, message: impl Into<String>) {
        self.lock().replies.push_back(Reply::Fault(message.into()));
    }

    /// Prompts received so far, one entry per `complete` call.
    pub fn received(&self) -> Vec<Vec<PromptTurn>> {
        self.lock().received.clone()
    }

    pub fn remaining(&self) -> usize {
        self.lock().replies.len()
    }

    pub async fn complete(&self, turns: &[PromptTurn]) -> Result<LlmResponse, ProviderError> {
        let mut script = self.lock();
        script.received.push(turns.to_vec());
        match script.replies.pop_front() {
            Some(Reply::Text(text)) => Ok(LlmResponse { text, usage: None }),
            Some(Reply::Fault(msg)) => Err(ProviderError::Request(msg)),
            None => Err(ProviderError::Request("scripted provider has no replies left".into())),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Script> {
        // A poisoned script only means another test thread panicked mid-call.
        self.script.lock().unwrap_or_else(|e| e.into_inner())
    }
}
