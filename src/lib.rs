//! Scrivener: a chat-driven writing assistant.
//!
//! Each user message runs through a four-stage turn pipeline
//! (classify → select tools → execute → synthesize). Long-form text goes to
//! the conversation's editor artifact; the chat reply stays short.

pub mod agent;
pub mod chat;
pub mod config;
#[cfg(feature = "console")]
pub mod console;
pub mod error;
pub mod llm;
pub mod logger;
pub mod prompt;
pub mod store;
pub mod tools;
