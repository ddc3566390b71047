//! End-to-end turn tests with in-process collaborators: scripted LLM,
//! in-memory store, fixed knowledge source.

use std::sync::Arc;

use scrivener::agent::{ChatMessage, Intent, Pipeline, TurnState};
use scrivener::chat::{ChatService, GENERIC_FAILURE};
use scrivener::config::Config;
use scrivener::llm::LlmProvider;
use scrivener::llm::providers::scripted::ScriptedProvider;
use scrivener::prompt::Prompts;
use scrivener::store::stores::memory::InMemoryStore;
use scrivener::store::{Role, StoreHandle};
use scrivener::tools::knowledge::FixedKnowledge;
use scrivener::tools::{KnowledgeEntry, KnowledgeSource, ToolId, ToolPayload, ToolRegistry};

const CALCULATE: &str = r#"{"intent":"calculate","needsText":false}"#;
const ASK: &str = r#"{"intent":"ask_question","needsText":false}"#;
const CREATE: &str = r#"{"intent":"create_text","needsText":true}"#;
const UPDATE: &str = r#"{"intent":"update_text","needsText":true}"#;
const RESEARCH: &str = r#"{"intent":"research","needsText":false}"#;

struct Harness {
    llm: ScriptedProvider,
    store: StoreHandle,
    memory: Arc<InMemoryStore>,
    pipeline: Pipeline,
    service: ChatService,
    _tmp: tempfile::TempDir,
}

fn harness(knowledge: KnowledgeSource) -> Harness {
    harness_with(knowledge, |_| {})
}

fn harness_with(knowledge: KnowledgeSource, tweak: impl FnOnce(&mut Config)) -> Harness {
    let tmp = tempfile::tempdir().unwrap();
    let mut config = Config::test_default(tmp.path());
    tweak(&mut config);
    let llm = ScriptedProvider::new();
    let memory = Arc::new(InMemoryStore::new());
    let store = StoreHandle::new(memory.clone());
    let provider = LlmProvider::Scripted(llm.clone());
    let prompts = Prompts::builtin();

    let registry = ToolRegistry::new(provider.clone(), prompts.clone(), store.clone(), knowledge.clone());
    let pipeline = Pipeline::new(provider.clone(), prompts.clone(), registry, config.tools.clone());
    let service = ChatService::with_parts(provider, store.clone(), prompts, knowledge, &config);
    Harness { llm, store, memory, pipeline, service, _tmp: tmp }
}

fn offline() -> KnowledgeSource {
    KnowledgeSource::Fixed(FixedKnowledge::default())
}

fn turn(message: &str, artifact: Option<&str>) -> TurnState {
    TurnState::new("conv-1", vec![ChatMessage::user(message)], artifact.map(str::to_string)).unwrap()
}

#[tokio::test]
async fn arithmetic_question_is_calculated() {
    let h = harness(offline());
    h.llm.push_reply(CALCULATE);
    h.llm.push_reply("The result is 48.");

    let state = h.pipeline.run(turn("what is 12 * 4?", Some("Existing draft"))).await.unwrap();

    assert_eq!(state.selected_tools(), [ToolId::ConversationMemory, ToolId::Calculator]);
    let calc = state.tool_outcomes().get(ToolId::Calculator).unwrap();
    assert_eq!(
        calc.payload(),
        Some(&ToolPayload::Calc { expression: "12 * 4".into(), result: 48.0 })
    );
    let result = state.final_result().unwrap();
    assert_eq!(result.message, "The result is 48.");
    assert_eq!(result.artifact.as_deref(), Some("Existing draft"));
}

#[tokio::test]
async fn greeting_gets_memory_only_and_no_artifact() {
    let h = harness(offline());
    h.llm.push_reply(ASK);
    h.llm.push_reply("Hi! How can I help?");

    let result = h.pipeline.run_turn(turn("hello", None)).await.unwrap();
    assert_eq!(result.tools_used, [ToolId::ConversationMemory]);
    assert_eq!(result.artifact, None);
    assert_eq!(h.llm.remaining(), 0);
}

#[tokio::test]
async fn greeting_guard_blocks_write_even_for_create_intent() {
    let h = harness(offline());
    h.llm.push_reply(CREATE);
    h.llm.push_reply("Hello! What would you like me to write?");

    let state = h.pipeline.run(turn("Hey there", None)).await.unwrap();
    assert_eq!(state.classified_intent(), Some(Intent::CreateText));
    assert_eq!(state.selected_tools(), [ToolId::ConversationMemory]);
    assert!(!state.tool_outcomes().contains(ToolId::WriteText));
    assert_eq!(h.llm.received().len(), 2);
}

#[tokio::test]
async fn update_revises_stored_draft() {
    let h = harness(offline());
    let conv = h.service.create_conversation(None).await.unwrap();
    h.store.save_artifact(&conv.id, "Draft A").await.unwrap();

    h.llm.push_reply(UPDATE);
    h.llm.push_reply("Draft A, shorter.");
    h.llm.push_reply("I've updated the text as requested.");
    h.llm.push_reply("Shortening A Draft");

    let reply = h.service.send(&conv.id, "make it shorter").await.unwrap();

    assert_eq!(
        reply.tools_used,
        [ToolId::ConversationMemory, ToolId::ReadText, ToolId::UpdateText]
    );
    assert_eq!(reply.artifact.as_deref(), Some("Draft A, shorter."));
    assert_eq!(reply.message, "I've updated the text as requested.");
    assert_eq!(h.store.artifact(&conv.id).await.unwrap().as_deref(), Some("Draft A, shorter."));

    let update_prompt = &h.llm.received()[1][1].content;
    assert!(update_prompt.contains("Draft A"));
    assert!(update_prompt.contains("make it shorter"));
}

#[tokio::test]
async fn read_populates_artifact_before_update() {
    let h = harness(offline());
    let conv = h.store.create_conversation("").await.unwrap();
    h.store.save_artifact(&conv.id, "Draft A").await.unwrap();

    h.llm.push_reply(UPDATE);
    h.llm.push_reply("Draft B");
    h.llm.push_reply("Done.");

    // The turn starts without the artifact; read_text must supply it.
    let state = TurnState::new(conv.id.clone(), vec![ChatMessage::user("make it shorter")], None).unwrap();
    let state = h.pipeline.run(state).await.unwrap();

    let read = state.tool_outcomes().get(ToolId::ReadText).unwrap();
    assert_eq!(read.payload().and_then(|p| p.artifact_text()), Some("Draft A"));
    assert!(state.tool_outcomes().get(ToolId::UpdateText).unwrap().succeeded());
    assert_eq!(state.current_artifact(), Some("Draft B"));
}

#[tokio::test]
async fn update_without_artifact_is_skipped() {
    let h = harness(offline());
    let conv = h.store.create_conversation("").await.unwrap();
    h.llm.push_reply(UPDATE);
    h.llm.push_reply("There is no text to update yet.");

    let state = TurnState::new(conv.id.clone(), vec![ChatMessage::user("make it shorter")], None).unwrap();
    let state = h.pipeline.run(state).await.unwrap();

    assert_eq!(
        state.selected_tools(),
        [ToolId::ConversationMemory, ToolId::ReadText, ToolId::UpdateText]
    );
    assert!(!state.tool_outcomes().contains(ToolId::UpdateText));
    assert_eq!(state.current_artifact(), None);
    assert_eq!(h.store.artifact(&conv.id).await.unwrap(), None);
    assert_eq!(h.llm.remaining(), 0);
    assert_eq!(h.llm.received().len(), 2);
}

#[tokio::test]
async fn lookup_fault_still_yields_reply() {
    let h = harness(KnowledgeSource::Fixed(FixedKnowledge::failing("wikipedia unreachable")));
    h.llm.push_reply(RESEARCH);
    h.llm.push_reply("I couldn't reach my sources just now.");

    let state = h.pipeline.run(turn("search the history of Rome", None)).await.unwrap();

    let lookup = state.tool_outcomes().get(ToolId::WikipediaSearch).unwrap();
    assert!(lookup.error().unwrap().contains("wikipedia unreachable"));
    assert!(state.tool_outcomes().get(ToolId::ConversationMemory).is_some());
    assert_eq!(state.final_result().unwrap().message, "I couldn't reach my sources just now.");

    let synth_prompt = &h.llm.received()[1][1].content;
    assert!(!synth_prompt.contains("wikipedia_search"));
}

#[tokio::test]
async fn research_query_and_evidence() {
    let fixed = FixedKnowledge::new(vec![KnowledgeEntry {
        title: "Photosynthesis".into(),
        summary: "Process used by plants.".into(),
        url: "https://en.wikipedia.org/wiki/Photosynthesis".into(),
    }]);
    let h = harness(KnowledgeSource::Fixed(fixed.clone()));
    h.llm.push_reply(RESEARCH);
    h.llm.push_reply("Photosynthesis is how plants make food.");

    h.pipeline.run_turn(turn("Look up photosynthesis", None)).await.unwrap();

    assert_eq!(fixed.queries(), ["photosynthesis"]);
    let synth_prompt = &h.llm.received()[1][1].content;
    assert!(synth_prompt.contains("Process used by plants."));
}

#[tokio::test]
async fn malformed_classification_falls_back() {
    let h = harness(offline());
    h.llm.push_reply("I think they want a poem");
    h.llm.push_reply("Sure, tell me more.");

    let state = h.pipeline.run(turn("write a poem", None)).await.unwrap();
    assert_eq!(state.classified_intent(), Some(Intent::AskQuestion));
    assert!(!state.needs_artifact());
    assert!(state.classifier_fallback());
    assert_eq!(state.selected_tools(), [ToolId::ConversationMemory]);
}

#[tokio::test]
async fn classifier_fault_falls_back() {
    let h = harness(offline());
    h.llm.push_fault("rate limited");
    h.llm.push_reply("Could you say that again?");

    let state = h.pipeline.run(turn("write a poem", None)).await.unwrap();
    assert!(state.classifier_fallback());
    assert_eq!(state.final_result().unwrap().message, "Could you say that again?");
}

#[tokio::test]
async fn write_creates_artifact_and_reply_stays_short() {
    let h = harness(offline());
    let conv = h.service.create_conversation(Some("Letters")).await.unwrap();
    h.llm.push_reply(CREATE);
    h.llm.push_reply("Dear Hiring Manager, I am writing to apply.");
    h.llm.push_reply("I've generated a cover letter for you.");
    h.llm.push_reply("Cover Letter");

    let reply = h.service.send(&conv.id, "write a cover letter").await.unwrap();

    assert_eq!(reply.tools_used, [ToolId::ConversationMemory, ToolId::WriteText]);
    assert_eq!(reply.artifact.as_deref(), Some("Dear Hiring Manager, I am writing to apply."));
    assert!(!reply.message.contains("Dear Hiring Manager"));
    let synth_prompt = &h.llm.received()[2][1].content;
    assert!(!synth_prompt.contains("Dear Hiring Manager"));
}

#[tokio::test]
async fn synthesis_fault_returns_generic_reply_without_persisting() {
    let h = harness(offline());
    let conv = h.service.create_conversation(None).await.unwrap();
    h.llm.push_reply(ASK);
    h.llm.push_fault("upstream 500");

    let reply = h.service.send(&conv.id, "how are you?").await.unwrap();

    assert_eq!(reply.message, GENERIC_FAILURE);
    assert_eq!(reply.artifact, None);
    assert!(reply.tools_used.is_empty());
    let history = h.store.recent_messages(&conv.id, 10).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].role, Role::User);
}

#[tokio::test]
async fn first_message_titles_conversation_once() {
    let h = harness(offline());
    let conv = h.service.create_conversation(None).await.unwrap();
    assert_eq!(conv.title, "New Chat");

    h.llm.push_reply(ASK);
    h.llm.push_reply("Hello!");
    h.llm.push_reply("\"Friendly Greeting\"");
    h.service.send(&conv.id, "hi").await.unwrap();
    let titled = h.service.conversation(&conv.id).await.unwrap().unwrap();
    assert_eq!(titled.title, "Friendly Greeting");

    h.llm.push_reply(ASK);
    h.llm.push_reply("Still here.");
    h.service.send(&conv.id, "are you there?").await.unwrap();
    assert_eq!(h.llm.remaining(), 0);
    assert_eq!(h.llm.received().len(), 5);
    let history = h.store.recent_messages(&conv.id, 10).await.unwrap();
    let roles: Vec<_> = history.iter().map(|m| m.role).collect();
    assert_eq!(roles, [Role::User, Role::Assistant, Role::User, Role::Assistant]);
}

#[tokio::test]
async fn single_message_window_titles_only_once() {
    let h = harness_with(offline(), |cfg| cfg.store.history_window = 1);
    let conv = h.service.create_conversation(None).await.unwrap();

    h.llm.push_reply(ASK);
    h.llm.push_reply("Hello!");
    h.llm.push_reply("First Title");
    h.service.send(&conv.id, "hi").await.unwrap();

    h.llm.push_reply(ASK);
    h.llm.push_reply("Why did the borrow checker cross the road?");
    h.llm.push_reply("Second Title");
    h.service.send(&conv.id, "tell me a joke").await.unwrap();

    assert_eq!(h.service.conversation(&conv.id).await.unwrap().unwrap().title, "First Title");
    assert_eq!(h.llm.received().len(), 5);
    assert_eq!(h.llm.remaining(), 1);
}

#[tokio::test]
async fn title_failure_does_not_affect_reply() {
    let h = harness(offline());
    let conv = h.service.create_conversation(None).await.unwrap();
    h.llm.push_reply(ASK);
    h.llm.push_reply("Hello!");
    h.llm.push_fault("title model down");

    let reply = h.service.send(&conv.id, "hi").await.unwrap();
    assert_eq!(reply.message, "Hello!");
    assert_eq!(h.service.conversation(&conv.id).await.unwrap().unwrap().title, "New Chat");
}

#[tokio::test]
async fn send_rejects_bad_input() {
    let h = harness(offline());
    let conv = h.service.create_conversation(None).await.unwrap();
    assert!(h.service.send("", "hi").await.is_err());
    assert!(h.service.send(&conv.id, "   ").await.is_err());
    assert!(h.service.send("no-such-conversation", "hi").await.is_err());
    assert!(h.llm.received().is_empty());
}

#[tokio::test]
async fn store_outage_is_an_error_not_a_reply() {
    let h = harness(offline());
    let conv = h.service.create_conversation(None).await.unwrap();
    h.memory.set_unavailable(true);
    assert!(h.service.send(&conv.id, "hi").await.is_err());
}

#[tokio::test]
async fn history_window_is_most_recent_messages() {
    let h = harness(offline());
    let conv = h.service.create_conversation(None).await.unwrap();
    for i in 0..12 {
        h.store.append_message(&conv.id, Role::User, &format!("old {i}")).await.unwrap();
    }
    h.llm.push_reply(ASK);
    h.llm.push_reply("ok");

    h.service.send(&conv.id, "newest").await.unwrap();

    let classify_prompt = &h.llm.received()[0][1].content;
    assert!(classify_prompt.contains("\"newest\""));
    assert!(classify_prompt.contains("Conversation history: 10 messages"));
}
