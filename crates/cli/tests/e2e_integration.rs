//! End-to-end integration tests for the mnemo agent.
//!
//! These drive whole turns through a `Session`: inbound message, prompt
//! assembly, tool directives against the real built-in tools, follow-up
//! completions, delivery, and background memory synthesis against a real
//! file backend.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use mnemo_agent::{
    ContextAssembler, Generator, MemorySynthesizer, Session, SynthesisSupervisor, TurnOutcome,
};
use mnemo_config::SessionConfig;
use mnemo_core::channel::{Channel, ChannelId, ChannelMessage, Presence};
use mnemo_core::error::{ChannelError, ProviderError, ToolError};
use mnemo_core::event::{DomainEvent, EventBus};
use mnemo_core::identity::Identity;
use mnemo_core::message::{Role, SYSTEM_SPEAKER_ID};
use mnemo_core::provider::{Provider, ProviderRequest, ProviderResponse, Usage};
use mnemo_core::tool::{Tool, ToolArg, ToolContext, ToolRegistry};
use mnemo_memory::{FileBackend, InMemoryBackend, MemoryStore};
use mnemo_tools::{NickTool, NoneTool, ReactTool, StatusTool};
use tokio::sync::mpsc;

const AGENT_ID: &str = "900";
const CHAT: &str = "general";

// ── Mock Provider ────────────────────────────────────────────────────────

/// A mock provider that returns scripted replies in sequence.
struct ScriptedProvider {
    replies: Vec<String>,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl ScriptedProvider {
    fn new(replies: &[&str]) -> Self {
        Self {
            replies: replies.iter().map(|r| r.to_string()).collect(),
            requests: Mutex::new(Vec::new()),
        }
    }

    fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "e2e_mock"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let mut requests = self.requests.lock().unwrap();
        let index = requests.len();
        requests.push(request);
        let text = self.replies.get(index).ok_or_else(|| ProviderError::ApiError {
            status_code: 500,
            message: format!("script exhausted at call #{index}"),
        })?;
        Ok(ProviderResponse {
            content: text.clone(),
            usage: Some(Usage {
                prompt_tokens: 10,
                completion_tokens: 5,
                total_tokens: 15,
            }),
            model: "mock".into(),
            raw: serde_json::json!({ "choices": [{ "message": { "content": text } }] }),
        })
    }
}

// ── Mock Channel ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
enum Action {
    Sent(String),
    Reaction { message_id: String, emoji: String },
    Presence(Presence, String),
    Nickname(String),
}

/// A platform stand-in that records every outbound action.
struct MockPlatform {
    id: ChannelId,
    actions: Mutex<Vec<Action>>,
}

impl MockPlatform {
    fn new() -> Self {
        Self {
            id: ChannelId("mock".into()),
            actions: Mutex::new(Vec::new()),
        }
    }

    fn actions(&self) -> Vec<Action> {
        self.actions.lock().unwrap().clone()
    }

    fn sent(&self) -> Vec<String> {
        self.actions()
            .into_iter()
            .filter_map(|a| match a {
                Action::Sent(text) => Some(text),
                _ => None,
            })
            .collect()
    }

    fn record(&self, action: Action) {
        self.actions.lock().unwrap().push(action);
    }
}

#[async_trait]
impl Channel for MockPlatform {
    fn name(&self) -> &str {
        "mock"
    }

    fn id(&self) -> &ChannelId {
        &self.id
    }

    async fn start(
        &self,
    ) -> Result<mpsc::Receiver<Result<ChannelMessage, ChannelError>>, ChannelError> {
        let (_tx, rx) = mpsc::channel(1);
        Ok(rx)
    }

    async fn send(&self, _chat_id: &str, content: &str) -> Result<Option<String>, ChannelError> {
        self.record(Action::Sent(content.to_string()));
        Ok(Some(format!("out-{}", self.actions().len())))
    }

    async fn add_reaction(
        &self,
        _chat_id: &str,
        message_id: &str,
        emoji: &str,
    ) -> Result<(), ChannelError> {
        self.record(Action::Reaction {
            message_id: message_id.to_string(),
            emoji: emoji.to_string(),
        });
        Ok(())
    }

    async fn set_presence(&self, presence: Presence, status_text: &str) -> Result<(), ChannelError> {
        self.record(Action::Presence(presence, status_text.to_string()));
        Ok(())
    }

    async fn set_nickname(&self, name: &str) -> Result<(), ChannelError> {
        self.record(Action::Nickname(name.to_string()));
        Ok(())
    }

    fn is_allowed(&self, _sender_id: &str) -> bool {
        true
    }
}

// ── Mock weather tool ────────────────────────────────────────────────────

struct FixedWeather;

#[async_trait]
impl Tool for FixedWeather {
    fn name(&self) -> &str {
        "weather"
    }

    fn description(&self) -> &str {
        "Get the current weather for a location."
    }

    fn args(&self) -> &[ToolArg] {
        const ARGS: &[ToolArg] = &[ToolArg::string("location")];
        ARGS
    }

    async fn call(&self, args: Vec<String>, _ctx: &ToolContext) -> Result<String, ToolError> {
        Ok(format!("{}: Clear, 20C", args[0]))
    }
}

fn registry() -> ToolRegistry {
    let mut tools = ToolRegistry::new();
    tools.register(Arc::new(FixedWeather));
    tools.register(Arc::new(StatusTool));
    tools.register(Arc::new(ReactTool));
    tools.register(Arc::new(NickTool));
    tools.register(Arc::new(NoneTool));
    tools
}

// ── Harness ──────────────────────────────────────────────────────────────

struct World {
    session: Session,
    chat: Arc<ScriptedProvider>,
    synthesis: Arc<ScriptedProvider>,
    platform: Arc<MockPlatform>,
    events: Arc<EventBus>,
}

fn world(chat: &[&str], synthesis: &[&str], store: MemoryStore, config: SessionConfig) -> World {
    let chat = Arc::new(ScriptedProvider::new(chat));
    let synthesis = Arc::new(ScriptedProvider::new(synthesis));
    let platform = Arc::new(MockPlatform::new());
    let events = Arc::new(EventBus::default());

    let supervisor = SynthesisSupervisor::new(
        Arc::new(MemorySynthesizer::new(synthesis.clone(), "mock-mini")),
        store.clone(),
        events.clone(),
    );
    let session = Session::new(
        ContextAssembler::new(Identity::new(AGENT_ID, "mnemo")),
        Generator::new(chat.clone(), "mock"),
        store,
        platform.clone(),
        supervisor,
        events.clone(),
        config,
    )
    .with_tools(Arc::new(registry()));

    World {
        session,
        chat,
        synthesis,
        platform,
        events,
    }
}

fn config() -> SessionConfig {
    SessionConfig {
        short_term_window: 20,
        update_frequency: 100,
        max_tool_depth: 3,
        ..SessionConfig::default()
    }
}

fn in_memory() -> MemoryStore {
    MemoryStore::new(Arc::new(InMemoryBackend::new()))
}

fn message(id: &str, content: &str) -> ChannelMessage {
    ChannelMessage {
        channel_id: ChannelId("mock".into()),
        message_id: Some(id.into()),
        sender_id: "7".into(),
        sender_name: Some("ana".into()),
        is_bot: false,
        content: content.into(),
        chat_id: CHAT.into(),
        attachments: vec![],
        metadata: serde_json::Map::new(),
    }
}

// ── E2E: tool dispatch ───────────────────────────────────────────────────

#[tokio::test]
async fn e2e_weather_directive_flushes_preface_and_feeds_result_back() {
    let mut w = world(
        &["Sure thing!\ncall weather Paris", "It's clear in Paris, 20 degrees."],
        &[],
        in_memory(),
        config(),
    );

    let outcome = w.session.handle(message("m1", "what's the weather in paris?")).await;

    assert_eq!(outcome, TurnOutcome::Replied("It's clear in Paris, 20 degrees.".into()));
    assert_eq!(
        w.platform.sent(),
        vec!["Sure thing!", "It's clear in Paris, 20 degrees."]
    );

    let requests = w.chat.requests();
    assert_eq!(requests.len(), 2);

    // The first prompt carries the tool catalog in the system entry.
    let system = requests[0].messages[0].text_content();
    assert!(system.contains("- weather <location:string>: Get the current weather"));

    // The follow-up prompt ends with the agent's directive and the tool result.
    let follow_up = &requests[1].messages;
    let n = follow_up.len();
    assert_eq!(follow_up[n - 2].role, Role::Assistant);
    assert!(follow_up[n - 2].text_content().ends_with("call weather Paris"));
    assert!(follow_up[n - 1].text_content().contains("Paris: Clear, 20C"));
}

#[tokio::test]
async fn e2e_react_targets_the_triggering_message() {
    let mut w = world(&["nice!\ncall react 👍", "call none"], &[], in_memory(), config());

    let outcome = w.session.handle(message("m42", "I passed my exam!")).await;

    assert_eq!(outcome, TurnOutcome::Silent);
    assert_eq!(
        w.platform.actions(),
        vec![
            Action::Sent("nice!".into()),
            Action::Reaction {
                message_id: "m42".into(),
                emoji: "👍".into(),
            },
        ]
    );
    let window: Vec<_> = w.session.window().iter().collect();
    assert_eq!(window.last().unwrap().speaker_id, SYSTEM_SPEAKER_ID);
    assert_eq!(window.last().unwrap().text_content, "Successfully reacted to message.");
}

#[tokio::test]
async fn e2e_status_and_nick_act_on_the_platform() {
    let mut w = world(
        &[
            "brb\ncall status idle, making tea",
            "one sec\ncall nick Teapot",
            "ok I'm Teapot now",
        ],
        &[],
        in_memory(),
        config(),
    );

    let outcome = w.session.handle(message("m1", "go make tea")).await;

    assert_eq!(outcome, TurnOutcome::Replied("ok I'm Teapot now".into()));
    assert_eq!(
        w.platform.actions(),
        vec![
            Action::Sent("brb".into()),
            Action::Presence(Presence::Idle, "making tea".into()),
            Action::Sent("one sec".into()),
            Action::Nickname("Teapot".into()),
            Action::Sent("ok I'm Teapot now".into()),
        ]
    );
}

#[tokio::test]
async fn e2e_tool_errors_become_conversation() {
    let mut w = world(
        &["hmm\ncall status busy, coding", "oops, I can't be busy"],
        &[],
        in_memory(),
        config(),
    );

    let outcome = w.session.handle(message("m1", "set yourself busy")).await;

    assert_eq!(outcome, TurnOutcome::Replied("oops, I can't be busy".into()));
    let follow_up = &w.chat.requests()[1].messages;
    assert!(
        follow_up
            .last()
            .unwrap()
            .text_content()
            .contains("Error: Invalid tool arguments: `online` must be one of")
    );
}

#[tokio::test]
async fn e2e_unknown_tool_is_reported_inline() {
    let mut w = world(&["Let me check.\ncall stocks AAPL"], &[], in_memory(), config());

    let outcome = w.session.handle(message("m1", "how's apple doing?")).await;

    let TurnOutcome::Replied(text) = outcome else {
        panic!("expected a reply, got {outcome:?}");
    };
    assert!(text.starts_with("Let me check."));
    assert!(text.contains("stocks"));
    assert_eq!(w.chat.requests().len(), 1);
}

#[tokio::test]
async fn e2e_depth_limit_truncates_runaway_tool_loops() {
    let looping = "again\ncall weather Oslo";
    let mut w = world(
        &[looping, looping, looping, looping, looping],
        &[],
        in_memory(),
        SessionConfig {
            max_tool_depth: 2,
            ..config()
        },
    );

    let outcome = w.session.handle(message("m1", "weather forever")).await;

    let TurnOutcome::Replied(text) = outcome else {
        panic!("expected a reply, got {outcome:?}");
    };
    assert!(text.ends_with("[tool call limit reached]"));
    // Initial completion plus one per tool round.
    assert_eq!(w.chat.requests().len(), 3);
}

#[tokio::test]
async fn e2e_events_trace_a_turn() {
    let mut w = world(&["hi ana"], &[], in_memory(), config());
    let mut rx = w.events.subscribe();

    w.session.handle(message("m1", "hello")).await;

    let first = rx.recv().await.unwrap();
    assert!(matches!(
        first.as_ref(),
        DomainEvent::MessageReceived { sender_id, .. } if sender_id == "7"
    ));
    let second = rx.recv().await.unwrap();
    assert!(matches!(
        second.as_ref(),
        DomainEvent::ReplySent { chat_id, .. } if chat_id == CHAT
    ));
}

// ── E2E: memory synthesis ────────────────────────────────────────────────

const SYNTHESIZED: &str = r#"{
    "users": {
        "7": {
            "user_id": "7",
            "current_username": "ana",
            "facts": ["likes tea"]
        }
    },
    "recent_summary": "ana talked about tea"
}"#;

#[tokio::test]
async fn e2e_synthesized_memory_reaches_the_next_prompt() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("memory.json");
    let store = MemoryStore::new(Arc::new(FileBackend::new(&path)));
    let mut w = world(
        &["tea is great", "of course, ana"],
        &[SYNTHESIZED],
        store.clone(),
        SessionConfig {
            update_frequency: 1,
            ..config()
        },
    );

    w.session.handle(message("m1", "I love tea")).await;
    w.session.take_pending_synthesis().unwrap().await.unwrap();

    // The synthesis request saw the transcript with speaker IDs.
    let synthesis_prompt = w.synthesis.requests()[0]
        .messages
        .iter()
        .map(|m| m.text_content())
        .collect::<Vec<_>>()
        .join("\n");
    assert!(synthesis_prompt.contains("ana (ID: 7): I love tea"));

    let persisted = std::fs::read_to_string(&path).unwrap();
    assert!(persisted.contains("likes tea"));

    w.session.handle(message("m2", "remember me?")).await;
    let system = w.chat.requests()[1].messages[0].text_content();
    assert!(system.contains("ana"));
    assert!(system.contains("likes tea"));
    assert!(system.contains("ana talked about tea"));
}

#[tokio::test]
async fn e2e_invalid_synthesis_leaves_the_document_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("memory.json");
    let store = MemoryStore::new(Arc::new(FileBackend::new(&path)));
    store
        .save(&mnemo_core::memory::MemoryBank::from_json(SYNTHESIZED).unwrap())
        .await
        .unwrap();
    let before = std::fs::read(&path).unwrap();

    let mut w = world(
        &["sure"],
        &[r#"{"users": {}, "mood": "sneaky extra field"}"#, "no json here"],
        store,
        SessionConfig {
            update_frequency: 1,
            ..config()
        },
    );
    let mut rx = w.events.subscribe();

    let outcome = w.session.handle(message("m1", "hi")).await;
    assert_eq!(outcome, TurnOutcome::Replied("sure".into()));
    w.session.take_pending_synthesis().unwrap().await.unwrap();

    assert_eq!(std::fs::read(&path).unwrap(), before);

    let mut failed = false;
    while let Ok(event) = rx.try_recv() {
        failed |= matches!(event.as_ref(), DomainEvent::MemorySynthesisFailed { .. });
    }
    assert!(failed);
}
