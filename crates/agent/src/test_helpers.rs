//! Shared test helpers: scripted provider, recording channel, static tools.

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use mnemo_core::channel::{Channel, ChannelId, ChannelMessage};
use mnemo_core::error::{ChannelError, ProviderError, ToolError};
use mnemo_core::message::Attachment;
use mnemo_core::provider::{Provider, ProviderRequest, ProviderResponse, Usage};
use mnemo_core::tool::{Tool, ToolArg, ToolContext};
use tokio::sync::mpsc;

/// A mock provider that returns a sequence of scripted results.
///
/// Each call to `complete` returns the next entry and records the request.
/// Once the script runs out every call fails with an API error.
pub struct ScriptedProvider {
    script: Mutex<Vec<Result<ProviderResponse, ProviderError>>>,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl ScriptedProvider {
    pub fn new(script: Vec<Result<ProviderResponse, ProviderError>>) -> Self {
        Self {
            script: Mutex::new(script),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Provider that answers with each text in turn.
    pub fn texts(texts: &[&str]) -> Self {
        Self::new(texts.iter().map(|t| Ok(text_response(t))).collect())
    }

    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted_mock"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let index = {
            let mut requests = self.requests.lock().unwrap();
            requests.push(request);
            requests.len() - 1
        };

        let script = self.script.lock().unwrap();
        match script.get(index) {
            Some(result) => result.clone(),
            None => Err(ProviderError::ApiError {
                status_code: 500,
                message: format!("script exhausted at call #{index}"),
            }),
        }
    }
}

/// A plain chat-completions response carrying `text`.
pub fn text_response(text: &str) -> ProviderResponse {
    ProviderResponse {
        content: text.to_string(),
        usage: Some(Usage {
            prompt_tokens: 10,
            completion_tokens: 5,
            total_tokens: 15,
        }),
        model: "mock-model".into(),
        raw: serde_json::json!({
            "choices": [{ "message": { "role": "assistant", "content": text } }]
        }),
    }
}

/// A channel that records everything sent through it.
pub struct RecordingChannel {
    id: ChannelId,
    sent: Mutex<Vec<(String, String)>>,
    typing: AtomicUsize,
}

impl RecordingChannel {
    pub fn new() -> Self {
        Self {
            id: ChannelId("recording".into()),
            sent: Mutex::new(Vec::new()),
            typing: AtomicUsize::new(0),
        }
    }

    /// `(chat_id, content)` pairs in send order.
    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_texts(&self) -> Vec<String> {
        self.sent().into_iter().map(|(_, text)| text).collect()
    }

    pub fn typing_count(&self) -> usize {
        self.typing.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Channel for RecordingChannel {
    fn name(&self) -> &str {
        "recording"
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

    async fn send(&self, chat_id: &str, content: &str) -> Result<Option<String>, ChannelError> {
        let mut sent = self.sent.lock().unwrap();
        sent.push((chat_id.to_string(), content.to_string()));
        Ok(Some(format!("sent-{}", sent.len())))
    }

    async fn send_typing(&self, _chat_id: &str) -> Result<(), ChannelError> {
        self.typing.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn download_attachment(&self, attachment: &Attachment) -> Result<Vec<u8>, ChannelError> {
        Ok(attachment.url.as_bytes().to_vec())
    }

    fn is_allowed(&self, _sender_id: &str) -> bool {
        true
    }
}

/// A tool with fixed arguments and a fixed outcome; counts its calls.
pub struct StaticTool {
    name: &'static str,
    args: &'static [ToolArg],
    outcome: Result<String, String>,
    calls: AtomicUsize,
    seen: Mutex<Vec<Vec<String>>>,
}

impl StaticTool {
    pub fn new(name: &'static str, args: &'static [ToolArg], output: &str) -> Self {
        Self {
            name,
            args,
            outcome: Ok(output.to_string()),
            calls: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(name: &'static str, args: &'static [ToolArg], reason: &str) -> Self {
        Self {
            outcome: Err(reason.to_string()),
            ..Self::new(name, args, "")
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Argument lists received, in call order.
    pub fn seen(&self) -> Vec<Vec<String>> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl Tool for StaticTool {
    fn name(&self) -> &str {
        self.name
    }

    fn description(&self) -> &str {
        "A scripted tool."
    }

    fn args(&self) -> &[ToolArg] {
        self.args
    }

    async fn call(&self, args: Vec<String>, _ctx: &ToolContext) -> Result<String, ToolError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().unwrap().push(args);
        self.outcome
            .clone()
            .map_err(|reason| ToolError::ExecutionFailed {
                tool_name: self.name.to_string(),
                reason,
            })
    }
}

pub const LOCATION: &[ToolArg] = &[ToolArg::string("location")];
pub const NO_ARGS: &[ToolArg] = &[];
