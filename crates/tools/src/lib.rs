//! Built-in tools for mnemo.
//!
//! Two look things up on the web (weather, search); three act on the chat
//! platform through the turn's channel (status, react, nick); `none` lets
//! the model decline to answer.

pub mod nick;
pub mod none;
pub mod react;
pub mod search;
pub mod status;
pub mod weather;

use std::sync::Arc;
use std::time::Duration;

use mnemo_core::tool::ToolRegistry;

pub use nick::NickTool;
pub use none::NoneTool;
pub use react::ReactTool;
pub use search::SearchTool;
pub use status::StatusTool;
pub use weather::WeatherTool;

/// HTTP client shared by the web-facing tools.
pub(crate) fn http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(20))
        .build()
        .unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Falling back to default HTTP client");
            reqwest::Client::new()
        })
}

/// Registry with every built-in tool, in catalog order.
pub fn default_registry() -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(Arc::new(WeatherTool::new()));
    registry.register(Arc::new(SearchTool::new()));
    registry.register(Arc::new(StatusTool));
    registry.register(Arc::new(ReactTool));
    registry.register(Arc::new(NickTool));
    registry.register(Arc::new(NoneTool));
    registry
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use mnemo_core::channel::{Channel, ChannelId, ChannelMessage, Presence};
    use mnemo_core::error::ChannelError;
    use mnemo_core::tool::ToolContext;

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum Action {
        Presence(Presence, String),
        Reaction(String, String, String),
        Nickname(String),
    }

    /// Channel that records platform actions instead of performing them.
    pub struct RecordingChannel {
        id: ChannelId,
        actions: Mutex<Vec<Action>>,
    }

    impl RecordingChannel {
        pub fn context() -> (Arc<Self>, ToolContext) {
            let channel = Arc::new(Self {
                id: ChannelId("recording".into()),
                actions: Mutex::new(Vec::new()),
            });
            let ctx = ToolContext {
                channel: channel.clone(),
                chat_id: "chat-1".into(),
                message_id: Some("msg-1".into()),
            };
            (channel, ctx)
        }

        pub fn actions(&self) -> Vec<Action> {
            self.actions.lock().unwrap().clone()
        }

        fn record(&self, action: Action) {
            self.actions.lock().unwrap().push(action);
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
        ) -> Result<tokio::sync::mpsc::Receiver<Result<ChannelMessage, ChannelError>>, ChannelError>
        {
            let (_tx, rx) = tokio::sync::mpsc::channel(1);
            Ok(rx)
        }

        async fn send(&self, _chat_id: &str, _content: &str) -> Result<Option<String>, ChannelError> {
            Ok(None)
        }

        async fn add_reaction(
            &self,
            chat_id: &str,
            message_id: &str,
            emoji: &str,
        ) -> Result<(), ChannelError> {
            self.record(Action::Reaction(
                chat_id.into(),
                message_id.into(),
                emoji.into(),
            ));
            Ok(())
        }

        async fn set_presence(
            &self,
            presence: Presence,
            status_text: &str,
        ) -> Result<(), ChannelError> {
            self.record(Action::Presence(presence, status_text.into()));
            Ok(())
        }

        async fn set_nickname(&self, name: &str) -> Result<(), ChannelError> {
            self.record(Action::Nickname(name.into()));
            Ok(())
        }

        fn is_allowed(&self, _sender_id: &str) -> bool {
            true
        }
    }
}
