//! CLI channel: interactive terminal chat.
//!
//! Reads lines from stdin and prints replies to stdout. Used by
//! `mnemo chat`. Platform actions (reactions, presence, nickname) are
//! echoed as bracketed notes so tool calls stay visible locally.

use async_trait::async_trait;
use mnemo_core::channel::{Channel, ChannelId, ChannelMessage, Presence};
use mnemo_core::error::ChannelError;
use tokio::io::{self, AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

/// Sender ID of the local user.
pub const LOCAL_USER_ID: &str = "local_user";

/// Chat ID of the single terminal session.
pub const CLI_CHAT_ID: &str = "cli_session";

/// Interactive CLI channel for terminal-based chat.
pub struct CliChannel {
    id: ChannelId,
    username: String,
}

impl CliChannel {
    pub fn new() -> Self {
        Self::with_username("user")
    }

    /// Name the local user appears under in the transcript.
    pub fn with_username(username: impl Into<String>) -> Self {
        Self {
            id: ChannelId("cli".into()),
            username: username.into(),
        }
    }

    fn message(channel_id: &ChannelId, username: &str, line: String) -> ChannelMessage {
        ChannelMessage {
            channel_id: channel_id.clone(),
            message_id: Some(uuid::Uuid::new_v4().to_string()),
            sender_id: LOCAL_USER_ID.into(),
            sender_name: Some(username.to_string()),
            is_bot: false,
            content: line,
            chat_id: CLI_CHAT_ID.into(),
            attachments: vec![],
            metadata: serde_json::Map::new(),
        }
    }
}

impl Default for CliChannel {
    fn default() -> Self {
        Self::new()
    }
}

fn is_exit(line: &str) -> bool {
    matches!(line, "exit" | "quit" | "/exit" | "/quit" | ":q")
}

#[async_trait]
impl Channel for CliChannel {
    fn name(&self) -> &str {
        "cli"
    }

    fn id(&self) -> &ChannelId {
        &self.id
    }

    async fn start(
        &self,
    ) -> Result<mpsc::Receiver<Result<ChannelMessage, ChannelError>>, ChannelError> {
        let (tx, rx) = mpsc::channel(32);
        let channel_id = self.id.clone();
        let username = self.username.clone();

        tokio::spawn(async move {
            let mut lines = BufReader::new(io::stdin()).lines();

            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        let line = line.trim().to_string();
                        if line.is_empty() {
                            continue;
                        }
                        if is_exit(&line) {
                            break;
                        }

                        let msg = Self::message(&channel_id, &username, line);
                        if tx.send(Ok(msg)).await.is_err() {
                            break;
                        }
                    }
                    Ok(None) => break, // EOF (Ctrl+D)
                    Err(e) => {
                        let _ = tx
                            .send(Err(ChannelError::ConnectionLost(e.to_string())))
                            .await;
                        break;
                    }
                }
            }
        });

        Ok(rx)
    }

    async fn send(&self, _chat_id: &str, content: &str) -> Result<Option<String>, ChannelError> {
        println!("{content}");
        Ok(None)
    }

    async fn add_reaction(
        &self,
        _chat_id: &str,
        _message_id: &str,
        emoji: &str,
    ) -> Result<(), ChannelError> {
        println!("[reacted {emoji}]");
        Ok(())
    }

    async fn set_presence(
        &self,
        presence: Presence,
        status_text: &str,
    ) -> Result<(), ChannelError> {
        println!("[status: {} {status_text}]", presence.as_str());
        Ok(())
    }

    async fn set_nickname(&self, name: &str) -> Result<(), ChannelError> {
        println!("[nickname: {name}]");
        Ok(())
    }

    fn is_allowed(&self, _sender_id: &str) -> bool {
        true // local user
    }
}
