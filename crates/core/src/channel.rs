//! Channel trait: the abstraction over chat platforms.
//!
//! A Channel connects mnemo to a messaging platform (Discord, CLI). It
//! receives messages from users, sends responses back, and exposes the
//! handful of platform actions tools can trigger (reactions, presence,
//! nickname, attachment download).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ChannelError;
use crate::message::Attachment;

/// Unique identifier for a channel instance.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChannelId(pub String);

impl std::fmt::Display for ChannelId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A message received from a channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelMessage {
    /// The channel this message belongs to
    pub channel_id: ChannelId,

    /// Platform message ID (used for reactions)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,

    /// Sender identifier (platform-specific user ID)
    pub sender_id: String,

    /// Human-readable sender name (if available)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender_name: Option<String>,

    /// Whether the sender is a bot account
    #[serde(default)]
    pub is_bot: bool,

    /// The text content
    pub content: String,

    /// The chat/room identifier within the channel
    pub chat_id: String,

    /// Attachments as delivered by the platform (transient URLs)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Attachment>,

    /// Platform-specific metadata
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl ChannelMessage {
    /// Display name, falling back to the sender ID.
    pub fn display_name(&self) -> &str {
        self.sender_name.as_deref().unwrap_or(&self.sender_id)
    }
}

/// Online presence of the agent's account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Presence {
    Online,
    #[serde(rename = "dnd")]
    DoNotDisturb,
    Offline,
    Idle,
}

impl Presence {
    /// Parse one of `online`, `dnd`, `offline`, `idle`.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "online" => Some(Self::Online),
            "dnd" => Some(Self::DoNotDisturb),
            "offline" => Some(Self::Offline),
            "idle" => Some(Self::Idle),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Online => "online",
            Self::DoNotDisturb => "dnd",
            Self::Offline => "offline",
            Self::Idle => "idle",
        }
    }
}

/// The core Channel trait.
///
/// Implementations handle platform-specific connection logic, message
/// formatting, and authentication. Optional platform actions default to
/// [`ChannelError::Unsupported`].
#[async_trait]
pub trait Channel: Send + Sync {
    /// Human-readable channel name (e.g., "discord", "cli").
    fn name(&self) -> &str;

    /// Unique ID for this channel instance.
    fn id(&self) -> &ChannelId;

    /// Start listening for incoming messages.
    async fn start(
        &self,
    ) -> std::result::Result<
        tokio::sync::mpsc::Receiver<std::result::Result<ChannelMessage, ChannelError>>,
        ChannelError,
    >;

    /// Send a message to a chat. Returns the platform message ID if known.
    async fn send(
        &self,
        chat_id: &str,
        content: &str,
    ) -> std::result::Result<Option<String>, ChannelError>;

    /// Send a typing indicator (if the platform supports it).
    async fn send_typing(&self, _chat_id: &str) -> std::result::Result<(), ChannelError> {
        Ok(())
    }

    /// React to a message with a Unicode emoji.
    async fn add_reaction(
        &self,
        _chat_id: &str,
        _message_id: &str,
        _emoji: &str,
    ) -> std::result::Result<(), ChannelError> {
        Err(self.unsupported("reactions"))
    }

    /// Change the agent's presence and custom status text.
    async fn set_presence(
        &self,
        _presence: Presence,
        _status_text: &str,
    ) -> std::result::Result<(), ChannelError> {
        Err(self.unsupported("presence"))
    }

    /// Change the agent's display name.
    async fn set_nickname(&self, _name: &str) -> std::result::Result<(), ChannelError> {
        Err(self.unsupported("nicknames"))
    }

    /// Fetch the bytes of an inbound attachment.
    async fn download_attachment(
        &self,
        _attachment: &Attachment,
    ) -> std::result::Result<Vec<u8>, ChannelError> {
        Err(self.unsupported("attachment download"))
    }

    /// Check if a sender is allowed (allowlist check).
    fn is_allowed(&self, sender_id: &str) -> bool;

    /// Stop the channel gracefully.
    async fn stop(&self) -> std::result::Result<(), ChannelError> {
        Ok(())
    }

    /// Health check: is the channel connected and operational?
    async fn health_check(&self) -> std::result::Result<bool, ChannelError> {
        Ok(true)
    }

    #[doc(hidden)]
    fn unsupported(&self, operation: &str) -> ChannelError {
        ChannelError::Unsupported {
            channel: self.name().to_string(),
            operation: operation.to_string(),
        }
    }
}
