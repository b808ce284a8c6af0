//! Discord channel adapter.
//!
//! Outbound traffic (messages, typing, reactions, nickname changes,
//! attachment downloads) goes through the Discord REST API. Presence only
//! exists on the gateway session, so presence changes are handed to the host
//! as gateway op-3 payloads through [`DiscordChannel::with_gateway_relay`].
//! Inbound messages are fed in by the host process, either already converted
//! with [`DiscordChannel::inject_message`] or as raw `MESSAGE_CREATE`
//! payloads with [`DiscordChannel::inject_event`].

use async_trait::async_trait;
use mnemo_core::channel::{Channel, ChannelId, ChannelMessage, Presence};
use mnemo_core::error::ChannelError;
use mnemo_core::message::Attachment;
use reqwest::StatusCode;
use serde_json::Value;
use tokio::sync::{Mutex, mpsc};
use tracing::{debug, info, warn};

/// Default REST endpoint.
pub const DISCORD_API_BASE: &str = "https://discord.com/api/v10";

/// Longest message Discord accepts, in characters.
pub const MESSAGE_LIMIT: usize = 2000;

/// Discord channel configuration.
#[derive(Clone)]
pub struct DiscordConfig {
    /// Bot token from the Discord Developer Portal.
    pub bot_token: String,
    /// The bot's own user ID; its messages are never allowed back in.
    pub bot_user_id: Option<String>,
    /// REST base URL.
    pub api_base: String,
}

impl DiscordConfig {
    pub fn new(bot_token: impl Into<String>) -> Self {
        Self {
            bot_token: bot_token.into(),
            bot_user_id: None,
            api_base: DISCORD_API_BASE.into(),
        }
    }
}

impl std::fmt::Debug for DiscordConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiscordConfig")
            .field("bot_token", &"[REDACTED]")
            .field("bot_user_id", &self.bot_user_id)
            .field("api_base", &self.api_base)
            .finish()
    }
}

/// Discord channel adapter.
pub struct DiscordChannel {
    config: DiscordConfig,
    channel_id: ChannelId,
    client: reqwest::Client,
    inject_tx: Mutex<Option<mpsc::Sender<Result<ChannelMessage, ChannelError>>>>,
    gateway_tx: Option<mpsc::Sender<Value>>,
}

impl DiscordChannel {
    pub fn new(config: DiscordConfig) -> Self {
        Self {
            config,
            channel_id: ChannelId("discord".into()),
            client: reqwest::Client::new(),
            inject_tx: Mutex::new(None),
            gateway_tx: None,
        }
    }

    /// Send gateway commands (presence updates) to the host's gateway session.
    pub fn with_gateway_relay(mut self, tx: mpsc::Sender<Value>) -> Self {
        self.gateway_tx = Some(tx);
        self
    }

    /// Inject a message as if it came from Discord.
    pub async fn inject_message(&self, msg: ChannelMessage) -> Result<(), ChannelError> {
        let guard = self.inject_tx.lock().await;
        if let Some(tx) = guard.as_ref() {
            tx.send(Ok(msg))
                .await
                .map_err(|_| ChannelError::ConnectionLost("Message channel closed".into()))
        } else {
            Err(ChannelError::ConnectionLost("Channel not started".into()))
        }
    }

    /// Inject a raw `MESSAGE_CREATE` payload.
    pub async fn inject_event(&self, event: &Value) -> Result<(), ChannelError> {
        let msg = Self::parse_message(&self.channel_id, event).ok_or_else(|| {
            ChannelError::DeliveryFailed {
                channel: "discord".into(),
                reason: "malformed MESSAGE_CREATE payload".into(),
            }
        })?;
        self.inject_message(msg).await
    }

    /// Gateway op-3 (Presence Update) payload.
    ///
    /// A non-empty `status_text` becomes a custom status activity. Discord
    /// calls the offline state `invisible` on the gateway.
    pub fn presence_update(presence: Presence, status_text: &str) -> Value {
        let status = match presence {
            Presence::Offline => "invisible",
            other => other.as_str(),
        };
        let activities = if status_text.trim().is_empty() {
            Vec::new()
        } else {
            vec![serde_json::json!({
                "name": "Custom Status",
                "type": 4,
                "state": status_text,
            })]
        };
        serde_json::json!({
            "op": 3,
            "d": {
                "since": null,
                "activities": activities,
                "status": status,
                "afk": false,
            }
        })
    }

    /// Convert a `MESSAGE_CREATE` payload into a [`ChannelMessage`].
    pub fn parse_message(channel_id: &ChannelId, event: &Value) -> Option<ChannelMessage> {
        let author = event.get("author")?;
        let sender_id = author.get("id")?.as_str()?.to_string();
        let chat_id = event.get("channel_id")?.as_str()?.to_string();

        let attachments = event
            .get("attachments")
            .and_then(Value::as_array)
            .map(|items| items.iter().filter_map(parse_attachment).collect())
            .unwrap_or_default();

        let mut metadata = serde_json::Map::new();
        if let Some(guild) = event.get("guild_id").and_then(Value::as_str) {
            metadata.insert("guild_id".into(), Value::String(guild.into()));
        }
        if let Some(username) = author.get("username").and_then(Value::as_str) {
            metadata.insert("username".into(), Value::String(username.into()));
        }

        // Display name: guild nick, then global name, then username.
        let sender_name = event
            .pointer("/member/nick")
            .and_then(Value::as_str)
            .or_else(|| author.get("global_name").and_then(Value::as_str))
            .or_else(|| author.get("username").and_then(Value::as_str))
            .map(str::to_string);

        Some(ChannelMessage {
            channel_id: channel_id.clone(),
            message_id: event.get("id").and_then(Value::as_str).map(str::to_string),
            sender_id,
            sender_name,
            is_bot: author.get("bot").and_then(Value::as_bool).unwrap_or(false),
            content: event
                .get("content")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            chat_id,
            attachments,
            metadata,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.config.api_base.trim_end_matches('/'))
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        request.header("Authorization", format!("Bot {}", self.config.bot_token))
    }

    async fn execute(
        &self,
        request: reqwest::RequestBuilder,
        action: &str,
    ) -> Result<reqwest::Response, ChannelError> {
        let response = self
            .authorize(request)
            .send()
            .await
            .map_err(|e| delivery_failed(format!("{action}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(delivery_failed(format!("{action}: HTTP {status}: {body}")));
        }
        Ok(response)
    }

    async fn guild_ids(&self) -> Result<Vec<String>, ChannelError> {
        let response = self
            .execute(self.client.get(self.url("/users/@me/guilds")), "list guilds")
            .await?;
        let guilds: Value = response
            .json()
            .await
            .map_err(|e| delivery_failed(format!("list guilds: {e}")))?;

        Ok(guilds
            .as_array()
            .map(|items| {
                items
                    .iter()
                    .filter_map(|g| g.get("id").and_then(Value::as_str).map(str::to_string))
                    .collect()
            })
            .unwrap_or_default())
    }
}

fn parse_attachment(item: &Value) -> Option<Attachment> {
    Some(Attachment {
        url: item.get("url")?.as_str()?.to_string(),
        filename: item
            .get("filename")
            .and_then(Value::as_str)
            .map(str::to_string),
        mime_type: item
            .get("content_type")
            .and_then(Value::as_str)
            .map(str::to_string),
        size_bytes: item.get("size").and_then(Value::as_u64),
    })
}

fn delivery_failed(reason: String) -> ChannelError {
    ChannelError::DeliveryFailed {
        channel: "discord".into(),
        reason,
    }
}

/// Split `content` into pieces Discord will accept, on char boundaries.
pub fn chunk_message(content: &str, limit: usize) -> Vec<String> {
    let limit = limit.max(1);
    let chars: Vec<char> = content.chars().collect();
    if chars.is_empty() {
        return vec![String::new()];
    }
    chars
        .chunks(limit)
        .map(|piece| piece.iter().collect())
        .collect()
}

#[async_trait]
impl Channel for DiscordChannel {
    fn name(&self) -> &str {
        "discord"
    }

    fn id(&self) -> &ChannelId {
        &self.channel_id
    }

    async fn start(
        &self,
    ) -> Result<mpsc::Receiver<Result<ChannelMessage, ChannelError>>, ChannelError> {
        if self.config.bot_token.is_empty() {
            return Err(ChannelError::NotConfigured("discord bot token".into()));
        }
        info!("Discord channel starting");
        let (tx, rx) = mpsc::channel(64);
        *self.inject_tx.lock().await = Some(tx);
        Ok(rx)
    }

    async fn send(&self, chat_id: &str, content: &str) -> Result<Option<String>, ChannelError> {
        let path = format!("/channels/{chat_id}/messages");
        let mut first_id = None;

        for piece in chunk_message(content, MESSAGE_LIMIT) {
            let request = self
                .client
                .post(self.url(&path))
                .json(&serde_json::json!({ "content": piece }));
            let response = self.execute(request, "send message").await?;
            let body: Value = response
                .json()
                .await
                .map_err(|e| delivery_failed(format!("send message: {e}")))?;

            if first_id.is_none() {
                first_id = body.get("id").and_then(Value::as_str).map(str::to_string);
            }
        }

        debug!(chat_id = %chat_id, length = content.len(), "Discord message sent");
        Ok(first_id)
    }

    async fn send_typing(&self, chat_id: &str) -> Result<(), ChannelError> {
        let path = format!("/channels/{chat_id}/typing");
        self.execute(self.client.post(self.url(&path)), "typing")
            .await
            .map(|_| ())
    }

    async fn add_reaction(
        &self,
        chat_id: &str,
        message_id: &str,
        emoji: &str,
    ) -> Result<(), ChannelError> {
        let path = format!(
            "/channels/{chat_id}/messages/{message_id}/reactions/{}/@me",
            urlencoding::encode(emoji)
        );
        self.execute(self.client.put(self.url(&path)), "add reaction")
            .await
            .map(|_| ())
    }

    async fn set_presence(
        &self,
        presence: Presence,
        status_text: &str,
    ) -> Result<(), ChannelError> {
        let Some(tx) = &self.gateway_tx else {
            return Err(ChannelError::Unsupported {
                channel: "discord".into(),
                operation: "presence without a gateway relay".into(),
            });
        };
        tx.send(Self::presence_update(presence, status_text))
            .await
            .map_err(|_| ChannelError::ConnectionLost("Gateway relay closed".into()))?;
        info!(
            presence = presence.as_str(),
            status = %status_text,
            "Discord presence update relayed"
        );
        Ok(())
    }

    async fn set_nickname(&self, name: &str) -> Result<(), ChannelError> {
        for guild_id in self.guild_ids().await? {
            let path = format!("/guilds/{guild_id}/members/@me");
            let response = self
                .authorize(
                    self.client
                        .patch(self.url(&path))
                        .json(&serde_json::json!({ "nick": name })),
                )
                .send()
                .await
                .map_err(|e| delivery_failed(format!("change nickname: {e}")))?;

            match response.status() {
                status if status.is_success() => {}
                StatusCode::FORBIDDEN => {
                    debug!(guild = %guild_id, "No permission to change nickname, skipping");
                }
                status => {
                    warn!(guild = %guild_id, status = %status, "Nickname change failed");
                }
            }
        }
        Ok(())
    }

    async fn download_attachment(&self, attachment: &Attachment) -> Result<Vec<u8>, ChannelError> {
        let response = self
            .client
            .get(&attachment.url)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| delivery_failed(format!("download attachment: {e}")))?;

        let bytes = response
            .bytes()
            .await
            .map_err(|e| delivery_failed(format!("download attachment: {e}")))?;
        Ok(bytes.to_vec())
    }

    fn is_allowed(&self, sender_id: &str) -> bool {
        self.config.bot_user_id.as_deref() != Some(sender_id)
    }

    async fn stop(&self) -> Result<(), ChannelError> {
        info!("Discord channel stopping");
        *self.inject_tx.lock().await = None;
        Ok(())
    }

    async fn health_check(&self) -> Result<bool, ChannelError> {
        if self.config.bot_token.is_empty() {
            return Ok(false);
        }
        match self
            .execute(self.client.get(self.url("/users/@me")), "health check")
            .await
        {
            Ok(_) => Ok(true),
            Err(e) => {
                warn!(error = %e, "Discord health check failed");
                Ok(false)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> DiscordConfig {
        DiscordConfig {
            bot_token: "test-discord-token".into(),
            bot_user_id: Some("42".into()),
            // Nothing listens here; requests fail fast.
            api_base: "http://127.0.0.1:1".into(),
        }
    }

    fn create_event() -> Value {
        serde_json::json!({
            "id": "1001",
            "channel_id": "555",
            "guild_id": "777",
            "content": "look at this",
            "author": { "id": "7", "username": "ana", "global_name": "Ana", "bot": false },
            "attachments": [{
                "url": "https://cdn.discordapp.com/a/cat.png?ex=1",
                "filename": "cat.png",
                "content_type": "image/png",
                "size": 1234
            }]
        })
    }

    #[test]
    fn channel_name_and_id() {
        let ch = DiscordChannel::new(test_config());
        assert_eq!(ch.name(), "discord");
        assert_eq!(ch.id().0, "discord");
    }

    #[test]
    fn own_messages_are_not_allowed() {
        let ch = DiscordChannel::new(test_config());
        assert!(ch.is_allowed("7"));
        assert!(!ch.is_allowed("42"));
    }

    #[test]
    fn debug_redacts_token() {
        let printed = format!("{:?}", test_config());
        assert!(!printed.contains("test-discord-token"));
    }

    #[test]
    fn parses_message_create_payload() {
        let msg = DiscordChannel::parse_message(&ChannelId("discord".into()), &create_event())
            .unwrap();
        assert_eq!(msg.message_id.as_deref(), Some("1001"));
        assert_eq!(msg.sender_id, "7");
        assert_eq!(msg.display_name(), "Ana");
        assert_eq!(msg.chat_id, "555");
        assert_eq!(msg.metadata["username"], "ana");
        assert_eq!(msg.metadata["guild_id"], "777");
        assert_eq!(msg.attachments.len(), 1);
        assert!(msg.attachments[0].is_image());
    }

    #[test]
    fn payload_without_author_is_rejected() {
        let event = serde_json::json!({ "id": "1", "channel_id": "2", "content": "x" });
        assert!(DiscordChannel::parse_message(&ChannelId("discord".into()), &event).is_none());
    }

    #[test]
    fn long_messages_are_chunked_on_char_boundaries() {
        let text = "é".repeat(4500);
        let pieces = chunk_message(&text, MESSAGE_LIMIT);
        assert_eq!(pieces.len(), 3);
        assert_eq!(pieces[0].chars().count(), 2000);
        assert_eq!(pieces[2].chars().count(), 500);
        assert_eq!(chunk_message("", MESSAGE_LIMIT), vec![String::new()]);
    }

    #[tokio::test]
    async fn start_inject_and_receive() {
        let ch = DiscordChannel::new(test_config());
        let mut rx = ch.start().await.unwrap();

        ch.inject_event(&create_event()).await.unwrap();
        let received = rx.recv().await.unwrap().unwrap();
        assert_eq!(received.content, "look at this");
    }

    #[tokio::test]
    async fn inject_before_start_fails() {
        let ch = DiscordChannel::new(test_config());
        assert!(ch.inject_event(&create_event()).await.is_err());
    }

    #[tokio::test]
    async fn start_requires_a_token() {
        let ch = DiscordChannel::new(DiscordConfig::new(""));
        assert!(matches!(
            ch.start().await,
            Err(ChannelError::NotConfigured(_))
        ));
    }

    #[tokio::test]
    async fn presence_is_relayed_as_gateway_update() {
        let (tx, mut rx) = mpsc::channel(4);
        let ch = DiscordChannel::new(test_config()).with_gateway_relay(tx);

        ch.set_presence(Presence::Idle, "napping").await.unwrap();

        let update = rx.recv().await.unwrap();
        assert_eq!(update["op"], 3);
        assert_eq!(update["d"]["status"], "idle");
        assert_eq!(update["d"]["activities"][0]["type"], 4);
        assert_eq!(update["d"]["activities"][0]["state"], "napping");
    }

    #[tokio::test]
    async fn presence_without_relay_is_unsupported() {
        let ch = DiscordChannel::new(test_config());
        let err = ch.set_presence(Presence::Online, "hi").await.unwrap_err();
        assert!(matches!(err, ChannelError::Unsupported { .. }));
    }

    #[tokio::test]
    async fn closed_relay_is_a_lost_connection() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let ch = DiscordChannel::new(test_config()).with_gateway_relay(tx);
        let err = ch.set_presence(Presence::Online, "hi").await.unwrap_err();
        assert!(matches!(err, ChannelError::ConnectionLost(_)));
    }

    #[test]
    fn offline_maps_to_invisible_and_empty_text_clears_activity() {
        let update = DiscordChannel::presence_update(Presence::Offline, "  ");
        assert_eq!(update["d"]["status"], "invisible");
        assert_eq!(update["d"]["activities"], serde_json::json!([]));
    }

    #[tokio::test]
    async fn unreachable_api_is_a_delivery_failure() {
        let ch = DiscordChannel::new(test_config());
        let err = ch.send("555", "hello").await.unwrap_err();
        assert!(matches!(err, ChannelError::DeliveryFailed { .. }));
        assert!(!ch.health_check().await.unwrap());
    }
}
