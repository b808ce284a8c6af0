//! Rolling message domain types.
//!
//! These are the value objects that flow through a single channel session:
//! Channel receives a message → it becomes a [`RollingMessage`] in the
//! short-term window → the assembler turns the window into a prompt.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Speaker identifier used for synthetic entries that carry tool results.
pub const SYSTEM_SPEAKER_ID: &str = "system";

/// The role of a prompt entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// A chat participant (or a system-attributed synthetic entry)
    User,
    /// The agent itself
    Assistant,
    /// System instructions (persona, memory, tool catalog)
    System,
}

/// An attachment carried by a rolling message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    /// URL the model backend can fetch
    pub url: String,

    /// Optional filename
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,

    /// MIME type
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,

    /// File size in bytes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size_bytes: Option<u64>,
}

impl Attachment {
    /// Whether this attachment should be sent to the model as an image part.
    ///
    /// Falls back to the filename extension when no MIME type is known.
    pub fn is_image(&self) -> bool {
        if let Some(mime) = &self.mime_type {
            return mime.starts_with("image/");
        }
        let name = self.filename.as_deref().unwrap_or(&self.url).to_lowercase();
        let name = name.split('?').next().unwrap_or_default();
        [".png", ".jpg", ".jpeg", ".gif", ".webp"]
            .iter()
            .any(|ext| name.ends_with(ext))
    }
}

/// A single entry in the short-term window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RollingMessage {
    /// Unique message ID (platform ID for real messages, UUID for synthetic ones)
    pub id: String,

    /// Display name of the speaker
    pub speaker_name: String,

    /// Stable speaker identifier
    pub speaker_id: String,

    /// The text content
    pub text_content: String,

    /// Attachments (already resolved to durable URLs)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Attachment>,

    /// Arrival time
    pub timestamp: DateTime<Utc>,
}

impl RollingMessage {
    /// Create a new message attributed to a speaker.
    pub fn new(
        speaker_name: impl Into<String>,
        speaker_id: impl Into<String>,
        text_content: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            speaker_name: speaker_name.into(),
            speaker_id: speaker_id.into(),
            text_content: text_content.into(),
            attachments: Vec::new(),
            timestamp: Utc::now(),
        }
    }

    /// Create a synthetic system-attributed entry (tool results).
    pub fn system(text_content: impl Into<String>) -> Self {
        Self::new(SYSTEM_SPEAKER_ID, SYSTEM_SPEAKER_ID, text_content)
    }

    /// Replace the platform-assigned ID.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Attach files to this message.
    pub fn with_attachments(mut self, attachments: Vec<Attachment>) -> Self {
        self.attachments = attachments;
        self
    }

    /// Whether this entry was spoken by the given speaker.
    pub fn is_from(&self, speaker_id: &str) -> bool {
        self.speaker_id == speaker_id
    }

    /// Image attachments only.
    pub fn images(&self) -> impl Iterator<Item = &Attachment> {
        self.attachments.iter().filter(|a| a.is_image())
    }
}
