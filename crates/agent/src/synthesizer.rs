//! Memory synthesis: re-derive the memory bank from recent conversation.
//!
//! The model is shown the current bank and the rolling window and asked for
//! a complete replacement bank. Two extraction strategies run in order:
//!
//! 1. **Structured**: the request carries the bank's JSON Schema as a strict
//!    `response_format`; the reply content is parsed directly.
//! 2. **Raw**: a plain request; the reply text is normalized across response
//!    shapes, a `<think>` preamble and code fences are stripped, and the
//!    outermost JSON object is validated against the closed schema.
//!
//! If neither yields a valid bank the cycle fails and nothing is written.

use std::sync::Arc;
use std::time::Instant;

use mnemo_core::error::SynthesisError;
use mnemo_core::memory::MemoryBank;
use mnemo_core::message::RollingMessage;
use mnemo_core::provider::{
    PromptMessage, Provider, ProviderRequest, ResponseFormat, normalize_text,
};
use mnemo_memory::MemoryStore;
use tracing::{debug, error, info, warn};

/// Placeholder in the synthesis prompt replaced by the agent's user ID.
pub const BOT_USER_ID_PLACEHOLDER: &str = "{bot_user_id}";

/// Built-in synthesis system prompt.
pub const DEFAULT_SYNTHESIS_PROMPT: &str = r#"You maintain the long-term memory of a chat bot whose user ID is {bot_user_id}.

You receive the current memory bank as JSON and a transcript of recent messages, one per line, as `name (ID: id): text`. Return the complete, updated memory bank as a single JSON object with exactly these keys:

- bot_identity: {personality_traits, beliefs, background_facts, preferences, mood_notes}, each a list of short strings describing the bot ({bot_user_id}) itself.
- users: an object keyed by user ID. Each value has user_id, current_username, preferred_name (string or null), previous_usernames, possibly_aka (string or null), facts, preferences, projects, personality_notes.
- conversation_context: {current_topic, ongoing_jokes, emotional_tone}, describing the conversation right now.
- recent_summary: a few sentences about what happened recently.
- historical_context: a compact narrative of older events worth keeping.

Rules:
- Keep everything from the current bank that is still true. Merge new facts in; drop facts that were contradicted.
- Never store the bot's own messages as facts about a user.
- When a known user ID shows up under a new name, move the old name to previous_usernames.
- Keep entries short. Do not invent information.
- Do not add keys that are not listed above."#;

/// Turns a message window into a replacement memory bank.
pub struct MemorySynthesizer {
    provider: Arc<dyn Provider>,
    model: String,
    prompt: String,
}

impl MemorySynthesizer {
    pub fn new(provider: Arc<dyn Provider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            prompt: DEFAULT_SYNTHESIS_PROMPT.into(),
        }
    }

    /// Replace the synthesis system prompt (may contain `{bot_user_id}`).
    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = prompt.into();
        self
    }

    /// Render the window as `speaker (ID: id): text` lines.
    pub fn format_window(window: &[RollingMessage]) -> String {
        window
            .iter()
            .map(|m| format!("{} (ID: {}): {}", m.speaker_name, m.speaker_id, m.text_content))
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn prompt_messages(
        &self,
        window: &[RollingMessage],
        current: &MemoryBank,
        agent_id: &str,
    ) -> Vec<PromptMessage> {
        // Plain structs with string keys; serialization cannot fail.
        let bank_json = serde_json::to_string_pretty(current).unwrap_or_default();
        let user_prompt = format!(
            "Current Memory:\n{bank_json}\n\nRecent Messages:\n{}\n\n\
             Update the memory bank with any new information. \
             Return only the JSON object described above.",
            Self::format_window(window)
        );

        vec![
            PromptMessage::system(self.prompt.replace(BOT_USER_ID_PLACEHOLDER, agent_id)),
            PromptMessage::user(user_prompt),
        ]
    }

    /// Produce a new bank from `window` and `current`. Never mutates `current`.
    pub async fn synthesize(
        &self,
        window: &[RollingMessage],
        current: &MemoryBank,
        agent_id: &str,
    ) -> Result<MemoryBank, SynthesisError> {
        let messages = self.prompt_messages(window, current, agent_id);

        let structured_failure = match self.structured(messages.clone()).await {
            Ok(bank) => return Ok(bank),
            Err(reason) => {
                debug!(reason = %reason, "Structured synthesis failed, retrying with raw output");
                reason
            }
        };

        let request = ProviderRequest::new(&self.model, messages);
        let response = self.provider.complete(request).await?;

        let text = if response.content.trim().is_empty() {
            normalize_text(&response.raw)
        } else {
            response.content
        };
        if text.trim().is_empty() {
            return Err(SynthesisError::EmptyResponse);
        }

        MemoryBank::from_json(extract_json_document(&text)).map_err(|e| {
            SynthesisError::Invalid {
                structured: structured_failure,
                raw: e.to_string(),
            }
        })
    }

    async fn structured(&self, messages: Vec<PromptMessage>) -> Result<MemoryBank, String> {
        let request = ProviderRequest::new(&self.model, messages).with_response_format(
            ResponseFormat {
                name: "memory_bank".into(),
                schema: MemoryBank::json_schema(),
                strict: true,
            },
        );

        let response = self
            .provider
            .complete(request)
            .await
            .map_err(|e| e.to_string())?;
        if response.content.trim().is_empty() {
            return Err("empty structured response".into());
        }
        MemoryBank::from_json(&response.content).map_err(|e| e.to_string())
    }

    /// [`synthesize`](Self::synthesize), logging failures before returning them.
    pub async fn synthesize_safe(
        &self,
        window: &[RollingMessage],
        current: &MemoryBank,
        agent_id: &str,
    ) -> Result<MemoryBank, SynthesisError> {
        self.synthesize(window, current, agent_id)
            .await
            .inspect_err(|e| error!(error = %e, messages = window.len(), "Memory synthesis failed"))
    }

    /// Load the bank, synthesize a replacement, and persist it.
    ///
    /// Nothing is written unless the current bank was read and synthesis
    /// succeeds.
    pub async fn background_update(
        &self,
        store: &MemoryStore,
        window: Vec<RollingMessage>,
        agent_id: &str,
    ) -> mnemo_core::Result<MemoryBank> {
        let started = Instant::now();
        let current = store.load_for_update().await.inspect_err(|e| {
            warn!(error = %e, "Memory bank unreadable, skipping synthesis");
        })?;
        let updated = self.synthesize_safe(&window, &current, agent_id).await?;
        store.save(&updated).await.inspect_err(|e| {
            warn!(error = %e, "Synthesized memory could not be saved");
        })?;

        info!(
            users = updated.users.len(),
            duration_ms = started.elapsed().as_millis() as u64,
            "Memory bank updated"
        );
        Ok(updated)
    }
}

/// Best-effort slice of the JSON object embedded in free-form model output.
///
/// Drops everything up to a closing `</think>`, prefers a fenced json block,
/// and otherwise takes the span from the first `{` to the last `}`.
pub fn extract_json_document(text: &str) -> &str {
    let cleaned = match text.rfind("</think>") {
        Some(end) => &text[end + "</think>".len()..],
        None => text,
    };

    if let Some(start) = cleaned.find("```json") {
        let after = &cleaned[start + "```json".len()..];
        if let Some(end) = after.find("```") {
            return after[..end].trim();
        }
    }

    match (cleaned.find('{'), cleaned.rfind('}')) {
        (Some(start), Some(end)) if end > start => &cleaned[start..=end],
        _ => cleaned.trim(),
    }
}
