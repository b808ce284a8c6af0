//! Identity: who the agent is and the persona prompt it speaks from.
//!
//! The system prompt template is resolved in order:
//!
//! 1. **Inline override**: `session.system_prompt` in config
//! 2. **Prompt file**: `session.system_prompt_file`
//! 3. **Built-in default**
//!
//! A template may contain a `{memory}` placeholder, which is replaced by the
//! rendered memory bank. Without one, the memory text is appended.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Placeholder substituted with the rendered memory bank.
pub const MEMORY_PLACEHOLDER: &str = "{memory}";

/// The agent's identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Identity {
    /// Platform user ID of the agent's own account.
    ///
    /// Window entries whose speaker ID matches are rendered as assistant turns.
    pub id: String,

    /// The agent's display name
    pub name: String,

    /// System prompt template
    pub system_prompt: String,

    /// Where the template came from (for diagnostics)
    #[serde(default)]
    pub source: String,
}

impl Identity {
    /// Create an identity with the built-in prompt.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            system_prompt: Self::fallback_system_prompt(),
            source: "<default>".into(),
        }
    }

    fn fallback_system_prompt() -> String {
        concat!(
            "You are a member of a group chat, not an assistant. ",
            "Talk casually, keep replies short, and have opinions of your own. ",
            "Messages from other people are prefixed with their name.\n\n",
            "What you remember:\n{memory}",
        )
        .into()
    }

    /// Resolve the prompt template from an inline override or a file.
    ///
    /// An unreadable or empty file falls back to the built-in prompt.
    pub fn load(
        id: impl Into<String>,
        name: impl Into<String>,
        system_prompt_override: Option<&str>,
        prompt_file: Option<&Path>,
    ) -> Self {
        let mut identity = Self::new(id, name);

        if let Some(prompt) = system_prompt_override.filter(|p| !p.trim().is_empty()) {
            debug!("Using inline system prompt");
            identity.system_prompt = prompt.to_string();
            identity.source = "<inline>".into();
            return identity;
        }

        if let Some(path) = prompt_file {
            match std::fs::read_to_string(path) {
                Ok(content) if !content.trim().is_empty() => {
                    debug!(file = %path.display(), "Loaded system prompt");
                    identity.system_prompt = content;
                    identity.source = path.display().to_string();
                }
                Ok(_) => warn!(file = %path.display(), "System prompt file is empty, using default"),
                Err(e) => {
                    warn!(file = %path.display(), error = %e, "Failed to read system prompt, using default")
                }
            }
        }

        identity
    }

    /// The system prompt with the rendered memory substituted in.
    pub fn render_system_prompt(&self, memory: &str) -> String {
        if self.system_prompt.contains(MEMORY_PLACEHOLDER) {
            self.system_prompt.replace(MEMORY_PLACEHOLDER, memory)
        } else if memory.is_empty() {
            self.system_prompt.clone()
        } else {
            format!("{}\n\n{}", self.system_prompt.trim_end(), memory)
        }
    }
}
