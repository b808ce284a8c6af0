//! Context assembly: rolling window + memory bank → role-tagged prompt.
//!
//! The prompt is built from two layers:
//!
//! 1. **System**: the persona prompt with the rendered memory bank
//!    substituted in, followed by the tool catalog when tools are active
//! 2. **Conversation**: one entry per window message, oldest first
//!
//! # Roles
//!
//! An entry is an assistant turn iff its speaker is the agent itself.
//! Everything else (other people, synthetic tool results) is a user turn
//! prefixed with the speaker's name, so the model can tell who said what.
//! Image attachments become extra image parts on user turns.
//!
//! # Determinism
//!
//! Assembly is a pure function of its inputs. Window size is bounded by
//! the window itself; no further trimming happens here.

use mnemo_core::identity::Identity;
use mnemo_core::memory::MemoryBank;
use mnemo_core::message::{Role, RollingMessage};
use mnemo_core::provider::{ContentPart, PromptMessage};
use mnemo_core::tool::ToolRegistry;
use mnemo_core::window::RollingWindow;

/// Header placed above the tool catalog.
pub const TOOL_INSTRUCTIONS: &str = "You can use tools. To call one, end your reply with a new \
line of the form `call <name> <arguments>`, with arguments separated by commas. Whatever you \
wrote before that line is sent right away; the tool's result is shown to you and you get to \
reply again. Use `call none` to send nothing at all. Available tools:";

// ── Assembler ─────────────────────────────────────────────────────────────

/// The context assembler. Holds the agent's identity; otherwise stateless.
#[derive(Debug, Clone)]
pub struct ContextAssembler {
    identity: Identity,
}

impl ContextAssembler {
    pub fn new(identity: Identity) -> Self {
        Self { identity }
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// Build the prompt for one generation round.
    ///
    /// `tools` is `None` (or an empty registry) when tool support is off.
    pub fn build(
        &self,
        bank: &MemoryBank,
        window: &RollingWindow,
        tools: Option<&ToolRegistry>,
    ) -> Vec<PromptMessage> {
        let mut prompt = Vec::with_capacity(window.len() + 1);
        prompt.push(PromptMessage::system(self.system_text(bank, tools)));
        prompt.extend(window.iter().map(|message| self.entry(message)));
        prompt
    }

    /// System entry text: persona + memory, then the tool catalog.
    pub fn system_text(&self, bank: &MemoryBank, tools: Option<&ToolRegistry>) -> String {
        let mut text = self.identity.render_system_prompt(&bank.render());

        if let Some(registry) = tools.filter(|r| !r.is_empty()) {
            text.push_str("\n\n");
            text.push_str(TOOL_INSTRUCTIONS);
            text.push_str(&registry.catalog());
        }

        text
    }

    fn entry(&self, message: &RollingMessage) -> PromptMessage {
        if message.is_from(&self.identity.id) {
            return PromptMessage::assistant(message.text_content.as_str());
        }

        let mut content = vec![ContentPart::Text {
            text: format!("{}: {}", message.speaker_name, message.text_content),
        }];
        content.extend(message.images().map(|image| ContentPart::ImageUrl {
            url: image.url.clone(),
        }));

        PromptMessage {
            role: Role::User,
            content,
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────
