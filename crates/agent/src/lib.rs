//! The conversation core of mnemo.
//!
//! One turn runs through these pieces:
//!
//! 1. **Receive** a message from the channel into the session's rolling window
//! 2. **Assemble** the prompt: persona + rendered memory bank + tool catalog + window
//! 3. **Generate** a reply via the configured provider
//! 4. **Dispatch** a trailing `call <tool>` directive, feed the result back, repeat
//! 5. **Deliver** the final text, or nothing if the model asked for silence
//!
//! Every `update_frequency` turns the session hands a snapshot of the window
//! to the synthesis supervisor, which rewrites the memory bank in the
//! background.

pub mod admin;
pub mod context;
pub mod dispatcher;
pub mod generation;
pub mod session;
pub mod supervisor;
pub mod synthesizer;

#[cfg(test)]
mod test_helpers;

pub use admin::{AdminCommand, AdminPolicy};
pub use context::{ContextAssembler, TOOL_INSTRUCTIONS};
pub use dispatcher::{Directive, Dispatch, ToolDispatcher};
pub use generation::Generator;
pub use session::{Session, TurnOutcome};
pub use supervisor::SynthesisSupervisor;
pub use synthesizer::{DEFAULT_SYNTHESIS_PROMPT, MemorySynthesizer};
