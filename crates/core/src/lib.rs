//! # mnemo core
//!
//! Domain types, traits, and error definitions for the mnemo chat agent.
//! This crate has **no I/O implementations**; it defines the domain model
//! that all other crates implement against.
//!
//! Every external collaborator (model backend, chat platform, document
//! store, attachment host) is a trait here. Implementations live in their
//! respective crates, so tests can swap in scripted stand-ins.

pub mod attachment;
pub mod channel;
pub mod error;
pub mod event;
pub mod identity;
pub mod memory;
pub mod message;
pub mod provider;
pub mod tool;
pub mod window;

// Re-export key types at crate root for ergonomics
pub use attachment::AttachmentStore;
pub use channel::{Channel, ChannelId, ChannelMessage, Presence};
pub use error::{Error, Result};
pub use event::{DomainEvent, EventBus};
pub use identity::Identity;
pub use memory::{BotIdentity, ConversationContext, DocumentBackend, MemoryBank, UserMemory};
pub use message::{Attachment, Role, RollingMessage};
pub use provider::{
    ContentPart, PromptMessage, Provider, ProviderRequest, ProviderResponse, ResponseFormat,
};
pub use tool::{NO_OP_SENTINEL, Tool, ToolArg, ToolContext, ToolOutcome, ToolRegistry};
pub use window::RollingWindow;
