//! Error types for the mnemo domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error variant.

use thiserror::Error;

/// The top-level error type for all mnemo operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Provider errors ---
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    // --- Channel errors ---
    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),

    // --- Memory errors ---
    #[error("Memory error: {0}")]
    Memory(#[from] MemoryError),

    // --- Tool errors ---
    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    // --- Synthesis errors ---
    #[error("Memory synthesis error: {0}")]
    Synthesis(#[from] SynthesisError),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),
}

#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("Channel not configured: {0}")]
    NotConfigured(String),

    #[error("Message delivery failed to {channel}: {reason}")]
    DeliveryFailed { channel: String, reason: String },

    #[error("Channel connection lost: {0}")]
    ConnectionLost(String),

    #[error("{channel} does not support {operation}")]
    Unsupported { channel: String, operation: String },
}

#[derive(Debug, Error)]
pub enum MemoryError {
    #[error("Storage error: {0}")]
    Storage(String),

    /// The document does not match the closed memory bank schema.
    #[error("Memory document rejected: {0}")]
    Schema(String),

    #[error("Remote backend error: {0}")]
    Remote(String),

    #[error("Migration failed: {0}")]
    MigrationFailed(String),
}

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Tool not found: {0}")]
    NotFound(String),

    #[error("Tool execution failed: {tool_name}: {reason}")]
    ExecutionFailed { tool_name: String, reason: String },

    #[error("{tool_name}() takes {expected} argument(s) but {given} were given")]
    Arity {
        tool_name: String,
        expected: usize,
        given: usize,
    },

    #[error("Invalid tool arguments: {0}")]
    InvalidArguments(String),

    #[error("Channel action failed: {0}")]
    Channel(#[from] ChannelError),
}

#[derive(Debug, Error)]
pub enum SynthesisError {
    #[error("Provider failed during synthesis: {0}")]
    Provider(#[from] ProviderError),

    #[error("Model response contained no text to parse into a memory bank")]
    EmptyResponse,

    /// Neither the structured nor the raw extraction path produced a valid bank.
    #[error("Synthesized memory failed validation (structured: {structured}; raw: {raw})")]
    Invalid { structured: String, raw: String },
}
