//! Configuration loading, validation, and management for mnemo.
//!
//! Loads configuration from `~/.mnemo/config.toml` with environment
//! variable overrides. Validates all settings at startup.

pub mod env_file;

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.mnemo/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// API key for the model backend
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Base URL of the OpenAI-compatible endpoint
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Chat model
    #[serde(default = "default_model")]
    pub model: String,

    /// Sampling temperature for replies
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Max tokens per reply (backend default when unset)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    /// Per-channel session behavior
    #[serde(default)]
    pub session: SessionConfig,

    /// Memory bank persistence and synthesis
    #[serde(default)]
    pub memory: MemoryConfig,

    /// Discord channel settings
    #[serde(default)]
    pub discord: DiscordConfig,

    /// Privileged command settings
    #[serde(default)]
    pub admin: AdminConfig,

    /// Durable attachment hosting
    #[serde(default)]
    pub attachments: AttachmentConfig,
}

fn default_api_url() -> String {
    "https://api.openai.com/v1".into()
}
fn default_model() -> String {
    "gpt-4o-mini".into()
}
fn default_temperature() -> f32 {
    0.9
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("api_key", &redact(&self.api_key))
            .field("api_url", &self.api_url)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("session", &self.session)
            .field("memory", &self.memory)
            .field("discord", &self.discord)
            .field("admin", &self.admin)
            .field("attachments", &self.attachments)
            .finish()
    }
}

/// Session behavior: window size, synthesis cadence, tool depth, persona.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Capacity of the short-term rolling window
    #[serde(default = "default_short_term_window")]
    pub short_term_window: usize,

    /// Handled turns between memory synthesis cycles
    #[serde(default = "default_update_frequency")]
    pub update_frequency: u32,

    /// Maximum recursive tool rounds per turn
    #[serde(default = "default_max_tool_depth")]
    pub max_tool_depth: u32,

    /// Upper bound on one turn's generate-and-dispatch, in seconds
    #[serde(default = "default_reply_timeout_secs")]
    pub reply_timeout_secs: u64,

    /// Persona prompt file (may contain `{memory}`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt_file: Option<PathBuf>,

    /// Inline persona prompt, takes precedence over the file
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,

    /// Whether tools are offered to the model
    #[serde(default = "default_true")]
    pub tools_enabled: bool,
}

fn default_short_term_window() -> usize {
    50
}
fn default_update_frequency() -> u32 {
    20
}
fn default_max_tool_depth() -> u32 {
    5
}
fn default_reply_timeout_secs() -> u64 {
    120
}
fn default_true() -> bool {
    true
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            short_term_window: default_short_term_window(),
            update_frequency: default_update_frequency(),
            max_tool_depth: default_max_tool_depth(),
            reply_timeout_secs: default_reply_timeout_secs(),
            system_prompt_file: None,
            system_prompt: None,
            tools_enabled: true,
        }
    }
}

/// Which document backend holds the memory bank.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemoryBackendKind {
    #[default]
    File,
    Postgres,
    Memory,
}

#[derive(Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// Backend type
    #[serde(default)]
    pub backend: MemoryBackendKind,

    /// Path of the local JSON document
    #[serde(default = "default_memory_path")]
    pub path: PathBuf,

    /// PostgreSQL connection URL (postgres backend)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database_url: Option<String>,

    /// Table holding the document row
    #[serde(default = "default_table")]
    pub table: String,

    /// Fixed key of the document row
    #[serde(default = "default_document_key")]
    pub document_key: String,

    /// Model used for synthesis (defaults to the chat model)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub synthesis_model: Option<String>,

    /// Synthesis instructions file (may contain `{bot_user_id}`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt_file: Option<PathBuf>,

    /// Inline synthesis instructions, takes precedence over the file
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
}

fn default_memory_path() -> PathBuf {
    AppConfig::config_dir().join("memory.json")
}
fn default_table() -> String {
    "memory_bank".into()
}
fn default_document_key() -> String {
    "memory".into()
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            backend: MemoryBackendKind::default(),
            path: default_memory_path(),
            database_url: None,
            table: default_table(),
            document_key: default_document_key(),
            synthesis_model: None,
            prompt_file: None,
            prompt: None,
        }
    }
}

impl std::fmt::Debug for MemoryConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryConfig")
            .field("backend", &self.backend)
            .field("path", &self.path)
            .field("database_url", &redact(&self.database_url))
            .field("table", &self.table)
            .field("document_key", &self.document_key)
            .field("synthesis_model", &self.synthesis_model)
            .field("prompt_file", &self.prompt_file)
            .finish()
    }
}

impl MemoryConfig {
    /// Resolve the synthesis instructions: inline text, then file contents.
    pub fn synthesis_prompt(&self) -> Result<Option<String>, ConfigError> {
        if let Some(prompt) = self.prompt.as_ref().filter(|p| !p.trim().is_empty()) {
            return Ok(Some(prompt.clone()));
        }
        match &self.prompt_file {
            Some(path) => std::fs::read_to_string(path)
                .map(Some)
                .map_err(|e| ConfigError::ReadError {
                    path: path.clone(),
                    reason: e.to_string(),
                }),
            None => Ok(None),
        }
    }
}

#[derive(Clone, Default, Serialize, Deserialize)]
pub struct DiscordConfig {
    /// Bot token
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bot_token: Option<String>,

    /// The bot account's user ID
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bot_user_id: Option<String>,

    /// Channels the agent participates in (empty = all)
    #[serde(default)]
    pub channel_ids: Vec<String>,

    /// Guild whose member nickname the agent controls
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guild_id: Option<String>,
}

impl std::fmt::Debug for DiscordConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiscordConfig")
            .field("bot_token", &redact(&self.bot_token))
            .field("bot_user_id", &self.bot_user_id)
            .field("channel_ids", &self.channel_ids)
            .field("guild_id", &self.guild_id)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminConfig {
    /// User IDs allowed to run privileged commands (empty = nobody)
    #[serde(default)]
    pub allowed_users: Vec<String>,

    /// `.env` file updated by `setenv`
    #[serde(default = "default_env_file")]
    pub env_file: PathBuf,
}

fn default_env_file() -> PathBuf {
    PathBuf::from(".env")
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            allowed_users: Vec::new(),
            env_file: default_env_file(),
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct AttachmentConfig {
    /// Blob store endpoint; attachments keep their platform URLs when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upload_url: Option<String>,

    /// Read/write token for the blob store
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,

    /// Pathname prefix for uploaded blobs
    #[serde(default = "default_prefix")]
    pub prefix: String,

    /// Uploads above this many bytes are logged as large
    #[serde(default = "default_large_upload_bytes")]
    pub large_upload_bytes: u64,
}

fn default_prefix() -> String {
    "discord-uploads".into()
}
fn default_large_upload_bytes() -> u64 {
    4 * 1024 * 1024
}

impl Default for AttachmentConfig {
    fn default() -> Self {
        Self {
            upload_url: None,
            token: None,
            prefix: default_prefix(),
            large_upload_bytes: default_large_upload_bytes(),
        }
    }
}

impl std::fmt::Debug for AttachmentConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AttachmentConfig")
            .field("upload_url", &self.upload_url)
            .field("token", &redact(&self.token))
            .field("prefix", &self.prefix)
            .field("large_upload_bytes", &self.large_upload_bytes)
            .finish()
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.mnemo/config.toml).
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_with_env(&Self::config_dir().join("config.toml"))
    }

    /// Load from `path`, then apply environment variable overrides.
    ///
    /// API key precedence: config file, `MNEMO_API_KEY`, `OPENAI_API_KEY`.
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load_from(path)?;
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from an environment lookup.
    pub fn apply_env<F>(&mut self, var: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if self.api_key.is_none() {
            self.api_key = var("MNEMO_API_KEY").or_else(|| var("OPENAI_API_KEY"));
        }
        if let Some(model) = var("MNEMO_MODEL") {
            self.model = model;
        }
        if let Some(window) = var("SHORT_TERM_WINDOW") {
            self.session.short_term_window = parse_env("SHORT_TERM_WINDOW", &window)?;
        }
        if let Some(frequency) = var("UPDATE_FREQUENCY") {
            self.session.update_frequency = parse_env("UPDATE_FREQUENCY", &frequency)?;
        }
        if let Some(path) = var("MEMORY_FILE") {
            self.memory.path = PathBuf::from(path);
        }
        if let Some(url) = var("MNEMO_DATABASE_URL") {
            self.memory.database_url = Some(url);
        }
        if let Some(token) = var("DISCORD_TOKEN") {
            self.discord.bot_token = Some(token);
        }
        if let Some(guild) = var("GUILD_ID") {
            self.discord.guild_id = Some(guild);
        }
        if let Some(token) = var("BLOB_READ_WRITE_TOKEN") {
            self.attachments.token = Some(token);
        }
        Ok(())
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".mnemo")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ConfigError::ValidationError(
                "temperature must be between 0.0 and 2.0".into(),
            ));
        }
        if self.session.short_term_window == 0 {
            return Err(ConfigError::ValidationError(
                "session.short_term_window must be at least 1".into(),
            ));
        }
        if self.session.update_frequency == 0 {
            return Err(ConfigError::ValidationError(
                "session.update_frequency must be at least 1".into(),
            ));
        }
        if self.session.reply_timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "session.reply_timeout_secs must be at least 1".into(),
            ));
        }
        if self.memory.backend == MemoryBackendKind::Postgres && self.memory.database_url.is_none()
        {
            return Err(ConfigError::ValidationError(
                "memory.database_url is required for the postgres backend".into(),
            ));
        }
        if self.memory.document_key.is_empty() {
            return Err(ConfigError::ValidationError(
                "memory.document_key must not be empty".into(),
            ));
        }
        Ok(())
    }

    /// Check if an API key is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// Model used for memory synthesis.
    pub fn synthesis_model(&self) -> &str {
        self.memory.synthesis_model.as_deref().unwrap_or(&self.model)
    }

    /// Generate a default config TOML string (for `onboard` command).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_url: default_api_url(),
            model: default_model(),
            temperature: default_temperature(),
            max_tokens: None,
            session: SessionConfig::default(),
            memory: MemoryConfig::default(),
            discord: DiscordConfig::default(),
            admin: AdminConfig::default(),
            attachments: AttachmentConfig::default(),
        }
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::ValidationError(format!("{key} must be a positive integer, got {value:?}")))
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),

    #[error("Failed to write {path}: {reason}")]
    WriteError { path: PathBuf, reason: String },
}
