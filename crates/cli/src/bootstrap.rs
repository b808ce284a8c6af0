//! Wiring configuration into providers, stores and a session.

use std::error::Error;
use std::path::Path;
use std::sync::Arc;

use mnemo_agent::{
    AdminPolicy, ContextAssembler, Generator, MemorySynthesizer, Session, SynthesisSupervisor,
};
use mnemo_config::{AppConfig, MemoryBackendKind, MemoryConfig};
use mnemo_core::channel::Channel;
use mnemo_core::event::EventBus;
use mnemo_core::identity::Identity;
use mnemo_core::memory::DocumentBackend;
use mnemo_core::provider::Provider;
use mnemo_memory::{FileBackend, InMemoryBackend, MemoryStore};
use mnemo_providers::{HttpBlobStore, OpenAiCompatProvider};
use tracing::{debug, info};

/// Display name the agent speaks under.
pub const AGENT_NAME: &str = "mnemo";

pub fn load_config(path: &Path) -> Result<AppConfig, Box<dyn Error>> {
    AppConfig::load_with_env(path).map_err(|e| format!("Failed to load config: {e}").into())
}

pub fn provider(config: &AppConfig) -> Result<Arc<dyn Provider>, Box<dyn Error>> {
    let Some(api_key) = config.api_key.as_deref() else {
        eprintln!();
        eprintln!("  ERROR: No API key configured!");
        eprintln!();
        eprintln!("  Set MNEMO_API_KEY or OPENAI_API_KEY, or add `api_key` to");
        eprintln!("    {}", AppConfig::config_dir().join("config.toml").display());
        eprintln!();
        return Err("No API key found. See above for setup instructions.".into());
    };
    Ok(Arc::new(OpenAiCompatProvider::new(
        "openai",
        &config.api_url,
        api_key,
    )))
}

pub async fn memory_store(config: &MemoryConfig) -> Result<MemoryStore, Box<dyn Error>> {
    let backend: Arc<dyn DocumentBackend> = match config.backend {
        MemoryBackendKind::File => Arc::new(FileBackend::new(&config.path)),
        MemoryBackendKind::Memory => Arc::new(InMemoryBackend::new()),
        MemoryBackendKind::Postgres => postgres_backend(config).await?,
    };
    debug!(backend = %backend.name(), key = %config.document_key, "Memory backend ready");
    Ok(MemoryStore::with_key(backend, &config.document_key))
}

#[cfg(feature = "postgres")]
async fn postgres_backend(
    config: &MemoryConfig,
) -> Result<Arc<dyn DocumentBackend>, Box<dyn Error>> {
    let url = config
        .database_url
        .as_deref()
        .ok_or("memory.database_url is required for the postgres backend")?;
    let backend = mnemo_memory::PostgresBackend::connect(url, &config.table).await?;
    Ok(Arc::new(backend))
}

#[cfg(not(feature = "postgres"))]
async fn postgres_backend(
    _config: &MemoryConfig,
) -> Result<Arc<dyn DocumentBackend>, Box<dyn Error>> {
    Err("this build of mnemo has no PostgreSQL support (rebuild with `--features postgres`)".into())
}

/// Build a session speaking as `agent_id` over `channel`.
///
/// No chat filter is applied here; callers serving a shared platform add one.
pub async fn session(
    config: &AppConfig,
    channel: Arc<dyn Channel>,
    agent_id: &str,
) -> Result<Session, Box<dyn Error>> {
    let provider = provider(config)?;
    let store = memory_store(&config.memory).await?;
    let events = Arc::new(EventBus::default());

    let mut synthesizer = MemorySynthesizer::new(provider.clone(), config.synthesis_model());
    if let Some(prompt) = config.memory.synthesis_prompt()? {
        synthesizer = synthesizer.with_prompt(prompt);
    }
    let supervisor = SynthesisSupervisor::new(Arc::new(synthesizer), store.clone(), events.clone());

    let identity = Identity::load(
        agent_id,
        AGENT_NAME,
        config.session.system_prompt.as_deref(),
        config.session.system_prompt_file.as_deref(),
    );
    info!(
        model = %config.model,
        synthesis_model = %config.synthesis_model(),
        prompt = %identity.source,
        memory = %store.backend_name(),
        "Session configured"
    );

    let generator = Generator::new(provider, &config.model)
        .with_temperature(config.temperature)
        .with_max_tokens(config.max_tokens);

    let mut session = Session::new(
        ContextAssembler::new(identity),
        generator,
        store,
        channel,
        supervisor,
        events,
        config.session.clone(),
    )
    .with_admin(AdminPolicy::new(
        config.admin.allowed_users.clone(),
        config.admin.env_file.clone(),
    ));

    if config.session.tools_enabled {
        session = session.with_tools(Arc::new(mnemo_tools::default_registry()));
    }

    let attachments = &config.attachments;
    if let (Some(url), Some(token)) = (&attachments.upload_url, &attachments.token) {
        let store = HttpBlobStore::new(url, token)
            .with_prefix(&attachments.prefix)
            .with_large_upload_bytes(attachments.large_upload_bytes);
        session = session.with_attachment_store(Arc::new(store));
    }

    Ok(session)
}
