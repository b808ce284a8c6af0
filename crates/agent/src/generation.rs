//! One model completion with the session's request settings.

use std::sync::Arc;

use mnemo_core::error::ProviderError;
use mnemo_core::provider::{PromptMessage, Provider, ProviderRequest};
use tracing::debug;

/// Provider plus the model, temperature and token cap every turn uses.
#[derive(Clone)]
pub struct Generator {
    provider: Arc<dyn Provider>,
    model: String,
    temperature: f32,
    max_tokens: Option<u32>,
}

impl Generator {
    pub fn new(provider: Arc<dyn Provider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            temperature: 0.9,
            max_tokens: None,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: Option<u32>) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Request a completion and return its text.
    pub async fn complete(&self, prompt: Vec<PromptMessage>) -> Result<String, ProviderError> {
        let entries = prompt.len();
        let request = ProviderRequest::new(&self.model, prompt)
            .with_temperature(self.temperature)
            .with_max_tokens(self.max_tokens);

        let response = self.provider.complete(request).await?;
        debug!(
            provider = %self.provider.name(),
            model = %response.model,
            entries,
            chars = response.content.len(),
            "Completion received"
        );
        Ok(response.content)
    }
}

impl std::fmt::Debug for Generator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Generator")
            .field("provider", &self.provider.name())
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .finish()
    }
}
