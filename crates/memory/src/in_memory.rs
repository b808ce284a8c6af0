//! In-memory backend: useful for testing and ephemeral sessions.

use async_trait::async_trait;
use mnemo_core::error::MemoryError;
use mnemo_core::memory::DocumentBackend;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Documents kept in a map. Lost on restart.
#[derive(Clone, Default)]
pub struct InMemoryBackend {
    documents: Arc<RwLock<HashMap<String, String>>>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DocumentBackend for InMemoryBackend {
    fn name(&self) -> &str {
        "memory"
    }

    async fn get(&self, key: &str) -> Result<Option<String>, MemoryError> {
        Ok(self.documents.read().await.get(key).cloned())
    }

    async fn put(&self, key: &str, document: &str) -> Result<(), MemoryError> {
        self.documents
            .write()
            .await
            .insert(key.to_string(), document.to_string());
        Ok(())
    }
}
