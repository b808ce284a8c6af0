//! File-based document backend: the memory bank as one JSON file.
//!
//! Storage location: `~/.mnemo/memory.json` by default. The file holds a
//! single document, so the key is ignored. Writes go to a sibling temp
//! file first and are renamed into place, so a crash mid-write never leaves
//! a truncated bank behind.

use async_trait::async_trait;
use mnemo_core::error::MemoryError;
use mnemo_core::memory::DocumentBackend;
use std::path::{Path, PathBuf};
use tracing::debug;

pub struct FileBackend {
    path: PathBuf,
}

impl FileBackend {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "memory.json".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[async_trait]
impl DocumentBackend for FileBackend {
    fn name(&self) -> &str {
        "file"
    }

    async fn get(&self, _key: &str) -> Result<Option<String>, MemoryError> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => {
                debug!(path = %self.path.display(), bytes = content.len(), "Read memory document");
                Ok(Some(content))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(MemoryError::Storage(format!(
                "Failed to read {}: {e}",
                self.path.display()
            ))),
        }
    }

    async fn put(&self, _key: &str, document: &str) -> Result<(), MemoryError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                MemoryError::Storage(format!("Failed to create memory directory: {e}"))
            })?;
        }

        let tmp = self.temp_path();
        tokio::fs::write(&tmp, document)
            .await
            .map_err(|e| MemoryError::Storage(format!("Failed to write memory file: {e}")))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| MemoryError::Storage(format!("Failed to replace memory file: {e}")))?;

        debug!(path = %self.path.display(), bytes = document.len(), "Wrote memory document");
        Ok(())
    }
}
