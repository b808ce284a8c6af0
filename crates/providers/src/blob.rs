//! HTTP blob store for attachments.
//!
//! Uploads bytes with `PUT <upload_url>/<pathname>` and a bearer token, and
//! reads the public `url` from the JSON reply (the Vercel Blob API shape).
//! Pathnames are `<prefix>/<16 hex chars>_<filename>` so uploads never
//! collide.

use async_trait::async_trait;
use mnemo_core::AttachmentStore;
use serde::Deserialize;
use tracing::{debug, info, warn};

pub struct HttpBlobStore {
    upload_url: String,
    token: String,
    prefix: String,
    large_upload_bytes: u64,
    client: reqwest::Client,
}

impl HttpBlobStore {
    pub fn new(upload_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            upload_url: upload_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
            prefix: "discord-uploads".into(),
            large_upload_bytes: 4 * 1024 * 1024,
            client: reqwest::Client::new(),
        }
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into().trim_matches('/').to_string();
        self
    }

    pub fn with_large_upload_bytes(mut self, bytes: u64) -> Self {
        self.large_upload_bytes = bytes;
        self
    }

    /// Unique pathname for an upload.
    fn pathname(&self, filename: &str) -> String {
        format!("{}/{}_{}", self.prefix, random_hex(), sanitize(filename))
    }

    async fn put(&self, pathname: &str, bytes: Vec<u8>) -> Result<String, String> {
        let url = format!("{}/{}", self.upload_url, pathname);
        let response = self
            .client
            .put(&url)
            .header("Authorization", format!("Bearer {}", self.token))
            .header("x-add-random-suffix", "0")
            .body(bytes)
            .send()
            .await
            .map_err(|e| e.to_string())?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(format!("HTTP {status}: {body}"));
        }

        let reply: PutReply = response.json().await.map_err(|e| e.to_string())?;
        Ok(reply.url)
    }
}

#[async_trait]
impl AttachmentStore for HttpBlobStore {
    fn name(&self) -> &str {
        "http-blob"
    }

    async fn upload(&self, bytes: Vec<u8>, filename: &str) -> Option<String> {
        let pathname = self.pathname(filename);
        let size = bytes.len() as u64;
        if size > self.large_upload_bytes {
            info!(pathname = %pathname, bytes = size, "Uploading large attachment");
        }

        match self.put(&pathname, bytes).await {
            Ok(url) => {
                debug!(pathname = %pathname, url = %url, "Uploaded attachment");
                Some(url)
            }
            Err(e) => {
                warn!(filename = %filename, error = %e, "Attachment upload failed");
                None
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct PutReply {
    url: String,
}

/// 8 random bytes as 16 lowercase hex characters.
fn random_hex() -> String {
    use rand::Rng;
    let mut rng = rand::rng();
    let mut bytes = [0u8; 8];
    rng.fill(&mut bytes[..]);
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// Keep filenames to a single path segment.
fn sanitize(filename: &str) -> String {
    let name = filename.rsplit(['/', '\\']).next().unwrap_or_default();
    if name.is_empty() {
        "file".into()
    } else {
        urlencoding::encode(name).into_owned()
    }
}
