//! Attachment storage: making inbound files durably fetchable.
//!
//! Platform attachment URLs can expire or be unreachable from the model
//! backend. An [`AttachmentStore`] re-hosts the bytes and hands back a
//! public URL. Failure is reported as `None`, never as an error: a prompt
//! missing an image is an acceptable outcome.

use async_trait::async_trait;

#[async_trait]
pub trait AttachmentStore: Send + Sync {
    /// Backend name, for logs.
    fn name(&self) -> &str;

    /// Upload `bytes` under `filename`, returning a publicly fetchable URL.
    async fn upload(&self, bytes: Vec<u8>, filename: &str) -> Option<String>;
}
