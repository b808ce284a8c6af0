//! Model backend and attachment hosting implementations for mnemo.
//!
//! The provider implements the `mnemo_core::Provider` trait; the blob
//! store implements `mnemo_core::AttachmentStore`.

pub mod blob;
pub mod openai_compat;

pub use blob::HttpBlobStore;
pub use openai_compat::OpenAiCompatProvider;
