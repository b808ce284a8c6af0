//! Memory bank persistence for mnemo.

pub mod file_backend;
pub mod in_memory;
pub mod store;

#[cfg(feature = "postgres")]
pub mod postgres;

pub use file_backend::FileBackend;
pub use in_memory::InMemoryBackend;
pub use store::{DEFAULT_DOCUMENT_KEY, MemoryStore};

#[cfg(feature = "postgres")]
pub use postgres::PostgresBackend;
