//! Storage layer for sessions and workflow checkpoints
//!
//! Both stores follow the same degrade-to-memory discipline: a wrapper
//! keeps serving from an in-memory fallback after the primary store's
//! first failure, logging the degrade event so operators see the mode
//! switch instead of silent data loss.

mod checkpoint;
mod session_store;

pub use checkpoint::{CheckpointStore, FallbackCheckpointStore, MemoryCheckpointStore};
pub use session_store::{
    FallbackSessionStore, FileSessionStore, MemorySessionStore, SessionStore,
};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("IO error: {context}: {source}")]
    Io {
        source: std::io::Error,
        context: String,
    },

    #[error("Serialization error: {context}: {source}")]
    Json {
        source: serde_json::Error,
        context: String,
    },
}
