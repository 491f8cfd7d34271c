//! REM Storage - Low-level storage layer for the REM memory store
//!
//! Uses redb as the embedded database and exposes byte-level APIs. Typed
//! wrappers that (de)serialize entities and messages live in `rem-core`.
//!
//! # Tables
//!
//! - `rem_resources`, `rem_moments`, `rem_users`, `rem_messages`, `rem_files` - Entity tables
//! - `rem_key_index` - Business key index across entity tables
//! - `session_messages`, `session_message_index` - Chronological session logs
//! - `entity_embeddings`, `entity_embedding_dims` - Embedding columns

pub mod embedding;
pub mod entity;
pub mod message;
pub mod paths;
pub mod range_utils;

use anyhow::Result;
use redb::Database;
use std::path::Path;
use std::sync::Arc;

pub use embedding::{EmbeddingColumn, EmbeddingStorage};
pub use entity::{ENTITY_TYPES, EntityStorage};
pub use message::MessageStorage;

/// Central storage manager that initializes all storage subsystems
#[derive(Debug)]
pub struct Storage {
    pub entities: EntityStorage,
    pub messages: MessageStorage,
    pub embeddings: EmbeddingStorage,
}

impl Storage {
    /// Create a new storage instance at the given path.
    ///
    /// This will create the database file (and its parent directory) if it
    /// doesn't exist and initialize all required tables.
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let db = Arc::new(Database::create(path)?);
        tracing::debug!(path = %path.display(), "Opened REM database");

        let entities = EntityStorage::new(db.clone())?;
        let messages = MessageStorage::new(db.clone())?;
        let embeddings = EmbeddingStorage::new(db.clone())?;

        Ok(Self {
            entities,
            messages,
            embeddings,
        })
    }
}
