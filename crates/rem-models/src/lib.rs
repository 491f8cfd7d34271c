//! REM Models - Shared data types for the conversational-memory core.
//!
//! These are plain serde records with no storage or runtime dependencies:
//! - Entities with inline graph edges and their flattened query records
//! - Session messages and the JSON ingestion boundary
//! - Query result rows for FUZZY, SEARCH and TRAVERSE
//! - Compaction results

pub mod compaction;
pub mod entity;
pub mod error;
pub mod message;
pub mod query;

pub use compaction::CompactionResult;
pub use entity::{Entity, EntityRecord, EntityType, GraphEdge};
pub use error::ModelError;
pub use message::{Message, MessageRole};
pub use query::{EmbeddingTarget, FuzzyMatch, SearchMatch, TraversalRow, TraverseDirection};
