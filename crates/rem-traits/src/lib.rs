//! REM Traits - Shared trait definitions and the error taxonomy.
//!
//! This crate provides the seams the query and compaction layers depend on:
//! - `RemError` / `Result` (connectivity, validation, storage, serialization)
//! - `StoreConnection`, the async entity/message store interface
//! - `EdgeSource`, one per entity table, queried polymorphically by traversal
//! - `WindowSummarizer`, the pluggable policy for dropped-history summaries

pub mod error;
pub mod graph;
pub mod store;
pub mod summary;

pub use error::{RemError, Result};
pub use graph::{EdgeSource, NodeHandle};
pub use store::StoreConnection;
pub use summary::{DroppedWindow, WindowSummarizer};
