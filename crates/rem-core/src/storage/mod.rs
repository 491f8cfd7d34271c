//! Typed storage layer.
//!
//! Wraps the byte-level API from rem-storage with the REM models and exposes
//! it through `StoreConnection`. Each entity table is also published as an
//! `EdgeSource` for traversal.

mod edge_source;
mod redb_store;

pub use edge_source::{TableEdgeSource, table_edge_sources};
pub use redb_store::RedbStore;
