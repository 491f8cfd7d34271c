//! REM Core - conversational memory over an embedded entity graph.
//!
//! - `storage`: typed redb store implementing `StoreConnection`
//! - `query`: LOOKUP, FUZZY, SEARCH and TRAVERSE
//! - `tokens`: deterministic per-model token estimation
//! - `compaction` and `summary`: token-budgeted history trimming with graph
//!   context for dropped messages
//! - `session`: chronological message persistence with content offloading
//! - `context`: the explicit lifecycle object wiring it all together

pub mod compaction;
pub mod config;
pub mod context;
pub mod query;
pub mod session;
pub mod storage;
pub mod summary;
pub mod telemetry;
pub mod tokens;

pub use compaction::SessionCompactor;
pub use config::RemConfig;
pub use context::RemContext;
pub use query::{FuzzyQuery, QueryExecutor, SearchQuery, TraverseQuery};
pub use session::SessionStore;
pub use storage::{RedbStore, TableEdgeSource};
pub use summary::{GraphWindowSummarizer, PlaceholderSummarizer, SUMMARY_PREFIX, is_summary_message};
pub use tokens::{TokenEstimator, TokenizerProfile, estimate_tokens};

pub use rem_models as models;
pub use rem_traits::{RemError, Result};
