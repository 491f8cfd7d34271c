//! REM configuration.
//!
//! Loaded from `$REM_DIR/config.toml` (default `~/.rem/config.toml`). Every
//! section and field is optional; missing values fall back to defaults.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use rem_traits::{RemError, Result};
use serde::{Deserialize, Serialize};

// Default configuration constants
const DEFAULT_TENANT_ID: &str = "default";
const DEFAULT_FUZZY_THRESHOLD: f32 = 0.3;
const DEFAULT_FUZZY_LIMIT: usize = 10;
const DEFAULT_SEARCH_MIN_SIMILARITY: f32 = 0.7;
const DEFAULT_SEARCH_LIMIT: usize = 10;
const DEFAULT_MAX_TRAVERSE_DEPTH: u32 = 10;
const DEFAULT_MAX_TRAVERSE_ROWS: usize = 1_000;
const DEFAULT_MESSAGE_OVERHEAD_TOKENS: usize = 4;
const DEFAULT_TOKEN_THRESHOLD: usize = 100_000;
const DEFAULT_SUMMARY_TRAVERSE_DEPTH: u32 = 2;
const DEFAULT_MAX_SUMMARY_KEYS: usize = 20;
const DEFAULT_OFFLOAD_THRESHOLD_CHARS: usize = 4_000;
const DEFAULT_OFFLOAD_PREVIEW_CHARS: usize = 200;
const DEFAULT_LOG_LEVEL: &str = "info";

/// Root configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemConfig {
    pub storage: StorageConfig,
    pub query: QueryConfig,
    pub compaction: CompactionConfig,
    pub session: SessionConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Database file; `None` resolves to `$REM_DIR/rem.db`.
    pub db_path: Option<PathBuf>,
    pub tenant_id: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: None,
            tenant_id: DEFAULT_TENANT_ID.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryConfig {
    pub fuzzy_threshold: f32,
    pub fuzzy_limit: usize,
    pub search_min_similarity: f32,
    pub search_limit: usize,
    /// Upper bound accepted for `max_depth` on TRAVERSE.
    pub max_traverse_depth: u32,
    /// Rows returned by one traversal before it stops expanding.
    pub max_traverse_rows: usize,
    /// Expected vector dimension per embedding provider.
    pub embedding_dimensions: BTreeMap<String, usize>,
}

impl Default for QueryConfig {
    fn default() -> Self {
        let embedding_dimensions = BTreeMap::from([
            ("openai".to_string(), 1536),
            ("voyage".to_string(), 1024),
            ("local".to_string(), 384),
        ]);
        Self {
            fuzzy_threshold: DEFAULT_FUZZY_THRESHOLD,
            fuzzy_limit: DEFAULT_FUZZY_LIMIT,
            search_min_similarity: DEFAULT_SEARCH_MIN_SIMILARITY,
            search_limit: DEFAULT_SEARCH_LIMIT,
            max_traverse_depth: DEFAULT_MAX_TRAVERSE_DEPTH,
            max_traverse_rows: DEFAULT_MAX_TRAVERSE_ROWS,
            embedding_dimensions,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompactionConfig {
    /// Per-message framing cost added to every content estimate.
    pub message_overhead_tokens: usize,
    pub default_token_threshold: usize,
    /// TRAVERSE depth used when collecting moments for a dropped window.
    pub summary_traverse_depth: u32,
    /// Maximum number of entity keys extracted from one dropped window.
    pub max_summary_keys: usize,
    /// Edge types followed by the summary traversal; empty follows all.
    pub summary_edge_types: Vec<String>,
}

impl Default for CompactionConfig {
    fn default() -> Self {
        Self {
            message_overhead_tokens: DEFAULT_MESSAGE_OVERHEAD_TOKENS,
            default_token_threshold: DEFAULT_TOKEN_THRESHOLD,
            summary_traverse_depth: DEFAULT_SUMMARY_TRAVERSE_DEPTH,
            max_summary_keys: DEFAULT_MAX_SUMMARY_KEYS,
            summary_edge_types: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Content longer than this is offloaded to a message entity.
    pub offload_threshold_chars: usize,
    /// Characters kept inline when content is offloaded.
    pub offload_preview_chars: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            offload_threshold_chars: DEFAULT_OFFLOAD_THRESHOLD_CHARS,
            offload_preview_chars: DEFAULT_OFFLOAD_PREVIEW_CHARS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive used when `RUST_LOG` is unset.
    pub level: String,
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: DEFAULT_LOG_LEVEL.to_string(),
            json: false,
        }
    }
}

impl RemConfig {
    /// Load configuration from the default path
    pub fn load() -> Result<Self> {
        match Self::default_path() {
            Some(path) => Self::load_from_path(&path),
            None => Ok(Self::default()),
        }
    }

    /// Load configuration from a specific path.
    ///
    /// A missing file yields the defaults; an unreadable or invalid one is an
    /// error.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| {
            RemError::validation(format!("Failed to read config {}: {}", path.display(), e))
        })?;
        let config: Self = toml::from_str(&content).map_err(|e| {
            RemError::validation(format!("Failed to parse config {}: {}", path.display(), e))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Get the default configuration file path
    pub fn default_path() -> Option<PathBuf> {
        rem_storage::paths::config_path().ok()
    }

    /// Database path, resolving the default location when unset.
    pub fn resolved_db_path(&self) -> Result<PathBuf> {
        match &self.storage.db_path {
            Some(path) => Ok(path.clone()),
            None => rem_storage::paths::default_db_path()
                .map_err(|e| RemError::validation(format!("No database path: {}", e))),
        }
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.storage.tenant_id.trim().is_empty() {
            return Err(RemError::validation("Tenant ID must not be empty"));
        }

        let query = &self.query;
        if !(0.0..=1.0).contains(&query.fuzzy_threshold) {
            return Err(RemError::validation(format!(
                "Fuzzy threshold must be within [0, 1], got {}",
                query.fuzzy_threshold
            )));
        }
        if !(0.0..=1.0).contains(&query.search_min_similarity) {
            return Err(RemError::validation(format!(
                "Search min similarity must be within [0, 1], got {}",
                query.search_min_similarity
            )));
        }
        if query.fuzzy_limit == 0 || query.search_limit == 0 {
            return Err(RemError::validation("Query limits must be at least 1"));
        }
        if query.max_traverse_depth == 0 {
            return Err(RemError::validation("Max traverse depth must be at least 1"));
        }
        if query.max_traverse_rows == 0 {
            return Err(RemError::validation("Max traverse rows must be at least 1"));
        }
        if let Some((provider, _)) = query.embedding_dimensions.iter().find(|(_, dim)| **dim == 0)
        {
            return Err(RemError::validation(format!(
                "Embedding dimension for provider '{}' must be at least 1",
                provider
            )));
        }

        if self.compaction.default_token_threshold == 0 {
            return Err(RemError::validation("Default token threshold must be at least 1"));
        }

        let session = &self.session;
        if session.offload_threshold_chars == 0 {
            return Err(RemError::validation("Offload threshold must be at least 1"));
        }
        if session.offload_preview_chars > session.offload_threshold_chars {
            return Err(RemError::validation(format!(
                "Offload preview ({}) must not exceed the offload threshold ({})",
                session.offload_preview_chars, session.offload_threshold_chars
            )));
        }

        Ok(())
    }
}
