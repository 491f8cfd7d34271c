//! Explicit runtime context.
//!
//! Owns the store connection and every component built on it. Created once at
//! process start with `RemContext::open` and released with `shutdown`.

use std::sync::Arc;

use rem_models::CompactionResult;
use rem_traits::{Result, StoreConnection, WindowSummarizer};
use tracing::info;

use crate::compaction::SessionCompactor;
use crate::config::RemConfig;
use crate::query::QueryExecutor;
use crate::session::SessionStore;
use crate::storage::RedbStore;
use crate::summary::GraphWindowSummarizer;

/// Core state shared by query, session and compaction callers.
pub struct RemContext {
    config: RemConfig,
    store: Arc<RedbStore>,
    executor: Arc<QueryExecutor>,
    sessions: SessionStore,
    compactor: SessionCompactor,
}

impl RemContext {
    /// Validate the configuration, open the store and wire components.
    pub async fn open(config: RemConfig) -> Result<Self> {
        config.validate()?;
        let db_path = config.resolved_db_path()?;
        let store = Arc::new(RedbStore::open(&db_path).await?);

        let tenant_id = config.storage.tenant_id.clone();
        let executor = Arc::new(QueryExecutor::new(
            store.clone(),
            tenant_id.clone(),
            config.query.clone(),
        ));
        let sessions = SessionStore::new(store.clone(), executor.clone(), config.session.clone());
        let summarizer = Arc::new(GraphWindowSummarizer::new(
            executor.clone(),
            &config.compaction,
        ));
        let compactor = SessionCompactor::new(
            tenant_id,
            summarizer,
            config.compaction.message_overhead_tokens,
        );

        info!(
            db_path = %db_path.display(),
            tenant_id = %config.storage.tenant_id,
            "REM context opened"
        );

        Ok(Self {
            config,
            store,
            executor,
            sessions,
            compactor,
        })
    }

    /// Replace the summary policy used by compaction.
    pub fn with_summarizer(mut self, summarizer: Arc<dyn WindowSummarizer>) -> Self {
        self.compactor = SessionCompactor::new(
            self.config.storage.tenant_id.clone(),
            summarizer,
            self.config.compaction.message_overhead_tokens,
        );
        self
    }

    pub fn config(&self) -> &RemConfig {
        &self.config
    }

    pub fn store(&self) -> Arc<dyn StoreConnection> {
        self.store.clone()
    }

    pub fn executor(&self) -> Arc<QueryExecutor> {
        self.executor.clone()
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    pub fn compactor(&self) -> &SessionCompactor {
        &self.compactor
    }

    /// Load a session and fit it into `token_threshold` (configured default
    /// when `None`).
    pub async fn compact_session(
        &self,
        session_id: &str,
        user_id: Option<&str>,
        token_threshold: Option<usize>,
        model_profile: &str,
    ) -> Result<CompactionResult> {
        let messages = self
            .sessions
            .load_session_messages(session_id, user_id, false)
            .await?;
        let threshold =
            token_threshold.unwrap_or(self.config.compaction.default_token_threshold);
        self.compactor
            .filter_within_token_threshold(&messages, session_id, user_id, threshold, model_profile)
            .await
    }

    /// Release the store. Components held elsewhere fail with `Connectivity`
    /// afterwards.
    pub async fn shutdown(self) -> Result<()> {
        self.store.disconnect().await?;
        info!("REM context shut down");
        Ok(())
    }
}
