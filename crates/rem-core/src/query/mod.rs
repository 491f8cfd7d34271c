//! Query executor for LOOKUP, FUZZY, SEARCH and TRAVERSE.
//!
//! Every query is scoped to the executor's tenant and, optionally, to one
//! user. Absence is an empty result, never an error. Parameter errors are
//! raised before the store is touched.

pub mod fuzzy;
pub mod traverse;
pub mod vector;

use std::collections::HashSet;
use std::sync::Arc;

use rem_models::{
    EmbeddingTarget, EntityRecord, FuzzyMatch, SearchMatch, TraversalRow, TraverseDirection,
};
use rem_traits::{EdgeSource, RemError, Result, StoreConnection};
use tracing::{debug, warn};

use crate::config::QueryConfig;
use crate::storage::table_edge_sources;
use traverse::TraversalBounds;

/// FUZZY parameters. Unset fields use the configured defaults.
#[derive(Debug, Clone, Default)]
pub struct FuzzyQuery {
    pub text: String,
    pub user_id: Option<String>,
    pub threshold: Option<f32>,
    pub limit: Option<usize>,
}

impl FuzzyQuery {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }

    pub fn for_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn threshold(mut self, threshold: f32) -> Self {
        self.threshold = Some(threshold);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// SEARCH parameters. The query vector is produced upstream.
#[derive(Debug, Clone)]
pub struct SearchQuery {
    pub embedding: Vec<f32>,
    pub target: EmbeddingTarget,
    pub user_id: Option<String>,
    pub min_similarity: Option<f32>,
    pub limit: Option<usize>,
}

impl SearchQuery {
    pub fn new(embedding: Vec<f32>, target: EmbeddingTarget) -> Self {
        Self {
            embedding,
            target,
            user_id: None,
            min_similarity: None,
            limit: None,
        }
    }

    pub fn for_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn min_similarity(mut self, min_similarity: f32) -> Self {
        self.min_similarity = Some(min_similarity);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// TRAVERSE parameters.
#[derive(Debug, Clone)]
pub struct TraverseQuery {
    pub start_key: String,
    pub direction: TraverseDirection,
    pub max_depth: u32,
    /// Followed relation types; empty follows every edge.
    pub edge_types: Vec<String>,
    pub user_id: Option<String>,
}

impl TraverseQuery {
    pub fn new(start_key: impl Into<String>, max_depth: u32) -> Self {
        Self {
            start_key: start_key.into(),
            direction: TraverseDirection::Outbound,
            max_depth,
            edge_types: Vec::new(),
            user_id: None,
        }
    }

    pub fn direction(mut self, direction: TraverseDirection) -> Self {
        self.direction = direction;
        self
    }

    pub fn edge_types<I, S>(mut self, edge_types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.edge_types = edge_types.into_iter().map(Into::into).collect();
        self
    }

    pub fn for_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }
}

fn check_unit_interval(name: &str, value: f32) -> Result<()> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(RemError::validation(format!(
            "{} must be within [0, 1], got {}",
            name, value
        )))
    }
}

fn check_limit(limit: usize) -> Result<()> {
    if limit == 0 {
        return Err(RemError::validation("limit must be at least 1"));
    }
    Ok(())
}

/// Executes the four query kinds against a store connection.
#[derive(Clone)]
pub struct QueryExecutor {
    store: Arc<dyn StoreConnection>,
    sources: Vec<Arc<dyn EdgeSource>>,
    tenant_id: String,
    config: QueryConfig,
}

impl QueryExecutor {
    /// Executor over every entity table of `store`.
    pub fn new(
        store: Arc<dyn StoreConnection>,
        tenant_id: impl Into<String>,
        config: QueryConfig,
    ) -> Self {
        Self {
            sources: table_edge_sources(store.clone()),
            store,
            tenant_id: tenant_id.into(),
            config,
        }
    }

    /// Replace the edge sources consulted by TRAVERSE.
    pub fn with_edge_sources(mut self, sources: Vec<Arc<dyn EdgeSource>>) -> Self {
        self.sources = sources;
        self
    }

    pub fn tenant_id(&self) -> &str {
        &self.tenant_id
    }

    pub fn config(&self) -> &QueryConfig {
        &self.config
    }

    /// Exact business-key match across all entity tables.
    pub async fn lookup(&self, entity_key: &str, user_id: Option<&str>) -> Result<Vec<EntityRecord>> {
        if entity_key.is_empty() {
            return Ok(Vec::new());
        }
        let entities = self
            .store
            .fetch_by_key(&self.tenant_id, entity_key, user_id)
            .await?;
        debug!(entity_key = %entity_key, rows = entities.len(), "LOOKUP");
        Ok(entities.into_iter().map(EntityRecord::from).collect())
    }

    /// Trigram similarity over entity keys and summaries, best first.
    pub async fn fuzzy(&self, query: &FuzzyQuery) -> Result<Vec<FuzzyMatch>> {
        let threshold = query.threshold.unwrap_or(self.config.fuzzy_threshold);
        let limit = query.limit.unwrap_or(self.config.fuzzy_limit);
        check_unit_interval("threshold", threshold)?;
        check_limit(limit)?;
        if query.text.trim().is_empty() {
            return Err(RemError::validation("FUZZY query text must not be empty"));
        }

        let entities = self
            .store
            .fetch_entities(&self.tenant_id, None, query.user_id.as_deref())
            .await?;

        let mut matches: Vec<FuzzyMatch> = entities
            .into_iter()
            .filter_map(|entity| {
                let score = fuzzy::match_score(
                    &query.text,
                    &entity.entity_key,
                    entity.content_summary.as_deref(),
                );
                (score >= threshold).then(|| FuzzyMatch {
                    record: EntityRecord::from(entity),
                    similarity_score: score,
                })
            })
            .collect();

        matches.sort_by(|a, b| b.similarity_score.total_cmp(&a.similarity_score));
        matches.truncate(limit);
        debug!(query = %query.text, rows = matches.len(), "FUZZY");
        Ok(matches)
    }

    /// Cosine similarity over one table/field/provider column, nearest first.
    pub async fn search(&self, query: &SearchQuery) -> Result<Vec<SearchMatch>> {
        let min_similarity = query
            .min_similarity
            .unwrap_or(self.config.search_min_similarity);
        let limit = query.limit.unwrap_or(self.config.search_limit);
        check_unit_interval("min_similarity", min_similarity)?;
        check_limit(limit)?;
        self.validate_embedding(&query.embedding, &query.target)?;

        let rows = self
            .store
            .fetch_embeddings(&self.tenant_id, &query.target, query.user_id.as_deref())
            .await?;

        let mut matches: Vec<SearchMatch> = rows
            .into_iter()
            .filter_map(|(entity, stored)| {
                let similarity = vector::cosine_similarity(&query.embedding, &stored);
                (similarity >= min_similarity).then(|| SearchMatch {
                    record: EntityRecord::from(entity),
                    distance: 1.0 - similarity,
                    similarity,
                })
            })
            .collect();

        matches.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        matches.truncate(limit);
        debug!(
            table = %query.target.table_name,
            provider = %query.target.provider,
            rows = matches.len(),
            "SEARCH"
        );
        Ok(matches)
    }

    /// Bounded breadth-first expansion from `start_key`.
    pub async fn traverse(&self, query: &TraverseQuery) -> Result<Vec<TraversalRow>> {
        if query.max_depth > self.config.max_traverse_depth {
            return Err(RemError::validation(format!(
                "max_depth {} exceeds the configured limit {}",
                query.max_depth, self.config.max_traverse_depth
            )));
        }
        if query.direction != TraverseDirection::Outbound {
            warn!(
                direction = %query.direction,
                "Only outbound edges are stored; traversing OUTBOUND"
            );
        }
        if query.start_key.is_empty() {
            return Ok(Vec::new());
        }

        let edge_types = (!query.edge_types.is_empty())
            .then(|| query.edge_types.iter().map(String::as_str).collect::<HashSet<_>>());
        let bounds = TraversalBounds {
            tenant_id: &self.tenant_id,
            user_id: query.user_id.as_deref(),
            max_depth: query.max_depth,
            edge_types,
            max_rows: self.config.max_traverse_rows,
        };

        let rows = traverse::breadth_first(&self.sources, &query.start_key, &bounds).await?;
        debug!(start_key = %query.start_key, rows = rows.len(), "TRAVERSE");
        Ok(rows)
    }

    fn validate_embedding(&self, embedding: &[f32], target: &EmbeddingTarget) -> Result<()> {
        target.entity_type()?;
        if embedding.is_empty() {
            return Err(RemError::validation("Query embedding must not be empty"));
        }
        if embedding.iter().any(|v| !v.is_finite()) {
            return Err(RemError::validation(
                "Query embedding contains non-finite values",
            ));
        }
        let expected = self
            .config
            .embedding_dimensions
            .get(&target.provider)
            .ok_or_else(|| {
                RemError::validation(format!("Unknown embedding provider '{}'", target.provider))
            })?;
        if *expected != embedding.len() {
            return Err(RemError::validation(format!(
                "Embedding dimension mismatch for provider '{}': expected {}, got {}",
                target.provider,
                expected,
                embedding.len()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::RedbStore;
    use rem_models::{Entity, EntityType, GraphEdge};
    use tempfile::tempdir;

    async fn setup() -> (QueryExecutor, Arc<RedbStore>, tempfile::TempDir) {
        let temp_dir = tempdir().unwrap();
        let store = Arc::new(RedbStore::open(temp_dir.path().join("rem.db")).await.unwrap());
        let mut config = QueryConfig::default();
        config.embedding_dimensions.insert("test".to_string(), 2);
        let executor = QueryExecutor::new(store.clone(), "t1", config);
        (executor, store, temp_dir)
    }

    #[tokio::test]
    async fn test_lookup_missing_key_is_empty() {
        let (executor, _store, _temp_dir) = setup().await;
        assert!(executor.lookup("nonexistent-key", None).await.unwrap().is_empty());
        assert!(executor.lookup("", None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_lookup_returns_records() {
        let (executor, store, _temp_dir) = setup().await;
        store
            .upsert_entity(
                Entity::new("t1", "sarah-chen", EntityType::User)
                    .with_summary("Platform lead")
                    .with_edge(GraphEdge::new("standup", "attendee")),
            )
            .await
            .unwrap();

        let rows = executor.lookup("sarah-chen", None).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].entity_type, EntityType::User);
        assert_eq!(rows[0].tenant_id, "t1");
        assert_eq!(rows[0].content_summary.as_deref(), Some("Platform lead"));
    }

    #[tokio::test]
    async fn test_fuzzy_orders_and_limits() {
        let (executor, store, _temp_dir) = setup().await;
        for (key, summary) in [
            ("sarah-chen", "Platform lead"),
            ("sara-chenko", "Designer"),
            ("quarterly-report", "Finance numbers"),
        ] {
            store
                .upsert_entity(Entity::new("t1", key, EntityType::User).with_summary(summary))
                .await
                .unwrap();
        }

        let rows = executor.fuzzy(&FuzzyQuery::new("sarah chen")).await.unwrap();
        assert_eq!(rows[0].record.entity_key, "sarah-chen");
        assert!(rows.iter().all(|r| r.similarity_score >= 0.3));
        assert!(rows.iter().all(|r| r.record.entity_key != "quarterly-report"));
        assert!(rows.windows(2).all(|w| w[0].similarity_score >= w[1].similarity_score));

        let rows = executor
            .fuzzy(&FuzzyQuery::new("sarah chen").limit(1))
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[tokio::test]
    async fn test_fuzzy_validation() {
        let (executor, _store, _temp_dir) = setup().await;
        for query in [
            FuzzyQuery::new("x").threshold(1.5),
            FuzzyQuery::new("x").threshold(f32::NAN),
            FuzzyQuery::new("x").limit(0),
            FuzzyQuery::new("  "),
        ] {
            let err = executor.fuzzy(&query).await.unwrap_err();
            assert!(matches!(err, RemError::Validation(_)));
        }
    }

    #[tokio::test]
    async fn test_search_filters_by_similarity() {
        let (executor, store, _temp_dir) = setup().await;
        let target = EmbeddingTarget::new("moments", "content", "test");
        for (key, vector) in [
            ("close", vec![1.0, 0.1]),
            ("exact", vec![1.0, 0.0]),
            ("orthogonal", vec![0.0, 1.0]),
        ] {
            store
                .upsert_entity(Entity::new("t1", key, EntityType::Moment))
                .await
                .unwrap();
            store.put_embedding("t1", &target, key, vector).await.unwrap();
        }

        let rows = executor
            .search(&SearchQuery::new(vec![1.0, 0.0], target.clone()))
            .await
            .unwrap();
        let keys: Vec<&str> = rows.iter().map(|r| r.record.entity_key.as_str()).collect();
        assert_eq!(keys, vec!["exact", "close"]);
        assert!(rows[0].distance.abs() < 1e-6);

        let rows = executor
            .search(&SearchQuery::new(vec![1.0, 0.0], target).min_similarity(0.0))
            .await
            .unwrap();
        assert_eq!(rows.len(), 3);
    }

    #[tokio::test]
    async fn test_search_rejects_bad_vectors_before_store() {
        let (executor, store, _temp_dir) = setup().await;
        store.disconnect().await.unwrap();
        let target = EmbeddingTarget::new("moments", "content", "test");

        for query in [
            SearchQuery::new(vec![1.0, 0.0, 0.0], target.clone()),
            SearchQuery::new(vec![], target.clone()),
            SearchQuery::new(vec![f32::INFINITY, 0.0], target.clone()),
            SearchQuery::new(vec![1.0, 0.0], EmbeddingTarget::new("moments", "content", "nope")),
            SearchQuery::new(vec![1.0, 0.0], EmbeddingTarget::new("edges", "content", "test")),
            SearchQuery::new(vec![1.0, 0.0], target.clone()).min_similarity(-0.1),
        ] {
            let err = executor.search(&query).await.unwrap_err();
            assert!(matches!(err, RemError::Validation(_)), "{:?}", err);
        }

        let err = executor
            .search(&SearchQuery::new(vec![1.0, 0.0], target))
            .await
            .unwrap_err();
        assert!(matches!(err, RemError::Connectivity(_)));
    }

    #[tokio::test]
    async fn test_traverse_validates_depth_and_connectivity() {
        let (executor, store, _temp_dir) = setup().await;
        let too_deep = executor.config().max_traverse_depth + 1;
        let err = executor
            .traverse(&TraverseQuery::new("a", too_deep))
            .await
            .unwrap_err();
        assert!(matches!(err, RemError::Validation(_)));

        store.disconnect().await.unwrap();
        let err = executor.traverse(&TraverseQuery::new("a", 2)).await.unwrap_err();
        assert!(matches!(err, RemError::Connectivity(_)));
    }

    #[tokio::test]
    async fn test_traverse_inbound_still_outbound() {
        let (executor, store, _temp_dir) = setup().await;
        store
            .upsert_entity(
                Entity::new("t1", "a", EntityType::Resource).with_edge(GraphEdge::new("b", "r")),
            )
            .await
            .unwrap();
        store
            .upsert_entity(Entity::new("t1", "b", EntityType::Moment))
            .await
            .unwrap();

        let rows = executor
            .traverse(&TraverseQuery::new("a", 3).direction(TraverseDirection::Inbound))
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].entity_key, "b");
        assert_eq!(rows[0].path, vec!["a", "b"]);
    }
}
