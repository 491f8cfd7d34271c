//! Per-table edge sources backed by a store connection.

use std::sync::Arc;

use async_trait::async_trait;
use rem_models::{Entity, EntityType};
use rem_traits::{EdgeSource, Result, StoreConnection};

/// Edge source reading one entity table through a `StoreConnection`.
#[derive(Clone)]
pub struct TableEdgeSource {
    store: Arc<dyn StoreConnection>,
    entity_type: EntityType,
}

impl TableEdgeSource {
    pub fn new(store: Arc<dyn StoreConnection>, entity_type: EntityType) -> Self {
        Self { store, entity_type }
    }
}

#[async_trait]
impl EdgeSource for TableEdgeSource {
    fn entity_type(&self) -> EntityType {
        self.entity_type
    }

    async fn resolve(
        &self,
        tenant_id: &str,
        entity_key: &str,
        user_id: Option<&str>,
    ) -> Result<Option<Entity>> {
        self.store
            .fetch_entity(tenant_id, self.entity_type, entity_key, user_id)
            .await
    }
}

/// One edge source per entity table, in table registration order.
pub fn table_edge_sources(store: Arc<dyn StoreConnection>) -> Vec<Arc<dyn EdgeSource>> {
    EntityType::ALL
        .into_iter()
        .map(|entity_type| {
            Arc::new(TableEdgeSource::new(store.clone(), entity_type)) as Arc<dyn EdgeSource>
        })
        .collect()
}
