//! Edge sources over denormalized adjacency.
//!
//! Each entity table stores its own outbound edges, so there is no single
//! edge table. Traversal asks every registered `EdgeSource` whether it holds
//! a key and reads the edges off the resolved record.

use async_trait::async_trait;
use rem_models::{Entity, EntityType};

use crate::error::Result;

/// Typed handle of a node in the traversal frontier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NodeHandle {
    pub entity_type: EntityType,
    pub entity_key: String,
}

impl NodeHandle {
    pub fn new(entity_type: EntityType, entity_key: impl Into<String>) -> Self {
        Self {
            entity_type,
            entity_key: entity_key.into(),
        }
    }
}

impl From<&Entity> for NodeHandle {
    fn from(entity: &Entity) -> Self {
        Self::new(entity.entity_type, entity.entity_key.clone())
    }
}

#[async_trait]
pub trait EdgeSource: Send + Sync {
    /// Entity table served by this source.
    fn entity_type(&self) -> EntityType;

    /// Resolve a key in this table. `None` when the table has no such key.
    async fn resolve(
        &self,
        tenant_id: &str,
        entity_key: &str,
        user_id: Option<&str>,
    ) -> Result<Option<Entity>>;
}
