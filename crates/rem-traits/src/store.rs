//! Store connection abstraction.
//!
//! The query executor, the session store and the compactor never touch a
//! database directly; they go through this interface. Tenant and user
//! scoping are explicit parameters on every call. Implementations are
//! provided by downstream crates (e.g., rem-core).

use async_trait::async_trait;
use rem_models::{EmbeddingTarget, Entity, EntityType, Message};

use crate::error::Result;

#[async_trait]
pub trait StoreConnection: Send + Sync {
    /// Open the underlying store. Idempotent.
    async fn connect(&self) -> Result<()>;

    /// Release the underlying store. Later calls fail with `Connectivity`
    /// until `connect` is called again.
    async fn disconnect(&self) -> Result<()>;

    fn is_connected(&self) -> bool;

    /// Exact business-key match across every entity table.
    async fn fetch_by_key(
        &self,
        tenant_id: &str,
        entity_key: &str,
        user_id: Option<&str>,
    ) -> Result<Vec<Entity>>;

    /// Exact key match in one entity table.
    async fn fetch_entity(
        &self,
        tenant_id: &str,
        entity_type: EntityType,
        entity_key: &str,
        user_id: Option<&str>,
    ) -> Result<Option<Entity>>;

    /// All entities of a tenant, optionally restricted to one table.
    async fn fetch_entities(
        &self,
        tenant_id: &str,
        entity_type: Option<EntityType>,
        user_id: Option<&str>,
    ) -> Result<Vec<Entity>>;

    /// Stored vectors for one table/field/provider, joined with their entity.
    async fn fetch_embeddings(
        &self,
        tenant_id: &str,
        target: &EmbeddingTarget,
        user_id: Option<&str>,
    ) -> Result<Vec<(Entity, Vec<f32>)>>;

    /// Non-deleted messages of a session ordered by `created_at` ascending.
    async fn fetch_session_messages(
        &self,
        tenant_id: &str,
        session_id: &str,
    ) -> Result<Vec<Message>>;

    /// Insert or replace an entity keyed by `(tenant_id, entity_type, entity_key)`.
    /// An existing `entity_id` is preserved. Returns the stored entity.
    async fn upsert_entity(&self, entity: Entity) -> Result<Entity>;

    async fn put_embedding(
        &self,
        tenant_id: &str,
        target: &EmbeddingTarget,
        entity_key: &str,
        vector: Vec<f32>,
    ) -> Result<()>;

    async fn insert_message(&self, message: Message) -> Result<()>;

    /// Mark a message deleted. Returns false when it does not exist.
    async fn soft_delete_message(
        &self,
        tenant_id: &str,
        session_id: &str,
        message_id: &str,
    ) -> Result<bool>;
}
