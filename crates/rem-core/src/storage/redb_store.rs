//! Embedded `StoreConnection` on top of rem-storage.
//!
//! Records are stored as JSON. All database work runs on the blocking pool;
//! no lock is held across an await point.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use rem_models::{EmbeddingTarget, Entity, EntityType, Message};
use rem_storage::{EmbeddingColumn, Storage};
use rem_traits::{RemError, Result, StoreConnection};
use tracing::{debug, info, warn};

fn storage_error(err: anyhow::Error) -> RemError {
    RemError::Storage(err.to_string())
}

fn require(name: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(RemError::validation(format!("{} must not be empty", name)));
    }
    if value.contains('\0') {
        return Err(RemError::validation(format!(
            "{} must not contain NUL characters",
            name
        )));
    }
    Ok(())
}

fn decode_entity(bytes: &[u8]) -> Result<Entity> {
    Ok(serde_json::from_slice(bytes)?)
}

fn decode_message(bytes: &[u8]) -> Result<Message> {
    Ok(serde_json::from_slice(bytes)?)
}

fn column<'a>(tenant_id: &'a str, target: &'a EmbeddingTarget) -> EmbeddingColumn<'a> {
    EmbeddingColumn {
        tenant_id,
        table_name: &target.table_name,
        field_name: &target.field_name,
        provider: &target.provider,
    }
}

/// redb-backed store. Opened by `connect`, released by `disconnect`.
pub struct RedbStore {
    path: PathBuf,
    storage: RwLock<Option<Arc<Storage>>>,
}

impl RedbStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            storage: RwLock::new(None),
        }
    }

    /// Create and connect in one step.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let store = Self::new(path);
        store.connect().await?;
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn storage(&self) -> Result<Arc<Storage>> {
        self.storage.read().clone().ok_or_else(|| {
            RemError::Connectivity(format!("Store {} is not connected", self.path.display()))
        })
    }

    /// Run a closure against the storage on the blocking pool.
    async fn with_storage<T, F>(&self, op: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Storage) -> Result<T> + Send + 'static,
    {
        let storage = self.storage()?;
        tokio::task::spawn_blocking(move || op(&storage))
            .await
            .map_err(|e| RemError::Storage(format!("Storage task failed: {}", e)))?
    }
}

#[async_trait]
impl StoreConnection for RedbStore {
    async fn connect(&self) -> Result<()> {
        if self.storage.read().is_some() {
            return Ok(());
        }

        let path = self.path.clone();
        let storage = tokio::task::spawn_blocking(move || Storage::new(&path))
            .await
            .map_err(|e| RemError::Connectivity(format!("Connect task failed: {}", e)))?
            .map_err(|e| {
                RemError::Connectivity(format!(
                    "Failed to open store {}: {}",
                    self.path.display(),
                    e
                ))
            })?;

        let mut guard = self.storage.write();
        if guard.is_none() {
            *guard = Some(Arc::new(storage));
            info!(path = %self.path.display(), "Store connected");
        }
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        if self.storage.write().take().is_some() {
            info!(path = %self.path.display(), "Store disconnected");
        }
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.storage.read().is_some()
    }

    async fn fetch_by_key(
        &self,
        tenant_id: &str,
        entity_key: &str,
        user_id: Option<&str>,
    ) -> Result<Vec<Entity>> {
        let tenant_id = tenant_id.to_string();
        let entity_key = entity_key.to_string();
        let user_id = user_id.map(str::to_string);

        self.with_storage(move |storage| {
            let rows = storage
                .entities
                .lookup_raw(&tenant_id, &entity_key)
                .map_err(storage_error)?;
            let mut entities = Vec::with_capacity(rows.len());
            for (_, bytes) in rows {
                let entity = decode_entity(&bytes)?;
                if entity.is_visible_to(user_id.as_deref()) {
                    entities.push(entity);
                }
            }
            entities.sort_by_key(|e| e.entity_type);
            Ok(entities)
        })
        .await
    }

    async fn fetch_entity(
        &self,
        tenant_id: &str,
        entity_type: EntityType,
        entity_key: &str,
        user_id: Option<&str>,
    ) -> Result<Option<Entity>> {
        let tenant_id = tenant_id.to_string();
        let entity_key = entity_key.to_string();
        let user_id = user_id.map(str::to_string);

        self.with_storage(move |storage| {
            let Some(bytes) = storage
                .entities
                .get_raw(&tenant_id, entity_type.as_str(), &entity_key)
                .map_err(storage_error)?
            else {
                return Ok(None);
            };
            let entity = decode_entity(&bytes)?;
            Ok(entity.is_visible_to(user_id.as_deref()).then_some(entity))
        })
        .await
    }

    async fn fetch_entities(
        &self,
        tenant_id: &str,
        entity_type: Option<EntityType>,
        user_id: Option<&str>,
    ) -> Result<Vec<Entity>> {
        let tenant_id = tenant_id.to_string();
        let user_id = user_id.map(str::to_string);
        let types: Vec<EntityType> = match entity_type {
            Some(ty) => vec![ty],
            None => EntityType::ALL.to_vec(),
        };

        self.with_storage(move |storage| {
            let mut entities = Vec::new();
            for ty in types {
                for (_, bytes) in storage
                    .entities
                    .list_raw(&tenant_id, ty.as_str())
                    .map_err(storage_error)?
                {
                    let entity = decode_entity(&bytes)?;
                    if entity.is_visible_to(user_id.as_deref()) {
                        entities.push(entity);
                    }
                }
            }
            Ok(entities)
        })
        .await
    }

    async fn fetch_embeddings(
        &self,
        tenant_id: &str,
        target: &EmbeddingTarget,
        user_id: Option<&str>,
    ) -> Result<Vec<(Entity, Vec<f32>)>> {
        let entity_type = target.entity_type()?;
        let tenant_id = tenant_id.to_string();
        let target = target.clone();
        let user_id = user_id.map(str::to_string);

        self.with_storage(move |storage| {
            let vectors = storage
                .embeddings
                .list(column(&tenant_id, &target))
                .map_err(storage_error)?;

            let mut rows = Vec::with_capacity(vectors.len());
            for (entity_key, vector) in vectors {
                let Some(bytes) = storage
                    .entities
                    .get_raw(&tenant_id, entity_type.as_str(), &entity_key)
                    .map_err(storage_error)?
                else {
                    debug!(entity_key = %entity_key, "Skipping embedding without entity");
                    continue;
                };
                let entity = decode_entity(&bytes)?;
                if entity.is_visible_to(user_id.as_deref()) {
                    rows.push((entity, vector));
                }
            }
            Ok(rows)
        })
        .await
    }

    async fn fetch_session_messages(
        &self,
        tenant_id: &str,
        session_id: &str,
    ) -> Result<Vec<Message>> {
        let tenant_id = tenant_id.to_string();
        let session_id = session_id.to_string();

        self.with_storage(move |storage| {
            let rows = storage
                .messages
                .list_session_raw(&tenant_id, &session_id)
                .map_err(storage_error)?;
            let mut messages = Vec::with_capacity(rows.len());
            for (_, bytes) in rows {
                let message = decode_message(&bytes)?;
                if !message.is_deleted() {
                    messages.push(message);
                }
            }
            Ok(messages)
        })
        .await
    }

    async fn upsert_entity(&self, entity: Entity) -> Result<Entity> {
        require("tenant_id", &entity.tenant_id)?;
        require("entity_key", &entity.entity_key)?;

        self.with_storage(move |storage| {
            let tenant_id = entity.tenant_id.clone();
            let entity_key = entity.entity_key.clone();
            let entity_type = entity.entity_type;

            let stored = storage
                .entities
                .upsert_raw(&tenant_id, entity_type.as_str(), &entity_key, |existing| {
                    let mut entity = entity;
                    if let Some(bytes) = existing {
                        let previous: Entity = serde_json::from_slice(bytes)?;
                        entity.entity_id = previous.entity_id;
                        entity.created_at = previous.created_at;
                    }
                    Ok(serde_json::to_vec(&entity)?)
                })
                .map_err(storage_error)?;

            debug!(entity_key = %entity_key, entity_type = %entity_type, "Entity upserted");
            decode_entity(&stored)
        })
        .await
    }

    async fn put_embedding(
        &self,
        tenant_id: &str,
        target: &EmbeddingTarget,
        entity_key: &str,
        vector: Vec<f32>,
    ) -> Result<()> {
        require("tenant_id", tenant_id)?;
        require("entity_key", entity_key)?;
        require("field_name", &target.field_name)?;
        require("provider", &target.provider)?;
        target.entity_type()?;
        if vector.is_empty() {
            return Err(RemError::validation("Embedding vector must not be empty"));
        }
        if vector.iter().any(|v| !v.is_finite()) {
            return Err(RemError::validation(
                "Embedding vector contains non-finite values",
            ));
        }

        let tenant_id = tenant_id.to_string();
        let target = target.clone();
        let entity_key = entity_key.to_string();

        self.with_storage(move |storage| {
            let column = column(&tenant_id, &target);
            if let Some(dimension) = storage.embeddings.dimension(column).map_err(storage_error)?
                && dimension != vector.len()
            {
                return Err(RemError::validation(format!(
                    "Embedding dimension mismatch for {}.{} ({}): expected {}, got {}",
                    target.table_name,
                    target.field_name,
                    target.provider,
                    dimension,
                    vector.len()
                )));
            }
            storage
                .embeddings
                .put(column, &entity_key, &vector)
                .map_err(storage_error)
        })
        .await
    }

    async fn insert_message(&self, message: Message) -> Result<()> {
        require("tenant_id", &message.tenant_id)?;
        require("session_id", &message.session_id)?;
        require("message id", &message.id)?;

        self.with_storage(move |storage| {
            let bytes = serde_json::to_vec(&message)?;
            storage
                .messages
                .insert_raw(
                    &message.tenant_id,
                    &message.session_id,
                    &message.id,
                    (
                        message.created_at.timestamp(),
                        message.created_at.timestamp_subsec_nanos(),
                    ),
                    &bytes,
                )
                .map_err(storage_error)
        })
        .await
    }

    async fn soft_delete_message(
        &self,
        tenant_id: &str,
        session_id: &str,
        message_id: &str,
    ) -> Result<bool> {
        let tenant_id = tenant_id.to_string();
        let session_id = session_id.to_string();
        let message_id = message_id.to_string();

        self.with_storage(move |storage| {
            let Some(bytes) = storage
                .messages
                .get_raw(&tenant_id, &message_id)
                .map_err(storage_error)?
            else {
                return Ok(false);
            };
            let mut message = decode_message(&bytes)?;
            if message.session_id != session_id {
                warn!(
                    message_id = %message_id,
                    session_id = %session_id,
                    "Refusing to delete message from another session"
                );
                return Ok(false);
            }
            if message.is_deleted() {
                return Ok(true);
            }

            message.deleted_at = Some(Utc::now());
            let bytes = serde_json::to_vec(&message)?;
            storage
                .messages
                .update_raw(&tenant_id, &message_id, &bytes)
                .map_err(storage_error)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use rem_models::{GraphEdge, MessageRole};
    use tempfile::tempdir;

    async fn setup() -> (RedbStore, tempfile::TempDir) {
        let temp_dir = tempdir().unwrap();
        let store = RedbStore::open(temp_dir.path().join("rem.db")).await.unwrap();
        (store, temp_dir)
    }

    #[tokio::test]
    async fn test_disconnected_store_raises_connectivity() {
        let temp_dir = tempdir().unwrap();
        let store = RedbStore::new(temp_dir.path().join("rem.db"));
        assert!(!store.is_connected());

        let err = store.fetch_by_key("t1", "a", None).await.unwrap_err();
        assert!(matches!(err, RemError::Connectivity(_)));

        store.connect().await.unwrap();
        store.connect().await.unwrap();
        assert!(store.is_connected());

        store.disconnect().await.unwrap();
        let err = store.fetch_session_messages("t1", "s1").await.unwrap_err();
        assert!(matches!(err, RemError::Connectivity(_)));
    }

    #[tokio::test]
    async fn test_upsert_keeps_entity_id() {
        let (store, _temp_dir) = setup().await;

        let first = store
            .upsert_entity(Entity::new("t1", "doc", EntityType::Resource).with_summary("v1"))
            .await
            .unwrap();
        let second = store
            .upsert_entity(
                Entity::new("t1", "doc", EntityType::Resource)
                    .with_summary("v2")
                    .with_edge(GraphEdge::new("other", "cites")),
            )
            .await
            .unwrap();

        assert_eq!(first.entity_id, second.entity_id);
        let stored = store
            .fetch_entity("t1", EntityType::Resource, "doc", None)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.content_summary.as_deref(), Some("v2"));
        assert_eq!(stored.graph_edges.len(), 1);
    }

    #[tokio::test]
    async fn test_upsert_rejects_empty_key() {
        let (store, _temp_dir) = setup().await;
        let err = store
            .upsert_entity(Entity::new("t1", "", EntityType::Resource))
            .await
            .unwrap_err();
        assert!(matches!(err, RemError::Validation(_)));
    }

    #[tokio::test]
    async fn test_fetch_by_key_across_tables_and_users() {
        let (store, _temp_dir) = setup().await;

        store
            .upsert_entity(Entity::new("t1", "sarah", EntityType::User).with_user("alice"))
            .await
            .unwrap();
        store
            .upsert_entity(Entity::new("t1", "sarah", EntityType::Resource))
            .await
            .unwrap();
        store
            .upsert_entity(Entity::new("t2", "sarah", EntityType::Moment))
            .await
            .unwrap();

        let rows = store.fetch_by_key("t1", "sarah", None).await.unwrap();
        let types: Vec<EntityType> = rows.iter().map(|e| e.entity_type).collect();
        assert_eq!(types, vec![EntityType::Resource, EntityType::User]);

        let rows = store.fetch_by_key("t1", "sarah", Some("bob")).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].entity_type, EntityType::Resource);

        assert!(store.fetch_by_key("t1", "nobody", None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_fetch_entities_by_type() {
        let (store, _temp_dir) = setup().await;
        store
            .upsert_entity(Entity::new("t1", "m1", EntityType::Moment))
            .await
            .unwrap();
        store
            .upsert_entity(Entity::new("t1", "r1", EntityType::Resource))
            .await
            .unwrap();

        let moments = store
            .fetch_entities("t1", Some(EntityType::Moment), None)
            .await
            .unwrap();
        assert_eq!(moments.len(), 1);
        assert_eq!(store.fetch_entities("t1", None, None).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_embeddings_join_entities() {
        let (store, _temp_dir) = setup().await;
        let target = EmbeddingTarget::new("moments", "content", "local");

        store
            .upsert_entity(Entity::new("t1", "m1", EntityType::Moment))
            .await
            .unwrap();
        store
            .upsert_entity(Entity::new("t1", "m2", EntityType::Moment).with_user("alice"))
            .await
            .unwrap();
        store.put_embedding("t1", &target, "m1", vec![1.0, 0.0]).await.unwrap();
        store.put_embedding("t1", &target, "m2", vec![0.0, 1.0]).await.unwrap();
        store
            .put_embedding("t1", &target, "orphan", vec![0.5, 0.5])
            .await
            .unwrap();

        let rows = store.fetch_embeddings("t1", &target, None).await.unwrap();
        assert_eq!(rows.len(), 2);
        let rows = store.fetch_embeddings("t1", &target, Some("bob")).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].0.entity_key, "m1");

        let err = store
            .put_embedding("t1", &target, "m1", vec![1.0, 0.0, 0.0])
            .await
            .unwrap_err();
        assert!(matches!(err, RemError::Validation(_)));

        let bad_table = EmbeddingTarget::new("edges", "content", "local");
        let err = store
            .put_embedding("t1", &bad_table, "m1", vec![1.0])
            .await
            .unwrap_err();
        assert!(matches!(err, RemError::Validation(_)));
    }

    #[tokio::test]
    async fn test_session_messages_ordered_and_soft_deleted() {
        let (store, _temp_dir) = setup().await;
        let base = Utc.with_ymd_and_hms(2025, 1, 1, 12, 0, 0).unwrap();

        let late = Message::new("t1", "s1", MessageRole::Assistant, Some("late".into()))
            .with_created_at(base + Duration::seconds(10));
        let early = Message::new("t1", "s1", MessageRole::User, Some("early".into()))
            .with_created_at(base);
        let middle = Message::new("t1", "s1", MessageRole::Tool, Some("middle".into()))
            .with_created_at(base + Duration::seconds(5));
        let middle_id = middle.id.clone();

        store.insert_message(late).await.unwrap();
        store.insert_message(early).await.unwrap();
        store.insert_message(middle).await.unwrap();

        let texts: Vec<String> = store
            .fetch_session_messages("t1", "s1")
            .await
            .unwrap()
            .iter()
            .map(|m| m.text().to_string())
            .collect();
        assert_eq!(texts, vec!["early", "middle", "late"]);

        assert!(!store.soft_delete_message("t1", "s2", &middle_id).await.unwrap());
        assert!(store.soft_delete_message("t1", "s1", &middle_id).await.unwrap());
        assert!(!store.soft_delete_message("t1", "s1", "missing").await.unwrap());

        let texts: Vec<String> = store
            .fetch_session_messages("t1", "s1")
            .await
            .unwrap()
            .iter()
            .map(|m| m.text().to_string())
            .collect();
        assert_eq!(texts, vec!["early", "late"]);
    }

    #[tokio::test]
    async fn test_duplicate_message_is_storage_error() {
        let (store, _temp_dir) = setup().await;
        let message = Message::new("t1", "s1", MessageRole::User, Some("hi".into()));
        store.insert_message(message.clone()).await.unwrap();
        let err = store.insert_message(message).await.unwrap_err();
        assert!(matches!(err, RemError::Storage(_)));
    }
}
