//! Session message persistence and retrieval.
//!
//! Long message bodies are offloaded to `message` entities so session
//! history stays compact; the message keeps a preview plus a `content_ref`
//! that LOOKUP resolves when full text is requested.

use std::sync::Arc;

use rem_models::{Entity, EntityType, Message};
use rem_traits::{RemError, Result, StoreConnection};
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::SessionConfig;
use crate::query::QueryExecutor;

/// Metadata field holding the full text of an offloaded message.
pub const OFFLOADED_CONTENT_FIELD: &str = "content";

/// Entity key used for the offloaded body of a message.
pub fn offload_key(message_id: &str) -> String {
    format!("msg-{}", message_id)
}

/// Reads and writes session history for one tenant.
#[derive(Clone)]
pub struct SessionStore {
    store: Arc<dyn StoreConnection>,
    executor: Arc<QueryExecutor>,
    config: SessionConfig,
}

impl SessionStore {
    pub fn new(
        store: Arc<dyn StoreConnection>,
        executor: Arc<QueryExecutor>,
        config: SessionConfig,
    ) -> Self {
        Self {
            store,
            executor,
            config,
        }
    }

    fn tenant_id(&self) -> &str {
        self.executor.tenant_id()
    }

    /// Load a session's history.
    ///
    /// Non-deleted messages in chronological order. With `user_id`, only that
    /// user's messages and unowned ones are returned. With `decompress`,
    /// offloaded content is replaced by its full text; a reference that
    /// cannot be resolved keeps the compact form.
    ///
    /// Store failures degrade to an empty history.
    pub async fn load_session_messages(
        &self,
        session_id: &str,
        user_id: Option<&str>,
        decompress: bool,
    ) -> Result<Vec<Message>> {
        let messages = match self
            .store
            .fetch_session_messages(self.tenant_id(), session_id)
            .await
        {
            Ok(messages) => messages,
            Err(err) if err.is_store_failure() => {
                warn!(
                    session_id = %session_id,
                    error = %err,
                    "Session store unavailable; continuing with empty history"
                );
                return Ok(Vec::new());
            }
            Err(err) => return Err(err),
        };

        let mut messages: Vec<Message> = messages
            .into_iter()
            .filter(|m| match (user_id, m.user_id.as_deref()) {
                (Some(wanted), Some(owner)) => wanted == owner,
                _ => true,
            })
            .collect();

        if decompress {
            for message in messages.iter_mut() {
                if let Some(content_ref) = message.content_ref.clone()
                    && let Some(full) = self.resolve_content(&content_ref, user_id).await
                {
                    message.content = Some(full);
                }
            }
        }

        debug!(
            session_id = %session_id,
            count = messages.len(),
            decompress,
            "Loaded session messages"
        );
        Ok(messages)
    }

    async fn resolve_content(&self, content_ref: &str, user_id: Option<&str>) -> Option<String> {
        let records = match self.executor.lookup(content_ref, user_id).await {
            Ok(records) => records,
            Err(err) => {
                warn!(content_ref = %content_ref, error = %err, "Failed to resolve message content");
                return None;
            }
        };

        let record = records
            .into_iter()
            .find(|r| r.entity_type == EntityType::Message)?;
        match record.metadata.get(OFFLOADED_CONTENT_FIELD) {
            Some(Value::String(full)) => Some(full.clone()),
            _ => record.content_summary,
        }
    }

    /// Persist a completed turn, offloading oversized content.
    ///
    /// The message row is written before its offload entity, so a rejected
    /// insert (duplicate id) leaves no entity behind. Returns the message as
    /// stored.
    pub async fn save_message(&self, mut message: Message) -> Result<Message> {
        if message.tenant_id != self.tenant_id() {
            return Err(RemError::validation(format!(
                "Message tenant '{}' does not match store tenant '{}'",
                message.tenant_id,
                self.tenant_id()
            )));
        }

        let oversized = message
            .content
            .as_deref()
            .is_some_and(|c| c.chars().count() > self.config.offload_threshold_chars);
        let mut offloaded = None;
        if oversized && let Some(full) = message.content.take() {
            let key = offload_key(&message.id);
            let preview: String = full.chars().take(self.config.offload_preview_chars).collect();

            let mut entity = Entity::new(self.tenant_id(), key.clone(), EntityType::Message)
                .with_summary(preview.clone())
                .with_metadata(OFFLOADED_CONTENT_FIELD, Value::String(full))
                .with_metadata("session_id", Value::String(message.session_id.clone()))
                .with_metadata("role", Value::String(message.role.to_string()))
                .with_created_at(message.created_at);
            entity.user_id = message.user_id.clone();

            message.content = Some(format!("{}...", preview));
            message.content_ref = Some(key);
            offloaded = Some(entity);
        }

        self.store.insert_message(message.clone()).await?;

        if let Some(entity) = offloaded {
            debug!(
                message_id = %message.id,
                content_ref = %entity.entity_key,
                "Offloaded message content"
            );
            self.store.upsert_entity(entity).await?;
        }
        Ok(message)
    }

    /// Normalize a dict-shaped message and persist it.
    pub async fn save_message_value(&self, session_id: &str, value: &Value) -> Result<Message> {
        let message = Message::from_value(self.tenant_id(), session_id, value)?;
        self.save_message(message).await
    }

    /// Soft-delete a message. Returns false when it does not exist.
    pub async fn delete_message(&self, session_id: &str, message_id: &str) -> Result<bool> {
        self.store
            .soft_delete_message(self.tenant_id(), session_id, message_id)
            .await
    }
}
