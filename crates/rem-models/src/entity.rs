//! Entity models with denormalized adjacency.
//!
//! Every entity owns its outbound edges (`graph_edges`). There is no separate
//! edge table: traversal follows `dst` keys through the per-type tables.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::error::ModelError;

/// Kind of entity, one physical table per variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityType {
    Resource,
    Moment,
    User,
    Message,
    File,
}

impl EntityType {
    /// All entity types in table registration order.
    pub const ALL: [EntityType; 5] = [
        EntityType::Resource,
        EntityType::Moment,
        EntityType::User,
        EntityType::Message,
        EntityType::File,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::Resource => "resource",
            EntityType::Moment => "moment",
            EntityType::User => "user",
            EntityType::Message => "message",
            EntityType::File => "file",
        }
    }

    /// Physical table name holding entities of this type.
    pub fn table_name(&self) -> &'static str {
        match self {
            EntityType::Resource => "resources",
            EntityType::Moment => "moments",
            EntityType::User => "users",
            EntityType::Message => "messages",
            EntityType::File => "files",
        }
    }

    /// Resolve a physical table name back to its entity type.
    pub fn from_table_name(name: &str) -> Result<Self, ModelError> {
        let normalized = name.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|ty| ty.table_name() == normalized)
            .ok_or_else(|| ModelError::UnknownTable(name.to_string()))
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityType {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "resource" => Ok(EntityType::Resource),
            "moment" => Ok(EntityType::Moment),
            "user" => Ok(EntityType::User),
            "message" => Ok(EntityType::Message),
            "file" => Ok(EntityType::File),
            _ => Err(ModelError::UnknownEntityType(s.to_string())),
        }
    }
}

fn default_weight() -> f32 {
    1.0
}

/// Directed edge stored inline on its source entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphEdge {
    /// Business key of the destination entity (any entity table).
    pub dst: String,
    pub rel_type: String,
    /// Edge weight in `[0, 1]`.
    #[serde(default = "default_weight")]
    pub weight: f32,
}

impl GraphEdge {
    pub fn new(dst: impl Into<String>, rel_type: impl Into<String>) -> Self {
        Self {
            dst: dst.into(),
            rel_type: rel_type.into(),
            weight: default_weight(),
        }
    }

    /// Set the edge weight, clamped into `[0, 1]`.
    pub fn with_weight(mut self, weight: f32) -> Self {
        self.weight = if weight.is_nan() {
            0.0
        } else {
            weight.clamp(0.0, 1.0)
        };
        self
    }
}

/// Full entity record as persisted, including its adjacency list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub entity_id: Uuid,
    pub tenant_id: String,
    pub entity_key: String,
    pub entity_type: EntityType,
    #[serde(default)]
    pub user_id: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub content_summary: Option<String>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
    #[serde(default)]
    pub graph_edges: Vec<GraphEdge>,
}

impl Entity {
    pub fn new(
        tenant_id: impl Into<String>,
        entity_key: impl Into<String>,
        entity_type: EntityType,
    ) -> Self {
        Self {
            entity_id: Uuid::new_v4(),
            tenant_id: tenant_id.into(),
            entity_key: entity_key.into(),
            entity_type,
            user_id: None,
            created_at: Utc::now(),
            content_summary: None,
            metadata: Map::new(),
            graph_edges: Vec::new(),
        }
    }

    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.content_summary = Some(summary.into());
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    pub fn with_edge(mut self, edge: GraphEdge) -> Self {
        self.graph_edges.push(edge);
        self
    }

    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }

    /// User scoping: a user sees their own rows and tenant-shared rows
    /// (no owner). Without a user filter every row in the tenant is visible.
    pub fn is_visible_to(&self, user_id: Option<&str>) -> bool {
        match (user_id, self.user_id.as_deref()) {
            (None, _) => true,
            (Some(_), None) => true,
            (Some(wanted), Some(owner)) => wanted == owner,
        }
    }
}

/// Denormalized entity fields returned by LOOKUP, FUZZY and SEARCH.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityRecord {
    pub entity_key: String,
    pub entity_type: EntityType,
    pub entity_id: Uuid,
    pub tenant_id: String,
    pub user_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub content_summary: Option<String>,
    pub metadata: Map<String, Value>,
}

impl From<Entity> for EntityRecord {
    fn from(entity: Entity) -> Self {
        Self {
            entity_key: entity.entity_key,
            entity_type: entity.entity_type,
            entity_id: entity.entity_id,
            tenant_id: entity.tenant_id,
            user_id: entity.user_id,
            created_at: entity.created_at,
            content_summary: entity.content_summary,
            metadata: entity.metadata,
        }
    }
}

impl From<&Entity> for EntityRecord {
    fn from(entity: &Entity) -> Self {
        Self::from(entity.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_type_round_trips_table_names() {
        for ty in EntityType::ALL {
            assert_eq!(EntityType::from_table_name(ty.table_name()).unwrap(), ty);
            assert_eq!(ty.as_str().parse::<EntityType>().unwrap(), ty);
        }
        assert!(EntityType::from_table_name("edges").is_err());
        assert!("widget".parse::<EntityType>().is_err());
    }

    #[test]
    fn test_edge_weight_is_clamped() {
        assert_eq!(GraphEdge::new("b", "rel").with_weight(1.7).weight, 1.0);
        assert_eq!(GraphEdge::new("b", "rel").with_weight(-0.2).weight, 0.0);
        assert_eq!(GraphEdge::new("b", "rel").with_weight(f32::NAN).weight, 0.0);
    }

    #[test]
    fn test_edge_weight_defaults_when_missing() {
        let edge: GraphEdge =
            serde_json::from_str(r#"{"dst":"b","rel_type":"attendee"}"#).unwrap();
        assert_eq!(edge.weight, 1.0);
    }

    #[test]
    fn test_user_visibility() {
        let shared = Entity::new("t1", "shared", EntityType::Resource);
        let owned = Entity::new("t1", "owned", EntityType::Resource).with_user("alice");

        assert!(shared.is_visible_to(Some("bob")));
        assert!(owned.is_visible_to(None));
        assert!(owned.is_visible_to(Some("alice")));
        assert!(!owned.is_visible_to(Some("bob")));
    }

    #[test]
    fn test_record_drops_edges() {
        let entity = Entity::new("t1", "a", EntityType::Moment)
            .with_summary("standup")
            .with_edge(GraphEdge::new("b", "attendee"));
        let record = EntityRecord::from(&entity);
        assert_eq!(record.entity_key, "a");
        assert_eq!(record.content_summary.as_deref(), Some("standup"));
        assert_eq!(record.entity_id, entity.entity_id);
    }
}
