//! Query parameter and result types for FUZZY, SEARCH and TRAVERSE.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entity::{EntityRecord, EntityType};
use crate::error::ModelError;

/// Requested traversal direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TraverseDirection {
    #[default]
    Outbound,
    Inbound,
    Both,
}

impl fmt::Display for TraverseDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TraverseDirection::Outbound => "OUTBOUND",
            TraverseDirection::Inbound => "INBOUND",
            TraverseDirection::Both => "BOTH",
        };
        f.write_str(s)
    }
}

impl FromStr for TraverseDirection {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "OUTBOUND" | "OUT" => Ok(TraverseDirection::Outbound),
            "INBOUND" | "IN" => Ok(TraverseDirection::Inbound),
            "BOTH" => Ok(TraverseDirection::Both),
            _ => Err(ModelError::UnknownDirection(s.to_string())),
        }
    }
}

/// One reachable node discovered by a traversal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraversalRow {
    /// Hop count from the root (the root itself is depth 0 and never returned).
    pub depth: u32,
    pub entity_key: String,
    pub entity_type: EntityType,
    pub entity_id: Uuid,
    /// Type of the edge that first reached this node.
    pub rel_type: String,
    pub rel_weight: f32,
    /// Entity keys from the root to this node, both ends included.
    pub path: Vec<String>,
}

/// FUZZY result row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FuzzyMatch {
    #[serde(flatten)]
    pub record: EntityRecord,
    pub similarity_score: f32,
}

/// SEARCH result row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchMatch {
    #[serde(flatten)]
    pub record: EntityRecord,
    /// Cosine distance (`1 - similarity`).
    pub distance: f32,
    pub similarity: f32,
}

/// One physical embedding column: table, field and provider.
///
/// Vectors from different providers are never compared with each other.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EmbeddingTarget {
    pub table_name: String,
    pub field_name: String,
    pub provider: String,
}

impl EmbeddingTarget {
    pub fn new(
        table_name: impl Into<String>,
        field_name: impl Into<String>,
        provider: impl Into<String>,
    ) -> Self {
        Self {
            table_name: table_name.into(),
            field_name: field_name.into(),
            provider: provider.into(),
        }
    }

    /// Entity type stored in `table_name`.
    pub fn entity_type(&self) -> Result<EntityType, ModelError> {
        EntityType::from_table_name(&self.table_name)
    }
}
