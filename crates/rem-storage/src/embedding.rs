//! Embedding storage for entity vector columns.
//!
//! Vectors are persisted per `(tenant, table, field, provider)` column so
//! that embeddings from different providers are never mixed. Each column
//! records its dimension on first write and rejects vectors of another size.
//!
//! # Tables
//!
//! - `entity_embeddings`: `tenant\0table\0field\0provider\0entity_key` -> vector
//! - `entity_embedding_dims`: `tenant\0table\0field\0provider` -> dimension

use anyhow::Result;
use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};
use std::sync::Arc;

use crate::range_utils::{compose_key, compose_prefix, prefix_range, validate_segment};

const EMBEDDING_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("entity_embeddings");
const EMBEDDING_DIM_TABLE: TableDefinition<&str, u64> =
    TableDefinition::new("entity_embedding_dims");

/// Identifies one embedding column.
#[derive(Debug, Clone, Copy)]
pub struct EmbeddingColumn<'a> {
    pub tenant_id: &'a str,
    pub table_name: &'a str,
    pub field_name: &'a str,
    pub provider: &'a str,
}

impl EmbeddingColumn<'_> {
    fn column_key(&self) -> String {
        compose_key(&[self.tenant_id, self.table_name, self.field_name, self.provider])
    }

    fn validate(&self) -> Result<()> {
        validate_segment("tenant_id", self.tenant_id)?;
        validate_segment("table_name", self.table_name)?;
        validate_segment("field_name", self.field_name)?;
        validate_segment("provider", self.provider)
    }
}

/// Low-level embedding storage.
#[derive(Debug, Clone)]
pub struct EmbeddingStorage {
    db: Arc<Database>,
}

impl EmbeddingStorage {
    pub fn new(db: Arc<Database>) -> Result<Self> {
        let write_txn = db.begin_write()?;
        write_txn.open_table(EMBEDDING_TABLE)?;
        write_txn.open_table(EMBEDDING_DIM_TABLE)?;
        write_txn.commit()?;

        Ok(Self { db })
    }

    /// Store (or replace) the vector of an entity in a column.
    pub fn put(&self, column: EmbeddingColumn<'_>, entity_key: &str, vector: &[f32]) -> Result<()> {
        column.validate()?;
        validate_segment("entity_key", entity_key)?;
        if vector.is_empty() {
            anyhow::bail!("Vector must not be empty");
        }
        if vector.iter().any(|v| !v.is_finite()) {
            anyhow::bail!("Vector contains non-finite values");
        }

        let column_key = column.column_key();
        let row_key = compose_key(&[&column_key, entity_key]);
        let bytes = bincode::serde::encode_to_vec(vector, bincode::config::standard())?;

        let write_txn = self.db.begin_write()?;
        {
            let mut dims = write_txn.open_table(EMBEDDING_DIM_TABLE)?;
            let existing = dims.get(column_key.as_str())?.map(|v| v.value());
            match existing {
                Some(dimension) if dimension as usize != vector.len() => {
                    anyhow::bail!(
                        "Vector dimension mismatch: expected {}, got {}",
                        dimension,
                        vector.len()
                    );
                }
                Some(_) => {}
                None => {
                    dims.insert(column_key.as_str(), vector.len() as u64)?;
                }
            }

            let mut table = write_txn.open_table(EMBEDDING_TABLE)?;
            table.insert(row_key.as_str(), bytes.as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    /// All vectors of a column, ordered by entity key.
    pub fn list(&self, column: EmbeddingColumn<'_>) -> Result<Vec<(String, Vec<f32>)>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(EMBEDDING_TABLE)?;

        let prefix = compose_prefix(&[&column.column_key()]);
        let (start, end) = prefix_range(&prefix);
        let mut vectors = Vec::new();

        for item in table.range(start.as_str()..end.as_str())? {
            let (key, value) = item?;
            let entity_key = key.value()[prefix.len()..].to_string();
            let (vector, _): (Vec<f32>, usize) =
                bincode::serde::decode_from_slice(value.value(), bincode::config::standard())?;
            vectors.push((entity_key, vector));
        }

        Ok(vectors)
    }

    /// Recorded dimension of a column, if any vector was written.
    pub fn dimension(&self, column: EmbeddingColumn<'_>) -> Result<Option<usize>> {
        let read_txn = self.db.begin_read()?;
        let dims = read_txn.open_table(EMBEDDING_DIM_TABLE)?;
        Ok(dims
            .get(column.column_key().as_str())?
            .map(|v| v.value() as usize))
    }
}
