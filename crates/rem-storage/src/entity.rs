//! Entity storage - byte-level API for typed entity tables.
//!
//! One table per entity type, plus a unified key index spanning all of them
//! so an exact business-key lookup does not need to probe every table.
//!
//! # Tables
//!
//! - `rem_resources`, `rem_moments`, `rem_users`, `rem_messages`, `rem_files`:
//!   `tenant\0entity_key` -> entity_data
//! - `rem_key_index`: `tenant\0entity_key\0entity_type` -> entity_type

use anyhow::Result;
use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};
use std::sync::Arc;

use crate::range_utils::{compose_key, compose_prefix, prefix_range, validate_segment};

type EntityTable = TableDefinition<'static, &'static str, &'static [u8]>;

const RESOURCE_TABLE: EntityTable = TableDefinition::new("rem_resources");
const MOMENT_TABLE: EntityTable = TableDefinition::new("rem_moments");
const USER_TABLE: EntityTable = TableDefinition::new("rem_users");
const MESSAGE_TABLE: EntityTable = TableDefinition::new("rem_messages");
const FILE_TABLE: EntityTable = TableDefinition::new("rem_files");

/// Index: tenant\0entity_key\0entity_type -> entity_type
const KEY_INDEX_TABLE: TableDefinition<&str, &str> = TableDefinition::new("rem_key_index");

/// Entity type names with a backing table, in registration order.
pub const ENTITY_TYPES: [&str; 5] = ["resource", "moment", "user", "message", "file"];

fn table_for(entity_type: &str) -> Result<EntityTable> {
    match entity_type {
        "resource" => Ok(RESOURCE_TABLE),
        "moment" => Ok(MOMENT_TABLE),
        "user" => Ok(USER_TABLE),
        "message" => Ok(MESSAGE_TABLE),
        "file" => Ok(FILE_TABLE),
        other => anyhow::bail!("Unknown entity type: {}", other),
    }
}

/// Low-level entity storage with byte-level API
#[derive(Debug, Clone)]
pub struct EntityStorage {
    db: Arc<Database>,
}

impl EntityStorage {
    pub fn new(db: Arc<Database>) -> Result<Self> {
        let write_txn = db.begin_write()?;
        for entity_type in ENTITY_TYPES {
            write_txn.open_table(table_for(entity_type)?)?;
        }
        write_txn.open_table(KEY_INDEX_TABLE)?;
        write_txn.commit()?;

        Ok(Self { db })
    }

    /// Insert or replace raw entity data and index its key.
    pub fn put_raw(
        &self,
        tenant_id: &str,
        entity_type: &str,
        entity_key: &str,
        data: &[u8],
    ) -> Result<()> {
        self.upsert_raw(tenant_id, entity_type, entity_key, |_| Ok(data.to_vec()))?;
        Ok(())
    }

    /// Read-modify-write an entity inside one write transaction.
    ///
    /// `build` receives the currently stored bytes (if any) and returns the
    /// bytes to store. Returns what was stored.
    pub fn upsert_raw<F>(
        &self,
        tenant_id: &str,
        entity_type: &str,
        entity_key: &str,
        build: F,
    ) -> Result<Vec<u8>>
    where
        F: FnOnce(Option<&[u8]>) -> Result<Vec<u8>>,
    {
        validate_segment("tenant_id", tenant_id)?;
        validate_segment("entity_key", entity_key)?;
        let definition = table_for(entity_type)?;

        let row_key = compose_key(&[tenant_id, entity_key]);
        let index_key = compose_key(&[tenant_id, entity_key, entity_type]);

        let write_txn = self.db.begin_write()?;
        let stored = {
            let mut table = write_txn.open_table(definition)?;
            let existing = table.get(row_key.as_str())?.map(|v| v.value().to_vec());
            let data = build(existing.as_deref())?;
            table.insert(row_key.as_str(), data.as_slice())?;

            let mut key_index = write_txn.open_table(KEY_INDEX_TABLE)?;
            key_index.insert(index_key.as_str(), entity_type)?;
            data
        };
        write_txn.commit()?;
        Ok(stored)
    }

    /// Get raw entity data from one table
    pub fn get_raw(
        &self,
        tenant_id: &str,
        entity_type: &str,
        entity_key: &str,
    ) -> Result<Option<Vec<u8>>> {
        let definition = table_for(entity_type)?;
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(definition)?;

        let row_key = compose_key(&[tenant_id, entity_key]);
        if let Some(value) = table.get(row_key.as_str())? {
            Ok(Some(value.value().to_vec()))
        } else {
            Ok(None)
        }
    }

    /// Exact key lookup across every table via the key index.
    ///
    /// Returns `(entity_type, data)` pairs; one key may exist in several
    /// tables.
    pub fn lookup_raw(&self, tenant_id: &str, entity_key: &str) -> Result<Vec<(String, Vec<u8>)>> {
        let read_txn = self.db.begin_read()?;
        let key_index = read_txn.open_table(KEY_INDEX_TABLE)?;

        let prefix = compose_prefix(&[tenant_id, entity_key]);
        let (start, end) = prefix_range(&prefix);
        let row_key = compose_key(&[tenant_id, entity_key]);
        let mut rows = Vec::new();

        for item in key_index.range(start.as_str()..end.as_str())? {
            let (_, value) = item?;
            let entity_type = value.value().to_string();
            let table = read_txn.open_table(table_for(&entity_type)?)?;
            if let Some(data) = table.get(row_key.as_str())? {
                rows.push((entity_type, data.value().to_vec()));
            }
        }

        Ok(rows)
    }

    /// List all raw entities of one type for a tenant
    pub fn list_raw(&self, tenant_id: &str, entity_type: &str) -> Result<Vec<(String, Vec<u8>)>> {
        let definition = table_for(entity_type)?;
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(definition)?;

        let prefix = compose_prefix(&[tenant_id]);
        let (start, end) = prefix_range(&prefix);
        let mut entities = Vec::new();

        for item in table.range(start.as_str()..end.as_str())? {
            let (key, value) = item?;
            let entity_key = key.value()[prefix.len()..].to_string();
            entities.push((entity_key, value.value().to_vec()));
        }

        Ok(entities)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn setup() -> (EntityStorage, tempfile::TempDir) {
        let temp_dir = tempdir().unwrap();
        let db_path = temp_dir.path().join("test.db");
        let db = Arc::new(Database::create(db_path).unwrap());
        let storage = EntityStorage::new(db).unwrap();
        (storage, temp_dir)
    }

    #[test]
    fn test_put_and_get_raw() {
        let (storage, _temp_dir) = setup();

        storage.put_raw("t1", "resource", "doc-1", b"data").unwrap();
        assert_eq!(
            storage.get_raw("t1", "resource", "doc-1").unwrap().unwrap(),
            b"data"
        );
        assert!(storage.get_raw("t1", "moment", "doc-1").unwrap().is_none());
        assert!(storage.get_raw("t2", "resource", "doc-1").unwrap().is_none());
    }

    #[test]
    fn test_lookup_spans_tables() {
        let (storage, _temp_dir) = setup();

        storage.put_raw("t1", "resource", "shared-key", b"r").unwrap();
        storage.put_raw("t1", "moment", "shared-key", b"m").unwrap();
        storage.put_raw("t1", "moment", "shared-key-2", b"other").unwrap();

        let rows = storage.lookup_raw("t1", "shared-key").unwrap();
        assert_eq!(rows.len(), 2);
        let types: Vec<&str> = rows.iter().map(|(ty, _)| ty.as_str()).collect();
        assert!(types.contains(&"resource"));
        assert!(types.contains(&"moment"));

        assert!(storage.lookup_raw("t1", "missing").unwrap().is_empty());
    }

    #[test]
    fn test_upsert_sees_existing() {
        let (storage, _temp_dir) = setup();

        storage.put_raw("t1", "user", "alice", b"v1").unwrap();
        let stored = storage
            .upsert_raw("t1", "user", "alice", |existing| {
                let mut data = existing.unwrap_or_default().to_vec();
                data.extend_from_slice(b"+v2");
                Ok(data)
            })
            .unwrap();
        assert_eq!(stored, b"v1+v2");
    }

    #[test]
    fn test_list_is_tenant_scoped() {
        let (storage, _temp_dir) = setup();

        storage.put_raw("t1", "file", "a.pdf", b"1").unwrap();
        storage.put_raw("t1", "file", "b.pdf", b"2").unwrap();
        storage.put_raw("t10", "file", "c.pdf", b"3").unwrap();

        let files = storage.list_raw("t1", "file").unwrap();
        let keys: Vec<&str> = files.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["a.pdf", "b.pdf"]);
    }

    #[test]
    fn test_rejects_bad_segments() {
        let (storage, _temp_dir) = setup();

        assert!(storage.put_raw("t1", "resource", "", b"x").is_err());
        assert!(storage.put_raw("t1", "resource", "a\0b", b"x").is_err());
        assert!(storage.put_raw("t1", "edge", "a", b"x").is_err());
    }
}
