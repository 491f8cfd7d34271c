//! Session message storage - byte-level API for chronological message logs.
//!
//! # Tables
//!
//! - `session_messages`: `tenant\0message_id` -> message_data
//! - `session_message_index`: `tenant\0session\0created_at_ns\0seq` -> message_id
//! - `session_message_meta`: counters (`next_seq`)
//!
//! The index key sorts by creation time, then by insertion sequence, so a
//! prefix scan over one session yields messages in chronological order with
//! ties kept in write order.

use anyhow::Result;
use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};
use std::sync::Arc;

use crate::range_utils::{compose_key, compose_prefix, prefix_range, validate_segment};

const MESSAGE_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("session_messages");
/// Index: tenant\0session\0created_at_ns\0seq -> message_id
const MESSAGE_SESSION_INDEX_TABLE: TableDefinition<&str, &str> =
    TableDefinition::new("session_message_index");
const MESSAGE_META_TABLE: TableDefinition<&str, u64> = TableDefinition::new("session_message_meta");

const NEXT_SEQ_KEY: &str = "next_seq";

/// Encode signed seconds plus the nanosecond remainder so that lexical
/// order equals chronological order.
fn sortable_timestamp(secs: i64, subsec_nanos: u32) -> String {
    format!("{:020}{:09}", (secs as u64) ^ (1u64 << 63), subsec_nanos)
}

/// Low-level session message storage with byte-level API
#[derive(Debug, Clone)]
pub struct MessageStorage {
    db: Arc<Database>,
}

impl MessageStorage {
    pub fn new(db: Arc<Database>) -> Result<Self> {
        let write_txn = db.begin_write()?;
        write_txn.open_table(MESSAGE_TABLE)?;
        write_txn.open_table(MESSAGE_SESSION_INDEX_TABLE)?;
        write_txn.open_table(MESSAGE_META_TABLE)?;
        write_txn.commit()?;

        Ok(Self { db })
    }

    /// Store a new message and index it under its session.
    ///
    /// Fails if a message with the same ID already exists for the tenant.
    pub fn insert_raw(
        &self,
        tenant_id: &str,
        session_id: &str,
        message_id: &str,
        created_at: (i64, u32),
        data: &[u8],
    ) -> Result<()> {
        validate_segment("tenant_id", tenant_id)?;
        validate_segment("session_id", session_id)?;
        validate_segment("message_id", message_id)?;

        let row_key = compose_key(&[tenant_id, message_id]);

        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(MESSAGE_TABLE)?;
            if table.get(row_key.as_str())?.is_some() {
                anyhow::bail!("Message {} already exists", message_id);
            }
            table.insert(row_key.as_str(), data)?;

            let mut meta = write_txn.open_table(MESSAGE_META_TABLE)?;
            let seq = meta.get(NEXT_SEQ_KEY)?.map(|v| v.value()).unwrap_or(0);
            meta.insert(NEXT_SEQ_KEY, seq + 1)?;

            let mut session_index = write_txn.open_table(MESSAGE_SESSION_INDEX_TABLE)?;
            let created = sortable_timestamp(created_at.0, created_at.1);
            let seq = format!("{:020}", seq);
            let index_key = compose_key(&[tenant_id, session_id, &created, &seq]);
            session_index.insert(index_key.as_str(), message_id)?;
        }
        write_txn.commit()?;
        Ok(())
    }

    /// Get raw message data by ID
    pub fn get_raw(&self, tenant_id: &str, message_id: &str) -> Result<Option<Vec<u8>>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(MESSAGE_TABLE)?;

        let row_key = compose_key(&[tenant_id, message_id]);
        if let Some(data) = table.get(row_key.as_str())? {
            Ok(Some(data.value().to_vec()))
        } else {
            Ok(None)
        }
    }

    /// Replace the data of an existing message. Returns false if it is missing.
    ///
    /// The session index is left untouched: creation time never changes.
    pub fn update_raw(&self, tenant_id: &str, message_id: &str, data: &[u8]) -> Result<bool> {
        let row_key = compose_key(&[tenant_id, message_id]);

        let write_txn = self.db.begin_write()?;
        let existed = {
            let mut table = write_txn.open_table(MESSAGE_TABLE)?;
            let existed = table.get(row_key.as_str())?.is_some();
            if existed {
                table.insert(row_key.as_str(), data)?;
            }
            existed
        };
        write_txn.commit()?;
        Ok(existed)
    }

    /// List raw messages of a session in chronological order
    pub fn list_session_raw(
        &self,
        tenant_id: &str,
        session_id: &str,
    ) -> Result<Vec<(String, Vec<u8>)>> {
        let read_txn = self.db.begin_read()?;
        let session_index = read_txn.open_table(MESSAGE_SESSION_INDEX_TABLE)?;
        let table = read_txn.open_table(MESSAGE_TABLE)?;

        let prefix = compose_prefix(&[tenant_id, session_id]);
        let (start, end) = prefix_range(&prefix);
        let mut messages = Vec::new();

        for item in session_index.range(start.as_str()..end.as_str())? {
            let (_, value) = item?;
            let message_id = value.value();
            let row_key = compose_key(&[tenant_id, message_id]);
            if let Some(data) = table.get(row_key.as_str())? {
                messages.push((message_id.to_string(), data.value().to_vec()));
            }
        }

        Ok(messages)
    }
}
