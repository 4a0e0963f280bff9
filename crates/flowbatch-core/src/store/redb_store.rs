//! # redb-backed Batch Store
//!
//! A disk-backed `BatchStore` using the redb embedded database:
//! - ACID transactions
//! - Crash safety (copy-on-write B-trees)
//! - MVCC (concurrent readers, single writer)
//!
//! The fingerprint existence check and the insert happen inside one write
//! transaction. redb serializes writers, so concurrent creates of the same
//! batch resolve to exactly one insert and one `UniqueViolation`.

use super::{BatchStore, validate_ticket};
use crate::formats::{batch_from_bytes, batch_to_bytes};
use crate::window::Window;
use crate::{Batch, BatchError, Fingerprint};
use chrono::{DateTime, Utc};
use redb::{Database, ReadableDatabase, ReadableTable, ReadableTableMetadata, TableDefinition};
use std::path::Path;

/// Table for batches: fingerprint -> encoded Batch
const BATCHES: TableDefinition<&str, &[u8]> = TableDefinition::new("batches");

/// Start-time index: (system_id, start in Unix micros, fingerprint) -> ()
const START_INDEX: TableDefinition<(&str, i64, &str), ()> =
    TableDefinition::new("batch_start_index");

fn storage_err(e: impl std::fmt::Display) -> BatchError {
    BatchError::StorageUnavailable(e.to_string())
}

fn micros(ts: DateTime<Utc>) -> i64 {
    ts.timestamp_micros()
}

/// A disk-backed batch store.
pub struct RedbStore {
    db: Database,
}

impl std::fmt::Debug for RedbStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedbStore").finish_non_exhaustive()
    }
}

impl RedbStore {
    /// Open or create a batch database at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, BatchError> {
        let db = Database::create(path.as_ref()).map_err(storage_err)?;

        // Initialize tables if they don't exist
        {
            let write_txn = db.begin_write().map_err(storage_err)?;
            let _ = write_txn.open_table(BATCHES).map_err(storage_err)?;
            let _ = write_txn.open_table(START_INDEX).map_err(storage_err)?;
            write_txn.commit().map_err(storage_err)?;
        }

        Ok(Self { db })
    }
}

impl BatchStore for RedbStore {
    fn find_by_fingerprint(&self, fingerprint: &Fingerprint) -> Result<Option<Batch>, BatchError> {
        let read_txn = self.db.begin_read().map_err(storage_err)?;
        let table = read_txn.open_table(BATCHES).map_err(storage_err)?;
        match table.get(fingerprint.as_str()).map_err(storage_err)? {
            Some(data) => Ok(Some(batch_from_bytes(data.value())?)),
            None => Ok(None),
        }
    }

    fn create(&self, batch: Batch) -> Result<Batch, BatchError> {
        let bytes = batch_to_bytes(&batch)?;
        let fp = batch.fingerprint.as_str();

        let write_txn = self.db.begin_write().map_err(storage_err)?;
        {
            let mut batches = write_txn.open_table(BATCHES).map_err(storage_err)?;
            let exists = batches.get(fp).map_err(storage_err)?.is_some();
            if exists {
                drop(batches);
                write_txn.abort().map_err(storage_err)?;
                return Err(BatchError::UniqueViolation(batch.fingerprint));
            }
            batches
                .insert(fp, bytes.as_slice())
                .map_err(storage_err)?;

            let mut index = write_txn.open_table(START_INDEX).map_err(storage_err)?;
            index
                .insert((batch.system_id.as_str(), micros(batch.start_time), fp), ())
                .map_err(storage_err)?;
        }
        write_txn.commit().map_err(storage_err)?;

        Ok(batch)
    }

    fn list_by_start_range(
        &self,
        system_id: &str,
        window: &Window,
    ) -> Result<Vec<Batch>, BatchError> {
        let read_txn = self.db.begin_read().map_err(storage_err)?;
        let index = read_txn.open_table(START_INDEX).map_err(storage_err)?;
        let batches = read_txn.open_table(BATCHES).map_err(storage_err)?;

        let lower = (system_id, micros(window.start), "");
        let upper = (system_id, micros(window.end).saturating_add(1), "");

        let mut found = Vec::new();
        for entry in index.range(lower..upper).map_err(storage_err)? {
            let (key, _) = entry.map_err(storage_err)?;
            let (_, _, fp) = key.value();
            let data = batches
                .get(fp)
                .map_err(storage_err)?
                .ok_or_else(|| {
                    BatchError::StorageUnavailable(format!("index points at missing batch {}", fp))
                })?;
            // Index keys are whole microseconds; the window is exact.
            let batch = batch_from_bytes(data.value())?;
            if window.contains(batch.start_time) {
                found.push(batch);
            }
        }
        Ok(found)
    }

    fn assign_ticket(&self, fingerprint: &Fingerprint, ticket: &str) -> Result<Batch, BatchError> {
        validate_ticket(ticket)?;

        let write_txn = self.db.begin_write().map_err(storage_err)?;
        let updated = {
            let mut table = write_txn.open_table(BATCHES).map_err(storage_err)?;
            let existing = table
                .get(fingerprint.as_str())
                .map_err(storage_err)?
                .map(|data| data.value().to_vec());
            let Some(existing) = existing else {
                drop(table);
                write_txn.abort().map_err(storage_err)?;
                return Err(BatchError::BatchNotFound(fingerprint.clone()));
            };

            let mut batch = batch_from_bytes(&existing)?;
            if batch.ticket_number.is_some() {
                drop(table);
                write_txn.abort().map_err(storage_err)?;
                return Err(BatchError::TicketAlreadyAssigned(fingerprint.clone()));
            }
            batch.ticket_number = Some(ticket.to_string());

            let bytes = batch_to_bytes(&batch)?;
            table
                .insert(fingerprint.as_str(), bytes.as_slice())
                .map_err(storage_err)?;
            batch
        };
        write_txn.commit().map_err(storage_err)?;

        Ok(updated)
    }

    fn batch_count(&self) -> Result<usize, BatchError> {
        let read_txn = self.db.begin_read().map_err(storage_err)?;
        let table = read_txn.open_table(BATCHES).map_err(storage_err)?;
        Ok(table.len().map_err(storage_err)? as usize)
    }
}

// =============================================================================
// TESTS
// =============================================================================
