//! # In-Memory Batch Store
//!
//! Volatile `BatchStore` for tests and one-shot runs. Uses `BTreeMap` for
//! deterministic iteration and an `RwLock` so the handle can be shared.

use super::{BatchStore, validate_ticket};
use crate::window::Window;
use crate::{Batch, BatchError, Fingerprint};
use std::collections::BTreeMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

#[derive(Debug, Default)]
pub struct MemoryStore {
    batches: RwLock<BTreeMap<Fingerprint, Batch>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, BTreeMap<Fingerprint, Batch>>, BatchError> {
        self.batches
            .read()
            .map_err(|_| BatchError::StorageUnavailable("memory store lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, BTreeMap<Fingerprint, Batch>>, BatchError> {
        self.batches
            .write()
            .map_err(|_| BatchError::StorageUnavailable("memory store lock poisoned".to_string()))
    }
}

impl BatchStore for MemoryStore {
    fn find_by_fingerprint(&self, fingerprint: &Fingerprint) -> Result<Option<Batch>, BatchError> {
        Ok(self.read()?.get(fingerprint).cloned())
    }

    fn create(&self, batch: Batch) -> Result<Batch, BatchError> {
        let mut batches = self.write()?;
        if batches.contains_key(&batch.fingerprint) {
            return Err(BatchError::UniqueViolation(batch.fingerprint));
        }
        batches.insert(batch.fingerprint.clone(), batch.clone());
        Ok(batch)
    }

    fn list_by_start_range(
        &self,
        system_id: &str,
        window: &Window,
    ) -> Result<Vec<Batch>, BatchError> {
        let mut found: Vec<Batch> = self
            .read()?
            .values()
            .filter(|b| b.system_id == system_id && window.contains(b.start_time))
            .cloned()
            .collect();
        found.sort_by(|a, b| {
            a.start_time
                .cmp(&b.start_time)
                .then_with(|| a.fingerprint.cmp(&b.fingerprint))
        });
        Ok(found)
    }

    fn assign_ticket(&self, fingerprint: &Fingerprint, ticket: &str) -> Result<Batch, BatchError> {
        validate_ticket(ticket)?;
        let mut batches = self.write()?;
        let batch = batches
            .get_mut(fingerprint)
            .ok_or_else(|| BatchError::BatchNotFound(fingerprint.clone()))?;
        if batch.ticket_number.is_some() {
            return Err(BatchError::TicketAlreadyAssigned(fingerprint.clone()));
        }
        batch.ticket_number = Some(ticket.to_string());
        Ok(batch.clone())
    }

    fn batch_count(&self) -> Result<usize, BatchError> {
        Ok(self.read()?.len())
    }
}
