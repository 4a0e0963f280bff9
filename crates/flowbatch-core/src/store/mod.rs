//! # Batch Storage
//!
//! The `BatchStore` contract and its two backends:
//! - `MemoryStore`: in-process, volatile
//! - `RedbStore`: disk-backed ACID storage using redb
//!
//! Both enforce uniqueness of the fingerprint inside `create`. That check is
//! the only concurrency control in the engine: two runs racing to insert the
//! same batch see one success and one `BatchError::UniqueViolation`.

pub mod memory;
pub mod redb_store;

pub use memory::MemoryStore;
pub use redb_store::RedbStore;

use crate::window::Window;
use crate::{Batch, BatchError, Fingerprint};

/// Persistence for detected batches.
///
/// Methods take `&self`; implementations are internally synchronized so one
/// store handle can serve several systems' runs on separate threads.
pub trait BatchStore {
    /// Look up a batch by fingerprint.
    fn find_by_fingerprint(&self, fingerprint: &Fingerprint) -> Result<Option<Batch>, BatchError>;

    /// Insert a new batch.
    ///
    /// # Errors
    ///
    /// Returns `BatchError::UniqueViolation` if a batch with the same
    /// fingerprint already exists. Nothing is written in that case.
    fn create(&self, batch: Batch) -> Result<Batch, BatchError>;

    /// All batches of `system_id` whose start lies in `window`, ordered by
    /// start time.
    fn list_by_start_range(&self, system_id: &str, window: &Window)
    -> Result<Vec<Batch>, BatchError>;

    /// Set the ticket number of a batch. Allowed exactly once.
    ///
    /// # Errors
    ///
    /// Returns `BatchError::BatchNotFound` for an unknown fingerprint and
    /// `BatchError::TicketAlreadyAssigned` if a ticket is already set.
    fn assign_ticket(&self, fingerprint: &Fingerprint, ticket: &str) -> Result<Batch, BatchError>;

    /// Total number of stored batches.
    fn batch_count(&self) -> Result<usize, BatchError>;
}

/// Reject empty ticket numbers before touching storage.
pub(crate) fn validate_ticket(ticket: &str) -> Result<(), BatchError> {
    if ticket.trim().is_empty() {
        return Err(BatchError::InvalidInput(
            "ticket number must not be empty".to_string(),
        ));
    }
    Ok(())
}
