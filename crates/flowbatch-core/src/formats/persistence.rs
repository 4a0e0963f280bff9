//! # Persistence Format
//!
//! Binary encoding for stored batches.
//!
//! Format: Header (5 bytes) + postcard-serialized `Batch`.
//! - 4 bytes: Magic ("FBAT")
//! - 1 byte: Version
//!
//! The header is validated before the payload is decoded, so a record
//! written by an incompatible version fails cleanly instead of decoding
//! into garbage.

use crate::{Batch, BatchError, primitives};

/// Maximum size of a single encoded batch record.
pub const MAX_RECORD_SIZE: usize = 64 * 1024;

const HEADER_SIZE: usize = 5;

// =============================================================================
// RECORD HEADER
// =============================================================================

/// The header that precedes every stored batch.
#[derive(Debug, Clone, Copy)]
pub struct PersistenceHeader {
    pub magic: [u8; 4],
    pub version: u8,
}

impl PersistenceHeader {
    /// Create a new header with current format version.
    #[must_use]
    pub fn new() -> Self {
        Self {
            magic: *primitives::MAGIC_BYTES,
            version: primitives::FORMAT_VERSION,
        }
    }

    /// Validate the header.
    pub fn validate(&self) -> Result<(), BatchError> {
        if &self.magic != primitives::MAGIC_BYTES {
            return Err(BatchError::DeserializationError(
                "Invalid magic bytes".to_string(),
            ));
        }
        if self.version != primitives::FORMAT_VERSION {
            return Err(BatchError::DeserializationError(format!(
                "Unsupported version: {} (expected {})",
                self.version,
                primitives::FORMAT_VERSION
            )));
        }
        Ok(())
    }

    /// Write header to bytes.
    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut bytes = [0u8; HEADER_SIZE];
        bytes[0..4].copy_from_slice(&self.magic);
        bytes[4] = self.version;
        bytes
    }

    /// Read header from bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, BatchError> {
        if bytes.len() < HEADER_SIZE {
            return Err(BatchError::DeserializationError(
                "Header too short".to_string(),
            ));
        }
        let mut magic = [0u8; 4];
        magic.copy_from_slice(&bytes[0..4]);
        Ok(Self {
            magic,
            version: bytes[4],
        })
    }
}

impl Default for PersistenceHeader {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// ENCODING
// =============================================================================

/// Encode a batch (header + payload).
pub fn batch_to_bytes(batch: &Batch) -> Result<Vec<u8>, BatchError> {
    let payload =
        postcard::to_stdvec(batch).map_err(|e| BatchError::SerializationError(e.to_string()))?;

    let mut result = Vec::with_capacity(HEADER_SIZE + payload.len());
    result.extend_from_slice(&PersistenceHeader::new().to_bytes());
    result.extend_from_slice(&payload);
    Ok(result)
}

/// Decode a batch, validating size and header first.
pub fn batch_from_bytes(bytes: &[u8]) -> Result<Batch, BatchError> {
    if bytes.len() > MAX_RECORD_SIZE {
        return Err(BatchError::DeserializationError(format!(
            "Record size {} bytes exceeds maximum allowed {} bytes",
            bytes.len(),
            MAX_RECORD_SIZE
        )));
    }

    let header = PersistenceHeader::from_bytes(bytes)?;
    header.validate()?;

    postcard::from_bytes(&bytes[HEADER_SIZE..]).map_err(|e| {
        BatchError::DeserializationError(format!("Failed to decode batch record: {}", e))
    })
}

// =============================================================================
// TESTS
// =============================================================================
