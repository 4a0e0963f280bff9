//! # Formats Module
//!
//! Binary encoding of stored batch records.

pub mod persistence;

pub use persistence::{PersistenceHeader, batch_from_bytes, batch_to_bytes};
