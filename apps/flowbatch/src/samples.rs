//! # Sample Files
//!
//! Telemetry input for `flowbatch detect`. Two layouts are accepted:
//!
//! - a JSON array of samples
//! - JSON lines, one sample object per line (blank lines ignored)
//!
//! Each object carries `system_id` and an RFC 3339 `timestamp`; the readings
//! and the `profile` object are optional.

use flowbatch_core::{BatchError, Sample};
use std::path::{Path, PathBuf};

/// Maximum sample file size (100 MB).
const MAX_SAMPLE_FILE_SIZE: u64 = 100 * 1024 * 1024;

/// Maximum number of samples in one file.
pub const MAX_SAMPLE_COUNT: usize = 2_000_000;

/// Validate file path (resolves symlinks and "..", must be a regular file).
fn validate_file_path(path: &Path) -> Result<PathBuf, BatchError> {
    let canonical = path.canonicalize().map_err(|e| {
        BatchError::IoError(format!("Invalid file path '{}': {}", path.display(), e))
    })?;

    if !canonical.is_file() {
        return Err(BatchError::IoError(format!(
            "Path '{}' is not a regular file",
            path.display()
        )));
    }

    Ok(canonical)
}

/// Validate file size before reading.
fn validate_file_size(path: &Path, max_size: u64) -> Result<(), BatchError> {
    let metadata = std::fs::metadata(path)
        .map_err(|e| BatchError::IoError(format!("Cannot read file metadata: {}", e)))?;

    if metadata.len() > max_size {
        return Err(BatchError::InvalidInput(format!(
            "File size {} bytes exceeds maximum allowed {} bytes",
            metadata.len(),
            max_size
        )));
    }
    Ok(())
}

/// Read and parse a sample file.
pub fn load_samples(path: &Path) -> Result<Vec<Sample>, BatchError> {
    let validated = validate_file_path(path)?;
    validate_file_size(&validated, MAX_SAMPLE_FILE_SIZE)?;

    let contents = std::fs::read_to_string(&validated)
        .map_err(|e| BatchError::IoError(format!("Read file: {}", e)))?;
    let samples = parse_samples(&contents)?;

    tracing::info!(path = %validated.display(), samples = samples.len(), "samples loaded");
    Ok(samples)
}

/// Parse samples from a JSON array or JSON lines.
pub fn parse_samples(contents: &str) -> Result<Vec<Sample>, BatchError> {
    let samples = if contents.trim_start().starts_with('[') {
        serde_json::from_str::<Vec<Sample>>(contents)
            .map_err(|e| BatchError::DeserializationError(format!("Sample array: {}", e)))?
    } else {
        let mut samples = Vec::new();
        for (index, line) in contents.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let sample: Sample = serde_json::from_str(line).map_err(|e| {
                BatchError::DeserializationError(format!("Line {}: {}", index + 1, e))
            })?;
            samples.push(sample);
            if samples.len() > MAX_SAMPLE_COUNT {
                break;
            }
        }
        samples
    };

    if samples.len() > MAX_SAMPLE_COUNT {
        return Err(BatchError::InvalidInput(format!(
            "Sample count exceeds maximum allowed {}",
            MAX_SAMPLE_COUNT
        )));
    }
    Ok(samples)
}
