//! # Application Configuration
//!
//! Optional TOML file passed with `--config`:
//!
//! ```toml
//! database = "plant.redb"
//!
//! [detection]
//! margin_minutes = 360
//! utc_offset_minutes = 60
//! max_mass_jump = 5000.0
//! ```
//!
//! Every key is optional. The `--database` flag overrides `database`.

use flowbatch_core::{BatchError, DetectionConfig};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Database path used when neither the flag nor the config names one.
pub const DEFAULT_DATABASE: &str = "flowbatch.redb";

/// Maximum config file size (1 MB).
const MAX_CONFIG_FILE_SIZE: u64 = 1024 * 1024;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    pub database: Option<PathBuf>,
    pub detection: DetectionConfig,
}

impl AppConfig {
    /// Parse a TOML document.
    pub fn from_toml_str(contents: &str) -> Result<Self, BatchError> {
        toml::from_str(contents)
            .map_err(|e| BatchError::DeserializationError(format!("Invalid config: {}", e)))
    }

    /// Load the config file at `path`.
    pub fn load(path: &Path) -> Result<Self, BatchError> {
        let metadata = std::fs::metadata(path).map_err(|e| {
            BatchError::IoError(format!("Cannot read config '{}': {}", path.display(), e))
        })?;
        if metadata.len() > MAX_CONFIG_FILE_SIZE {
            return Err(BatchError::InvalidInput(format!(
                "Config file size {} bytes exceeds maximum allowed {} bytes",
                metadata.len(),
                MAX_CONFIG_FILE_SIZE
            )));
        }

        let contents = std::fs::read_to_string(path).map_err(|e| {
            BatchError::IoError(format!("Cannot read config '{}': {}", path.display(), e))
        })?;
        let config = Self::from_toml_str(&contents)?;
        tracing::debug!(path = %path.display(), "config loaded");
        Ok(config)
    }

    /// Load `path` if given, otherwise use defaults.
    pub fn load_optional(path: Option<&Path>) -> Result<Self, BatchError> {
        path.map_or_else(|| Ok(Self::default()), Self::load)
    }

    /// Resolve the database path: flag, then config, then default.
    #[must_use]
    pub fn database_path(&self, flag: Option<&Path>) -> PathBuf {
        flag.map(Path::to_path_buf)
            .or_else(|| self.database.clone())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DATABASE))
    }
}
