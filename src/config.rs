//! Log configuration.

use crate::error::{LogError, Result};
use crate::records::ENTRY_WIDTH;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Top-level configuration handed to the store and index constructors.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Per-segment sizing.
    pub segment: SegmentConfig,
}

/// Sizing for one store/index pair.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmentConfig {
    /// Size the index file is pre-allocated to before it is mapped.
    pub max_index_bytes: u64,

    /// Upper bound on the store file (0 = unbounded).
    pub max_store_bytes: u64,

    /// Base offset a segment subtracts to form relative index offsets.
    ///
    /// Only read by the caller pairing a store with an index; neither
    /// [`Store`](crate::Store) nor [`Index`](crate::Index) looks at it.
    pub initial_offset: u64,
}

impl Default for SegmentConfig {
    fn default() -> Self {
        Self {
            max_index_bytes: 1024 * 1024,
            max_store_bytes: 0,
            initial_offset: 0,
        }
    }
}

impl Config {
    /// Parse a JSON document, filling missing fields with defaults.
    pub fn from_json(text: &str) -> Result<Self> {
        let config: Config = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a JSON config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    /// Check the values are usable by an index.
    pub fn validate(&self) -> Result<()> {
        if self.segment.max_index_bytes < ENTRY_WIDTH {
            return Err(LogError::InvalidConfig(format!(
                "max_index_bytes must hold at least one {}-byte entry, got {}",
                ENTRY_WIDTH, self.segment.max_index_bytes
            )));
        }
        if usize::try_from(self.segment.max_index_bytes).is_err() {
            return Err(LogError::InvalidConfig(format!(
                "max_index_bytes {} cannot be mapped on this platform",
                self.segment.max_index_bytes
            )));
        }
        Ok(())
    }

    /// Store capacity, if one is configured.
    pub fn store_capacity(&self) -> Option<u64> {
        match self.segment.max_store_bytes {
            0 => None,
            n => Some(n),
        }
    }
}
