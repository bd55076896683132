//! FILENAME: core/pivot-loader/src/config.rs
//! PURPOSE: Tuning knobs for chunking, throttling and reporting.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{PivotError, PivotResult};

pub const DEFAULT_PAGE_SIZE: usize = 100;
pub const DEFAULT_MAX_CHUNK_SIZE: usize = 1000;
pub const DEFAULT_THROTTLE_MS: u64 = 100;

/// Loader configuration. Every field has a default, so a partial JSON
/// document is enough.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LoaderConfig {
    /// Page size used when a request does not name one.
    pub default_page_size: usize,

    /// Row bound of every chunk after the first. The first chunk is bounded
    /// by the page size so the first page can be served early. The effective
    /// bound is never below the page size.
    pub max_chunk_size: usize,

    /// Window in which repeated processing requests coalesce into one run.
    pub throttle_ms: u64,

    /// Caps the column count reported when the data stream finishes.
    pub columns_limit: Option<usize>,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        LoaderConfig {
            default_page_size: DEFAULT_PAGE_SIZE,
            max_chunk_size: DEFAULT_MAX_CHUNK_SIZE,
            throttle_ms: DEFAULT_THROTTLE_MS,
            columns_limit: None,
        }
    }
}

impl LoaderConfig {
    /// Parses and validates a JSON configuration document.
    pub fn from_json(json: &str) -> PivotResult<Self> {
        let config: LoaderConfig =
            serde_json::from_str(json).map_err(|e| PivotError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> PivotResult<()> {
        if self.default_page_size == 0 {
            return Err(PivotError::Config("defaultPageSize must be positive".to_string()));
        }
        if self.max_chunk_size == 0 {
            return Err(PivotError::Config("maxChunkSize must be positive".to_string()));
        }
        Ok(())
    }

    pub fn throttle_window(&self) -> Duration {
        Duration::from_millis(self.throttle_ms)
    }

    /// Chunk bound for chunks after the first, given the active page size.
    pub fn chunk_size_for(&self, page_size: usize) -> usize {
        self.max_chunk_size.max(page_size)
    }
}
