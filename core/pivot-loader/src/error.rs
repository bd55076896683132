//! FILENAME: core/pivot-loader/src/error.rs

use thiserror::Error;

/// Result type for loader operations.
pub type PivotResult<T> = Result<T, PivotError>;

/// Errors surfaced by the loader.
///
/// Pagination entry points return the contract violations synchronously.
/// Everything else reaches callers only through a rejected deferred.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PivotError {
    #[error("Page {selected} out of range: offset {offset} is past {loaded} loaded rows")]
    PageOutOfRange {
        selected: usize,
        offset: usize,
        loaded: usize,
    },

    #[error("Invalid page size: {0}")]
    InvalidPageSize(usize),

    #[error("Loading canceled")]
    LoadingCanceled,

    #[error("Request superseded by a newer load")]
    Superseded,

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Message decode error: {0}")]
    Decode(String),

    #[error("Data service destroyed")]
    Destroyed,
}

impl PivotError {
    pub fn is_cancellation(&self) -> bool {
        matches!(self, PivotError::LoadingCanceled)
    }

    pub fn is_contract_violation(&self) -> bool {
        matches!(
            self,
            PivotError::PageOutOfRange { .. } | PivotError::InvalidPageSize(_)
        )
    }
}
