//! FILENAME: core/pivot-loader/src/events.rs
//! PURPOSE: Public notification channels of the data service.
//! CONTEXT: A channel emitted before anyone listens keeps the latest payload
//! and hands it to the first subscriber. Once subscribed, emission is plain
//! fan-out in subscription order. Handlers run inside the service call that
//! emitted the event and must not call back into the service.

use pivot_tree::NodeRef;
use serde::{Deserialize, Serialize};

use crate::error::PivotError;
use crate::transform::CellFormat;
use crate::transport::MinMax;

/// Handle returned by [`Channel::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Handler<T> = Box<dyn FnMut(&T)>;

/// A single named notification channel.
pub struct Channel<T> {
    handlers: Vec<(SubscriptionId, Handler<T>)>,
    buffered: Option<T>,
    next_id: u64,
}

impl<T> Default for Channel<T> {
    fn default() -> Self {
        Channel {
            handlers: Vec::new(),
            buffered: None,
            next_id: 0,
        }
    }
}

impl<T> Channel<T> {
    pub fn new() -> Self {
        Channel::default()
    }

    /// Adds a handler. A payload buffered while nobody listened is delivered
    /// to it immediately.
    pub fn subscribe(&mut self, handler: impl FnMut(&T) + 'static) -> SubscriptionId {
        self.next_id += 1;
        let id = SubscriptionId(self.next_id);
        let mut handler: Handler<T> = Box::new(handler);
        if let Some(payload) = self.buffered.take() {
            handler(&payload);
        }
        self.handlers.push((id, handler));
        id
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.handlers.len();
        self.handlers.retain(|(hid, _)| *hid != id);
        before != self.handlers.len()
    }

    pub fn emit(&mut self, payload: T) {
        if self.handlers.is_empty() {
            self.buffered = Some(payload);
            return;
        }
        for (_, handler) in self.handlers.iter_mut() {
            handler(&payload);
        }
    }

    pub fn has_subscribers(&self) -> bool {
        !self.handlers.is_empty()
    }

    pub fn has_buffered(&self) -> bool {
        self.buffered.is_some()
    }

    /// Drops all handlers and any buffered payload.
    pub fn clear(&mut self) {
        self.handlers.clear();
        self.buffered = None;
    }
}

// ============================================================================
// EVENT PAYLOADS
// ============================================================================

/// Emitted after each processed chunk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkLoaded {
    pub chunk_index: usize,
    pub chunk_rows: usize,
    pub loaded_rows_count: usize,
}

/// Row totals reported by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TotalRows {
    pub rows_count: usize,
    pub query_rows_count: usize,
    pub limit_reached: bool,
}

/// Emitted when the data part of the stream is complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataFinishInfo {
    pub rows_count: usize,
    pub columns_count: usize,
}

/// Emitted when the whole response is complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TotalCounts {
    pub loaded_rows_count: usize,
    pub total_items_count: usize,
    pub total_records_count: usize,
    pub total_columns_count: usize,
    pub limit_reached: bool,
}

// ============================================================================
// EVENT SET
// ============================================================================

/// Every public channel of the data service.
#[derive(Default)]
pub struct PivotEvents {
    pub data_chunk_loaded: Channel<ChunkLoaded>,
    pub total_columns_count_loaded: Channel<usize>,
    pub total_rows_count_loaded: Channel<TotalRows>,
    pub finish_chunk_loaded: Channel<TotalCounts>,
    pub data_finish_chunk_loaded: Channel<DataFinishInfo>,
    pub grand_chunk_loaded: Channel<NodeRef>,
    pub header_cell_format: Channel<CellFormat>,
    pub data_cell_format: Channel<CellFormat>,
    pub progress_error: Channel<PivotError>,
    pub data_bar_chunk_loaded: Channel<Vec<MinMax>>,
    pub range_min_max_chunk_loaded: Channel<Vec<Option<MinMax>>>,
}

impl PivotEvents {
    pub fn new() -> Self {
        PivotEvents::default()
    }

    pub fn clear(&mut self) {
        self.data_chunk_loaded.clear();
        self.total_columns_count_loaded.clear();
        self.total_rows_count_loaded.clear();
        self.finish_chunk_loaded.clear();
        self.data_finish_chunk_loaded.clear();
        self.grand_chunk_loaded.clear();
        self.header_cell_format.clear();
        self.data_cell_format.clear();
        self.progress_error.clear();
        self.data_bar_chunk_loaded.clear();
        self.range_min_max_chunk_loaded.clear();
    }
}
