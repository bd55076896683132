//! FILENAME: core/pivot-loader/src/service.rs
//! PURPOSE: The data service owning all state of the current query.
//! CONTEXT: Its behavior is split by concern:
//! - `ingest`: routes stream messages (StreamIngestor)
//! - `processor`: normalizes ready chunks into the master tree (ChunkProcessor)
//! - `pagination`: caller requests and their settlement (PaginationController)
//!
//! Everything runs on the caller's thread. A query's state is replaced as a
//! whole when a new query is loaded.

use std::rc::Rc;

use pivot_tree::{IndexedTree, NodeRef};

use crate::chunk::ChunkQueue;
use crate::config::LoaderConfig;
use crate::deferred::Deferred;
use crate::error::PivotError;
use crate::events::PivotEvents;
use crate::logging::{log_debug, log_info};
use crate::pagination::{LoadSummary, PageResult};
use crate::scheduler::{Clock, SystemClock, Throttle};
use crate::transform::{IndexDivergence, PassThroughTransform, TreeTransform};
use crate::transport::{MetadataItem, MinMax, QueryDescriptor, Transport};

// ============================================================================
// QUERY STATE
// ============================================================================

/// Everything accumulated for the current query.
#[derive(Default)]
pub(crate) struct LoadState {
    pub query: Option<QueryDescriptor>,
    pub metadata: Vec<MetadataItem>,

    pub chunks: ChunkQueue,

    /// Master row tree: append-only until the next reset.
    pub rows: IndexedTree,
    pub columns: Option<IndexedTree>,
    pub corner: Option<IndexedTree>,
    pub grand: Option<NodeRef>,
    pub divergence: IndexDivergence,

    pub headers_built: bool,
    pub end_of_stream: bool,
    pub fully_loaded: bool,

    /// A chunk is between pre-process and append.
    pub processing: bool,

    pub total_items_count: Option<usize>,
    pub total_records_count: Option<usize>,
    pub limit_reached: bool,
    pub total_columns_count: Option<usize>,
    pub data_bars: Vec<MinMax>,
    pub range_min_max: Vec<Option<MinMax>>,
    pub stream_error: Option<PivotError>,
}

/// Page settings that persist across requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct PageSettings {
    pub page_size: usize,
    pub is_paginated: bool,
}

/// The single outstanding first-page request.
pub(crate) struct FirstPageRequest {
    pub deferred: Deferred<PageResult>,
    pub page_size: usize,
    pub cache_result: bool,
}

/// A settled first page kept for one later identical request.
pub(crate) struct CachedPage {
    pub page_size: usize,
    pub page: PageResult,
}

// ============================================================================
// DATA SERVICE
// ============================================================================

pub struct PivotDataService<T: Transport> {
    pub(crate) config: LoaderConfig,
    pub(crate) transport: T,
    pub(crate) transform: Box<dyn TreeTransform>,
    pub(crate) scheduler: Throttle,
    pub(crate) events: PivotEvents,
    pub(crate) state: LoadState,
    pub(crate) settings: PageSettings,
    pub(crate) first_page: Option<FirstPageRequest>,
    pub(crate) full_load: Option<Deferred<LoadSummary>>,
    pub(crate) cached_page: Option<CachedPage>,
    /// Listening to the transport stream.
    pub(crate) attached: bool,
    pub(crate) destroyed: bool,
}

impl<T: Transport> PivotDataService<T> {
    /// Creates a service with the pass-through transform and the system clock.
    pub fn new(transport: T, config: LoaderConfig) -> Self {
        Self::with_parts(
            transport,
            Box::new(PassThroughTransform::new()),
            config,
            Rc::new(SystemClock),
        )
    }

    pub fn with_parts(
        transport: T,
        transform: Box<dyn TreeTransform>,
        config: LoaderConfig,
        clock: Rc<dyn Clock>,
    ) -> Self {
        let scheduler = Throttle::new(config.throttle_window(), clock);
        let settings = PageSettings {
            page_size: config.default_page_size,
            is_paginated: false,
        };
        PivotDataService {
            config,
            transport,
            transform,
            scheduler,
            events: PivotEvents::new(),
            state: LoadState::default(),
            settings,
            first_page: None,
            full_load: None,
            cached_page: None,
            attached: false,
            destroyed: false,
        }
    }

    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn events_mut(&mut self) -> &mut PivotEvents {
        &mut self.events
    }

    pub fn query(&self) -> Option<&QueryDescriptor> {
        self.state.query.as_ref()
    }

    pub fn page_size(&self) -> usize {
        self.settings.page_size
    }

    /// Rows normalized into the master tree so far.
    pub fn loaded_rows_count(&self) -> usize {
        self.state.rows.tree_child_length()
    }

    /// Rows received, including those still waiting in chunks.
    pub fn buffered_rows_count(&self) -> usize {
        self.state.chunks.total_size()
    }

    pub fn is_fully_loaded(&self) -> bool {
        self.state.fully_loaded
    }

    /// A first-page or full-load request is waiting for the stream.
    pub fn is_loading(&self) -> bool {
        self.first_page
            .as_ref()
            .map_or(false, |r| r.deferred.is_pending())
            || self.full_load.as_ref().map_or(false, Deferred::is_pending)
    }

    pub fn is_attached(&self) -> bool {
        self.attached
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    pub fn total_columns_count(&self) -> Option<usize> {
        self.state.total_columns_count
    }

    pub fn grand_total(&self) -> Option<NodeRef> {
        self.state.grand.clone()
    }

    pub fn chunk_count(&self) -> usize {
        self.state.chunks.len()
    }

    /// Stops listening, drops every request, all data and all subscribers.
    pub fn destroy(&mut self) {
        if self.destroyed {
            return;
        }
        log_info!("LOADER", "destroy");
        self.cancel_loading();
        self.reset_state();
        self.events.clear();
        self.destroyed = true;
    }

    /// Replaces the query state with an empty one.
    pub(crate) fn reset_state(&mut self) {
        log_debug!(
            "LOADER",
            "reset state chunks={} loaded={}",
            self.state.chunks.len(),
            self.loaded_rows_count()
        );
        self.state = LoadState::default();
        self.cached_page = None;
        self.scheduler.cancel_pending();
    }

    pub(crate) fn attach(&mut self) {
        if !self.attached {
            self.transport.subscribe();
            self.attached = true;
        }
    }

    pub(crate) fn detach(&mut self) {
        if self.attached {
            self.transport.unsubscribe();
            self.attached = false;
        }
    }
}
