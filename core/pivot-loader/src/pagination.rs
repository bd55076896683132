//! FILENAME: core/pivot-loader/src/pagination.rs
//! PURPOSE: Caller-facing requests: first page, full load, arbitrary pages.
//! CONTEXT: Requests that depend on future stream events return a
//! `Deferred`. Requests over already-buffered rows answer synchronously and
//! only fail on contract violations. Page rows are always detached clones of
//! the master tree; column and corner trees are shared by reference.

use std::ops::Range;
use std::rc::Rc;

use pivot_tree::{append_child, clone_tree_node, NodeRef};
use serde::Serialize;

use crate::deferred::Deferred;
use crate::error::{PivotError, PivotResult};
use crate::logging::{log_debug, log_enter, log_exit, log_info};
use crate::service::{CachedPage, FirstPageRequest, PivotDataService};
use crate::transform::{CellFormat, TreeKind};
use crate::transport::{MetadataItem, MinMax, QueryDescriptor, Transport};

// ============================================================================
// REQUEST AND RESULT TYPES
// ============================================================================

/// Options of a first-page request.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadOptions {
    /// Falls back to the configured default page size.
    pub page_size: Option<usize>,
    pub is_paginated: bool,
    /// Overrides the metadata of the query.
    pub metadata: Option<Vec<MetadataItem>>,
    /// Keep the settled page for one later request with the same page size.
    pub cache_result: bool,
}

impl Default for LoadOptions {
    fn default() -> Self {
        LoadOptions {
            page_size: None,
            is_paginated: false,
            metadata: None,
            cache_result: false,
        }
    }
}

impl LoadOptions {
    pub fn with_page_size(page_size: usize) -> Self {
        LoadOptions {
            page_size: Some(page_size),
            ..LoadOptions::default()
        }
    }

    pub fn paginated(mut self) -> Self {
        self.is_paginated = true;
        self
    }

    pub fn cached(mut self) -> Self {
        self.cache_result = true;
        self
    }

    pub fn metadata(mut self, metadata: Vec<MetadataItem>) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

/// A page of rows plus the shared header trees.
#[derive(Debug)]
pub struct PivotPage {
    /// Detached clone of the requested row range.
    pub rows: NodeRef,
    pub columns: Option<NodeRef>,
    pub corner: Option<NodeRef>,
    pub row_range: Range<usize>,
    /// Rows in the master tree when the page was built.
    pub loaded_rows_count: usize,
    pub page_size: usize,
    pub is_last_page: bool,
    pub is_paginated: bool,
    pub has_grand_total: bool,
    pub is_single_row_tree: bool,
}

impl PivotPage {
    /// Number of leaf rows in the page, grand total included.
    pub fn row_count(&self) -> usize {
        if self.rows.borrow().children.is_empty() {
            0
        } else {
            pivot_tree::leaf_count(&self.rows)
        }
    }
}

pub type PageResult = Rc<PivotPage>;

/// Totals reported once the whole result has been loaded.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadSummary {
    pub loaded_rows_count: usize,
    pub total_items_count: usize,
    pub total_records_count: usize,
    pub limit_reached: bool,
    pub data_bars: Vec<MinMax>,
    pub range_min_max: Vec<Option<MinMax>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub columns_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_columns_count: Option<usize>,
}

// ============================================================================
// REQUESTS
// ============================================================================

impl<T: Transport> PivotDataService<T> {
    /// Requests the first page of `query`, or of the current query when None.
    ///
    /// Settles once `page_size` rows are loaded or the stream is complete.
    /// A pending request with the same page size is shared; a different page
    /// size or a new query rejects it with [`PivotError::Superseded`].
    pub fn load_data(
        &mut self,
        query: Option<QueryDescriptor>,
        options: LoadOptions,
    ) -> Deferred<PageResult> {
        if self.destroyed {
            return Deferred::rejected(PivotError::Destroyed);
        }
        let page_size = options.page_size.unwrap_or(self.config.default_page_size);
        if page_size == 0 {
            return Deferred::rejected(PivotError::InvalidPageSize(page_size));
        }
        log_enter!("PAGES", "load_data", "page_size={} cache={}", page_size, options.cache_result);

        // A detached service restarts even an unchanged query.
        let new_query = query
            .as_ref()
            .map_or(false, |q| !self.attached || self.state.query.as_ref() != Some(q));

        if let Some(cached) = self.cached_page.take() {
            if !new_query && cached.page_size == page_size {
                log_exit!("PAGES", "load_data", "cached rows={}", cached.page.loaded_rows_count);
                return Deferred::resolved(cached.page);
            }
        }

        if new_query {
            if let Some(query) = query {
                if let Err(error) = self.start_query(query, &options, page_size) {
                    log_exit!("PAGES", "load_data", "issue failed: {}", error);
                    return Deferred::rejected(error);
                }
            }
        } else {
            if let Some(metadata) = options.metadata.clone() {
                self.state.metadata = metadata;
            }
            if page_size != self.settings.page_size {
                self.supersede_first_page();
                self.settings.page_size = page_size;
            }
        }
        self.settings.is_paginated = options.is_paginated;

        if let Some(request) = self.first_page.as_mut() {
            if request.deferred.is_pending() && request.page_size == page_size {
                request.cache_result |= options.cache_result;
                log_exit!("PAGES", "load_data", "joined pending request");
                return request.deferred.clone();
            }
        }

        let deferred = Deferred::new();
        self.first_page = Some(FirstPageRequest {
            deferred: deferred.clone(),
            page_size,
            cache_result: options.cache_result,
        });
        self.try_settle_first_page();

        if deferred.is_pending() && !self.attached && !self.state.fully_loaded {
            // No stream will ever settle it.
            self.first_page = None;
            let error = if self.state.query.is_some() {
                PivotError::LoadingCanceled
            } else {
                PivotError::Transport("no query has been issued".to_string())
            };
            deferred.reject(error);
        }

        log_exit!("PAGES", "load_data", "status={:?}", deferred.status());
        deferred
    }

    /// Requests the totals of the whole result.
    ///
    /// Resolves right away if everything is loaded. Otherwise all calls made
    /// before the end of the stream share one handle.
    pub fn load_all_data(&mut self) -> Deferred<LoadSummary> {
        if self.destroyed {
            return Deferred::rejected(PivotError::Destroyed);
        }
        if self.state.fully_loaded {
            return Deferred::resolved(self.load_summary());
        }
        if let Some(full_load) = &self.full_load {
            if full_load.is_pending() {
                return full_load.clone();
            }
        }
        if !self.attached {
            return Deferred::rejected(PivotError::LoadingCanceled);
        }

        log_debug!("PAGES", "waiting for full load");
        let deferred = Deferred::new();
        self.full_load = Some(deferred.clone());
        deferred
    }

    /// Page `selected` (zero-based) of the rows loaded so far.
    ///
    /// Passing `page_size` also makes it the persistent page size. The
    /// result is a snapshot, so it is always reported as the last page.
    pub fn get_selected_page_data(
        &mut self,
        selected: usize,
        page_size: Option<usize>,
    ) -> PivotResult<PageResult> {
        if self.destroyed {
            return Err(PivotError::Destroyed);
        }
        let size = page_size.unwrap_or(self.settings.page_size);
        if size == 0 {
            return Err(PivotError::InvalidPageSize(size));
        }

        let loaded = self.loaded_rows_count();
        let offset = selected.saturating_mul(size);
        if offset >= loaded {
            return Err(PivotError::PageOutOfRange {
                selected,
                offset,
                loaded,
            });
        }
        if let Some(size) = page_size {
            self.settings.page_size = size;
        }

        let to = offset.saturating_add(size).min(loaded);
        let with_grand = self.state.fully_loaded && to == loaded;
        log_debug!("PAGES", "selected page={} rows={}..{}", selected, offset, to);
        Ok(self.build_page(offset..to, with_grand, true, size))
    }

    /// Rows `from..to` of the loaded rows, clamped to what is loaded.
    /// The grand total is appended only when `last_page` is set.
    pub fn get_indexed_page_data(
        &mut self,
        from: usize,
        to: usize,
        last_page: bool,
    ) -> PivotResult<PageResult> {
        if self.destroyed {
            return Err(PivotError::Destroyed);
        }
        let loaded = self.loaded_rows_count();
        let from = from.min(loaded);
        let to = to.min(loaded).max(from);
        log_debug!("PAGES", "indexed rows={}..{} last={}", from, to, last_page);
        Ok(self.build_page(from..to, last_page, last_page, to - from))
    }

    /// Rejects pending requests with [`PivotError::LoadingCanceled`] and
    /// stops listening to the stream. Buffered rows stay available.
    pub fn cancel_loading(&mut self) {
        log_info!("PAGES", "cancel loading loaded={}", self.loaded_rows_count());
        if let Some(request) = self.first_page.take() {
            request.deferred.reject(PivotError::LoadingCanceled);
        }
        if let Some(full_load) = self.full_load.take() {
            full_load.reject(PivotError::LoadingCanceled);
        }
        self.detach();
    }

    // ========================================================================
    // SETTLEMENT
    // ========================================================================

    /// Settles the first-page request if enough rows are loaded or the
    /// stream is complete.
    pub(crate) fn try_settle_first_page(&mut self) {
        let loaded = self.loaded_rows_count();
        let fully_loaded = self.state.fully_loaded;
        let due = match &self.first_page {
            Some(request) => {
                !request.deferred.is_pending() || loaded >= request.page_size || fully_loaded
            }
            None => false,
        };
        if !due {
            return;
        }
        let Some(request) = self.first_page.take() else {
            return;
        };
        if !request.deferred.is_pending() {
            return;
        }

        let is_last_page = fully_loaded && request.page_size >= loaded;
        let to = request.page_size.min(loaded);
        let page = self.build_page(0..to, true, is_last_page, request.page_size);
        if request.cache_result {
            self.cached_page = Some(CachedPage {
                page_size: request.page_size,
                page: Rc::clone(&page),
            });
        }
        log_info!("PAGES", "first page settled rows={} last={}", to, is_last_page);
        request.deferred.resolve(page);
    }

    fn start_query(
        &mut self,
        query: QueryDescriptor,
        options: &LoadOptions,
        page_size: usize,
    ) -> PivotResult<()> {
        log_info!("LOADER", "new query datasource={}", query.datasource);
        self.supersede_first_page();
        if let Some(full_load) = self.full_load.take() {
            full_load.reject(PivotError::Superseded);
        }
        self.reset_state();

        self.state.metadata = options
            .metadata
            .clone()
            .unwrap_or_else(|| query.metadata.clone());
        self.settings.page_size = page_size;
        self.attach();
        let issued = self.transport.issue(&query);
        self.state.query = Some(query);
        if issued.is_err() {
            self.detach();
        }
        issued
    }

    fn supersede_first_page(&mut self) {
        if let Some(request) = self.first_page.take() {
            if request.deferred.reject(PivotError::Superseded) {
                log_debug!("PAGES", "superseded request page_size={}", request.page_size);
            }
        }
    }

    fn build_page(
        &mut self,
        range: Range<usize>,
        with_grand: bool,
        is_last_page: bool,
        page_size: usize,
    ) -> PageResult {
        let rows = self
            .state
            .rows
            .partial_tree(range.start, range.end, clone_tree_node);

        let grand = if with_grand { self.state.grand.clone() } else { None };
        if let Some(grand) = &grand {
            append_child(&rows, clone_tree_node(grand, false));
        }

        let events = &mut self.events;
        let mut sink = |cell: CellFormat| events.data_cell_format.emit(cell);
        self.transform
            .post_process_tree(&rows, TreeKind::Rows, Some(&mut sink));

        Rc::new(PivotPage {
            rows,
            columns: self.state.columns.as_ref().map(|t| t.root().clone()),
            corner: self.state.corner.as_ref().map(|t| t.root().clone()),
            row_range: range,
            loaded_rows_count: self.loaded_rows_count(),
            page_size,
            is_last_page,
            is_paginated: self.settings.is_paginated,
            has_grand_total: grand.is_some(),
            is_single_row_tree: self.transport.is_single_row_tree(),
        })
    }

    pub(crate) fn load_summary(&self) -> LoadSummary {
        LoadSummary {
            loaded_rows_count: self.loaded_rows_count(),
            total_items_count: self.total_items_count(),
            total_records_count: self.total_records_count(),
            limit_reached: self.state.limit_reached,
            data_bars: self.state.data_bars.clone(),
            range_min_max: self.state.range_min_max.clone(),
            columns_count: self
                .state
                .total_columns_count
                .map(|_| self.limited_columns_count()),
            total_columns_count: self.state.total_columns_count,
        }
    }
}
