//! FILENAME: core/pivot-loader/src/ingest.rs
//! PURPOSE: Routes each stream message category to its handler.
//! CONTEXT: Nothing here fails: malformed or empty row nodes end the stream,
//! and transport failures are recorded and reported, never raised.

use pivot_tree::{clone_tree_node, IndexedTree, TreeNode};

use crate::error::PivotError;
use crate::events::{DataFinishInfo, TotalCounts, TotalRows};
use crate::logging::{log_debug, log_info, log_warn};
use crate::service::PivotDataService;
use crate::transform::{CellFormat, TreeKind};
use crate::transport::{realign_range_min_max, ErrorPayload, MinMax, Transport, TransportMessage};

impl<T: Transport> PivotDataService<T> {
    /// Handles one message of the backend stream. Ignored while detached.
    pub fn handle_message(&mut self, message: TransportMessage) {
        if !self.attached || self.destroyed {
            log_debug!("STREAM", "dropped {} while detached", message.category());
            return;
        }

        match message {
            TransportMessage::Headers(node) => self.on_headers(node),
            TransportMessage::Metadata => self.on_metadata(),
            TransportMessage::Data(batch) => self.on_data(batch.into_vec()),
            TransportMessage::Grand(node) => self.on_grand(node),
            TransportMessage::DataFinish { rows_count } => self.on_data_finish(rows_count),
            TransportMessage::TotalRows(totals) => self.on_total_rows(totals),
            TransportMessage::DataBars { data } => self.on_data_bars(data),
            TransportMessage::RangeMinMax { data } => self.on_range_min_max(data),
            TransportMessage::Finish => self.on_finish(),
            TransportMessage::Error(payload) => self.on_error(payload),
        }
    }

    fn on_headers(&mut self, headers: TreeNode) {
        if self.state.headers_built {
            return;
        }
        let trees = self.transform.build_headers(headers, &self.state.metadata);

        let events = &mut self.events;
        let mut sink = |cell: CellFormat| events.header_cell_format.emit(cell);
        self.transform
            .post_process_tree(&trees.columns, TreeKind::Columns, Some(&mut sink));
        self.transform
            .post_process_tree(&trees.corner, TreeKind::Corner, Some(&mut sink));

        let mut columns = IndexedTree::new(false);
        columns.construct(trees.columns, false, None);
        let mut corner = IndexedTree::new(false);
        corner.construct(trees.corner, false, None);

        let total_columns = columns.tree_child_length();
        self.state.columns = Some(columns);
        self.state.corner = Some(corner);
        self.state.total_columns_count = Some(total_columns);
        self.state.headers_built = true;

        log_info!("STREAM", "headers built columns={}", total_columns);
        self.events.total_columns_count_loaded.emit(total_columns);
    }

    fn on_metadata(&mut self) {
        if let Some(jaql) = self.transport.jaql() {
            log_debug!("STREAM", "metadata items={}", jaql.metadata.len());
            self.state.metadata = jaql.metadata;
        }
    }

    fn on_data(&mut self, nodes: Vec<TreeNode>) {
        let page_size = self.settings.page_size;
        let max_size = self.config.chunk_size_for(page_size);
        for node in nodes {
            self.state.chunks.push(node, page_size, max_size);
        }
        self.schedule_processing();
    }

    fn on_grand(&mut self, node: TreeNode) {
        let batch = self.transform.pre_process_tree(vec![node], TreeKind::Grand);
        self.transform
            .modify_tree(&batch, TreeKind::Grand, &mut self.state.divergence);
        self.transform.post_process_tree(&batch, TreeKind::Grand, None);

        let grand = batch.borrow().children.first().cloned();
        if let Some(grand) = grand {
            grand.borrow_mut().parent = None;
            self.state.grand = Some(grand.clone());
            log_debug!("STREAM", "grand total received");
            self.events.grand_chunk_loaded.emit(clone_tree_node(&grand, false));
        }
    }

    fn on_data_finish(&mut self, rows_count: usize) {
        self.state.end_of_stream = true;
        self.state.chunks.close_tail();
        self.reject_on_stream_failure();

        // Bypasses the throttle: the tail must be processed now.
        self.process_chunks();
        self.try_settle_first_page();

        let loaded = self.loaded_rows_count();
        let rows = if rows_count == 0 {
            loaded
        } else {
            rows_count.min(loaded)
        };
        let info = DataFinishInfo {
            rows_count: rows,
            columns_count: self.limited_columns_count(),
        };
        log_info!(
            "STREAM",
            "data finished rows={} columns={} chunks={}",
            info.rows_count,
            info.columns_count,
            self.state.chunks.len()
        );
        self.events.data_finish_chunk_loaded.emit(info);
    }

    fn on_total_rows(&mut self, totals: TotalRows) {
        self.state.total_items_count = Some(totals.rows_count);
        self.state.total_records_count = Some(totals.query_rows_count);
        self.state.limit_reached = totals.limit_reached;
        self.events.total_rows_count_loaded.emit(totals);
    }

    fn on_data_bars(&mut self, data: Vec<MinMax>) {
        self.state.data_bars = data.clone();
        self.events.data_bar_chunk_loaded.emit(data);
    }

    fn on_range_min_max(&mut self, data: Vec<Option<MinMax>>) {
        let aligned = realign_range_min_max(data, &self.state.metadata);
        self.state.range_min_max = aligned.clone();
        self.events.range_min_max_chunk_loaded.emit(aligned);
    }

    fn on_finish(&mut self) {
        self.reject_on_stream_failure();
        let counts = TotalCounts {
            loaded_rows_count: self.loaded_rows_count(),
            total_items_count: self.total_items_count(),
            total_records_count: self.total_records_count(),
            total_columns_count: self.state.total_columns_count.unwrap_or(0),
            limit_reached: self.state.limit_reached,
        };
        log_info!("STREAM", "finish items={} records={}", counts.total_items_count, counts.total_records_count);
        self.events.finish_chunk_loaded.emit(counts);
    }

    fn on_error(&mut self, payload: ErrorPayload) {
        let error = payload.to_error();
        log_warn!("STREAM", "transport error: {}", error);
        self.state.stream_error = Some(error.clone());

        if !self.is_loading() && !self.state.fully_loaded && !error.is_cancellation() {
            self.events.progress_error.emit(error);
        }
    }

    /// Rejects pending requests when the stream ended in error without data.
    fn reject_on_stream_failure(&mut self) {
        let failed = self.transport.has_error() || self.state.stream_error.is_some();
        if !failed || self.transport.has_data() {
            return;
        }
        let error = self
            .state
            .stream_error
            .clone()
            .unwrap_or_else(|| PivotError::Transport("stream finished without data".to_string()));
        log_warn!("STREAM", "rejecting pending requests: {}", error);

        if let Some(request) = self.first_page.take() {
            request.deferred.reject(error.clone());
        }
        if let Some(full_load) = self.full_load.take() {
            full_load.reject(error);
        }
    }

    pub(crate) fn total_items_count(&self) -> usize {
        self.state
            .total_items_count
            .unwrap_or_else(|| self.transport.total_items_count())
    }

    pub(crate) fn total_records_count(&self) -> usize {
        self.state
            .total_records_count
            .unwrap_or_else(|| self.total_items_count())
    }

    pub(crate) fn limited_columns_count(&self) -> usize {
        let total = self.state.total_columns_count.unwrap_or(0);
        match self.config.columns_limit {
            Some(limit) => total.min(limit),
            None => total,
        }
    }
}
