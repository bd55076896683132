//! FILENAME: core/pivot-loader/src/processor.rs
//! PURPOSE: Normalizes ready chunks, in order, into the master row tree.
//! CONTEXT: Processing runs on the throttle's leading edge, on `tick` for a
//! coalesced trailing run, and immediately at end of stream. Each handled
//! chunk is followed by an attempt to settle the first-page request.

use std::time::Instant;

use crate::events::ChunkLoaded;
use crate::logging::{log_debug, log_info};
use crate::service::PivotDataService;
use crate::transform::TreeKind;
use crate::transport::Transport;

impl<T: Transport> PivotDataService<T> {
    /// Runs a coalesced processing pass if one has become due.
    /// Hosts call this from their event loop; see [`Self::next_deadline`].
    pub fn tick(&mut self) -> bool {
        if self.destroyed || !self.scheduler.poll() {
            return false;
        }
        self.process_chunks();
        true
    }

    /// When the next coalesced processing pass is due, if one is waiting.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.scheduler.next_deadline()
    }

    pub(crate) fn schedule_processing(&mut self) {
        if self.scheduler.submit() {
            self.process_chunks();
        } else {
            log_debug!("CHUNKS", "processing deferred to {:?}", self.scheduler.next_deadline());
        }
    }

    pub(crate) fn process_chunks(&mut self) {
        if self.state.processing {
            return;
        }

        loop {
            while let Some((index, list)) = self.state.chunks.take_ready() {
                self.process_chunk(index, list);
            }
            if self.state.end_of_stream && self.state.chunks.has_open_tail() {
                self.state.chunks.close_tail();
                continue;
            }
            break;
        }

        let settled = !self.state.processing && self.state.chunks.is_drained();
        if self.state.end_of_stream && settled && !self.state.fully_loaded {
            self.mark_fully_loaded();
        }
    }

    fn process_chunk(&mut self, index: usize, list: Vec<pivot_tree::TreeNode>) {
        self.state.processing = true;
        let chunk_rows = list.iter().map(|node| node.size).sum::<usize>();

        let batch = self.transform.pre_process_tree(list, TreeKind::Rows);
        self.transform
            .modify_tree(&batch, TreeKind::Rows, &mut self.state.divergence);
        self.transform.post_process_tree(&batch, TreeKind::Rows, None);
        self.state.rows.extend(batch);
        self.state.chunks.mark_handled(index);
        self.state.processing = false;

        let loaded_rows_count = self.loaded_rows_count();
        log_debug!(
            "CHUNKS",
            "handled chunk={} rows={} loaded={}",
            index,
            chunk_rows,
            loaded_rows_count
        );

        if self.attached {
            self.events.data_chunk_loaded.emit(ChunkLoaded {
                chunk_index: index,
                chunk_rows,
                loaded_rows_count,
            });
        }
        self.try_settle_first_page();
    }

    fn mark_fully_loaded(&mut self) {
        self.state.fully_loaded = true;
        log_info!(
            "CHUNKS",
            "fully loaded rows={} chunks={}",
            self.loaded_rows_count(),
            self.state.chunks.len()
        );
        self.try_settle_first_page();
        if let Some(full_load) = self.full_load.take() {
            full_load.resolve(self.load_summary());
        }
    }
}
