//! FILENAME: core/pivot-loader/src/chunk.rs
//! PURPOSE: Batches streamed row-group nodes into size-bounded chunks.
//! CONTEXT: Chunks are filled in arrival order and handed to the processor
//! once closed (`ready`). Only the tail chunk may still be open. Fragments of
//! a split node are merged into a single list entry before their chunk closes.

use pivot_tree::TreeNode;

/// An ordered batch of sibling row-group nodes pending normalization.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodesChunk {
    pub list: Vec<TreeNode>,

    /// Sum of the sizes of the nodes in `list`.
    pub size: usize,

    /// Closed for appends; may be processed.
    pub ready: bool,

    /// Already normalized and appended to the master tree.
    pub handled: bool,
}

impl NodesChunk {
    pub fn new() -> Self {
        NodesChunk::default()
    }
}

/// Feeds one streamed node into `chunks`.
///
/// The first chunk is bounded by `first_max_size`, every later one by
/// `max_size`. A node that is empty (no children, no value, no cells) marks
/// the end of the stream: the tail chunk is closed and nothing is appended.
/// A fragment continuing the trailing fragment of the open tail chunk is
/// merged into it regardless of the bound.
pub fn fill_data_chunks(
    chunks: &mut Vec<NodesChunk>,
    node: TreeNode,
    first_max_size: usize,
    max_size: usize,
) {
    let max_chunk_size = if chunks.len() < 2 {
        first_max_size
    } else {
        max_size
    };

    if node.is_empty_sentinel() {
        if let Some(last) = chunks.last_mut() {
            last.ready = true;
        }
        return;
    }

    let continues = chunks.last().map_or(false, |last| {
        !last.handled
            && last
                .list
                .last()
                .map_or(false, |trailing| node.is_continuation_of(trailing))
    });

    let start_new = match chunks.last() {
        None => true,
        Some(last) => last.handled || (last.size + node.size > max_chunk_size && !continues),
    };

    if start_new {
        if let Some(last) = chunks.last_mut() {
            last.ready = true;
        }
        chunks.push(NodesChunk::new());
    }

    let Some(last) = chunks.last_mut() else {
        return;
    };
    last.size += node.size;

    if continues && !start_new {
        if let Some(trailing) = last.list.last_mut() {
            trailing.merge_part(node);
        }
        return;
    }

    let oversized = !node.is_part && node.size > max_chunk_size;
    last.list.push(node);

    // A lone node above the bound cannot share its chunk with anything.
    if oversized && last.list.len() == 1 {
        last.ready = true;
    }
}

// ============================================================================
// CHUNK QUEUE
// ============================================================================

/// The chunk list plus its processing cursor.
///
/// Chunks are handled strictly in order, so every chunk before
/// `handled_count` is handled and none after it is. The cursor only moves
/// forward and is reset together with the list.
#[derive(Debug, Default)]
pub struct ChunkQueue {
    chunks: Vec<NodesChunk>,
    handled_count: usize,
}

impl ChunkQueue {
    pub fn new() -> Self {
        ChunkQueue::default()
    }

    /// Accumulates a streamed node; see [`fill_data_chunks`].
    pub fn push(&mut self, node: TreeNode, first_max_size: usize, max_size: usize) {
        fill_data_chunks(&mut self.chunks, node, first_max_size, max_size);
    }

    /// Closes the tail chunk, if any.
    pub fn close_tail(&mut self) {
        if let Some(last) = self.chunks.last_mut() {
            last.ready = true;
        }
    }

    /// Index of the next chunk to process, if it is closed and unhandled.
    pub fn next_ready(&self) -> Option<usize> {
        self.chunks
            .get(self.handled_count)
            .filter(|chunk| chunk.ready && !chunk.handled)
            .map(|_| self.handled_count)
    }

    /// Moves the node list out of the next ready chunk for processing.
    /// The chunk keeps its size; it is marked handled by [`ChunkQueue::mark_handled`].
    pub fn take_ready(&mut self) -> Option<(usize, Vec<TreeNode>)> {
        let index = self.next_ready()?;
        let list = std::mem::take(&mut self.chunks[index].list);
        Some((index, list))
    }

    pub fn mark_handled(&mut self, index: usize) {
        debug_assert_eq!(index, self.handled_count, "chunks must be handled in order");
        if let Some(chunk) = self.chunks.get_mut(index) {
            chunk.handled = true;
            self.handled_count = index + 1;
        }
    }

    pub fn has_unhandled(&self) -> bool {
        self.handled_count < self.chunks.len()
    }

    /// Every chunk created so far has been processed.
    pub fn is_drained(&self) -> bool {
        self.handled_count == self.chunks.len()
    }

    pub fn has_open_tail(&self) -> bool {
        self.chunks.last().map_or(false, |c| !c.ready)
    }

    pub fn handled_count(&self) -> usize {
        self.handled_count
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Total rows accumulated, processed or not.
    pub fn total_size(&self) -> usize {
        self.chunks.iter().map(|c| c.size).sum()
    }

    pub fn chunks(&self) -> &[NodesChunk] {
        &self.chunks
    }

    pub fn reset(&mut self) {
        self.chunks.clear();
        self.handled_count = 0;
    }
}
