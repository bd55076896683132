//! FILENAME: tests/common/mod.rs
//! Test harness and fixtures for pivot-loader integration tests.

#![allow(dead_code)]

use std::cell::RefCell;
use std::fmt::Debug;
use std::rc::Rc;
use std::time::Duration;

use pivot_loader::{
    ChunkLoaded, Deferred, LoaderConfig, ManualClock, MetadataItem, Panel, PassThroughTransform,
    PivotDataService, PivotError, PivotResult, QueryDescriptor, Transport, TransportMessage,
};
use pivot_tree::{CellValue, TreeNode};

// ============================================================================
// MOCK TRANSPORT
// ============================================================================

/// Transport that records calls and reports whatever state the test sets.
#[derive(Debug, Default)]
pub struct MockTransport {
    pub issued: Vec<QueryDescriptor>,
    pub subscribed: bool,
    pub subscribe_calls: usize,
    pub fail_issue: bool,
    pub has_error: bool,
    pub has_data: bool,
    pub jaql: Option<QueryDescriptor>,
    pub single_row_tree: bool,
    pub total_items: usize,
}

impl MockTransport {
    pub fn new() -> Self {
        MockTransport {
            has_data: true,
            ..MockTransport::default()
        }
    }

    pub fn issue_count(&self) -> usize {
        self.issued.len()
    }
}

impl Transport for MockTransport {
    fn subscribe(&mut self) {
        self.subscribed = true;
        self.subscribe_calls += 1;
    }

    fn unsubscribe(&mut self) {
        self.subscribed = false;
    }

    fn issue(&mut self, query: &QueryDescriptor) -> PivotResult<()> {
        if self.fail_issue {
            return Err(PivotError::Transport("connection refused".to_string()));
        }
        self.issued.push(query.clone());
        Ok(())
    }

    fn has_error(&self) -> bool {
        self.has_error
    }

    fn has_data(&self) -> bool {
        self.has_data
    }

    fn jaql(&self) -> Option<QueryDescriptor> {
        self.jaql.clone()
    }

    fn is_single_row_tree(&self) -> bool {
        self.single_row_tree
    }

    fn total_items_count(&self) -> usize {
        self.total_items
    }
}

// ============================================================================
// TEST HARNESS
// ============================================================================

pub struct TestHarness {
    pub service: PivotDataService<MockTransport>,
    pub clock: Rc<ManualClock>,
}

impl TestHarness {
    /// Service without throttling: every data message is processed at once.
    pub fn new() -> Self {
        Self::with_config(LoaderConfig {
            throttle_ms: 0,
            ..LoaderConfig::default()
        })
    }

    /// Service with a 100 ms throttle window driven by a manual clock.
    pub fn throttled() -> Self {
        Self::with_config(LoaderConfig {
            throttle_ms: 100,
            ..LoaderConfig::default()
        })
    }

    pub fn with_config(config: LoaderConfig) -> Self {
        let clock = Rc::new(ManualClock::new());
        let service = PivotDataService::with_parts(
            MockTransport::new(),
            Box::new(PassThroughTransform::new()),
            config,
            clock.clone(),
        );
        TestHarness { service, clock }
    }

    pub fn send(&mut self, message: TransportMessage) {
        self.service.handle_message(message);
    }

    /// Sends each group as its own DATA message.
    pub fn send_rows(&mut self, groups: Vec<TreeNode>) {
        for group in groups {
            self.send(TransportMessage::Data(pivot_loader::NodeBatch::One(group)));
        }
    }

    pub fn finish_data(&mut self, rows_count: usize) {
        self.send(TransportMessage::DataFinish { rows_count });
    }

    pub fn advance(&mut self, ms: u64) -> bool {
        self.clock.advance(Duration::from_millis(ms));
        self.service.tick()
    }

    /// Records every `dataChunkLoaded` payload.
    pub fn record_chunks(&mut self) -> Rc<RefCell<Vec<ChunkLoaded>>> {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        self.service
            .events_mut()
            .data_chunk_loaded
            .subscribe(move |chunk| sink.borrow_mut().push(chunk.clone()));
        seen
    }
}

// ============================================================================
// FIXTURES
// ============================================================================

pub fn sales_query() -> QueryDescriptor {
    QueryDescriptor::new(
        "Sales",
        vec![
            MetadataItem::new(0, Panel::Rows, "Region"),
            MetadataItem::new(1, Panel::Rows, "Store"),
            MetadataItem::new(2, Panel::Measures, "Revenue"),
        ],
    )
}

pub fn other_query() -> QueryDescriptor {
    QueryDescriptor::new(
        "Inventory",
        vec![MetadataItem::new(0, Panel::Rows, "Warehouse")],
    )
}

/// A row group named `name` with `rows` leaf rows.
pub fn group(name: &str, rows: usize) -> TreeNode {
    TreeNode::group(
        name,
        (0..rows)
            .map(|i| {
                TreeNode::leaf(
                    format!("{}-{}", name, i),
                    vec![CellValue::Number((i * 10) as f64)],
                )
            })
            .collect(),
    )
}

/// `count` groups of `rows` rows each, named G0, G1, ...
pub fn groups(count: usize, rows: usize) -> Vec<TreeNode> {
    (0..count).map(|i| group(&format!("G{}", i), rows)).collect()
}

pub fn headers() -> TreeNode {
    TreeNode::group(
        "columns",
        vec![
            TreeNode::leaf("Revenue", Vec::new()),
            TreeNode::leaf("Units", Vec::new()),
            TreeNode::leaf("Margin", Vec::new()),
        ],
    )
}

// ============================================================================
// ASSERTION HELPERS
// ============================================================================

pub fn expect_resolved<T: Clone + Debug>(deferred: &Deferred<T>) -> T {
    match deferred.result() {
        Some(Ok(value)) => value,
        other => panic!("expected a resolved request, got {:?}", other),
    }
}

pub fn expect_rejected<T: Clone + Debug>(deferred: &Deferred<T>) -> PivotError {
    match deferred.result() {
        Some(Err(error)) => error,
        other => panic!("expected a rejected request, got {:?}", other),
    }
}
