//! FILENAME: core/pivot-loader/benches/chunk_accumulation.rs
//! Chunk accumulation and end-to-end streaming benchmarks.

use std::rc::Rc;

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use pivot_loader::{
    ChunkQueue, LoadOptions, LoaderConfig, ManualClock, MetadataItem, NodeBatch, Panel,
    PassThroughTransform, PivotDataService, PivotResult, QueryDescriptor, Transport,
    TransportMessage,
};
use pivot_tree::{CellValue, TreeNode};

struct NullTransport;

impl Transport for NullTransport {
    fn subscribe(&mut self) {}
    fn unsubscribe(&mut self) {}
    fn issue(&mut self, _query: &QueryDescriptor) -> PivotResult<()> {
        Ok(())
    }
    fn has_error(&self) -> bool {
        false
    }
    fn has_data(&self) -> bool {
        true
    }
    fn jaql(&self) -> Option<QueryDescriptor> {
        None
    }
    fn is_single_row_tree(&self) -> bool {
        false
    }
    fn total_items_count(&self) -> usize {
        0
    }
}

fn region(index: usize, rows: usize) -> TreeNode {
    let name = format!("R{}", index);
    TreeNode::group(
        name.clone(),
        (0..rows)
            .map(|i| TreeNode::leaf(format!("{}-{}", name, i), vec![CellValue::Number(i as f64)]))
            .collect(),
    )
}

fn accumulate_benchmark(c: &mut Criterion) {
    let nodes: Vec<TreeNode> = (0..2000).map(|i| region(i, 5)).collect();

    c.bench_function("accumulate_2000_groups", |b| {
        b.iter(|| {
            let mut queue = ChunkQueue::new();
            for node in nodes.iter().cloned() {
                queue.push(node, 100, 1000);
            }
            black_box(queue.len())
        })
    });
}

fn split_merge_benchmark(c: &mut Criterion) {
    let parts: Vec<TreeNode> = (0..500).map(|_| region(0, 4).into_part()).collect();

    c.bench_function("merge_500_fragments", |b| {
        b.iter(|| {
            let mut queue = ChunkQueue::new();
            for node in parts.iter().cloned() {
                queue.push(node, 100, 1000);
            }
            black_box(queue.total_size())
        })
    });
}

fn stream_benchmark(c: &mut Criterion) {
    let query = QueryDescriptor::new("Bench", vec![MetadataItem::new(0, Panel::Rows, "Region")]);
    let nodes: Vec<TreeNode> = (0..1000).map(|i| region(i, 10)).collect();

    c.bench_function("stream_10000_rows", |b| {
        b.iter(|| {
            let config = LoaderConfig {
                throttle_ms: 0,
                ..LoaderConfig::default()
            };
            let mut service = PivotDataService::with_parts(
                NullTransport,
                Box::new(PassThroughTransform::new()),
                config,
                Rc::new(ManualClock::new()),
            );
            let page = service.load_data(Some(query.clone()), LoadOptions::with_page_size(100));
            for node in nodes.iter().cloned() {
                service.handle_message(TransportMessage::Data(NodeBatch::One(node)));
            }
            service.handle_message(TransportMessage::DataFinish { rows_count: 10_000 });
            black_box((page.status(), service.loaded_rows_count()))
        })
    });
}

criterion_group!(
    benches,
    accumulate_benchmark,
    split_merge_benchmark,
    stream_benchmark
);
criterion_main!(benches);
