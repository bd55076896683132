//! FILENAME: core/pivot-loader/src/lib.rs
//! Incremental loading and pagination of streamed pivot results.
//!
//! The backend streams row groups in many small messages. The loader batches
//! them into chunks, normalizes each chunk into an append-only master tree,
//! and answers page requests as soon as enough rows have arrived.
//!
//! Layers:
//! - `chunk`: Size-bounded batching of streamed nodes
//! - `service`: State of the current query
//! - `ingest`: Stream message routing
//! - `processor`: Throttled, in-order chunk normalization
//! - `pagination`: First page, full load and arbitrary pages
//! - `events`: Notification channels for hosts and renderers

pub mod logging;

pub mod chunk;
pub mod config;
pub mod deferred;
pub mod error;
pub mod events;
pub mod ingest;
pub mod pagination;
pub mod processor;
pub mod scheduler;
pub mod service;
pub mod transform;
pub mod transport;

pub use chunk::{fill_data_chunks, ChunkQueue, NodesChunk};
pub use config::LoaderConfig;
pub use deferred::{Deferred, DeferredStatus};
pub use error::{PivotError, PivotResult};
pub use events::{
    Channel, ChunkLoaded, DataFinishInfo, PivotEvents, SubscriptionId, TotalCounts, TotalRows,
};
pub use pagination::{LoadOptions, LoadSummary, PageResult, PivotPage};
pub use scheduler::{Clock, ManualClock, SystemClock, Throttle};
pub use service::PivotDataService;
pub use transform::{
    CellFormat, HeaderTrees, IndexDivergence, PassThroughTransform, TreeKind, TreeTransform,
};
pub use transport::{
    realign_range_min_max, ErrorPayload, MetadataItem, MinMax, NodeBatch, Panel, QueryDescriptor,
    Transport, TransportMessage,
};
