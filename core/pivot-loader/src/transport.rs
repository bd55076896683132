//! FILENAME: core/pivot-loader/src/transport.rs
//! PURPOSE: Boundary with the backend stream.
//! CONTEXT: The transport issues queries and reports on its own state. The
//! host pushes the messages it receives into
//! `PivotDataService::handle_message`; their JSON shape is
//! `{"type": "<category>", "payload": ...}`.

use pivot_tree::TreeNode;
use serde::{Deserialize, Serialize};

use crate::error::{PivotError, PivotResult};
use crate::events::TotalRows;

// ============================================================================
// QUERY DESCRIPTION
// ============================================================================

/// Query panel a metadata item belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Panel {
    Rows,
    Columns,
    Measures,
    Filters,
}

/// One dimension or measure of the query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetadataItem {
    pub jaql_index: usize,
    pub panel: Panel,
    #[serde(default)]
    pub title: String,
    /// Disabled measures are requested but produce no values.
    #[serde(default)]
    pub disabled: bool,
}

impl MetadataItem {
    pub fn new(jaql_index: usize, panel: Panel, title: impl Into<String>) -> Self {
        MetadataItem {
            jaql_index,
            panel,
            title: title.into(),
            disabled: false,
        }
    }

    pub fn disabled(mut self) -> Self {
        self.disabled = true;
        self
    }
}

/// The query handed to the transport.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryDescriptor {
    pub datasource: String,
    #[serde(default)]
    pub metadata: Vec<MetadataItem>,
}

impl QueryDescriptor {
    pub fn new(datasource: impl Into<String>, metadata: Vec<MetadataItem>) -> Self {
        QueryDescriptor {
            datasource: datasource.into(),
            metadata,
        }
    }
}

// ============================================================================
// MESSAGES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MinMax {
    pub min: f64,
    pub max: f64,
}

/// Payload of an ERROR message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub message: String,
    /// Set when the failure is the backend acknowledging a cancellation.
    #[serde(default)]
    pub canceled: bool,
}

impl ErrorPayload {
    pub fn new(message: impl Into<String>) -> Self {
        ErrorPayload {
            message: message.into(),
            canceled: false,
        }
    }

    pub fn to_error(&self) -> PivotError {
        if self.canceled {
            PivotError::LoadingCanceled
        } else {
            PivotError::Transport(self.message.clone())
        }
    }
}

/// DATA carries either one node or an array of nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NodeBatch {
    Many(Vec<TreeNode>),
    One(TreeNode),
}

impl NodeBatch {
    pub fn into_vec(self) -> Vec<TreeNode> {
        match self {
            NodeBatch::Many(nodes) => nodes,
            NodeBatch::One(node) => vec![node],
        }
    }
}

/// One message of the backend stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "camelCase")]
pub enum TransportMessage {
    Headers(TreeNode),
    Metadata,
    Data(NodeBatch),
    Grand(TreeNode),
    #[serde(rename_all = "camelCase")]
    DataFinish { rows_count: usize },
    TotalRows(TotalRows),
    DataBars { data: Vec<MinMax> },
    RangeMinMax { data: Vec<Option<MinMax>> },
    Finish,
    Error(ErrorPayload),
}

impl TransportMessage {
    pub fn from_json(json: &str) -> PivotResult<Self> {
        serde_json::from_str(json).map_err(|e| PivotError::Decode(e.to_string()))
    }

    pub fn category(&self) -> &'static str {
        match self {
            TransportMessage::Headers(_) => "headers",
            TransportMessage::Metadata => "metadata",
            TransportMessage::Data(_) => "data",
            TransportMessage::Grand(_) => "grand",
            TransportMessage::DataFinish { .. } => "dataFinish",
            TransportMessage::TotalRows(_) => "totalRows",
            TransportMessage::DataBars { .. } => "dataBars",
            TransportMessage::RangeMinMax { .. } => "rangeMinMax",
            TransportMessage::Finish => "finish",
            TransportMessage::Error(_) => "error",
        }
    }
}

// ============================================================================
// TRANSPORT COLLABORATOR
// ============================================================================

/// The component that talks to the backend.
pub trait Transport {
    /// Starts listening to the stream for the current query.
    fn subscribe(&mut self);

    /// Stops listening; no further messages will be delivered.
    fn unsubscribe(&mut self);

    /// Sends a query. Failures after this call arrive as ERROR messages.
    fn issue(&mut self, query: &QueryDescriptor) -> PivotResult<()>;

    fn has_error(&self) -> bool;

    fn has_data(&self) -> bool;

    /// The query as the backend understood it.
    fn jaql(&self) -> Option<QueryDescriptor>;

    fn is_single_row_tree(&self) -> bool;

    fn total_items_count(&self) -> usize;
}

/// Spreads per-measure ranges over all measures of the query, leaving a
/// gap for each disabled measure. The backend only reports enabled ones.
pub fn realign_range_min_max(
    data: Vec<Option<MinMax>>,
    metadata: &[MetadataItem],
) -> Vec<Option<MinMax>> {
    let measures: Vec<&MetadataItem> = metadata
        .iter()
        .filter(|item| item.panel == Panel::Measures)
        .collect();
    if measures.is_empty() || measures.iter().all(|m| !m.disabled) {
        return data;
    }

    let mut values = data.into_iter();
    measures
        .iter()
        .map(|measure| {
            if measure.disabled {
                None
            } else {
                values.next().flatten()
            }
        })
        .collect()
}
