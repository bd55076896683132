//! FILENAME: core/pivot-loader/src/transform.rs
//! PURPOSE: Boundary with the tree-transform pipeline.
//! CONTEXT: The loader only sequences the three phases (pre-process, modify,
//! post-process); what they do to the tree belongs to the transform. The
//! `PassThroughTransform` performs the structural conversion and formatting
//! callbacks without inserting synthetic rows.

use pivot_tree::{
    append_child, last_descendant, value_path, CellValue, MetadataType, NodeRef, PivotTreeNode,
    TreeNode, UserType,
};
use serde::{Deserialize, Serialize};

use crate::logging::log_debug;
use crate::transport::{MetadataItem, Panel};

/// Which tree a batch of nodes belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TreeKind {
    Rows,
    Grand,
    Columns,
    Corner,
}

/// Formatting callback payload for a single header or data cell.
#[derive(Debug, Clone, PartialEq)]
pub struct CellFormat {
    pub kind: TreeKind,
    /// Group keys from the top-level node down to the formatted node.
    pub path: Vec<Option<String>>,
    pub column_index: usize,
    pub value: CellValue,
    pub formatted: String,
    pub user_type: UserType,
}

/// Column and corner trees built from the HEADERS message.
#[derive(Debug, Clone)]
pub struct HeaderTrees {
    pub columns: NodeRef,
    pub corner: NodeRef,
}

// ============================================================================
// INDEX DIVERGENCE
// ============================================================================

/// Tracks where the rows of consecutive chunks stop sharing group keys.
///
/// After each chunk the path of its last row is recorded. The next chunk's
/// first row is compared against it: levels above the divergence point
/// continue groups that began in an earlier chunk.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IndexDivergence {
    previous: Vec<Option<String>>,
}

impl IndexDivergence {
    pub fn new() -> Self {
        IndexDivergence::default()
    }

    /// First level where `path` differs from the previously recorded path.
    /// None when nothing was recorded or the shared levels all match.
    pub fn diverges_at(&self, path: &[Option<String>]) -> Option<usize> {
        if self.previous.is_empty() {
            return None;
        }
        self.previous
            .iter()
            .zip(path.iter())
            .position(|(a, b)| a != b)
    }

    pub fn record(&mut self, path: Vec<Option<String>>) {
        self.previous = path;
    }

    pub fn previous(&self) -> &[Option<String>] {
        &self.previous
    }

    pub fn reset(&mut self) {
        self.previous.clear();
    }
}

// ============================================================================
// TRANSFORM COLLABORATOR
// ============================================================================

pub trait TreeTransform {
    /// Builds the column and corner trees for a query.
    fn build_headers(&mut self, headers: TreeNode, metadata: &[MetadataItem]) -> HeaderTrees;

    /// Converts streamed nodes into a detached container of pivot nodes.
    fn pre_process_tree(&mut self, nodes: Vec<TreeNode>, kind: TreeKind) -> NodeRef;

    /// Inserts synthetic rows (subtotals, grand totals) into a batch.
    fn modify_tree(&mut self, root: &NodeRef, kind: TreeKind, divergence: &mut IndexDivergence);

    /// Final pass over a tree. With a callback, every cell is reported for formatting.
    fn post_process_tree(
        &self,
        root: &NodeRef,
        kind: TreeKind,
        format: Option<&mut dyn FnMut(CellFormat)>,
    );
}

/// Structural conversion only.
#[derive(Debug, Default, Clone, Copy)]
pub struct PassThroughTransform;

impl PassThroughTransform {
    pub fn new() -> Self {
        PassThroughTransform
    }
}

fn metadata_type_for(kind: TreeKind) -> MetadataType {
    match kind {
        TreeKind::Rows | TreeKind::Grand => MetadataType::Rows,
        TreeKind::Columns => MetadataType::Columns,
        TreeKind::Corner => MetadataType::Corner,
    }
}

fn first_descendant(node: &NodeRef) -> NodeRef {
    let mut current = node.clone();
    loop {
        let next = current.borrow().children.first().cloned();
        match next {
            Some(child) => current = child,
            None => return current,
        }
    }
}

fn mark_user_type(node: &NodeRef, user_type: UserType) {
    node.borrow_mut().user_type = user_type;
    let children = node.borrow().children.clone();
    for child in &children {
        mark_user_type(child, user_type);
    }
}

fn format_node(
    node: &NodeRef,
    kind: TreeKind,
    column_offset: &mut usize,
    format: &mut dyn FnMut(CellFormat),
) {
    let (cells, user_type, children) = {
        let inner = node.borrow();
        let cells = match kind {
            TreeKind::Columns | TreeKind::Corner => inner
                .value
                .as_ref()
                .map(|v| vec![CellValue::Text(v.clone())])
                .unwrap_or_default(),
            TreeKind::Rows | TreeKind::Grand => inner.data.clone().unwrap_or_default(),
        };
        (cells, inner.user_type, inner.children.clone())
    };

    if !cells.is_empty() {
        let path = value_path(node);
        for (index, value) in cells.into_iter().enumerate() {
            let column_index = match kind {
                TreeKind::Columns | TreeKind::Corner => {
                    *column_offset += 1;
                    *column_offset - 1
                }
                TreeKind::Rows | TreeKind::Grand => index,
            };
            format(CellFormat {
                kind,
                path: path.clone(),
                column_index,
                formatted: value.display_value(),
                value,
                user_type,
            });
        }
        node.borrow_mut().mark_mapped();
    }

    for child in &children {
        format_node(child, kind, column_offset, format);
    }
}

impl TreeTransform for PassThroughTransform {
    fn build_headers(&mut self, headers: TreeNode, metadata: &[MetadataItem]) -> HeaderTrees {
        let columns = PivotTreeNode::container(MetadataType::Columns);
        for child in headers.children.unwrap_or_default() {
            append_child(
                &columns,
                PivotTreeNode::from_tree_node(child, 0, MetadataType::Columns),
            );
        }

        let corner = PivotTreeNode::container(MetadataType::Corner);
        for item in metadata.iter().filter(|m| m.panel == Panel::Rows) {
            let mut cell = PivotTreeNode::new(Some(item.title.clone()));
            cell.metadata_type = Some(MetadataType::Corner);
            cell.user_type = UserType::Corner;
            cell.jaql_index = Some(item.jaql_index);
            append_child(&corner, cell.into_ref());
        }

        HeaderTrees { columns, corner }
    }

    fn pre_process_tree(&mut self, nodes: Vec<TreeNode>, kind: TreeKind) -> NodeRef {
        let metadata_type = metadata_type_for(kind);
        let root = PivotTreeNode::container(metadata_type);
        for node in nodes {
            let converted = PivotTreeNode::from_tree_node(node, 0, metadata_type);
            if kind == TreeKind::Grand {
                mark_user_type(&converted, UserType::GrandTotal);
            }
            append_child(&root, converted);
        }
        root
    }

    fn modify_tree(&mut self, root: &NodeRef, kind: TreeKind, divergence: &mut IndexDivergence) {
        if kind != TreeKind::Rows || root.borrow().children.is_empty() {
            return;
        }
        let first = value_path(&first_descendant(root));
        if let Some(level) = divergence.diverges_at(&first) {
            log_debug!("CHUNKS", "batch diverges from previous at level {}", level);
        }
        divergence.record(value_path(&last_descendant(root)));
    }

    fn post_process_tree(
        &self,
        root: &NodeRef,
        kind: TreeKind,
        format: Option<&mut dyn FnMut(CellFormat)>,
    ) {
        let Some(format) = format else {
            return;
        };
        let mut column_offset = 0;
        let children = root.borrow().children.clone();
        for child in &children {
            format_node(child, kind, &mut column_offset, format);
        }
    }
}
