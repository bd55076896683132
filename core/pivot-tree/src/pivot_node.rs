//! FILENAME: core/pivot-tree/src/pivot_node.rs
//! PURPOSE: The normalized tree node stored in the master row/column/corner trees.
//! CONTEXT: Nodes are shared `Rc<RefCell<_>>` handles. Children are owned by
//! their parent, `parent` and `master` are non-owning `Weak` back-references.
//! The engine is single-threaded, so no synchronization is involved.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::cell::CellValue;
use crate::node::TreeNode;

/// Shared handle to a node of a pivot tree.
pub type NodeRef = Rc<RefCell<PivotTreeNode>>;

/// Non-owning back-reference to a node.
pub type WeakNodeRef = Weak<RefCell<PivotTreeNode>>;

/// (jaql index, member value) pairs locating a measure cell in the column tree.
pub type MeasurePath = SmallVec<[(usize, String); 4]>;

// ============================================================================
// NODE CLASSIFICATION
// ============================================================================

/// Role of a node as seen by consumers of a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UserType {
    Normal,
    SubTotal,
    GrandTotal,
    Corner,
}

impl Default for UserType {
    fn default() -> Self {
        UserType::Normal
    }
}

/// Which panel of the query a node belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MetadataType {
    Rows,
    Columns,
    Measures,
    Corner,
}

/// Lazily computed values. Never copied by the cloner.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DerivedCache {
    pub is_mapped: bool,
    pub min_level: Option<u32>,
    pub child_count: Option<usize>,
    pub child_depth: Option<usize>,
}

// ============================================================================
// PIVOT TREE NODE
// ============================================================================

#[derive(Debug, Default)]
pub struct PivotTreeNode {
    pub value: Option<String>,
    pub children: Vec<NodeRef>,
    pub data: Option<Vec<CellValue>>,

    /// Leaf count as reported by the backend.
    pub size: usize,

    pub level: u32,

    /// Fragment of a logical node continued by a later delivery.
    pub is_part: bool,

    pub metadata_type: Option<MetadataType>,
    pub jaql_index: Option<usize>,
    pub measure_path: Option<MeasurePath>,
    pub user_type: UserType,

    /// Caller-mutable payloads.
    pub state: Option<serde_json::Value>,
    pub style: Option<serde_json::Value>,
    pub store: Option<serde_json::Value>,

    pub parent: Option<WeakNodeRef>,

    /// The node a synthetic (subtotal / grand total) node summarizes.
    pub master: Option<WeakNodeRef>,

    pub derived: DerivedCache,
}

impl PivotTreeNode {
    pub fn new(value: Option<String>) -> Self {
        PivotTreeNode {
            value,
            size: 1,
            ..PivotTreeNode::default()
        }
    }

    /// Creates an empty container whose children are the top-level rows.
    pub fn container(metadata_type: MetadataType) -> NodeRef {
        let mut root = PivotTreeNode::new(None);
        root.size = 0;
        root.metadata_type = Some(metadata_type);
        root.into_ref()
    }

    pub fn into_ref(self) -> NodeRef {
        Rc::new(RefCell::new(self))
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    pub fn is_mapped(&self) -> bool {
        self.derived.is_mapped
    }

    pub fn mark_mapped(&mut self) {
        self.derived.is_mapped = true;
    }

    pub fn parent(&self) -> Option<NodeRef> {
        self.parent.as_ref().and_then(Weak::upgrade)
    }

    pub fn master(&self) -> Option<NodeRef> {
        self.master.as_ref().and_then(Weak::upgrade)
    }

    /// Converts a wire node (and its subtree) into a detached pivot node.
    pub fn from_tree_node(node: TreeNode, level: u32, metadata_type: MetadataType) -> NodeRef {
        let level = node.level.unwrap_or(level);
        let mut pivot = PivotTreeNode::new(node.value);
        pivot.data = node.data;
        pivot.size = node.size;
        pivot.level = level;
        pivot.is_part = node.is_part;
        pivot.metadata_type = Some(metadata_type);
        let handle = pivot.into_ref();

        for child in node.children.unwrap_or_default() {
            let child = PivotTreeNode::from_tree_node(child, level + 1, metadata_type);
            append_child(&handle, child);
        }
        handle
    }
}

// ============================================================================
// TREE HELPERS
// ============================================================================

/// Attaches `child` under `parent`, rewiring its back-reference.
pub fn append_child(parent: &NodeRef, child: NodeRef) {
    child.borrow_mut().parent = Some(Rc::downgrade(parent));
    parent.borrow_mut().children.push(child);
    invalidate_derived(parent);
}

/// Clears cached counts on `node` and every ancestor.
pub fn invalidate_derived(node: &NodeRef) {
    let mut current = Some(node.clone());
    while let Some(n) = current {
        let mut inner = n.borrow_mut();
        inner.derived.child_count = None;
        inner.derived.child_depth = None;
        inner.derived.min_level = None;
        current = inner.parent();
    }
}

/// Number of last-level nodes under `node` (1 for a leaf). Cached.
pub fn leaf_count(node: &NodeRef) -> usize {
    if let Some(count) = node.borrow().derived.child_count {
        return count;
    }
    let count = {
        let inner = node.borrow();
        if inner.is_leaf() {
            1
        } else {
            inner.children.iter().map(leaf_count).sum()
        }
    };
    node.borrow_mut().derived.child_count = Some(count);
    count
}

/// Number of levels in the subtree rooted at `node` (1 for a leaf). Cached.
pub fn subtree_depth(node: &NodeRef) -> usize {
    if let Some(depth) = node.borrow().derived.child_depth {
        return depth;
    }
    let depth = 1 + node
        .borrow()
        .children
        .iter()
        .map(subtree_depth)
        .max()
        .unwrap_or(0);
    node.borrow_mut().derived.child_depth = Some(depth);
    depth
}

/// Smallest `level` found in the subtree rooted at `node`. Cached.
pub fn min_level(node: &NodeRef) -> u32 {
    if let Some(level) = node.borrow().derived.min_level {
        return level;
    }
    let level = {
        let inner = node.borrow();
        inner
            .children
            .iter()
            .map(min_level)
            .fold(inner.level, u32::min)
    };
    node.borrow_mut().derived.min_level = Some(level);
    level
}

/// Group keys from the top-level ancestor down to `node`.
/// The container root (a node without parent) is not part of the path.
pub fn value_path(node: &NodeRef) -> Vec<Option<String>> {
    let mut path = Vec::new();
    let mut current = Some(node.clone());
    while let Some(n) = current {
        let inner = n.borrow();
        let parent = inner.parent();
        if parent.is_none() {
            break;
        }
        path.push(inner.value.clone());
        current = parent;
    }
    path.reverse();
    path
}

/// The deepest last node of the subtree, following trailing children.
pub fn last_descendant(node: &NodeRef) -> NodeRef {
    let mut current = node.clone();
    loop {
        let next = current.borrow().children.last().cloned();
        match next {
            Some(child) => current = child,
            None => return current,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn region(name: &str, rows: &[&str]) -> TreeNode {
        TreeNode::group(
            name,
            rows.iter()
                .map(|r| TreeNode::leaf(*r, vec![CellValue::Number(1.0)]))
                .collect(),
        )
    }

    #[test]
    fn test_converts_wire_nodes_with_parent_links() {
        let root = PivotTreeNode::container(MetadataType::Rows);
        let east = PivotTreeNode::from_tree_node(region("East", &["Q1", "Q2"]), 0, MetadataType::Rows);
        append_child(&root, east.clone());

        let q2 = east.borrow().children[1].clone();
        assert_eq!(q2.borrow().level, 1);
        assert!(Rc::ptr_eq(&q2.borrow().parent().unwrap(), &east));
        assert_eq!(value_path(&q2), vec![Some("East".to_string()), Some("Q2".to_string())]);
    }

    #[test]
    fn test_caches_and_invalidates_leaf_counts() {
        let root = PivotTreeNode::container(MetadataType::Rows);
        let east = PivotTreeNode::from_tree_node(region("East", &["Q1", "Q2"]), 0, MetadataType::Rows);
        append_child(&root, east.clone());
        assert_eq!(leaf_count(&root), 2);
        assert_eq!(root.borrow().derived.child_count, Some(2));

        let q3 = PivotTreeNode::from_tree_node(TreeNode::leaf("Q3", Vec::new()), 1, MetadataType::Rows);
        append_child(&east, q3);
        assert_eq!(root.borrow().derived.child_count, None);
        assert_eq!(leaf_count(&root), 3);
        assert_eq!(subtree_depth(&root), 3);
        assert_eq!(min_level(&east), 0);
    }

    #[test]
    fn test_finds_last_descendant() {
        let east = PivotTreeNode::from_tree_node(region("East", &["Q1", "Q2"]), 0, MetadataType::Rows);
        let last = last_descendant(&east);
        assert_eq!(last.borrow().value.as_deref(), Some("Q2"));
    }
}
