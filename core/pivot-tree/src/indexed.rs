//! FILENAME: core/pivot-tree/src/indexed.rs
//! PURPOSE: Append-only master tree with leaf-indexed range extraction.
//! CONTEXT: Rows of the tree are its last-level nodes. Ranges are expressed
//! in row positions and extracted as detached clones: the ancestors of every
//! row in range are cloned without their children, then only the in-range
//! descendants are attached.

use std::rc::Rc;

use crate::clone::CloneFn;
use crate::pivot_node::{
    append_child, invalidate_derived, leaf_count, subtree_depth, MetadataType, NodeRef,
    PivotTreeNode,
};

#[derive(Debug)]
pub struct IndexedTree {
    root: NodeRef,
    is_rows_tree: bool,
    /// Depth declared at construction, if the producer knows it.
    deep_length: Option<usize>,
}

impl Default for IndexedTree {
    fn default() -> Self {
        IndexedTree::new(true)
    }
}

impl IndexedTree {
    /// Creates an empty tree.
    pub fn new(is_rows_tree: bool) -> Self {
        let metadata_type = if is_rows_tree {
            MetadataType::Rows
        } else {
            MetadataType::Columns
        };
        IndexedTree {
            root: PivotTreeNode::container(metadata_type),
            is_rows_tree,
            deep_length: None,
        }
    }

    /// Replaces the whole tree with `root`.
    pub fn construct(&mut self, root: NodeRef, is_rows_tree: bool, deep_length: Option<usize>) {
        root.borrow_mut().parent = None;
        invalidate_derived(&root);
        self.root = root;
        self.is_rows_tree = is_rows_tree;
        self.deep_length = deep_length;
    }

    /// Appends the children of `batch` after the current last row.
    ///
    /// A leading child that continues the current last top-level node
    /// (both fragments with equal value) is merged into it.
    pub fn extend(&mut self, batch: NodeRef) {
        let incoming: Vec<NodeRef> = std::mem::take(&mut batch.borrow_mut().children);
        let mut incoming = incoming.into_iter();

        if let Some(first) = incoming.next() {
            let last = self.root.borrow().children.last().cloned();
            match last {
                Some(last) if continues(&first, &last) => merge_into(&last, &first),
                _ => append_child(&self.root, first),
            }
        }
        for child in incoming {
            append_child(&self.root, child);
        }
    }

    pub fn root(&self) -> &NodeRef {
        &self.root
    }

    pub fn is_rows_tree(&self) -> bool {
        self.is_rows_tree
    }

    pub fn is_empty(&self) -> bool {
        self.root.borrow().children.is_empty()
    }

    /// Number of rows (last-level nodes) currently held.
    pub fn tree_child_length(&self) -> usize {
        if self.is_empty() {
            0
        } else {
            leaf_count(&self.root)
        }
    }

    /// Number of levels below the container root.
    pub fn tree_deeps_length(&self) -> usize {
        self.deep_length
            .unwrap_or_else(|| subtree_depth(&self.root).saturating_sub(1))
    }

    /// All last-level nodes in row order.
    pub fn last_level_nodes(&self) -> Vec<NodeRef> {
        let mut leaves = Vec::new();
        for child in &self.root.borrow().children {
            collect_leaves(child, &mut leaves);
        }
        leaves
    }

    /// Returns a detached container holding rows `[from, to)` and their ancestors.
    pub fn partial_tree(&self, from: usize, to: usize, clone_fn: CloneFn) -> NodeRef {
        let result = clone_fn(&self.root, true);
        if from < to {
            let mut offset = 0;
            collect_range(&self.root, &result, from, to, &mut offset, clone_fn);
        }
        result
    }
}

fn continues(next: &NodeRef, previous: &NodeRef) -> bool {
    let (next, previous) = (next.borrow(), previous.borrow());
    next.is_part && previous.is_part && next.value == previous.value
}

/// Moves the children of fragment `from` under `into`, merging nested continuations.
fn merge_into(into: &NodeRef, from: &NodeRef) {
    let incoming: Vec<NodeRef> = std::mem::take(&mut from.borrow_mut().children);
    {
        let mut target = into.borrow_mut();
        let source = from.borrow();
        target.size += source.size;
        target.is_part = source.is_part;
        if target.data.is_none() {
            target.data = source.data.clone();
        }
    }

    let mut incoming = incoming.into_iter();
    if let Some(first) = incoming.next() {
        let last = into.borrow().children.last().cloned();
        match last {
            Some(last) if continues(&first, &last) => merge_into(&last, &first),
            _ => append_child(into, first),
        }
    }
    for child in incoming {
        append_child(into, child);
    }
    invalidate_derived(into);
}

fn collect_leaves(node: &NodeRef, out: &mut Vec<NodeRef>) {
    let inner = node.borrow();
    if inner.is_leaf() {
        out.push(node.clone());
    } else {
        for child in &inner.children {
            collect_leaves(child, out);
        }
    }
}

fn collect_range(
    source: &NodeRef,
    target: &NodeRef,
    from: usize,
    to: usize,
    offset: &mut usize,
    clone_fn: CloneFn,
) {
    let children = source.borrow().children.clone();
    for child in children {
        let start = *offset;
        let end = start + leaf_count(&child);
        if end <= from {
            *offset = end;
            continue;
        }
        if start >= to {
            break;
        }

        if child.borrow().is_leaf() {
            attach(target, clone_fn(&child, false));
        } else if start >= from && end <= to {
            attach(target, clone_fn(&child, false));
        } else {
            let partial = clone_fn(&child, true);
            attach(target, partial.clone());
            collect_range(&child, &partial, from, to, offset, clone_fn);
        }
        *offset = end;
    }
}

fn attach(parent: &NodeRef, child: NodeRef) {
    child.borrow_mut().parent = Some(Rc::downgrade(parent));
    parent.borrow_mut().children.push(child);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::CellValue;
    use crate::clone::clone_tree_node;
    use crate::node::TreeNode;

    fn region(name: &str, rows: usize) -> TreeNode {
        TreeNode::group(
            name,
            (0..rows)
                .map(|i| TreeNode::leaf(format!("{}-{}", name, i), vec![CellValue::Number(i as f64)]))
                .collect(),
        )
    }

    fn batch(nodes: Vec<TreeNode>) -> NodeRef {
        let root = PivotTreeNode::container(MetadataType::Rows);
        for node in nodes {
            append_child(&root, PivotTreeNode::from_tree_node(node, 0, MetadataType::Rows));
        }
        root
    }

    fn leaf_values(node: &NodeRef) -> Vec<String> {
        let mut leaves = Vec::new();
        collect_leaves(node, &mut leaves);
        leaves
            .iter()
            .filter_map(|n| n.borrow().value.clone())
            .collect()
    }

    #[test]
    fn test_extends_in_append_order() {
        let mut tree = IndexedTree::new(true);
        tree.extend(batch(vec![region("East", 3)]));
        tree.extend(batch(vec![region("West", 2)]));

        assert_eq!(tree.tree_child_length(), 5);
        assert_eq!(tree.tree_deeps_length(), 2);
        let leaves = tree.last_level_nodes();
        assert_eq!(leaves[3].borrow().value.as_deref(), Some("West-0"));
    }

    #[test]
    fn test_merges_continuation_across_batches() {
        let mut tree = IndexedTree::new(true);
        tree.extend(batch(vec![region("East", 2).into_part()]));
        tree.extend(batch(vec![region("East", 2).into_part(), region("West", 1)]));

        assert_eq!(tree.root().borrow().children.len(), 2);
        assert_eq!(tree.tree_child_length(), 5);
    }

    #[test]
    fn test_extracts_partial_ranges_with_ancestors() {
        let mut tree = IndexedTree::new(true);
        tree.extend(batch(vec![region("East", 3), region("West", 3)]));

        let page = tree.partial_tree(2, 4, clone_tree_node);
        let top = page.borrow().children.clone();
        assert_eq!(top.len(), 2);
        assert_eq!(leaf_values(&page), vec!["East-2", "West-0"]);
        assert!(Rc::ptr_eq(&top[1].borrow().parent().unwrap(), &page));

        // The master tree is untouched.
        assert_eq!(tree.tree_child_length(), 6);
        assert!(!Rc::ptr_eq(&top[0], &tree.root().borrow().children[0]));
    }

    #[test]
    fn test_returns_empty_container_for_empty_range() {
        let mut tree = IndexedTree::new(true);
        tree.extend(batch(vec![region("East", 3)]));
        let page = tree.partial_tree(3, 3, clone_tree_node);
        assert!(page.borrow().children.is_empty());
        let page = tree.partial_tree(10, 20, clone_tree_node);
        assert!(page.borrow().children.is_empty());
    }

    #[test]
    fn test_reports_zero_rows_when_empty() {
        let tree = IndexedTree::new(false);
        assert_eq!(tree.tree_child_length(), 0);
        assert!(!tree.is_rows_tree());
    }
}
