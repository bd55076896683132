//! FILENAME: core/pivot-tree/src/clone.rs
//! PURPOSE: Deep-clones row subtrees for exposure outside the engine.
//! CONTEXT: Page results never alias the master tree. Each field is listed
//! explicitly below as shared, copied or dropped, so adding a field to
//! `PivotTreeNode` forces a decision here.

use std::rc::Rc;

use crate::pivot_node::{DerivedCache, NodeRef, PivotTreeNode};

/// Signature of the clone function handed to `IndexedTree::partial_tree`.
pub type CloneFn = fn(&NodeRef, bool) -> NodeRef;

/// Clones `node` and, unless `skip_children` is set, its whole subtree.
///
/// - `master` is shared: the clone points at the same target.
/// - `data`, `state`, `style`, `store` and `measure_path` are copied.
/// - The derived cache (mapped flag, min level, child count, child depth)
///   is dropped and recomputed on demand.
/// - Cloned children have `parent` rewired to their cloned parent. The
///   returned top-level clone has no parent: it is a detached view.
pub fn clone_tree_node(node: &NodeRef, skip_children: bool) -> NodeRef {
    let source = node.borrow();
    let clone = PivotTreeNode {
        value: source.value.clone(),
        children: Vec::new(),
        data: source.data.clone(),
        size: source.size,
        level: source.level,
        is_part: source.is_part,
        metadata_type: source.metadata_type,
        jaql_index: source.jaql_index,
        measure_path: source.measure_path.clone(),
        user_type: source.user_type,
        state: source.state.clone(),
        style: source.style.clone(),
        store: source.store.clone(),
        parent: None,
        master: source.master.clone(),
        derived: DerivedCache::default(),
    }
    .into_ref();

    if !skip_children {
        let children: Vec<NodeRef> = source
            .children
            .iter()
            .map(|child| {
                let cloned = clone_tree_node(child, false);
                cloned.borrow_mut().parent = Some(Rc::downgrade(&clone));
                cloned
            })
            .collect();
        clone.borrow_mut().children = children;
    }

    clone
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::CellValue;
    use crate::node::TreeNode;
    use crate::pivot_node::{append_child, leaf_count, MetadataType, UserType};
    use std::rc::Rc;

    fn sample() -> (NodeRef, NodeRef) {
        let root = PivotTreeNode::container(MetadataType::Rows);
        let east = PivotTreeNode::from_tree_node(
            TreeNode::group(
                "East",
                vec![
                    TreeNode::leaf("Q1", vec![CellValue::Number(1.0)]),
                    TreeNode::leaf("Q2", vec![CellValue::Number(2.0)]),
                ],
            ),
            0,
            MetadataType::Rows,
        );
        append_child(&root, east.clone());
        (root, east)
    }

    fn assert_structurally_distinct(a: &NodeRef, b: &NodeRef) {
        assert!(!Rc::ptr_eq(a, b));
        let (a, b) = (a.borrow(), b.borrow());
        assert_eq!(a.value, b.value);
        assert_eq!(a.data, b.data);
        assert_eq!(a.children.len(), b.children.len());
        for (ca, cb) in a.children.iter().zip(b.children.iter()) {
            assert_structurally_distinct(ca, cb);
        }
    }

    #[test]
    fn test_clones_every_level_into_distinct_nodes() {
        let (_root, east) = sample();
        let clone = clone_tree_node(&east, false);
        assert_structurally_distinct(&east, &clone);
    }

    #[test]
    fn test_detaches_top_level_and_rewires_children() {
        let (_root, east) = sample();
        let clone = clone_tree_node(&east, false);

        assert!(clone.borrow().parent().is_none());
        let child = clone.borrow().children[0].clone();
        assert!(Rc::ptr_eq(&child.borrow().parent().unwrap(), &clone));
    }

    #[test]
    fn test_shares_master_and_copies_payloads() {
        let (_root, east) = sample();
        let total = PivotTreeNode::new(Some("East Total".to_string())).into_ref();
        {
            let mut t = total.borrow_mut();
            t.user_type = UserType::SubTotal;
            t.master = Some(Rc::downgrade(&east));
            t.data = Some(vec![CellValue::Number(3.0)]);
            t.state = Some(serde_json::json!({ "expanded": true }));
        }

        let clone = clone_tree_node(&total, false);
        assert!(Rc::ptr_eq(&clone.borrow().master().unwrap(), &east));
        assert_eq!(clone.borrow().user_type, UserType::SubTotal);

        clone.borrow_mut().data = Some(vec![CellValue::Number(99.0)]);
        clone.borrow_mut().state = None;
        assert_eq!(total.borrow().data, Some(vec![CellValue::Number(3.0)]));
        assert!(total.borrow().state.is_some());
    }

    #[test]
    fn test_drops_derived_cache() {
        let (root, east) = sample();
        assert_eq!(leaf_count(&root), 2);
        east.borrow_mut().mark_mapped();

        let clone = clone_tree_node(&east, false);
        assert!(!clone.borrow().is_mapped());
        assert_eq!(clone.borrow().derived.child_count, None);
        assert_eq!(leaf_count(&clone), 2);
    }

    #[test]
    fn test_skips_children_on_request() {
        let (_root, east) = sample();
        let clone = clone_tree_node(&east, true);
        assert!(clone.borrow().children.is_empty());
        assert_eq!(clone.borrow().size, 2);
    }
}
