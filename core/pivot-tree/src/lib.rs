//! FILENAME: core/pivot-tree/src/lib.rs
//! Tree model for streamed pivot results.
//!
//! This crate holds the shared types used by the loader. It knows nothing
//! about streaming or pagination.
//!
//! Layers:
//! - `cell`: Raw cell values of a row
//! - `node`: Wire row-group nodes (what the backend SENDS)
//! - `pivot_node`: Normalized nodes with back-references (what we STORE)
//! - `clone`: Detached copies of stored subtrees (what we EXPOSE)
//! - `indexed`: The append-only master tree with row-range extraction

pub mod cell;
pub mod node;
pub mod pivot_node;
pub mod clone;
pub mod indexed;

pub use cell::CellValue;
pub use node::TreeNode;
pub use pivot_node::{
    append_child, invalidate_derived, last_descendant, leaf_count, min_level, subtree_depth,
    value_path, DerivedCache, MeasurePath, MetadataType, NodeRef, PivotTreeNode, UserType,
    WeakNodeRef,
};
pub use clone::{clone_tree_node, CloneFn};
pub use indexed::IndexedTree;
