//! FILENAME: core/pivot-tree/src/node.rs
//! PURPOSE: The row-group node as delivered by the backend stream.
//! CONTEXT: A `TreeNode` is owned plain data. It is created by the transport,
//! merged in place while chunks are accumulated, and converted into a
//! `PivotTreeNode` once its chunk is normalized.

use serde::{Deserialize, Serialize};

use crate::cell::CellValue;

fn default_size() -> usize {
    1
}

/// A hierarchical row-group unit of the streamed result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TreeNode {
    /// Group key (member value) of this node.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,

    /// Ordered child groups.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<TreeNode>>,

    /// Row cells, present on leaf rows.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Vec<CellValue>>,

    /// Number of leaf rows in this subtree.
    #[serde(default = "default_size")]
    pub size: usize,

    /// This delivery is a fragment; a later delivery with the same value continues it.
    #[serde(default)]
    pub is_part: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<u32>,
}

impl Default for TreeNode {
    fn default() -> Self {
        TreeNode {
            value: None,
            children: None,
            data: None,
            size: default_size(),
            is_part: false,
            level: None,
        }
    }
}

impl TreeNode {
    /// Creates a leaf row with the given key and cells.
    pub fn leaf(value: impl Into<String>, data: Vec<CellValue>) -> Self {
        TreeNode {
            value: Some(value.into()),
            data: Some(data),
            ..TreeNode::default()
        }
    }

    /// Creates a group node whose size is the sum of its children's sizes.
    pub fn group(value: impl Into<String>, children: Vec<TreeNode>) -> Self {
        let size = children.iter().map(|c| c.size).sum();
        TreeNode {
            value: Some(value.into()),
            children: Some(children),
            size,
            ..TreeNode::default()
        }
    }

    /// Marks this node as a fragment to be continued by a later delivery.
    pub fn into_part(mut self) -> Self {
        self.is_part = true;
        self
    }

    pub fn has_children(&self) -> bool {
        self.children.as_ref().map_or(false, |c| !c.is_empty())
    }

    /// A node with no children, no value and no cells is the end-of-stream sentinel.
    pub fn is_empty_sentinel(&self) -> bool {
        !self.has_children()
            && self.value.is_none()
            && self.data.as_ref().map_or(true, |d| d.is_empty())
    }

    /// True when this node is a later fragment of `previous`.
    pub fn is_continuation_of(&self, previous: &TreeNode) -> bool {
        self.is_part && previous.is_part && self.value == previous.value
    }

    /// Deep-merges a later fragment into this node.
    ///
    /// Sizes are added. A leading incoming child that continues this node's
    /// trailing child is merged recursively, the remaining children are
    /// appended in delivery order.
    pub fn merge_part(&mut self, other: TreeNode) {
        self.size += other.size;
        if self.data.is_none() {
            self.data = other.data;
        }
        if self.level.is_none() {
            self.level = other.level;
        }

        let Some(incoming) = other.children else {
            return;
        };
        let children = self.children.get_or_insert_with(Vec::new);
        let mut incoming = incoming.into_iter();

        // Only the first incoming child can continue the trailing one.
        if let Some(child) = incoming.next() {
            match children.last_mut() {
                Some(last) if child.is_continuation_of(last) => last.merge_part(child),
                _ => children.push(child),
            }
        }
        children.extend(incoming);
    }

    /// Number of last-level rows, computed from the structure rather than `size`.
    pub fn leaf_count(&self) -> usize {
        match &self.children {
            Some(children) if !children.is_empty() => children.iter().map(|c| c.leaf_count()).sum(),
            _ => 1,
        }
    }
}
