//! Rooted tree arena explored by the robots.
//!
//! Nodes live in a flat `Vec` and are addressed by [`NodeId`]. Parent links are
//! optional indices and children are ordered index lists, so node handles can be
//! shared across robot threads without aliasing. A child's *port* is its
//! 1-based position in the parent's child list.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Index of a node inside a [`Tree`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(usize);

impl NodeId {
    /// The root of every tree.
    pub const ROOT: NodeId = NodeId(0);

    pub fn from_index(index: usize) -> Self {
        Self(index)
    }

    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Invalid arguments passed to tree construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TreeError {
    UnknownNode(NodeId),
}

impl fmt::Display for TreeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownNode(node) => write!(f, "node {node} is not part of the tree"),
        }
    }
}

impl std::error::Error for TreeError {}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
struct NodeData {
    parent: Option<NodeId>,
    /// Port of this node on its parent; 0 for the root.
    port: usize,
    children: Vec<NodeId>,
}

/// Append-only rooted tree. Node `0` is the root.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Tree {
    nodes: Vec<NodeData>,
}

impl Default for Tree {
    fn default() -> Self {
        Self::new()
    }
}

impl Tree {
    /// Create a tree consisting of a single root node.
    pub fn new() -> Self {
        Self {
            nodes: vec![NodeData::default()],
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let mut nodes = Vec::with_capacity(capacity.max(1));
        nodes.push(NodeData::default());
        Self { nodes }
    }

    pub fn root(&self) -> NodeId {
        NodeId::ROOT
    }

    /// Append a new node as the next child of `parent`.
    ///
    /// The new node's port is the parent's new child count.
    pub fn add_node(&mut self, parent: NodeId) -> Result<NodeId, TreeError> {
        if !self.contains(parent) {
            return Err(TreeError::UnknownNode(parent));
        }
        let child = NodeId(self.nodes.len());
        let port = self.nodes[parent.0].children.len() + 1;
        self.nodes.push(NodeData {
            parent: Some(parent),
            port,
            children: Vec::new(),
        });
        self.nodes[parent.0].children.push(child);
        Ok(child)
    }

    pub fn contains(&self, node: NodeId) -> bool {
        node.0 < self.nodes.len()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Always false: a tree has at least its root.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// All node ids in creation order.
    pub fn nodes(&self) -> impl Iterator<Item = NodeId> + '_ {
        (0..self.nodes.len()).map(NodeId)
    }

    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.nodes.get(node.0).and_then(|data| data.parent)
    }

    /// Child reached through `port` (1-based).
    pub fn child(&self, node: NodeId, port: usize) -> Option<NodeId> {
        let data = self.nodes.get(node.0)?;
        port.checked_sub(1)
            .and_then(|index| data.children.get(index))
            .copied()
    }

    pub fn children(&self, node: NodeId) -> &[NodeId] {
        self.nodes
            .get(node.0)
            .map(|data| data.children.as_slice())
            .unwrap_or(&[])
    }

    pub fn child_count(&self, node: NodeId) -> usize {
        self.children(node).len()
    }

    /// Port under which `node` is reachable from its parent.
    pub fn port_of(&self, node: NodeId) -> Option<usize> {
        let data = self.nodes.get(node.0)?;
        data.parent.map(|_| data.port)
    }

    pub fn is_root(&self, node: NodeId) -> bool {
        self.contains(node) && self.nodes[node.0].parent.is_none()
    }

    pub fn is_leaf(&self, node: NodeId) -> bool {
        self.contains(node) && self.nodes[node.0].children.is_empty()
    }

    /// Number of edges between `node` and the root.
    pub fn depth(&self, node: NodeId) -> usize {
        let mut depth = 0;
        let mut current = node;
        while let Some(parent) = self.parent(current) {
            depth += 1;
            current = parent;
        }
        depth
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_node_assigns_ports_in_insertion_order() {
        let mut tree = Tree::new();
        let a = tree.add_node(tree.root()).expect("a");
        let b = tree.add_node(tree.root()).expect("b");
        let c = tree.add_node(a).expect("c");

        assert_eq!(tree.len(), 4);
        assert_eq!(tree.child(tree.root(), 1), Some(a));
        assert_eq!(tree.child(tree.root(), 2), Some(b));
        assert_eq!(tree.child(tree.root(), 3), None);
        assert_eq!(tree.child(tree.root(), 0), None);
        assert_eq!(tree.port_of(b), Some(2));
        assert_eq!(tree.port_of(c), Some(1));
        assert_eq!(tree.parent(c), Some(a));
        assert_eq!(tree.depth(c), 2);
    }

    #[test]
    fn ports_of_a_wide_star_match_child_positions() {
        let mut tree = Tree::new();
        let leaves: Vec<NodeId> = (0..50)
            .map(|_| tree.add_node(tree.root()).expect("leaf"))
            .collect();
        let grandchild = tree.add_node(leaves[49]).expect("grandchild");

        for (index, leaf) in leaves.iter().enumerate() {
            assert_eq!(tree.port_of(*leaf), Some(index + 1));
            assert_eq!(tree.child(tree.root(), index + 1), Some(*leaf));
        }
        assert_eq!(tree.port_of(grandchild), Some(1));
        assert_eq!(tree.port_of(NodeId::from_index(999)), None);
    }

    #[test]
    fn add_node_rejects_unknown_parent() {
        let mut tree = Tree::new();
        let err = tree
            .add_node(NodeId::from_index(7))
            .expect_err("unknown parent");
        assert_eq!(err, TreeError::UnknownNode(NodeId::from_index(7)));
        assert_eq!(tree.len(), 1);
    }

    #[test]
    fn root_and_leaf_queries() {
        let mut tree = Tree::new();
        assert!(tree.is_root(tree.root()));
        assert!(tree.is_leaf(tree.root()));

        let child = tree.add_node(tree.root()).expect("child");
        assert!(!tree.is_leaf(tree.root()));
        assert!(!tree.is_root(child));
        assert!(tree.is_leaf(child));
        assert_eq!(tree.port_of(tree.root()), None);
        assert!(!tree.is_root(NodeId::from_index(42)));
    }
}
