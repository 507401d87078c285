//! Helpers for rendering deterministic node paths.

use crate::tree::{NodeId, Tree};

/// Return the `/`-separated id path from the root to `node`.
pub fn node_path(tree: &Tree, node: NodeId) -> Option<String> {
    if !tree.contains(node) {
        return None;
    }
    let mut path = vec![node];
    let mut current = node;
    while let Some(parent) = tree.parent(current) {
        path.push(parent);
        current = parent;
    }
    let ids: Vec<String> = path.iter().rev().map(ToString::to_string).collect();
    Some(ids.join("/"))
}
