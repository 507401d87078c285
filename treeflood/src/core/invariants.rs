//! Structural invariants of an exploration tree.

use std::collections::HashSet;

use crate::tree::{NodeId, Tree};

/// Check the invariants every tree handed to an exploration must satisfy:
/// - Exactly one root, stored at index 0
/// - Parent and child lists agree
/// - Every node reaches the root (connected, acyclic)
pub fn validate_invariants(tree: &Tree) -> Vec<String> {
    let parents: Vec<Option<NodeId>> = tree.nodes().map(|node| tree.parent(node)).collect();
    let mut errors = validate_parent_links(&parents);

    let mut child_total = 0;
    for node in tree.nodes() {
        for (index, child) in tree.children(node).iter().enumerate() {
            child_total += 1;
            if tree.parent(*child) != Some(node) {
                errors.push(format!(
                    "{node}: child {child} at port {} does not point back",
                    index + 1
                ));
            }
        }
    }
    if child_total + 1 != tree.len() {
        errors.push(format!(
            "{} child links for {} nodes",
            child_total,
            tree.len()
        ));
    }
    errors
}

/// Check a parent list (`parents[i]` is the parent of node `i`).
pub fn validate_parent_links(parents: &[Option<NodeId>]) -> Vec<String> {
    let mut errors = Vec::new();
    if parents.is_empty() {
        errors.push("tree has no nodes".to_string());
        return errors;
    }

    let roots: Vec<usize> = parents
        .iter()
        .enumerate()
        .filter(|(_, parent)| parent.is_none())
        .map(|(index, _)| index)
        .collect();
    match roots.as_slice() {
        [0] => {}
        [] => errors.push("tree has no root".to_string()),
        [single] => errors.push(format!("root must be node 0, found node {single}")),
        many => errors.push(format!("multiple roots: {many:?}")),
    }

    for (index, parent) in parents.iter().enumerate() {
        if let Some(parent) = parent {
            if parent.index() >= parents.len() {
                errors.push(format!("{index}: unknown parent {parent}"));
            }
        }
    }
    if !errors.is_empty() {
        return errors;
    }

    for start in 0..parents.len() {
        let mut seen = HashSet::new();
        let mut current = start;
        while let Some(parent) = parents[current] {
            if !seen.insert(current) {
                errors.push(format!("{start}: cycle through node {current}"));
                break;
            }
            current = parent.index();
        }
    }
    errors
}

#[cfg(test)]
mod tests {
    use super::*;

    fn links(raw: &[Option<usize>]) -> Vec<Option<NodeId>> {
        raw.iter().map(|p| p.map(NodeId::from_index)).collect()
    }

    #[test]
    fn built_tree_has_no_violations() {
        let mut tree = Tree::new();
        let a = tree.add_node(tree.root()).expect("a");
        tree.add_node(a).expect("b");
        tree.add_node(tree.root()).expect("c");
        assert!(validate_invariants(&tree).is_empty());
    }

    #[test]
    fn detects_multiple_roots() {
        let errors = validate_parent_links(&links(&[None, Some(0), None]));
        assert_eq!(errors, vec!["multiple roots: [0, 2]".to_string()]);
    }

    #[test]
    fn detects_cycles_detached_from_root() {
        let errors = validate_parent_links(&links(&[None, Some(2), Some(1)]));
        assert_eq!(errors.len(), 2);
        assert!(errors[0].contains("cycle"));
    }

    #[test]
    fn detects_unknown_parent() {
        let errors = validate_parent_links(&links(&[None, Some(5)]));
        assert_eq!(errors, vec!["1: unknown parent 5".to_string()]);
    }
}
