//! Hierarchical text rendering of trees.
//!
//! ```text
//! 0 [r0, r1]
//! ├── 1
//! │   └── 3 [r2]
//! └── 2
//! ```

use std::collections::BTreeMap;

use crate::core::types::RobotId;
use crate::robot::RobotSnapshot;
use crate::tree::{NodeId, Tree};

/// Produces the label printed for one node.
pub trait NodeDecorator {
    fn describe(&self, node: NodeId) -> String;
}

/// Prints the bare node id.
pub struct PlainDecorator;

impl NodeDecorator for PlainDecorator {
    fn describe(&self, node: NodeId) -> String {
        node.to_string()
    }
}

/// Appends the ids of the robots standing on each node.
pub struct RobotLocationDecorator {
    robots_by_node: BTreeMap<NodeId, Vec<RobotId>>,
}

impl RobotLocationDecorator {
    pub fn new(robots: &[RobotSnapshot]) -> Self {
        Self::with_alias(robots, None)
    }

    /// Place robots through `alias` (original node -> rendered node), used when
    /// rendering an explored tree. Robots on unmapped nodes are left out.
    pub fn with_alias(robots: &[RobotSnapshot], alias: Option<&BTreeMap<NodeId, NodeId>>) -> Self {
        let mut robots_by_node: BTreeMap<NodeId, Vec<RobotId>> = BTreeMap::new();
        for robot in robots {
            let node = match alias {
                Some(alias) => match alias.get(&robot.location) {
                    Some(node) => *node,
                    None => continue,
                },
                None => robot.location,
            };
            robots_by_node.entry(node).or_default().push(robot.id);
        }
        for ids in robots_by_node.values_mut() {
            ids.sort_unstable();
        }
        Self { robots_by_node }
    }
}

impl NodeDecorator for RobotLocationDecorator {
    fn describe(&self, node: NodeId) -> String {
        match self.robots_by_node.get(&node) {
            Some(ids) => {
                let ids: Vec<String> = ids.iter().map(|id| format!("r{id}")).collect();
                format!("{node} [{}]", ids.join(", "))
            }
            None => node.to_string(),
        }
    }
}

/// Render `tree` with one line per node, children in port order.
pub fn render_hierarchical(tree: &Tree, decorator: &dyn NodeDecorator) -> String {
    let mut out = String::new();
    out.push_str(&decorator.describe(tree.root()));
    out.push('\n');
    // Explicit stack keeps deep path-like trees off the call stack.
    let mut stack: Vec<(NodeId, String, bool)> = children_frames(tree, tree.root(), "");
    while let Some((node, prefix, last)) = stack.pop() {
        out.push_str(&prefix);
        out.push_str(if last { "└── " } else { "├── " });
        out.push_str(&decorator.describe(node));
        out.push('\n');
        let child_prefix = format!("{prefix}{}", if last { "    " } else { "│   " });
        stack.extend(children_frames(tree, node, &child_prefix));
    }
    out
}

/// Frames for the children of `node`, reversed so the first child pops first.
fn children_frames(tree: &Tree, node: NodeId, prefix: &str) -> Vec<(NodeId, String, bool)> {
    let children = tree.children(node);
    children
        .iter()
        .enumerate()
        .rev()
        .map(|(index, child)| (*child, prefix.to_string(), index + 1 == children.len()))
        .collect()
}
