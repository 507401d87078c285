use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::{Result, anyhow};
use tracing::trace;

use crate::core::path::node_path;
use crate::core::types::RobotId;
use crate::listener::{ExploreEdgeListener, RobotMovedListener};
use crate::tree::{NodeId, Tree};

/// Mirrors first-traversed edges into a fresh tree.
///
/// Moves towards the parent are discarded and repeated `(source, destination)`
/// pairs are ignored, so every explored edge is reported exactly once to the
/// registered [`ExploreEdgeListener`]s.
pub struct ExplorationTreeBuilder {
    original: Arc<Tree>,
    state: Mutex<BuilderState>,
    edge_listeners: Vec<Arc<dyn ExploreEdgeListener>>,
}

struct BuilderState {
    explored: Tree,
    /// Original node -> node of the explored tree.
    alias: BTreeMap<NodeId, NodeId>,
    edges: BTreeSet<(NodeId, NodeId)>,
}

impl ExplorationTreeBuilder {
    /// Start with the original root already mapped to the explored root.
    pub fn new(original: Arc<Tree>, edge_listeners: Vec<Arc<dyn ExploreEdgeListener>>) -> Self {
        let explored = Tree::new();
        let alias = BTreeMap::from([(original.root(), explored.root())]);
        Self {
            original,
            state: Mutex::new(BuilderState {
                explored,
                alias,
                edges: BTreeSet::new(),
            }),
            edge_listeners,
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, BuilderState>> {
        self.state
            .lock()
            .map_err(|_| anyhow!("exploration tree builder lock poisoned"))
    }

    /// Copy of the explored tree built so far.
    pub fn explored_tree(&self) -> Result<Tree> {
        Ok(self.lock()?.explored.clone())
    }

    /// Original node -> explored node mapping for every discovered node.
    pub fn node_alias(&self) -> Result<BTreeMap<NodeId, NodeId>> {
        Ok(self.lock()?.alias.clone())
    }

    /// Explored edges as `(parent, child)` pairs of the original tree.
    pub fn explored_edges(&self) -> Result<Vec<(NodeId, NodeId)>> {
        Ok(self.lock()?.edges.iter().copied().collect())
    }

    pub fn edge_count(&self) -> Result<usize> {
        Ok(self.lock()?.edges.len())
    }
}

impl RobotMovedListener for ExplorationTreeBuilder {
    fn moved_to(&self, robot_id: RobotId, source: NodeId, destination: NodeId) -> Result<()> {
        if self.original.parent(source) == Some(destination) {
            return Ok(());
        }

        {
            let mut state = self.lock()?;
            if !state.edges.insert((source, destination)) {
                return Ok(());
            }
            let parent = *state
                .alias
                .get(&source)
                .ok_or_else(|| anyhow!("robot {robot_id} left undiscovered node {source}"))?;
            let child = state.explored.add_node(parent)?;
            state.alias.insert(destination, child);
            trace!(
                robot_id,
                %source,
                %destination,
                path = node_path(&self.original, destination).as_deref().unwrap_or("?"),
                "first traversal"
            );
        }

        for listener in &self.edge_listeners {
            listener.explored_edge(source, destination)?;
        }
        Ok(())
    }
}
