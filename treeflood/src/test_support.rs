//! Test-only helpers for building trees and observing explorations.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Result, bail};

use crate::core::types::RobotId;
use crate::listener::{ExploreEdgeListener, RobotMovedListener};
use crate::robot::{Robot, SharedRobot};
use crate::storage::LocalStorage;
use crate::tree::{NodeId, Tree};

/// Create a path `0 - 1 - ... - (len - 1)` rooted at node 0.
pub fn path_tree(len: usize) -> Tree {
    let mut tree = Tree::with_capacity(len);
    let mut last = tree.root();
    for _ in 1..len {
        last = tree.add_node(last).expect("path node");
    }
    tree
}

/// Create a root with `children` leaf children.
pub fn star_tree(children: usize) -> Tree {
    let mut tree = Tree::with_capacity(children + 1);
    for _ in 0..children {
        tree.add_node(tree.root()).expect("star leaf");
    }
    tree
}

/// Create `count` robots at the root of `tree` sharing one fresh storage.
pub fn shared_robots(
    tree: Tree,
    count: usize,
    listeners: Vec<Arc<dyn RobotMovedListener>>,
) -> Vec<SharedRobot> {
    let tree = Arc::new(tree);
    let storage = Arc::new(LocalStorage::new());
    let listeners: Arc<[Arc<dyn RobotMovedListener>]> = listeners.into();
    (0..count)
        .map(|id| {
            Arc::new(Mutex::new(Robot::new(
                id,
                tree.clone(),
                tree.root(),
                storage.clone(),
                listeners.clone(),
            )))
        })
        .collect()
}

/// Records every `moved_to` call in arrival order.
#[derive(Default)]
pub struct RecordingListener {
    moves: Mutex<Vec<(RobotId, NodeId, NodeId)>>,
}

impl RecordingListener {
    pub fn moves(&self) -> Vec<(RobotId, NodeId, NodeId)> {
        self.moves.lock().expect("moves lock").clone()
    }
}

impl RobotMovedListener for RecordingListener {
    fn moved_to(&self, robot_id: RobotId, source: NodeId, destination: NodeId) -> Result<()> {
        self.moves
            .lock()
            .expect("moves lock")
            .push((robot_id, source, destination));
        Ok(())
    }
}

/// Fails on its `n`-th `moved_to` call (1-based) and succeeds otherwise.
pub struct FailingListener {
    fail_on: usize,
    calls: AtomicUsize,
}

impl FailingListener {
    pub fn on_call(fail_on: usize) -> Self {
        Self {
            fail_on,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl RobotMovedListener for FailingListener {
    fn moved_to(&self, robot_id: RobotId, source: NodeId, destination: NodeId) -> Result<()> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if call == self.fail_on {
            bail!("listener failure on call {call}: robot {robot_id} moved {source} -> {destination}");
        }
        Ok(())
    }
}

/// Sleeps on every `moved_to` call to stall the pulse that triggered it.
pub struct SlowListener {
    delay: Duration,
}

impl SlowListener {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

impl RobotMovedListener for SlowListener {
    fn moved_to(&self, _robot_id: RobotId, _source: NodeId, _destination: NodeId) -> Result<()> {
        std::thread::sleep(self.delay);
        Ok(())
    }
}

/// Collects explored edges in report order.
#[derive(Default)]
pub struct EdgeCounter {
    edges: Mutex<Vec<(NodeId, NodeId)>>,
}

impl EdgeCounter {
    pub fn edges(&self) -> Vec<(NodeId, NodeId)> {
        self.edges.lock().expect("edges lock").clone()
    }
}

impl ExploreEdgeListener for EdgeCounter {
    fn explored_edge(&self, parent: NodeId, child: NodeId) -> Result<()> {
        self.edges
            .lock()
            .expect("edges lock")
            .push((parent, child));
        Ok(())
    }
}
