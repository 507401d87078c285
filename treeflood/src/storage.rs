//! Per-node append-only message boards shared by all robots.
//!
//! Every node owns a log `step -> robot_id -> Information`. A robot only ever
//! reads the log of the node it occupies and writes at most one entry per step.
//! The logs live in a [`DashMap`] so robots writing to different nodes never
//! contend, and writers of one node serialize on that node's shard only.

use std::collections::BTreeMap;
use std::fmt;

use dashmap::DashMap;

use crate::core::types::{Information, RobotId, StepNumber};
use crate::tree::NodeId;

/// Full view of one node's local storage.
pub type NodeLog = BTreeMap<StepNumber, BTreeMap<RobotId, Information>>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// The `(node, step, robot)` cell already holds an entry.
    DuplicateWrite {
        node: NodeId,
        step: StepNumber,
        robot_id: RobotId,
    },
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DuplicateWrite {
                node,
                step,
                robot_id,
            } => write!(
                f,
                "robot {robot_id} already wrote step {step} on node {node}"
            ),
        }
    }
}

impl std::error::Error for StorageError {}

#[derive(Debug, Default)]
pub struct LocalStorage {
    logs: DashMap<NodeId, NodeLog>,
}

impl LocalStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Owned snapshot of everything written on `node` so far.
    pub fn read(&self, node: NodeId) -> NodeLog {
        self.logs
            .get(&node)
            .map(|log| log.value().clone())
            .unwrap_or_default()
    }

    /// Append `info` to the log of `node`. Each cell is written at most once.
    pub fn write(&self, info: Information, node: NodeId) -> Result<(), StorageError> {
        let mut log = self.logs.entry(node).or_default();
        let step = log.entry(info.step).or_default();
        if step.contains_key(&info.robot_id) {
            return Err(StorageError::DuplicateWrite {
                node,
                step: info.step,
                robot_id: info.robot_id,
            });
        }
        step.insert(info.robot_id, info);
        Ok(())
    }

    /// Entries written on `node` during `step`, in robot id order.
    pub fn entries(&self, node: NodeId, step: StepNumber) -> Vec<Information> {
        self.logs
            .get(&node)
            .and_then(|log| log.get(&step).map(|entries| entries.values().copied().collect()))
            .unwrap_or_default()
    }

    /// Nodes that received at least one write.
    pub fn written_nodes(&self) -> Vec<NodeId> {
        let mut nodes: Vec<NodeId> = self.logs.iter().map(|entry| *entry.key()).collect();
        nodes.sort();
        nodes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::Port;

    #[test]
    fn read_of_untouched_node_is_empty() {
        let storage = LocalStorage::new();
        assert!(storage.read(NodeId::ROOT).is_empty());
        assert!(storage.entries(NodeId::ROOT, 1).is_empty());
    }

    #[test]
    fn write_then_read_returns_snapshot() {
        let storage = LocalStorage::new();
        let node = NodeId::from_index(3);
        storage
            .write(Information::new(6, 1, Port::Parent), node)
            .expect("write");
        storage
            .write(Information::new(6, 0, Port::Parent), node)
            .expect("write");

        let snapshot = storage.read(node);
        storage
            .write(Information::new(7, 0, Port::Child(2)), node)
            .expect("write");

        assert_eq!(snapshot.len(), 1);
        let ids: Vec<RobotId> = snapshot[&6].keys().copied().collect();
        assert_eq!(ids, vec![0, 1]);
        assert_eq!(storage.read(node).len(), 2);
        assert_eq!(
            storage.entries(node, 7),
            vec![Information::new(7, 0, Port::Child(2))]
        );
        assert_eq!(storage.written_nodes(), vec![node]);
    }

    #[test]
    fn duplicate_cell_is_rejected() {
        let storage = LocalStorage::new();
        storage
            .write(Information::new(1, 0, Port::Star), NodeId::ROOT)
            .expect("first write");
        let err = storage
            .write(Information::new(1, 0, Port::Parent), NodeId::ROOT)
            .expect_err("second write");
        assert_eq!(
            err,
            StorageError::DuplicateWrite {
                node: NodeId::ROOT,
                step: 1,
                robot_id: 0,
            }
        );
        assert_eq!(storage.entries(NodeId::ROOT, 1)[0].port, Port::Star);
    }

    #[test]
    fn concurrent_writers_on_one_node_all_land() {
        let storage = LocalStorage::new();
        std::thread::scope(|scope| {
            for robot_id in 0..16 {
                let storage = &storage;
                scope.spawn(move || {
                    storage
                        .write(Information::new(3, robot_id, Port::Parent), NodeId::ROOT)
                        .expect("write");
                });
            }
        });
        assert_eq!(storage.entries(NodeId::ROOT, 3).len(), 16);
    }
}
