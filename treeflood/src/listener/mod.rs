//! Callback surface of an exploration.
//!
//! Listeners are invoked synchronously on the worker thread of the robot that
//! moved, so several robots may call the same listener concurrently.
//! Implementations must synchronize internally. An error returned from a
//! listener fails the calling robot's pulse.

mod tree_builder;

pub use tree_builder::ExplorationTreeBuilder;

use anyhow::Result;

use crate::core::types::RobotId;
use crate::tree::NodeId;

/// Notified once per physical move of a robot.
pub trait RobotMovedListener: Send + Sync {
    fn moved_to(&self, robot_id: RobotId, source: NodeId, destination: NodeId) -> Result<()>;
}

/// Notified once per tree edge, on its first downward traversal.
pub trait ExploreEdgeListener: Send + Sync {
    fn explored_edge(&self, parent: NodeId, child: NodeId) -> Result<()>;
}
