//! Exploration orchestrator.
//!
//! Builds the robots at the start node, registers them with a
//! [`PulseManager`] and advances them one protocol step (three pulses) at a
//! time. Robot failures surface as [`RobotFailedError`]; the exploration is
//! unusable afterwards and answers with [`ExplorationPoisoned`].

use std::fmt;
use std::sync::{Arc, Mutex, TryLockError};

use anyhow::{Result, anyhow, bail};
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::core::types::{RobotId, Round};
use crate::listener::RobotMovedListener;
use crate::pulse::{PulseError, PulseManager};
use crate::robot::{Robot, RobotSnapshot, SharedRobot};
use crate::storage::LocalStorage;
use crate::tree::{NodeId, Tree};

/// A robot returned an error or panicked while executing a stage.
#[derive(Debug)]
pub struct RobotFailedError {
    pub robot_id: RobotId,
    pub source: anyhow::Error,
}

impl fmt::Display for RobotFailedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "robot {} failed", self.robot_id)
    }
}

impl std::error::Error for RobotFailedError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        let cause: &(dyn std::error::Error + 'static) = self.source.as_ref();
        Some(cause)
    }
}

/// Returned by every call after a failed step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExplorationPoisoned;

impl fmt::Display for ExplorationPoisoned {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("exploration aborted by an earlier failure")
    }
}

impl std::error::Error for ExplorationPoisoned {}

/// Robot state still held by workers of an aborted step.
///
/// Returned by queries after a failed step when a stalled robot has not
/// released its state yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RobotsBusy {
    pub robot_ids: Vec<RobotId>,
}

impl fmt::Display for RobotsBusy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ids: Vec<String> = self.robot_ids.iter().map(ToString::to_string).collect();
        write!(f, "robots still busy after an aborted step: {}", ids.join(", "))
    }
}

impl std::error::Error for RobotsBusy {}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExplorationSummary {
    pub nodes: usize,
    pub robots: usize,
    /// Protocol steps executed, `INITIAL` and `NOP` included.
    pub steps: u64,
    /// Highest round reached by any robot.
    pub rounds: Round,
    pub finished: bool,
}

pub struct Exploration {
    tree: Arc<Tree>,
    storage: Arc<LocalStorage>,
    robots: Vec<SharedRobot>,
    pulse_manager: Box<dyn PulseManager>,
    steps_executed: u64,
    finished: bool,
    poisoned: bool,
}

impl Exploration {
    /// Place `robot_count` robots (ids `0..robot_count`) on `start`.
    ///
    /// `start` must be the root of `tree`.
    pub fn new(
        tree: Arc<Tree>,
        start: NodeId,
        robot_count: usize,
        storage: Arc<LocalStorage>,
        mut pulse_manager: Box<dyn PulseManager>,
        moved_listeners: Vec<Arc<dyn RobotMovedListener>>,
    ) -> Result<Self> {
        if robot_count == 0 {
            bail!("robot count must be >= 1");
        }
        if !tree.contains(start) {
            bail!("start node {start} is not part of the tree");
        }
        if !tree.is_root(start) {
            bail!("exploration must start at the root, got node {start}");
        }

        let listeners: Arc<[Arc<dyn RobotMovedListener>]> = moved_listeners.into();
        let robots: Vec<SharedRobot> = (0..robot_count)
            .map(|id| {
                Arc::new(Mutex::new(Robot::new(
                    id,
                    tree.clone(),
                    start,
                    storage.clone(),
                    listeners.clone(),
                )))
            })
            .collect();
        pulse_manager.set_robots(robots.clone())?;
        info!(nodes = tree.len(), robots = robot_count, "exploration ready");

        Ok(Self {
            tree,
            storage,
            robots,
            pulse_manager,
            steps_executed: 0,
            finished: false,
            poisoned: false,
        })
    }

    /// Run the `MOVE`, `WRITE` and `READ` pulses of the current step.
    ///
    /// Returns `true` once every robot stopped.
    #[instrument(skip(self), fields(step = self.steps_executed + 1))]
    pub fn explore_one_step(&mut self) -> Result<bool> {
        if self.poisoned {
            return Err(ExplorationPoisoned.into());
        }
        if self.finished {
            return Ok(true);
        }

        let mut all_stopped = false;
        for _ in 0..3 {
            match self.pulse_manager.pulse() {
                Ok(stopped) => all_stopped = stopped,
                Err(err) => {
                    self.poisoned = true;
                    warn!(error = %err, "exploration step failed");
                    return Err(match err {
                        PulseError::RobotFailed { robot_id, source } => {
                            RobotFailedError { robot_id, source }.into()
                        }
                        other => other.into(),
                    });
                }
            }
        }

        self.steps_executed += 1;
        debug!(all_stopped, "step complete");
        if all_stopped {
            self.finished = true;
            info!(steps = self.steps_executed, "exploration finished");
        }
        Ok(all_stopped)
    }

    /// Step until every robot stopped.
    pub fn explore(&mut self) -> Result<ExplorationSummary> {
        while !self.explore_one_step()? {}
        self.summary()
    }

    pub fn summary(&self) -> Result<ExplorationSummary> {
        let rounds = self
            .robots()?
            .iter()
            .map(|robot| robot.round)
            .max()
            .unwrap_or(0);
        Ok(ExplorationSummary {
            nodes: self.tree.len(),
            robots: self.robots.len(),
            steps: self.steps_executed,
            rounds,
            finished: self.finished,
        })
    }

    /// Snapshot of every robot, in id order.
    ///
    /// After a failed step this never waits on a robot: robots whose state is
    /// still locked by a stalled worker are reported as [`RobotsBusy`].
    pub fn robots(&self) -> Result<Vec<RobotSnapshot>> {
        if self.poisoned {
            return self.robots_without_waiting();
        }
        self.robots
            .iter()
            .map(|robot| {
                robot
                    .lock()
                    .map(|robot| robot.snapshot())
                    .map_err(|_| anyhow!("robot state poisoned"))
            })
            .collect()
    }

    fn robots_without_waiting(&self) -> Result<Vec<RobotSnapshot>> {
        let mut snapshots = Vec::with_capacity(self.robots.len());
        let mut busy = Vec::new();
        for (robot_id, robot) in self.robots.iter().enumerate() {
            match robot.try_lock() {
                Ok(robot) => snapshots.push(robot.snapshot()),
                Err(TryLockError::WouldBlock) => busy.push(robot_id),
                Err(TryLockError::Poisoned(_)) => bail!("robot {robot_id} state poisoned"),
            }
        }
        if !busy.is_empty() {
            return Err(RobotsBusy { robot_ids: busy }.into());
        }
        Ok(snapshots)
    }

    pub fn steps_executed(&self) -> u64 {
        self.steps_executed
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn tree(&self) -> &Arc<Tree> {
        &self.tree
    }

    pub fn storage(&self) -> &Arc<LocalStorage> {
        &self.storage
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    use crate::pulse::{PersistentPulseManager, PooledPulseManager};
    use crate::test_support::{FailingListener, RecordingListener, SlowListener, path_tree};

    fn exploration(
        tree: Tree,
        robots: usize,
        listeners: Vec<Arc<dyn RobotMovedListener>>,
    ) -> Result<Exploration> {
        let tree = Arc::new(tree);
        let root = tree.root();
        Exploration::new(
            tree,
            root,
            robots,
            Arc::new(LocalStorage::new()),
            Box::new(PooledPulseManager::new(None)),
            listeners,
        )
    }

    #[test]
    fn rejects_zero_robots_and_foreign_start() {
        let err = exploration(Tree::new(), 0, Vec::new())
            .err()
            .expect("zero robots");
        assert!(err.to_string().contains("robot count"));

        let tree = Arc::new(path_tree(3));
        let err = Exploration::new(
            tree.clone(),
            NodeId::from_index(2),
            1,
            Arc::new(LocalStorage::new()),
            Box::new(PooledPulseManager::new(None)),
            Vec::new(),
        )
        .err()
        .expect("non-root start");
        assert!(err.to_string().contains("root"));

        let err = Exploration::new(
            tree,
            NodeId::from_index(9),
            1,
            Arc::new(LocalStorage::new()),
            Box::new(PooledPulseManager::new(None)),
            Vec::new(),
        )
        .err()
        .expect("unknown start");
        assert!(err.to_string().contains("not part of the tree"));
    }

    #[test]
    fn single_node_finishes_on_third_step() {
        let mut exploration = exploration(Tree::new(), 1, Vec::new()).expect("exploration");
        assert!(!exploration.explore_one_step().expect("initial"));
        assert!(!exploration.explore_one_step().expect("nop"));
        assert!(exploration.explore_one_step().expect("regular"));
        assert!(exploration.is_finished());
        assert_eq!(exploration.steps_executed(), 3);
    }

    #[test]
    fn path_is_explored_and_robot_returns_home() {
        let recorder = Arc::new(RecordingListener::default());
        let mut exploration =
            exploration(path_tree(3), 1, vec![recorder.clone()]).expect("exploration");

        let summary = exploration.explore().expect("explore");
        assert_eq!(summary.steps, 15);
        assert_eq!(summary.rounds, 5);
        assert!(summary.finished);

        let robots = exploration.robots().expect("robots");
        assert_eq!(robots.len(), 1);
        assert!(robots[0].stopped);
        assert_eq!(robots[0].location, NodeId::ROOT);
        assert_eq!(recorder.moves().len(), 8);
    }

    #[test]
    fn listener_failure_poisons_the_exploration() {
        let failing = Arc::new(FailingListener::on_call(3));
        let mut exploration =
            exploration(path_tree(3), 1, vec![failing.clone()]).expect("exploration");

        let mut completed = 0;
        let err = loop {
            match exploration.explore_one_step() {
                Ok(finished) => {
                    assert!(!finished);
                    completed += 1;
                }
                Err(err) => break err,
            }
        };
        // The third move is the UPDATE report of round 2 (step 7).
        assert_eq!(completed, 6);
        let failed = err.downcast_ref::<RobotFailedError>().expect("robot failure");
        assert_eq!(failed.robot_id, 0);
        assert!(format!("{err:#}").contains("listener failure on call 3"));
        assert_eq!(failing.calls(), 3);

        let again = exploration.explore_one_step().expect_err("poisoned");
        assert!(again.downcast_ref::<ExplorationPoisoned>().is_some());
        assert!(!exploration.is_finished());
    }

    #[test]
    fn queries_after_a_timeout_report_stalled_robots() {
        let slow = Arc::new(SlowListener::new(Duration::from_secs(2)));
        let tree = Arc::new(path_tree(2));
        let mut exploration = Exploration::new(
            tree.clone(),
            tree.root(),
            1,
            Arc::new(LocalStorage::new()),
            Box::new(PersistentPulseManager::new(Some(Duration::from_millis(50)))),
            vec![slow],
        )
        .expect("exploration");

        let err = loop {
            match exploration.explore_one_step() {
                Ok(finished) => assert!(!finished),
                Err(err) => break err,
            }
        };
        assert!(matches!(
            err.downcast_ref::<PulseError>(),
            Some(PulseError::Timeout { .. })
        ));

        let started = Instant::now();
        let busy = exploration.robots().expect_err("robot 0 still walking");
        assert_eq!(
            busy.downcast_ref::<RobotsBusy>(),
            Some(&RobotsBusy { robot_ids: vec![0] })
        );
        let summary_err = exploration.summary().expect_err("summary needs robots");
        assert!(summary_err.downcast_ref::<RobotsBusy>().is_some());
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn queries_after_a_robot_failure_still_answer() {
        let failing = Arc::new(FailingListener::on_call(1));
        let mut exploration = exploration(path_tree(2), 2, vec![failing]).expect("exploration");
        exploration.explore().expect_err("listener failure");

        let robots = exploration.robots().expect("robots released");
        assert_eq!(robots.len(), 2);
        assert!(!exploration.summary().expect("summary").finished);
    }
}
