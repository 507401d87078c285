//! Shared deterministic types for the exploration core.
//!
//! These types define the contract between robots, local storage and knowledge
//! reconstruction. They carry no state beyond their fields and must remain
//! deterministic across runs.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Robot identifier. Robots of one exploration are numbered `0..robot_count`.
pub type RobotId = usize;

/// Global step counter shared by all three stages of one [`Step`].
pub type StepNumber = u64;

/// Round counter. Round `r` consists of the steps `3r`, `3r + 1` and `3r + 2`.
pub type Round = u64;

/// Step number of the `INITIAL` step.
pub const INITIAL_STEP: StepNumber = 1;

/// Step number of the `REGULAR` step of `round`.
pub fn regular_step(round: Round) -> StepNumber {
    3 * round
}

/// Step number of the `UPDATE` step of `round`.
pub fn update_step(round: Round) -> StepNumber {
    3 * round + 1
}

/// Port recorded in an [`Information`], seen from the node it is written to.
///
/// `Child(p)` means the robot entered through the edge to child `p`, `Parent`
/// that it came down from the parent and `Star` marks the initial placement.
/// `Stayed` is never persisted: a write is skipped when the robot did not move.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Port {
    Child(usize),
    Parent,
    Star,
    Stayed,
}

impl Port {
    pub const PARENT_RAW: i64 = -2;
    pub const STAR_RAW: i64 = -1;
    pub const STAYED_RAW: i64 = -3;

    /// Integer encoding: child ports are `>= 1`, sentinels are negative.
    pub fn raw(self) -> i64 {
        match self {
            Self::Child(port) => port as i64,
            Self::Parent => Self::PARENT_RAW,
            Self::Star => Self::STAR_RAW,
            Self::Stayed => Self::STAYED_RAW,
        }
    }

    pub fn child_port(self) -> Option<usize> {
        match self {
            Self::Child(port) => Some(port),
            _ => None,
        }
    }
}

impl fmt::Display for Port {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Child(port) => write!(f, "{port}"),
            Self::Parent => f.write_str("parent"),
            Self::Star => f.write_str("*"),
            Self::Stayed => f.write_str("stayed"),
        }
    }
}

/// Immutable record written once per `(node, step, robot)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Information {
    pub step: StepNumber,
    pub robot_id: RobotId,
    pub port: Port,
}

impl Information {
    pub fn new(step: StepNumber, robot_id: RobotId, port: Port) -> Self {
        Self {
            step,
            robot_id,
            port,
        }
    }
}

/// Phase of the robot protocol. Advances once per completed `Read` stage.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Step {
    Initial,
    Nop,
    Regular,
    Update,
    Return,
}

impl Step {
    /// Following step and whether the transition starts a new round.
    pub fn next(self) -> (Step, bool) {
        match self {
            Self::Initial => (Self::Nop, false),
            Self::Nop => (Self::Regular, true),
            Self::Regular => (Self::Update, false),
            Self::Update => (Self::Return, false),
            Self::Return => (Self::Regular, true),
        }
    }
}

/// Sub-phase of a [`Step`]; one stage is executed per pulse.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Move,
    Write,
    Read,
}

impl Stage {
    /// Following stage and whether the step wrapped around.
    pub fn next(self) -> (Stage, bool) {
        match self {
            Self::Move => (Self::Write, false),
            Self::Write => (Self::Read, false),
            Self::Read => (Self::Move, true),
        }
    }
}

/// Movement decision of a robot for one `REGULAR` step.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Action {
    /// The root is fully finished; the robot halts.
    Stop,
    Stay,
    Parent,
    Child(usize),
}
