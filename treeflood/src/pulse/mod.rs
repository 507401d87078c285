//! Barrier-synchronized execution of robot stages.
//!
//! One pulse runs exactly one stage on every robot and returns only after all
//! robots finished it. Two managers implement the same contract:
//!
//! - [`PooledPulseManager`]: a rayon pool, one scoped task per robot per pulse.
//! - [`PersistentPulseManager`]: one long-lived thread per robot driven by a
//!   go/done channel handshake.
//!
//! The first failure of a pulse (lowest robot id) is returned after the
//! barrier and poisons the manager.

mod persistent;
mod pooled;

pub use persistent::PersistentPulseManager;
pub use pooled::PooledPulseManager;

use std::any::Any;
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::time::Duration;

use anyhow::anyhow;
use serde::{Deserialize, Serialize};

use crate::core::types::RobotId;
use crate::robot::SharedRobot;

#[derive(Debug)]
pub enum PulseError {
    /// A robot returned an error or panicked during its stage.
    RobotFailed {
        robot_id: RobotId,
        source: anyhow::Error,
    },
    /// The barrier did not complete within the configured per-pulse timeout.
    Timeout { waited: Duration },
    NotInitialized,
    /// A previous pulse failed; the manager refuses further pulses.
    Poisoned,
    /// Worker threads could not be started or disappeared.
    Workers(String),
}

impl fmt::Display for PulseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RobotFailed { robot_id, source } => {
                write!(f, "robot {robot_id} failed: {source:#}")
            }
            Self::Timeout { waited } => {
                write!(f, "pulse did not complete after {} ms", waited.as_millis())
            }
            Self::NotInitialized => f.write_str("pulse manager has no robots"),
            Self::Poisoned => f.write_str("pulse manager poisoned by an earlier failure"),
            Self::Workers(reason) => write!(f, "pulse workers unavailable: {reason}"),
        }
    }
}

impl std::error::Error for PulseError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::RobotFailed { source, .. } => {
                let cause: &(dyn std::error::Error + 'static) = source.as_ref();
                Some(cause)
            }
            _ => None,
        }
    }
}

/// Drives the stages of a fixed set of robots.
pub trait PulseManager: Send {
    /// Register the robots. Only the first call has an effect.
    fn set_robots(&mut self, robots: Vec<SharedRobot>) -> Result<(), PulseError>;

    /// Run one stage on every robot. Returns `true` when all robots stopped.
    fn pulse(&mut self) -> Result<bool, PulseError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum PulseStrategy {
    /// Shared rayon pool. A pulse timeout is only detected after the slowest
    /// robot returned, so it cannot rescue a robot that never does.
    Pooled,
    /// One thread per robot. A pulse timeout stops waiting for stalled robots.
    #[default]
    Persistent,
}

impl fmt::Display for PulseStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pooled => f.write_str("pooled"),
            Self::Persistent => f.write_str("persistent"),
        }
    }
}

pub fn build_pulse_manager(
    strategy: PulseStrategy,
    timeout: Option<Duration>,
) -> Box<dyn PulseManager> {
    match strategy {
        PulseStrategy::Pooled => Box::new(PooledPulseManager::new(timeout)),
        PulseStrategy::Persistent => Box::new(PersistentPulseManager::new(timeout)),
    }
}

/// Ids of `robots`, in registration order.
fn robot_ids(robots: &[SharedRobot]) -> Result<Vec<RobotId>, PulseError> {
    robots
        .iter()
        .map(|robot| {
            robot
                .lock()
                .map(|robot| robot.id())
                .map_err(|_| PulseError::Poisoned)
        })
        .collect()
}

/// Run one stage of `robot`, turning errors and panics into a robot failure.
fn run_robot_pulse(robot: &SharedRobot, robot_id: RobotId) -> Result<bool, PulseError> {
    let outcome = catch_unwind(AssertUnwindSafe(|| {
        let mut robot = robot
            .lock()
            .map_err(|_| anyhow!("robot {robot_id} state poisoned"))?;
        robot.pulse()
    }));
    match outcome {
        Ok(Ok(stopped)) => Ok(stopped),
        Ok(Err(source)) => Err(PulseError::RobotFailed { robot_id, source }),
        Err(payload) => Err(PulseError::RobotFailed {
            robot_id,
            source: anyhow!("robot panicked: {}", panic_message(payload.as_ref())),
        }),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        return (*message).to_string();
    }
    if let Some(message) = payload.downcast_ref::<String>() {
        return message.clone();
    }
    "non-string panic payload".to_string()
}
