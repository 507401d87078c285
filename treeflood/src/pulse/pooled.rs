use std::num::NonZeroUsize;
use std::thread;
use std::time::{Duration, Instant};

use rayon::{ThreadPool, ThreadPoolBuilder};
use tracing::{debug, warn};

use crate::core::types::RobotId;
use crate::pulse::{PulseError, PulseManager, robot_ids, run_robot_pulse};
use crate::robot::SharedRobot;

/// Runs every pulse as one rayon scope with a task per robot.
///
/// The scope joins all tasks before returning, which is the barrier. The pool
/// has at most one thread per core; robot stages never wait on each other, so
/// fewer threads than robots only serialize the work.
///
/// A rayon scope cannot be abandoned, so the timeout is checked once the
/// barrier completed: a slow pulse is reported, a robot that never returns
/// blocks `pulse` forever.
pub struct PooledPulseManager {
    pool: Option<ThreadPool>,
    robots: Vec<(RobotId, SharedRobot)>,
    timeout: Option<Duration>,
    poisoned: bool,
}

impl PooledPulseManager {
    pub fn new(timeout: Option<Duration>) -> Self {
        Self {
            pool: None,
            robots: Vec::new(),
            timeout,
            poisoned: false,
        }
    }
}

impl PulseManager for PooledPulseManager {
    fn set_robots(&mut self, robots: Vec<SharedRobot>) -> Result<(), PulseError> {
        if self.pool.is_some() {
            warn!("robots already registered; ignoring set_robots");
            return Ok(());
        }
        let ids = robot_ids(&robots)?;
        let cores = thread::available_parallelism().map_or(1, NonZeroUsize::get);
        let threads = robots.len().clamp(1, cores);
        let pool = ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|index| format!("pulse-pool-{index}"))
            .build()
            .map_err(|err| PulseError::Workers(err.to_string()))?;
        debug!(robots = robots.len(), threads, "pooled pulse manager ready");
        self.robots = ids.into_iter().zip(robots).collect();
        self.pool = Some(pool);
        Ok(())
    }

    fn pulse(&mut self) -> Result<bool, PulseError> {
        if self.poisoned {
            return Err(PulseError::Poisoned);
        }
        let Some(pool) = self.pool.as_ref() else {
            return Err(PulseError::NotInitialized);
        };

        let started = Instant::now();
        let mut results: Vec<Result<bool, PulseError>> =
            self.robots.iter().map(|_| Ok(false)).collect();
        pool.scope(|scope| {
            for ((robot_id, robot), slot) in self.robots.iter().zip(results.iter_mut()) {
                scope.spawn(move |_| *slot = run_robot_pulse(robot, *robot_id));
            }
        });
        let waited = started.elapsed();

        let mut all_stopped = true;
        let mut failure = None;
        for result in results {
            match result {
                Ok(stopped) => all_stopped &= stopped,
                Err(err) => {
                    if failure.is_none() {
                        failure = Some(err);
                    }
                }
            }
        }
        if let Some(err) = failure {
            self.poisoned = true;
            warn!(error = %err, "pulse failed; pooled manager poisoned");
            return Err(err);
        }
        if let Some(limit) = self.timeout {
            if waited > limit {
                self.poisoned = true;
                warn!(waited_ms = waited.as_millis() as u64, "pulse exceeded timeout");
                return Err(PulseError::Timeout { waited });
            }
        }
        Ok(all_stopped)
    }
}
