use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::core::types::RobotId;
use crate::pulse::{PulseError, PulseManager, robot_ids, run_robot_pulse};
use crate::robot::SharedRobot;

/// Keeps one thread per robot alive for the whole exploration.
///
/// Each pulse sends a "go" token to every running worker and waits for one
/// report per token on the shared "done" channel. A worker exits after its
/// robot reported stopped; the manager skips it from then on.
pub struct PersistentPulseManager {
    workers: Vec<Worker>,
    done_rx: Option<Receiver<WorkerReport>>,
    timeout: Option<Duration>,
    poisoned: bool,
    timed_out: bool,
}

struct Worker {
    robot_id: RobotId,
    go: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
    stopped: bool,
}

struct WorkerReport {
    index: usize,
    result: Result<bool, PulseError>,
}

impl PersistentPulseManager {
    pub fn new(timeout: Option<Duration>) -> Self {
        Self {
            workers: Vec::new(),
            done_rx: None,
            timeout,
            poisoned: false,
            timed_out: false,
        }
    }

    fn spawn_worker(
        index: usize,
        robot_id: RobotId,
        robot: SharedRobot,
        done_tx: Sender<WorkerReport>,
    ) -> Result<Worker, PulseError> {
        let (go_tx, go_rx) = mpsc::channel::<()>();
        let handle = thread::Builder::new()
            .name(format!("robot-{robot_id}"))
            .spawn(move || {
                while go_rx.recv().is_ok() {
                    let result = run_robot_pulse(&robot, robot_id);
                    let stopped = matches!(result, Ok(true));
                    if done_tx.send(WorkerReport { index, result }).is_err() || stopped {
                        break;
                    }
                }
            })
            .map_err(|err| PulseError::Workers(format!("spawn robot {robot_id}: {err}")))?;
        Ok(Worker {
            robot_id,
            go: Some(go_tx),
            handle: Some(handle),
            stopped: false,
        })
    }

    fn fail(&mut self, err: PulseError) -> PulseError {
        self.poisoned = true;
        warn!(error = %err, "pulse failed; persistent manager poisoned");
        err
    }
}

impl PulseManager for PersistentPulseManager {
    fn set_robots(&mut self, robots: Vec<SharedRobot>) -> Result<(), PulseError> {
        if self.done_rx.is_some() {
            warn!("robots already registered; ignoring set_robots");
            return Ok(());
        }
        let ids = robot_ids(&robots)?;
        let (done_tx, done_rx) = mpsc::channel();
        for (index, (robot_id, robot)) in ids.into_iter().zip(robots).enumerate() {
            let worker = Self::spawn_worker(index, robot_id, robot, done_tx.clone())?;
            self.workers.push(worker);
        }
        debug!(workers = self.workers.len(), "persistent pulse manager ready");
        self.done_rx = Some(done_rx);
        Ok(())
    }

    fn pulse(&mut self) -> Result<bool, PulseError> {
        if self.poisoned {
            return Err(PulseError::Poisoned);
        }
        if self.done_rx.is_none() {
            return Err(PulseError::NotInitialized);
        }

        let started = Instant::now();
        let mut results: Vec<Option<Result<bool, PulseError>>> = self
            .workers
            .iter()
            .map(|worker| worker.stopped.then_some(Ok(true)))
            .collect();

        let mut expected = 0;
        for (worker, slot) in self.workers.iter().zip(results.iter_mut()) {
            if worker.stopped {
                continue;
            }
            let sent = worker.go.as_ref().is_some_and(|go| go.send(()).is_ok());
            if sent {
                expected += 1;
            } else {
                *slot = Some(Err(PulseError::Workers(format!(
                    "worker of robot {} exited",
                    worker.robot_id
                ))));
            }
        }

        for _ in 0..expected {
            let Some(done_rx) = self.done_rx.as_ref() else {
                return Err(PulseError::NotInitialized);
            };
            let received = match self.timeout {
                Some(limit) => {
                    let remaining = limit.saturating_sub(started.elapsed());
                    done_rx.recv_timeout(remaining)
                }
                None => done_rx.recv().map_err(|_| RecvTimeoutError::Disconnected),
            };
            match received {
                Ok(report) => results[report.index] = Some(report.result),
                Err(RecvTimeoutError::Timeout) => {
                    self.timed_out = true;
                    let waited = started.elapsed();
                    return Err(self.fail(PulseError::Timeout { waited }));
                }
                Err(RecvTimeoutError::Disconnected) => {
                    let err = PulseError::Workers("all workers exited".to_string());
                    return Err(self.fail(err));
                }
            }
        }

        let mut all_stopped = true;
        let mut failure = None;
        for (worker, result) in self.workers.iter_mut().zip(results) {
            match result {
                Some(Ok(stopped)) => {
                    all_stopped &= stopped;
                    if stopped && !worker.stopped {
                        worker.stopped = true;
                        worker.go = None;
                    }
                }
                Some(Err(err)) => {
                    if failure.is_none() {
                        failure = Some(err);
                    }
                }
                None => all_stopped = false,
            }
        }
        match failure {
            Some(err) => Err(self.fail(err)),
            None => Ok(all_stopped),
        }
    }
}

impl Drop for PersistentPulseManager {
    fn drop(&mut self) {
        for worker in &mut self.workers {
            worker.go = None;
        }
        // A worker stuck past the timeout may never observe the closed channel.
        if self.timed_out {
            return;
        }
        for worker in &mut self.workers {
            if let Some(handle) = worker.handle.take() {
                if handle.join().is_err() {
                    warn!(robot_id = worker.robot_id, "robot worker panicked");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::test_support::{FailingListener, SlowListener, path_tree, shared_robots, star_tree};

    fn pulse_until_error(manager: &mut PersistentPulseManager) -> PulseError {
        for _ in 0..1_000 {
            if let Err(err) = manager.pulse() {
                return err;
            }
        }
        panic!("no pulse failed");
    }

    #[test]
    fn pulse_before_set_robots_is_rejected() {
        let mut manager = PersistentPulseManager::new(None);
        assert!(matches!(manager.pulse(), Err(PulseError::NotInitialized)));
    }

    #[test]
    fn stopped_workers_exit_and_are_skipped() {
        let robots = shared_robots(star_tree(2), 4, Vec::new());
        let mut manager = PersistentPulseManager::new(None);
        manager.set_robots(robots).expect("set robots");

        let mut finished = false;
        for _ in 0..200 {
            if manager.pulse().expect("pulse") {
                finished = true;
                break;
            }
        }
        assert!(finished);
        assert!(manager.workers.iter().all(|worker| worker.stopped));
        // Further pulses stay complete without waking anyone.
        assert!(manager.pulse().expect("pulse after completion"));
    }

    #[test]
    fn failure_names_robot_and_poisons() {
        let failing = Arc::new(FailingListener::on_call(1));
        let robots = shared_robots(path_tree(3), 1, vec![failing]);
        let mut manager = PersistentPulseManager::new(None);
        manager.set_robots(robots).expect("set robots");

        let err = pulse_until_error(&mut manager);
        assert!(matches!(err, PulseError::RobotFailed { robot_id: 0, .. }));
        assert!(matches!(manager.pulse(), Err(PulseError::Poisoned)));
    }

    #[test]
    fn stalled_pulse_times_out() {
        let slow = Arc::new(SlowListener::new(Duration::from_millis(300)));
        let robots = shared_robots(path_tree(2), 2, vec![slow]);
        let mut manager = PersistentPulseManager::new(Some(Duration::from_millis(20)));
        manager.set_robots(robots).expect("set robots");

        let err = pulse_until_error(&mut manager);
        assert!(matches!(err, PulseError::Timeout { .. }));
        assert!(matches!(manager.pulse(), Err(PulseError::Poisoned)));
    }
}
