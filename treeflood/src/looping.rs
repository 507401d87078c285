//! Bounded stepping helper for `treeflood explore` and `treeflood demo`.

use anyhow::Result;

use crate::exploration::{Exploration, ExplorationSummary};

/// Reason why `run_loop` stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoopStop {
    /// Every robot stopped.
    Complete,
    /// The configured `max_steps` was reached first.
    MaxStepsExceeded { max_steps: u64 },
}

/// Summary of a loop invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoopOutcome {
    pub summary: ExplorationSummary,
    pub stop: LoopStop,
}

/// Step `exploration` until it completes or `max_steps` steps were executed.
///
/// `on_step` runs after every successful step. Any step error stops the loop
/// immediately and is returned unchanged.
pub fn run_loop<F: FnMut(&Exploration) -> Result<()>>(
    exploration: &mut Exploration,
    max_steps: Option<u64>,
    mut on_step: F,
) -> Result<LoopOutcome> {
    loop {
        if let Some(max_steps) = max_steps {
            if exploration.steps_executed() >= max_steps && !exploration.is_finished() {
                return Ok(LoopOutcome {
                    summary: exploration.summary()?,
                    stop: LoopStop::MaxStepsExceeded { max_steps },
                });
            }
        }

        let finished = exploration.explore_one_step()?;
        on_step(exploration)?;
        if finished {
            return Ok(LoopOutcome {
                summary: exploration.summary()?,
                stop: LoopStop::Complete,
            });
        }
    }
}
