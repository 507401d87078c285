//! Round-synchronized robot state machine.
//!
//! A robot executes one stage per pulse. Stages cycle `Move -> Write -> Read`;
//! every wrap advances the step counter and the protocol step
//! (`Initial -> Nop -> Regular -> Update -> Return -> Regular ...`).
//!
//! - `Move` walks at most one edge and remembers the port it arrived through.
//! - `Write` appends that port to the current node's storage unless the robot
//!   stayed (nothing is written during `Nop`).
//! - `Read` snapshots the current node's storage for the next `Move`.

use std::sync::{Arc, Mutex};

use anyhow::{Result, anyhow};
use serde::Serialize;
use tracing::{debug, trace};

use crate::core::knowledge::{KnowledgeManager, robot_action};
use crate::core::types::{Action, Information, Port, RobotId, Round, Stage, Step, StepNumber};
use crate::listener::RobotMovedListener;
use crate::storage::{LocalStorage, NodeLog};
use crate::tree::{NodeId, Tree};

/// Robots are shared with pulse workers and locked for one stage at a time.
pub type SharedRobot = Arc<Mutex<Robot>>;

/// Point-in-time view of a robot, safe to hand out between pulses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RobotSnapshot {
    pub id: RobotId,
    pub location: NodeId,
    pub stopped: bool,
    pub step: Step,
    pub stage: Stage,
    pub step_counter: StepNumber,
    pub round: Round,
}

pub struct Robot {
    id: RobotId,
    tree: Arc<Tree>,
    storage: Arc<LocalStorage>,
    listeners: Arc<[Arc<dyn RobotMovedListener>]>,
    knowledge: KnowledgeManager,
    location: NodeId,
    view: NodeLog,
    current_step: Step,
    current_stage: Stage,
    step_counter: StepNumber,
    round_counter: Round,
    port_used_last_move: Port,
    stopped: bool,
}

impl Robot {
    pub fn new(
        id: RobotId,
        tree: Arc<Tree>,
        start: NodeId,
        storage: Arc<LocalStorage>,
        listeners: Arc<[Arc<dyn RobotMovedListener>]>,
    ) -> Self {
        Self {
            id,
            tree,
            storage,
            listeners,
            knowledge: KnowledgeManager::new(id),
            location: start,
            view: NodeLog::new(),
            current_step: Step::Initial,
            current_stage: Stage::Move,
            step_counter: 1,
            round_counter: 0,
            port_used_last_move: Port::Star,
            stopped: false,
        }
    }

    pub fn id(&self) -> RobotId {
        self.id
    }

    pub fn location(&self) -> NodeId {
        self.location
    }

    pub fn has_stopped(&self) -> bool {
        self.stopped
    }

    pub fn current_step(&self) -> Step {
        self.current_step
    }

    pub fn current_stage(&self) -> Stage {
        self.current_stage
    }

    pub fn round(&self) -> Round {
        self.round_counter
    }

    pub fn snapshot(&self) -> RobotSnapshot {
        RobotSnapshot {
            id: self.id,
            location: self.location,
            stopped: self.stopped,
            step: self.current_step,
            stage: self.current_stage,
            step_counter: self.step_counter,
            round: self.round_counter,
        }
    }

    /// Execute the current stage and advance. Returns `true` once stopped.
    pub fn pulse(&mut self) -> Result<bool> {
        if self.stopped {
            return Ok(true);
        }

        match self.current_stage {
            Stage::Move => self.move_stage()?,
            Stage::Write => self.write_stage()?,
            Stage::Read => self.view = self.storage.read(self.location),
        }
        if self.stopped {
            return Ok(true);
        }

        let (stage, wrapped) = self.current_stage.next();
        self.current_stage = stage;
        if wrapped {
            self.step_counter += 1;
            let (step, new_round) = self.current_step.next();
            self.current_step = step;
            if new_round {
                self.round_counter += 1;
            }
        }
        Ok(false)
    }

    fn move_stage(&mut self) -> Result<()> {
        match self.current_step {
            Step::Initial => self.port_used_last_move = Port::Star,
            Step::Nop => self.port_used_last_move = Port::Stayed,
            Step::Regular => self.regular_move()?,
            Step::Update => self.update_move()?,
            Step::Return => self.return_move()?,
        }
        Ok(())
    }

    fn regular_move(&mut self) -> Result<()> {
        let knowledge = self.knowledge.construct_knowledge(
            self.round_counter,
            &self.tree,
            self.location,
            &self.view,
        )?;
        let action = robot_action(self.id, knowledge, &self.tree);
        trace!(robot_id = self.id, round = self.round_counter, node = %self.location, ?action, "regular decision");

        match action {
            Action::Stop => {
                self.stopped = true;
                self.port_used_last_move = Port::Stayed;
                debug!(robot_id = self.id, round = self.round_counter, "robot stopped at root");
            }
            Action::Stay => self.port_used_last_move = Port::Stayed,
            Action::Parent => {
                let left = self.location;
                self.move_to_parent()?;
                self.knowledge.forget_knowledge_for_node(left);
            }
            Action::Child(port) => self.move_to_child(port)?,
        }
        Ok(())
    }

    /// Report a finished node to its parent, to come back during `Return`.
    fn update_move(&mut self) -> Result<()> {
        if self.tree.is_root(self.location) {
            self.port_used_last_move = Port::Stayed;
            return Ok(());
        }
        let knowledge = self.knowledge.construct_knowledge(
            self.round_counter,
            &self.tree,
            self.location,
            &self.view,
        )?;
        if knowledge.unfinished_child_ports.is_empty() {
            self.move_to_parent()
        } else {
            self.port_used_last_move = Port::Stayed;
            Ok(())
        }
    }

    fn return_move(&mut self) -> Result<()> {
        let reported = self
            .view
            .get(&(self.step_counter - 1))
            .and_then(|entries| entries.get(&self.id))
            .map(|info| info.port);
        match reported {
            Some(Port::Child(port)) => self.move_to_child(port),
            Some(port) => Err(anyhow!(
                "robot {} reported through unexpected port {port} on node {}",
                self.id,
                self.location
            )),
            None => {
                self.port_used_last_move = Port::Stayed;
                Ok(())
            }
        }
    }

    fn move_to_parent(&mut self) -> Result<()> {
        let source = self.location;
        let parent = self
            .tree
            .parent(source)
            .ok_or_else(|| anyhow!("robot {} cannot leave root {source} upwards", self.id))?;
        let port = self
            .tree
            .port_of(source)
            .ok_or_else(|| anyhow!("node {source} missing from its parent's children"))?;
        self.walk(parent, Port::Child(port))
    }

    fn move_to_child(&mut self, port: usize) -> Result<()> {
        let child = self
            .tree
            .child(self.location, port)
            .ok_or_else(|| anyhow!("node {} has no child at port {port}", self.location))?;
        self.walk(child, Port::Parent)
    }

    fn walk(&mut self, destination: NodeId, arrived_through: Port) -> Result<()> {
        let source = self.location;
        self.location = destination;
        self.port_used_last_move = arrived_through;
        trace!(robot_id = self.id, %source, %destination, step = self.step_counter, "moved");
        for listener in self.listeners.iter() {
            listener.moved_to(self.id, source, destination)?;
        }
        Ok(())
    }

    fn write_stage(&mut self) -> Result<()> {
        if self.current_step == Step::Nop || self.port_used_last_move == Port::Stayed {
            return Ok(());
        }
        let info = Information::new(self.step_counter, self.id, self.port_used_last_move);
        self.storage.write(info, self.location)?;
        Ok(())
    }
}
