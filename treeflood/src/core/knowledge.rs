//! Knowledge reconstruction from a node's local storage.
//!
//! A robot never sees the global state. Whenever it needs to decide at a node
//! it rebuilds, round by round, what the local writes imply about that node:
//! which children are still unfinished, which finished children still host
//! robots and which robots are present. [`Knowledge`] for round `R` describes
//! the node at the beginning of the `REGULAR` move of round `R`.
//!
//! Knowledge is recomputed from the log for every round instead of tracking
//! deltas; the per-robot cache in [`KnowledgeManager`] only remembers the last
//! snapshot so a revisit costs `O(rounds since the last visit)`.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;

use tracing::trace;

use crate::core::division::{advantaged_ports, fair_division};
use crate::core::types::{
    Action, INITIAL_STEP, Information, Port, RobotId, Round, StepNumber, regular_step, update_step,
};
use crate::storage::NodeLog;
use crate::tree::{NodeId, Tree};

/// Invariant violations found while reconstructing knowledge.
///
/// These are fatal for the querying robot: continuing with an empty or guessed
/// knowledge would silently break the exploration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KnowledgeError {
    /// No `INITIAL` or `REGULAR` write exists for the node up to `round`.
    NoInitialRound { node: NodeId, round: Round },
    /// The discovering writes of one step disagree on the port.
    InconsistentDiscovery { node: NodeId, step: StepNumber },
    UnknownNode(NodeId),
}

impl fmt::Display for KnowledgeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoInitialRound { node, round } => write!(
                f,
                "no initial round found for node {node} up to round {round}"
            ),
            Self::InconsistentDiscovery { node, step } => write!(
                f,
                "discovery writes of node {node} at step {step} use different ports"
            ),
            Self::UnknownNode(node) => write!(f, "node {node} is not part of the tree"),
        }
    }
}

impl std::error::Error for KnowledgeError {}

/// Reconstructed status of one node for one round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Knowledge {
    pub round: Round,
    pub node: NodeId,
    /// Port through which the node was first entered (`Star` for a start node).
    pub parent_port: Port,
    pub unfinished_child_ports: BTreeSet<usize>,
    /// Unfinished ports that receive one robot more in this round's division.
    pub advantaged_child_ports: BTreeSet<usize>,
    pub finished_but_inhabited_child_ports: BTreeSet<usize>,
    pub finished_and_not_inhabited_child_ports: BTreeSet<usize>,
    pub robots_at_location: BTreeSet<RobotId>,
}

impl Knowledge {
    /// Every child is finished and none still hosts robots.
    pub fn is_node_finished(&self) -> bool {
        self.unfinished_child_ports.is_empty() && self.finished_but_inhabited_child_ports.is_empty()
    }
}

/// Decide what `robot_id` does in the `REGULAR` step described by `knowledge`.
///
/// Pure function of the snapshot: every robot at the node computes the same
/// decisions for all robots present.
pub fn robot_action(robot_id: RobotId, knowledge: &Knowledge, tree: &Tree) -> Action {
    if knowledge.is_node_finished() {
        if tree.is_root(knowledge.node) {
            return Action::Stop;
        }
        return Action::Parent;
    }

    if !knowledge.unfinished_child_ports.is_empty() {
        let division = fair_division(
            &knowledge.unfinished_child_ports,
            &knowledge.robots_at_location,
            &knowledge.advantaged_child_ports,
        );
        return match division.port_of(robot_id) {
            Some(port) => Action::Child(port),
            None => Action::Stay,
        };
    }

    // Children are finished but some still host robots: wait for them.
    Action::Stay
}

/// Build the first knowledge of `node`, searching rounds `1..=round`.
///
/// A start node (writes at the `INITIAL` step) starts at round 1 with its
/// initial robots present. Any other node starts at the round `r` of its first
/// `REGULAR` write, describing the node just before those robots arrived.
pub fn construct_initial_knowledge(
    round: Round,
    tree: &Tree,
    node: NodeId,
    log: &NodeLog,
) -> Result<Knowledge, KnowledgeError> {
    if !tree.contains(node) {
        return Err(KnowledgeError::UnknownNode(node));
    }

    let (initial_round, step, entries, robots_at_location): (
        Round,
        StepNumber,
        &BTreeMap<RobotId, Information>,
        BTreeSet<RobotId>,
    ) = match log.get(&INITIAL_STEP) {
        Some(entries) if !entries.is_empty() => (
            1,
            INITIAL_STEP,
            entries,
            entries.keys().copied().collect(),
        ),
        _ => {
            let found = (1..=round).find_map(|past_round| {
                log.get(&regular_step(past_round))
                    .filter(|entries| !entries.is_empty())
                    .map(|entries| (past_round, entries))
            });
            let (past_round, entries) =
                found.ok_or(KnowledgeError::NoInitialRound { node, round })?;
            (past_round, regular_step(past_round), entries, BTreeSet::new())
        }
    };

    let parent_port = shared_port(entries).ok_or(KnowledgeError::InconsistentDiscovery { node, step })?;

    Ok(Knowledge {
        round: initial_round,
        node,
        parent_port,
        unfinished_child_ports: (1..=tree.child_count(node)).collect(),
        advantaged_child_ports: BTreeSet::new(),
        finished_but_inhabited_child_ports: BTreeSet::new(),
        finished_and_not_inhabited_child_ports: BTreeSet::new(),
        robots_at_location,
    })
}

fn shared_port(entries: &BTreeMap<RobotId, Information>) -> Option<Port> {
    let mut ports = entries.values().map(|info| info.port);
    let first = ports.next()?;
    ports.all(|port| port == first).then_some(first)
}

/// Derive the knowledge of round `previous.round + 1`.
pub fn advance_knowledge(previous: &Knowledge, tree: &Tree, log: &NodeLog) -> Knowledge {
    let past_round = previous.round;
    let empty = BTreeMap::new();
    let arrivals = log.get(&regular_step(past_round)).unwrap_or(&empty);
    let reports = log.get(&update_step(past_round)).unwrap_or(&empty);

    let mut unfinished = previous.unfinished_child_ports.clone();
    let mut inhabited = previous.finished_but_inhabited_child_ports.clone();
    let mut not_inhabited = previous.finished_and_not_inhabited_child_ports.clone();

    // Robots entering during UPDATE announce that the child they came from is finished.
    for info in reports.values() {
        if let Some(port) = info.port.child_port() {
            if unfinished.remove(&port) {
                inhabited.insert(port);
            }
        }
    }

    // A robot climbing out of a finished child means nobody is left below it.
    for info in arrivals.values() {
        if let Some(port) = info.port.child_port() {
            if inhabited.remove(&port) {
                not_inhabited.insert(port);
            }
        }
    }

    let mut robots: BTreeSet<RobotId> = previous
        .robots_at_location
        .iter()
        .copied()
        .filter(|robot_id| robot_action(*robot_id, previous, tree) == Action::Stay)
        .collect();
    robots.extend(arrivals.keys().copied());

    let preferred: BTreeSet<usize> = previous
        .advantaged_child_ports
        .intersection(&unfinished)
        .copied()
        .collect();
    let advantaged = advantaged_ports(&unfinished, robots.len(), &preferred)
        .into_iter()
        .collect();

    Knowledge {
        round: past_round + 1,
        node: previous.node,
        parent_port: previous.parent_port,
        unfinished_child_ports: unfinished,
        advantaged_child_ports: advantaged,
        finished_but_inhabited_child_ports: inhabited,
        finished_and_not_inhabited_child_ports: not_inhabited,
        robots_at_location: robots,
    }
}

/// Per-robot knowledge cache.
///
/// Each robot only queries the nodes on its own path, so the cache is private
/// and needs no synchronization.
#[derive(Debug, Clone)]
pub struct KnowledgeManager {
    robot_id: RobotId,
    cache: HashMap<NodeId, Knowledge>,
}

impl KnowledgeManager {
    pub fn new(robot_id: RobotId) -> Self {
        Self {
            robot_id,
            cache: HashMap::new(),
        }
    }

    pub fn robot_id(&self) -> RobotId {
        self.robot_id
    }

    /// Knowledge of `node` for `round`, built from the cache or from scratch.
    pub fn construct_knowledge(
        &mut self,
        round: Round,
        tree: &Tree,
        node: NodeId,
        log: &NodeLog,
    ) -> Result<&Knowledge, KnowledgeError> {
        let mut knowledge = match self.cache.remove(&node) {
            Some(cached) if cached.round <= round => cached,
            _ => construct_initial_knowledge(round, tree, node, log)?,
        };
        let start_round = knowledge.round;
        while knowledge.round < round {
            knowledge = advance_knowledge(&knowledge, tree, log);
        }
        trace!(
            robot_id = self.robot_id,
            node = %node,
            from_round = start_round,
            round,
            "knowledge constructed"
        );

        Ok(self.cache.entry(node).or_insert(knowledge))
    }

    /// Drop the cached knowledge of `node` once the robot left it for good.
    pub fn forget_knowledge_for_node(&mut self, node: NodeId) {
        self.cache.remove(&node);
    }

    pub fn cached(&self, node: NodeId) -> Option<&Knowledge> {
        self.cache.get(&node)
    }

    pub fn cached_nodes(&self) -> usize {
        self.cache.len()
    }
}
