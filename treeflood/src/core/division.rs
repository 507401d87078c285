//! Fair division of the robots at a node over its unfinished children.
//!
//! With `u` unfinished children and `r` robots every child receives `r / u`
//! robots. The `r % u` remaining robots go one each to *advantaged* children:
//! preferred ports first (ascending), then the lowest remaining unfinished
//! ports. Robots are handed out in ascending id order, equal shares in port
//! order first, then the remainder in advantaged order.

use std::collections::{BTreeMap, BTreeSet};

use crate::core::types::RobotId;

/// Outcome of one fair division.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Division {
    /// Ports that received one robot more than the others, in hand-out order.
    pub advantaged: Vec<usize>,
    /// Port assigned to every robot.
    pub assignment: BTreeMap<RobotId, usize>,
}

impl Division {
    pub fn port_of(&self, robot_id: RobotId) -> Option<usize> {
        self.assignment.get(&robot_id).copied()
    }

    /// Number of robots sent to each port (ports without robots are omitted).
    pub fn counts(&self) -> BTreeMap<usize, usize> {
        let mut counts = BTreeMap::new();
        for port in self.assignment.values() {
            *counts.entry(*port).or_insert(0) += 1;
        }
        counts
    }
}

/// Select the `robot_count % unfinished.len()` advantaged ports.
pub fn advantaged_ports(
    unfinished: &BTreeSet<usize>,
    robot_count: usize,
    preferred: &BTreeSet<usize>,
) -> Vec<usize> {
    if unfinished.is_empty() {
        return Vec::new();
    }
    let remainder = robot_count % unfinished.len();
    let mut advantaged: Vec<usize> = unfinished
        .iter()
        .filter(|port| preferred.contains(port))
        .take(remainder)
        .copied()
        .collect();
    // Tie-break when preferred ports are missing or finished: lowest ports first.
    for port in unfinished {
        if advantaged.len() >= remainder {
            break;
        }
        if !advantaged.contains(port) {
            advantaged.push(*port);
        }
    }
    advantaged
}

/// Distribute `robots` over `unfinished` ports.
pub fn fair_division(
    unfinished: &BTreeSet<usize>,
    robots: &BTreeSet<RobotId>,
    preferred: &BTreeSet<usize>,
) -> Division {
    let mut assignment = BTreeMap::new();
    if unfinished.is_empty() {
        return Division {
            advantaged: Vec::new(),
            assignment,
        };
    }

    let share = robots.len() / unfinished.len();
    let advantaged = advantaged_ports(unfinished, robots.len(), preferred);

    let mut remaining = robots.iter().copied();
    for port in unfinished {
        for robot_id in remaining.by_ref().take(share) {
            assignment.insert(robot_id, *port);
        }
    }
    for (robot_id, port) in remaining.zip(advantaged.iter()) {
        assignment.insert(robot_id, *port);
    }

    Division {
        advantaged,
        assignment,
    }
}
