//! Data point sweeps of the three benchmark series.

use std::fmt;

/// Inclusive sweep `from, from + step, ..., <= to`. A zero value becomes 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sweep {
    pub from: usize,
    pub to: usize,
    pub step: usize,
}

impl Sweep {
    pub fn values(&self) -> Vec<usize> {
        if self.step == 0 || self.from > self.to {
            return Vec::new();
        }
        (self.from..=self.to)
            .step_by(self.step)
            .map(|value| value.max(1))
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Series {
    /// Growing trees explored by a fixed team.
    FixedRobots { robots: usize },
    /// A growing team on trees of one size.
    FixedTree { tree_size: usize },
    /// Growing trees with `ceil(size * coverage)` robots.
    Scaling { coverage: f64 },
}

impl Series {
    /// `(tree_size, robots)` of every data point, in sweep order.
    pub fn points(&self, sweep: &Sweep) -> Vec<(usize, usize)> {
        sweep
            .values()
            .into_iter()
            .map(|value| match *self {
                Self::FixedRobots { robots } => (value, robots),
                Self::FixedTree { tree_size } => (tree_size, value),
                Self::Scaling { coverage } => {
                    let robots = (value as f64 * coverage).ceil() as usize;
                    (value, robots.max(1))
                }
            })
            .collect()
    }
}

impl fmt::Display for Series {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FixedRobots { robots } => write!(f, "fixed-robots_{robots}"),
            Self::FixedTree { tree_size } => write!(f, "fixed-tree_{tree_size}"),
            Self::Scaling { coverage } => write!(f, "scaling_{coverage}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sweep_starting_at_zero_uses_one() {
        let sweep = Sweep {
            from: 0,
            to: 300,
            step: 100,
        };
        assert_eq!(sweep.values(), vec![1, 100, 200, 300]);
    }

    #[test]
    fn empty_sweeps() {
        assert!(Sweep { from: 5, to: 1, step: 1 }.values().is_empty());
        assert!(Sweep { from: 0, to: 10, step: 0 }.values().is_empty());
    }

    #[test]
    fn scaling_rounds_robot_count_up() {
        let sweep = Sweep {
            from: 0,
            to: 20,
            step: 10,
        };
        let points = Series::Scaling { coverage: 0.15 }.points(&sweep);
        assert_eq!(points, vec![(1, 1), (10, 2), (20, 3)]);
    }

    #[test]
    fn fixed_tree_sweeps_robots() {
        let sweep = Sweep {
            from: 0,
            to: 100,
            step: 50,
        };
        let points = Series::FixedTree { tree_size: 1_000 }.points(&sweep);
        assert_eq!(points, vec![(1_000, 1), (1_000, 50), (1_000, 100)]);
        assert_eq!(Series::FixedTree { tree_size: 1_000 }.to_string(), "fixed-tree_1000");
    }
}
