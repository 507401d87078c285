//! Random tree generation for explorations and benchmarks.

use anyhow::{Result, bail};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::tree::{NodeId, Tree};

/// Builds random trees of a fixed size.
///
/// Node `i` (for `i >= 1`) is attached to a parent drawn uniformly from the
/// nodes `0..i`, so every generated tree is connected with node 0 as root.
/// The same seed always yields the same tree.
#[derive(Debug, Clone)]
pub struct RandomTreeGenerator {
    size: usize,
    last_seed: Option<u64>,
}

impl RandomTreeGenerator {
    pub fn new(size: usize) -> Result<Self> {
        if size == 0 {
            bail!("tree size must be >= 1");
        }
        Ok(Self {
            size,
            last_seed: None,
        })
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Generate a tree, drawing a fresh seed when `seed` is `None`.
    pub fn generate_random_tree(&mut self, seed: Option<u64>) -> Result<Tree> {
        let seed = seed.unwrap_or_else(rand::random::<u64>);
        self.last_seed = Some(seed);

        let mut rng = StdRng::seed_from_u64(seed);
        let mut tree = Tree::with_capacity(self.size);
        for _ in 1..self.size {
            let parent = NodeId::from_index(rng.gen_range(0..tree.len()));
            tree.add_node(parent)?;
        }
        Ok(tree)
    }

    /// Seed used by the most recent [`Self::generate_random_tree`] call.
    pub fn seed_of_last_generation(&self) -> Option<u64> {
        self.last_seed
    }
}
