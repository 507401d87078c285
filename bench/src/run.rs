//! Timed exploration runs.
//!
//! One data point explores several random trees of the same size with the same
//! robot count and averages wall-clock time and protocol steps.

use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result, bail};
use tracing::{debug, instrument};

use treeflood::exploration::Exploration;
use treeflood::generator::RandomTreeGenerator;
use treeflood::pulse::{PulseStrategy, build_pulse_manager};
use treeflood::storage::LocalStorage;

/// Column header of every result file.
pub const TSV_HEADER: &str = "TREE_SIZE\tROBOTS\tTIME_MS\tSTEPS";

/// Averages over all trees of one data point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Measurement {
    pub tree_size: usize,
    pub robots: usize,
    pub time_ms: u64,
    pub steps: u64,
}

impl Measurement {
    pub fn tsv_line(&self) -> String {
        format!(
            "{}\t{}\t{}\t{}",
            self.tree_size, self.robots, self.time_ms, self.steps
        )
    }
}

#[derive(Debug, Clone)]
pub struct MeasureOptions {
    /// Random trees explored per data point.
    pub trees: usize,
    pub strategy: PulseStrategy,
    /// Tree `i` of every data point uses seed `base_seed + i`.
    pub base_seed: u64,
}

#[instrument(skip(options), fields(trees = options.trees, strategy = %options.strategy))]
pub fn measure_point(tree_size: usize, robots: usize, options: &MeasureOptions) -> Result<Measurement> {
    if options.trees == 0 {
        bail!("trees per data point must be >= 1");
    }
    let mut generator = RandomTreeGenerator::new(tree_size)?;

    let mut total_ms = 0u128;
    let mut total_steps = 0u64;
    for index in 0..options.trees {
        let seed = options.base_seed.wrapping_add(index as u64);
        let tree = Arc::new(generator.generate_random_tree(Some(seed))?);
        let mut exploration = Exploration::new(
            tree.clone(),
            tree.root(),
            robots,
            Arc::new(LocalStorage::new()),
            build_pulse_manager(options.strategy, None),
            Vec::new(),
        )
        .with_context(|| format!("prepare exploration (seed {seed})"))?;

        let started = Instant::now();
        let summary = exploration
            .explore()
            .with_context(|| format!("explore tree of size {tree_size} (seed {seed})"))?;
        let elapsed = started.elapsed();
        debug!(seed, steps = summary.steps, elapsed_ms = elapsed.as_millis() as u64, "tree explored");

        total_ms += elapsed.as_millis();
        total_steps += summary.steps;
    }

    let trees = options.trees as u64;
    Ok(Measurement {
        tree_size,
        robots,
        time_ms: (total_ms / u128::from(trees)) as u64,
        steps: total_steps / trees,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tsv_line_matches_header_columns() {
        let line = Measurement {
            tree_size: 100,
            robots: 5,
            time_ms: 12,
            steps: 340,
        }
        .tsv_line();
        assert_eq!(line, "100\t5\t12\t340");
        assert_eq!(
            line.split('\t').count(),
            TSV_HEADER.split('\t').count()
        );
    }

    #[test]
    fn single_node_trees_take_three_steps() {
        let options = MeasureOptions {
            trees: 3,
            strategy: PulseStrategy::Pooled,
            base_seed: 0,
        };
        let measurement = measure_point(1, 2, &options).expect("measure");
        assert_eq!(measurement.steps, 3);
        assert_eq!(measurement.tree_size, 1);
        assert_eq!(measurement.robots, 2);
    }

    #[test]
    fn zero_trees_rejected() {
        let options = MeasureOptions {
            trees: 0,
            strategy: PulseStrategy::Persistent,
            base_seed: 0,
        };
        assert!(measure_point(10, 1, &options).is_err());
    }
}
