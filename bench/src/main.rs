mod cli;
mod report;
mod run;
mod series;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};

use treeflood::pulse::PulseStrategy;

use crate::cli::SeriesOptions;
use crate::run::MeasureOptions;
use crate::series::{Series, Sweep};

#[derive(Parser)]
#[command(name = "bench", version, about = "Benchmark harness for treeflood explorations")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Growing trees explored by a fixed number of robots.
    FixedRobots {
        #[arg(long)]
        robots: usize,
        #[command(flatten)]
        common: CommonArgs,
    },
    /// A growing number of robots on trees of a fixed size.
    FixedTree {
        #[arg(long)]
        size: usize,
        #[command(flatten)]
        common: CommonArgs,
    },
    /// Growing trees with a robot count proportional to the tree size.
    Scaling {
        /// Robots per node, e.g. `0.1` for one robot per ten nodes.
        #[arg(long)]
        coverage: f64,
        #[command(flatten)]
        common: CommonArgs,
    },
    /// Summarize a result file.
    Report { file: PathBuf },
}

#[derive(Args, Debug, Clone)]
struct CommonArgs {
    /// First value of the sweep (tree size or robot count).
    #[arg(long, default_value_t = 0)]
    from: usize,
    /// Last value of the sweep, inclusive.
    #[arg(long, default_value_t = 500)]
    to: usize,
    #[arg(long, default_value_t = 50, value_parser = clap::value_parser!(u64).range(1..))]
    step: u64,
    /// Random trees averaged per data point.
    #[arg(long, default_value_t = 20)]
    trees: usize,
    #[arg(long, value_enum, default_value_t = PulseStrategy::Persistent)]
    strategy: PulseStrategy,
    /// Seed of the first tree of every data point; random when absent.
    #[arg(long)]
    seed: Option<u64>,
    #[arg(long, default_value = "bench-results")]
    out: PathBuf,
}

impl CommonArgs {
    fn options(&self) -> SeriesOptions {
        SeriesOptions {
            sweep: Sweep {
                from: self.from,
                to: self.to,
                step: self.step as usize,
            },
            measure: MeasureOptions {
                trees: self.trees,
                strategy: self.strategy,
                base_seed: self.seed.unwrap_or_else(rand::random::<u64>),
            },
            out_dir: self.out.clone(),
        }
    }
}

fn main() -> Result<()> {
    treeflood::logging::init();
    let cli = Cli::parse();
    match cli.command {
        Command::FixedRobots { robots, common } => {
            run(Series::FixedRobots { robots }, &common)
        }
        Command::FixedTree { size, common } => run(Series::FixedTree { tree_size: size }, &common),
        Command::Scaling { coverage, common } => run(Series::Scaling { coverage }, &common),
        Command::Report { file } => cli::report_file(&file),
    }
}

fn run(series: Series, common: &CommonArgs) -> Result<()> {
    let tsv = cli::run_series(series, &common.options())?;
    println!("bench: results written to {}", tsv.display());
    Ok(())
}
