//! Console front end for collective tree explorations.
//!
//! Generates random trees, runs explorations to completion and steps through
//! them while printing the explored tree with robot locations.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;

use treeflood::core::invariants::validate_invariants;
use treeflood::exit_codes;
use treeflood::exploration::{Exploration, ExplorationSummary, RobotFailedError};
use treeflood::generator::RandomTreeGenerator;
use treeflood::io::config::{ExplorationConfig, load_config};
use treeflood::listener::ExplorationTreeBuilder;
use treeflood::logging;
use treeflood::looping::{LoopStop, run_loop};
use treeflood::pulse::{PulseError, PulseStrategy, build_pulse_manager};
use treeflood::storage::LocalStorage;
use treeflood::stringify::{PlainDecorator, RobotLocationDecorator, render_hierarchical};
use treeflood::tree::Tree;

#[derive(Parser)]
#[command(
    name = "treeflood",
    version,
    about = "Collective tree exploration by robots sharing only local storage"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Generate a random tree and print it with its seed.
    Generate {
        #[arg(long)]
        size: usize,
        #[arg(long)]
        seed: Option<u64>,
        /// Print the parent list as JSON instead of the rendered tree.
        #[arg(long)]
        json: bool,
    },
    /// Explore a random tree until every robot stopped.
    Explore {
        #[command(flatten)]
        run: RunArgs,
        /// Print the summary as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Step through an exploration, printing the explored tree as it grows.
    Demo {
        #[command(flatten)]
        run: RunArgs,
        /// Print every N protocol steps.
        #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u64).range(1..))]
        every: u64,
    },
}

/// Command-line overrides applied on top of the config file.
#[derive(Args, Debug, Clone)]
struct RunArgs {
    /// TOML config file; missing files fall back to defaults.
    #[arg(long, default_value = "treeflood.toml")]
    config: PathBuf,
    #[arg(long)]
    size: Option<usize>,
    #[arg(long)]
    robots: Option<usize>,
    #[arg(long)]
    seed: Option<u64>,
    #[arg(long, value_enum)]
    strategy: Option<PulseStrategy>,
    #[arg(long)]
    max_steps: Option<u64>,
}

impl RunArgs {
    fn resolve(&self) -> Result<ExplorationConfig> {
        let mut cfg = load_config(&self.config)?;
        if let Some(size) = self.size {
            cfg.tree_size = size;
        }
        if let Some(robots) = self.robots {
            cfg.robots = robots;
        }
        if self.seed.is_some() {
            cfg.seed = self.seed;
        }
        if let Some(strategy) = self.strategy {
            cfg.strategy = strategy;
        }
        if self.max_steps.is_some() {
            cfg.max_steps = self.max_steps;
        }
        cfg.validate()?;
        Ok(cfg)
    }
}

fn main() {
    logging::init();
    let code = match run() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{:#}", err);
            exit_code_for(&err)
        }
    };
    std::process::exit(code);
}

fn exit_code_for(err: &anyhow::Error) -> i32 {
    if err.downcast_ref::<RobotFailedError>().is_some() {
        exit_codes::ROBOT_FAILED
    } else if matches!(
        err.downcast_ref::<PulseError>(),
        Some(PulseError::Timeout { .. })
    ) {
        exit_codes::PULSE_TIMEOUT
    } else {
        exit_codes::INVALID
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    match cli.command {
        Command::Generate { size, seed, json } => cmd_generate(size, seed, json),
        Command::Explore { run, json } => cmd_explore(&run, json),
        Command::Demo { run, every } => cmd_demo(&run, every),
    }
}

#[derive(Serialize)]
struct GeneratedTree {
    seed: u64,
    size: usize,
    /// `parents[i]` is the parent of node `i`; the root has none.
    parents: Vec<Option<usize>>,
}

fn cmd_generate(size: usize, seed: Option<u64>, json: bool) -> Result<i32> {
    let mut generator = RandomTreeGenerator::new(size)?;
    let tree = generator.generate_random_tree(seed)?;
    let seed = generator
        .seed_of_last_generation()
        .context("generator did not record its seed")?;
    let errors = validate_invariants(&tree);
    if !errors.is_empty() {
        bail!("invariant violations:\n- {}", errors.join("\n- "));
    }

    if json {
        let generated = GeneratedTree {
            seed,
            size: tree.len(),
            parents: tree
                .nodes()
                .map(|node| tree.parent(node).map(|parent| parent.index()))
                .collect(),
        };
        println!("{}", serde_json::to_string_pretty(&generated)?);
    } else {
        println!("seed: {seed}");
        print!("{}", render_hierarchical(&tree, &PlainDecorator));
    }
    Ok(exit_codes::OK)
}

struct Prepared {
    exploration: Exploration,
    builder: Arc<ExplorationTreeBuilder>,
    seed: u64,
}

fn prepare(cfg: &ExplorationConfig) -> Result<Prepared> {
    let mut generator = RandomTreeGenerator::new(cfg.tree_size)?;
    let tree = Arc::new(generator.generate_random_tree(cfg.seed)?);
    let seed = generator
        .seed_of_last_generation()
        .context("generator did not record its seed")?;
    let builder = Arc::new(ExplorationTreeBuilder::new(tree.clone(), Vec::new()));
    let exploration = Exploration::new(
        tree.clone(),
        tree.root(),
        cfg.robots,
        Arc::new(LocalStorage::new()),
        build_pulse_manager(cfg.strategy, cfg.pulse_timeout()),
        vec![builder.clone()],
    )?;
    Ok(Prepared {
        exploration,
        builder,
        seed,
    })
}

fn render_explored(builder: &ExplorationTreeBuilder, exploration: &Exploration) -> Result<String> {
    let explored: Tree = builder.explored_tree()?;
    let alias = builder.node_alias()?;
    let robots = exploration.robots()?;
    let decorator = RobotLocationDecorator::with_alias(&robots, Some(&alias));
    Ok(render_hierarchical(&explored, &decorator))
}

fn stop_code(stop: &LoopStop) -> i32 {
    match stop {
        LoopStop::Complete => exit_codes::OK,
        LoopStop::MaxStepsExceeded { .. } => exit_codes::STEP_LIMIT,
    }
}

#[derive(Serialize)]
struct ExploreReport {
    seed: u64,
    strategy: PulseStrategy,
    elapsed_ms: u128,
    edges_explored: usize,
    #[serde(flatten)]
    summary: ExplorationSummary,
}

fn cmd_explore(run: &RunArgs, json: bool) -> Result<i32> {
    let cfg = run.resolve()?;
    let Prepared {
        mut exploration,
        builder,
        seed,
    } = prepare(&cfg)?;

    let started = Instant::now();
    let outcome = run_loop(&mut exploration, cfg.max_steps, |_| Ok(()))?;
    let elapsed_ms = started.elapsed().as_millis();
    let report = ExploreReport {
        seed,
        strategy: cfg.strategy,
        elapsed_ms,
        edges_explored: builder.edge_count()?,
        summary: outcome.summary,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!(
            "seed {} | {} nodes | {} robots | {} steps | {} rounds | {} ms | {} edges explored",
            report.seed,
            report.summary.nodes,
            report.summary.robots,
            report.summary.steps,
            report.summary.rounds,
            report.elapsed_ms,
            report.edges_explored
        );
        if let LoopStop::MaxStepsExceeded { max_steps } = outcome.stop {
            println!("stopped after max_steps = {max_steps}");
        }
        print!("{}", render_explored(&builder, &exploration)?);
    }
    Ok(stop_code(&outcome.stop))
}

fn cmd_demo(run: &RunArgs, every: u64) -> Result<i32> {
    let cfg = run.resolve()?;
    let Prepared {
        mut exploration,
        builder,
        seed,
    } = prepare(&cfg)?;
    println!(
        "seed {seed} | {} nodes | {} robots | strategy {}",
        exploration.tree().len(),
        cfg.robots,
        cfg.strategy
    );

    let outcome = run_loop(&mut exploration, cfg.max_steps, |exploration| {
        let step = exploration.steps_executed();
        if step % every == 0 || exploration.is_finished() {
            println!("\nstep {step}");
            print!("{}", render_explored(&builder, exploration)?);
        }
        Ok(())
    })?;
    println!(
        "\nfinished after {} steps ({} rounds), {} edges explored",
        outcome.summary.steps,
        outcome.summary.rounds,
        builder.edge_count()?
    );
    Ok(stop_code(&outcome.stop))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_generate() {
        let cli = Cli::parse_from(["treeflood", "generate", "--size", "5", "--seed", "7"]);
        assert!(matches!(
            cli.command,
            Command::Generate {
                size: 5,
                seed: Some(7),
                json: false
            }
        ));
    }

    #[test]
    fn parse_explore_overrides() {
        let cli = Cli::parse_from([
            "treeflood",
            "explore",
            "--robots",
            "4",
            "--strategy",
            "pooled",
            "--json",
        ]);
        let Command::Explore { run, json } = cli.command else {
            panic!("expected explore");
        };
        assert!(json);
        assert_eq!(run.robots, Some(4));
        assert_eq!(run.strategy, Some(PulseStrategy::Pooled));
        assert_eq!(run.config, PathBuf::from("treeflood.toml"));
    }

    #[test]
    fn demo_rejects_zero_interval() {
        assert!(Cli::try_parse_from(["treeflood", "demo", "--every", "0"]).is_err());
    }

    #[test]
    fn overrides_win_over_config_file() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("treeflood.toml");
        std::fs::write(&path, "robots = 2\ntree_size = 30\n").expect("write");
        let run = RunArgs {
            config: path,
            size: None,
            robots: Some(6),
            seed: Some(1),
            strategy: None,
            max_steps: None,
        };
        let cfg = run.resolve().expect("resolve");
        assert_eq!(cfg.robots, 6);
        assert_eq!(cfg.tree_size, 30);
        assert_eq!(cfg.seed, Some(1));
    }

    #[test]
    fn robot_failures_map_to_their_exit_code() {
        let err = anyhow::Error::new(RobotFailedError {
            robot_id: 1,
            source: anyhow::anyhow!("boom"),
        });
        assert_eq!(exit_code_for(&err), exit_codes::ROBOT_FAILED);
        assert_eq!(exit_code_for(&anyhow::anyhow!("bad")), exit_codes::INVALID);
    }

    #[test]
    fn stalled_pulses_map_to_their_exit_code() {
        let err = anyhow::Error::new(PulseError::Timeout {
            waited: std::time::Duration::from_millis(60),
        });
        assert_eq!(exit_code_for(&err), exit_codes::PULSE_TIMEOUT);
        let poisoned = anyhow::Error::new(PulseError::Poisoned);
        assert_eq!(exit_code_for(&poisoned), exit_codes::INVALID);
    }
}
