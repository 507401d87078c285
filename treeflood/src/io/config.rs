//! Exploration configuration stored as TOML (`treeflood.toml` by default).

use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::pulse::PulseStrategy;

/// Exploration configuration (TOML).
///
/// Missing fields default to a small run: 3 robots on a 10-node tree driven
/// by the persistent pulse manager.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ExplorationConfig {
    pub robots: usize,

    /// Number of nodes of the generated tree.
    pub tree_size: usize,

    /// Generator seed; a fresh one is drawn when absent.
    pub seed: Option<u64>,

    pub strategy: PulseStrategy,

    /// Fail a pulse whose barrier takes longer than this.
    ///
    /// The persistent strategy gives up waiting once it elapses. The pooled
    /// strategy can only report it after every robot returned, so a robot
    /// stuck forever still hangs a pooled exploration.
    pub pulse_timeout_ms: Option<u64>,

    /// Abort the exploration after this many protocol steps.
    pub max_steps: Option<u64>,
}

impl Default for ExplorationConfig {
    fn default() -> Self {
        Self {
            robots: 3,
            tree_size: 10,
            seed: None,
            strategy: PulseStrategy::default(),
            pulse_timeout_ms: None,
            max_steps: None,
        }
    }
}

impl ExplorationConfig {
    pub fn validate(&self) -> Result<()> {
        if self.robots == 0 {
            return Err(anyhow!("robots must be > 0"));
        }
        if self.tree_size == 0 {
            return Err(anyhow!("tree_size must be > 0"));
        }
        if self.pulse_timeout_ms == Some(0) {
            return Err(anyhow!("pulse_timeout_ms must be > 0"));
        }
        if self.max_steps == Some(0) {
            return Err(anyhow!("max_steps must be > 0"));
        }
        Ok(())
    }

    pub fn pulse_timeout(&self) -> Option<Duration> {
        self.pulse_timeout_ms.map(Duration::from_millis)
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `ExplorationConfig::default()`.
pub fn load_config(path: &Path) -> Result<ExplorationConfig> {
    if !path.exists() {
        let cfg = ExplorationConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: ExplorationConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()
        .with_context(|| format!("validate {}", path.display()))?;
    Ok(cfg)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &ExplorationConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    write_atomic(path, &buf)
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = path
        .parent()
        .with_context(|| format!("config path missing parent {}", path.display()))?;
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let tmp_path = path.with_extension("toml.tmp");
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp config {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace config {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_missing_returns_default() {
        let temp = tempfile::tempdir().expect("tempdir");
        let cfg = load_config(&temp.path().join("missing.toml")).expect("load");
        assert_eq!(cfg, ExplorationConfig::default());
    }

    #[test]
    fn write_then_load_round_trips() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("nested/config.toml");
        let cfg = ExplorationConfig {
            robots: 8,
            seed: Some(42),
            strategy: PulseStrategy::Pooled,
            pulse_timeout_ms: Some(500),
            ..ExplorationConfig::default()
        };
        write_config(&path, &cfg).expect("write");
        let loaded = load_config(&path).expect("load");
        assert_eq!(loaded, cfg);
        assert_eq!(loaded.pulse_timeout(), Some(Duration::from_millis(500)));
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("config.toml");
        fs::write(&path, "tree_size = 64\nstrategy = \"pooled\"\n").expect("write");
        let cfg = load_config(&path).expect("load");
        assert_eq!(cfg.tree_size, 64);
        assert_eq!(cfg.robots, 3);
        assert_eq!(cfg.strategy, PulseStrategy::Pooled);
    }

    #[test]
    fn zero_robots_rejected() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("config.toml");
        fs::write(&path, "robots = 0\n").expect("write");
        let err = load_config(&path).expect_err("invalid");
        assert!(format!("{err:#}").contains("robots must be > 0"));
    }
}
