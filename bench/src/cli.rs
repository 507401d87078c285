//! CLI command implementations.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, instrument};

use crate::report::aggregate;
use crate::run::{MeasureOptions, TSV_HEADER, measure_point};
use crate::series::{Series, Sweep};

#[derive(Debug, Clone)]
pub struct SeriesOptions {
    pub sweep: Sweep,
    pub measure: MeasureOptions,
    pub out_dir: PathBuf,
}

/// Run parameters persisted next to the TSV as `<name>.meta.json`.
#[derive(Debug, Serialize)]
pub struct BenchMeta {
    pub series: String,
    pub strategy: String,
    pub trees_per_point: usize,
    pub base_seed: u64,
    pub points: usize,
    pub start_time: String,
    pub end_time: String,
    pub duration_secs: f64,
}

/// Measure every data point of `series` and write them to a fresh TSV file.
///
/// Lines are flushed as they are measured so long series can be inspected
/// while running. Returns the TSV path.
#[instrument(skip_all, fields(series = %series))]
pub fn run_series(series: Series, options: &SeriesOptions) -> Result<PathBuf> {
    fs::create_dir_all(&options.out_dir)
        .with_context(|| format!("create {}", options.out_dir.display()))?;
    let started_at = Utc::now();
    let name = format!("{series}_{}", started_at.format("%Y%m%d_%H%M%S"));
    let tsv_path = options.out_dir.join(format!("{name}.tsv"));

    let mut file =
        File::create(&tsv_path).with_context(|| format!("create {}", tsv_path.display()))?;
    writeln!(file, "{TSV_HEADER}").context("write header")?;

    let points = series.points(&options.sweep);
    info!(points = points.len(), path = %tsv_path.display(), "series started");
    for (index, (tree_size, robots)) in points.iter().copied().enumerate() {
        debug!(tree_size, robots, "measuring");
        let measurement = measure_point(tree_size, robots, &options.measure)?;
        writeln!(file, "{}", measurement.tsv_line()).context("write measurement")?;
        file.flush().context("flush measurement")?;
        println!(
            "bench: {series} point {}/{} size={tree_size} robots={robots} time_ms={} steps={}",
            index + 1,
            points.len(),
            measurement.time_ms,
            measurement.steps
        );
    }
    let finished_at = Utc::now();

    let meta = BenchMeta {
        series: series.to_string(),
        strategy: options.measure.strategy.to_string(),
        trees_per_point: options.measure.trees,
        base_seed: options.measure.base_seed,
        points: points.len(),
        start_time: started_at.to_rfc3339(),
        end_time: finished_at.to_rfc3339(),
        duration_secs: duration_secs(started_at, finished_at),
    };
    write_meta(&options.out_dir.join(format!("{name}.meta.json")), &meta)?;
    info!(path = %tsv_path.display(), "series finished");
    Ok(tsv_path)
}

fn duration_secs(started_at: DateTime<Utc>, finished_at: DateTime<Utc>) -> f64 {
    (finished_at - started_at).num_milliseconds() as f64 / 1000.0
}

fn write_meta(path: &Path, meta: &BenchMeta) -> Result<()> {
    let mut payload = serde_json::to_string_pretty(meta).context("serialize meta")?;
    payload.push('\n');
    fs::write(path, payload).with_context(|| format!("write {}", path.display()))
}

/// Show aggregated results of a TSV file.
pub fn report_file(path: &Path) -> Result<()> {
    let (summary, warnings) = aggregate(path)?;
    println!("report: file={} points={}", path.display(), summary.points);
    if let Some(avg) = summary.avg_time_ms {
        println!("report: avg_time_ms={avg:.2}");
    }
    if let Some(avg) = summary.avg_steps {
        println!("report: avg_steps={avg:.2}");
    }
    if let Some(avg) = summary.avg_steps_per_node {
        println!("report: avg_steps_per_node={avg:.3}");
    }
    if let Some(slowest) = summary.slowest {
        println!(
            "report: most_steps size={} robots={} steps={}",
            slowest.tree_size, slowest.robots, slowest.steps
        );
    }
    for warning in warnings {
        eprintln!("warning: {}", warning);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::parse_line;
    use treeflood::pulse::PulseStrategy;

    #[test]
    fn series_writes_tsv_and_meta() {
        let temp = tempfile::tempdir().expect("tempdir");
        let options = SeriesOptions {
            sweep: Sweep {
                from: 0,
                to: 10,
                step: 5,
            },
            measure: MeasureOptions {
                trees: 2,
                strategy: PulseStrategy::Pooled,
                base_seed: 17,
            },
            out_dir: temp.path().join("results"),
        };

        let tsv = run_series(Series::FixedRobots { robots: 2 }, &options).expect("series");
        let contents = fs::read_to_string(&tsv).expect("read tsv");
        let mut lines = contents.lines();
        assert_eq!(lines.next(), Some(TSV_HEADER));
        let sizes: Vec<usize> = lines
            .map(|line| parse_line(line).expect("line").tree_size)
            .collect();
        assert_eq!(sizes, vec![1, 5, 10]);

        let meta_path = tsv.with_extension("meta.json");
        let meta: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(meta_path).expect("read meta")).expect("json");
        assert_eq!(meta["points"], 3);
        assert_eq!(meta["series"], "fixed-robots_2");
    }
}
