use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow};

use crate::run::{Measurement, TSV_HEADER};

#[derive(Debug, Default, PartialEq)]
pub struct ReportSummary {
    pub points: usize,
    pub avg_time_ms: Option<f64>,
    pub avg_steps: Option<f64>,
    /// Data point with the most protocol steps.
    pub slowest: Option<Measurement>,
    /// Mean of `steps / tree_size` over all points.
    pub avg_steps_per_node: Option<f64>,
}

pub fn parse_line(line: &str) -> Result<Measurement> {
    let fields: Vec<&str> = line.split('\t').collect();
    let [tree_size, robots, time_ms, steps] = fields.as_slice() else {
        return Err(anyhow!("expected 4 columns, found {}", fields.len()));
    };
    Ok(Measurement {
        tree_size: tree_size.trim().parse().context("parse TREE_SIZE")?,
        robots: robots.trim().parse().context("parse ROBOTS")?,
        time_ms: time_ms.trim().parse().context("parse TIME_MS")?,
        steps: steps.trim().parse().context("parse STEPS")?,
    })
}

/// Summarize one result file. Malformed lines are skipped with a warning.
pub fn aggregate(path: &Path) -> Result<(ReportSummary, Vec<String>)> {
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let mut summary = ReportSummary::default();
    let mut warnings = Vec::new();
    let mut total_time = 0.0;
    let mut total_steps = 0.0;
    let mut total_steps_per_node = 0.0;

    let mut lines = contents.lines().enumerate();
    match lines.next() {
        Some((_, header)) if header.trim() == TSV_HEADER => {}
        Some((_, header)) => warnings.push(format!("unexpected header '{header}'")),
        None => return Ok((summary, warnings)),
    }

    for (index, line) in lines {
        if line.trim().is_empty() {
            continue;
        }
        let measurement = match parse_line(line) {
            Ok(measurement) => measurement,
            Err(err) => {
                warnings.push(format!("skip line {}: {err:#}", index + 1));
                continue;
            }
        };

        summary.points += 1;
        total_time += measurement.time_ms as f64;
        total_steps += measurement.steps as f64;
        total_steps_per_node += measurement.steps as f64 / measurement.tree_size.max(1) as f64;
        if summary
            .slowest
            .is_none_or(|slowest| measurement.steps > slowest.steps)
        {
            summary.slowest = Some(measurement);
        }
    }

    if summary.points > 0 {
        let points = summary.points as f64;
        summary.avg_time_ms = Some(total_time / points);
        summary.avg_steps = Some(total_steps / points);
        summary.avg_steps_per_node = Some(total_steps_per_node / points);
    }
    Ok((summary, warnings))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_line_reads_all_columns() {
        let measurement = parse_line("10\t2\t7\t45").expect("parse");
        assert_eq!(
            measurement,
            Measurement {
                tree_size: 10,
                robots: 2,
                time_ms: 7,
                steps: 45,
            }
        );
        assert!(parse_line("10\t2\t7").is_err());
        assert!(parse_line("10\tx\t7\t45").is_err());
    }

    #[test]
    fn aggregate_averages_and_warns() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("series.tsv");
        fs::write(
            &path,
            format!("{TSV_HEADER}\n10\t1\t4\t40\n20\t1\t6\t100\nbroken\n"),
        )
        .expect("write");

        let (summary, warnings) = aggregate(&path).expect("aggregate");
        assert_eq!(summary.points, 2);
        assert_eq!(summary.avg_time_ms, Some(5.0));
        assert_eq!(summary.avg_steps, Some(70.0));
        assert_eq!(summary.avg_steps_per_node, Some(4.5));
        assert_eq!(summary.slowest.map(|m| m.tree_size), Some(20));
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].starts_with("skip line 4"));
    }

    #[test]
    fn empty_file_has_no_points() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("empty.tsv");
        fs::write(&path, "").expect("write");
        let (summary, warnings) = aggregate(&path).expect("aggregate");
        assert_eq!(summary, ReportSummary::default());
        assert!(warnings.is_empty());
    }
}
