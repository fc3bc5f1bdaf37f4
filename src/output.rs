//! Result files
//!
//! Two layouts:
//! - Aggregated: one row per period, each variable summed over model points
//! - Individual: one row per model point and period
//!
//! File names carry the run's timestamp so repeated runs never overwrite
//! each other.

use crate::runner::BatchResult;
use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Per-variable series summed over every successful model point
pub fn aggregate(batch: &BatchResult) -> Vec<Vec<f64>> {
    let mut totals = vec![vec![0.0; batch.periods]; batch.variables.len()];
    for result in &batch.results {
        for (total, series) in totals.iter_mut().zip(&result.series) {
            for (acc, value) in total.iter_mut().zip(series) {
                *acc += value;
            }
        }
    }
    totals
}

pub fn write_aggregated<W: Write>(batch: &BatchResult, writer: W) -> Result<()> {
    let totals = aggregate(batch);
    let mut csv = csv::Writer::from_writer(writer);

    let mut header = vec!["t".to_string()];
    header.extend(batch.variables.iter().cloned());
    csv.write_record(&header)?;

    for t in 0..batch.periods {
        let mut record = vec![t.to_string()];
        record.extend(totals.iter().map(|series| series[t].to_string()));
        csv.write_record(&record)
            .with_context(|| format!("Failed to write aggregated row for t={}", t))?;
    }
    csv.flush()?;
    Ok(())
}

pub fn write_individual<W: Write>(batch: &BatchResult, writer: W) -> Result<()> {
    let mut csv = csv::Writer::from_writer(writer);

    let mut header = vec!["id".to_string(), "t".to_string()];
    header.extend(batch.variables.iter().cloned());
    csv.write_record(&header)?;

    for result in &batch.results {
        for t in 0..batch.periods {
            let mut record = vec![result.id.clone(), t.to_string()];
            record.extend(result.series.iter().map(|series| series[t].to_string()));
            csv.write_record(&record)
                .with_context(|| format!("Failed to write row for model point '{}'", result.id))?;
        }
    }
    csv.flush()?;
    Ok(())
}

/// `<dir>/<YYYYMMDD_HHMMSS>_<name>`
pub fn timestamped_path(dir: &Path, started: DateTime<Local>, name: &str) -> PathBuf {
    dir.join(format!("{}_{}", started.format("%Y%m%d_%H%M%S"), name))
}

/// Write the batch in the requested layout, returning the file written
pub fn save_results(
    batch: &BatchResult,
    aggregated: bool,
    dir: &Path,
    started: DateTime<Local>,
) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create output directory {}", dir.display()))?;

    let path = timestamped_path(dir, started, "output.csv");
    let file = std::fs::File::create(&path)
        .with_context(|| format!("Failed to create {}", path.display()))?;

    if aggregated {
        write_aggregated(batch, file)?;
    } else {
        write_individual(batch, file)?;
    }

    log::info!("Output written to {}", path.display());
    Ok(path)
}
