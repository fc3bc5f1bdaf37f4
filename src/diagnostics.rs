//! Per-variable diagnostics of a sealed model
//!
//! One row per variable in execution order: kind, cycle membership,
//! evaluation mode, rank and the variables it calls. Written next to the
//! results so a model author can see how the engine planned the run.

use crate::graph::{CalcDirection, EvaluationMode};
use crate::model::{Model, VariableKind};
use anyhow::{Context, Result};
use serde::Serialize;
use std::io::Write;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiagnosticRow {
    pub name: String,
    pub kind: VariableKind,
    pub in_cycle: bool,
    pub evaluation_mode: EvaluationMode,
    /// Rank among acyclic variables; empty for cycle members
    pub topological_rank: Option<usize>,
    pub cycle_id: Option<usize>,
    /// Position in the global execution order
    pub calc_order: usize,
    pub calc_direction: CalcDirection,
    /// Called variables, space separated
    pub dependencies: String,
}

/// Build the diagnostic rows for a sealed model
pub fn report(model: &Model) -> Vec<DiagnosticRow> {
    let catalog = model.catalog();
    let schedule = model.schedule();
    let cycles = model.cycles();

    schedule
        .order()
        .iter()
        .map(|&id| {
            let cycle_id = cycles.cycle_of(id);
            let dependencies: Vec<&str> = model
                .dependencies()
                .callees(id)
                .map(|callee| catalog.name(callee))
                .collect();

            DiagnosticRow {
                name: catalog.name(id).to_string(),
                kind: catalog.kind(id),
                in_cycle: cycle_id.is_some(),
                evaluation_mode: schedule.mode(id),
                topological_rank: schedule.rank(id),
                cycle_id,
                calc_order: schedule.position(id),
                calc_direction: cycle_id
                    .map(|c| schedule.direction(c))
                    .unwrap_or(CalcDirection::Irrelevant),
                dependencies: dependencies.join(" "),
            }
        })
        .collect()
}

pub fn write_diagnostics<W: Write>(rows: &[DiagnosticRow], writer: W) -> Result<()> {
    let mut csv = csv::Writer::from_writer(writer);
    for row in rows {
        csv.serialize(row)
            .with_context(|| format!("Failed to write diagnostic row for '{}'", row.name))?;
    }
    csv.flush()?;
    Ok(())
}

pub fn save_diagnostics(rows: &[DiagnosticRow], path: &Path) -> Result<()> {
    let file = std::fs::File::create(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    write_diagnostics(rows, file)?;
    log::info!("Diagnostics written to {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ModelBuilder;

    fn model() -> Model {
        let mut b = ModelBuilder::new(4);
        b.constant("v", |_| Ok(0.95)).unwrap();
        b.time_indexed("cf", |_, t| Ok(10.0 * t as f64)).unwrap();
        b.time_indexed("reserve", |s, t| {
            Ok(s.at("cf", t)? + s.at("reserve", t + 1)? * s.value("v")?)
        })
        .unwrap();
        b.array("double_cf", |s| {
            Ok(s.series("cf")?.iter().map(|x| x * 2.0).collect())
        })
        .unwrap();
        b.seal().unwrap()
    }

    #[test]
    fn test_rows_follow_execution_order() {
        let rows = model().diagnostics();
        assert_eq!(rows.len(), 4);
        for (i, row) in rows.iter().enumerate() {
            assert_eq!(row.calc_order, i);
        }

        let reserve = rows.iter().find(|r| r.name == "reserve").unwrap();
        assert!(reserve.in_cycle);
        assert_eq!(reserve.cycle_id, Some(0));
        assert_eq!(reserve.topological_rank, None);
        assert_eq!(reserve.calc_direction, CalcDirection::Backward);
        assert_eq!(reserve.dependencies, "v cf reserve");

        let double = rows.iter().find(|r| r.name == "double_cf").unwrap();
        assert_eq!(double.evaluation_mode, EvaluationMode::Vectorized);
        assert!(double.topological_rank.is_some());
        assert_eq!(double.kind, VariableKind::Array);
    }

    #[test]
    fn test_csv_output() {
        let rows = model().diagnostics();
        let mut buf = Vec::new();
        write_diagnostics(&rows, &mut buf).unwrap();

        let text = String::from_utf8(buf).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next().unwrap(),
            "name,kind,in_cycle,evaluation_mode,topological_rank,cycle_id,calc_order,calc_direction,dependencies"
        );
        assert!(text.contains("reserve,time_indexed,true,scalar,,0,"));
        assert_eq!(lines.count(), 4);
    }

    #[test]
    fn test_save_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("diagnostic.csv");
        save_diagnostics(&model().diagnostics(), &path).unwrap();
        assert!(std::fs::read_to_string(&path).unwrap().starts_with("name,"));
    }
}
