//! Cashflow Engine CLI
//!
//! Runs a bundled model over a file of model points and writes the results

use anyhow::{Context, Result};
use cashflow_engine::diagnostics::save_diagnostics;
use cashflow_engine::input::load_model_points;
use cashflow_engine::models::endowment;
use cashflow_engine::output::{save_results, timestamped_path};
use cashflow_engine::{Model, ModelRunner, Settings};
use chrono::Local;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Instant;

/// CLI arguments
#[derive(Parser, Debug)]
#[command(name = "cashflow-engine")]
#[command(about = "Project actuarial cash flows for a file of model points")]
struct Args {
    /// Model points CSV (header row, one point per row)
    #[arg(long)]
    model_points: PathBuf,

    /// Settings JSON; defaults apply to anything missing
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Directory for result and diagnostic files
    #[arg(long, default_value = "output")]
    output_dir: PathBuf,

    /// Override the calculation horizon from the settings file
    #[arg(long)]
    t_max: Option<usize>,

    /// Model to run
    #[arg(long, value_enum, default_value_t = ModelChoice::Endowment)]
    model: ModelChoice,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ModelChoice {
    Endowment,
}

impl ModelChoice {
    fn build(self, t_max: usize) -> cashflow_engine::Result<Model> {
        match self {
            ModelChoice::Endowment => endowment::build(t_max),
        }
    }
}

fn main() -> ExitCode {
    env_logger::init();

    match run(Args::parse()) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(err) => {
            eprintln!("Error: {:#}", err);
            ExitCode::FAILURE
        }
    }
}

/// Returns whether every model point succeeded
fn run(args: Args) -> Result<bool> {
    let start = Instant::now();
    let started = Local::now();

    let mut settings = match &args.settings {
        Some(path) => Settings::load(path)?,
        None => Settings::default(),
    };
    if let Some(t_max) = args.t_max {
        settings = settings.with_t_max(t_max);
    }

    println!("Cashflow Engine v{}", env!("CARGO_PKG_VERSION"));
    println!("======================\n");

    let points = load_model_points(&args.model_points, &settings.id_column)?;
    println!("Loaded {} model point(s) in {:?}", points.len(), start.elapsed());

    let model = args
        .model
        .build(settings.t_max_calculation)
        .with_context(|| format!("Failed to build the {:?} model", args.model))?;
    println!(
        "Model: {} variables, {} cycle(s), horizon 0..={}",
        model.catalog().len(),
        model.cycles().cycle_count(),
        model.horizon().t_max()
    );

    let model = Arc::new(model);
    let runner = ModelRunner::new(model.clone(), settings.clone())?;

    let proj_start = Instant::now();
    let batch = runner.run_batch(&points);
    println!("Projections complete in {:?}", proj_start.elapsed());

    let output_path = save_results(&batch, settings.aggregate, &args.output_dir, started)?;
    println!("Output written to {}", output_path.display());

    if settings.save_diagnostic {
        let path = timestamped_path(&args.output_dir, started, "diagnostic.csv");
        save_diagnostics(&model.diagnostics(), &path)?;
        println!("Diagnostics written to {}", path.display());
    }

    if !batch.is_success() {
        println!("\n{} model point(s) failed:", batch.failures.len());
        for failure in &batch.failures {
            println!("  {}: {}", failure.id, failure.error);
        }
    }

    println!("\nTotal time: {:?}", start.elapsed());
    Ok(batch.is_success())
}
