//! Model definition: variable catalog, horizon, and the sealed model
//!
//! A model is defined with a [`ModelBuilder`] and then sealed. Sealing runs
//! dependency extraction, cycle detection and scheduling, and returns an
//! immutable [`Model`] that any number of model-point runs can share.
//!
//! # Example
//!
//! ```rust,ignore
//! use cashflow_engine::model::ModelBuilder;
//!
//! let mut builder = ModelBuilder::new(12);
//! builder.constant("rate", |_| Ok(0.01))?;
//! builder.time_indexed("fund", |s, t| {
//!     let prior = if t == 0 { 100.0 } else { s.at("fund", t - 1)? };
//!     Ok(prior * (1.0 + s.value("rate")?))
//! })?;
//! let model = builder.seal()?;
//! let run = model.run(&point);
//! println!("{}", run.value_at("fund", 12)?);
//! ```

mod catalog;
mod horizon;
mod variable;

pub use catalog::Catalog;
pub use horizon::Horizon;
pub use variable::{ArrayFn, ConstantFn, Formula, PeriodFn, Variable, VariableId, VariableKind};

use crate::diagnostics::{self, DiagnosticRow};
use crate::error::Result;
use crate::evaluation::{Run, Scope};
use crate::graph::{self, CycleReport, Dependencies, DependencyGraph, Schedule};
use crate::input::ModelPoint;

/// Model under construction
#[derive(Debug, Clone)]
pub struct ModelBuilder {
    horizon: Horizon,
    catalog: Catalog,
}

impl ModelBuilder {
    /// Start a model projecting over periods `0..=t_max`
    pub fn new(t_max: usize) -> Self {
        Self {
            horizon: Horizon::new(t_max),
            catalog: Catalog::new(),
        }
    }

    pub fn horizon(&self) -> Horizon {
        self.horizon
    }

    pub fn register(&mut self, name: &str, formula: Formula) -> Result<VariableId> {
        self.catalog.register(name, formula)
    }

    pub fn constant<F>(&mut self, name: &str, f: F) -> Result<VariableId>
    where
        F: Fn(&dyn Scope) -> Result<f64> + Send + Sync + 'static,
    {
        self.register(name, Formula::constant(f))
    }

    pub fn time_indexed<F>(&mut self, name: &str, f: F) -> Result<VariableId>
    where
        F: Fn(&dyn Scope, i64) -> Result<f64> + Send + Sync + 'static,
    {
        self.register(name, Formula::time_indexed(f))
    }

    pub fn array<F>(&mut self, name: &str, f: F) -> Result<VariableId>
    where
        F: Fn(&dyn Scope) -> Result<Vec<f64>> + Send + Sync + 'static,
    {
        self.register(name, Formula::array(f))
    }

    /// Declare dependencies that probing cannot see (e.g. behind data-dependent branches)
    pub fn depends_on(&mut self, name: &str, dependencies: &[&str]) -> Result<()> {
        self.catalog.declare_dependencies(name, dependencies)
    }

    /// Seal the catalog and build the dependency graph, cycles and schedule
    pub fn seal(mut self) -> Result<Model> {
        self.catalog.seal();

        let dependencies = graph::extract(&self.catalog, self.horizon)?;
        let graph = DependencyGraph::build(&self.catalog, &dependencies);
        let cycles = graph::detect_cycles(&graph);
        let schedule = graph::schedule(&self.catalog, &graph, &cycles, &dependencies)?;

        log::info!(
            "Sealed model: {} variables, {} dependencies, {} cycle(s), horizon 0..={}",
            self.catalog.len(),
            graph.edge_count(),
            cycles.cycle_count(),
            self.horizon.t_max()
        );

        Ok(Model {
            horizon: self.horizon,
            catalog: self.catalog,
            dependencies,
            graph,
            cycles,
            schedule,
        })
    }
}

/// A sealed, immutable model
///
/// Holds no per-run state: every evaluation goes through a [`Run`], so one
/// model can be shared by reference across threads.
#[derive(Debug)]
pub struct Model {
    horizon: Horizon,
    catalog: Catalog,
    dependencies: Dependencies,
    graph: DependencyGraph,
    cycles: CycleReport,
    schedule: Schedule,
}

impl Model {
    pub fn horizon(&self) -> Horizon {
        self.horizon
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn dependencies(&self) -> &Dependencies {
        &self.dependencies
    }

    pub fn graph(&self) -> &DependencyGraph {
        &self.graph
    }

    pub fn cycles(&self) -> &CycleReport {
        &self.cycles
    }

    pub fn schedule(&self) -> &Schedule {
        &self.schedule
    }

    /// Re-run dependency extraction against the sealed catalog
    pub fn extract_dependencies(&self) -> Result<Dependencies> {
        graph::extract(&self.catalog, self.horizon)
    }

    /// Every variable needed to compute `name`, in execution order
    pub fn ancestors(&self, name: &str) -> Result<Vec<&str>> {
        let id = self.catalog.resolve(name, None)?;
        let mut needed = self.graph.requirements(id);
        needed.retain(|&dep| dep != id);
        needed.sort_by_key(|&dep| self.schedule.position(dep));
        Ok(needed.into_iter().map(|dep| self.catalog.name(dep)).collect())
    }

    /// One diagnostic row per variable, in execution order
    pub fn diagnostics(&self) -> Vec<DiagnosticRow> {
        diagnostics::report(self)
    }

    /// Start an isolated evaluation for one model point
    pub fn run<'m>(&'m self, point: &'m ModelPoint) -> Run<'m> {
        Run::new(self, point)
    }
}
