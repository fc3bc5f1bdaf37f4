//! Evaluation scheduling
//!
//! Decides, for every variable, whether it is evaluated period by period
//! (scalar mode) or for the whole horizon in one call (vectorized mode), and
//! lays out a global execution plan:
//!
//! - Each cycle is scheduled as one unit; every other variable is its own unit
//! - Units are ordered topologically (Kahn's algorithm on the condensed graph),
//!   ties broken by the earliest declaration in the unit
//! - Every scalar variable a vectorized one reaches is materialized for the
//!   whole horizon before the vectorized formula runs

use super::cycles::{CycleId, CycleReport};
use super::extract::{calc_direction, CalcDirection, Dependencies};
use super::DependencyGraph;
use crate::error::{ModelError, Result};
use crate::model::{Catalog, VariableId, VariableKind};
use serde::Serialize;
use std::cmp::Reverse;
use std::collections::{BTreeSet, BinaryHeap, HashSet};
use std::fmt;

/// How a variable's values are produced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EvaluationMode {
    /// One period at a time, memoized per `(variable, t)`
    Scalar,
    /// The whole horizon in one formula call
    Vectorized,
}

impl fmt::Display for EvaluationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EvaluationMode::Scalar => f.write_str("scalar"),
            EvaluationMode::Vectorized => f.write_str("vectorized"),
        }
    }
}

/// One entry of the execution plan
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Evaluate a constant once
    Constant(VariableId),
    /// Evaluate an acyclic time-indexed variable period by period
    Scalar(VariableId),
    /// Sweep a cycle's periods, members in declaration order within each period
    Cycle(CycleId),
    /// Compute every period of a scalar variable ahead of a vectorized consumer
    Materialize(VariableId),
    /// Run an array formula over the whole horizon
    Vectorize(VariableId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Unit {
    Variable(VariableId),
    Cycle(CycleId),
}

/// Execution plan and per-variable scheduling metadata
#[derive(Debug, Clone)]
pub struct Schedule {
    steps: Vec<Step>,
    /// Global execution order, cycle members expanded in declaration order
    order: Vec<VariableId>,
    positions: Vec<usize>,
    modes: Vec<EvaluationMode>,
    /// Topological rank among acyclic variables
    ranks: Vec<Option<usize>>,
    directions: Vec<CalcDirection>,
    /// Scalar variables to materialize before each vectorized variable runs
    prerequisites: Vec<Vec<VariableId>>,
}

impl Schedule {
    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn order(&self) -> &[VariableId] {
        &self.order
    }

    /// Position of `id` in the global execution order
    pub fn position(&self, id: VariableId) -> usize {
        self.positions[id.index()]
    }

    pub fn mode(&self, id: VariableId) -> EvaluationMode {
        self.modes[id.index()]
    }

    /// Topological rank of an acyclic variable; `None` for cycle members
    pub fn rank(&self, id: VariableId) -> Option<usize> {
        self.ranks[id.index()]
    }

    /// Sweep direction of a cycle
    pub fn direction(&self, cycle: CycleId) -> CalcDirection {
        self.directions[cycle]
    }

    /// Scalar variables that must be fully materialized before `id` is vectorized
    pub fn prerequisites(&self, id: VariableId) -> &[VariableId] {
        &self.prerequisites[id.index()]
    }
}

/// Build the execution plan for a sealed catalog
pub fn schedule(
    catalog: &Catalog,
    graph: &DependencyGraph,
    cycles: &CycleReport,
    dependencies: &Dependencies,
) -> Result<Schedule> {
    // 1. Array variables can never sit on a cycle
    for variable in catalog.iter() {
        if variable.kind() != VariableKind::Array {
            continue;
        }
        if let Some(cycle) = cycles.cycle_of(variable.id()) {
            return Err(ModelError::ArrayCycleConflict {
                variable: variable.name().to_string(),
                cycle: cycles
                    .members(cycle)
                    .iter()
                    .map(|&m| catalog.name(m).to_string())
                    .collect(),
            });
        }
    }

    let modes: Vec<EvaluationMode> = catalog
        .iter()
        .map(|v| match v.kind() {
            VariableKind::Array => EvaluationMode::Vectorized,
            VariableKind::Constant | VariableKind::TimeIndexed => EvaluationMode::Scalar,
        })
        .collect();

    // 2. Condense cycles into units. Units are created in declaration order of
    //    their first member, so the unit index doubles as the tie-break key.
    let mut units: Vec<Unit> = Vec::new();
    let mut unit_of = vec![usize::MAX; catalog.len()];
    let mut cycle_unit = vec![usize::MAX; cycles.cycle_count()];
    for variable in catalog.iter() {
        let id = variable.id();
        unit_of[id.index()] = match cycles.cycle_of(id) {
            Some(cycle) => {
                if cycle_unit[cycle] == usize::MAX {
                    cycle_unit[cycle] = units.len();
                    units.push(Unit::Cycle(cycle));
                }
                cycle_unit[cycle]
            }
            None => {
                units.push(Unit::Variable(id));
                units.len() - 1
            }
        };
    }

    // 3. Kahn's algorithm over the condensed graph: a callee's unit runs
    //    before its caller's unit
    let mut unit_edges: BTreeSet<(usize, usize)> = BTreeSet::new();
    for (caller, callee) in dependencies.edges() {
        let (from, to) = (unit_of[callee.index()], unit_of[caller.index()]);
        if from != to {
            unit_edges.insert((from, to));
        }
    }

    let mut in_degree = vec![0usize; units.len()];
    let mut successors: Vec<Vec<usize>> = vec![Vec::new(); units.len()];
    for &(from, to) in &unit_edges {
        in_degree[to] += 1;
        successors[from].push(to);
    }

    let mut ready: BinaryHeap<Reverse<usize>> = in_degree
        .iter()
        .enumerate()
        .filter(|(_, &d)| d == 0)
        .map(|(u, _)| Reverse(u))
        .collect();
    let mut unit_order = Vec::with_capacity(units.len());

    while let Some(Reverse(unit)) = ready.pop() {
        unit_order.push(unit);
        for &next in &successors[unit] {
            in_degree[next] -= 1;
            if in_degree[next] == 0 {
                ready.push(Reverse(next));
            }
        }
    }
    debug_assert_eq!(
        unit_order.len(),
        units.len(),
        "condensed dependency graph must be acyclic"
    );

    // 4. Expand units into the global order and assign ranks
    let mut order = Vec::with_capacity(catalog.len());
    let mut ranks = vec![None; catalog.len()];
    let mut next_rank = 0;
    for &unit in &unit_order {
        match units[unit] {
            Unit::Variable(id) => {
                ranks[id.index()] = Some(next_rank);
                next_rank += 1;
                order.push(id);
            }
            Unit::Cycle(cycle) => order.extend_from_slice(cycles.members(cycle)),
        }
    }
    let mut positions = vec![0; catalog.len()];
    for (position, id) in order.iter().enumerate() {
        positions[id.index()] = position;
    }

    let directions: Vec<CalcDirection> = cycles
        .cycles()
        .iter()
        .map(|members| calc_direction(dependencies, members))
        .collect();

    // 5. Emit steps, inserting materialization ahead of vectorized consumers
    let mut steps = Vec::with_capacity(order.len());
    let mut prerequisites = vec![Vec::new(); catalog.len()];
    let mut materialized: HashSet<VariableId> = HashSet::new();

    for &unit in &unit_order {
        match units[unit] {
            Unit::Cycle(cycle) => steps.push(Step::Cycle(cycle)),
            Unit::Variable(id) => match catalog.kind(id) {
                VariableKind::Constant => steps.push(Step::Constant(id)),
                VariableKind::TimeIndexed => steps.push(Step::Scalar(id)),
                VariableKind::Array => {
                    let mut needed: Vec<VariableId> = graph
                        .requirements(id)
                        .into_iter()
                        .filter(|&dep| catalog.kind(dep) == VariableKind::TimeIndexed)
                        .collect();
                    needed.sort_by_key(|dep| positions[dep.index()]);

                    for &dep in &needed {
                        if materialized.insert(dep) {
                            steps.push(Step::Materialize(dep));
                        }
                    }
                    prerequisites[id.index()] = needed;
                    steps.push(Step::Vectorize(id));
                }
            },
        }
    }

    log::debug!(
        "Scheduled {} variable(s) in {} unit(s), {} step(s)",
        order.len(),
        units.len(),
        steps.len()
    );

    Ok(Schedule {
        steps,
        order,
        positions,
        modes,
        ranks,
        directions,
        prerequisites,
    })
}
