//! Cycle detection over the dependency graph
//!
//! A cycle is a strongly connected component with more than one member, or a
//! single variable that calls itself. Components come from petgraph's Tarjan
//! implementation, which runs in O(V + E).

use super::DependencyGraph;
use crate::model::VariableId;
use petgraph::algo::tarjan_scc;

/// Index of a cycle in [`CycleReport::cycles`]
pub type CycleId = usize;

/// Cycle membership of every variable
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleReport {
    cycle_of: Vec<Option<CycleId>>,
    /// Members of each cycle in declaration order; cycles ordered by first member
    cycles: Vec<Vec<VariableId>>,
}

impl CycleReport {
    pub fn in_cycle(&self, id: VariableId) -> bool {
        self.cycle_of[id.index()].is_some()
    }

    pub fn cycle_of(&self, id: VariableId) -> Option<CycleId> {
        self.cycle_of[id.index()]
    }

    pub fn members(&self, cycle: CycleId) -> &[VariableId] {
        &self.cycles[cycle]
    }

    pub fn cycles(&self) -> &[Vec<VariableId>] {
        &self.cycles
    }

    pub fn cycle_count(&self) -> usize {
        self.cycles.len()
    }

    /// Number of variables flagged as cyclic
    pub fn cyclic_variable_count(&self) -> usize {
        self.cycle_of.iter().filter(|c| c.is_some()).count()
    }
}

/// Find every cycle in the graph
pub fn detect_cycles(graph: &DependencyGraph) -> CycleReport {
    let inner = graph.inner();

    let mut cycles: Vec<Vec<VariableId>> = tarjan_scc(inner)
        .into_iter()
        .filter(|scc| scc.len() > 1 || inner.contains_edge(scc[0], scc[0]))
        .map(|scc| {
            let mut members: Vec<VariableId> = scc.into_iter().map(|nx| inner[nx]).collect();
            members.sort();
            members
        })
        .collect();
    cycles.sort_by_key(|members| members[0]);

    let mut cycle_of = vec![None; graph.node_count()];
    for (cycle, members) in cycles.iter().enumerate() {
        for member in members {
            cycle_of[member.index()] = Some(cycle);
        }
    }

    if !cycles.is_empty() {
        log::debug!(
            "Found {} cycle(s) covering {} variable(s)",
            cycles.len(),
            cycle_of.iter().filter(|c| c.is_some()).count()
        );
    }

    CycleReport { cycle_of, cycles }
}
