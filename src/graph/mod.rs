//! Dependency analysis: call-set extraction, cycle detection and scheduling
//!
//! # Architecture
//!
//! Sealing a catalog runs three passes, each consuming the previous one's output:
//! 1. **Extraction** probes every formula and records the variables it references
//! 2. **Cycle detection** finds strongly connected components of the call graph
//! 3. **Scheduling** picks an evaluation mode per variable and a global order
//!
//! All three results are immutable once built and may be shared across threads.

mod extract;
mod cycles;
mod schedule;

pub use extract::{extract, calc_direction, CallShape, CalcDirection, Dependencies};
pub use cycles::{detect_cycles, CycleId, CycleReport};
pub use schedule::{schedule, EvaluationMode, Schedule, Step};

use crate::model::{Catalog, VariableId};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::Bfs;
use petgraph::Direction;

/// Directed call graph over all catalog variables (edges run caller → callee)
///
/// Node `i` is the variable declared `i`-th.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    graph: DiGraph<VariableId, ()>,
}

impl DependencyGraph {
    /// Build the graph from extracted call sets
    pub fn build(catalog: &Catalog, dependencies: &Dependencies) -> Self {
        let mut graph = DiGraph::with_capacity(catalog.len(), dependencies.edge_count());
        for variable in catalog.iter() {
            graph.add_node(variable.id());
        }
        for (caller, callee) in dependencies.edges() {
            graph.add_edge(node(caller), node(callee), ());
        }
        Self { graph }
    }

    /// Build a graph straight from an edge list, without formulas
    #[cfg(test)]
    pub(crate) fn from_edges(variables: usize, edges: &[(usize, usize)]) -> Self {
        let mut graph = DiGraph::with_capacity(variables, edges.len());
        for i in 0..variables {
            graph.add_node(VariableId(i));
        }
        for &(caller, callee) in edges {
            if !graph.contains_edge(NodeIndex::new(caller), NodeIndex::new(callee)) {
                graph.add_edge(NodeIndex::new(caller), NodeIndex::new(callee), ());
            }
        }
        Self { graph }
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Variables `id` calls, ascending by declaration order
    pub fn callees(&self, id: VariableId) -> Vec<VariableId> {
        self.neighbors(id, Direction::Outgoing)
    }

    /// Variables that call `id`, ascending by declaration order
    pub fn callers(&self, id: VariableId) -> Vec<VariableId> {
        self.neighbors(id, Direction::Incoming)
    }

    pub fn has_self_loop(&self, id: VariableId) -> bool {
        self.graph.contains_edge(node(id), node(id))
    }

    /// Every variable reachable from `id` through calls, excluding `id` itself
    /// unless it sits on a cycle through itself
    pub fn requirements(&self, id: VariableId) -> Vec<VariableId> {
        let mut found = Vec::new();
        for start in self.graph.neighbors_directed(node(id), Direction::Outgoing) {
            let mut bfs = Bfs::new(&self.graph, start);
            while let Some(nx) = bfs.next(&self.graph) {
                found.push(self.graph[nx]);
            }
        }
        found.sort();
        found.dedup();
        found
    }

    pub(crate) fn inner(&self) -> &DiGraph<VariableId, ()> {
        &self.graph
    }

    fn neighbors(&self, id: VariableId, direction: Direction) -> Vec<VariableId> {
        let mut out: Vec<VariableId> = self
            .graph
            .neighbors_directed(node(id), direction)
            .map(|nx| self.graph[nx])
            .collect();
        out.sort();
        out.dedup();
        out
    }
}

fn node(id: VariableId) -> NodeIndex {
    NodeIndex::new(id.index())
}

/// Small deterministic generator so generated graph cases are reproducible
#[cfg(test)]
pub(crate) struct Lcg(pub(crate) u64);

#[cfg(test)]
impl Lcg {
    pub(crate) fn next(&mut self, bound: usize) -> usize {
        self.0 = self.0.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        ((self.0 >> 33) % bound as u64) as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_neighbors_and_requirements() {
        // 0 <- 1 <- 2, 3 isolated, 2 -> 0 directly as well
        let graph = DependencyGraph::from_edges(4, &[(1, 0), (2, 1), (2, 0), (2, 1)]);

        assert_eq!(graph.edge_count(), 3);
        assert_eq!(graph.callees(VariableId(2)), vec![VariableId(0), VariableId(1)]);
        assert_eq!(graph.callers(VariableId(0)), vec![VariableId(1), VariableId(2)]);
        assert_eq!(graph.requirements(VariableId(2)), vec![VariableId(0), VariableId(1)]);
        assert!(graph.requirements(VariableId(3)).is_empty());
        assert!(!graph.has_self_loop(VariableId(1)));
    }

    #[test]
    fn test_requirements_include_self_on_cycle() {
        let graph = DependencyGraph::from_edges(3, &[(0, 1), (1, 0), (2, 2)]);
        assert_eq!(graph.requirements(VariableId(0)), vec![VariableId(0), VariableId(1)]);
        assert_eq!(graph.requirements(VariableId(2)), vec![VariableId(2)]);
        assert!(graph.has_self_loop(VariableId(2)));
    }
}
