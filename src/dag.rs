//! Dependency-graph compilation of clause sets.
//!
//! `build_dag` resolves explicit dependencies and implicit data dependencies
//! (one clause's outputs intersecting another's inputs) into a dependency-
//! ordered list of executable nodes. Ordering is deterministic: a stable
//! topological sort by declaration order, so two compiles of identical input
//! produce structurally equal node lists. A cycle is a compile-time error.

use std::collections::{BinaryHeap, HashMap, HashSet};

use petgraph::Direction;
use petgraph::graph::{DiGraph, NodeIndex};
use serde::{Deserialize, Serialize};

use crate::clause::{ClauseInput, CompiledClause, parse_clause};
use crate::error::CompileError;

/// A compiled clause with resolved dependency edges.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DagNode {
    /// The original clause input.
    pub clause: ClauseInput,
    /// The parsed guard and action.
    pub compiled: CompiledClause,
    /// Ids of clauses that must fire before this one.
    pub predecessors: Vec<String>,
    /// Ids of clauses that depend on this one.
    pub successors: Vec<String>,
}

impl DagNode {
    /// Compile a single clause with no resolved edges (used when grafting a
    /// replacement node into an existing kernel).
    pub fn compile_standalone(clause: &ClauseInput) -> Result<DagNode, CompileError> {
        Ok(DagNode {
            clause: clause.clone(),
            compiled: parse_clause(&clause.raw_clause)?,
            predecessors: Vec::new(),
            successors: Vec::new(),
        })
    }
}

/// Build a dependency-ordered DAG from a clause set.
///
/// Fails with [`CompileError::Cycle`] if explicit plus implicit dependencies
/// form a cycle, and produces no partial output in that case.
pub fn build_dag(clauses: &[ClauseInput]) -> Result<Vec<DagNode>, CompileError> {
    // Unique ids, declaration-order index.
    let mut index: HashMap<&str, usize> = HashMap::new();
    for (i, clause) in clauses.iter().enumerate() {
        if index.insert(clause.id.as_str(), i).is_some() {
            return Err(CompileError::DuplicateClause {
                id: clause.id.clone(),
            });
        }
    }

    // Parse every clause before wiring edges so malformed input fails fast.
    let compiled: Vec<CompiledClause> = clauses
        .iter()
        .map(|c| parse_clause(&c.raw_clause))
        .collect::<Result<_, _>>()?;

    let mut graph: DiGraph<usize, ()> = DiGraph::with_capacity(clauses.len(), clauses.len());
    let nodes: Vec<NodeIndex> = (0..clauses.len()).map(|i| graph.add_node(i)).collect();
    let mut edges: HashSet<(usize, usize)> = HashSet::new();

    // Explicit dependencies: dep must fire before the declaring clause.
    for (i, clause) in clauses.iter().enumerate() {
        for dep in &clause.dependencies {
            let &j = index
                .get(dep.as_str())
                .ok_or_else(|| CompileError::UnknownDependency {
                    id: clause.id.clone(),
                    dependency: dep.clone(),
                })?;
            if j != i {
                edges.insert((j, i));
            }
        }
    }

    // Implicit data dependencies: producer before consumer. A clause reading
    // its own output is self-referential, not an edge.
    for (i, producer) in clauses.iter().enumerate() {
        if producer.outputs.is_empty() {
            continue;
        }
        let outputs: HashSet<&str> = producer.outputs.iter().map(String::as_str).collect();
        for (j, consumer) in clauses.iter().enumerate() {
            if i == j {
                continue;
            }
            if consumer.inputs.iter().any(|v| outputs.contains(v.as_str())) {
                edges.insert((i, j));
            }
        }
    }

    for &(from, to) in &edges {
        graph.add_edge(nodes[from], nodes[to], ());
    }

    // Kahn's algorithm with a min-heap on declaration index: the ready set is
    // always drained in declaration order, which makes the result stable.
    let mut in_degree: Vec<usize> = nodes
        .iter()
        .map(|&n| graph.neighbors_directed(n, Direction::Incoming).count())
        .collect();
    let mut ready: BinaryHeap<std::cmp::Reverse<usize>> = (0..clauses.len())
        .filter(|&i| in_degree[i] == 0)
        .map(std::cmp::Reverse)
        .collect();

    let mut order: Vec<usize> = Vec::with_capacity(clauses.len());
    while let Some(std::cmp::Reverse(i)) = ready.pop() {
        order.push(i);
        for succ in graph.neighbors_directed(nodes[i], Direction::Outgoing) {
            let j = graph[succ];
            in_degree[j] -= 1;
            if in_degree[j] == 0 {
                ready.push(std::cmp::Reverse(j));
            }
        }
    }

    if order.len() < clauses.len() {
        let mut remaining: Vec<&str> = (0..clauses.len())
            .filter(|i| !order.contains(i))
            .map(|i| clauses[i].id.as_str())
            .collect();
        remaining.sort_unstable();
        return Err(CompileError::Cycle {
            ids: remaining.join(", "),
        });
    }

    // Materialize nodes in topological order with id-level edge lists.
    let mut result = Vec::with_capacity(clauses.len());
    for &i in &order {
        let mut predecessors: Vec<usize> = edges
            .iter()
            .filter(|&&(_, to)| to == i)
            .map(|&(from, _)| from)
            .collect();
        let mut successors: Vec<usize> = edges
            .iter()
            .filter(|&&(from, _)| from == i)
            .map(|&(_, to)| to)
            .collect();
        predecessors.sort_unstable();
        successors.sort_unstable();

        result.push(DagNode {
            clause: clauses[i].clone(),
            compiled: compiled[i].clone(),
            predecessors: predecessors
                .into_iter()
                .map(|p| clauses[p].id.clone())
                .collect(),
            successors: successors
                .into_iter()
                .map(|s| clauses[s].id.clone())
                .collect(),
        });
    }

    tracing::debug!(
        clauses = clauses.len(),
        edges = edges.len(),
        "compiled clause set into DAG"
    );
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clause(id: &str, raw: &str) -> ClauseInput {
        ClauseInput::new(id, raw)
    }

    #[test]
    fn single_clause_compiles() {
        let nodes = build_dag(&[clause("a", "WHEN always THEN SET x = 1")]).unwrap();
        assert_eq!(nodes.len(), 1);
        assert!(nodes[0].predecessors.is_empty());
    }

    #[test]
    fn explicit_dependency_orders_nodes() {
        let clauses = [
            clause("b", "WHEN always THEN SET y = 2").with_dependency("a"),
            clause("a", "WHEN always THEN SET x = 1"),
        ];
        let nodes = build_dag(&clauses).unwrap();
        let ids: Vec<&str> = nodes.iter().map(|n| n.clause.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert_eq!(nodes[1].predecessors, vec!["a".to_string()]);
        assert_eq!(nodes[0].successors, vec!["b".to_string()]);
    }

    #[test]
    fn implicit_data_dependency_orders_nodes() {
        let clauses = [
            clause("consumer", "WHEN x == 1 THEN SET y = 2").with_input("x").with_output("y"),
            clause("producer", "WHEN always THEN SET x = 1").with_output("x"),
        ];
        let nodes = build_dag(&clauses).unwrap();
        let ids: Vec<&str> = nodes.iter().map(|n| n.clause.id.as_str()).collect();
        assert_eq!(ids, vec!["producer", "consumer"]);
    }

    #[test]
    fn self_referential_clause_is_not_a_cycle() {
        let clauses = [clause("loop", "WHEN counter < 3 THEN ADD counter 1")
            .with_input("counter")
            .with_output("counter")];
        assert!(build_dag(&clauses).is_ok());
    }

    #[test]
    fn explicit_cycle_is_an_error() {
        let clauses = [
            clause("a", "WHEN always THEN SET x = 1").with_dependency("b"),
            clause("b", "WHEN always THEN SET y = 1").with_dependency("a"),
        ];
        let err = build_dag(&clauses).unwrap_err();
        match err {
            CompileError::Cycle { ids } => {
                assert!(ids.contains('a'));
                assert!(ids.contains('b'));
            }
            other => panic!("expected Cycle, got {other:?}"),
        }
    }

    #[test]
    fn implicit_cycle_is_an_error() {
        let clauses = [
            clause("a", "WHEN p == 1 THEN SET q = 1").with_input("p").with_output("q"),
            clause("b", "WHEN q == 1 THEN SET p = 1").with_input("q").with_output("p"),
        ];
        assert!(matches!(
            build_dag(&clauses),
            Err(CompileError::Cycle { .. })
        ));
    }

    #[test]
    fn unknown_dependency_is_an_error() {
        let clauses = [clause("a", "WHEN always THEN SET x = 1").with_dependency("ghost")];
        assert!(matches!(
            build_dag(&clauses),
            Err(CompileError::UnknownDependency { .. })
        ));
    }

    #[test]
    fn duplicate_ids_are_an_error() {
        let clauses = [
            clause("a", "WHEN always THEN SET x = 1"),
            clause("a", "WHEN always THEN SET y = 1"),
        ];
        assert!(matches!(
            build_dag(&clauses),
            Err(CompileError::DuplicateClause { .. })
        ));
    }

    #[test]
    fn compilation_is_deterministic() {
        let clauses = [
            clause("late", "WHEN x == 1 THEN SET z = 1").with_input("x").with_output("z"),
            clause("early", "WHEN always THEN SET x = 1").with_output("x"),
            clause("independent", "WHEN always THEN SET w = 1").with_output("w"),
        ];
        let first = build_dag(&clauses).unwrap();
        let second = build_dag(&clauses).unwrap();
        assert_eq!(first, second);
        // Among ready nodes the smallest declaration index goes first, so
        // "late" (declared first) precedes "independent" once unblocked.
        let ids: Vec<&str> = first.iter().map(|n| n.clause.id.as_str()).collect();
        assert_eq!(ids, vec!["early", "late", "independent"]);
    }
}
