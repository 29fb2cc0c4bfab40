//! Statement ordering.
//!
//! Field resolution needs every dependency resolved before its dependents,
//! so statements are processed in topological order of the CTE reference
//! graph (edge: referenced CTE → referencing statement). A cycle is an
//! error; the grammar has no lineage-meaningful recursive CTEs here.

use crate::error::LineageError;
use crate::statement::{Reference, StatementGraph, StatementId};
use std::collections::VecDeque;

/// Kahn's algorithm over the statement arena. Every statement appears in
/// the result, dependencies first.
pub(crate) fn sort_statements(graph: &StatementGraph) -> Result<Vec<StatementId>, LineageError> {
    let count = graph.statements.len();
    let mut outgoing: Vec<Vec<StatementId>> = vec![Vec::new(); count];
    let mut indegree = vec![0usize; count];

    for (id, statement) in graph.statements.iter().enumerate() {
        for source in &statement.sources {
            if let Some(Reference::Cte(dependency)) = source.reference {
                outgoing[dependency].push(id);
                indegree[id] += 1;
            }
        }
    }

    let mut ready: VecDeque<StatementId> = indegree
        .iter()
        .enumerate()
        .filter(|(_, &degree)| degree == 0)
        .map(|(id, _)| id)
        .collect();

    let mut order = Vec::with_capacity(count);
    while let Some(id) = ready.pop_front() {
        order.push(id);
        for &dependent in &outgoing[id] {
            indegree[dependent] -= 1;
            if indegree[dependent] == 0 {
                ready.push_back(dependent);
            }
        }
    }

    if order.len() < count {
        // name a stuck CTE; the root only ever waits on one
        let stuck = (0..count)
            .find(|&id| indegree[id] > 0 && graph.statements[id].is_cte())
            .map(|id| graph.statements[id].name().to_string())
            .unwrap_or_default();
        return Err(LineageError::CyclicCte(stuck));
    }

    Ok(order)
}
