//! Source resolution.
//!
//! Binds every `FROM` entry to its referent: a sibling CTE when the
//! identifier matches a CTE name, otherwise an input relation looked up by
//! its verbatim path. CTE names shadow relations.

use crate::error::LineageError;
use crate::relation::{Path, Relation};
use crate::statement::{Reference, StatementGraph, StatementId};
use std::collections::HashMap;

pub(crate) fn resolve_sources(
    graph: &mut StatementGraph,
    relations: &[Relation],
) -> Result<(), LineageError> {
    let cte_by_name: HashMap<String, StatementId> = graph
        .statements
        .iter()
        .enumerate()
        .filter(|(_, statement)| statement.is_cte())
        .map(|(id, statement)| (statement.name().to_string(), id))
        .collect();

    let relation_by_path: HashMap<&Path, usize> = relations
        .iter()
        .enumerate()
        .map(|(id, relation)| (&relation.path, id))
        .collect();

    for statement in &mut graph.statements {
        for source in &mut statement.sources {
            let by_cte = source
                .path
                .identifier()
                .and_then(|identifier| cte_by_name.get(identifier));

            let reference = match by_cte {
                Some(&id) => Reference::Cte(id),
                None => match relation_by_path.get(&source.path) {
                    Some(&id) => Reference::Relation(id),
                    None => {
                        return Err(LineageError::SourceReferenceNotFound(source.path.clone()))
                    }
                },
            };

            source.reference = Some(reference);
        }
    }

    Ok(())
}
