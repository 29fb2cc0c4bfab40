//! The resolution pipeline.
//!
//! Three stages over a freshly built statement graph: bind sources
//! ([`sources`]), order statements so dependencies come first ([`order`]),
//! then resolve fields and inline formulas statement by statement
//! ([`fields`]).

pub(crate) mod fields;
pub(crate) mod order;
pub(crate) mod sources;

use crate::error::LineageError;
use crate::relation::Relation;
use crate::statement::StatementGraph;
#[cfg(feature = "tracing")]
use tracing::trace;

pub(crate) fn resolve(
    graph: &mut StatementGraph,
    relations: &[Relation],
) -> Result<(), LineageError> {
    sources::resolve_sources(graph, relations)?;

    let statement_order = order::sort_statements(graph)?;
    #[cfg(feature = "tracing")]
    trace!(
        statements = statement_order.len(),
        "statement order resolved"
    );

    fields::resolve_fields(graph, relations, &statement_order)
}
