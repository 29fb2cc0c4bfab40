//! Column-level data lineage for SQL `SELECT` statements.
//!
//! Given one query and the column lists of its input tables, the engine
//! determines, for each output column, which base columns it ultimately
//! depends on, and reconstructs a formula showing how they combine.
//! `WITH` clauses are followed transitively: CTE hops collapse down to the
//! input relations.
//!
//! The engine is a pure, synchronous function over one SQL string. It
//! accepts the PostgreSQL grammar, never touches the filesystem or a
//! database, and leaves model discovery, catalog introspection, and
//! rendering to its caller.
//!
//! ```
//! use columntrace_core::{resolve_columns_lineage, Path, Relation};
//!
//! let orders = Relation::new(Path::from_identifier("orders"), ["amount", "tax"]);
//! let lineage = resolve_columns_lineage(
//!     "SELECT amount + tax AS total FROM orders",
//!     &[orders.clone()],
//! )?;
//!
//! assert_eq!(lineage["total"][&orders], ["amount", "tax"]);
//! # Ok::<(), columntrace_core::LineageError>(())
//! ```
//!
//! When a bare column name is visible through several sources, the first
//! source in `FROM` declaration order that exposes it wins; callers that
//! care should qualify the reference.

mod builder;
mod formula;
mod parser;
mod resolver;
mod statement;

pub mod error;
pub mod lineage;
pub mod manifest;
pub mod relation;

pub use error::LineageError;
pub use lineage::{ColumnLineage, ColumnTrace, ColumnTraces, ColumnsLineage};
pub use manifest::{ColumnEntry, Manifest, ModelLineage, SourceEntry};
pub use relation::{Path, Relation};

#[cfg(feature = "tracing")]
use tracing::debug;

/// Resolves lineage and inlined formulas for every output column of `sql`.
///
/// `initial_relations` supplies the base tables the query may read, keyed
/// by the exact path the SQL uses to reference them.
pub fn resolve_column_traces(
    sql: &str,
    initial_relations: &[Relation],
) -> Result<ColumnTraces, LineageError> {
    let source = parser::parse_select(sql)?;
    let mut graph = builder::build(&source)?;
    resolver::resolve(&mut graph, initial_relations)?;
    let traces = lineage::column_traces(&graph, initial_relations)?;

    #[cfg(feature = "tracing")]
    debug!(columns = traces.len(), "column lineage resolved");

    Ok(traces)
}

/// Resolves lineage for every output column of `sql`.
///
/// The result maps each output column, in projection order, to the input
/// columns it depends on per relation. See [`resolve_column_traces`] for
/// the variant that also returns reconstructed formulas.
pub fn resolve_columns_lineage(
    sql: &str,
    initial_relations: &[Relation],
) -> Result<ColumnsLineage, LineageError> {
    Ok(resolve_column_traces(sql, initial_relations)?
        .into_iter()
        .map(|(name, trace)| (name, trace.lineage))
        .collect())
}
