//! Lineage walking and the public result types.
//!
//! Once every field is resolved, lineage for an output column is a walk
//! over its reference graph: relation-backed references terminate, CTE
//! references continue into the upstream field. Maps are insertion-ordered
//! and column lists keep duplicates, so the result mirrors the SQL.

use crate::error::LineageError;
use crate::relation::Relation;
use crate::statement::{Field, Reference, Statement, StatementGraph};
use indexmap::IndexMap;

/// The base columns one output column depends on, per input relation.
pub type ColumnLineage = IndexMap<Relation, Vec<String>>;

/// Lineage for every output column, in projection order.
pub type ColumnsLineage = IndexMap<String, ColumnLineage>;

/// Lineage plus the reconstructed formula for one output column.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnTrace {
    /// The projection expression with upstream formulas inlined down to
    /// base column names.
    pub formula: String,
    pub lineage: ColumnLineage,
}

/// Traces for every output column, in projection order.
pub type ColumnTraces = IndexMap<String, ColumnTrace>;

/// Walks the resolved root and produces one trace per output column.
pub(crate) fn column_traces(
    graph: &StatementGraph,
    relations: &[Relation],
) -> Result<ColumnTraces, LineageError> {
    let root = graph.root();
    let mut traces = ColumnTraces::with_capacity(root.fields.len());

    for field in &root.fields {
        let name = field.name()?;
        let lineage = column_lineage(graph, relations, root, field)?;
        traces.insert(
            name.to_string(),
            ColumnTrace {
                formula: field.formula.clone(),
                lineage,
            },
        );
    }

    Ok(traces)
}

/// Collapses one field's transitive dependencies down to base columns.
fn column_lineage(
    graph: &StatementGraph,
    relations: &[Relation],
    owner: &Statement,
    field: &Field,
) -> Result<ColumnLineage, LineageError> {
    let mut stack: Vec<(&Statement, &Field)> = vec![(owner, field)];
    let mut lineage = ColumnLineage::new();

    while let Some((statement, field)) = stack.pop() {
        for field_ref in &field.depends_on {
            let source_idx = field_ref
                .source
                .ok_or_else(|| LineageError::SourceNotFound(field_ref.name.clone()))?;
            let source = &statement.sources[source_idx];

            match source.reference {
                Some(Reference::Relation(relation)) => {
                    lineage
                        .entry(relations[relation].clone())
                        .or_default()
                        .push(field_ref.name.clone());
                }
                Some(Reference::Cte(cte)) => {
                    let upstream = &graph.statements[cte];
                    let upstream_field = upstream.get_field(&field_ref.name).ok_or_else(|| {
                        LineageError::FieldNotFound {
                            statement: upstream.name().to_string(),
                            field: field_ref.name.clone(),
                        }
                    })?;
                    stack.push((upstream, upstream_field));
                }
                None => {
                    return Err(LineageError::SourceReferenceNotFound(source.path.clone()))
                }
            }
        }
    }

    Ok(lineage)
}
