//! Field resolution.
//!
//! Runs per statement, in topological order, so every upstream CTE is fully
//! resolved first. Four passes: bind plain column references to sources,
//! expand `*` fields, check output-name uniqueness, and inline upstream
//! formulas into the statement's templates.
//!
//! Mutation is two-phase throughout: decisions are computed against the
//! immutable arena, then applied to the one statement being resolved. That
//! keeps borrows of the arena and of the statement disjoint.

use crate::error::LineageError;
use crate::formula;
use crate::relation::{Path, Relation};
use crate::statement::{
    Field, FieldRef, Reference, Statement, StatementGraph, StatementId,
};
use std::collections::{HashMap, HashSet};

pub(crate) fn resolve_fields(
    graph: &mut StatementGraph,
    relations: &[Relation],
    order: &[StatementId],
) -> Result<(), LineageError> {
    for &id in order {
        resolve_statement(graph, relations, id)?;
    }
    Ok(())
}

fn resolve_statement(
    graph: &mut StatementGraph,
    relations: &[Relation],
    id: StatementId,
) -> Result<(), LineageError> {
    let source_map: HashMap<Path, usize> = graph.statements[id]
        .sources
        .iter()
        .enumerate()
        .map(|(index, source)| (source.search_path(), index))
        .collect();

    resolve_plain_fields(graph, relations, id, &source_map)?;
    expand_star_fields(graph, relations, id, &source_map)?;
    check_unique_names(graph, id)?;
    inline_formulas(graph, id)
}

/// Binds every reference of every non-`*` field to a source: qualified
/// references through the search-path map, bare ones to the first source
/// in declaration order that exposes the column.
fn resolve_plain_fields(
    graph: &mut StatementGraph,
    relations: &[Relation],
    id: StatementId,
    source_map: &HashMap<Path, usize>,
) -> Result<(), LineageError> {
    let mut assignments = Vec::new();
    {
        let statement = &graph.statements[id];
        for (field_idx, field) in statement.fields.iter().enumerate() {
            if field.is_a_star() {
                continue;
            }
            for (ref_idx, field_ref) in field.depends_on.iter().enumerate() {
                let source_idx = if field_ref.path.is_empty() {
                    first_source_with_field(graph, relations, statement, &field_ref.name)
                        .ok_or_else(|| LineageError::SourceNotFound(field_ref.name.clone()))?
                } else {
                    *source_map
                        .get(&field_ref.path)
                        .ok_or_else(|| LineageError::SourceNotFound(display_ref(field_ref)))?
                };
                assignments.push((field_idx, ref_idx, source_idx));
            }
        }
    }

    let statement = &mut graph.statements[id];
    for (field_idx, ref_idx, source_idx) in assignments {
        statement.fields[field_idx].depends_on[ref_idx].source = Some(source_idx);
    }
    Ok(())
}

fn first_source_with_field(
    graph: &StatementGraph,
    relations: &[Relation],
    statement: &Statement,
    name: &str,
) -> Option<usize> {
    statement.sources.iter().position(|source| match source.reference {
        Some(Reference::Cte(cte)) => graph.statements[cte].has_field(name),
        Some(Reference::Relation(relation)) => relations[relation].has_field(name),
        None => false,
    })
}

/// Replaces each `*` field with one field per visible column.
///
/// A bare `*` sees the union of every source's columns, in source order
/// then column order; a qualified `t.*` sees its one source. Non-star
/// fields keep their positions and the generated fields append at the end.
fn expand_star_fields(
    graph: &mut StatementGraph,
    relations: &[Relation],
    id: StatementId,
    source_map: &HashMap<Path, usize>,
) -> Result<(), LineageError> {
    let mut expansions: Vec<(usize, Vec<Field>)> = Vec::new();
    {
        let statement = &graph.statements[id];
        for (field_idx, field) in statement.fields.iter().enumerate() {
            if !field.is_a_star() {
                continue;
            }
            let star_ref = &field.depends_on[0];

            let source_indices: Vec<usize> = if star_ref.path.is_empty() {
                (0..statement.sources.len()).collect()
            } else {
                vec![*source_map
                    .get(&star_ref.path)
                    .ok_or_else(|| LineageError::SourceNotFound(display_ref(star_ref)))?]
            };

            let mut generated = Vec::new();
            for source_idx in source_indices {
                let source = &statement.sources[source_idx];
                let column_names: Vec<String> = match source.reference {
                    Some(Reference::Relation(relation)) => {
                        relations[relation].field_names.clone()
                    }
                    Some(Reference::Cte(cte)) => graph.statements[cte]
                        .fields
                        .iter()
                        .filter_map(|field| field.name().ok().map(str::to_string))
                        .collect(),
                    None => Vec::new(),
                };

                for name in column_names {
                    generated.push(Field {
                        depends_on: vec![FieldRef {
                            path: source.search_path(),
                            name,
                            source: Some(source_idx),
                        }],
                        alias: None,
                        formula: "{0}".to_string(),
                    });
                }
            }

            expansions.push((field_idx, generated));
        }
    }

    if expansions.is_empty() {
        return Ok(());
    }

    let statement = &mut graph.statements[id];
    let star_indices: HashSet<usize> = expansions.iter().map(|(index, _)| *index).collect();

    let previous = std::mem::take(&mut statement.fields);
    let mut fields: Vec<Field> = previous
        .into_iter()
        .enumerate()
        .filter(|(index, _)| !star_indices.contains(index))
        .map(|(_, field)| field)
        .collect();
    for (_, generated) in expansions {
        fields.extend(generated);
    }
    statement.fields = fields;
    Ok(())
}

/// Output names must be unique within one statement once stars are gone.
fn check_unique_names(graph: &StatementGraph, id: StatementId) -> Result<(), LineageError> {
    let mut seen = HashSet::new();
    for field in &graph.statements[id].fields {
        let name = field.name()?;
        if !seen.insert(name.to_string()) {
            return Err(LineageError::DuplicateFieldName(name.to_string()));
        }
    }
    Ok(())
}

/// Substitutes each reference's upstream formula into the field template:
/// the bare column name for relation-backed references, the already-inlined
/// upstream formula for CTE-backed ones.
fn inline_formulas(graph: &mut StatementGraph, id: StatementId) -> Result<(), LineageError> {
    let mut inlined = Vec::new();
    {
        let statement = &graph.statements[id];
        for (field_idx, field) in statement.fields.iter().enumerate() {
            let mut upstream = Vec::with_capacity(field.depends_on.len());
            for field_ref in &field.depends_on {
                let source_idx = field_ref
                    .source
                    .ok_or_else(|| LineageError::SourceNotFound(field_ref.name.clone()))?;
                let source = &statement.sources[source_idx];

                match source.reference {
                    Some(Reference::Relation(_)) => upstream.push(field_ref.name.clone()),
                    Some(Reference::Cte(cte)) => {
                        let upstream_statement = &graph.statements[cte];
                        let upstream_field = upstream_statement
                            .get_field(&field_ref.name)
                            .ok_or_else(|| LineageError::FieldNotFound {
                                statement: upstream_statement.name().to_string(),
                                field: field_ref.name.clone(),
                            })?;
                        upstream.push(upstream_field.formula.clone());
                    }
                    None => {
                        return Err(LineageError::SourceReferenceNotFound(source.path.clone()))
                    }
                }
            }
            inlined.push((field_idx, formula::substitute(&field.formula, &upstream)));
        }
    }

    let statement = &mut graph.statements[id];
    for (field_idx, new_formula) in inlined {
        statement.fields[field_idx].formula = new_formula;
    }
    Ok(())
}

fn display_ref(field_ref: &FieldRef) -> String {
    if field_ref.path.is_empty() {
        field_ref.name.clone()
    } else {
        format!("{}.{}", field_ref.path, field_ref.name)
    }
}
