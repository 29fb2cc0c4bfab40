//! Source-order collectors over the sqlparser AST.
//!
//! These walks isolate the upstream parser's node names from the rest of
//! the engine. Each collector is "flat": it does not descend into nested
//! select statements, so CTEs inside CTEs and derived subqueries stay
//! opaque to the statement that contains them.

use crate::error::LineageError;
use crate::parser::tokens::location_offset;
use crate::statement::A_STAR;
use sqlparser::ast::{
    Cte, Expr, FunctionArg, FunctionArgExpr, FunctionArguments, Ident, ObjectName,
    ObjectNamePart, Query, Select, SelectItem, SelectItemQualifiedWildcardKind, SetExpr,
    TableFactor, TableWithJoins, WindowType,
};

/// A single column reference as written in the SQL.
///
/// `components` holds the dotted parts in order; a trailing `*` marks a
/// star reference. `location` is the byte offset of the first token, or
/// `None` for a bare `*` (whose offset the builder reads off the token
/// stream instead).
#[derive(Debug, Clone)]
pub(crate) struct ColumnRefNode {
    pub(crate) components: Vec<String>,
    pub(crate) location: Option<usize>,
}

/// A `FROM`-clause table reference.
#[derive(Debug, Clone)]
pub(crate) struct SourceNode {
    pub(crate) name_parts: Vec<String>,
    pub(crate) alias: Option<String>,
}

/// The CTE list of the outermost query, in source order (flat).
pub(crate) fn collect_ctes(query: &Query) -> Vec<&Cte> {
    query
        .with
        .as_ref()
        .map(|with| with.cte_tables.iter().collect())
        .unwrap_or_default()
}

/// The leftmost `SELECT` of a query body, descending set operations but
/// nothing else.
pub(crate) fn first_select(query: &Query) -> Option<&Select> {
    first_select_in(&query.body)
}

fn first_select_in(body: &SetExpr) -> Option<&Select> {
    match body {
        SetExpr::Select(select) => Some(select.as_ref()),
        SetExpr::Query(query) => first_select_in(&query.body),
        SetExpr::SetOperation { left, right, .. } => {
            first_select_in(left).or_else(|| first_select_in(right))
        }
        _ => None,
    }
}

/// All plain table references of a `FROM` clause, in source order,
/// including both sides of joins. Derived subqueries and table functions
/// are opaque.
pub(crate) fn table_sources(from: &[TableWithJoins]) -> Vec<SourceNode> {
    let mut out = Vec::new();
    for table_with_joins in from {
        collect_table_factor(&table_with_joins.relation, &mut out);
        for join in &table_with_joins.joins {
            collect_table_factor(&join.relation, &mut out);
        }
    }
    out
}

fn collect_table_factor(factor: &TableFactor, out: &mut Vec<SourceNode>) {
    match factor {
        TableFactor::Table { name, alias, .. } => out.push(SourceNode {
            name_parts: object_name_parts(name),
            alias: alias.as_ref().map(|alias| alias.name.value.clone()),
        }),
        TableFactor::NestedJoin {
            table_with_joins, ..
        } => {
            collect_table_factor(&table_with_joins.relation, out);
            for join in &table_with_joins.joins {
                collect_table_factor(&join.relation, out);
            }
        }
        _ => {}
    }
}

/// The explicit `AS` alias of a projection entry, if any.
pub(crate) fn select_item_alias(item: &SelectItem) -> Option<String> {
    match item {
        SelectItem::ExprWithAlias { alias, .. } => Some(alias.value.clone()),
        _ => None,
    }
}

/// Collects every column reference inside one projection entry, in source
/// order.
///
/// Subqueries nested in the expression are opaque: their interior
/// references belong to their own scope and stay out of `depends_on`.
pub(crate) fn column_refs_in_select_item(
    sql: &str,
    item: &SelectItem,
) -> Result<Vec<ColumnRefNode>, LineageError> {
    let mut refs = Vec::new();

    match item {
        SelectItem::UnnamedExpr(expr) | SelectItem::ExprWithAlias { expr, .. } => {
            walk_expr(sql, expr, &mut refs)?;
        }
        SelectItem::Wildcard(_) => refs.push(ColumnRefNode {
            components: vec![A_STAR.to_string()],
            location: None,
        }),
        SelectItem::QualifiedWildcard(kind, _) => match kind {
            SelectItemQualifiedWildcardKind::ObjectName(name) => {
                let mut components = object_name_parts(name);
                let location = match name.0.first().and_then(ObjectNamePart::as_ident) {
                    Some(ident) => Some(ident_offset(sql, ident)?),
                    None => None,
                };
                components.push(A_STAR.to_string());
                check_component_count(&components)?;
                refs.push(ColumnRefNode {
                    components,
                    location,
                });
            }
            SelectItemQualifiedWildcardKind::Expr(expr) => {
                walk_expr(sql, expr, &mut refs)?;
            }
        },
    }

    refs.sort_by_key(|column_ref| column_ref.location);
    Ok(refs)
}

fn walk_expr(sql: &str, expr: &Expr, out: &mut Vec<ColumnRefNode>) -> Result<(), LineageError> {
    match expr {
        Expr::Identifier(ident) => out.push(ColumnRefNode {
            components: vec![ident.value.clone()],
            location: Some(ident_offset(sql, ident)?),
        }),
        Expr::CompoundIdentifier(idents) => {
            let components: Vec<String> =
                idents.iter().map(|ident| ident.value.clone()).collect();
            check_component_count(&components)?;
            let location = match idents.first() {
                Some(ident) => Some(ident_offset(sql, ident)?),
                None => None,
            };
            out.push(ColumnRefNode {
                components,
                location,
            });
        }
        Expr::BinaryOp { left, right, .. }
        | Expr::AnyOp { left, right, .. }
        | Expr::AllOp { left, right, .. }
        | Expr::IsDistinctFrom(left, right)
        | Expr::IsNotDistinctFrom(left, right) => {
            walk_expr(sql, left, out)?;
            walk_expr(sql, right, out)?;
        }
        Expr::UnaryOp { expr: inner, .. }
        | Expr::Nested(inner)
        | Expr::IsNull(inner)
        | Expr::IsNotNull(inner)
        | Expr::IsTrue(inner)
        | Expr::IsNotTrue(inner)
        | Expr::IsFalse(inner)
        | Expr::IsNotFalse(inner)
        | Expr::IsUnknown(inner)
        | Expr::IsNotUnknown(inner)
        | Expr::Cast { expr: inner, .. }
        | Expr::Extract { expr: inner, .. }
        | Expr::Collate { expr: inner, .. } => walk_expr(sql, inner, out)?,
        Expr::AtTimeZone {
            timestamp,
            time_zone,
        } => {
            walk_expr(sql, timestamp, out)?;
            walk_expr(sql, time_zone, out)?;
        }
        Expr::Substring {
            expr: inner,
            substring_from,
            substring_for,
            ..
        } => {
            walk_expr(sql, inner, out)?;
            if let Some(from) = substring_from {
                walk_expr(sql, from, out)?;
            }
            if let Some(length) = substring_for {
                walk_expr(sql, length, out)?;
            }
        }
        Expr::Trim {
            expr: inner,
            trim_what,
            ..
        } => {
            if let Some(what) = trim_what {
                walk_expr(sql, what, out)?;
            }
            walk_expr(sql, inner, out)?;
        }
        Expr::Position { expr: inner, r#in } => {
            walk_expr(sql, inner, out)?;
            walk_expr(sql, r#in, out)?;
        }
        Expr::Like { expr, pattern, .. }
        | Expr::ILike { expr, pattern, .. }
        | Expr::SimilarTo { expr, pattern, .. } => {
            walk_expr(sql, expr, out)?;
            walk_expr(sql, pattern, out)?;
        }
        Expr::Between {
            expr, low, high, ..
        } => {
            walk_expr(sql, expr, out)?;
            walk_expr(sql, low, out)?;
            walk_expr(sql, high, out)?;
        }
        Expr::InList { expr, list, .. } => {
            walk_expr(sql, expr, out)?;
            for item in list {
                walk_expr(sql, item, out)?;
            }
        }
        Expr::InSubquery { expr, .. } => walk_expr(sql, expr, out)?,
        Expr::Exists { .. } | Expr::Subquery(_) => {}
        Expr::Case {
            operand,
            conditions,
            else_result,
            ..
        } => {
            if let Some(operand) = operand {
                walk_expr(sql, operand, out)?;
            }
            for when in conditions {
                walk_expr(sql, &when.condition, out)?;
                walk_expr(sql, &when.result, out)?;
            }
            if let Some(otherwise) = else_result {
                walk_expr(sql, otherwise, out)?;
            }
        }
        Expr::Function(function) => {
            if let FunctionArguments::List(arguments) = &function.args {
                for arg in &arguments.args {
                    match arg {
                        FunctionArg::Unnamed(FunctionArgExpr::Expr(expr))
                        | FunctionArg::Named {
                            arg: FunctionArgExpr::Expr(expr),
                            ..
                        } => walk_expr(sql, expr, out)?,
                        _ => {}
                    }
                }
            }
            if let Some(filter) = &function.filter {
                walk_expr(sql, filter, out)?;
            }
            for order_expr in &function.within_group {
                walk_expr(sql, &order_expr.expr, out)?;
            }
            if let Some(WindowType::WindowSpec(spec)) = &function.over {
                for expr in &spec.partition_by {
                    walk_expr(sql, expr, out)?;
                }
                for order_expr in &spec.order_by {
                    walk_expr(sql, &order_expr.expr, out)?;
                }
            }
        }
        Expr::Tuple(exprs) => {
            for expr in exprs {
                walk_expr(sql, expr, out)?;
            }
        }
        Expr::Array(array) => {
            for item in &array.elem {
                walk_expr(sql, item, out)?;
            }
        }
        _ => {}
    }

    Ok(())
}

fn check_component_count(components: &[String]) -> Result<(), LineageError> {
    // path (up to 3) + column name
    if components.len() > 4 {
        return Err(LineageError::TooManyPathComponents(components.join(".")));
    }
    Ok(())
}

fn object_name_parts(name: &ObjectName) -> Vec<String> {
    name.0
        .iter()
        .filter_map(ObjectNamePart::as_ident)
        .map(|ident| ident.value.clone())
        .collect()
}

fn ident_offset(sql: &str, ident: &Ident) -> Result<usize, LineageError> {
    location_offset(sql, ident.span.start.line, ident.span.start.column)
}
