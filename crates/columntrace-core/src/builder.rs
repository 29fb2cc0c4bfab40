//! Statement builder.
//!
//! Turns the parsed query plus the stripped SQL text and its token stream
//! into a [`StatementGraph`]: the root statement and one statement per CTE,
//! each populated with fields (carrying formula templates) and sources.
//!
//! Byte-range arithmetic works off the token stream. Identifier spans from
//! the parse tree locate column references exactly; projection boundaries
//! (the first target, the commas between targets, the clause that ends the
//! projection) are recovered structurally by scanning tokens at the
//! statement's parenthesis depth, which keeps constructs like
//! `CAST(x AS int)`, scalar subqueries, and `ARRAY[a, b]` intact.

use crate::error::LineageError;
use crate::formula;
use crate::parser::tokens::{location_offset, SourceToken};
use crate::parser::{visitor, SqlSource};
use crate::relation::Path;
use crate::statement::{Field, FieldRef, Source, Statement, StatementGraph, StatementKind};
use sqlparser::ast::Select;
use sqlparser::keywords::Keyword;
use sqlparser::tokenizer::Token;

/// Builds the statement graph: the root at index 0, CTEs after it in
/// source order.
pub(crate) fn build(source: &SqlSource) -> Result<StatementGraph, LineageError> {
    let root_select = visitor::first_select(&source.query).ok_or(LineageError::RootNotFound)?;
    let ctes = visitor::collect_ctes(&source.query);

    let mut cte_locations = Vec::with_capacity(ctes.len());
    for cte in &ctes {
        let name = &cte.alias.name;
        cte_locations.push(location_offset(
            &source.sql,
            name.span.start.line,
            name.span.start.column,
        )?);
    }

    let ctes_end_idx = if ctes.is_empty() {
        0
    } else {
        cte_region_end(source.tokens.as_slice(), cte_locations[0])?
    };

    let mut statements = Vec::with_capacity(ctes.len() + 1);
    statements.push(build_statement(
        source,
        root_select,
        ctes_end_idx,
        source.sql.len(),
        StatementKind::Root,
    )?);

    for (index, cte) in ctes.iter().enumerate() {
        let start = cte_locations[index];
        let end = cte_locations
            .get(index + 1)
            .copied()
            .unwrap_or(ctes_end_idx);
        let select = visitor::first_select(&cte.query).ok_or(LineageError::RootNotFound)?;
        statements.push(build_statement(
            source,
            select,
            start,
            end,
            StatementKind::Cte {
                name: cte.alias.name.value.clone(),
            },
        )?);
    }

    Ok(StatementGraph { statements })
}

/// Finds the byte offset where the `WITH` clause ends: the closing
/// parenthesis of the last CTE body.
///
/// Walks tokens from the first CTE's name, tracking parenthesis balance.
/// A `)` that returns the balance to zero ends the clause unless the next
/// token continues it: a `,` introduces another CTE, and `AS` /
/// `MATERIALIZED` / `NOT` mean the `)` closed a CTE column list with the
/// body still ahead.
fn cte_region_end(tokens: &[SourceToken], from: usize) -> Result<usize, LineageError> {
    let start = tokens
        .iter()
        .position(|token| token.start >= from)
        .ok_or(LineageError::TokenNotFound(from))?;

    let mut depth = 0i64;
    let mut entered = false;

    for index in start..tokens.len() {
        match tokens[index].token {
            Token::LParen => {
                depth += 1;
                entered = true;
            }
            Token::RParen => {
                depth -= 1;
                if entered && depth == 0 {
                    let continues = tokens.get(index + 1).is_some_and(|next| {
                        matches!(next.token, Token::Comma)
                            || next.is_keyword(Keyword::AS)
                            || next.is_keyword(Keyword::MATERIALIZED)
                            || next.is_keyword(Keyword::NOT)
                    });
                    if !continues {
                        return Ok(tokens[index].start);
                    }
                }
            }
            _ => {}
        }
    }

    Err(LineageError::TokenNotFound(from))
}

fn build_statement(
    source: &SqlSource,
    select: &Select,
    region_start: usize,
    region_end: usize,
    kind: StatementKind,
) -> Result<Statement, LineageError> {
    let sql = &source.sql;
    let region = source.tokens.real_slice(region_start, region_end);

    let (select_idx, select_depth) = find_select(region)?;
    let first_target = first_target_index(region, select_idx)?;
    let layout = scan_projection(region, first_target, select_depth, region_end);

    let targets = &select.projection;
    if layout.commas.len() + 1 != targets.len() {
        return Err(LineageError::MalformedProjection);
    }

    // Byte boundaries between targets: the first projection token, then the
    // token after each separating comma.
    let mut starts = Vec::with_capacity(targets.len());
    starts.push(region[first_target].start);
    for &comma in &layout.commas {
        let next = region.get(comma + 1).ok_or(LineageError::MalformedProjection)?;
        starts.push(next.start);
    }

    let mut fields = Vec::with_capacity(targets.len());
    for (index, item) in targets.iter().enumerate() {
        let start = starts[index];
        let end = starts.get(index + 1).copied().unwrap_or(layout.fields_end);
        let slice = slice_range(region, start, end);

        let mut refs = visitor::column_refs_in_select_item(sql, item)?;
        for column_ref in &mut refs {
            if column_ref.location.is_none() {
                // a bare `*` is the first (and only) expression token
                let star = slice.first().ok_or(LineageError::MalformedProjection)?;
                column_ref.location = Some(star.start);
            }
        }

        let alias = visitor::select_item_alias(item);
        let formula = formula::extract(sql, slice, &refs, alias.as_deref())?;

        let mut depends_on = Vec::with_capacity(refs.len());
        for column_ref in refs {
            let (name, path_parts) = column_ref
                .components
                .split_last()
                .ok_or(LineageError::MalformedProjection)?;
            depends_on.push(FieldRef {
                path: Path::from_parts(path_parts)?,
                name: name.clone(),
                source: None,
            });
        }

        if alias.is_none() && depends_on.len() != 1 {
            return Err(LineageError::AmbiguousFieldName(depends_on.len()));
        }

        fields.push(Field {
            depends_on,
            alias,
            formula,
        });
    }

    let mut sources = Vec::with_capacity(select.from.len());
    for node in visitor::table_sources(&select.from) {
        let path = Path::from_parts(&node.name_parts)?;
        sources.push(Source::new(path, node.alias)?);
    }

    Ok(Statement {
        kind,
        fields,
        sources,
    })
}

/// Locates the statement's `SELECT` keyword and the parenthesis depth it
/// sits at (depth is region-relative, so a root region opening on the
/// `WITH` clause's closing parenthesis simply runs at a negative depth).
fn find_select(region: &[SourceToken]) -> Result<(usize, i64), LineageError> {
    let mut depth = 0i64;
    for (index, token) in region.iter().enumerate() {
        match token.token {
            Token::LParen | Token::LBracket => depth += 1,
            Token::RParen | Token::RBracket => depth -= 1,
            _ => {
                if token.is_keyword(Keyword::SELECT) {
                    return Ok((index, depth));
                }
            }
        }
    }
    Err(LineageError::RootNotFound)
}

/// Index of the first projection token, skipping `DISTINCT [ON (...)]`
/// and `ALL`.
fn first_target_index(region: &[SourceToken], select_idx: usize) -> Result<usize, LineageError> {
    let mut index = select_idx + 1;

    if region
        .get(index)
        .is_some_and(|token| token.is_keyword(Keyword::DISTINCT))
    {
        index += 1;
        if region
            .get(index)
            .is_some_and(|token| token.is_keyword(Keyword::ON))
        {
            index += 1;
            if region
                .get(index)
                .is_some_and(|token| matches!(token.token, Token::LParen))
            {
                let mut depth = 0i64;
                while index < region.len() {
                    match region[index].token {
                        Token::LParen => depth += 1,
                        Token::RParen => {
                            depth -= 1;
                            if depth == 0 {
                                index += 1;
                                break;
                            }
                        }
                        _ => {}
                    }
                    index += 1;
                }
            }
        }
    } else if region
        .get(index)
        .is_some_and(|token| token.is_keyword(Keyword::ALL))
    {
        index += 1;
    }

    if index < region.len() {
        Ok(index)
    } else {
        Err(LineageError::MalformedProjection)
    }
}

struct ProjectionLayout {
    /// Region-relative indices of the commas separating targets.
    commas: Vec<usize>,
    /// Byte offset just past the last target.
    fields_end: usize,
}

/// Scans the projection: collects separating commas at the statement's
/// depth and finds where the projection ends (the byte before the first
/// statement-depth clause keyword, or the region end).
fn scan_projection(
    region: &[SourceToken],
    first_target: usize,
    select_depth: i64,
    region_end: usize,
) -> ProjectionLayout {
    let mut depth = select_depth;
    let mut commas = Vec::new();
    let mut fields_end = region_end;

    for (index, token) in region.iter().enumerate().skip(first_target) {
        match &token.token {
            Token::LParen | Token::LBracket => depth += 1,
            Token::RParen | Token::RBracket => {
                depth -= 1;
                // the statement body itself closed
                if depth < select_depth {
                    break;
                }
            }
            Token::Comma if depth == select_depth => commas.push(index),
            Token::SemiColon => {
                fields_end = token.start.saturating_sub(1);
                break;
            }
            Token::Word(word) if depth == select_depth => {
                if is_projection_terminator(word.keyword) {
                    fields_end = token.start.saturating_sub(1);
                    break;
                }
            }
            _ => {}
        }
    }

    ProjectionLayout { commas, fields_end }
}

fn is_projection_terminator(keyword: Keyword) -> bool {
    matches!(
        keyword,
        Keyword::FROM
            | Keyword::WHERE
            | Keyword::GROUP
            | Keyword::HAVING
            | Keyword::ORDER
            | Keyword::LIMIT
            | Keyword::OFFSET
            | Keyword::FETCH
            | Keyword::WINDOW
            | Keyword::UNION
            | Keyword::INTERSECT
            | Keyword::EXCEPT
            | Keyword::INTO
    )
}

/// Tokens of `region` lying fully inside the half-open byte range.
fn slice_range(region: &[SourceToken], start: usize, end: usize) -> &[SourceToken] {
    let begin = region
        .iter()
        .position(|token| token.start >= start)
        .unwrap_or(region.len());
    let count = region[begin..]
        .iter()
        .take_while(|token| token.end <= end)
        .count();
    &region[begin..begin + count]
}
