//! SQL front end: comment stripping, parsing, tokenization.
//!
//! The engine accepts the PostgreSQL grammar. The rest of the crate never
//! touches sqlparser names directly; it consumes the stripped text, the
//! byte-offset token stream, and the collectors in [`visitor`].

pub(crate) mod comments;
pub(crate) mod tokens;
pub(crate) mod visitor;

use self::tokens::TokenList;
use crate::error::LineageError;
use sqlparser::ast::{Query, Statement};
use sqlparser::dialect::PostgreSqlDialect;
use sqlparser::parser::Parser;

/// The parsed front-end output: stripped SQL, its token stream, and the
/// first query statement.
#[derive(Debug)]
pub(crate) struct SqlSource {
    pub(crate) sql: String,
    pub(crate) tokens: TokenList,
    pub(crate) query: Query,
}

/// Strips comments, parses, and tokenizes one SQL text.
///
/// The first `SELECT`-shaped statement becomes the root; anything else
/// (empty input, DML, DDL) fails with [`LineageError::RootNotFound`].
pub(crate) fn parse_select(sql: &str) -> Result<SqlSource, LineageError> {
    let stripped = comments::strip_comments(sql);

    let statements = if stripped.trim().is_empty() {
        Vec::new()
    } else {
        Parser::parse_sql(&PostgreSqlDialect {}, &stripped)?
    };

    let query = statements
        .into_iter()
        .find_map(|statement| match statement {
            Statement::Query(query) => Some(*query),
            _ => None,
        })
        .ok_or(LineageError::RootNotFound)?;

    let tokens = TokenList::tokenize(&stripped)?;

    Ok(SqlSource {
        sql: stripped,
        tokens,
        query,
    })
}
