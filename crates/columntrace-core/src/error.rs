//! Error types for the lineage engine.
//!
//! Every error is fatal to the invocation that raised it: the engine never
//! returns partial lineage. Variants identify the offending entity (a path,
//! a column name, a CTE) so callers can report actionable messages.

use crate::relation::Path;
use thiserror::Error;

/// Errors raised while parsing, resolving, or walking a statement graph.
#[derive(Debug, Error)]
pub enum LineageError {
    /// The input contained no `SELECT` statement.
    #[error("no SELECT statement found in input")]
    RootNotFound,

    /// A `FROM` entry matched neither a sibling CTE nor an input relation.
    #[error("source reference not found for `{0}`")]
    SourceReferenceNotFound(Path),

    /// A column is not exposed by any in-scope source.
    #[error("no source in scope provides column `{0}`")]
    SourceNotFound(String),

    /// A statement claimed by source resolution does not expose a column.
    #[error("`{statement}` does not expose column `{field}`")]
    FieldNotFound { statement: String, field: String },

    /// The CTE dependency graph contains a cycle.
    #[error("cyclic dependency between common table expressions involving `{0}`")]
    CyclicCte(String),

    /// A path or column reference had more than the supported components.
    #[error("too many components in `{0}`")]
    TooManyPathComponents(String),

    /// A projection entry without an alias depends on zero or several columns.
    #[error("field depending on {0} columns must have an alias")]
    AmbiguousFieldName(usize),

    /// Two projection entries of one statement share an output name.
    #[error("duplicate output column name `{0}`")]
    DuplicateFieldName(String),

    /// A path failed its construction invariants.
    #[error("invalid path: {0}")]
    InvalidPath(String),

    /// A parser location could not be mapped back to a byte offset.
    #[error("no byte offset for source location line {line}, column {column}")]
    InvalidLocation { line: u64, column: u64 },

    /// No token starts at a byte offset the parse tree pointed at.
    #[error("no token starts at byte offset {0}")]
    TokenNotFound(usize),

    /// The token stream does not line up with the parsed projection list.
    #[error("projection tokens do not line up with the parsed statement")]
    MalformedProjection,

    /// The SQL front end rejected the input.
    #[error("failed to parse SQL: {0}")]
    Parse(#[from] sqlparser::parser::ParserError),

    /// The tokenizer rejected the input.
    #[error("failed to tokenize SQL: {0}")]
    Tokenize(#[from] sqlparser::tokenizer::TokenizerError),
}
