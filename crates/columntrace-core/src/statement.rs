//! The statement graph: projections, sources, and their resolved links.
//!
//! Statements live in an arena ([`StatementGraph`]) and point at each other
//! through indices, never owning references. That keeps the dependency
//! graph free of ownership cycles: a [`Source`] holds a [`Reference`] index
//! and a [`FieldRef`] holds the index of its source within the owning
//! statement.

use crate::error::LineageError;
use crate::relation::Path;

/// The sentinel column name of a `*` projection entry.
pub(crate) const A_STAR: &str = "*";

/// Index of a statement in the arena. Index 0 is always the root.
pub(crate) type StatementId = usize;

/// Index of an input relation in the caller-supplied list.
pub(crate) type RelationId = usize;

/// What a source resolves to: a sibling CTE or an input relation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Reference {
    Cte(StatementId),
    Relation(RelationId),
}

/// One column reference inside a projection expression.
#[derive(Debug, Clone)]
pub(crate) struct FieldRef {
    /// Qualifier as written; empty when the reference is bare.
    pub(crate) path: Path,
    /// The column name, or `*`.
    pub(crate) name: String,
    /// Index of the supplying source within the owning statement, set by
    /// field resolution.
    pub(crate) source: Option<usize>,
}

/// One entry of a statement's projection list.
#[derive(Debug, Clone)]
pub(crate) struct Field {
    pub(crate) depends_on: Vec<FieldRef>,
    pub(crate) alias: Option<String>,
    /// Formula template with `{i}` placeholders matching `depends_on`
    /// positionally; inlined in place during field resolution.
    pub(crate) formula: String,
}

impl Field {
    fn name_opt(&self) -> Option<&str> {
        if let Some(alias) = &self.alias {
            return Some(alias);
        }
        match self.depends_on.as_slice() {
            [only] => Some(&only.name),
            _ => None,
        }
    }

    /// The output name: the alias if set, otherwise the single dependency's
    /// column name.
    pub(crate) fn name(&self) -> Result<&str, LineageError> {
        self.name_opt()
            .ok_or(LineageError::AmbiguousFieldName(self.depends_on.len()))
    }

    pub(crate) fn is_a_star(&self) -> bool {
        self.name_opt() == Some(A_STAR)
    }
}

/// A table expression in a statement's `FROM` clause.
#[derive(Debug, Clone)]
pub(crate) struct Source {
    /// The path as written; `identifier` is always set.
    pub(crate) path: Path,
    pub(crate) alias: Option<String>,
    /// Set by source resolution.
    pub(crate) reference: Option<Reference>,
}

impl Source {
    pub(crate) fn new(path: Path, alias: Option<String>) -> Result<Self, LineageError> {
        if path.identifier().is_none() {
            return Err(LineageError::InvalidPath(
                "source path must carry at least an identifier".to_string(),
            ));
        }
        Ok(Source {
            path,
            alias,
            reference: None,
        })
    }

    /// The path under which this source is referenced in the statement
    /// body: the alias when present, the written path otherwise.
    pub(crate) fn search_path(&self) -> Path {
        match &self.alias {
            Some(alias) => Path::from_identifier(alias.clone()),
            None => self.path.clone(),
        }
    }
}

/// Whether a statement is the top-level projection or a named CTE.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum StatementKind {
    Root,
    Cte { name: String },
}

/// One projection scope: the root `SELECT` or a CTE.
#[derive(Debug, Clone)]
pub(crate) struct Statement {
    pub(crate) kind: StatementKind,
    pub(crate) fields: Vec<Field>,
    pub(crate) sources: Vec<Source>,
}

impl Statement {
    /// The statement's graph name; the root uses the sentinel empty string.
    pub(crate) fn name(&self) -> &str {
        match &self.kind {
            StatementKind::Root => "",
            StatementKind::Cte { name } => name,
        }
    }

    pub(crate) fn is_cte(&self) -> bool {
        matches!(self.kind, StatementKind::Cte { .. })
    }

    /// The first field with the given output name.
    pub(crate) fn get_field(&self, name: &str) -> Option<&Field> {
        self.fields
            .iter()
            .find(|field| field.name().ok() == Some(name))
    }

    pub(crate) fn has_field(&self, name: &str) -> bool {
        self.get_field(name).is_some()
    }
}

/// Arena of one invocation's statements; the root is index 0 and CTEs
/// follow in source order.
#[derive(Debug)]
pub(crate) struct StatementGraph {
    pub(crate) statements: Vec<Statement>,
}

impl StatementGraph {
    pub(crate) fn root(&self) -> &Statement {
        &self.statements[0]
    }
}
