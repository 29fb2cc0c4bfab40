//! Qualified relation paths and input table descriptions.

use crate::error::LineageError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A qualified identifier of up to three components.
///
/// Components bind right to left: one part is an `identifier`, two are
/// `schema.identifier`, three are `database.schema.identifier`. An inner
/// component can never be absent while an outer one is set, so
/// `schema = None` with `database = Some(..)` is rejected. The all-`None`
/// value is the distinguished "unqualified" path.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Path {
    database: Option<String>,
    schema: Option<String>,
    identifier: Option<String>,
}

impl Path {
    /// The distinguished unqualified path.
    pub const EMPTY: Path = Path {
        database: None,
        schema: None,
        identifier: None,
    };

    /// Builds a path, validating the intermediate-`None` rule.
    pub fn new(
        database: Option<String>,
        schema: Option<String>,
        identifier: Option<String>,
    ) -> Result<Self, LineageError> {
        let path = Path {
            database,
            schema,
            identifier,
        };
        path.check_intermediate_none()?;
        Ok(path)
    }

    /// Builds a path from a left-truncated component list.
    ///
    /// One element binds `identifier`, two bind `schema.identifier`, three
    /// bind all components. More than three fails with
    /// [`LineageError::TooManyPathComponents`].
    pub fn from_parts<S: AsRef<str>>(parts: &[S]) -> Result<Self, LineageError> {
        match parts {
            [] => Ok(Path::EMPTY),
            [identifier] => Ok(Path::from_identifier(identifier.as_ref())),
            [schema, identifier] => Ok(Path {
                database: None,
                schema: Some(schema.as_ref().to_string()),
                identifier: Some(identifier.as_ref().to_string()),
            }),
            [database, schema, identifier] => Ok(Path {
                database: Some(database.as_ref().to_string()),
                schema: Some(schema.as_ref().to_string()),
                identifier: Some(identifier.as_ref().to_string()),
            }),
            too_many => {
                let joined = too_many
                    .iter()
                    .map(|part| part.as_ref())
                    .collect::<Vec<_>>()
                    .join(".");
                Err(LineageError::TooManyPathComponents(joined))
            }
        }
    }

    /// Builds a path carrying only an identifier. Always valid.
    pub fn from_identifier(identifier: impl Into<String>) -> Self {
        Path {
            database: None,
            schema: None,
            identifier: Some(identifier.into()),
        }
    }

    pub fn database(&self) -> Option<&str> {
        self.database.as_deref()
    }

    pub fn schema(&self) -> Option<&str> {
        self.schema.as_deref()
    }

    pub fn identifier(&self) -> Option<&str> {
        self.identifier.as_deref()
    }

    /// Whether this is the unqualified path.
    pub fn is_empty(&self) -> bool {
        self.database.is_none() && self.schema.is_none() && self.identifier.is_none()
    }

    fn check_intermediate_none(&self) -> Result<(), LineageError> {
        let inner_to_outer = [&self.identifier, &self.schema, &self.database];
        let mut none_seen = false;

        for component in inner_to_outer {
            match component {
                None => none_seen = true,
                Some(_) if none_seen => {
                    return Err(LineageError::InvalidPath(
                        "outer path component set while an inner one is missing".to_string(),
                    ))
                }
                Some(_) => {}
            }
        }

        Ok(())
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for component in [&self.database, &self.schema, &self.identifier]
            .into_iter()
            .flatten()
        {
            if !first {
                write!(f, ".")?;
            }
            write!(f, "{component}")?;
            first = false;
        }
        Ok(())
    }
}

/// An input table: a path plus its ordered column names.
///
/// Relations are supplied by the caller and never mutated by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Relation {
    pub path: Path,
    pub field_names: Vec<String>,
}

impl Relation {
    pub fn new(path: Path, field_names: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Relation {
            path,
            field_names: field_names.into_iter().map(Into::into).collect(),
        }
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.field_names.iter().any(|field| field == name)
    }
}
