//! Rendering of [`ScopeFilter`]s onto SQLx query builders.
//!
//! Ownership paths are dotted relation paths (`unit.department_id`). A query
//! maps the paths it knows to its own column expressions (`u.department_id`);
//! unmapped paths are used verbatim.

use std::collections::HashMap;

use sqlx::{Postgres, QueryBuilder};
use thiserror::Error;

use civgate_auth::ScopeFilter;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ScopeQueryError {
    #[error("'{0}' is not a valid column reference")]
    InvalidColumn(String),
}

/// Ownership path → SQL column expression for one query.
#[derive(Debug, Clone, Default)]
pub struct ScopeColumns {
    columns: HashMap<String, String>,
}

impl ScopeColumns {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn map(mut self, path: impl Into<String>, column: impl Into<String>) -> Self {
        self.columns.insert(path.into(), column.into());
        self
    }

    fn column_for<'a>(&'a self, path: &'a str) -> Result<&'a str, ScopeQueryError> {
        let column = self.columns.get(path).map_or(path, String::as_str);
        if is_column_reference(column) {
            Ok(column)
        } else {
            Err(ScopeQueryError::InvalidColumn(column.to_string()))
        }
    }
}

/// `segment(.segment)*`, each segment a plain SQL identifier.
fn is_column_reference(column: &str) -> bool {
    !column.is_empty()
        && column.split('.').all(|segment| {
            let mut chars = segment.chars();
            matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        })
}

/// Append `filter` to `builder` as a boolean SQL expression.
///
/// `Unrestricted` renders `TRUE`, `Nothing` renders `FALSE` and `Restrict`
/// renders `<column> = $n` with the node id bound.
pub fn push_scope_filter(
    builder: &mut QueryBuilder<'_, Postgres>,
    filter: &ScopeFilter,
    columns: &ScopeColumns,
) -> Result<(), ScopeQueryError> {
    match filter {
        ScopeFilter::Unrestricted => {
            builder.push("TRUE");
        }
        ScopeFilter::Nothing => {
            builder.push("FALSE");
        }
        ScopeFilter::Restrict { node, path } => {
            let column = columns.column_for(path)?;
            builder.push(column).push(" = ").push_bind(node.uuid());
        }
    }
    Ok(())
}
