//! Canonical column list for a run
//!
//! Column names are spliced into the insert statement, so every name must be
//! a plain SQL identifier. Names are not quoted and fold to lower case on the
//! database side, the same way hand-written SQL would.

use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;
use thiserror::Error;

#[allow(clippy::unwrap_used)]
static IDENTIFIER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap());

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HeaderError {
    #[error("header has no columns")]
    Empty,

    #[error("'{0}' is not a valid SQL identifier (expected letters, digits and underscores)")]
    InvalidIdentifier(String),

    #[error("column '{0}' appears more than once")]
    Duplicate(String),
}

/// True when `name` can be used unquoted as a column or table name
pub fn is_identifier(name: &str) -> bool {
    IDENTIFIER.is_match(name)
}

/// Check a table reference, optionally schema qualified (`schema.table`)
pub fn validate_table_name(table: &str) -> Result<(), HeaderError> {
    let mut parts = table.split('.');
    let valid = match (parts.next(), parts.next(), parts.next()) {
        (Some(name), None, None) => is_identifier(name),
        (Some(schema), Some(name), None) => is_identifier(schema) && is_identifier(name),
        _ => false,
    };

    if valid {
        Ok(())
    } else {
        Err(HeaderError::InvalidIdentifier(table.to_string()))
    }
}

/// Trim surrounding whitespace and a leading byte order mark from raw
/// header fields as they come out of the file.
pub fn normalize_columns(columns: Vec<String>) -> Vec<String> {
    columns
        .into_iter()
        .enumerate()
        .map(|(i, column)| {
            let column = if i == 0 {
                column.trim_start_matches('\u{feff}')
            } else {
                column.as_str()
            };
            column.trim().to_string()
        })
        .collect()
}

/// Ordered column names that define the insert column order.
///
/// Built once when the first record is read and shared read-only
/// (behind an `Arc`) by the reorderer and every worker afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    columns: Vec<String>,
}

impl Header {
    pub fn new(columns: Vec<String>) -> Result<Self, HeaderError> {
        if columns.is_empty() {
            return Err(HeaderError::Empty);
        }

        let mut seen = HashSet::with_capacity(columns.len());
        for column in &columns {
            if !is_identifier(column) {
                return Err(HeaderError::InvalidIdentifier(column.clone()));
            }
            if !seen.insert(column.to_lowercase()) {
                return Err(HeaderError::Duplicate(column.clone()));
            }
        }

        Ok(Self { columns })
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Position of `name` in the header, by exact match
    pub fn position(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }
}
