use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Error for user-supplied base/table/column/view names.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NameError {
    #[error("name cannot be empty")]
    Empty,
}

/// Validates a user-supplied name and returns it trimmed.
///
/// Names are stored trimmed; a name that is empty after trimming is rejected.
pub fn validate_name(name: &str) -> Result<&str, NameError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(NameError::Empty);
    }
    Ok(trimmed)
}

/// The storage type of a column. Every cell value is persisted as text;
/// the column type decides how values are validated, compared, and sorted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ColumnType {
    Text,
    Number,
}

impl ColumnType {
    pub fn as_str(self) -> &'static str {
        match self {
            ColumnType::Text => "TEXT",
            ColumnType::Number => "NUMBER",
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown column type: {0}")]
pub struct ColumnTypeParseError(pub String);

impl FromStr for ColumnType {
    type Err = ColumnTypeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "TEXT" => Ok(ColumnType::Text),
            "NUMBER" => Ok(ColumnType::Number),
            other => Err(ColumnTypeParseError(other.to_string())),
        }
    }
}

/// A workspace owning an ordered list of tables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Base {
    pub id: Uuid,
    pub name: String,
    pub owner: String,
}

/// A grid of rows and columns living inside a base.
///
/// `active_view_id` names the view whose configuration snapshot was applied
/// most recently; it is `None` only for tables created by older schema
/// revisions that predate views.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Table {
    pub id: Uuid,
    pub base_id: Uuid,
    pub name: String,
    /// Zero-based position among the sibling tables of the base.
    pub position: i64,
    pub active_view_id: Option<Uuid>,
}

/// A typed column of a table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Column {
    pub id: Uuid,
    pub table_id: Uuid,
    pub name: String,
    #[serde(rename = "type")]
    pub column_type: ColumnType,
    /// Zero-based display position among the sibling columns.
    pub position: i64,
}

/// A row of a table. Cell contents live in [`Cell`] records, one per column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Row {
    pub id: Uuid,
    pub table_id: Uuid,
    /// Zero-based creation-order position; the final sort tie-breaker.
    pub position: i64,
}

/// One cell at a row/column intersection. The value is always stored as
/// text; `NUMBER` columns keep a canonical numeric rendering (see
/// [`canonicalize_number`](crate::canonicalize_number)).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cell {
    pub id: Uuid,
    pub row_id: Uuid,
    pub column_id: Uuid,
    pub value: String,
}

impl Cell {
    /// True when the cell holds no value.
    pub fn is_empty(&self) -> bool {
        self.value.is_empty()
    }
}
