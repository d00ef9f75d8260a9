//! Per-column configuration records: filters, sort orders, hidden columns.
//!
//! These records persist independently of any view. Deactivating one keeps
//! it around so a view snapshot can re-activate it later; only an explicit
//! delete removes the record itself.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::compare::{ComparisonFunction, SortDirection};

/// A stored row predicate on one column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Filter {
    pub id: Uuid,
    pub column_id: Uuid,
    pub comparison_function: ComparisonFunction,
    /// `None` exactly for the value-less comparison functions.
    pub comparison_value: Option<String>,
    pub is_active: bool,
}

/// A stored sort key on one column. At most one sort order per column is
/// active at a time; changing direction activates a sibling record instead
/// of flipping this one in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SortOrder {
    pub id: Uuid,
    pub column_id: Uuid,
    pub direction: SortDirection,
    pub is_active: bool,
}

/// Visibility state for one column. A column has at most one hidden-column
/// record; the record existing with `is_active: false` means "visible".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HiddenColumn {
    pub id: Uuid,
    pub column_id: Uuid,
    pub is_active: bool,
}
