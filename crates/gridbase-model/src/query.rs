//! Request and response shapes for the paginated row query.
//!
//! A [`RowQuery`] is the caller-facing description of one grid read:
//! which filters apply, how they join, which sort keys order the rows, and
//! which window of the result to return. The storage crate compiles it to
//! SQL; these types stay engine-agnostic.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::compare::{ComparisonFunction, FilterJoin, SortDirection};
use crate::config::{Filter, SortOrder};
use crate::entities::ColumnType;

/// One filter to apply, referencing a column of the queried table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterSpec {
    pub column_id: Uuid,
    pub comparison_function: ComparisonFunction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comparison_value: Option<String>,
}

impl From<&Filter> for FilterSpec {
    fn from(filter: &Filter) -> Self {
        FilterSpec {
            column_id: filter.column_id,
            comparison_function: filter.comparison_function,
            comparison_value: filter.comparison_value.clone(),
        }
    }
}

/// One sort key. Earlier keys take precedence over later ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SortSpec {
    pub column_id: Uuid,
    pub direction: SortDirection,
}

impl From<&SortOrder> for SortSpec {
    fn from(sort: &SortOrder) -> Self {
        SortSpec {
            column_id: sort.column_id,
            direction: sort.direction,
        }
    }
}

/// A pagination window. `limit` rows starting `offset` rows into the
/// filtered, sorted result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RowWindow {
    pub offset: u64,
    pub limit: u64,
}

/// A full row-query request. The default query has no filters, no sorts,
/// and no window: every row of the table in creation order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RowQuery {
    #[serde(default)]
    pub filters: Vec<FilterSpec>,
    #[serde(default)]
    pub sorts: Vec<SortSpec>,
    /// How `filters` combine; ignored when `filters` is empty.
    #[serde(default)]
    pub join: FilterJoin,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub window: Option<RowWindow>,
}

impl RowQuery {
    /// A query over the table's active configuration records.
    pub fn from_active(filters: &[Filter], sorts: &[SortOrder]) -> Self {
        RowQuery {
            filters: filters.iter().map(FilterSpec::from).collect(),
            sorts: sorts.iter().map(SortSpec::from).collect(),
            join: FilterJoin::default(),
            window: None,
        }
    }

    pub fn with_window(mut self, offset: u64, limit: u64) -> Self {
        self.window = Some(RowWindow { offset, limit });
        self
    }
}

/// The column summary embedded in each returned cell, so a page renders
/// without a second lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnInfo {
    pub id: Uuid,
    pub name: String,
    #[serde(rename = "type")]
    pub column_type: ColumnType,
}

/// One cell of a returned row, with its column summary attached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CellData {
    pub id: Uuid,
    pub column_id: Uuid,
    pub value: String,
    pub column: ColumnInfo,
}

/// One row of a query result. `cells` is ordered by column position and
/// omits hidden columns; a freshly created row still lists one cell per
/// visible column because cells are back-filled on creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RowData {
    pub id: Uuid,
    pub cells: Vec<CellData>,
}

impl RowData {
    /// The value of this row's cell in `column_id`, if that column is
    /// present (visible) in the result.
    pub fn value(&self, column_id: Uuid) -> Option<&str> {
        self.cells
            .iter()
            .find(|cell| cell.column_id == column_id)
            .map(|cell| cell.value.as_str())
    }
}

/// One page of query results plus the total match count across all pages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RowPage {
    /// Number of rows matching the filters, ignoring the window.
    pub total_count: u64,
    pub rows: Vec<RowData>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn row_query_defaults_are_empty() {
        let query = RowQuery::default();
        assert!(query.filters.is_empty());
        assert!(query.sorts.is_empty());
        assert_eq!(query.join, FilterJoin::Any);
        assert_eq!(query.window, None);
    }

    #[test]
    fn row_query_deserializes_with_missing_fields() {
        let query: RowQuery = serde_json::from_str(r#"{"filters": []}"#).expect("parse query");
        assert_eq!(query, RowQuery::default());
    }

    #[test]
    fn cell_data_parses_aggregated_json() {
        // The shape produced by the storage layer's json_object aggregation.
        let json = r#"[{
            "id": "5f8bd9c3-95bc-4d74-a26b-8d572fd00b3f",
            "columnId": "0b6f7f54-4a6b-4f53-9a43-0f2b2ac100d8",
            "value": "Alice",
            "column": {
                "id": "0b6f7f54-4a6b-4f53-9a43-0f2b2ac100d8",
                "name": "Name",
                "type": "TEXT"
            }
        }]"#;
        let cells: Vec<CellData> = serde_json::from_str(json).expect("parse cells");
        assert_eq!(cells.len(), 1);
        assert_eq!(cells[0].value, "Alice");
        assert_eq!(cells[0].column.column_type, ColumnType::Text);
        assert_eq!(cells[0].column_id, cells[0].column.id);
    }

    #[test]
    fn row_data_value_looks_up_by_column() {
        let column_id = Uuid::new_v4();
        let row = RowData {
            id: Uuid::new_v4(),
            cells: vec![CellData {
                id: Uuid::new_v4(),
                column_id,
                value: "42".to_string(),
                column: ColumnInfo {
                    id: column_id,
                    name: "Age".to_string(),
                    column_type: ColumnType::Number,
                },
            }],
        };
        assert_eq!(row.value(column_id), Some("42"));
        assert_eq!(row.value(Uuid::new_v4()), None);
    }

    #[test]
    fn from_active_maps_configuration_records() {
        let filter = Filter {
            id: Uuid::new_v4(),
            column_id: Uuid::new_v4(),
            comparison_function: ComparisonFunction::Contains,
            comparison_value: Some("ann".to_string()),
            is_active: true,
        };
        let sort = SortOrder {
            id: Uuid::new_v4(),
            column_id: Uuid::new_v4(),
            direction: SortDirection::Desc,
            is_active: true,
        };
        let query = RowQuery::from_active(&[filter.clone()], &[sort.clone()]);
        assert_eq!(query.filters[0].column_id, filter.column_id);
        assert_eq!(query.filters[0].comparison_value.as_deref(), Some("ann"));
        assert_eq!(query.sorts[0].direction, SortDirection::Desc);
    }
}
