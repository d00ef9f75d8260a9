//! `gridbase-model` defines the core data-grid structures.
//!
//! The crate is intentionally datastore-free so it can be reused by:
//! - the SQLite storage and row-query engine (`gridbase-storage`)
//! - API/IPC boundaries via `serde` (camelCase, JSON-safe schema)
//!
//! A grid is a `Base` holding ordered `Table`s; each table has ordered
//! `Column`s and `Row`s, with one `Cell` per row/column pair. Filters, sort
//! orders, and hidden columns are per-column configuration records that are
//! toggled on and off as a group by named `View`s.

mod compare;
mod config;
mod entities;
mod query;
mod view;

pub use compare::{
    canonicalize_number, is_number_value, ComparisonFunction, FilterJoin, NumberParseError,
    SortDirection, UnknownComparisonFunction, UnknownSortDirection,
};
pub use config::{Filter, HiddenColumn, SortOrder};
pub use entities::{
    validate_name, Base, Cell, Column, ColumnType, ColumnTypeParseError, NameError, Row, Table,
};
pub use query::{CellData, ColumnInfo, FilterSpec, RowData, RowPage, RowQuery, RowWindow, SortSpec};
pub use view::{View, ViewConfig};
