//! SQLite-backed storage for gridbase tables.
//!
//! This crate is intentionally self-contained so it can sit behind an API
//! server or an IPC boundary unchanged. It exposes:
//! - SQLite schema creation (bases, tables, columns, rows, cells, and the
//!   filter/sort/hidden-column configuration plus views)
//! - Structure operations with position renormalization and cell back-fill
//! - Typed cell writes with numeric canonicalization
//! - A dynamic row-query engine: active filters compile to one SQL
//!   predicate, sort keys to correlated lookups, with windowed pages and a
//!   total match count from the same predicate
//! - Transactional view snapshots (save, switch, create, delete)
//! - Bulk seeded row insertion in batched transactions

mod cells;
mod columns;
mod config;
mod query;
mod rows;
mod schema;
pub mod storage;
mod views;

pub use storage::{Storage, StorageError};

pub use rows::MAX_BULK_ROWS;
