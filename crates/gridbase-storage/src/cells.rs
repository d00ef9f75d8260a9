//! Cell reads and writes. Writes validate against the column type.

use crate::storage::{ensure_table, read_uuid, Result, Storage, StorageError};
use gridbase_model::{canonicalize_number, Cell, ColumnType};
use rusqlite::{params, OptionalExtension};
use uuid::Uuid;

impl Storage {
    /// Writes a cell value.
    ///
    /// Values for `NUMBER` columns are validated and canonicalized (`"007"`
    /// is stored as `"7"`, blank input as `""`); `TEXT` columns accept the
    /// value verbatim.
    pub fn update_cell(&self, id: Uuid, value: &str) -> Result<Cell> {
        let mut conn = self.conn.lock().expect("storage mutex poisoned");
        let tx = conn.transaction()?;

        let target = tx
            .query_row(
                r#"
                SELECT c.row_id, c.column_id, col.name, col.type
                FROM cells c
                JOIN columns col ON col.id = c.column_id
                WHERE c.id = ?1
                "#,
                params![id.to_string()],
                |r| {
                    let raw_type: String = r.get(3)?;
                    let column_type = raw_type
                        .parse::<ColumnType>()
                        .map_err(|_| rusqlite::Error::InvalidQuery)?;
                    Ok((
                        read_uuid(r, 0)?,
                        read_uuid(r, 1)?,
                        r.get::<_, String>(2)?,
                        column_type,
                    ))
                },
            )
            .optional()?;
        let (row_id, column_id, column_name, column_type) =
            target.ok_or(StorageError::CellNotFound(id))?;

        let stored = match column_type {
            ColumnType::Number => {
                canonicalize_number(value).map_err(|_| StorageError::NonNumericValue {
                    column: column_name,
                    value: value.to_string(),
                })?
            }
            ColumnType::Text => value.to_string(),
        };

        tx.execute(
            "UPDATE cells SET value = ?1 WHERE id = ?2",
            params![&stored, id.to_string()],
        )?;
        tx.commit()?;

        Ok(Cell {
            id,
            row_id,
            column_id,
            value: stored,
        })
    }

    pub fn get_cell(&self, id: Uuid) -> Result<Cell> {
        let conn = self.conn.lock().expect("storage mutex poisoned");
        let row = conn
            .query_row(
                "SELECT id, row_id, column_id, value FROM cells WHERE id = ?1",
                params![id.to_string()],
                cell_from_row,
            )
            .optional()?;

        row.ok_or(StorageError::CellNotFound(id))
    }

    /// All cells of one row, ordered by column position.
    pub fn cells_for_row(&self, row_id: Uuid) -> Result<Vec<Cell>> {
        let conn = self.conn.lock().expect("storage mutex poisoned");
        conn.query_row(
            "SELECT 1 FROM rows WHERE id = ?1",
            params![row_id.to_string()],
            |_| Ok(()),
        )
        .optional()?
        .ok_or(StorageError::RowNotFound(row_id))?;

        let mut stmt = conn.prepare(
            r#"
            SELECT c.id, c.row_id, c.column_id, c.value
            FROM cells c
            JOIN columns col ON col.id = c.column_id
            WHERE c.row_id = ?1
            ORDER BY col.position
            "#,
        )?;

        let rows = stmt.query_map(params![row_id.to_string()], cell_from_row)?;

        let mut cells = Vec::new();
        for cell in rows {
            cells.push(cell?);
        }
        Ok(cells)
    }

    pub fn cell_count(&self, table_id: Uuid) -> Result<u64> {
        let conn = self.conn.lock().expect("storage mutex poisoned");
        let count: u64 = conn.query_row(
            r#"
            SELECT COUNT(*)
            FROM cells c
            JOIN rows r ON r.id = c.row_id
            WHERE r.table_id = ?1
            "#,
            params![table_id.to_string()],
            |r| r.get(0),
        )?;
        Ok(count)
    }

    /// Case-insensitive substring search across every cell of a table,
    /// capped at `limit` matches in row order. `%` and `_` in the query
    /// keep their `LIKE` wildcard meaning.
    pub fn search_cells(&self, table_id: Uuid, query: &str, limit: u64) -> Result<Vec<Cell>> {
        let conn = self.conn.lock().expect("storage mutex poisoned");
        ensure_table(&conn, table_id)?;

        let mut stmt = conn.prepare(
            r#"
            SELECT c.id, c.row_id, c.column_id, c.value
            FROM cells c
            JOIN rows r ON r.id = c.row_id
            JOIN columns col ON col.id = c.column_id
            WHERE r.table_id = ?1 AND c.value LIKE ?2
            ORDER BY r.position, col.position
            LIMIT ?3
            "#,
        )?;

        let pattern = format!("%{query}%");
        let rows = stmt.query_map(
            params![table_id.to_string(), pattern, limit as i64],
            cell_from_row,
        )?;

        let mut cells = Vec::new();
        for cell in rows {
            cells.push(cell?);
        }
        Ok(cells)
    }
}

fn cell_from_row(r: &rusqlite::Row<'_>) -> rusqlite::Result<Cell> {
    Ok(Cell {
        id: read_uuid(r, 0)?,
        row_id: read_uuid(r, 1)?,
        column_id: read_uuid(r, 2)?,
        value: r.get(3)?,
    })
}
