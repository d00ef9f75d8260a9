//! Column structure operations. Creating a column back-fills one empty cell
//! per existing row; deleting one renormalizes sibling positions.

use crate::storage::{ensure_table, read_uuid, Result, Storage, StorageError};
use gridbase_model::{is_number_value, validate_name, Column, ColumnType};
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

impl Storage {
    pub fn create_column(
        &self,
        table_id: Uuid,
        name: &str,
        column_type: ColumnType,
    ) -> Result<Column> {
        let name = validate_name(name)?;
        let mut conn = self.conn.lock().expect("storage mutex poisoned");
        let tx = conn.transaction()?;

        ensure_table(&tx, table_id)?;
        let position: i64 = tx.query_row(
            "SELECT COALESCE(MAX(position) + 1, 0) FROM columns WHERE table_id = ?1",
            params![table_id.to_string()],
            |r| r.get(0),
        )?;

        let column_id = Uuid::new_v4();
        tx.execute(
            "INSERT INTO columns (id, table_id, name, type, position) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                column_id.to_string(),
                table_id.to_string(),
                name,
                column_type.as_str(),
                position
            ],
        )?;

        // Back-fill one empty cell per existing row so the grid stays dense.
        {
            let mut select = tx.prepare("SELECT id FROM rows WHERE table_id = ?1")?;
            let row_ids = select.query_map(params![table_id.to_string()], |r| {
                r.get::<_, String>(0)
            })?;
            let mut insert = tx.prepare(
                "INSERT INTO cells (id, row_id, column_id, value) VALUES (?1, ?2, ?3, '')",
            )?;
            for row_id in row_ids {
                insert.execute(params![
                    Uuid::new_v4().to_string(),
                    row_id?,
                    column_id.to_string()
                ])?;
            }
        }

        tx.commit()?;
        Ok(Column {
            id: column_id,
            table_id,
            name: name.to_string(),
            column_type,
            position,
        })
    }

    pub fn get_column(&self, id: Uuid) -> Result<Column> {
        let conn = self.conn.lock().expect("storage mutex poisoned");
        fetch_column(&conn, id)
    }

    pub fn list_columns(&self, table_id: Uuid) -> Result<Vec<Column>> {
        let conn = self.conn.lock().expect("storage mutex poisoned");
        ensure_table(&conn, table_id)?;
        let mut stmt = conn.prepare(
            r#"
            SELECT id, table_id, name, type, position
            FROM columns
            WHERE table_id = ?1
            ORDER BY position
            "#,
        )?;

        let rows = stmt.query_map(params![table_id.to_string()], column_from_row)?;

        let mut columns = Vec::new();
        for column in rows {
            columns.push(column?);
        }
        Ok(columns)
    }

    pub fn rename_column(&self, id: Uuid, name: &str) -> Result<()> {
        let name = validate_name(name)?;
        let conn = self.conn.lock().expect("storage mutex poisoned");
        let updated = conn.execute(
            "UPDATE columns SET name = ?1 WHERE id = ?2",
            params![name, id.to_string()],
        )?;
        if updated == 0 {
            return Err(StorageError::ColumnNotFound(id));
        }
        Ok(())
    }

    /// Changes a column's storage type.
    ///
    /// Converting to `NUMBER` scans the column's existing cell values first
    /// and refuses if any non-empty value is non-numeric, leaving the column
    /// untouched. Values written while the column was `TEXT` keep their raw
    /// spelling; only writes made after the conversion are canonicalized.
    pub fn set_column_type(&self, id: Uuid, column_type: ColumnType) -> Result<Column> {
        let mut conn = self.conn.lock().expect("storage mutex poisoned");
        let tx = conn.transaction()?;

        let mut column = fetch_column(&tx, id)?;
        if column.column_type == column_type {
            return Ok(column);
        }

        if column_type == ColumnType::Number {
            let mut stmt =
                tx.prepare("SELECT value FROM cells WHERE column_id = ?1 AND value <> ''")?;
            let values = stmt.query_map(params![id.to_string()], |r| r.get::<_, String>(0))?;
            for value in values {
                if !is_number_value(&value?) {
                    return Err(StorageError::TypeChangeBlocked {
                        column: column.name,
                    });
                }
            }
        }

        tx.execute(
            "UPDATE columns SET type = ?1 WHERE id = ?2",
            params![column_type.as_str(), id.to_string()],
        )?;
        tx.commit()?;

        column.column_type = column_type;
        Ok(column)
    }

    /// Deletes a column along with its cells and configuration records,
    /// then closes the position gap among its siblings.
    pub fn delete_column(&self, id: Uuid) -> Result<()> {
        let mut conn = self.conn.lock().expect("storage mutex poisoned");
        let tx = conn.transaction()?;

        let target = tx
            .query_row(
                "SELECT table_id, position FROM columns WHERE id = ?1",
                params![id.to_string()],
                |r| Ok((r.get::<_, String>(0)?, r.get::<_, i64>(1)?)),
            )
            .optional()?;
        let (table_id, position) = target.ok_or(StorageError::ColumnNotFound(id))?;

        tx.execute("DELETE FROM columns WHERE id = ?1", params![id.to_string()])?;
        tx.execute(
            "UPDATE columns SET position = position - 1 WHERE table_id = ?1 AND position > ?2",
            params![table_id, position],
        )?;

        tx.commit()?;
        Ok(())
    }
}

pub(crate) fn column_from_row(r: &rusqlite::Row<'_>) -> rusqlite::Result<Column> {
    let raw_type: String = r.get(3)?;
    Ok(Column {
        id: read_uuid(r, 0)?,
        table_id: read_uuid(r, 1)?,
        name: r.get(2)?,
        column_type: raw_type
            .parse()
            .map_err(|_| rusqlite::Error::InvalidQuery)?,
        position: r.get(4)?,
    })
}

pub(crate) fn fetch_column(conn: &Connection, id: Uuid) -> Result<Column> {
    let row = conn
        .query_row(
            r#"
            SELECT id, table_id, name, type, position
            FROM columns
            WHERE id = ?1
            "#,
            params![id.to_string()],
            column_from_row,
        )
        .optional()?;

    row.ok_or(StorageError::ColumnNotFound(id))
}
