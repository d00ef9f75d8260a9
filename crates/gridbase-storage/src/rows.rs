//! Row structure operations, including bulk seeded inserts.

use crate::storage::{ensure_table, read_uuid, Result, Storage, StorageError};
use gridbase_model::{ColumnType, Row};
use rand::Rng;
use rusqlite::{params, OptionalExtension};
use uuid::Uuid;

/// Upper bound on one bulk insert request.
pub const MAX_BULK_ROWS: u64 = 100_000;

/// Rows per transaction during a bulk insert. Keeps any one transaction
/// short so readers on other connections are not starved.
const BULK_BATCH_SIZE: u64 = 1_000;

impl Storage {
    /// Creates a row at the end of the table with one empty cell per column.
    pub fn create_row(&self, table_id: Uuid) -> Result<Row> {
        let mut conn = self.conn.lock().expect("storage mutex poisoned");
        let tx = conn.transaction()?;

        ensure_table(&tx, table_id)?;
        let position: i64 = tx.query_row(
            "SELECT COALESCE(MAX(position) + 1, 0) FROM rows WHERE table_id = ?1",
            params![table_id.to_string()],
            |r| r.get(0),
        )?;

        let row_id = Uuid::new_v4();
        tx.execute(
            "INSERT INTO rows (id, table_id, position) VALUES (?1, ?2, ?3)",
            params![row_id.to_string(), table_id.to_string(), position],
        )?;

        {
            let mut select = tx.prepare("SELECT id FROM columns WHERE table_id = ?1")?;
            let column_ids =
                select.query_map(params![table_id.to_string()], |r| r.get::<_, String>(0))?;
            let mut insert = tx.prepare(
                "INSERT INTO cells (id, row_id, column_id, value) VALUES (?1, ?2, ?3, '')",
            )?;
            for column_id in column_ids {
                insert.execute(params![
                    Uuid::new_v4().to_string(),
                    row_id.to_string(),
                    column_id?
                ])?;
            }
        }

        tx.commit()?;
        Ok(Row {
            id: row_id,
            table_id,
            position,
        })
    }

    pub fn get_row(&self, id: Uuid) -> Result<Row> {
        let conn = self.conn.lock().expect("storage mutex poisoned");
        let row = conn
            .query_row(
                "SELECT id, table_id, position FROM rows WHERE id = ?1",
                params![id.to_string()],
                |r| {
                    Ok(Row {
                        id: read_uuid(r, 0)?,
                        table_id: read_uuid(r, 1)?,
                        position: r.get(2)?,
                    })
                },
            )
            .optional()?;

        row.ok_or(StorageError::RowNotFound(id))
    }

    /// Deletes a row and its cells, then closes the position gap among the
    /// remaining rows so creation order stays dense.
    pub fn delete_row(&self, id: Uuid) -> Result<()> {
        let mut conn = self.conn.lock().expect("storage mutex poisoned");
        let tx = conn.transaction()?;

        let target = tx
            .query_row(
                "SELECT table_id, position FROM rows WHERE id = ?1",
                params![id.to_string()],
                |r| Ok((r.get::<_, String>(0)?, r.get::<_, i64>(1)?)),
            )
            .optional()?;
        let (table_id, position) = target.ok_or(StorageError::RowNotFound(id))?;

        tx.execute("DELETE FROM rows WHERE id = ?1", params![id.to_string()])?;
        tx.execute(
            "UPDATE rows SET position = position - 1 WHERE table_id = ?1 AND position > ?2",
            params![table_id, position],
        )?;

        tx.commit()?;
        Ok(())
    }

    /// Appends `count` seeded rows in batched transactions and returns the
    /// number inserted. `TEXT` columns are filled with `"Data {position}"`,
    /// `NUMBER` columns with a random integer below 10000.
    pub fn insert_bulk_rows(&self, table_id: Uuid, count: u64) -> Result<u64> {
        if count > MAX_BULK_ROWS {
            return Err(StorageError::BulkLimitExceeded(count));
        }
        if count == 0 {
            return Ok(0);
        }

        let mut conn = self.conn.lock().expect("storage mutex poisoned");
        ensure_table(&conn, table_id)?;

        // The column set and starting position are snapshotted once; the
        // connection mutex keeps them stable across batches.
        let columns: Vec<(String, ColumnType)> = {
            let mut stmt = conn
                .prepare("SELECT id, type FROM columns WHERE table_id = ?1 ORDER BY position")?;
            let rows = stmt.query_map(params![table_id.to_string()], |r| {
                let raw_type: String = r.get(1)?;
                let column_type = raw_type
                    .parse::<ColumnType>()
                    .map_err(|_| rusqlite::Error::InvalidQuery)?;
                Ok((r.get::<_, String>(0)?, column_type))
            })?;
            let mut out = Vec::new();
            for column in rows {
                out.push(column?);
            }
            out
        };
        let start: i64 = conn.query_row(
            "SELECT COALESCE(MAX(position) + 1, 0) FROM rows WHERE table_id = ?1",
            params![table_id.to_string()],
            |r| r.get(0),
        )?;

        let mut rng = rand::thread_rng();
        let mut inserted: u64 = 0;
        while inserted < count {
            let batch = (count - inserted).min(BULK_BATCH_SIZE);
            let tx = conn.transaction()?;
            {
                let mut insert_row = tx
                    .prepare("INSERT INTO rows (id, table_id, position) VALUES (?1, ?2, ?3)")?;
                let mut insert_cell = tx.prepare(
                    "INSERT INTO cells (id, row_id, column_id, value) VALUES (?1, ?2, ?3, ?4)",
                )?;
                for i in 0..batch {
                    let position = start + (inserted + i) as i64;
                    let row_id = Uuid::new_v4();
                    insert_row.execute(params![
                        row_id.to_string(),
                        table_id.to_string(),
                        position
                    ])?;
                    for (column_id, column_type) in &columns {
                        let value = match column_type {
                            ColumnType::Text => format!("Data {position}"),
                            ColumnType::Number => rng.gen_range(0..10_000).to_string(),
                        };
                        insert_cell.execute(params![
                            Uuid::new_v4().to_string(),
                            row_id.to_string(),
                            column_id,
                            value
                        ])?;
                    }
                }
            }
            tx.commit()?;
            inserted += batch;
            tracing::debug!(table = %table_id, inserted, total = count, "bulk row batch committed");
        }

        Ok(inserted)
    }
}
