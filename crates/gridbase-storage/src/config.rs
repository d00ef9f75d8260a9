//! Lifecycle of the per-column configuration records: filters, sort orders,
//! and hidden columns.
//!
//! Creation is create-or-reactivate: a record that matches an existing one
//! is re-activated instead of duplicated, so views never end up pointing at
//! stale duplicates. Sort orders additionally keep at most one active
//! record per column.

use crate::columns::fetch_column;
use crate::storage::{ensure_table, read_uuid, Result, Storage, StorageError};
use gridbase_model::{ComparisonFunction, Filter, HiddenColumn, SortDirection, SortOrder};
use rusqlite::{params, Connection, OptionalExtension, Transaction};
use uuid::Uuid;

impl Storage {
    /// Creates a filter on a column, or re-activates the existing record
    /// with the same function and value. Value-less functions store no
    /// comparison value even when one is supplied.
    pub fn create_filter(
        &self,
        column_id: Uuid,
        comparison_function: ComparisonFunction,
        comparison_value: Option<&str>,
    ) -> Result<Filter> {
        if comparison_function.requires_value() && comparison_value.is_none() {
            return Err(StorageError::MissingComparisonValue(comparison_function));
        }
        let comparison_value = if comparison_function.requires_value() {
            comparison_value
        } else {
            None
        };

        let mut conn = self.conn.lock().expect("storage mutex poisoned");
        let tx = conn.transaction()?;
        fetch_column(&tx, column_id)?;

        // `IS` instead of `=` so the value-less functions (NULL value)
        // still match their existing record.
        let existing: Option<String> = tx
            .query_row(
                r#"
                SELECT id FROM filters
                WHERE column_id = ?1 AND comparison_function = ?2 AND comparison_value IS ?3
                "#,
                params![
                    column_id.to_string(),
                    comparison_function.as_str(),
                    comparison_value
                ],
                |r| r.get(0),
            )
            .optional()?;

        let filter_id = match existing {
            Some(id) => {
                tx.execute(
                    "UPDATE filters SET is_active = 1 WHERE id = ?1",
                    params![&id],
                )?;
                Uuid::parse_str(&id).map_err(|_| rusqlite::Error::InvalidQuery)?
            }
            None => {
                let id = Uuid::new_v4();
                tx.execute(
                    r#"
                    INSERT INTO filters (id, column_id, comparison_function, comparison_value, is_active)
                    VALUES (?1, ?2, ?3, ?4, 1)
                    "#,
                    params![
                        id.to_string(),
                        column_id.to_string(),
                        comparison_function.as_str(),
                        comparison_value
                    ],
                )?;
                id
            }
        };

        tx.commit()?;
        Ok(Filter {
            id: filter_id,
            column_id,
            comparison_function,
            comparison_value: comparison_value.map(str::to_string),
            is_active: true,
        })
    }

    /// Partially updates a filter. `None` arguments leave the field as is;
    /// a comparison value supplied for a value-less function is ignored.
    pub fn set_filter_state(
        &self,
        id: Uuid,
        comparison_value: Option<&str>,
        is_active: Option<bool>,
    ) -> Result<Filter> {
        let mut conn = self.conn.lock().expect("storage mutex poisoned");
        let tx = conn.transaction()?;
        let mut filter = fetch_filter(&tx, id)?;

        if let Some(value) = comparison_value {
            if filter.comparison_function.requires_value() {
                tx.execute(
                    "UPDATE filters SET comparison_value = ?1 WHERE id = ?2",
                    params![value, id.to_string()],
                )?;
                filter.comparison_value = Some(value.to_string());
            }
        }
        if let Some(active) = is_active {
            tx.execute(
                "UPDATE filters SET is_active = ?1 WHERE id = ?2",
                params![active, id.to_string()],
            )?;
            filter.is_active = active;
        }

        tx.commit()?;
        Ok(filter)
    }

    pub fn delete_filter(&self, id: Uuid) -> Result<()> {
        let conn = self.conn.lock().expect("storage mutex poisoned");
        let deleted = conn.execute("DELETE FROM filters WHERE id = ?1", params![id.to_string()])?;
        if deleted == 0 {
            return Err(StorageError::FilterNotFound(id));
        }
        Ok(())
    }

    pub fn list_filters(&self, table_id: Uuid) -> Result<Vec<Filter>> {
        let conn = self.conn.lock().expect("storage mutex poisoned");
        ensure_table(&conn, table_id)?;
        let mut stmt = conn.prepare(
            r#"
            SELECT f.id, f.column_id, f.comparison_function, f.comparison_value, f.is_active
            FROM filters f
            JOIN columns c ON c.id = f.column_id
            WHERE c.table_id = ?1
            ORDER BY f.rowid
            "#,
        )?;

        let rows = stmt.query_map(params![table_id.to_string()], filter_from_row)?;

        let mut filters = Vec::new();
        for filter in rows {
            filters.push(filter?);
        }
        Ok(filters)
    }

    pub fn list_active_filters(&self, table_id: Uuid) -> Result<Vec<Filter>> {
        let conn = self.conn.lock().expect("storage mutex poisoned");
        ensure_table(&conn, table_id)?;
        active_filters(&conn, table_id)
    }

    /// Creates or re-activates a sort key on a column. At most one sort
    /// order per column is ever active, so any sibling record is
    /// deactivated first.
    pub fn create_sort_order(&self, column_id: Uuid, direction: SortDirection) -> Result<SortOrder> {
        let mut conn = self.conn.lock().expect("storage mutex poisoned");
        let tx = conn.transaction()?;
        fetch_column(&tx, column_id)?;
        let sort = activate_sort_order_tx(&tx, column_id, direction)?;
        tx.commit()?;
        Ok(sort)
    }

    /// Partially updates a sort order.
    ///
    /// A direction change is never an in-place flip: it activates the
    /// sibling record for the new direction (creating it if needed), so the
    /// returned record can have a different id than the one addressed.
    /// Activating a sort deactivates any sibling on the same column.
    pub fn set_sort_order_state(
        &self,
        id: Uuid,
        direction: Option<SortDirection>,
        is_active: Option<bool>,
    ) -> Result<SortOrder> {
        let mut conn = self.conn.lock().expect("storage mutex poisoned");
        let tx = conn.transaction()?;
        let current = fetch_sort_order(&tx, id)?;

        let updated = match direction {
            Some(new_direction) if new_direction != current.direction => {
                let target_active = is_active.unwrap_or(current.is_active);
                let sort = activate_sort_order_tx(&tx, current.column_id, new_direction)?;
                if target_active {
                    sort
                } else {
                    tx.execute(
                        "UPDATE sort_orders SET is_active = 0 WHERE id = ?1",
                        params![sort.id.to_string()],
                    )?;
                    SortOrder {
                        is_active: false,
                        ..sort
                    }
                }
            }
            _ => match is_active {
                Some(true) => activate_sort_order_tx(&tx, current.column_id, current.direction)?,
                Some(false) => {
                    tx.execute(
                        "UPDATE sort_orders SET is_active = 0 WHERE id = ?1",
                        params![id.to_string()],
                    )?;
                    SortOrder {
                        is_active: false,
                        ..current
                    }
                }
                None => current,
            },
        };

        tx.commit()?;
        Ok(updated)
    }

    pub fn delete_sort_order(&self, id: Uuid) -> Result<()> {
        let conn = self.conn.lock().expect("storage mutex poisoned");
        let deleted = conn.execute(
            "DELETE FROM sort_orders WHERE id = ?1",
            params![id.to_string()],
        )?;
        if deleted == 0 {
            return Err(StorageError::SortOrderNotFound(id));
        }
        Ok(())
    }

    pub fn list_sort_orders(&self, table_id: Uuid) -> Result<Vec<SortOrder>> {
        let conn = self.conn.lock().expect("storage mutex poisoned");
        ensure_table(&conn, table_id)?;
        let mut stmt = conn.prepare(
            r#"
            SELECT s.id, s.column_id, s.direction, s.is_active
            FROM sort_orders s
            JOIN columns c ON c.id = s.column_id
            WHERE c.table_id = ?1
            ORDER BY s.rowid
            "#,
        )?;

        let rows = stmt.query_map(params![table_id.to_string()], sort_order_from_row)?;

        let mut sorts = Vec::new();
        for sort in rows {
            sorts.push(sort?);
        }
        Ok(sorts)
    }

    /// Active sort keys in creation order, which is their precedence order
    /// in the row query.
    pub fn list_active_sort_orders(&self, table_id: Uuid) -> Result<Vec<SortOrder>> {
        let conn = self.conn.lock().expect("storage mutex poisoned");
        ensure_table(&conn, table_id)?;
        active_sort_orders(&conn, table_id)
    }

    /// Marks a column hidden, creating or re-activating its hidden-column
    /// record. Hiding an already hidden column is a no-op.
    pub fn hide_column(&self, column_id: Uuid) -> Result<HiddenColumn> {
        let mut conn = self.conn.lock().expect("storage mutex poisoned");
        let tx = conn.transaction()?;
        fetch_column(&tx, column_id)?;

        let existing: Option<String> = tx
            .query_row(
                "SELECT id FROM hidden_columns WHERE column_id = ?1",
                params![column_id.to_string()],
                |r| r.get(0),
            )
            .optional()?;

        let hidden_id = match existing {
            Some(id) => {
                tx.execute(
                    "UPDATE hidden_columns SET is_active = 1 WHERE id = ?1",
                    params![&id],
                )?;
                Uuid::parse_str(&id).map_err(|_| rusqlite::Error::InvalidQuery)?
            }
            None => {
                let id = Uuid::new_v4();
                tx.execute(
                    "INSERT INTO hidden_columns (id, column_id, is_active) VALUES (?1, ?2, 1)",
                    params![id.to_string(), column_id.to_string()],
                )?;
                id
            }
        };

        tx.commit()?;
        Ok(HiddenColumn {
            id: hidden_id,
            column_id,
            is_active: true,
        })
    }

    pub fn set_hidden_column_state(&self, id: Uuid, is_active: bool) -> Result<HiddenColumn> {
        let conn = self.conn.lock().expect("storage mutex poisoned");
        let mut hidden = fetch_hidden_column(&conn, id)?;
        conn.execute(
            "UPDATE hidden_columns SET is_active = ?1 WHERE id = ?2",
            params![is_active, id.to_string()],
        )?;
        hidden.is_active = is_active;
        Ok(hidden)
    }

    pub fn delete_hidden_column(&self, id: Uuid) -> Result<()> {
        let conn = self.conn.lock().expect("storage mutex poisoned");
        let deleted = conn.execute(
            "DELETE FROM hidden_columns WHERE id = ?1",
            params![id.to_string()],
        )?;
        if deleted == 0 {
            return Err(StorageError::HiddenColumnNotFound(id));
        }
        Ok(())
    }

    pub fn list_hidden_columns(&self, table_id: Uuid) -> Result<Vec<HiddenColumn>> {
        let conn = self.conn.lock().expect("storage mutex poisoned");
        ensure_table(&conn, table_id)?;
        let mut stmt = conn.prepare(
            r#"
            SELECT h.id, h.column_id, h.is_active
            FROM hidden_columns h
            JOIN columns c ON c.id = h.column_id
            WHERE c.table_id = ?1
            ORDER BY h.rowid
            "#,
        )?;

        let rows = stmt.query_map(params![table_id.to_string()], hidden_column_from_row)?;

        let mut hidden = Vec::new();
        for record in rows {
            hidden.push(record?);
        }
        Ok(hidden)
    }

    pub fn list_active_hidden_columns(&self, table_id: Uuid) -> Result<Vec<HiddenColumn>> {
        let conn = self.conn.lock().expect("storage mutex poisoned");
        ensure_table(&conn, table_id)?;
        let mut stmt = conn.prepare(
            r#"
            SELECT h.id, h.column_id, h.is_active
            FROM hidden_columns h
            JOIN columns c ON c.id = h.column_id
            WHERE c.table_id = ?1 AND h.is_active = 1
            ORDER BY h.rowid
            "#,
        )?;

        let rows = stmt.query_map(params![table_id.to_string()], hidden_column_from_row)?;

        let mut hidden = Vec::new();
        for record in rows {
            hidden.push(record?);
        }
        Ok(hidden)
    }
}

/// Deactivates every sort order on the column, then activates (creating if
/// absent) the record for `direction`.
fn activate_sort_order_tx(
    tx: &Transaction<'_>,
    column_id: Uuid,
    direction: SortDirection,
) -> Result<SortOrder> {
    tx.execute(
        "UPDATE sort_orders SET is_active = 0 WHERE column_id = ?1",
        params![column_id.to_string()],
    )?;

    let existing: Option<String> = tx
        .query_row(
            "SELECT id FROM sort_orders WHERE column_id = ?1 AND direction = ?2",
            params![column_id.to_string(), direction.as_str()],
            |r| r.get(0),
        )
        .optional()?;

    let sort_id = match existing {
        Some(id) => {
            tx.execute(
                "UPDATE sort_orders SET is_active = 1 WHERE id = ?1",
                params![&id],
            )?;
            Uuid::parse_str(&id).map_err(|_| rusqlite::Error::InvalidQuery)?
        }
        None => {
            let id = Uuid::new_v4();
            tx.execute(
                "INSERT INTO sort_orders (id, column_id, direction, is_active) VALUES (?1, ?2, ?3, 1)",
                params![id.to_string(), column_id.to_string(), direction.as_str()],
            )?;
            id
        }
    };

    Ok(SortOrder {
        id: sort_id,
        column_id,
        direction,
        is_active: true,
    })
}

fn filter_from_row(r: &rusqlite::Row<'_>) -> rusqlite::Result<Filter> {
    let function: String = r.get(2)?;
    Ok(Filter {
        id: read_uuid(r, 0)?,
        column_id: read_uuid(r, 1)?,
        comparison_function: function
            .parse()
            .map_err(|_| rusqlite::Error::InvalidQuery)?,
        comparison_value: r.get(3)?,
        is_active: r.get(4)?,
    })
}

fn sort_order_from_row(r: &rusqlite::Row<'_>) -> rusqlite::Result<SortOrder> {
    let direction: String = r.get(2)?;
    Ok(SortOrder {
        id: read_uuid(r, 0)?,
        column_id: read_uuid(r, 1)?,
        direction: direction
            .parse()
            .map_err(|_| rusqlite::Error::InvalidQuery)?,
        is_active: r.get(3)?,
    })
}

fn hidden_column_from_row(r: &rusqlite::Row<'_>) -> rusqlite::Result<HiddenColumn> {
    Ok(HiddenColumn {
        id: read_uuid(r, 0)?,
        column_id: read_uuid(r, 1)?,
        is_active: r.get(2)?,
    })
}

fn fetch_filter(conn: &Connection, id: Uuid) -> Result<Filter> {
    let row = conn
        .query_row(
            r#"
            SELECT id, column_id, comparison_function, comparison_value, is_active
            FROM filters
            WHERE id = ?1
            "#,
            params![id.to_string()],
            filter_from_row,
        )
        .optional()?;

    row.ok_or(StorageError::FilterNotFound(id))
}

fn fetch_sort_order(conn: &Connection, id: Uuid) -> Result<SortOrder> {
    let row = conn
        .query_row(
            "SELECT id, column_id, direction, is_active FROM sort_orders WHERE id = ?1",
            params![id.to_string()],
            sort_order_from_row,
        )
        .optional()?;

    row.ok_or(StorageError::SortOrderNotFound(id))
}

fn fetch_hidden_column(conn: &Connection, id: Uuid) -> Result<HiddenColumn> {
    let row = conn
        .query_row(
            "SELECT id, column_id, is_active FROM hidden_columns WHERE id = ?1",
            params![id.to_string()],
            hidden_column_from_row,
        )
        .optional()?;

    row.ok_or(StorageError::HiddenColumnNotFound(id))
}

/// Active filters for a table in creation order.
pub(crate) fn active_filters(conn: &Connection, table_id: Uuid) -> Result<Vec<Filter>> {
    let mut stmt = conn.prepare(
        r#"
        SELECT f.id, f.column_id, f.comparison_function, f.comparison_value, f.is_active
        FROM filters f
        JOIN columns c ON c.id = f.column_id
        WHERE c.table_id = ?1 AND f.is_active = 1
        ORDER BY f.rowid
        "#,
    )?;

    let rows = stmt.query_map(params![table_id.to_string()], filter_from_row)?;

    let mut filters = Vec::new();
    for filter in rows {
        filters.push(filter?);
    }
    Ok(filters)
}

/// Active sort keys for a table in creation order (their precedence order).
pub(crate) fn active_sort_orders(conn: &Connection, table_id: Uuid) -> Result<Vec<SortOrder>> {
    let mut stmt = conn.prepare(
        r#"
        SELECT s.id, s.column_id, s.direction, s.is_active
        FROM sort_orders s
        JOIN columns c ON c.id = s.column_id
        WHERE c.table_id = ?1 AND s.is_active = 1
        ORDER BY s.rowid
        "#,
    )?;

    let rows = stmt.query_map(params![table_id.to_string()], sort_order_from_row)?;

    let mut sorts = Vec::new();
    for sort in rows {
        sorts.push(sort?);
    }
    Ok(sorts)
}
