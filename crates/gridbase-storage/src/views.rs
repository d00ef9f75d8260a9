//! Named views: snapshotting and restoring a table's configuration state.
//!
//! A view stores membership rows pointing at filter, sort-order, and
//! hidden-column records. Switching applies the snapshot in one
//! transaction: member records become active, all other records of the
//! table become inactive, never partially.

use crate::storage::{ensure_table, fetch_table, read_uuid, Result, Storage, StorageError};
use gridbase_model::{validate_name, Table, View, ViewConfig};
use rusqlite::{params, Connection, OptionalExtension, Transaction};
use uuid::Uuid;

/// Name of the view every table is born with.
pub(crate) const DEFAULT_VIEW_NAME: &str = "Grid view";

impl Storage {
    pub fn get_view(&self, id: Uuid) -> Result<View> {
        let conn = self.conn.lock().expect("storage mutex poisoned");
        fetch_view(&conn, id)
    }

    pub fn list_views(&self, table_id: Uuid) -> Result<Vec<View>> {
        let conn = self.conn.lock().expect("storage mutex poisoned");
        ensure_table(&conn, table_id)?;
        let mut stmt = conn.prepare(
            r#"
            SELECT id, table_id, name, is_default
            FROM views
            WHERE table_id = ?1
            ORDER BY created_at, id
            "#,
        )?;

        let rows = stmt.query_map(params![table_id.to_string()], view_from_row)?;

        let mut views = Vec::new();
        for view in rows {
            views.push(view?);
        }
        Ok(views)
    }

    /// The configuration record ids captured by a view's snapshot.
    pub fn view_config(&self, view_id: Uuid) -> Result<ViewConfig> {
        let conn = self.conn.lock().expect("storage mutex poisoned");
        fetch_view(&conn, view_id)?;

        Ok(ViewConfig {
            filter_ids: membership_ids(
                &conn,
                "SELECT filter_id FROM view_filters WHERE view_id = ?1 ORDER BY rowid",
                view_id,
            )?,
            sort_order_ids: membership_ids(
                &conn,
                "SELECT sort_order_id FROM view_sorts WHERE view_id = ?1 ORDER BY rowid",
                view_id,
            )?,
            hidden_column_ids: membership_ids(
                &conn,
                "SELECT hidden_column_id FROM view_hidden_columns WHERE view_id = ?1 ORDER BY rowid",
                view_id,
            )?,
        })
    }

    /// Creates a view capturing the table's current active configuration
    /// and switches the table to it.
    pub fn create_view(&self, table_id: Uuid, name: &str) -> Result<View> {
        let name = validate_name(name)?;
        let mut conn = self.conn.lock().expect("storage mutex poisoned");
        let tx = conn.transaction()?;

        ensure_table(&tx, table_id)?;
        let view_id = Uuid::new_v4();
        tx.execute(
            "INSERT INTO views (id, table_id, name, is_default) VALUES (?1, ?2, ?3, 0)",
            params![view_id.to_string(), table_id.to_string(), name],
        )?;
        snapshot_view_tx(&tx, table_id, view_id)?;
        tx.execute(
            "UPDATE tables SET active_view_id = ?1 WHERE id = ?2",
            params![view_id.to_string(), table_id.to_string()],
        )?;
        apply_view_state_tx(&tx, table_id, view_id)?;

        tx.commit()?;
        Ok(View {
            id: view_id,
            table_id,
            name: name.to_string(),
            is_default: false,
        })
    }

    /// Makes `view_id` the active view of `table_id` and applies its
    /// snapshot: exactly the member configuration records end up active and
    /// every other record of the table inactive. Returns the updated table.
    pub fn switch_view(&self, table_id: Uuid, view_id: Uuid) -> Result<Table> {
        let mut conn = self.conn.lock().expect("storage mutex poisoned");
        let tx = conn.transaction()?;

        let view = fetch_view(&tx, view_id)?;
        if view.table_id != table_id {
            return Err(StorageError::ViewNotFound(view_id));
        }

        tx.execute(
            "UPDATE tables SET active_view_id = ?1 WHERE id = ?2",
            params![view_id.to_string(), table_id.to_string()],
        )?;
        apply_view_state_tx(&tx, table_id, view_id)?;
        let table = fetch_table(&tx, table_id)?;

        tx.commit()?;
        Ok(table)
    }

    /// Overwrites the view's snapshot with the table's current active
    /// configuration. The default view is immutable.
    pub fn save_view(&self, view_id: Uuid) -> Result<()> {
        let mut conn = self.conn.lock().expect("storage mutex poisoned");
        let tx = conn.transaction()?;

        let view = fetch_view(&tx, view_id)?;
        if view.is_default {
            return Err(StorageError::DefaultViewImmutable);
        }
        snapshot_view_tx(&tx, view.table_id, view_id)?;

        tx.commit()?;
        Ok(())
    }

    pub fn rename_view(&self, view_id: Uuid, name: &str) -> Result<()> {
        let name = validate_name(name)?;
        let conn = self.conn.lock().expect("storage mutex poisoned");
        let view = fetch_view(&conn, view_id)?;
        if view.is_default {
            return Err(StorageError::DefaultViewImmutable);
        }
        conn.execute(
            "UPDATE views SET name = ?1 WHERE id = ?2",
            params![name, view_id.to_string()],
        )?;
        Ok(())
    }

    /// Deletes a view. Deleting the active view first falls back to another
    /// view of the table (the default one when present) and applies its
    /// snapshot, so the table never points at a missing view.
    pub fn delete_view(&self, view_id: Uuid) -> Result<()> {
        let mut conn = self.conn.lock().expect("storage mutex poisoned");
        let tx = conn.transaction()?;

        let view = fetch_view(&tx, view_id)?;
        if view.is_default {
            return Err(StorageError::DefaultViewImmutable);
        }
        let table = fetch_table(&tx, view.table_id)?;

        if table.active_view_id == Some(view_id) {
            let fallback: Option<String> = tx
                .query_row(
                    r#"
                    SELECT id FROM views
                    WHERE table_id = ?1 AND id <> ?2
                    ORDER BY is_default DESC, created_at, id
                    LIMIT 1
                    "#,
                    params![view.table_id.to_string(), view_id.to_string()],
                    |r| r.get(0),
                )
                .optional()?;
            let fallback = fallback.ok_or(StorageError::LastView)?;
            let fallback =
                Uuid::parse_str(&fallback).map_err(|_| rusqlite::Error::InvalidQuery)?;

            tx.execute(
                "UPDATE tables SET active_view_id = ?1 WHERE id = ?2",
                params![fallback.to_string(), view.table_id.to_string()],
            )?;
            apply_view_state_tx(&tx, view.table_id, fallback)?;
        }

        tx.execute("DELETE FROM views WHERE id = ?1", params![view_id.to_string()])?;
        tx.commit()?;
        Ok(())
    }
}

/// Replaces the view's membership rows with the table's currently active
/// configuration records.
fn snapshot_view_tx(tx: &Transaction<'_>, table_id: Uuid, view_id: Uuid) -> Result<()> {
    let view_id = view_id.to_string();
    let table_id = table_id.to_string();

    tx.execute(
        "DELETE FROM view_filters WHERE view_id = ?1",
        params![&view_id],
    )?;
    tx.execute(
        r#"
        INSERT INTO view_filters (view_id, filter_id)
        SELECT ?1, f.id
        FROM filters f
        JOIN columns c ON c.id = f.column_id
        WHERE c.table_id = ?2 AND f.is_active = 1
        "#,
        params![&view_id, &table_id],
    )?;

    tx.execute(
        "DELETE FROM view_sorts WHERE view_id = ?1",
        params![&view_id],
    )?;
    tx.execute(
        r#"
        INSERT INTO view_sorts (view_id, sort_order_id)
        SELECT ?1, s.id
        FROM sort_orders s
        JOIN columns c ON c.id = s.column_id
        WHERE c.table_id = ?2 AND s.is_active = 1
        "#,
        params![&view_id, &table_id],
    )?;

    tx.execute(
        "DELETE FROM view_hidden_columns WHERE view_id = ?1",
        params![&view_id],
    )?;
    tx.execute(
        r#"
        INSERT INTO view_hidden_columns (view_id, hidden_column_id)
        SELECT ?1, h.id
        FROM hidden_columns h
        JOIN columns c ON c.id = h.column_id
        WHERE c.table_id = ?2 AND h.is_active = 1
        "#,
        params![&view_id, &table_id],
    )?;

    Ok(())
}

/// Applies a view's snapshot to the table's configuration records: members
/// become active, every other record of the table inactive.
fn apply_view_state_tx(tx: &Transaction<'_>, table_id: Uuid, view_id: Uuid) -> Result<()> {
    let view_id = view_id.to_string();
    let table_id = table_id.to_string();

    tx.execute(
        r#"
        UPDATE filters SET is_active =
          CASE WHEN id IN (SELECT filter_id FROM view_filters WHERE view_id = ?1)
               THEN 1 ELSE 0 END
        WHERE column_id IN (SELECT id FROM columns WHERE table_id = ?2)
        "#,
        params![&view_id, &table_id],
    )?;

    tx.execute(
        r#"
        UPDATE sort_orders SET is_active =
          CASE WHEN id IN (SELECT sort_order_id FROM view_sorts WHERE view_id = ?1)
               THEN 1 ELSE 0 END
        WHERE column_id IN (SELECT id FROM columns WHERE table_id = ?2)
        "#,
        params![&view_id, &table_id],
    )?;

    tx.execute(
        r#"
        UPDATE hidden_columns SET is_active =
          CASE WHEN id IN (SELECT hidden_column_id FROM view_hidden_columns WHERE view_id = ?1)
               THEN 1 ELSE 0 END
        WHERE column_id IN (SELECT id FROM columns WHERE table_id = ?2)
        "#,
        params![&view_id, &table_id],
    )?;

    Ok(())
}

fn view_from_row(r: &rusqlite::Row<'_>) -> rusqlite::Result<View> {
    Ok(View {
        id: read_uuid(r, 0)?,
        table_id: read_uuid(r, 1)?,
        name: r.get(2)?,
        is_default: r.get(3)?,
    })
}

fn fetch_view(conn: &Connection, id: Uuid) -> Result<View> {
    let row = conn
        .query_row(
            "SELECT id, table_id, name, is_default FROM views WHERE id = ?1",
            params![id.to_string()],
            view_from_row,
        )
        .optional()?;

    row.ok_or(StorageError::ViewNotFound(id))
}

fn membership_ids(conn: &Connection, sql: &str, view_id: Uuid) -> Result<Vec<Uuid>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(params![view_id.to_string()], |r| read_uuid(r, 0))?;

    let mut ids = Vec::new();
    for id in rows {
        ids.push(id?);
    }
    Ok(ids)
}
