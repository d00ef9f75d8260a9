use rusqlite::Connection;

pub(crate) fn init(conn: &Connection) -> rusqlite::Result<()> {
    // Ensure foreign keys are enforced (disabled by default in SQLite).
    conn.pragma_update(None, "foreign_keys", "ON")?;

    conn.execute_batch(
        r#"
        -- Core tables
        CREATE TABLE IF NOT EXISTS bases (
          id TEXT PRIMARY KEY,
          name TEXT NOT NULL,
          owner TEXT NOT NULL,
          created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
        );

        CREATE TABLE IF NOT EXISTS tables (
          id TEXT PRIMARY KEY,
          base_id TEXT NOT NULL REFERENCES bases(id) ON DELETE CASCADE,
          name TEXT NOT NULL,
          position INTEGER NOT NULL,
          active_view_id TEXT REFERENCES views(id) ON DELETE SET NULL,
          created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
        );

        CREATE TABLE IF NOT EXISTS columns (
          id TEXT PRIMARY KEY,
          table_id TEXT NOT NULL REFERENCES tables(id) ON DELETE CASCADE,
          name TEXT NOT NULL,
          type TEXT NOT NULL CHECK (type IN ('TEXT','NUMBER')),
          position INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS rows (
          id TEXT PRIMARY KEY,
          table_id TEXT NOT NULL REFERENCES tables(id) ON DELETE CASCADE,
          position INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS cells (
          id TEXT PRIMARY KEY,
          row_id TEXT NOT NULL REFERENCES rows(id) ON DELETE CASCADE,
          column_id TEXT NOT NULL REFERENCES columns(id) ON DELETE CASCADE,
          value TEXT NOT NULL DEFAULT '',
          UNIQUE (row_id, column_id)
        );

        -- Per-column query configuration. Records are toggled, not deleted,
        -- so view snapshots can re-activate them.
        CREATE TABLE IF NOT EXISTS filters (
          id TEXT PRIMARY KEY,
          column_id TEXT NOT NULL REFERENCES columns(id) ON DELETE CASCADE,
          comparison_function TEXT NOT NULL CHECK (comparison_function IN (
            'EQUALS','NOT_EQUALS','GREATER_THAN','LESS_THAN',
            'GREATER_THAN_OR_EQUAL','LESS_THAN_OR_EQUAL',
            'CONTAINS','NOT_CONTAINS','IS_EMPTY','IS_NOT_EMPTY')),
          comparison_value TEXT,
          is_active INTEGER NOT NULL DEFAULT 1,
          UNIQUE (column_id, comparison_function, comparison_value)
        );

        CREATE TABLE IF NOT EXISTS sort_orders (
          id TEXT PRIMARY KEY,
          column_id TEXT NOT NULL REFERENCES columns(id) ON DELETE CASCADE,
          direction TEXT NOT NULL CHECK (direction IN ('ASC','DESC')),
          is_active INTEGER NOT NULL DEFAULT 1,
          UNIQUE (column_id, direction)
        );

        CREATE TABLE IF NOT EXISTS hidden_columns (
          id TEXT PRIMARY KEY,
          column_id TEXT NOT NULL UNIQUE REFERENCES columns(id) ON DELETE CASCADE,
          is_active INTEGER NOT NULL DEFAULT 1
        );

        -- Named snapshots of the configuration state. Membership rows point
        -- at the configuration records a view re-activates on switch.
        CREATE TABLE IF NOT EXISTS views (
          id TEXT PRIMARY KEY,
          table_id TEXT NOT NULL REFERENCES tables(id) ON DELETE CASCADE,
          name TEXT NOT NULL,
          is_default INTEGER NOT NULL DEFAULT 0,
          created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
        );

        CREATE TABLE IF NOT EXISTS view_filters (
          view_id TEXT NOT NULL REFERENCES views(id) ON DELETE CASCADE,
          filter_id TEXT NOT NULL REFERENCES filters(id) ON DELETE CASCADE,
          PRIMARY KEY (view_id, filter_id)
        );

        CREATE TABLE IF NOT EXISTS view_sorts (
          view_id TEXT NOT NULL REFERENCES views(id) ON DELETE CASCADE,
          sort_order_id TEXT NOT NULL REFERENCES sort_orders(id) ON DELETE CASCADE,
          PRIMARY KEY (view_id, sort_order_id)
        );

        CREATE TABLE IF NOT EXISTS view_hidden_columns (
          view_id TEXT NOT NULL REFERENCES views(id) ON DELETE CASCADE,
          hidden_column_id TEXT NOT NULL REFERENCES hidden_columns(id) ON DELETE CASCADE,
          PRIMARY KEY (view_id, hidden_column_id)
        );

        CREATE INDEX IF NOT EXISTS idx_tables_base ON tables(base_id, position);
        CREATE INDEX IF NOT EXISTS idx_columns_table ON columns(table_id, position);
        CREATE INDEX IF NOT EXISTS idx_rows_table ON rows(table_id, position);
        CREATE INDEX IF NOT EXISTS idx_cells_column ON cells(column_id);
        CREATE INDEX IF NOT EXISTS idx_filters_column ON filters(column_id);
        CREATE INDEX IF NOT EXISTS idx_sort_orders_column ON sort_orders(column_id);
        CREATE INDEX IF NOT EXISTS idx_views_table ON views(table_id);
        "#,
    )?;

    // Best-effort migration for databases created before views existed.
    // SQLite only supports ADD COLUMN migrations, so we opportunistically add
    // the missing column when opening an existing database.
    ensure_table_columns(conn)?;

    Ok(())
}

fn ensure_table_columns(conn: &Connection) -> rusqlite::Result<()> {
    let mut stmt = conn.prepare("PRAGMA table_info(tables)")?;
    let rows = stmt.query_map([], |row| row.get::<_, String>(1))?;
    let mut existing = std::collections::HashSet::new();
    for name in rows {
        existing.insert(name?);
    }

    if !existing.contains("active_view_id") {
        conn.execute(
            "ALTER TABLE tables ADD COLUMN active_view_id TEXT REFERENCES views(id) ON DELETE SET NULL",
            [],
        )?;
    }

    Ok(())
}
