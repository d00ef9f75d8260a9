use crate::schema;
use crate::views::DEFAULT_VIEW_NAME;
use gridbase_model::{validate_name, Base, ComparisonFunction, NameError, Table};
use rusqlite::{params, Connection, OpenFlags, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid name: {0}")]
    Name(#[from] NameError),
    #[error("base not found: {0}")]
    BaseNotFound(Uuid),
    #[error("table not found: {0}")]
    TableNotFound(Uuid),
    #[error("column not found: {0}")]
    ColumnNotFound(Uuid),
    #[error("row not found: {0}")]
    RowNotFound(Uuid),
    #[error("cell not found: {0}")]
    CellNotFound(Uuid),
    #[error("filter not found: {0}")]
    FilterNotFound(Uuid),
    #[error("sort order not found: {0}")]
    SortOrderNotFound(Uuid),
    #[error("hidden column record not found: {0}")]
    HiddenColumnNotFound(Uuid),
    #[error("view not found: {0}")]
    ViewNotFound(Uuid),
    #[error("column {column} does not belong to table {table}")]
    ForeignColumn { column: Uuid, table: Uuid },
    #[error("column {column:?} only accepts numeric values, got {value:?}")]
    NonNumericValue { column: String, value: String },
    #[error("comparison function {0} requires a comparison value")]
    MissingComparisonValue(ComparisonFunction),
    #[error("cannot convert column {column:?} to NUMBER: it holds non-numeric values")]
    TypeChangeBlocked { column: String },
    #[error("the default view cannot be renamed, overwritten, or deleted")]
    DefaultViewImmutable,
    #[error("cannot delete the active view of a table with no other views")]
    LastView,
    #[error("bulk insert of {0} rows exceeds the {max} row limit", max = crate::rows::MAX_BULK_ROWS)]
    BulkLimitExceeded(u64),
    #[error("row query failed")]
    QueryExecution,
}

pub type Result<T> = std::result::Result<T, StorageError>;

#[derive(Debug, Clone)]
pub struct Storage {
    pub(crate) conn: Arc<Mutex<Connection>>,
}

impl Storage {
    pub fn open_path(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(Duration::from_secs(5))?;
        schema::init(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.busy_timeout(Duration::from_secs(5))?;
        schema::init(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn open_uri(uri: &str) -> Result<Self> {
        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_CREATE
            | OpenFlags::SQLITE_OPEN_URI;
        let conn = Connection::open_with_flags(uri, flags)?;
        conn.busy_timeout(Duration::from_secs(5))?;
        schema::init(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn create_base(&self, name: &str, owner: &str) -> Result<Base> {
        let name = validate_name(name)?;
        let base = Base {
            id: Uuid::new_v4(),
            name: name.to_string(),
            owner: owner.to_string(),
        };

        let conn = self.conn.lock().expect("storage mutex poisoned");
        conn.execute(
            "INSERT INTO bases (id, name, owner) VALUES (?1, ?2, ?3)",
            params![base.id.to_string(), &base.name, &base.owner],
        )?;

        Ok(base)
    }

    pub fn get_base(&self, id: Uuid) -> Result<Base> {
        let conn = self.conn.lock().expect("storage mutex poisoned");
        let row = conn
            .query_row(
                "SELECT id, name, owner FROM bases WHERE id = ?1",
                params![id.to_string()],
                base_from_row,
            )
            .optional()?;

        row.ok_or(StorageError::BaseNotFound(id))
    }

    pub fn list_bases(&self, owner: &str) -> Result<Vec<Base>> {
        let conn = self.conn.lock().expect("storage mutex poisoned");
        let mut stmt = conn.prepare(
            "SELECT id, name, owner FROM bases WHERE owner = ?1 ORDER BY created_at, id",
        )?;

        let rows = stmt.query_map(params![owner], base_from_row)?;

        let mut bases = Vec::new();
        for base in rows {
            bases.push(base?);
        }
        Ok(bases)
    }

    pub fn rename_base(&self, id: Uuid, name: &str) -> Result<()> {
        let name = validate_name(name)?;
        let conn = self.conn.lock().expect("storage mutex poisoned");
        let updated = conn.execute(
            "UPDATE bases SET name = ?1 WHERE id = ?2",
            params![name, id.to_string()],
        )?;
        if updated == 0 {
            return Err(StorageError::BaseNotFound(id));
        }
        Ok(())
    }

    pub fn delete_base(&self, id: Uuid) -> Result<()> {
        let conn = self.conn.lock().expect("storage mutex poisoned");
        let deleted = conn.execute("DELETE FROM bases WHERE id = ?1", params![id.to_string()])?;
        if deleted == 0 {
            return Err(StorageError::BaseNotFound(id));
        }
        Ok(())
    }

    /// Creates a table at the end of the base, together with its default
    /// view. The default view snapshots the pristine (empty) configuration
    /// and starts out active.
    pub fn create_table(&self, base_id: Uuid, name: &str) -> Result<Table> {
        let name = validate_name(name)?;
        let mut conn = self.conn.lock().expect("storage mutex poisoned");
        let tx = conn.transaction()?;

        ensure_base(&tx, base_id)?;
        let position: i64 = tx.query_row(
            "SELECT COALESCE(MAX(position) + 1, 0) FROM tables WHERE base_id = ?1",
            params![base_id.to_string()],
            |r| r.get(0),
        )?;

        let table_id = Uuid::new_v4();
        tx.execute(
            "INSERT INTO tables (id, base_id, name, position) VALUES (?1, ?2, ?3, ?4)",
            params![table_id.to_string(), base_id.to_string(), name, position],
        )?;

        let view_id = Uuid::new_v4();
        tx.execute(
            "INSERT INTO views (id, table_id, name, is_default) VALUES (?1, ?2, ?3, 1)",
            params![view_id.to_string(), table_id.to_string(), DEFAULT_VIEW_NAME],
        )?;
        tx.execute(
            "UPDATE tables SET active_view_id = ?1 WHERE id = ?2",
            params![view_id.to_string(), table_id.to_string()],
        )?;

        tx.commit()?;
        Ok(Table {
            id: table_id,
            base_id,
            name: name.to_string(),
            position,
            active_view_id: Some(view_id),
        })
    }

    pub fn get_table(&self, id: Uuid) -> Result<Table> {
        let conn = self.conn.lock().expect("storage mutex poisoned");
        fetch_table(&conn, id)
    }

    pub fn list_tables(&self, base_id: Uuid) -> Result<Vec<Table>> {
        let conn = self.conn.lock().expect("storage mutex poisoned");
        ensure_base(&conn, base_id)?;
        let mut stmt = conn.prepare(
            r#"
            SELECT id, base_id, name, position, active_view_id
            FROM tables
            WHERE base_id = ?1
            ORDER BY position
            "#,
        )?;

        let rows = stmt.query_map(params![base_id.to_string()], table_from_row)?;

        let mut tables = Vec::new();
        for table in rows {
            tables.push(table?);
        }
        Ok(tables)
    }

    pub fn rename_table(&self, id: Uuid, name: &str) -> Result<()> {
        let name = validate_name(name)?;
        let conn = self.conn.lock().expect("storage mutex poisoned");
        let updated = conn.execute(
            "UPDATE tables SET name = ?1 WHERE id = ?2",
            params![name, id.to_string()],
        )?;
        if updated == 0 {
            return Err(StorageError::TableNotFound(id));
        }
        Ok(())
    }

    /// Deletes a table and everything it owns, then closes the position gap
    /// among its siblings.
    pub fn delete_table(&self, id: Uuid) -> Result<()> {
        let mut conn = self.conn.lock().expect("storage mutex poisoned");
        let tx = conn.transaction()?;

        let target = tx
            .query_row(
                "SELECT base_id, position FROM tables WHERE id = ?1",
                params![id.to_string()],
                |r| Ok((r.get::<_, String>(0)?, r.get::<_, i64>(1)?)),
            )
            .optional()?;
        let (base_id, position) = target.ok_or(StorageError::TableNotFound(id))?;

        tx.execute("DELETE FROM tables WHERE id = ?1", params![id.to_string()])?;
        tx.execute(
            "UPDATE tables SET position = position - 1 WHERE base_id = ?1 AND position > ?2",
            params![base_id, position],
        )?;

        tx.commit()?;
        Ok(())
    }
}

pub(crate) fn read_uuid(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<Uuid> {
    let raw: String = row.get(idx)?;
    Uuid::parse_str(&raw).map_err(|_| rusqlite::Error::InvalidQuery)
}

fn base_from_row(r: &rusqlite::Row<'_>) -> rusqlite::Result<Base> {
    Ok(Base {
        id: read_uuid(r, 0)?,
        name: r.get(1)?,
        owner: r.get(2)?,
    })
}

pub(crate) fn table_from_row(r: &rusqlite::Row<'_>) -> rusqlite::Result<Table> {
    let active_view_id: Option<String> = r.get(4)?;
    let active_view_id = match active_view_id {
        Some(raw) => Some(Uuid::parse_str(&raw).map_err(|_| rusqlite::Error::InvalidQuery)?),
        None => None,
    };
    Ok(Table {
        id: read_uuid(r, 0)?,
        base_id: read_uuid(r, 1)?,
        name: r.get(2)?,
        position: r.get(3)?,
        active_view_id,
    })
}

pub(crate) fn fetch_table(conn: &Connection, id: Uuid) -> Result<Table> {
    let row = conn
        .query_row(
            r#"
            SELECT id, base_id, name, position, active_view_id
            FROM tables
            WHERE id = ?1
            "#,
            params![id.to_string()],
            table_from_row,
        )
        .optional()?;

    row.ok_or(StorageError::TableNotFound(id))
}

pub(crate) fn ensure_base(conn: &Connection, id: Uuid) -> Result<()> {
    conn.query_row(
        "SELECT 1 FROM bases WHERE id = ?1",
        params![id.to_string()],
        |_| Ok(()),
    )
    .optional()?
    .ok_or(StorageError::BaseNotFound(id))
}

pub(crate) fn ensure_table(conn: &Connection, id: Uuid) -> Result<()> {
    conn.query_row(
        "SELECT 1 FROM tables WHERE id = ?1",
        params![id.to_string()],
        |_| Ok(()),
    )
    .optional()?
    .ok_or(StorageError::TableNotFound(id))
}
