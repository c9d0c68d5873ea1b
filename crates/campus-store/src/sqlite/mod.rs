//! SQLite store
//!
//! Persists schools, units and memberships in a single SQLite database. The
//! materialized path lives in the `path` column of `academic_units`:
//!
//! - descendants of `p` are `path > 'p.' AND path < 'p/'`, answered from the
//!   unique path index in path order
//! - ancestors of `p` are the rows whose own descendant range contains `p`
//! - a subtree move rewrites the prefix of every affected row with one
//!   `UPDATE` inside a transaction, and checks the rewritten row count before
//!   committing
//!
//! ## Tables
//!
//! - `schools` - tenant roots, unique `code`
//! - `academic_units` - units with `path`, `depth` and soft-delete timestamp
//! - `unit_memberships` - role assignments with their validity window

mod memberships;
mod rows;
pub mod schema;
mod schools;
mod units;

use std::path::Path;
use std::sync::Mutex;

use rusqlite::{Connection, OptionalExtension, Params};
use tracing::{debug, info};

use campus_org::AcademicUnit;

use crate::error::{StoreError, StoreResult};
use crate::path::UnitPath;
use crate::repository::CampusStore;

use rows::{UnitRow, UNIT_COLUMNS};

/// Store backed by a SQLite database.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open or create the database at `path`.
    ///
    /// With `wal` set the journal switches to write-ahead logging, which lets
    /// readers in other processes proceed during writes.
    pub fn open(path: impl AsRef<Path>, wal: bool) -> StoreResult<Self> {
        let path = path.as_ref();
        info!("Opening SQLite campus store at {:?}", path);

        let conn = Connection::open(path)
            .map_err(|e| StoreError::Storage(format!("Failed to open SQLite: {}", e)))?;
        if wal {
            conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")
                .map_err(|e| StoreError::Storage(format!("Failed to set PRAGMA: {}", e)))?;
        }
        Self::init(conn)
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> StoreResult<Self> {
        debug!("Opening in-memory SQLite campus store");

        let conn = Connection::open_in_memory()
            .map_err(|e| StoreError::Storage(format!("Failed to open in-memory SQLite: {}", e)))?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> StoreResult<Self> {
        conn.execute_batch("PRAGMA foreign_keys=ON;")
            .map_err(|e| StoreError::Storage(format!("Failed to set PRAGMA: {}", e)))?;
        schema::init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Run a read against the connection.
    pub(crate) fn with_conn<F, T>(&self, f: F) -> StoreResult<T>
    where
        F: FnOnce(&Connection) -> StoreResult<T>,
    {
        let conn = self
            .conn
            .lock()
            .map_err(|e| StoreError::Storage(format!("Lock poisoned: {}", e)))?;
        f(&conn)
    }

    /// Run a write with exclusive access (for transactions).
    pub(crate) fn with_conn_mut<F, T>(&self, f: F) -> StoreResult<T>
    where
        F: FnOnce(&mut Connection) -> StoreResult<T>,
    {
        let mut conn = self
            .conn
            .lock()
            .map_err(|e| StoreError::Storage(format!("Lock poisoned: {}", e)))?;
        f(&mut conn)
    }
}

impl std::fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStore").finish_non_exhaustive()
    }
}

impl CampusStore for SqliteStore {
    fn backend_name(&self) -> &'static str {
        "sqlite"
    }
}

/// True when `sql` returns at least one row.
fn exists<P: Params>(conn: &Connection, sql: &str, params: P) -> StoreResult<bool> {
    Ok(conn.prepare(sql)?.exists(params)?)
}

/// Units selected by a `WHERE ...` clause (with ordering) over `academic_units`.
fn query_units<P: Params>(conn: &Connection, clause: &str, params: P) -> StoreResult<Vec<AcademicUnit>> {
    let sql = format!("SELECT {} FROM academic_units {}", UNIT_COLUMNS, clause);
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params, UnitRow::from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    rows.into_iter().map(UnitRow::into_unit).collect()
}

/// A unit and its path, `None` when the id is unknown.
fn find_placed(conn: &Connection, id: &str) -> StoreResult<Option<(AcademicUnit, UnitPath)>> {
    let sql = format!("SELECT {} FROM academic_units WHERE id = ?1", UNIT_COLUMNS);
    let row = conn.query_row(&sql, [id], UnitRow::from_row).optional()?;
    row.map(UnitRow::into_placed).transpose()
}
