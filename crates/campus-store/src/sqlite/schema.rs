//! Database schema definitions

use rusqlite::Connection;
use tracing::info;

use crate::error::{StoreError, StoreResult};

/// Current schema version for migrations
pub const SCHEMA_VERSION: i32 = 1;

/// Initialize the database schema
pub fn init_schema(conn: &Connection) -> StoreResult<()> {
    let current_version = get_schema_version(conn)?;

    if current_version == 0 {
        info!("Creating new campus schema v{}", SCHEMA_VERSION);
        conn.execute_batch(CAMPUS_SCHEMA)
            .map_err(|e| StoreError::Storage(format!("Failed to create campus tables: {}", e)))?;
        set_schema_version(conn, SCHEMA_VERSION)?;
    } else if current_version > SCHEMA_VERSION {
        return Err(StoreError::Storage(format!(
            "database schema v{} is newer than supported v{}",
            current_version, SCHEMA_VERSION
        )));
    } else {
        info!("Campus schema is up to date (v{})", current_version);
    }

    Ok(())
}

/// Get current schema version (0 if not initialized)
fn get_schema_version(conn: &Connection) -> StoreResult<i32> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL)",
        [],
    )
    .map_err(|e| StoreError::Storage(format!("Failed to create schema_version table: {}", e)))?;

    let version: Option<i32> = conn
        .query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))
        .map_err(|e| StoreError::Storage(format!("Failed to read schema_version: {}", e)))?;

    Ok(version.unwrap_or(0))
}

fn set_schema_version(conn: &Connection, version: i32) -> StoreResult<()> {
    conn.execute("DELETE FROM schema_version", [])
        .map_err(|e| StoreError::Storage(format!("Failed to clear schema_version: {}", e)))?;
    conn.execute("INSERT INTO schema_version (version) VALUES (?1)", [version])
        .map_err(|e| StoreError::Storage(format!("Failed to set schema_version: {}", e)))?;
    Ok(())
}

/// Schools, units with their materialized path, and memberships.
///
/// `path` holds the dotted simple-hex id chain; its unique index doubles as
/// the ordered index behind descendant range scans. Unit codes are unique
/// per school when present.
const CAMPUS_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS schools (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    code TEXT NOT NULL,
    address TEXT NOT NULL DEFAULT '',
    contact_email TEXT,
    contact_phone TEXT NOT NULL DEFAULT '',
    metadata TEXT NOT NULL DEFAULT '{}',
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE UNIQUE INDEX IF NOT EXISTS idx_schools_code ON schools(code);

CREATE TABLE IF NOT EXISTS academic_units (
    id TEXT PRIMARY KEY,
    parent_unit_id TEXT REFERENCES academic_units(id),
    school_id TEXT NOT NULL REFERENCES schools(id),
    unit_type TEXT NOT NULL,
    display_name TEXT NOT NULL,
    code TEXT NOT NULL DEFAULT '',
    description TEXT,
    metadata TEXT NOT NULL DEFAULT '{}',
    path TEXT NOT NULL,
    depth INTEGER NOT NULL CHECK (depth >= 1),
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    deleted_at TEXT
);

CREATE UNIQUE INDEX IF NOT EXISTS idx_units_path ON academic_units(path);
CREATE INDEX IF NOT EXISTS idx_units_school_depth ON academic_units(school_id, depth);
CREATE INDEX IF NOT EXISTS idx_units_parent ON academic_units(parent_unit_id);
CREATE UNIQUE INDEX IF NOT EXISTS idx_units_school_code
    ON academic_units(school_id, code) WHERE code <> '';

CREATE TABLE IF NOT EXISTS unit_memberships (
    id TEXT PRIMARY KEY,
    unit_id TEXT NOT NULL REFERENCES academic_units(id),
    user_id TEXT NOT NULL,
    role TEXT NOT NULL,
    valid_from TEXT NOT NULL,
    valid_until TEXT,
    metadata TEXT NOT NULL DEFAULT '{}',
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_memberships_unit ON unit_memberships(unit_id, valid_from);
CREATE INDEX IF NOT EXISTS idx_memberships_user ON unit_memberships(user_id, valid_from);
"#;
