//! School repository over SQLite.

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::debug;

use campus_org::{DomainError, School, SchoolId};

use super::rows::{format_ts, SchoolRow, SCHOOL_COLUMNS};
use super::{exists, SqliteStore};
use crate::error::{StoreError, StoreResult};
use crate::repository::SchoolRepository;

fn ensure_code_free(conn: &Connection, school: &School) -> StoreResult<()> {
    let taken = exists(
        conn,
        "SELECT 1 FROM schools WHERE code = ?1 AND id <> ?2",
        params![school.code(), school.id().to_string()],
    )?;
    if taken {
        return Err(StoreError::conflict(format!(
            "school code '{}' is already in use",
            school.code()
        )));
    }
    Ok(())
}

fn find_one(conn: &Connection, column: &str, value: &str) -> StoreResult<Option<School>> {
    let sql = format!("SELECT {} FROM schools WHERE {} = ?1", SCHOOL_COLUMNS, column);
    let row = conn.query_row(&sql, [value], SchoolRow::from_row).optional()?;
    row.map(SchoolRow::into_school).transpose()
}

#[async_trait]
impl SchoolRepository for SqliteStore {
    async fn create_school(&self, school: &School) -> StoreResult<()> {
        self.with_conn(|conn| {
            let id = school.id().to_string();
            if exists(conn, "SELECT 1 FROM schools WHERE id = ?1", [&id])? {
                return Err(StoreError::conflict(format!("school {} already exists", id)));
            }
            ensure_code_free(conn, school)?;

            let record = school.to_record();
            conn.execute(
                "INSERT INTO schools (id, name, code, address, contact_email, contact_phone, metadata, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    id,
                    record.name,
                    record.code,
                    record.address,
                    record.contact_email,
                    record.contact_phone,
                    record.metadata.to_json(),
                    format_ts(record.created_at),
                    format_ts(record.updated_at),
                ],
            )?;
            debug!(school_id = %id, code = %record.code, "School created");
            Ok(())
        })
    }

    async fn find_school(&self, id: SchoolId) -> StoreResult<School> {
        self.with_conn(|conn| {
            find_one(conn, "id", &id.to_string())?.ok_or_else(|| StoreError::not_found("school", id))
        })
    }

    async fn find_school_by_code(&self, code: &str) -> StoreResult<School> {
        self.with_conn(|conn| {
            find_one(conn, "code", code)?.ok_or_else(|| StoreError::not_found("school", code))
        })
    }

    async fn list_schools(&self) -> StoreResult<Vec<School>> {
        self.with_conn(|conn| {
            let sql = format!("SELECT {} FROM schools ORDER BY code", SCHOOL_COLUMNS);
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([], SchoolRow::from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            rows.into_iter().map(SchoolRow::into_school).collect()
        })
    }

    async fn update_school(&self, school: &School) -> StoreResult<()> {
        self.with_conn(|conn| {
            ensure_code_free(conn, school)?;
            let record = school.to_record();
            let changed = conn.execute(
                "UPDATE schools SET name = ?1, code = ?2, address = ?3, contact_email = ?4,
                        contact_phone = ?5, metadata = ?6, updated_at = ?7
                 WHERE id = ?8",
                params![
                    record.name,
                    record.code,
                    record.address,
                    record.contact_email,
                    record.contact_phone,
                    record.metadata.to_json(),
                    format_ts(record.updated_at),
                    record.id.to_string(),
                ],
            )?;
            if changed == 0 {
                return Err(StoreError::not_found("school", record.id));
            }
            debug!(school_id = %record.id, "School updated");
            Ok(())
        })
    }

    async fn delete_school(&self, id: SchoolId) -> StoreResult<()> {
        self.with_conn(|conn| {
            let key = id.to_string();
            if !exists(conn, "SELECT 1 FROM schools WHERE id = ?1", [&key])? {
                return Err(StoreError::not_found("school", id));
            }
            let owned: i64 = conn.query_row(
                "SELECT COUNT(*) FROM academic_units WHERE school_id = ?1",
                [&key],
                |row| row.get(0),
            )?;
            if owned > 0 {
                return Err(DomainError::business(format!("school {} still owns {} units", id, owned)).into());
            }
            conn.execute("DELETE FROM schools WHERE id = ?1", [&key])?;
            debug!(school_id = %id, "School deleted");
            Ok(())
        })
    }
}
