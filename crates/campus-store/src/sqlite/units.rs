//! Academic unit repository over SQLite.

use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, Connection, TransactionBehavior};
use tracing::{debug, info, instrument};

use campus_org::{AcademicUnit, DomainError, SchoolId, UnitId};

use super::rows::format_ts;
use super::{exists, find_placed, query_units, SqliteStore};
use crate::error::{StoreError, StoreResult};
use crate::path::UnitPath;
use crate::repository::AcademicUnitRepository;
use crate::rules;

fn placed_or_not_found(
    conn: &Connection,
    entity: &'static str,
    id: UnitId,
) -> StoreResult<(AcademicUnit, UnitPath)> {
    find_placed(conn, &id.to_string())?.ok_or_else(|| StoreError::not_found(entity, id))
}

fn ensure_code_free(conn: &Connection, unit: &AcademicUnit) -> StoreResult<()> {
    if unit.code().is_empty() {
        return Ok(());
    }
    let taken = exists(
        conn,
        "SELECT 1 FROM academic_units WHERE school_id = ?1 AND code = ?2 AND id <> ?3",
        params![unit.school_id().to_string(), unit.code(), unit.id().to_string()],
    )?;
    if taken {
        return Err(StoreError::conflict(format!(
            "unit code '{}' is already in use in school {}",
            unit.code(),
            unit.school_id()
        )));
    }
    Ok(())
}

/// Overwrite the non-structural columns of a stored unit.
fn write_fields(conn: &Connection, unit: &AcademicUnit) -> StoreResult<()> {
    let record = unit.to_record();
    conn.execute(
        "UPDATE academic_units
            SET display_name = ?1, code = ?2, description = ?3, metadata = ?4,
                updated_at = ?5, deleted_at = ?6
          WHERE id = ?7",
        params![
            record.display_name,
            record.code,
            record.description,
            record.metadata.to_json(),
            format_ts(record.updated_at),
            record.deleted_at.map(format_ts),
            record.id.to_string(),
        ],
    )?;
    Ok(())
}

/// Rows strictly below `path`, in path order.
fn descendants_of(conn: &Connection, path: &UnitPath, depth: Option<usize>) -> StoreResult<Vec<AcademicUnit>> {
    let (lower, upper) = (path.descendant_lower_bound(), path.descendant_upper_bound());
    match depth {
        Some(depth) => query_units(
            conn,
            "WHERE path > ?1 AND path < ?2 AND depth = ?3 ORDER BY path",
            params![lower, upper, depth as i64],
        ),
        None => query_units(
            conn,
            "WHERE path > ?1 AND path < ?2 ORDER BY path",
            params![lower, upper],
        ),
    }
}

#[async_trait]
impl AcademicUnitRepository for SqliteStore {
    async fn create_unit(&self, unit: &AcademicUnit) -> StoreResult<UnitPath> {
        self.with_conn_mut(|conn| {
            // the parent's liveness is read and relied on in the same transaction
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let id = unit.id().to_string();
            if exists(&tx, "SELECT 1 FROM academic_units WHERE id = ?1", [&id])? {
                return Err(StoreError::conflict(format!("academic unit {} already exists", id)));
            }
            let school_id = unit.school_id().to_string();
            if !exists(&tx, "SELECT 1 FROM schools WHERE id = ?1", [&school_id])? {
                return Err(StoreError::not_found("school", unit.school_id()));
            }
            let parent = match unit.parent_id() {
                Some(parent_id) => find_placed(&tx, &parent_id.to_string())?,
                None => None,
            };
            let path = rules::new_unit_path(unit, parent.as_ref().map(|(u, p)| (u, p)))?;
            ensure_code_free(&tx, unit)?;

            let record = unit.to_record();
            tx.execute(
                "INSERT INTO academic_units (id, parent_unit_id, school_id, unit_type, display_name, code,
                                             description, metadata, path, depth, created_at, updated_at, deleted_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
                params![
                    id,
                    record.parent_unit_id.map(|p| p.to_string()),
                    school_id,
                    record.unit_type.as_str(),
                    record.display_name,
                    record.code,
                    record.description,
                    record.metadata.to_json(),
                    path.to_string(),
                    path.depth() as i64,
                    format_ts(record.created_at),
                    format_ts(record.updated_at),
                    record.deleted_at.map(format_ts),
                ],
            )?;
            tx.commit()?;
            debug!(unit_id = %id, depth = path.depth(), "Academic unit created");
            Ok(path)
        })
    }

    async fn find_unit(&self, id: UnitId) -> StoreResult<AcademicUnit> {
        self.with_conn(|conn| placed_or_not_found(conn, "academic unit", id).map(|(unit, _)| unit))
    }

    async fn find_path(&self, id: UnitId) -> StoreResult<UnitPath> {
        self.with_conn(|conn| placed_or_not_found(conn, "academic unit", id).map(|(_, path)| path))
    }

    async fn find_by_path(&self, path: &UnitPath) -> StoreResult<AcademicUnit> {
        self.with_conn(|conn| {
            query_units(conn, "WHERE path = ?1", [path.to_string()])?
                .into_iter()
                .next()
                .ok_or_else(|| StoreError::not_found("academic unit path", path))
        })
    }

    async fn find_children(&self, parent_id: UnitId) -> StoreResult<Vec<AcademicUnit>> {
        self.with_conn(|conn| {
            let (_, path) = placed_or_not_found(conn, "academic unit", parent_id)?;
            descendants_of(conn, &path, Some(path.depth() + 1))
        })
    }

    async fn find_descendants(&self, unit_id: UnitId) -> StoreResult<Vec<AcademicUnit>> {
        self.with_conn(|conn| {
            let (_, path) = placed_or_not_found(conn, "academic unit", unit_id)?;
            descendants_of(conn, &path, None)
        })
    }

    async fn find_ancestors(&self, unit_id: UnitId) -> StoreResult<Vec<AcademicUnit>> {
        self.with_conn(|conn| {
            let (unit, path) = placed_or_not_found(conn, "academic unit", unit_id)?;
            // ancestors are the rows whose descendant range holds this path
            query_units(
                conn,
                "WHERE school_id = ?1 AND depth < ?2
                   AND ?3 > path || '.' AND ?3 < path || '/'
                 ORDER BY path",
                params![unit.school_id().to_string(), path.depth() as i64, path.to_string()],
            )
        })
    }

    async fn find_by_school(&self, school_id: SchoolId) -> StoreResult<Vec<AcademicUnit>> {
        self.with_conn(|conn| {
            query_units(conn, "WHERE school_id = ?1 ORDER BY path", [school_id.to_string()])
        })
    }

    async fn find_by_school_and_depth(
        &self,
        school_id: SchoolId,
        depth: usize,
    ) -> StoreResult<Vec<AcademicUnit>> {
        if depth == 0 {
            return Err(DomainError::validation("depth starts at 1 for root units").into());
        }
        self.with_conn(|conn| {
            query_units(
                conn,
                "WHERE school_id = ?1 AND depth = ?2 ORDER BY path",
                params![school_id.to_string(), depth as i64],
            )
        })
    }

    async fn update_unit(&self, unit: &AcademicUnit) -> StoreResult<()> {
        self.with_conn(|conn| {
            let (stored, _) = placed_or_not_found(conn, "academic unit", unit.id())?;
            rules::check_unit_update(&stored, unit)?;
            ensure_code_free(conn, unit)?;
            write_fields(conn, unit)?;
            debug!(unit_id = %unit.id(), "Academic unit updated");
            Ok(())
        })
    }

    async fn soft_delete_unit(&self, id: UnitId) -> StoreResult<AcademicUnit> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let (mut unit, _) = placed_or_not_found(&tx, "academic unit", id)?;
            let live_children: i64 = tx.query_row(
                "SELECT COUNT(*) FROM academic_units WHERE parent_unit_id = ?1 AND deleted_at IS NULL",
                [id.to_string()],
                |row| row.get(0),
            )?;
            rules::check_soft_delete(&unit, live_children as usize)?;
            unit.soft_delete()?;
            write_fields(&tx, &unit)?;
            tx.commit()?;
            debug!(unit_id = %id, "Academic unit soft deleted");
            Ok(unit)
        })
    }

    async fn restore_unit(&self, id: UnitId) -> StoreResult<AcademicUnit> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let (mut unit, _) = placed_or_not_found(&tx, "academic unit", id)?;
            let parent = match unit.parent_id() {
                Some(parent_id) => Some(placed_or_not_found(&tx, "parent unit", parent_id)?.0),
                None => None,
            };
            rules::check_restore(&unit, parent.as_ref())?;
            unit.restore()?;
            write_fields(&tx, &unit)?;
            tx.commit()?;
            debug!(unit_id = %id, "Academic unit restored");
            Ok(unit)
        })
    }

    #[instrument(skip(self), fields(backend = "sqlite"))]
    async fn move_subtree(&self, unit_id: UnitId, new_parent: Option<UnitId>) -> StoreResult<UnitPath> {
        self.with_conn_mut(|conn| {
            // IMMEDIATE takes the write lock up front so the plan cannot go stale
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

            let (node, old_path) = placed_or_not_found(&tx, "academic unit", unit_id)?;
            let target = match new_parent {
                Some(parent_id) => Some(placed_or_not_found(&tx, "parent unit", parent_id)?),
                None => None,
            };
            let Some(new_path) = rules::plan_move(&node, &old_path, target.as_ref().map(|(u, p)| (u, p)))? else {
                debug!(%unit_id, "Unit already under requested parent");
                return Ok(old_path);
            };

            let old_text = old_path.to_string();
            let (lower, upper) = (old_path.descendant_lower_bound(), old_path.descendant_upper_bound());
            let expected: i64 = tx.query_row(
                "SELECT COUNT(*) FROM academic_units WHERE path = ?1 OR (path > ?2 AND path < ?3)",
                params![old_text, lower, upper],
                |row| row.get(0),
            )?;

            let depth_delta = new_path.depth() as i64 - old_path.depth() as i64;
            let rewritten = tx.execute(
                "UPDATE academic_units
                    SET path = ?1 || substr(path, ?2), depth = depth + ?3
                  WHERE path = ?4 OR (path > ?5 AND path < ?6)",
                params![
                    new_path.to_string(),
                    old_text.len() as i64 + 1,
                    depth_delta,
                    old_text,
                    lower,
                    upper,
                ],
            )?;
            if rewritten as i64 != expected {
                // dropping the transaction rolls every rewrite back
                return Err(StoreError::Storage(format!(
                    "subtree move rewrote {} of {} rows",
                    rewritten, expected
                )));
            }

            tx.execute(
                "UPDATE academic_units SET parent_unit_id = ?1, updated_at = ?2 WHERE id = ?3",
                params![
                    new_parent.map(|p| p.to_string()),
                    format_ts(Utc::now()),
                    unit_id.to_string(),
                ],
            )?;
            tx.commit()?;

            info!(
                %unit_id,
                moved = rewritten,
                from_depth = old_path.depth(),
                to_depth = new_path.depth(),
                "Subtree moved"
            );
            Ok(new_path)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::SchoolRepository;
    use campus_org::{School, UnitType};

    struct Tree {
        store: SqliteStore,
        main: AcademicUnit,
        grade: AcademicUnit,
        sections: Vec<AcademicUnit>,
        north: AcademicUnit,
    }

    async fn tree() -> Tree {
        let store = SqliteStore::open_in_memory().unwrap();
        let school = School::new("Acme", "ACM").unwrap();
        store.create_school(&school).await.unwrap();

        let add = |t: UnitType, name: &str, parent: Option<&AcademicUnit>| {
            let mut unit = AcademicUnit::new(school.id(), t, name, name).unwrap();
            if let Some(parent) = parent {
                unit.set_parent(parent.id(), parent.unit_type()).unwrap();
            }
            unit
        };
        let main = add(UnitType::School, "Main Campus", None);
        let grade = add(UnitType::Grade, "Grade 1", Some(&main));
        let sections = vec![
            add(UnitType::Section, "Section A", Some(&grade)),
            add(UnitType::Section, "Section B", Some(&grade)),
        ];
        let north = add(UnitType::School, "North Campus", None);
        for unit in [&main, &grade, &sections[0], &sections[1], &north] {
            store.create_unit(unit).await.unwrap();
        }
        Tree {
            store,
            main,
            grade,
            sections,
            north,
        }
    }

    async fn snapshot(t: &Tree) -> Vec<(UnitId, Option<UnitId>, UnitPath)> {
        let mut rows = Vec::new();
        for unit in [&t.main, &t.grade, &t.sections[0], &t.sections[1], &t.north] {
            let stored = t.store.find_unit(unit.id()).await.unwrap();
            let path = t.store.find_path(unit.id()).await.unwrap();
            rows.push((stored.id(), stored.parent_id(), path));
        }
        rows
    }

    fn install_trigger(store: &SqliteStore, unit: &AcademicUnit, action: &str) {
        let sql = format!(
            "CREATE TRIGGER interrupt_rewrite BEFORE UPDATE OF path ON academic_units
             WHEN OLD.id = '{}'
             BEGIN SELECT RAISE({}); END;",
            unit.id(),
            action
        );
        store.with_conn(|conn| Ok(conn.execute_batch(&sql)?)).unwrap();
    }

    #[tokio::test]
    async fn test_failed_rewrite_rolls_back_move() {
        let t = tree().await;
        let before = snapshot(&t).await;
        install_trigger(&t.store, &t.sections[1], "ABORT, 'rewrite interrupted'");

        assert!(t.store.move_subtree(t.grade.id(), Some(t.north.id())).await.is_err());

        assert_eq!(snapshot(&t).await, before);
        assert_eq!(t.store.find_descendants(t.main.id()).await.unwrap().len(), 3);
        assert!(t.store.find_descendants(t.north.id()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_short_rewrite_rolls_back_move() {
        let t = tree().await;
        let before = snapshot(&t).await;
        // the row is skipped without an error, so only the count check notices
        install_trigger(&t.store, &t.sections[0], "IGNORE");

        let err = t.store.move_subtree(t.grade.id(), Some(t.north.id())).await.unwrap_err();
        match &err {
            StoreError::Storage(message) => assert!(message.contains("2 of 3"), "{message}"),
            other => panic!("expected a storage error, got {other:?}"),
        }
        assert!(err.is_server_error());
        assert_eq!(snapshot(&t).await, before);
    }

    #[tokio::test]
    async fn test_soft_delete_checks_live_children() {
        let t = tree().await;
        let err = t.store.soft_delete_unit(t.grade.id()).await.unwrap_err();
        assert!(err.to_string().contains("2 active children"));

        for section in &t.sections {
            t.store.soft_delete_unit(section.id()).await.unwrap();
        }
        let grade = t.store.soft_delete_unit(t.grade.id()).await.unwrap();
        assert!(grade.is_deleted());
        assert_eq!(t.store.find_unit(t.grade.id()).await.unwrap().deleted_at(), grade.deleted_at());

        let err = t.store.restore_unit(t.sections[0].id()).await.unwrap_err();
        assert!(err.to_string().contains("is deleted"));
        t.store.restore_unit(t.grade.id()).await.unwrap();
        assert!(!t.store.restore_unit(t.sections[0].id()).await.unwrap().is_deleted());
    }
}
