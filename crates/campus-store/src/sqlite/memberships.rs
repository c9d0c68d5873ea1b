//! Membership repository over SQLite.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Params, TransactionBehavior};
use tracing::debug;

use campus_org::{DomainError, MembershipId, UnitId, UnitMembership, UserId};

use super::rows::{format_ts, MembershipRow, MEMBERSHIP_COLUMNS};
use super::{exists, SqliteStore};
use crate::error::{StoreError, StoreResult};
use crate::repository::MembershipRepository;
use crate::rules;

fn query_memberships<P: Params>(conn: &Connection, clause: &str, params: P) -> StoreResult<Vec<UnitMembership>> {
    let sql = format!("SELECT {} FROM unit_memberships {}", MEMBERSHIP_COLUMNS, clause);
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params, MembershipRow::from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    rows.into_iter().map(MembershipRow::into_membership).collect()
}

/// Stored memberships of the same user on the same unit.
fn same_user(conn: &Connection, membership: &UnitMembership) -> StoreResult<Vec<UnitMembership>> {
    query_memberships(
        conn,
        "WHERE unit_id = ?1 AND user_id = ?2 ORDER BY valid_from, id",
        params![membership.unit_id().to_string(), membership.user_id().to_string()],
    )
}

#[async_trait]
impl MembershipRepository for SqliteStore {
    async fn create_membership(&self, membership: &UnitMembership) -> StoreResult<()> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let record = membership.to_record();
            let unit_id = record.unit_id.to_string();
            if !exists(&tx, "SELECT 1 FROM academic_units WHERE id = ?1", [&unit_id])? {
                return Err(StoreError::not_found("academic unit", record.unit_id));
            }
            let id = record.id.to_string();
            if exists(&tx, "SELECT 1 FROM unit_memberships WHERE id = ?1", [&id])? {
                return Err(StoreError::conflict(format!("membership {} already exists", id)));
            }
            rules::check_no_overlap(membership, &same_user(&tx, membership)?)?;
            tx.execute(
                "INSERT INTO unit_memberships (id, unit_id, user_id, role, valid_from, valid_until,
                                               metadata, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    id,
                    unit_id,
                    record.user_id.to_string(),
                    record.role.as_str(),
                    format_ts(record.valid_from),
                    record.valid_until.map(format_ts),
                    record.metadata.to_json(),
                    format_ts(record.created_at),
                    format_ts(record.updated_at),
                ],
            )?;
            tx.commit()?;
            debug!(membership_id = %id, unit_id = %unit_id, role = %record.role, "Membership created");
            Ok(())
        })
    }

    async fn find_membership(&self, id: MembershipId) -> StoreResult<UnitMembership> {
        self.with_conn(|conn| {
            let sql = format!("SELECT {} FROM unit_memberships WHERE id = ?1", MEMBERSHIP_COLUMNS);
            let row = conn
                .query_row(&sql, [id.to_string()], MembershipRow::from_row)
                .optional()?;
            row.map(MembershipRow::into_membership)
                .transpose()?
                .ok_or_else(|| StoreError::not_found("membership", id))
        })
    }

    async fn find_memberships_by_unit(&self, unit_id: UnitId) -> StoreResult<Vec<UnitMembership>> {
        self.with_conn(|conn| {
            query_memberships(
                conn,
                "WHERE unit_id = ?1 ORDER BY valid_from, id",
                [unit_id.to_string()],
            )
        })
    }

    async fn find_memberships_by_user(&self, user_id: UserId) -> StoreResult<Vec<UnitMembership>> {
        self.with_conn(|conn| {
            query_memberships(
                conn,
                "WHERE user_id = ?1 ORDER BY valid_from, id",
                [user_id.to_string()],
            )
        })
    }

    async fn find_active_memberships_by_unit(
        &self,
        unit_id: UnitId,
        at: DateTime<Utc>,
    ) -> StoreResult<Vec<UnitMembership>> {
        self.with_conn(|conn| {
            let at = format_ts(at);
            query_memberships(
                conn,
                "WHERE unit_id = ?1 AND valid_from <= ?2 AND (valid_until IS NULL OR valid_until >= ?2)
                 ORDER BY valid_from, id",
                params![unit_id.to_string(), at],
            )
        })
    }

    async fn update_membership(&self, membership: &UnitMembership) -> StoreResult<()> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let record = membership.to_record();
            let id = record.id.to_string();
            let owner: Option<(String, String)> = tx
                .query_row(
                    "SELECT unit_id, user_id FROM unit_memberships WHERE id = ?1",
                    [&id],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .optional()?;
            let Some((unit_id, user_id)) = owner else {
                return Err(StoreError::not_found("membership", record.id));
            };
            if unit_id != record.unit_id.to_string() || user_id != record.user_id.to_string() {
                return Err(DomainError::business("membership cannot change unit or user").into());
            }
            rules::check_no_overlap(membership, &same_user(&tx, membership)?)?;
            tx.execute(
                "UPDATE unit_memberships
                    SET role = ?1, valid_from = ?2, valid_until = ?3, metadata = ?4, updated_at = ?5
                  WHERE id = ?6",
                params![
                    record.role.as_str(),
                    format_ts(record.valid_from),
                    record.valid_until.map(format_ts),
                    record.metadata.to_json(),
                    format_ts(record.updated_at),
                    id,
                ],
            )?;
            tx.commit()?;
            Ok(())
        })
    }

    async fn delete_membership(&self, id: MembershipId) -> StoreResult<()> {
        self.with_conn(|conn| {
            let deleted = conn.execute("DELETE FROM unit_memberships WHERE id = ?1", [id.to_string()])?;
            if deleted == 0 {
                return Err(StoreError::not_found("membership", id));
            }
            Ok(())
        })
    }
}
