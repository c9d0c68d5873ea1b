//! Unit membership domain model
//!
//! A membership assigns a role to a user within one academic unit for a
//! validity window. The window is closed on both ends: a membership is
//! active at `t` when `valid_from <= t` and, if set, `t <= valid_until`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};
use crate::ids::{MembershipId, UnitId, UserId};
use crate::metadata::Metadata;
use crate::roles::MembershipRole;
use crate::services::MembershipDomainService;

/// Time-bounded role assignment of a user within a unit.
///
/// # Examples
///
/// ```
/// use campus_org::{MembershipRole, UnitId, UnitMembership, UserId};
///
/// let membership = UnitMembership::new(UnitId::new(), UserId::new(), MembershipRole::Teacher, None).unwrap();
/// assert!(membership.is_active());
/// assert!(membership.valid_until().is_none());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitMembership {
    id: MembershipId,
    unit_id: UnitId,
    user_id: UserId,
    role: MembershipRole,
    valid_from: DateTime<Utc>,
    valid_until: Option<DateTime<Utc>>,
    metadata: Metadata,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// Flat persistence representation of a [`UnitMembership`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MembershipRecord {
    pub id: MembershipId,
    pub unit_id: UnitId,
    pub user_id: UserId,
    pub role: MembershipRole,
    pub valid_from: DateTime<Utc>,
    pub valid_until: Option<DateTime<Utc>>,
    pub metadata: Metadata,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UnitMembership {
    /// Creates a new membership starting at `valid_from` (now when `None`).
    ///
    /// # Errors
    ///
    /// `Validation` if the unit or user id is zero.
    pub fn new(
        unit_id: UnitId,
        user_id: UserId,
        role: MembershipRole,
        valid_from: Option<DateTime<Utc>>,
    ) -> DomainResult<Self> {
        if unit_id.is_zero() {
            return Err(DomainError::validation("unit id is required"));
        }
        if user_id.is_zero() {
            return Err(DomainError::validation("user id is required"));
        }

        let now = Utc::now();
        Ok(Self {
            id: MembershipId::new(),
            unit_id,
            user_id,
            role,
            valid_from: valid_from.unwrap_or(now),
            valid_until: None,
            metadata: Metadata::new(),
            created_at: now,
            updated_at: now,
        })
    }

    /// Rebuilds a membership from storage.
    pub fn from_record(record: MembershipRecord) -> DomainResult<Self> {
        if record.id.is_zero() {
            return Err(DomainError::validation("membership id cannot be empty"));
        }
        if record.unit_id.is_zero() || record.user_id.is_zero() {
            return Err(DomainError::validation("unit id and user id are required"));
        }
        if let Some(until) = record.valid_until {
            if until <= record.valid_from {
                return Err(DomainError::validation(
                    "valid until must be after valid from",
                ));
            }
        }
        Ok(Self {
            id: record.id,
            unit_id: record.unit_id,
            user_id: record.user_id,
            role: record.role,
            valid_from: record.valid_from,
            valid_until: record.valid_until,
            metadata: record.metadata,
            created_at: record.created_at,
            updated_at: record.updated_at,
        })
    }

    /// Flattens the membership for storage.
    pub fn to_record(&self) -> MembershipRecord {
        MembershipRecord {
            id: self.id,
            unit_id: self.unit_id,
            user_id: self.user_id,
            role: self.role,
            valid_from: self.valid_from,
            valid_until: self.valid_until,
            metadata: self.metadata.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }

    pub fn id(&self) -> MembershipId {
        self.id
    }

    pub fn unit_id(&self) -> UnitId {
        self.unit_id
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    pub fn role(&self) -> MembershipRole {
        self.role
    }

    pub fn valid_from(&self) -> DateTime<Utc> {
        self.valid_from
    }

    pub fn valid_until(&self) -> Option<DateTime<Utc>> {
        self.valid_until
    }

    /// Snapshot of the metadata bag.
    pub fn metadata(&self) -> Metadata {
        self.metadata.clone()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Check if the membership is active right now.
    pub fn is_active(&self) -> bool {
        self.is_active_at(Utc::now())
    }

    /// See [`MembershipDomainService::is_active_at`].
    pub fn is_active_at(&self, at: DateTime<Utc>) -> bool {
        MembershipDomainService.is_active_at(self, at)
    }

    /// See [`MembershipDomainService::set_valid_until`].
    pub fn set_valid_until(&mut self, until: DateTime<Utc>) -> DomainResult<()> {
        MembershipDomainService.set_valid_until(self, until)
    }

    /// See [`MembershipDomainService::extend_indefinitely`].
    pub fn extend_indefinitely(&mut self) {
        MembershipDomainService.extend_indefinitely(self)
    }

    /// See [`MembershipDomainService::expire`].
    pub fn expire(&mut self) -> DomainResult<()> {
        MembershipDomainService.expire(self)
    }

    /// See [`MembershipDomainService::change_role`].
    pub fn change_role(&mut self, role: MembershipRole) -> DomainResult<()> {
        MembershipDomainService.change_role(self, role)
    }

    pub fn set_metadata(&mut self, key: impl Into<String>, value: serde_json::Value) -> DomainResult<()> {
        self.metadata.insert(key, value)?;
        self.touch();
        Ok(())
    }

    pub fn remove_metadata(&mut self, key: &str) -> Option<serde_json::Value> {
        let removed = self.metadata.remove(key);
        if removed.is_some() {
            self.touch();
        }
        removed
    }

    /// Replaces the whole metadata bag.
    pub fn replace_metadata(&mut self, metadata: Metadata) {
        self.metadata = metadata;
        self.touch();
    }

    pub(crate) fn assign_valid_until(&mut self, until: Option<DateTime<Utc>>) {
        self.valid_until = until;
        self.touch();
    }

    pub(crate) fn assign_role(&mut self, role: MembershipRole) {
        self.role = role;
        self.touch();
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}
