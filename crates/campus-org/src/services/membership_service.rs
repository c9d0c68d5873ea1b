//! Temporal and permission rules for unit memberships.

use campus_rbac::Permission;
use chrono::{DateTime, Utc};

use crate::error::{DomainError, DomainResult};
use crate::membership::UnitMembership;
use crate::roles::MembershipRole;

/// Stateless rule engine for memberships.
#[derive(Debug, Clone, Copy, Default)]
pub struct MembershipDomainService;

impl MembershipDomainService {
    pub const fn new() -> Self {
        Self
    }

    /// Active on the closed window `[valid_from, valid_until]`, or on
    /// `[valid_from, ∞)` when no end is set.
    pub fn is_active_at(&self, membership: &UnitMembership, at: DateTime<Utc>) -> bool {
        if at < membership.valid_from() {
            return false;
        }
        match membership.valid_until() {
            Some(until) => at <= until,
            None => true,
        }
    }

    /// Sets the end of the validity window. It must fall strictly after
    /// `valid_from`.
    pub fn set_valid_until(&self, membership: &mut UnitMembership, until: DateTime<Utc>) -> DomainResult<()> {
        if until == membership.valid_from() {
            return Err(DomainError::validation(
                "valid until cannot be equal to valid from",
            ));
        }
        if until < membership.valid_from() {
            return Err(DomainError::validation("valid until must be after valid from"));
        }
        membership.assign_valid_until(Some(until));
        Ok(())
    }

    /// Removes the end of the validity window.
    pub fn extend_indefinitely(&self, membership: &mut UnitMembership) {
        membership.assign_valid_until(None);
    }

    /// Ends the membership now.
    ///
    /// Fails if the membership already ended in the past.
    pub fn expire(&self, membership: &mut UnitMembership) -> DomainResult<()> {
        let now = Utc::now();
        if let Some(until) = membership.valid_until() {
            if now > until {
                return Err(DomainError::business(format!(
                    "membership {} already expired",
                    membership.id()
                )));
            }
        }
        self.set_valid_until(membership, now)
    }

    /// Replaces the role. The new role must differ from the current one.
    pub fn change_role(&self, membership: &mut UnitMembership, role: MembershipRole) -> DomainResult<()> {
        if membership.role() == role {
            return Err(DomainError::business(format!(
                "membership already has role {}",
                role
            )));
        }
        membership.assign_role(role);
        Ok(())
    }

    /// Parses a role name and applies it with [`change_role`](Self::change_role).
    pub fn change_role_str(&self, membership: &mut UnitMembership, role: &str) -> DomainResult<()> {
        let role: MembershipRole = role.parse()?;
        self.change_role(membership, role)
    }

    /// Check if an active membership grants `permission` right now.
    pub fn has_permission(&self, membership: &UnitMembership, permission: Permission) -> bool {
        self.has_permission_at(membership, permission, Utc::now())
    }

    /// Check if the membership is active at `at` and its role grants `permission`.
    pub fn has_permission_at(
        &self,
        membership: &UnitMembership,
        permission: Permission,
        at: DateTime<Utc>,
    ) -> bool {
        self.is_active_at(membership, at) && membership.role().has_permission(permission)
    }
}
