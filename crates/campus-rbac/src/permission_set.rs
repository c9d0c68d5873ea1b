//! # Permission Sets
//!
//! Collections of permissions granted to a membership role.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::permissions::Permission;

/// A set of permissions that can be assigned to roles.
///
/// Lookups honour [`Permission::implies`], so a set holding
/// `ManageMembers` also answers `true` for `AddMembers`.
///
/// # Example
///
/// ```
/// use campus_rbac::{Permission, PermissionSet};
///
/// let mut set = PermissionSet::new();
/// set.add(Permission::Edit);
///
/// assert!(set.has(Permission::Edit));
/// assert!(set.has(Permission::View));
/// assert_eq!(set.len(), 1);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionSet {
    permissions: BTreeSet<Permission>,
}

impl PermissionSet {
    /// Create a new empty permission set.
    pub fn new() -> Self {
        Self {
            permissions: BTreeSet::new(),
        }
    }

    /// Add a permission to the set.
    pub fn add(&mut self, permission: Permission) {
        self.permissions.insert(permission);
    }

    /// Remove a permission from the set.
    ///
    /// # Returns
    ///
    /// `true` if the permission was explicitly present
    pub fn remove(&mut self, permission: Permission) -> bool {
        self.permissions.remove(&permission)
    }

    /// Check if the set grants a permission, directly or by implication.
    pub fn has(&self, permission: Permission) -> bool {
        self.permissions.iter().any(|held| held.implies(permission))
    }

    /// Permissions explicitly held by the set, in declaration order.
    pub fn explicit(&self) -> Vec<Permission> {
        self.permissions.iter().copied().collect()
    }

    /// Every permission the set grants once implications are expanded.
    pub fn effective(&self) -> Vec<Permission> {
        Permission::all()
            .into_iter()
            .filter(|p| self.has(*p))
            .collect()
    }

    /// Merge another permission set into this one.
    pub fn merge(&mut self, other: &PermissionSet) {
        self.permissions.extend(other.permissions.iter().copied());
    }

    /// Create from a list of permission strings, skipping unknown entries.
    ///
    /// # Example
    ///
    /// ```
    /// use campus_rbac::{Permission, PermissionSet};
    ///
    /// let set = PermissionSet::from_strings(&["view", "add_members", "bogus"]);
    /// assert_eq!(set.len(), 2);
    /// assert!(set.has(Permission::AddMembers));
    /// ```
    pub fn from_strings(perms: &[&str]) -> Self {
        perms.iter().filter_map(|s| Permission::parse(s)).collect()
    }

    /// Get the count of explicitly held permissions.
    pub fn len(&self) -> usize {
        self.permissions.len()
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.permissions.is_empty()
    }

    /// Check if this set grants every permission another set grants.
    pub fn contains_all(&self, other: &PermissionSet) -> bool {
        other.effective().into_iter().all(|p| self.has(p))
    }
}

impl FromIterator<Permission> for PermissionSet {
    fn from_iter<T: IntoIterator<Item = Permission>>(iter: T) -> Self {
        Self {
            permissions: iter.into_iter().collect(),
        }
    }
}
