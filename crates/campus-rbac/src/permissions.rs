//! # Permissions
//!
//! The operations a unit membership can be granted on its unit.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Permissions that can be granted on an academic unit.
///
/// - **View**: Read unit details
/// - **Edit**: Change unit display information
/// - **ViewMembers**: List the memberships of a unit
/// - **AddMembers**: Create new memberships on a unit
/// - **ManageMembers**: Full membership administration (expire, change role)
/// - **ManageUnit**: Administer the unit itself, including moves and deletion
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    /// Read unit details.
    View,

    /// Change unit display information.
    Edit,

    /// List the memberships of a unit.
    ViewMembers,

    /// Create new memberships on a unit.
    AddMembers,

    /// Administer memberships (includes viewing and adding).
    ManageMembers,

    /// Administer the unit itself. Implies every other permission.
    ManageUnit,
}

impl Permission {
    /// Get the string representation of the permission.
    pub fn as_str(&self) -> &'static str {
        match self {
            Permission::View => "view",
            Permission::Edit => "edit",
            Permission::ViewMembers => "view_members",
            Permission::AddMembers => "add_members",
            Permission::ManageMembers => "manage_members",
            Permission::ManageUnit => "manage_unit",
        }
    }

    /// Parse a permission from its string representation.
    ///
    /// # Arguments
    ///
    /// * `s` - String to parse (case-insensitive, `-` accepted for `_`)
    ///
    /// # Returns
    ///
    /// `Some(Permission)` if valid, `None` otherwise
    ///
    /// # Example
    ///
    /// ```
    /// use campus_rbac::Permission;
    ///
    /// assert_eq!(Permission::parse("view"), Some(Permission::View));
    /// assert_eq!(Permission::parse("Manage-Members"), Some(Permission::ManageMembers));
    /// assert_eq!(Permission::parse("delete"), None);
    /// ```
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "view" => Some(Permission::View),
            "edit" => Some(Permission::Edit),
            "view_members" => Some(Permission::ViewMembers),
            "add_members" => Some(Permission::AddMembers),
            "manage_members" => Some(Permission::ManageMembers),
            "manage_unit" => Some(Permission::ManageUnit),
            _ => None,
        }
    }

    /// Get all permissions.
    pub fn all() -> Vec<Self> {
        vec![
            Permission::View,
            Permission::Edit,
            Permission::ViewMembers,
            Permission::AddMembers,
            Permission::ManageMembers,
            Permission::ManageUnit,
        ]
    }

    /// Check if holding this permission also grants `other`.
    ///
    /// - `ManageUnit` implies every permission
    /// - `ManageMembers` implies `ViewMembers` and `AddMembers`
    /// - `Edit` implies `View`
    ///
    /// A permission always implies itself.
    ///
    /// # Example
    ///
    /// ```
    /// use campus_rbac::Permission;
    ///
    /// assert!(Permission::ManageUnit.implies(Permission::AddMembers));
    /// assert!(Permission::Edit.implies(Permission::View));
    /// assert!(!Permission::View.implies(Permission::Edit));
    /// ```
    pub fn implies(&self, other: Permission) -> bool {
        if *self == other {
            return true;
        }
        match self {
            Permission::ManageUnit => true,
            Permission::ManageMembers => {
                matches!(other, Permission::ViewMembers | Permission::AddMembers)
            }
            Permission::Edit => other == Permission::View,
            _ => false,
        }
    }

    /// Check if this permission only reads data.
    pub fn is_read_only(&self) -> bool {
        matches!(self, Permission::View | Permission::ViewMembers)
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
