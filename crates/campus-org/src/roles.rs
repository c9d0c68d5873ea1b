//! Membership roles
//!
//! This module defines the roles a user can hold within an academic unit,
//! along with the permissions each role grants.

use campus_rbac::{Permission, PermissionSet};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::DomainError;

/// Role of a user within an academic unit.
///
/// # Permission Model
///
/// - **Admin**: `manage_unit`, which implies every permission
/// - **Coordinator**: `view`, `edit`, `manage_members`
/// - **Teacher**: `view`, `edit`
/// - **Student, Assistant, Guardian, Director, Observer**: no unit permissions
///
/// # Examples
///
/// ```
/// use campus_org::MembershipRole;
/// use campus_rbac::Permission;
///
/// assert!(MembershipRole::Teacher.has_permission(Permission::Edit));
/// assert!(!MembershipRole::Teacher.has_permission(Permission::AddMembers));
/// assert!(MembershipRole::Coordinator.has_permission(Permission::AddMembers));
/// assert!(MembershipRole::Admin.has_permission(Permission::ManageUnit));
/// ```
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum MembershipRole {
    /// Enrolled learner
    Student,

    /// Teaching staff assigned to the unit
    Teacher,

    /// Coordinates the unit and its members
    Coordinator,

    /// Full administrative control of the unit
    Admin,

    /// Teaching assistant
    Assistant,

    /// Parent or legal guardian of a student
    Guardian,

    /// School leadership
    Director,

    /// Read-only observer (inspector, auditor)
    Observer,
}

impl MembershipRole {
    /// Parse role from string representation (case-insensitive).
    ///
    /// # Examples
    ///
    /// ```
    /// use campus_org::MembershipRole;
    ///
    /// assert_eq!(MembershipRole::parse("teacher"), Some(MembershipRole::Teacher));
    /// assert_eq!(MembershipRole::parse("GUARDIAN"), Some(MembershipRole::Guardian));
    /// assert_eq!(MembershipRole::parse("janitor"), None);
    /// ```
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "student" => Some(Self::Student),
            "teacher" => Some(Self::Teacher),
            "coordinator" => Some(Self::Coordinator),
            "admin" => Some(Self::Admin),
            "assistant" => Some(Self::Assistant),
            "guardian" => Some(Self::Guardian),
            "director" => Some(Self::Director),
            "observer" => Some(Self::Observer),
            _ => None,
        }
    }

    /// Get string representation of the role.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Student => "student",
            Self::Teacher => "teacher",
            Self::Coordinator => "coordinator",
            Self::Admin => "admin",
            Self::Assistant => "assistant",
            Self::Guardian => "guardian",
            Self::Director => "director",
            Self::Observer => "observer",
        }
    }

    /// Get a human-readable display name for the role.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Student => "Student",
            Self::Teacher => "Teacher",
            Self::Coordinator => "Coordinator",
            Self::Admin => "Administrator",
            Self::Assistant => "Assistant",
            Self::Guardian => "Guardian",
            Self::Director => "Director",
            Self::Observer => "Observer",
        }
    }

    /// Get all roles.
    pub fn all() -> [MembershipRole; 8] {
        [
            Self::Student,
            Self::Teacher,
            Self::Coordinator,
            Self::Admin,
            Self::Assistant,
            Self::Guardian,
            Self::Director,
            Self::Observer,
        ]
    }

    /// Permissions granted by this role.
    pub fn permissions(&self) -> PermissionSet {
        match self {
            Self::Admin => PermissionSet::from_iter([Permission::ManageUnit]),
            Self::Coordinator => PermissionSet::from_iter([
                Permission::View,
                Permission::Edit,
                Permission::ManageMembers,
            ]),
            Self::Teacher => PermissionSet::from_iter([Permission::View, Permission::Edit]),
            Self::Student | Self::Assistant | Self::Guardian | Self::Director | Self::Observer => {
                PermissionSet::new()
            }
        }
    }

    /// Check if this role grants a permission.
    pub fn has_permission(&self, permission: Permission) -> bool {
        self.permissions().has(permission)
    }

    /// Check if this role belongs to staff rather than learners or families.
    pub fn is_staff(&self) -> bool {
        matches!(
            self,
            Self::Teacher | Self::Coordinator | Self::Admin | Self::Assistant | Self::Director
        )
    }
}

impl Default for MembershipRole {
    fn default() -> Self {
        Self::Student
    }
}

impl fmt::Display for MembershipRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MembershipRole {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| DomainError::validation(format!("invalid membership role: {}", s)))
    }
}
