//! # Campus RBAC
//!
//! Permission vocabulary shared by the campus crates. Membership roles in
//! `campus-org` resolve to a [`PermissionSet`] built from the permissions
//! defined here.
//!
//! ## Overview
//!
//! ```text
//! manage_unit
//!   ├─ manage_members ─┬─ view_members
//!   │                  └─ add_members
//!   └─ edit ─────────── view
//! ```
//!
//! A permission implies every permission beneath it in the diagram, so a
//! set holding `manage_members` answers `true` for `add_members`.
//!
//! ## Usage
//!
//! ```rust
//! use campus_rbac::{Permission, PermissionSet};
//!
//! let set = PermissionSet::from_iter([Permission::Edit, Permission::ManageMembers]);
//! assert!(set.has(Permission::View));
//! assert!(set.has(Permission::AddMembers));
//! assert!(!set.has(Permission::ManageUnit));
//! ```

pub mod permission_set;
pub mod permissions;

pub use permission_set::PermissionSet;
pub use permissions::Permission;
