//! # Campus Organization Model
//!
//! Schools, the academic-unit hierarchy and unit memberships for the Campus
//! platform.
//!
//! ## Overview
//!
//! The campus-org crate handles:
//! - **Identifiers**: UUID newtypes with a nil "not set" sentinel
//! - **Schools**: Tenant roots of the hierarchy
//! - **Academic units**: Typed tree nodes with soft delete and metadata
//! - **Memberships**: Time-bounded role assignments of users to units
//! - **Domain services**: Stateless rule engines for tree shape and membership windows
//!
//! ## Architecture
//!
//! ```text
//! School
//!   └─ AcademicUnit (school)
//!        ├─ AcademicUnit (grade)
//!        │    └─ AcademicUnit (section)
//!        ├─ AcademicUnit (club)
//!        └─ AcademicUnit (department)
//!                 └─ UnitMembership ─→ User (role, valid_from..valid_until)
//! ```
//!
//! The parent pointer is the durable relationship. In-memory child lists are
//! projections loaded per request; see [`ChildrenState`].
//!
//! ## Usage
//!
//! ```rust
//! use campus_org::{AcademicUnit, MembershipRole, School, UnitMembership, UnitType, UserId};
//!
//! let school = School::new("Acme", "ACM").unwrap();
//! let mut grade = AcademicUnit::new(school.id(), UnitType::Grade, "Grade 1", "G1").unwrap();
//! let mut section = AcademicUnit::new(school.id(), UnitType::Section, "Section A", "G1-A").unwrap();
//!
//! section.set_parent(grade.id(), grade.unit_type()).unwrap();
//! grade.add_child(section).unwrap();
//! assert_eq!(grade.depth(), 1);
//!
//! let teacher = UnitMembership::new(grade.id(), UserId::new(), MembershipRole::Teacher, None).unwrap();
//! assert!(teacher.is_active());
//! ```

pub mod error;
pub mod ids;
pub mod membership;
pub mod metadata;
pub mod roles;
pub mod school;
pub mod services;
pub mod tree;
pub mod unit;
pub mod unit_type;

// Re-export main types for convenience
pub use error::{DomainError, DomainResult};
pub use ids::{MembershipId, SchoolId, UnitId, UserId};
pub use membership::{MembershipRecord, UnitMembership};
pub use metadata::Metadata;
pub use roles::MembershipRole;
pub use school::{School, SchoolRecord};
pub use services::{AcademicUnitDomainService, MembershipDomainService};
pub use tree::materialize_subtree;
pub use unit::{AcademicUnit, ChildrenState, DeletionState, UnitRecord};
pub use unit_type::UnitType;
