//! # Campus Store
//!
//! Persistence and orchestration for the Campus academic hierarchy.
//!
//! ## Overview
//!
//! The campus-store crate handles:
//! - **Materialized paths**: [`UnitPath`], the root-to-self id chain stored
//!   next to every unit's parent pointer
//! - **Repositories**: async traits for schools, units and memberships
//! - **Backends**: [`MemoryStore`] and, with the `sqlite` feature,
//!   [`SqliteStore`]
//! - **Configuration**: [`StoreConfig`] and [`open_store`]
//! - **Orchestration**: [`CampusService`], the calls request handlers make
//!
//! ## Path index
//!
//! ```text
//! unit              parent     path                     depth
//! Main Campus       -          m                        1
//! Grade 1           m          m.g                      2
//! Section A         g          m.g.s                    3
//!
//! descendants(m)  = path in (m. , m/)      -> m.g, m.g.s
//! ancestors(m.g.s) = prefixes of m.g.s      -> m, m.g
//! move(g -> n)    = rewrite prefix m.g -> n.g for m.g and every row below it
//! ```
//!
//! The parent pointer and the path are updated together under one lock or
//! transaction; a partially rewritten subtree is never visible.
//!
//! ## Usage
//!
//! ```rust
//! use campus_org::UnitType;
//! use campus_store::{open_store, CampusService, NewUnit, StoreConfig};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let store = open_store(&StoreConfig::default()).unwrap();
//! let service = CampusService::new(store);
//!
//! let school = service.create_school("Acme", "ACM").await.unwrap();
//! let grade = service
//!     .create_unit(NewUnit::new(school.id(), UnitType::Grade, "Grade 1", "G1"))
//!     .await
//!     .unwrap();
//! let tree = service.load_subtree(grade.id()).await.unwrap();
//! assert!(tree.children().is_empty());
//! # }
//! ```

pub mod config;
pub mod error;
pub mod memory;
pub mod path;
pub mod repository;
mod rules;
pub mod service;
#[cfg(feature = "sqlite")]
pub mod sqlite;

// Re-export main types for convenience
pub use config::{open_store, ConfigError, StoreBackend, StoreConfig};
pub use error::{StoreError, StoreResult};
pub use memory::MemoryStore;
pub use path::UnitPath;
pub use repository::{AcademicUnitRepository, CampusStore, MembershipRepository, SchoolRepository};
pub use service::{CampusService, NewUnit};
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteStore;
