//! Repository traits
//!
//! Every backend implements all three repositories over one shared state, so
//! cross-entity rules (a unit's school must exist, a membership's unit must
//! exist, a school with units cannot be removed) hold regardless of which
//! trait object a caller holds. [`CampusStore`] names the combination.
//!
//! Unit queries are pointer-faithful: soft-deleted units are returned like any
//! other and filtering is left to the caller.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use campus_org::{AcademicUnit, MembershipId, School, SchoolId, UnitId, UnitMembership, UserId};

use crate::error::StoreResult;
use crate::path::UnitPath;

/// School persistence.
#[async_trait]
pub trait SchoolRepository: Send + Sync {
    /// Insert a new school. Ids and codes are unique (`Conflict`).
    async fn create_school(&self, school: &School) -> StoreResult<()>;

    async fn find_school(&self, id: SchoolId) -> StoreResult<School>;

    /// Lookup by exact code.
    async fn find_school_by_code(&self, code: &str) -> StoreResult<School>;

    /// All schools ordered by code.
    async fn list_schools(&self) -> StoreResult<Vec<School>>;

    /// Overwrite a stored school.
    async fn update_school(&self, school: &School) -> StoreResult<()>;

    /// Hard delete. Rejected while the school still owns units.
    async fn delete_school(&self, id: SchoolId) -> StoreResult<()>;
}

/// Academic unit persistence with a materialized-path index.
#[async_trait]
pub trait AcademicUnitRepository: Send + Sync {
    /// Insert a unit and derive its path from the stored parent path.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the school or the parent does not exist
    /// - `BusinessRule` if the parent belongs to another school, is
    ///   soft-deleted, or cannot take a child of this type
    /// - `Conflict` if the id or the `(school, code)` pair is taken
    async fn create_unit(&self, unit: &AcademicUnit) -> StoreResult<UnitPath>;

    async fn find_unit(&self, id: UnitId) -> StoreResult<AcademicUnit>;

    /// Stored path of a unit.
    async fn find_path(&self, id: UnitId) -> StoreResult<UnitPath>;

    /// Exact path lookup.
    async fn find_by_path(&self, path: &UnitPath) -> StoreResult<AcademicUnit>;

    /// Direct children of `parent_id`, ordered by path.
    async fn find_children(&self, parent_id: UnitId) -> StoreResult<Vec<AcademicUnit>>;

    /// Every unit below `unit_id`, ordered by path so each ancestor precedes
    /// its descendants.
    async fn find_descendants(&self, unit_id: UnitId) -> StoreResult<Vec<AcademicUnit>>;

    /// Strict ancestors of `unit_id`, root first.
    async fn find_ancestors(&self, unit_id: UnitId) -> StoreResult<Vec<AcademicUnit>>;

    /// Every unit of a school, ordered by path.
    async fn find_by_school(&self, school_id: SchoolId) -> StoreResult<Vec<AcademicUnit>>;

    /// Units of a school at `depth` (root = 1), ordered by path.
    async fn find_by_school_and_depth(
        &self,
        school_id: SchoolId,
        depth: usize,
    ) -> StoreResult<Vec<AcademicUnit>>;

    /// Overwrite non-structural fields of a stored unit.
    ///
    /// The school, type and parent pointer are fixed here; a changed parent
    /// is rejected and must go through [`move_subtree`](Self::move_subtree).
    async fn update_unit(&self, unit: &AcademicUnit) -> StoreResult<()>;

    /// Soft delete `id`, checking for live children under the same lock or
    /// transaction as the write. Returns the deleted unit.
    ///
    /// # Errors
    ///
    /// `BusinessRule` if the unit is already deleted or a child is live.
    async fn soft_delete_unit(&self, id: UnitId) -> StoreResult<AcademicUnit>;

    /// Undo a soft delete; rejected while the parent is deleted. Returns the
    /// restored unit.
    async fn restore_unit(&self, id: UnitId) -> StoreResult<AcademicUnit>;

    /// Reparent `unit_id` (or promote it to a root when `new_parent` is
    /// `None`) and rewrite the path of the whole subtree atomically.
    ///
    /// Moving a unit under itself or one of its descendants, under a unit of
    /// another school, under a soft-deleted unit or under an incompatible
    /// type is rejected before anything is written. Moving to the current
    /// parent succeeds without writing.
    async fn move_subtree(&self, unit_id: UnitId, new_parent: Option<UnitId>) -> StoreResult<UnitPath>;
}

/// Membership persistence.
#[async_trait]
pub trait MembershipRepository: Send + Sync {
    /// Insert a membership. The unit must exist.
    ///
    /// A user holds at most one membership per unit for any point in time;
    /// an overlapping validity window is a `Conflict`. The check and the
    /// insert are atomic.
    async fn create_membership(&self, membership: &UnitMembership) -> StoreResult<()>;

    async fn find_membership(&self, id: MembershipId) -> StoreResult<UnitMembership>;

    /// Memberships of a unit ordered by start of validity.
    async fn find_memberships_by_unit(&self, unit_id: UnitId) -> StoreResult<Vec<UnitMembership>>;

    /// Memberships of a user ordered by start of validity.
    async fn find_memberships_by_user(&self, user_id: UserId) -> StoreResult<Vec<UnitMembership>>;

    /// Memberships of a unit active at `at`.
    async fn find_active_memberships_by_unit(
        &self,
        unit_id: UnitId,
        at: DateTime<Utc>,
    ) -> StoreResult<Vec<UnitMembership>>;

    /// Overwrite role, window and metadata. The new window is checked for
    /// overlaps like [`create_membership`](Self::create_membership).
    async fn update_membership(&self, membership: &UnitMembership) -> StoreResult<()>;

    async fn delete_membership(&self, id: MembershipId) -> StoreResult<()>;
}

/// A backend providing every repository over one consistent state.
pub trait CampusStore: SchoolRepository + AcademicUnitRepository + MembershipRepository {
    /// Short backend name for logs.
    fn backend_name(&self) -> &'static str;
}
