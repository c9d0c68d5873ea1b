//! Campus orchestration service
//!
//! The entry point consumed by request handlers. Each call loads its own copy
//! of the entities it touches, applies domain rules and writes the result
//! back, so no entity instance is ever shared between calls.
//!
//! Rules that span several entities are checked by the store inside the
//! write that depends on them (live children on delete, a live parent on
//! restore, overlapping membership windows). This layer adds:
//!
//! - soft-deleted units are hidden from subtree and depth listings
//! - memberships cascade: a role held on a unit applies to every unit below it

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, instrument, warn};

use campus_org::{
    materialize_subtree, AcademicUnit, DomainError, MembershipDomainService, MembershipId, MembershipRole,
    School, SchoolId, UnitId, UnitMembership, UnitType, UserId,
};
use campus_rbac::{Permission, PermissionSet};

use crate::error::StoreResult;
use crate::path::UnitPath;
use crate::repository::CampusStore;

/// Input for [`CampusService::create_unit`].
#[derive(Debug, Clone)]
pub struct NewUnit {
    pub school_id: SchoolId,
    pub parent_id: Option<UnitId>,
    pub unit_type: UnitType,
    pub display_name: String,
    pub code: String,
    pub description: Option<String>,
}

impl NewUnit {
    /// A root unit of `school_id`.
    pub fn new(
        school_id: SchoolId,
        unit_type: UnitType,
        display_name: impl Into<String>,
        code: impl Into<String>,
    ) -> Self {
        Self {
            school_id,
            parent_id: None,
            unit_type,
            display_name: display_name.into(),
            code: code.into(),
            description: None,
        }
    }

    /// Place the unit under `parent_id`.
    pub fn under(mut self, parent_id: UnitId) -> Self {
        self.parent_id = Some(parent_id);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Schools, units and memberships over a [`CampusStore`].
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use campus_org::{MembershipRole, UnitType, UserId};
/// use campus_rbac::Permission;
/// use campus_store::{CampusService, MemoryStore, NewUnit};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let service = CampusService::new(Arc::new(MemoryStore::new()));
/// let school = service.create_school("Acme", "ACM").await.unwrap();
/// let grade = service
///     .create_unit(NewUnit::new(school.id(), UnitType::Grade, "Grade 1", "G1"))
///     .await
///     .unwrap();
/// let section = service
///     .create_unit(NewUnit::new(school.id(), UnitType::Section, "Section A", "G1-A").under(grade.id()))
///     .await
///     .unwrap();
///
/// let teacher = UserId::new();
/// service.add_member(grade.id(), teacher, MembershipRole::Teacher, None).await.unwrap();
/// let now = chrono::Utc::now();
/// assert!(service.effective_permission(teacher, section.id(), Permission::Edit, now).await.unwrap());
/// # }
/// ```
#[derive(Clone)]
pub struct CampusService {
    store: Arc<dyn CampusStore>,
}

impl CampusService {
    pub fn new(store: Arc<dyn CampusStore>) -> Self {
        Self { store }
    }

    /// The underlying store, for queries the service does not wrap.
    pub fn store(&self) -> &Arc<dyn CampusStore> {
        &self.store
    }

    // ---- schools ----

    #[instrument(skip(self))]
    pub async fn create_school(&self, name: &str, code: &str) -> StoreResult<School> {
        let school = School::new(name, code)?;
        self.store.create_school(&school).await?;
        info!(school_id = %school.id(), code = %school.code(), "School registered");
        Ok(school)
    }

    pub async fn get_school(&self, id: SchoolId) -> StoreResult<School> {
        self.store.find_school(id).await
    }

    pub async fn list_schools(&self) -> StoreResult<Vec<School>> {
        self.store.list_schools().await
    }

    /// Update name, code or address; at least one must be given.
    pub async fn update_school(
        &self,
        id: SchoolId,
        name: Option<&str>,
        code: Option<&str>,
        address: Option<&str>,
    ) -> StoreResult<School> {
        let mut school = self.store.find_school(id).await?;
        school.update_info(name, code, address)?;
        self.store.update_school(&school).await?;
        Ok(school)
    }

    // ---- units ----

    /// Create a unit, validating its placement against the stored parent.
    #[instrument(skip(self, input), fields(school_id = %input.school_id, unit_type = %input.unit_type))]
    pub async fn create_unit(&self, input: NewUnit) -> StoreResult<AcademicUnit> {
        self.store.find_school(input.school_id).await?;

        let mut unit = AcademicUnit::new(input.school_id, input.unit_type, input.display_name, input.code)?;
        if let Some(description) = input.description {
            unit = unit.with_description(description);
        }
        if let Some(parent_id) = input.parent_id {
            let parent = self.store.find_unit(parent_id).await?;
            unit.set_parent(parent.id(), parent.unit_type())?;
        }

        let path = self.store.create_unit(&unit).await?;
        info!(unit_id = %unit.id(), depth = path.depth(), "Academic unit created");
        Ok(unit)
    }

    /// Fetch a unit, including soft-deleted ones.
    pub async fn get_unit(&self, id: UnitId) -> StoreResult<AcademicUnit> {
        self.store.find_unit(id).await
    }

    /// Live children of a unit.
    pub async fn children(&self, id: UnitId) -> StoreResult<Vec<AcademicUnit>> {
        let children = self.store.find_children(id).await?;
        Ok(children.into_iter().filter(|u| !u.is_deleted()).collect())
    }

    /// Root-first chain of ancestors, e.g. for breadcrumbs.
    pub async fn ancestors(&self, id: UnitId) -> StoreResult<Vec<AcademicUnit>> {
        self.store.find_ancestors(id).await
    }

    pub async fn update_unit_info(
        &self,
        id: UnitId,
        display_name: Option<&str>,
        description: Option<&str>,
    ) -> StoreResult<AcademicUnit> {
        let mut unit = self.live_unit(id).await?;
        unit.update_info(display_name, description)?;
        self.store.update_unit(&unit).await?;
        Ok(unit)
    }

    pub async fn set_unit_metadata(
        &self,
        id: UnitId,
        key: &str,
        value: serde_json::Value,
    ) -> StoreResult<AcademicUnit> {
        let mut unit = self.live_unit(id).await?;
        unit.set_metadata(key, value)?;
        self.store.update_unit(&unit).await?;
        Ok(unit)
    }

    /// Soft delete a unit. Rejected while any child is still live.
    #[instrument(skip(self))]
    pub async fn delete_unit(&self, id: UnitId) -> StoreResult<AcademicUnit> {
        let unit = self.store.soft_delete_unit(id).await?;
        info!(unit_id = %id, "Academic unit deleted");
        Ok(unit)
    }

    /// Undo a soft delete. Rejected while the parent is deleted.
    #[instrument(skip(self))]
    pub async fn restore_unit(&self, id: UnitId) -> StoreResult<AcademicUnit> {
        let unit = self.store.restore_unit(id).await?;
        info!(unit_id = %id, "Academic unit restored");
        Ok(unit)
    }

    /// Reparent a unit and its subtree; `None` promotes it to a root.
    #[instrument(skip(self))]
    pub async fn move_unit(&self, id: UnitId, new_parent: Option<UnitId>) -> StoreResult<UnitPath> {
        match self.store.move_subtree(id, new_parent).await {
            Ok(path) => Ok(path),
            Err(e) => {
                if e.is_server_error() {
                    warn!(unit_id = %id, error = %e, "Subtree move failed");
                } else {
                    debug!(unit_id = %id, error = %e, "Subtree move rejected");
                }
                Err(e)
            }
        }
    }

    /// Load a unit with its live subtree attached as children.
    ///
    /// Soft-deleted units are left out together with everything below them.
    pub async fn load_subtree(&self, id: UnitId) -> StoreResult<AcademicUnit> {
        let root = self.live_unit(id).await?;
        let descendants = self.store.find_descendants(id).await?;

        let mut pruned: HashSet<UnitId> = HashSet::new();
        let mut live = Vec::with_capacity(descendants.len());
        for unit in descendants {
            // path order puts every parent before its children
            let parent_pruned = unit.parent_id().is_some_and(|p| pruned.contains(&p));
            if unit.is_deleted() || parent_pruned {
                pruned.insert(unit.id());
            } else {
                live.push(unit);
            }
        }
        debug!(unit_id = %id, live = live.len(), pruned = pruned.len(), "Subtree loaded");
        Ok(materialize_subtree(root, live)?)
    }

    /// Live units of a school at `depth` (root = 1).
    pub async fn units_at_depth(&self, school_id: SchoolId, depth: usize) -> StoreResult<Vec<AcademicUnit>> {
        let units = self.store.find_by_school_and_depth(school_id, depth).await?;
        Ok(units.into_iter().filter(|u| !u.is_deleted()).collect())
    }

    async fn live_unit(&self, id: UnitId) -> StoreResult<AcademicUnit> {
        let unit = self.store.find_unit(id).await?;
        if unit.is_deleted() {
            return Err(DomainError::business(format!("unit {} is deleted", id)).into());
        }
        Ok(unit)
    }

    // ---- memberships ----

    /// Add `user_id` to a live unit with `role`, starting at `valid_from`
    /// (now when `None`) with no end.
    #[instrument(skip(self))]
    pub async fn add_member(
        &self,
        unit_id: UnitId,
        user_id: UserId,
        role: MembershipRole,
        valid_from: Option<DateTime<Utc>>,
    ) -> StoreResult<UnitMembership> {
        self.live_unit(unit_id).await?;
        let membership = UnitMembership::new(unit_id, user_id, role, valid_from)?;
        self.store.create_membership(&membership).await?;
        info!(membership_id = %membership.id(), %unit_id, role = %role, "Member added");
        Ok(membership)
    }

    pub async fn get_membership(&self, id: MembershipId) -> StoreResult<UnitMembership> {
        self.store.find_membership(id).await
    }

    /// End a membership now.
    pub async fn expire_membership(&self, id: MembershipId) -> StoreResult<UnitMembership> {
        let mut membership = self.store.find_membership(id).await?;
        membership.expire()?;
        self.store.update_membership(&membership).await?;
        info!(membership_id = %id, "Membership expired");
        Ok(membership)
    }

    pub async fn change_member_role(&self, id: MembershipId, role: MembershipRole) -> StoreResult<UnitMembership> {
        let mut membership = self.store.find_membership(id).await?;
        membership.change_role(role)?;
        self.store.update_membership(&membership).await?;
        info!(membership_id = %id, role = %role, "Membership role changed");
        Ok(membership)
    }

    /// Move the end of a membership to `until`, or remove it when `None`.
    pub async fn extend_membership(
        &self,
        id: MembershipId,
        until: Option<DateTime<Utc>>,
    ) -> StoreResult<UnitMembership> {
        let mut membership = self.store.find_membership(id).await?;
        match until {
            Some(until) => membership.set_valid_until(until)?,
            None => membership.extend_indefinitely(),
        }
        self.store.update_membership(&membership).await?;
        Ok(membership)
    }

    pub async fn remove_member(&self, id: MembershipId) -> StoreResult<()> {
        self.store.delete_membership(id).await?;
        info!(membership_id = %id, "Membership removed");
        Ok(())
    }

    /// Memberships of a unit active at `at`.
    pub async fn active_members(&self, unit_id: UnitId, at: DateTime<Utc>) -> StoreResult<Vec<UnitMembership>> {
        self.store.find_active_memberships_by_unit(unit_id, at).await
    }

    // ---- permissions ----

    /// Check if `user_id` holds `permission` on `unit_id` at `at`.
    ///
    /// A role held on a unit applies to the unit and everything below it.
    /// Memberships on soft-deleted units grant nothing.
    pub async fn effective_permission(
        &self,
        user_id: UserId,
        unit_id: UnitId,
        permission: Permission,
        at: DateTime<Utc>,
    ) -> StoreResult<bool> {
        Ok(self.effective_permissions(user_id, unit_id, at).await?.has(permission))
    }

    /// Union of the permissions `user_id` holds on `unit_id` at `at`.
    pub async fn effective_permissions(
        &self,
        user_id: UserId,
        unit_id: UnitId,
        at: DateTime<Utc>,
    ) -> StoreResult<PermissionSet> {
        let mut chain = self.store.find_ancestors(unit_id).await?;
        chain.push(self.store.find_unit(unit_id).await?);
        let live: HashSet<UnitId> = chain.iter().filter(|u| !u.is_deleted()).map(|u| u.id()).collect();

        let mut granted = PermissionSet::new();
        for membership in self.store.find_memberships_by_user(user_id).await? {
            if live.contains(&membership.unit_id()) && MembershipDomainService.is_active_at(&membership, at) {
                granted.merge(&membership.role().permissions());
            }
        }
        Ok(granted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use crate::memory::MemoryStore;
    use chrono::Duration;

    struct Fixture {
        service: CampusService,
        school: School,
        root: AcademicUnit,
        grade: AcademicUnit,
        section: AcademicUnit,
    }

    async fn fixture() -> Fixture {
        let service = CampusService::new(Arc::new(MemoryStore::new()));
        let school = service.create_school("Acme", "ACM").await.unwrap();
        let root = service
            .create_unit(NewUnit::new(school.id(), UnitType::School, "Acme Main", "MAIN"))
            .await
            .unwrap();
        let grade = service
            .create_unit(NewUnit::new(school.id(), UnitType::Grade, "Grade 1", "G1").under(root.id()))
            .await
            .unwrap();
        let section = service
            .create_unit(NewUnit::new(school.id(), UnitType::Section, "Section A", "G1-A").under(grade.id()))
            .await
            .unwrap();
        Fixture {
            service,
            school,
            root,
            grade,
            section,
        }
    }

    #[tokio::test]
    async fn test_create_unit_checks_placement() {
        let f = fixture().await;
        let err = f
            .service
            .create_unit(NewUnit::new(f.school.id(), UnitType::Grade, "Grade 2", "G2").under(f.section.id()))
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 422);

        let err = f
            .service
            .create_unit(NewUnit::new(SchoolId::new(), UnitType::Grade, "Grade 2", "G2"))
            .await
            .unwrap_err();
        assert!(err.is_not_found());

        let club = f
            .service
            .create_unit(
                NewUnit::new(f.school.id(), UnitType::Club, "Chess Club", "CHESS")
                    .under(f.root.id())
                    .with_description("Thursdays"),
            )
            .await
            .unwrap();
        assert_eq!(club.description(), Some("Thursdays"));
    }

    #[tokio::test]
    async fn test_update_school() {
        let f = fixture().await;
        let school = f
            .service
            .update_school(f.school.id(), Some("Acme Academy"), None, Some("1 Main St"))
            .await
            .unwrap();
        assert_eq!(school.name(), "Acme Academy");
        assert_eq!(f.service.get_school(f.school.id()).await.unwrap().address(), "1 Main St");
        assert!(f.service.update_school(f.school.id(), None, None, None).await.is_err());
    }

    #[tokio::test]
    async fn test_delete_requires_children_gone() {
        let f = fixture().await;
        let err = f.service.delete_unit(f.grade.id()).await.unwrap_err();
        assert!(err.to_string().contains("active children"));

        f.service.delete_unit(f.section.id()).await.unwrap();
        f.service.delete_unit(f.grade.id()).await.unwrap();
        assert!(f.service.get_unit(f.grade.id()).await.unwrap().is_deleted());

        // section cannot come back before its grade
        assert!(f.service.restore_unit(f.section.id()).await.is_err());
        f.service.restore_unit(f.grade.id()).await.unwrap();
        f.service.restore_unit(f.section.id()).await.unwrap();
        assert!(f.service.restore_unit(f.section.id()).await.is_err());
    }

    #[tokio::test]
    async fn test_deleted_units_reject_edits() {
        let f = fixture().await;
        f.service.delete_unit(f.section.id()).await.unwrap();
        assert!(f.service.update_unit_info(f.section.id(), Some("Renamed"), None).await.is_err());
        assert!(f
            .service
            .set_unit_metadata(f.section.id(), "room", serde_json::json!("101"))
            .await
            .is_err());

        let grade = f
            .service
            .set_unit_metadata(f.grade.id(), "floor", serde_json::json!(2))
            .await
            .unwrap();
        assert_eq!(grade.metadata().get("floor"), Some(&serde_json::json!(2)));
    }

    #[tokio::test]
    async fn test_load_subtree_skips_deleted_branches() {
        let f = fixture().await;
        let g2 = f
            .service
            .create_unit(NewUnit::new(f.school.id(), UnitType::Grade, "Grade 2", "G2").under(f.root.id()))
            .await
            .unwrap();
        let g2a = f
            .service
            .create_unit(NewUnit::new(f.school.id(), UnitType::Section, "Section 2A", "G2-A").under(g2.id()))
            .await
            .unwrap();
        f.service.delete_unit(g2a.id()).await.unwrap();

        let tree = f.service.load_subtree(f.root.id()).await.unwrap();
        assert_eq!(tree.children().len(), 2);
        assert_eq!(tree.all_descendants().len(), 3);
        assert!(tree.find_in_subtree(g2a.id()).is_none());
        assert_eq!(tree.depth(), 2);

        let depth3 = f.service.units_at_depth(f.school.id(), 3).await.unwrap();
        assert_eq!(depth3.len(), 1);
        assert_eq!(depth3[0].id(), f.section.id());
    }

    #[tokio::test]
    async fn test_move_unit() {
        let f = fixture().await;
        let g2 = f
            .service
            .create_unit(NewUnit::new(f.school.id(), UnitType::Grade, "Grade 2", "G2").under(f.root.id()))
            .await
            .unwrap();

        let path = f.service.move_unit(f.section.id(), Some(g2.id())).await.unwrap();
        assert_eq!(path.ids(), &[f.root.id(), g2.id(), f.section.id()]);
        assert!(f.service.children(f.grade.id()).await.unwrap().is_empty());

        assert!(f.service.move_unit(f.root.id(), Some(g2.id())).await.is_err());
    }

    #[tokio::test]
    async fn test_add_member_rules() {
        let f = fixture().await;
        let user = UserId::new();
        let m = f
            .service
            .add_member(f.grade.id(), user, MembershipRole::Student, None)
            .await
            .unwrap();

        let err = f
            .service
            .add_member(f.grade.id(), user, MembershipRole::Teacher, None)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));

        // other units are fine
        f.service
            .add_member(f.section.id(), user, MembershipRole::Student, None)
            .await
            .unwrap();

        f.service.delete_unit(f.section.id()).await.unwrap();
        assert!(f
            .service
            .add_member(f.section.id(), UserId::new(), MembershipRole::Student, None)
            .await
            .is_err());

        assert_eq!(f.service.active_members(f.grade.id(), Utc::now()).await.unwrap().len(), 1);
        assert_eq!(f.service.get_membership(m.id()).await.unwrap().role(), MembershipRole::Student);
    }

    #[tokio::test]
    async fn test_membership_lifecycle() {
        let f = fixture().await;
        let user = UserId::new();
        let start = Utc::now() - Duration::days(30);
        let m = f
            .service
            .add_member(f.grade.id(), user, MembershipRole::Student, Some(start))
            .await
            .unwrap();

        let m = f.service.change_member_role(m.id(), MembershipRole::Assistant).await.unwrap();
        assert_eq!(m.role(), MembershipRole::Assistant);
        assert!(f.service.change_member_role(m.id(), MembershipRole::Assistant).await.is_err());

        let m = f
            .service
            .extend_membership(m.id(), Some(Utc::now() + Duration::days(30)))
            .await
            .unwrap();
        assert!(m.valid_until().is_some());

        let m = f.service.expire_membership(m.id()).await.unwrap();
        let ended = m.valid_until().unwrap();
        assert!(f.service.active_members(f.grade.id(), ended + Duration::seconds(1)).await.unwrap().is_empty());

        // a later stint for the same user does not overlap the expired one
        let later = f
            .service
            .add_member(f.grade.id(), user, MembershipRole::Teacher, Some(ended + Duration::seconds(1)))
            .await
            .unwrap();
        // reopening the old one would now overlap
        assert!(matches!(
            f.service.extend_membership(m.id(), None).await,
            Err(StoreError::Conflict(_))
        ));

        f.service.remove_member(later.id()).await.unwrap();
        assert!(f.service.get_membership(later.id()).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_effective_permission_cascades() {
        let f = fixture().await;
        let coordinator = UserId::new();
        let now = Utc::now();
        f.service
            .add_member(f.grade.id(), coordinator, MembershipRole::Coordinator, Some(now - Duration::hours(1)))
            .await
            .unwrap();

        let on_section = f.service.effective_permissions(coordinator, f.section.id(), now).await.unwrap();
        assert!(on_section.has(Permission::AddMembers));
        assert!(on_section.has(Permission::View));
        assert!(!on_section.has(Permission::ManageUnit));

        // nothing flows upwards
        assert!(!f
            .service
            .effective_permission(coordinator, f.root.id(), Permission::View, now)
            .await
            .unwrap());

        // nor from before the membership started
        assert!(!f
            .service
            .effective_permission(coordinator, f.section.id(), Permission::View, now - Duration::days(1))
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_effective_permission_ignores_roles_without_grants() {
        let f = fixture().await;
        let guardian = UserId::new();
        let admin = UserId::new();
        f.service
            .add_member(f.root.id(), guardian, MembershipRole::Guardian, None)
            .await
            .unwrap();
        f.service
            .add_member(f.root.id(), admin, MembershipRole::Admin, None)
            .await
            .unwrap();

        let at = Utc::now() + Duration::seconds(1);
        assert!(!f
            .service
            .effective_permission(guardian, f.section.id(), Permission::View, at)
            .await
            .unwrap());
        for permission in Permission::all() {
            assert!(f
                .service
                .effective_permission(admin, f.section.id(), permission, at)
                .await
                .unwrap());
        }
    }
}
