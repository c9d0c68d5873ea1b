//! In-memory store
//!
//! Keeps flat records in hash maps plus a `BTreeMap` keyed by [`UnitPath`].
//! Path order lists every unit directly before its descendants, so subtree
//! scans are a single range walk. One `RwLock` guards all tables; a subtree
//! move computes every rewrite under the write lock before applying any of
//! them, which makes it atomic with respect to readers and other moves.

use std::collections::{BTreeMap, HashMap};
use std::ops::Bound::{Excluded, Unbounded};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::{debug, info, instrument};

use campus_org::{
    AcademicUnit, DomainError, MembershipId, MembershipRecord, School, SchoolId, SchoolRecord, UnitId,
    UnitMembership, UnitRecord, UserId,
};

use crate::error::{StoreError, StoreResult};
use crate::path::UnitPath;
use crate::repository::{AcademicUnitRepository, CampusStore, MembershipRepository, SchoolRepository};
use crate::rules;

#[derive(Debug, Clone)]
struct StoredUnit {
    record: UnitRecord,
    path: UnitPath,
}

#[derive(Debug, Default)]
struct Tables {
    schools: HashMap<SchoolId, SchoolRecord>,
    units: HashMap<UnitId, StoredUnit>,
    paths: BTreeMap<UnitPath, UnitId>,
    memberships: HashMap<MembershipId, MembershipRecord>,
}

impl Tables {
    fn stored_unit(&self, id: UnitId) -> StoreResult<&StoredUnit> {
        self.units
            .get(&id)
            .ok_or_else(|| StoreError::not_found("academic unit", id))
    }

    fn load_unit(&self, id: UnitId) -> StoreResult<AcademicUnit> {
        Ok(AcademicUnit::from_record(self.stored_unit(id)?.record.clone())?)
    }

    fn load_placed(&self, id: UnitId) -> StoreResult<(AcademicUnit, UnitPath)> {
        let stored = self.stored_unit(id)?;
        Ok((AcademicUnit::from_record(stored.record.clone())?, stored.path.clone()))
    }

    /// Paths strictly below `path`, in path order.
    fn descendants<'a>(&'a self, path: &'a UnitPath) -> impl Iterator<Item = (&'a UnitPath, UnitId)> + 'a {
        self.paths
            .range::<UnitPath, _>((Excluded(path.clone()), Unbounded))
            .take_while(move |(p, _)| p.starts_with(path))
            .map(|(p, id)| (p, *id))
    }

    fn load_units<I>(&self, ids: I) -> StoreResult<Vec<AcademicUnit>>
    where
        I: IntoIterator<Item = UnitId>,
    {
        ids.into_iter().map(|id| self.load_unit(id)).collect()
    }

    fn unit_code_taken(&self, school_id: SchoolId, code: &str, except: UnitId) -> bool {
        !code.is_empty()
            && self.units.values().any(|u| {
                u.record.school_id == school_id && u.record.code == code && u.record.id != except
            })
    }

    fn school_code_taken(&self, code: &str, except: SchoolId) -> bool {
        self.schools.values().any(|s| s.code == code && s.id != except)
    }

    fn memberships_where<F>(&self, pred: F) -> StoreResult<Vec<UnitMembership>>
    where
        F: Fn(&MembershipRecord) -> bool,
    {
        let mut records: Vec<&MembershipRecord> = self.memberships.values().filter(|m| pred(m)).collect();
        records.sort_by(|a, b| a.valid_from.cmp(&b.valid_from).then(a.id.cmp(&b.id)));
        records
            .into_iter()
            .map(|r| UnitMembership::from_record(r.clone()).map_err(StoreError::from))
            .collect()
    }
}

/// Store backed by process memory.
///
/// # Examples
///
/// ```
/// use campus_org::{AcademicUnit, School, UnitType};
/// use campus_store::{AcademicUnitRepository, MemoryStore, SchoolRepository};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let store = MemoryStore::new();
/// let school = School::new("Acme", "ACM").unwrap();
/// store.create_school(&school).await.unwrap();
///
/// let grade = AcademicUnit::new(school.id(), UnitType::Grade, "Grade 1", "G1").unwrap();
/// let path = store.create_unit(&grade).await.unwrap();
/// assert_eq!(path.depth(), 1);
/// # }
/// ```
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SchoolRepository for MemoryStore {
    async fn create_school(&self, school: &School) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        if tables.schools.contains_key(&school.id()) {
            return Err(StoreError::conflict(format!("school {} already exists", school.id())));
        }
        if tables.school_code_taken(school.code(), school.id()) {
            return Err(StoreError::conflict(format!(
                "school code '{}' is already in use",
                school.code()
            )));
        }
        tables.schools.insert(school.id(), school.to_record());
        debug!(school_id = %school.id(), code = %school.code(), "School created");
        Ok(())
    }

    async fn find_school(&self, id: SchoolId) -> StoreResult<School> {
        let tables = self.tables.read().await;
        let record = tables
            .schools
            .get(&id)
            .ok_or_else(|| StoreError::not_found("school", id))?;
        Ok(School::from_record(record.clone())?)
    }

    async fn find_school_by_code(&self, code: &str) -> StoreResult<School> {
        let tables = self.tables.read().await;
        let record = tables
            .schools
            .values()
            .find(|s| s.code == code)
            .ok_or_else(|| StoreError::not_found("school", code))?;
        Ok(School::from_record(record.clone())?)
    }

    async fn list_schools(&self) -> StoreResult<Vec<School>> {
        let tables = self.tables.read().await;
        let mut records: Vec<&SchoolRecord> = tables.schools.values().collect();
        records.sort_by(|a, b| a.code.cmp(&b.code));
        records
            .into_iter()
            .map(|r| School::from_record(r.clone()).map_err(StoreError::from))
            .collect()
    }

    async fn update_school(&self, school: &School) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        if !tables.schools.contains_key(&school.id()) {
            return Err(StoreError::not_found("school", school.id()));
        }
        if tables.school_code_taken(school.code(), school.id()) {
            return Err(StoreError::conflict(format!(
                "school code '{}' is already in use",
                school.code()
            )));
        }
        tables.schools.insert(school.id(), school.to_record());
        debug!(school_id = %school.id(), "School updated");
        Ok(())
    }

    async fn delete_school(&self, id: SchoolId) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        if !tables.schools.contains_key(&id) {
            return Err(StoreError::not_found("school", id));
        }
        let owned = tables.units.values().filter(|u| u.record.school_id == id).count();
        if owned > 0 {
            return Err(DomainError::business(format!("school {} still owns {} units", id, owned)).into());
        }
        tables.schools.remove(&id);
        debug!(school_id = %id, "School deleted");
        Ok(())
    }
}

#[async_trait]
impl AcademicUnitRepository for MemoryStore {
    async fn create_unit(&self, unit: &AcademicUnit) -> StoreResult<UnitPath> {
        let mut tables = self.tables.write().await;
        if tables.units.contains_key(&unit.id()) {
            return Err(StoreError::conflict(format!("academic unit {} already exists", unit.id())));
        }
        if !tables.schools.contains_key(&unit.school_id()) {
            return Err(StoreError::not_found("school", unit.school_id()));
        }
        let parent = match unit.parent_id() {
            Some(parent_id) => match tables.load_placed(parent_id) {
                Ok(placed) => Some(placed),
                Err(e) if e.is_not_found() => None,
                Err(e) => return Err(e),
            },
            None => None,
        };
        let path = rules::new_unit_path(unit, parent.as_ref().map(|(u, p)| (u, p)))?;
        if tables.unit_code_taken(unit.school_id(), unit.code(), unit.id()) {
            return Err(StoreError::conflict(format!(
                "unit code '{}' is already in use in school {}",
                unit.code(),
                unit.school_id()
            )));
        }

        tables.paths.insert(path.clone(), unit.id());
        tables.units.insert(
            unit.id(),
            StoredUnit {
                record: unit.to_record(),
                path: path.clone(),
            },
        );
        debug!(unit_id = %unit.id(), depth = path.depth(), "Academic unit created");
        Ok(path)
    }

    async fn find_unit(&self, id: UnitId) -> StoreResult<AcademicUnit> {
        self.tables.read().await.load_unit(id)
    }

    async fn find_path(&self, id: UnitId) -> StoreResult<UnitPath> {
        Ok(self.tables.read().await.stored_unit(id)?.path.clone())
    }

    async fn find_by_path(&self, path: &UnitPath) -> StoreResult<AcademicUnit> {
        let tables = self.tables.read().await;
        let id = tables
            .paths
            .get(path)
            .copied()
            .ok_or_else(|| StoreError::not_found("academic unit path", path))?;
        tables.load_unit(id)
    }

    async fn find_children(&self, parent_id: UnitId) -> StoreResult<Vec<AcademicUnit>> {
        let tables = self.tables.read().await;
        let parent_path = &tables.stored_unit(parent_id)?.path;
        let child_depth = parent_path.depth() + 1;
        let ids: Vec<UnitId> = tables
            .descendants(parent_path)
            .filter(|(p, _)| p.depth() == child_depth)
            .map(|(_, id)| id)
            .collect();
        tables.load_units(ids)
    }

    async fn find_descendants(&self, unit_id: UnitId) -> StoreResult<Vec<AcademicUnit>> {
        let tables = self.tables.read().await;
        let path = &tables.stored_unit(unit_id)?.path;
        let ids: Vec<UnitId> = tables.descendants(path).map(|(_, id)| id).collect();
        tables.load_units(ids)
    }

    async fn find_ancestors(&self, unit_id: UnitId) -> StoreResult<Vec<AcademicUnit>> {
        let tables = self.tables.read().await;
        let path = tables.stored_unit(unit_id)?.path.clone();
        tables.load_units(path.ancestors().iter().copied())
    }

    async fn find_by_school(&self, school_id: SchoolId) -> StoreResult<Vec<AcademicUnit>> {
        let tables = self.tables.read().await;
        let ids: Vec<UnitId> = tables
            .paths
            .values()
            .copied()
            .filter(|id| {
                tables
                    .units
                    .get(id)
                    .is_some_and(|u| u.record.school_id == school_id)
            })
            .collect();
        tables.load_units(ids)
    }

    async fn find_by_school_and_depth(
        &self,
        school_id: SchoolId,
        depth: usize,
    ) -> StoreResult<Vec<AcademicUnit>> {
        if depth == 0 {
            return Err(DomainError::validation("depth starts at 1 for root units").into());
        }
        let tables = self.tables.read().await;
        let ids: Vec<UnitId> = tables
            .paths
            .iter()
            .filter(|(p, _)| p.depth() == depth)
            .map(|(_, id)| *id)
            .filter(|id| {
                tables
                    .units
                    .get(id)
                    .is_some_and(|u| u.record.school_id == school_id)
            })
            .collect();
        tables.load_units(ids)
    }

    async fn update_unit(&self, unit: &AcademicUnit) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        let stored = tables.load_unit(unit.id())?;
        rules::check_unit_update(&stored, unit)?;
        if tables.unit_code_taken(unit.school_id(), unit.code(), unit.id()) {
            return Err(StoreError::conflict(format!(
                "unit code '{}' is already in use in school {}",
                unit.code(),
                unit.school_id()
            )));
        }
        if let Some(entry) = tables.units.get_mut(&unit.id()) {
            entry.record = unit.to_record();
        }
        debug!(unit_id = %unit.id(), "Academic unit updated");
        Ok(())
    }

    async fn soft_delete_unit(&self, id: UnitId) -> StoreResult<AcademicUnit> {
        let mut tables = self.tables.write().await;
        let (mut unit, path) = tables.load_placed(id)?;
        let child_depth = path.depth() + 1;
        let live_children = tables
            .descendants(&path)
            .filter(|(p, child)| {
                p.depth() == child_depth
                    && tables
                        .units
                        .get(child)
                        .is_some_and(|c| c.record.deleted_at.is_none())
            })
            .count();
        rules::check_soft_delete(&unit, live_children)?;
        unit.soft_delete()?;

        if let Some(entry) = tables.units.get_mut(&id) {
            entry.record = unit.to_record();
        }
        debug!(unit_id = %id, "Academic unit soft deleted");
        Ok(unit)
    }

    async fn restore_unit(&self, id: UnitId) -> StoreResult<AcademicUnit> {
        let mut tables = self.tables.write().await;
        let mut unit = tables.load_unit(id)?;
        let parent = match unit.parent_id() {
            Some(parent_id) => Some(tables.load_unit(parent_id)?),
            None => None,
        };
        rules::check_restore(&unit, parent.as_ref())?;
        unit.restore()?;

        if let Some(entry) = tables.units.get_mut(&id) {
            entry.record = unit.to_record();
        }
        debug!(unit_id = %id, "Academic unit restored");
        Ok(unit)
    }

    #[instrument(skip(self), fields(backend = "memory"))]
    async fn move_subtree(&self, unit_id: UnitId, new_parent: Option<UnitId>) -> StoreResult<UnitPath> {
        let mut guard = self.tables.write().await;
        let tables = &mut *guard;

        let (node, old_path) = tables.load_placed(unit_id)?;
        let target = match new_parent {
            Some(parent_id) => Some(tables.load_placed(parent_id).map_err(|e| {
                if e.is_not_found() {
                    StoreError::not_found("parent unit", parent_id)
                } else {
                    e
                }
            })?),
            None => None,
        };
        let Some(new_path) = rules::plan_move(&node, &old_path, target.as_ref().map(|(u, p)| (u, p)))? else {
            debug!(%unit_id, "Unit already under requested parent");
            return Ok(old_path);
        };

        // Plan every rewrite before touching the index.
        let mut rewrites: Vec<(UnitPath, UnitPath, UnitId)> = Vec::new();
        let subtree = std::iter::once((&old_path, unit_id)).chain(tables.descendants(&old_path));
        for (path, id) in subtree {
            if !tables.units.contains_key(&id) {
                return Err(StoreError::Storage(format!("path index references missing unit {}", id)));
            }
            let rebased = path
                .rebase(&old_path, &new_path)
                .ok_or_else(|| StoreError::Storage(format!("path of unit {} left its subtree", id)))?;
            rewrites.push((path.clone(), rebased, id));
        }

        for (old, _, _) in &rewrites {
            tables.paths.remove(old);
        }
        for (_, new, id) in &rewrites {
            tables.paths.insert(new.clone(), *id);
            if let Some(entry) = tables.units.get_mut(id) {
                entry.path = new.clone();
            }
        }
        if let Some(entry) = tables.units.get_mut(&unit_id) {
            entry.record.parent_unit_id = new_parent;
            entry.record.updated_at = Utc::now();
        }

        info!(
            %unit_id,
            moved = rewrites.len(),
            from_depth = old_path.depth(),
            to_depth = new_path.depth(),
            "Subtree moved"
        );
        Ok(new_path)
    }
}

#[async_trait]
impl MembershipRepository for MemoryStore {
    async fn create_membership(&self, membership: &UnitMembership) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        if !tables.units.contains_key(&membership.unit_id()) {
            return Err(StoreError::not_found("academic unit", membership.unit_id()));
        }
        if tables.memberships.contains_key(&membership.id()) {
            return Err(StoreError::conflict(format!(
                "membership {} already exists",
                membership.id()
            )));
        }
        let same_user = tables.memberships_where(|m| {
            m.unit_id == membership.unit_id() && m.user_id == membership.user_id()
        })?;
        rules::check_no_overlap(membership, &same_user)?;
        tables.memberships.insert(membership.id(), membership.to_record());
        debug!(
            membership_id = %membership.id(),
            unit_id = %membership.unit_id(),
            role = %membership.role(),
            "Membership created"
        );
        Ok(())
    }

    async fn find_membership(&self, id: MembershipId) -> StoreResult<UnitMembership> {
        let tables = self.tables.read().await;
        let record = tables
            .memberships
            .get(&id)
            .ok_or_else(|| StoreError::not_found("membership", id))?;
        Ok(UnitMembership::from_record(record.clone())?)
    }

    async fn find_memberships_by_unit(&self, unit_id: UnitId) -> StoreResult<Vec<UnitMembership>> {
        self.tables.read().await.memberships_where(|m| m.unit_id == unit_id)
    }

    async fn find_memberships_by_user(&self, user_id: UserId) -> StoreResult<Vec<UnitMembership>> {
        self.tables.read().await.memberships_where(|m| m.user_id == user_id)
    }

    async fn find_active_memberships_by_unit(
        &self,
        unit_id: UnitId,
        at: DateTime<Utc>,
    ) -> StoreResult<Vec<UnitMembership>> {
        let all = self.find_memberships_by_unit(unit_id).await?;
        Ok(all.into_iter().filter(|m| m.is_active_at(at)).collect())
    }

    async fn update_membership(&self, membership: &UnitMembership) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        let stored = tables
            .memberships
            .get(&membership.id())
            .ok_or_else(|| StoreError::not_found("membership", membership.id()))?;
        if stored.unit_id != membership.unit_id() || stored.user_id != membership.user_id() {
            return Err(DomainError::business("membership cannot change unit or user").into());
        }
        let same_user = tables.memberships_where(|m| {
            m.unit_id == membership.unit_id() && m.user_id == membership.user_id()
        })?;
        rules::check_no_overlap(membership, &same_user)?;
        tables.memberships.insert(membership.id(), membership.to_record());
        Ok(())
    }

    async fn delete_membership(&self, id: MembershipId) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        tables
            .memberships
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| StoreError::not_found("membership", id))
    }
}

impl CampusStore for MemoryStore {
    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
