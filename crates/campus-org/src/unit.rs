//! Academic unit domain model
//!
//! An academic unit is a node of a school's organisational tree. The durable
//! shape of the tree is the `parent_id` pointer (plus the path index kept by
//! the store). The `children` list is a request-scoped projection that is
//! only populated by explicit [`AcademicUnit::add_child`] calls or by
//! [`materialize_subtree`](crate::tree::materialize_subtree);
//! [`ChildrenState`] records how much of it has been loaded.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};
use crate::ids::{SchoolId, UnitId};
use crate::metadata::Metadata;
use crate::services::AcademicUnitDomainService;
use crate::unit_type::UnitType;

/// Soft-delete state of a unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum DeletionState {
    /// The unit is live
    Active,

    /// The unit was soft-deleted at the given instant
    Deleted { at: DateTime<Utc> },
}

impl DeletionState {
    pub fn is_deleted(&self) -> bool {
        matches!(self, DeletionState::Deleted { .. })
    }

    pub fn deleted_at(&self) -> Option<DateTime<Utc>> {
        match self {
            DeletionState::Active => None,
            DeletionState::Deleted { at } => Some(*at),
        }
    }

    /// Builds the state from a nullable storage column.
    pub fn from_timestamp(deleted_at: Option<DateTime<Utc>>) -> Self {
        match deleted_at {
            Some(at) => DeletionState::Deleted { at },
            None => DeletionState::Active,
        }
    }
}

/// How much of a unit's in-memory child list has been loaded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChildrenState {
    /// Nothing loaded; `children()` is empty regardless of storage
    #[default]
    Unloaded,

    /// Some children were attached by hand; the list may be incomplete
    Partial,

    /// The whole persisted subtree below this node is attached
    Complete,
}

/// A node in the academic hierarchy.
///
/// # Examples
///
/// ```
/// use campus_org::{AcademicUnit, SchoolId, UnitType};
///
/// let school_id = SchoolId::new();
/// let mut grade = AcademicUnit::new(school_id, UnitType::Grade, "Grade 1", "G1").unwrap();
/// let mut section = AcademicUnit::new(school_id, UnitType::Section, "Section A", "G1-A").unwrap();
///
/// section.set_parent(grade.id(), grade.unit_type()).unwrap();
/// grade.add_child(section).unwrap();
///
/// assert_eq!(grade.children().len(), 1);
/// assert_eq!(grade.depth(), 1);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AcademicUnit {
    id: UnitId,
    parent_id: Option<UnitId>,
    school_id: SchoolId,
    unit_type: UnitType,
    display_name: String,
    code: String,
    description: Option<String>,
    metadata: Metadata,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    deletion: DeletionState,
    #[serde(skip)]
    pub(crate) children: Vec<AcademicUnit>,
    #[serde(skip)]
    pub(crate) children_state: ChildrenState,
}

/// Flat persistence representation of an [`AcademicUnit`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitRecord {
    pub id: UnitId,
    pub parent_unit_id: Option<UnitId>,
    pub school_id: SchoolId,
    pub unit_type: UnitType,
    pub display_name: String,
    pub code: String,
    pub description: Option<String>,
    pub metadata: Metadata,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

pub(crate) const MIN_DISPLAY_NAME_LEN: usize = 3;

pub(crate) fn validate_display_name(name: &str) -> DomainResult<()> {
    if name.trim().chars().count() < MIN_DISPLAY_NAME_LEN {
        return Err(DomainError::validation(format!(
            "display name must be at least {} characters",
            MIN_DISPLAY_NAME_LEN
        )));
    }
    Ok(())
}

impl AcademicUnit {
    /// Creates a new root unit (no parent) with a freshly generated id.
    ///
    /// # Errors
    ///
    /// `Validation` if the school id is zero or the display name is shorter
    /// than three characters.
    pub fn new(
        school_id: SchoolId,
        unit_type: UnitType,
        display_name: impl Into<String>,
        code: impl Into<String>,
    ) -> DomainResult<Self> {
        if school_id.is_zero() {
            return Err(DomainError::validation("school id is required"));
        }
        let display_name = display_name.into();
        validate_display_name(&display_name)?;

        let now = Utc::now();
        Ok(Self {
            id: UnitId::new(),
            parent_id: None,
            school_id,
            unit_type,
            display_name: display_name.trim().to_string(),
            code: code.into().trim().to_string(),
            description: None,
            metadata: Metadata::new(),
            created_at: now,
            updated_at: now,
            deletion: DeletionState::Active,
            children: Vec::new(),
            children_state: ChildrenState::Unloaded,
        })
    }

    /// Sets the description at construction time.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        let description = description.into();
        self.description = Some(description.trim().to_string()).filter(|d| !d.is_empty());
        self
    }

    /// Rebuilds a unit from storage, in any state including deleted.
    ///
    /// The child list starts [`ChildrenState::Unloaded`].
    pub fn from_record(record: UnitRecord) -> DomainResult<Self> {
        if record.id.is_zero() {
            return Err(DomainError::validation("unit id cannot be empty"));
        }
        if record.school_id.is_zero() {
            return Err(DomainError::validation("school id is required"));
        }
        if record.parent_unit_id == Some(record.id) {
            return Err(DomainError::business("unit cannot be its own parent"));
        }
        Ok(Self {
            id: record.id,
            parent_id: record.parent_unit_id,
            school_id: record.school_id,
            unit_type: record.unit_type,
            display_name: record.display_name,
            code: record.code,
            description: record.description,
            metadata: record.metadata,
            created_at: record.created_at,
            updated_at: record.updated_at,
            deletion: DeletionState::from_timestamp(record.deleted_at),
            children: Vec::new(),
            children_state: ChildrenState::Unloaded,
        })
    }

    /// Flattens the unit for storage. Children are not part of the record.
    pub fn to_record(&self) -> UnitRecord {
        UnitRecord {
            id: self.id,
            parent_unit_id: self.parent_id,
            school_id: self.school_id,
            unit_type: self.unit_type,
            display_name: self.display_name.clone(),
            code: self.code.clone(),
            description: self.description.clone(),
            metadata: self.metadata.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
            deleted_at: self.deletion.deleted_at(),
        }
    }

    pub fn id(&self) -> UnitId {
        self.id
    }

    pub fn parent_id(&self) -> Option<UnitId> {
        self.parent_id
    }

    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }

    pub fn school_id(&self) -> SchoolId {
        self.school_id
    }

    pub fn unit_type(&self) -> UnitType {
        self.unit_type
    }

    pub fn can_have_children(&self) -> bool {
        self.unit_type.can_have_children()
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Snapshot of the metadata bag.
    pub fn metadata(&self) -> Metadata {
        self.metadata.clone()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn deletion(&self) -> DeletionState {
        self.deletion
    }

    pub fn is_deleted(&self) -> bool {
        self.deletion.is_deleted()
    }

    pub fn deleted_at(&self) -> Option<DateTime<Utc>> {
        self.deletion.deleted_at()
    }

    /// Children attached in memory, in insertion order.
    pub fn children(&self) -> &[AcademicUnit] {
        &self.children
    }

    pub fn children_state(&self) -> ChildrenState {
        self.children_state
    }

    /// Check if a direct child with this id is attached in memory.
    pub fn has_child(&self, child_id: UnitId) -> bool {
        self.children.iter().any(|c| c.id == child_id)
    }

    /// Search the in-memory subtree (including this node) for a unit.
    pub fn find_in_subtree(&self, id: UnitId) -> Option<&AcademicUnit> {
        if self.id == id {
            return Some(self);
        }
        self.children.iter().find_map(|c| c.find_in_subtree(id))
    }

    /// See [`AcademicUnitDomainService::set_parent`].
    pub fn set_parent(&mut self, parent_id: UnitId, parent_type: UnitType) -> DomainResult<()> {
        AcademicUnitDomainService.set_parent(self, parent_id, parent_type)
    }

    /// See [`AcademicUnitDomainService::remove_parent`].
    pub fn remove_parent(&mut self) {
        AcademicUnitDomainService.remove_parent(self)
    }

    /// See [`AcademicUnitDomainService::add_child`].
    pub fn add_child(&mut self, child: AcademicUnit) -> DomainResult<()> {
        AcademicUnitDomainService.add_child(self, child)
    }

    /// See [`AcademicUnitDomainService::remove_child`].
    pub fn remove_child(&mut self, child_id: UnitId) -> DomainResult<AcademicUnit> {
        AcademicUnitDomainService.remove_child(self, child_id)
    }

    /// See [`AcademicUnitDomainService::get_all_descendants`].
    pub fn all_descendants(&self) -> Vec<&AcademicUnit> {
        AcademicUnitDomainService.get_all_descendants(self)
    }

    /// Height of the in-memory tree below this node (0 for a leaf).
    pub fn depth(&self) -> usize {
        AcademicUnitDomainService.get_depth(self)
    }

    /// See [`AcademicUnitDomainService::update_info`].
    pub fn update_info(&mut self, display_name: Option<&str>, description: Option<&str>) -> DomainResult<()> {
        AcademicUnitDomainService.update_info(self, display_name, description)
    }

    /// See [`AcademicUnitDomainService::update_display_name`].
    pub fn update_display_name(&mut self, display_name: &str) -> DomainResult<()> {
        AcademicUnitDomainService.update_display_name(self, display_name)
    }

    /// See [`AcademicUnitDomainService::soft_delete`].
    pub fn soft_delete(&mut self) -> DomainResult<()> {
        AcademicUnitDomainService.soft_delete(self)
    }

    /// See [`AcademicUnitDomainService::restore`].
    pub fn restore(&mut self) -> DomainResult<()> {
        AcademicUnitDomainService.restore(self)
    }

    pub fn set_metadata(&mut self, key: impl Into<String>, value: serde_json::Value) -> DomainResult<()> {
        self.metadata.insert(key, value)?;
        self.touch();
        Ok(())
    }

    pub fn remove_metadata(&mut self, key: &str) -> Option<serde_json::Value> {
        let removed = self.metadata.remove(key);
        if removed.is_some() {
            self.touch();
        }
        removed
    }

    /// Replaces the whole metadata bag.
    pub fn replace_metadata(&mut self, metadata: Metadata) {
        self.metadata = metadata;
        self.touch();
    }

    pub(crate) fn assign_parent(&mut self, parent_id: Option<UnitId>) {
        self.parent_id = parent_id;
        self.touch();
    }

    pub(crate) fn assign_display_name(&mut self, display_name: &str) {
        self.display_name = display_name.trim().to_string();
    }

    pub(crate) fn assign_description(&mut self, description: &str) {
        let description = description.trim();
        self.description = if description.is_empty() {
            None
        } else {
            Some(description.to_string())
        };
    }

    pub(crate) fn assign_deletion(&mut self, deletion: DeletionState) {
        self.deletion = deletion;
        self.touch();
    }

    pub(crate) fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn grade(school_id: SchoolId) -> AcademicUnit {
        AcademicUnit::new(school_id, UnitType::Grade, "Grade 1", "G1").unwrap()
    }

    #[test]
    fn test_unit_creation() {
        let school_id = SchoolId::new();
        let unit = grade(school_id).with_description("  First grade ");

        assert!(!unit.id().is_zero());
        assert!(unit.is_root());
        assert_eq!(unit.school_id(), school_id);
        assert_eq!(unit.unit_type(), UnitType::Grade);
        assert_eq!(unit.display_name(), "Grade 1");
        assert_eq!(unit.code(), "G1");
        assert_eq!(unit.description(), Some("First grade"));
        assert!(!unit.is_deleted());
        assert!(unit.children().is_empty());
        assert_eq!(unit.children_state(), ChildrenState::Unloaded);
    }

    #[test]
    fn test_unit_creation_validation() {
        assert!(matches!(
            AcademicUnit::new(SchoolId::nil(), UnitType::Grade, "Grade 1", "G1"),
            Err(DomainError::Validation(_))
        ));
        assert!(matches!(
            AcademicUnit::new(SchoolId::new(), UnitType::Grade, "G1", "G1"),
            Err(DomainError::Validation(_))
        ));
        assert!(AcademicUnit::new(SchoolId::new(), UnitType::Grade, "  ab  ", "G1").is_err());
    }

    #[test]
    fn test_record_round_trip_preserves_deletion() {
        let mut unit = grade(SchoolId::new());
        unit.soft_delete().unwrap();

        let record = unit.to_record();
        assert!(record.deleted_at.is_some());

        let rebuilt = AcademicUnit::from_record(record).unwrap();
        assert!(rebuilt.is_deleted());
        assert_eq!(rebuilt.deleted_at(), unit.deleted_at());
        assert_eq!(rebuilt, unit);
    }

    #[test]
    fn test_from_record_rejects_self_parent() {
        let unit = grade(SchoolId::new());
        let mut record = unit.to_record();
        record.parent_unit_id = Some(record.id);
        assert!(matches!(
            AcademicUnit::from_record(record),
            Err(DomainError::BusinessRule(_))
        ));
    }

    #[test]
    fn test_metadata_snapshot() {
        let mut unit = grade(SchoolId::new());
        unit.set_metadata("room", json!("B12")).unwrap();

        let mut copy = unit.metadata();
        copy.insert("room", json!("C3")).unwrap();
        copy.insert("extra", json!(true)).unwrap();

        let current = unit.metadata();
        assert_eq!(current.get("room"), Some(&json!("B12")));
        assert!(!current.contains_key("extra"));
    }

    #[test]
    fn test_deletion_state() {
        assert_eq!(DeletionState::from_timestamp(None), DeletionState::Active);
        let at = Utc::now();
        let state = DeletionState::from_timestamp(Some(at));
        assert!(state.is_deleted());
        assert_eq!(state.deleted_at(), Some(at));
    }

    #[test]
    fn test_serialization_skips_children() {
        let school_id = SchoolId::new();
        let mut parent = grade(school_id);
        let mut section = AcademicUnit::new(school_id, UnitType::Section, "Section A", "G1-A").unwrap();
        section.set_parent(parent.id(), parent.unit_type()).unwrap();
        parent.add_child(section).unwrap();

        let json = serde_json::to_value(&parent).unwrap();
        assert!(json.get("children").is_none());
        assert_eq!(json["unit_type"], "grade");

        let back: AcademicUnit = serde_json::from_value(json).unwrap();
        assert!(back.children().is_empty());
        assert_eq!(back.children_state(), ChildrenState::Unloaded);
    }
}
