//! Hierarchy rules for academic units.

use chrono::Utc;

use crate::error::{DomainError, DomainResult};
use crate::ids::UnitId;
use crate::unit::{validate_display_name, AcademicUnit, ChildrenState, DeletionState};
use crate::unit_type::UnitType;

/// Stateless rule engine for the academic unit tree.
///
/// Every operation validates before it mutates and reports the first
/// violated rule. The checks in [`validate_parent`](Self::validate_parent)
/// are shared with the stores so that creation and subtree moves follow the
/// same policy as [`set_parent`](Self::set_parent).
#[derive(Debug, Clone, Copy, Default)]
pub struct AcademicUnitDomainService;

impl AcademicUnitDomainService {
    pub const fn new() -> Self {
        Self
    }

    /// Checks that a unit of `unit_type` may be placed beneath a parent.
    ///
    /// Checks run in a fixed order: self-parenting, then whether the parent
    /// type can have children at all, then type compatibility.
    pub fn validate_parent(
        &self,
        unit_id: UnitId,
        unit_type: UnitType,
        parent_id: UnitId,
        parent_type: UnitType,
    ) -> DomainResult<()> {
        if parent_id.is_zero() {
            return Err(DomainError::validation("parent id is required"));
        }
        if unit_id == parent_id {
            return Err(DomainError::business("unit cannot be its own parent"));
        }
        if !parent_type.can_have_children() {
            return Err(DomainError::business(format!(
                "unit type {} cannot have children",
                parent_type
            )));
        }
        if !parent_type.can_have_child(unit_type) {
            return Err(DomainError::business(format!(
                "unit type {} cannot be a child of {}",
                unit_type, parent_type
            )));
        }
        Ok(())
    }

    /// Points `unit` at a new parent and bumps `updated_at`.
    pub fn set_parent(
        &self,
        unit: &mut AcademicUnit,
        parent_id: UnitId,
        parent_type: UnitType,
    ) -> DomainResult<()> {
        self.validate_parent(unit.id(), unit.unit_type(), parent_id, parent_type)?;
        unit.assign_parent(Some(parent_id));
        Ok(())
    }

    /// Detaches `unit` from its parent, making it a root.
    pub fn remove_parent(&self, unit: &mut AcademicUnit) {
        unit.assign_parent(None);
    }

    /// Attaches `child` to the in-memory child list of `parent`.
    ///
    /// The child must already point at `parent` (see [`set_parent`](Self::set_parent)).
    /// Appending is the only side effect; `updated_at` is left alone.
    pub fn add_child(&self, parent: &mut AcademicUnit, child: AcademicUnit) -> DomainResult<()> {
        let parent_type = parent.unit_type();
        if !parent_type.can_have_children() {
            return Err(DomainError::business(format!(
                "unit type {} cannot have children",
                parent_type
            )));
        }
        if child.id() == parent.id() {
            return Err(DomainError::business("unit cannot be its own child"));
        }
        if !parent_type.can_have_child(child.unit_type()) {
            return Err(DomainError::business(format!(
                "unit type {} cannot be a child of {}",
                child.unit_type(),
                parent_type
            )));
        }
        match child.parent_id() {
            None => {
                return Err(DomainError::business("child unit has no parent set"));
            }
            Some(pid) if pid != parent.id() => {
                return Err(DomainError::business(format!(
                    "child unit belongs to parent {}, not {}",
                    pid,
                    parent.id()
                )));
            }
            Some(_) => {}
        }
        if parent.has_child(child.id()) {
            return Err(DomainError::business(format!(
                "child unit {} already added",
                child.id()
            )));
        }

        parent.children.push(child);
        if parent.children_state == ChildrenState::Unloaded {
            parent.children_state = ChildrenState::Partial;
        }
        Ok(())
    }

    /// Detaches a child from the in-memory list and returns it.
    pub fn remove_child(&self, parent: &mut AcademicUnit, child_id: UnitId) -> DomainResult<AcademicUnit> {
        if child_id.is_zero() {
            return Err(DomainError::validation("child id is required"));
        }
        let position = parent
            .children
            .iter()
            .position(|c| c.id() == child_id)
            .ok_or_else(|| DomainError::not_found("child unit", child_id))?;

        let removed = parent.children.remove(position);
        parent.touch();
        Ok(removed)
    }

    /// Pre-order walk of the in-memory subtree, excluding `unit` itself.
    ///
    /// Direct children come in insertion order, each followed by its own
    /// descendants. Only covers what has been attached in memory.
    pub fn get_all_descendants<'a>(&self, unit: &'a AcademicUnit) -> Vec<&'a AcademicUnit> {
        let mut out = Vec::new();
        collect_descendants(unit, &mut out);
        out
    }

    /// Height of the in-memory tree below `unit`: 0 for a leaf.
    pub fn get_depth(&self, unit: &AcademicUnit) -> usize {
        unit.children()
            .iter()
            .map(|c| 1 + self.get_depth(c))
            .max()
            .unwrap_or(0)
    }

    /// Updates the display name and/or description.
    ///
    /// At least one must be supplied. An empty display name counts as not
    /// supplied; an empty description clears it.
    pub fn update_info(
        &self,
        unit: &mut AcademicUnit,
        display_name: Option<&str>,
        description: Option<&str>,
    ) -> DomainResult<()> {
        let display_name = display_name.filter(|name| !name.trim().is_empty());
        if display_name.is_none() && description.is_none() {
            return Err(DomainError::validation(
                "at least one of display name or description must be provided",
            ));
        }
        if let Some(name) = display_name {
            validate_display_name(name)?;
        }

        if let Some(name) = display_name {
            unit.assign_display_name(name);
        }
        if let Some(description) = description {
            unit.assign_description(description);
        }
        unit.touch();
        Ok(())
    }

    pub fn update_display_name(&self, unit: &mut AcademicUnit, display_name: &str) -> DomainResult<()> {
        validate_display_name(display_name)?;
        unit.assign_display_name(display_name);
        unit.touch();
        Ok(())
    }

    pub fn soft_delete(&self, unit: &mut AcademicUnit) -> DomainResult<()> {
        if unit.is_deleted() {
            return Err(DomainError::business(format!("unit {} is already deleted", unit.id())));
        }
        unit.assign_deletion(DeletionState::Deleted { at: Utc::now() });
        Ok(())
    }

    pub fn restore(&self, unit: &mut AcademicUnit) -> DomainResult<()> {
        if !unit.is_deleted() {
            return Err(DomainError::business(format!("unit {} is not deleted", unit.id())));
        }
        unit.assign_deletion(DeletionState::Active);
        Ok(())
    }
}

fn collect_descendants<'a>(unit: &'a AcademicUnit, out: &mut Vec<&'a AcademicUnit>) {
    for child in unit.children() {
        out.push(child);
        collect_descendants(child, out);
    }
}
