//! Structural checks shared by the store backends.
//!
//! Backends load what they need under their own lock or transaction and hand
//! it here, so both enforce identical placement rules in the same order.

use campus_org::{
    AcademicUnit, AcademicUnitDomainService, DomainError, SchoolId, UnitId, UnitMembership, UnitType,
};

use crate::error::{StoreError, StoreResult};
use crate::path::UnitPath;

/// A stored unit together with its path.
pub(crate) type Placed<'a> = (&'a AcademicUnit, &'a UnitPath);

/// Type, school and liveness checks for placing a unit under `parent`.
fn check_placement(
    unit_id: UnitId,
    unit_type: UnitType,
    school_id: SchoolId,
    parent: &AcademicUnit,
) -> StoreResult<()> {
    AcademicUnitDomainService.validate_parent(unit_id, unit_type, parent.id(), parent.unit_type())?;
    if parent.school_id() != school_id {
        return Err(DomainError::business(format!(
            "parent unit {} belongs to another school",
            parent.id()
        ))
        .into());
    }
    if parent.is_deleted() {
        return Err(DomainError::business(format!(
            "cannot place a unit under deleted unit {}",
            parent.id()
        ))
        .into());
    }
    Ok(())
}

/// Path for a unit about to be inserted.
///
/// `parent` is the stored unit named by `unit.parent_id()`, or `None` when the
/// lookup found nothing.
pub(crate) fn new_unit_path(unit: &AcademicUnit, parent: Option<Placed<'_>>) -> StoreResult<UnitPath> {
    if unit.id().is_zero() {
        return Err(DomainError::validation("unit id cannot be empty").into());
    }
    let Some(parent_id) = unit.parent_id() else {
        return Ok(UnitPath::root(unit.id()));
    };
    let Some((parent, parent_path)) = parent else {
        return Err(StoreError::not_found("parent unit", parent_id));
    };
    check_placement(unit.id(), unit.unit_type(), unit.school_id(), parent)?;
    Ok(parent_path.child(unit.id()))
}

/// New path for `node` when moved under `target` (or to the root when
/// `target` is `None`). `Ok(None)` means the unit is already there.
pub(crate) fn plan_move(
    node: &AcademicUnit,
    node_path: &UnitPath,
    target: Option<Placed<'_>>,
) -> StoreResult<Option<UnitPath>> {
    let Some((parent, parent_path)) = target else {
        if node.parent_id().is_none() {
            return Ok(None);
        }
        return Ok(Some(UnitPath::root(node.id())));
    };

    if parent.id() == node.id() {
        return Err(DomainError::business("unit cannot be its own parent").into());
    }
    if node.parent_id() == Some(parent.id()) {
        return Ok(None);
    }
    if parent_path.starts_with(node_path) {
        return Err(DomainError::business(format!(
            "cannot move unit {} under its own descendant {}",
            node.id(),
            parent.id()
        ))
        .into());
    }
    check_placement(node.id(), node.unit_type(), node.school_id(), parent)?;
    Ok(Some(parent_path.child(node.id())))
}

/// Rejects changes to the fields an in-place update may not touch.
pub(crate) fn check_unit_update(stored: &AcademicUnit, incoming: &AcademicUnit) -> StoreResult<()> {
    if stored.parent_id() != incoming.parent_id() {
        return Err(DomainError::business(format!(
            "parent of unit {} can only change through a subtree move",
            stored.id()
        ))
        .into());
    }
    if stored.school_id() != incoming.school_id() {
        return Err(DomainError::business("unit cannot change school").into());
    }
    if stored.unit_type() != incoming.unit_type() {
        return Err(DomainError::business("unit type cannot change").into());
    }
    Ok(())
}

/// Rejects a soft delete while any child of `unit` is still live.
pub(crate) fn check_soft_delete(unit: &AcademicUnit, live_children: usize) -> StoreResult<()> {
    if live_children > 0 {
        return Err(DomainError::business(format!(
            "unit {} still has {} active children",
            unit.id(),
            live_children
        ))
        .into());
    }
    Ok(())
}

/// Rejects a restore while the stored parent of `unit` is deleted.
pub(crate) fn check_restore(unit: &AcademicUnit, parent: Option<&AcademicUnit>) -> StoreResult<()> {
    match parent {
        Some(parent) if parent.is_deleted() => Err(DomainError::business(format!(
            "cannot restore unit {} while parent {} is deleted",
            unit.id(),
            parent.id()
        ))
        .into()),
        _ => Ok(()),
    }
}

/// Closed validity windows: a membership ending at `t` overlaps one
/// starting at `t`.
pub(crate) fn windows_overlap(a: &UnitMembership, b: &UnitMembership) -> bool {
    let a_before_b_ends = b.valid_until().map_or(true, |end| a.valid_from() <= end);
    let b_before_a_ends = a.valid_until().map_or(true, |end| b.valid_from() <= end);
    a_before_b_ends && b_before_a_ends
}

/// A user holds at most one membership per unit for any point in time.
///
/// `existing` are the stored memberships of the same unit; `membership`
/// itself is skipped so updates can be checked against the same list.
pub(crate) fn check_no_overlap(membership: &UnitMembership, existing: &[UnitMembership]) -> StoreResult<()> {
    let clash = existing.iter().find(|other| {
        other.id() != membership.id()
            && other.user_id() == membership.user_id()
            && other.unit_id() == membership.unit_id()
            && windows_overlap(other, membership)
    });
    if let Some(other) = clash {
        return Err(StoreError::conflict(format!(
            "user {} already has membership {} in unit {} for an overlapping period",
            membership.user_id(),
            other.id(),
            membership.unit_id()
        )));
    }
    Ok(())
}
