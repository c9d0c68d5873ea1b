//! In-memory tree materialization
//!
//! Turns a flat descendant scan from storage back into a linked
//! [`AcademicUnit`] tree, so in-memory traversals
//! ([`AcademicUnit::all_descendants`], [`AcademicUnit::depth`]) see the full
//! persisted subtree.

use std::collections::{HashMap, HashSet};

use crate::error::{DomainError, DomainResult};
use crate::ids::UnitId;
use crate::services::AcademicUnitDomainService;
use crate::unit::{AcademicUnit, ChildrenState};

/// Attaches `descendants` beneath `root` and marks every node complete.
///
/// `descendants` may come in any order; siblings keep their relative order
/// from the input, so a path-ordered scan yields a stable tree. Any child
/// list already attached to `root` is replaced.
///
/// # Errors
///
/// - `Validation` if an id appears twice (including the root)
/// - `BusinessRule` if a descendant has no parent, or its parent is not part
///   of the subtree, or the parent/child types are incompatible
///
/// # Examples
///
/// ```
/// use campus_org::{materialize_subtree, AcademicUnit, ChildrenState, SchoolId, UnitType};
///
/// let school = SchoolId::new();
/// let grade = AcademicUnit::new(school, UnitType::Grade, "Grade 1", "G1").unwrap();
/// let mut section = AcademicUnit::new(school, UnitType::Section, "Section A", "G1-A").unwrap();
/// section.set_parent(grade.id(), grade.unit_type()).unwrap();
///
/// let tree = materialize_subtree(grade, vec![section]).unwrap();
/// assert_eq!(tree.children().len(), 1);
/// assert_eq!(tree.children_state(), ChildrenState::Complete);
/// ```
pub fn materialize_subtree(mut root: AcademicUnit, descendants: Vec<AcademicUnit>) -> DomainResult<AcademicUnit> {
    let mut seen: HashSet<UnitId> = HashSet::with_capacity(descendants.len() + 1);
    seen.insert(root.id());
    for unit in &descendants {
        if !seen.insert(unit.id()) {
            return Err(DomainError::validation(format!(
                "unit {} appears more than once in subtree",
                unit.id()
            )));
        }
    }

    let mut by_parent: HashMap<UnitId, Vec<AcademicUnit>> = HashMap::new();
    for unit in descendants {
        let parent_id = unit.parent_id().ok_or_else(|| {
            DomainError::business(format!("descendant {} has no parent", unit.id()))
        })?;
        if !seen.contains(&parent_id) {
            return Err(DomainError::business(format!(
                "orphan unit {}: parent {} is outside the subtree",
                unit.id(),
                parent_id
            )));
        }
        by_parent.entry(parent_id).or_default().push(unit);
    }

    root.children.clear();
    attach(&mut root, &mut by_parent)?;

    // Whatever is left hangs off a cycle that never reaches the root.
    if let Some(stray) = by_parent.values().flatten().next() {
        return Err(DomainError::business(format!(
            "orphan unit {}: not reachable from root {}",
            stray.id(),
            root.id()
        )));
    }
    Ok(root)
}

fn attach(node: &mut AcademicUnit, by_parent: &mut HashMap<UnitId, Vec<AcademicUnit>>) -> DomainResult<()> {
    if let Some(children) = by_parent.remove(&node.id()) {
        for mut child in children {
            child.children.clear();
            attach(&mut child, by_parent)?;
            AcademicUnitDomainService.add_child(node, child)?;
        }
    }
    node.children_state = ChildrenState::Complete;
    Ok(())
}
