//! Hierarchy scenarios run against every store backend.
//!
//! Each scenario is an async fn taking an `Arc<dyn CampusStore>`; the
//! `backend_tests!` macro instantiates it once per backend.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use chrono::{Duration, Utc};

use campus_org::{
    AcademicUnit, DomainError, MembershipRole, School, SchoolId, UnitId, UnitMembership, UnitType, UserId,
};
use campus_rbac::Permission;
use campus_store::{CampusService, CampusStore, MemoryStore, NewUnit, StoreError, UnitPath};

fn memory_store() -> Arc<dyn CampusStore> {
    Arc::new(MemoryStore::new())
}

#[cfg(feature = "sqlite")]
fn sqlite_store() -> Arc<dyn CampusStore> {
    Arc::new(campus_store::SqliteStore::open_in_memory().unwrap())
}

macro_rules! backend_tests {
    ($($scenario:ident),* $(,)?) => {
        mod memory {
            $(
                #[tokio::test]
                async fn $scenario() {
                    super::$scenario(super::memory_store()).await;
                }
            )*
        }

        #[cfg(feature = "sqlite")]
        mod sqlite {
            $(
                #[tokio::test]
                async fn $scenario() {
                    super::$scenario(super::sqlite_store()).await;
                }
            )*
        }
    };
}

backend_tests!(
    acme_grade_section,
    move_round_trip,
    promote_and_return,
    depth_is_monotonic,
    cycles_and_self_moves_are_rejected,
    invalid_moves_leave_paths_untouched,
    move_to_current_parent_is_noop,
    deleted_units_stay_visible_to_queries,
    deleted_parent_blocks_placement,
    path_lookups,
    school_rules,
    unit_updates,
    membership_persistence,
    permissions_follow_moves,
);

// ---- helpers ----

async fn school(store: &Arc<dyn CampusStore>, name: &str, code: &str) -> School {
    let school = School::new(name, code).unwrap();
    store.create_school(&school).await.unwrap();
    school
}

async fn unit(
    store: &Arc<dyn CampusStore>,
    school: &School,
    parent: Option<&AcademicUnit>,
    unit_type: UnitType,
    name: &str,
) -> AcademicUnit {
    let mut unit = AcademicUnit::new(school.id(), unit_type, name, name).unwrap();
    if let Some(parent) = parent {
        unit.set_parent(parent.id(), parent.unit_type()).unwrap();
    }
    store.create_unit(&unit).await.unwrap();
    unit
}

fn ids(units: &[AcademicUnit]) -> Vec<UnitId> {
    units.iter().map(AcademicUnit::id).collect()
}

fn id_set(units: &[AcademicUnit]) -> BTreeSet<UnitId> {
    units.iter().map(AcademicUnit::id).collect()
}

async fn all_paths(store: &Arc<dyn CampusStore>, school: SchoolId) -> HashMap<UnitId, UnitPath> {
    let mut paths = HashMap::new();
    for u in store.find_by_school(school).await.unwrap() {
        paths.insert(u.id(), store.find_path(u.id()).await.unwrap());
    }
    paths
}

fn business_message(err: StoreError) -> String {
    match err {
        StoreError::Domain(DomainError::BusinessRule(message)) => message,
        other => panic!("expected a business rule violation, got {other:?}"),
    }
}

/// Main Campus
/// ├─ Grade 1
/// │  ├─ Section 1A
/// │  └─ Section 1B
/// ├─ Grade 2
/// └─ Chess Club
/// North Campus
struct Campus {
    school: School,
    main: AcademicUnit,
    g1: AcademicUnit,
    s1a: AcademicUnit,
    s1b: AcademicUnit,
    g2: AcademicUnit,
    club: AcademicUnit,
    north: AcademicUnit,
}

async fn campus(store: &Arc<dyn CampusStore>) -> Campus {
    let school = school(store, "Acme", "ACM").await;
    let main = unit(store, &school, None, UnitType::School, "Main Campus").await;
    let g1 = unit(store, &school, Some(&main), UnitType::Grade, "Grade 1").await;
    let s1a = unit(store, &school, Some(&g1), UnitType::Section, "Section 1A").await;
    let s1b = unit(store, &school, Some(&g1), UnitType::Section, "Section 1B").await;
    let g2 = unit(store, &school, Some(&main), UnitType::Grade, "Grade 2").await;
    let club = unit(store, &school, Some(&main), UnitType::Club, "Chess Club").await;
    let north = unit(store, &school, None, UnitType::School, "North Campus").await;
    Campus {
        school,
        main,
        g1,
        s1a,
        s1b,
        g2,
        club,
        north,
    }
}

// ---- scenarios ----

async fn acme_grade_section(store: Arc<dyn CampusStore>) {
    let acme = school(&store, "Acme", "ACM").await;
    let mut grade = AcademicUnit::new(acme.id(), UnitType::Grade, "Grade 1", "G1").unwrap();
    store.create_unit(&grade).await.unwrap();

    let mut section = AcademicUnit::new(acme.id(), UnitType::Section, "Section A", "G1-A").unwrap();
    section.set_parent(grade.id(), grade.unit_type()).unwrap();
    store.create_unit(&section).await.unwrap();
    grade.add_child(section.clone()).unwrap();

    assert!(grade.can_have_children());
    assert!(!section.can_have_children());
    assert_eq!(grade.depth(), 1);

    let children = store.find_children(grade.id()).await.unwrap();
    assert_eq!(ids(&children), vec![section.id()]);
    assert_eq!(children[0].display_name(), "Section A");
    assert_eq!(children[0].code(), "G1-A");
    assert_eq!(children[0].parent_id(), Some(grade.id()));
}

async fn move_round_trip(store: Arc<dyn CampusStore>) {
    let c = campus(&store).await;
    let before = id_set(&store.find_descendants(c.g1.id()).await.unwrap());
    assert_eq!(before, BTreeSet::from([c.s1a.id(), c.s1b.id()]));

    let new_path = store.move_subtree(c.g1.id(), Some(c.north.id())).await.unwrap();
    assert_eq!(new_path.ids(), &[c.north.id(), c.g1.id()]);

    let ancestors = store.find_ancestors(c.g1.id()).await.unwrap();
    assert_eq!(ids(&ancestors), vec![c.north.id()]);

    let after = store.find_descendants(c.g1.id()).await.unwrap();
    assert_eq!(id_set(&after), before);
    for d in &after {
        let path = store.find_path(d.id()).await.unwrap();
        assert!(new_path.is_ancestor_of(&path));
        assert_eq!(path.ids(), &[c.north.id(), c.g1.id(), d.id()]);
        let chain = ids(&store.find_ancestors(d.id()).await.unwrap());
        assert_eq!(chain, vec![c.north.id(), c.g1.id()]);
    }

    assert_eq!(store.find_unit(c.g1.id()).await.unwrap().parent_id(), Some(c.north.id()));
    assert_eq!(
        id_set(&store.find_descendants(c.main.id()).await.unwrap()),
        BTreeSet::from([c.g2.id(), c.club.id()])
    );
}

async fn promote_and_return(store: Arc<dyn CampusStore>) {
    let c = campus(&store).await;

    let root_path = store.move_subtree(c.g1.id(), None).await.unwrap();
    assert_eq!(root_path, UnitPath::root(c.g1.id()));
    assert!(store.find_ancestors(c.g1.id()).await.unwrap().is_empty());
    assert!(store.find_unit(c.g1.id()).await.unwrap().is_root());
    assert_eq!(store.find_path(c.s1a.id()).await.unwrap().depth(), 2);
    assert_eq!(store.find_children(c.g1.id()).await.unwrap().len(), 2);

    store.move_subtree(c.g1.id(), Some(c.main.id())).await.unwrap();
    assert_eq!(
        store.find_path(c.s1b.id()).await.unwrap().ids(),
        &[c.main.id(), c.g1.id(), c.s1b.id()]
    );
    assert_eq!(store.find_descendants(c.main.id()).await.unwrap().len(), 5);
}

async fn depth_is_monotonic(store: Arc<dyn CampusStore>) {
    let c = campus(&store).await;
    store.move_subtree(c.g1.id(), Some(c.north.id())).await.unwrap();

    let mut depth_of: HashMap<UnitId, usize> = HashMap::new();
    for depth in 1..=4 {
        for u in store.find_by_school_and_depth(c.school.id(), depth).await.unwrap() {
            assert!(depth_of.insert(u.id(), depth).is_none());
        }
    }
    assert_eq!(depth_of.len(), 7);

    for (&id, &k) in &depth_of {
        for d in store.find_descendants(id).await.unwrap() {
            assert!(depth_of[&d.id()] > k);
        }
    }
    assert!(store.find_by_school_and_depth(c.school.id(), 0).await.is_err());
}

async fn cycles_and_self_moves_are_rejected(store: Arc<dyn CampusStore>) {
    let c = campus(&store).await;
    let before = all_paths(&store, c.school.id()).await;

    let msg = business_message(store.move_subtree(c.g1.id(), Some(c.g1.id())).await.unwrap_err());
    assert!(msg.contains("cannot be its own parent"));

    let msg = business_message(store.move_subtree(c.main.id(), Some(c.g1.id())).await.unwrap_err());
    assert!(msg.contains("own descendant"));

    let msg = business_message(store.move_subtree(c.main.id(), Some(c.s1a.id())).await.unwrap_err());
    assert!(msg.contains("own descendant"));

    assert_eq!(all_paths(&store, c.school.id()).await, before);
}

async fn invalid_moves_leave_paths_untouched(store: Arc<dyn CampusStore>) {
    let c = campus(&store).await;
    let before = all_paths(&store, c.school.id()).await;

    // leaf types take no children
    let msg = business_message(store.move_subtree(c.s1a.id(), Some(c.club.id())).await.unwrap_err());
    assert!(msg.contains("cannot have children"));

    // sections only live under grades
    let msg = business_message(store.move_subtree(c.s1a.id(), Some(c.main.id())).await.unwrap_err());
    assert!(msg.contains("cannot be a child of"));

    // other schools are off limits
    let other = school(&store, "Other", "OTH").await;
    let foreign = unit(&store, &other, None, UnitType::School, "Other Campus").await;
    let msg = business_message(store.move_subtree(c.g2.id(), Some(foreign.id())).await.unwrap_err());
    assert!(msg.contains("another school"));

    // unknown ids
    assert!(store.move_subtree(UnitId::new(), None).await.unwrap_err().is_not_found());
    assert!(store
        .move_subtree(c.g2.id(), Some(UnitId::new()))
        .await
        .unwrap_err()
        .is_not_found());

    assert_eq!(all_paths(&store, c.school.id()).await, before);
}

async fn move_to_current_parent_is_noop(store: Arc<dyn CampusStore>) {
    let c = campus(&store).await;
    let before = store.find_unit(c.g1.id()).await.unwrap();
    let path = store.move_subtree(c.g1.id(), Some(c.main.id())).await.unwrap();
    assert_eq!(path.ids(), &[c.main.id(), c.g1.id()]);
    assert_eq!(store.find_unit(c.g1.id()).await.unwrap(), before);

    let root = store.move_subtree(c.north.id(), None).await.unwrap();
    assert_eq!(root, UnitPath::root(c.north.id()));
}

async fn deleted_units_stay_visible_to_queries(store: Arc<dyn CampusStore>) {
    let c = campus(&store).await;
    let mut s1a = store.find_unit(c.s1a.id()).await.unwrap();
    s1a.soft_delete().unwrap();
    store.update_unit(&s1a).await.unwrap();

    let stored = store.find_unit(c.s1a.id()).await.unwrap();
    assert!(stored.is_deleted());
    assert_eq!(stored.deleted_at(), s1a.deleted_at());
    assert!(ids(&store.find_children(c.g1.id()).await.unwrap()).contains(&c.s1a.id()));
    assert_eq!(store.find_descendants(c.main.id()).await.unwrap().len(), 5);

    // deleted nodes move with their subtree
    store.move_subtree(c.g1.id(), Some(c.north.id())).await.unwrap();
    assert_eq!(store.find_path(c.s1a.id()).await.unwrap().first(), c.north.id());
}

async fn deleted_parent_blocks_placement(store: Arc<dyn CampusStore>) {
    let c = campus(&store).await;
    let mut g2 = store.find_unit(c.g2.id()).await.unwrap();
    g2.soft_delete().unwrap();
    store.update_unit(&g2).await.unwrap();

    let mut section = AcademicUnit::new(c.school.id(), UnitType::Section, "Section 2A", "G2-A").unwrap();
    section.set_parent(g2.id(), g2.unit_type()).unwrap();
    let msg = business_message(store.create_unit(&section).await.unwrap_err());
    assert!(msg.contains("deleted"));

    let msg = business_message(store.move_subtree(c.s1a.id(), Some(g2.id())).await.unwrap_err());
    assert!(msg.contains("deleted"));
}

async fn path_lookups(store: Arc<dyn CampusStore>) {
    let c = campus(&store).await;
    let path = store.find_path(c.s1b.id()).await.unwrap();
    assert_eq!(path.ids(), &[c.main.id(), c.g1.id(), c.s1b.id()]);
    assert_eq!(store.find_by_path(&path).await.unwrap().id(), c.s1b.id());

    let parsed: UnitPath = path.to_string().parse().unwrap();
    assert_eq!(store.find_by_path(&parsed).await.unwrap().id(), c.s1b.id());

    let dangling = UnitPath::root(c.main.id()).child(UnitId::new());
    assert!(store.find_by_path(&dangling).await.unwrap_err().is_not_found());
    assert!(store.find_unit(UnitId::new()).await.unwrap_err().is_not_found());
    assert!(store.find_children(UnitId::new()).await.unwrap_err().is_not_found());
    assert!(store.find_ancestors(UnitId::new()).await.unwrap_err().is_not_found());

    let by_school = ids(&store.find_by_school(c.school.id()).await.unwrap());
    assert_eq!(by_school.len(), 7);
    let main_pos = by_school.iter().position(|id| *id == c.main.id()).unwrap();
    let g1_pos = by_school.iter().position(|id| *id == c.g1.id()).unwrap();
    assert!(main_pos < g1_pos);
}

async fn school_rules(store: Arc<dyn CampusStore>) {
    let acme = school(&store, "Acme", "ACM").await;
    let beta = school(&store, "Beta School", "BET").await;

    let dup = School::new("Acme Again", "ACM").unwrap();
    assert!(matches!(store.create_school(&dup).await, Err(StoreError::Conflict(_))));

    let codes: Vec<String> = store
        .list_schools()
        .await
        .unwrap()
        .iter()
        .map(|s| s.code().to_string())
        .collect();
    assert_eq!(codes, vec!["ACM", "BET"]);

    let mut renamed = store.find_school(beta.id()).await.unwrap();
    renamed.update_info(None, Some("ACM"), None).unwrap();
    assert!(matches!(store.update_school(&renamed).await, Err(StoreError::Conflict(_))));

    let mut contact = store.find_school_by_code("BET").await.unwrap();
    contact.set_contact(Some("office@beta.edu"), "555-0100").unwrap();
    store.update_school(&contact).await.unwrap();
    let reloaded = store.find_school(beta.id()).await.unwrap();
    assert_eq!(reloaded.contact_email(), Some("office@beta.edu"));
    assert_eq!(reloaded, contact);

    unit(&store, &acme, None, UnitType::Grade, "Grade 1").await;
    assert!(matches!(
        store.delete_school(acme.id()).await,
        Err(StoreError::Domain(DomainError::BusinessRule(_)))
    ));
    store.delete_school(beta.id()).await.unwrap();
    assert!(store.find_school(beta.id()).await.unwrap_err().is_not_found());
}

async fn unit_updates(store: Arc<dyn CampusStore>) {
    let c = campus(&store).await;
    let mut g2 = store.find_unit(c.g2.id()).await.unwrap();
    g2.update_info(Some("Second Grade"), Some("Ages 7-8")).unwrap();
    g2.set_metadata("room", serde_json::json!(12)).unwrap();
    store.update_unit(&g2).await.unwrap();

    let stored = store.find_unit(c.g2.id()).await.unwrap();
    assert_eq!(stored, g2);
    assert_eq!(stored.description(), Some("Ages 7-8"));
    assert_eq!(stored.metadata().get("room"), Some(&serde_json::json!(12)));

    // codes are unique within a school
    let clash = AcademicUnit::new(c.school.id(), UnitType::Club, "Another Club", "Chess Club").unwrap();
    assert!(matches!(store.create_unit(&clash).await, Err(StoreError::Conflict(_))));

    // parent changes must go through a move
    let mut sneaky = store.find_unit(c.s1a.id()).await.unwrap();
    sneaky.set_parent(c.g2.id(), UnitType::Grade).unwrap();
    assert!(store.update_unit(&sneaky).await.is_err());
    assert_eq!(store.find_unit(c.s1a.id()).await.unwrap().parent_id(), Some(c.g1.id()));
}

async fn membership_persistence(store: Arc<dyn CampusStore>) {
    let c = campus(&store).await;
    let user = UserId::new();
    let start = Utc::now() - Duration::days(10);

    let mut past = UnitMembership::new(c.g1.id(), user, MembershipRole::Student, Some(start)).unwrap();
    past.set_valid_until(start + Duration::days(5)).unwrap();
    past.set_metadata("note", serde_json::json!("transferred")).unwrap();
    let current = UnitMembership::new(c.g1.id(), UserId::new(), MembershipRole::Teacher, Some(start)).unwrap();
    store.create_membership(&past).await.unwrap();
    store.create_membership(&current).await.unwrap();
    assert!(matches!(store.create_membership(&past).await, Err(StoreError::Conflict(_))));

    assert_eq!(store.find_membership(past.id()).await.unwrap(), past);
    assert_eq!(store.find_memberships_by_unit(c.g1.id()).await.unwrap().len(), 2);
    assert_eq!(ids_of(&store.find_memberships_by_user(user).await.unwrap()), vec![past.id()]);

    let now = Utc::now();
    let active = store.find_active_memberships_by_unit(c.g1.id(), now).await.unwrap();
    assert_eq!(ids_of(&active), vec![current.id()]);

    // closed window: the end instant itself is still active
    let at_end = store
        .find_active_memberships_by_unit(c.g1.id(), start + Duration::days(5))
        .await
        .unwrap();
    assert_eq!(at_end.len(), 2);

    let mut ended = store.find_membership(current.id()).await.unwrap();
    ended.expire().unwrap();
    store.update_membership(&ended).await.unwrap();
    let later = Utc::now() + Duration::seconds(1);
    assert!(store.find_active_memberships_by_unit(c.g1.id(), later).await.unwrap().is_empty());

    store.delete_membership(past.id()).await.unwrap();
    assert!(store.find_membership(past.id()).await.unwrap_err().is_not_found());

    let stray = UnitMembership::new(UnitId::new(), user, MembershipRole::Student, None).unwrap();
    assert!(store.create_membership(&stray).await.unwrap_err().is_not_found());
}

fn ids_of(memberships: &[UnitMembership]) -> Vec<campus_org::MembershipId> {
    memberships.iter().map(UnitMembership::id).collect()
}

async fn permissions_follow_moves(store: Arc<dyn CampusStore>) {
    let c = campus(&store).await;
    let service = CampusService::new(store);
    let coordinator = UserId::new();
    service
        .add_member(c.g1.id(), coordinator, MembershipRole::Coordinator, Some(Utc::now() - Duration::hours(1)))
        .await
        .unwrap();
    let now = Utc::now();

    assert!(service
        .effective_permission(coordinator, c.s1a.id(), Permission::ManageMembers, now)
        .await
        .unwrap());

    // move the section away from grade 1: the grant no longer reaches it
    service.move_unit(c.s1a.id(), Some(c.g2.id())).await.unwrap();
    assert!(!service
        .effective_permission(coordinator, c.s1a.id(), Permission::View, now)
        .await
        .unwrap());
    assert!(service
        .effective_permission(coordinator, c.s1b.id(), Permission::Edit, now)
        .await
        .unwrap());

    let tree = service.load_subtree(c.main.id()).await.unwrap();
    assert_eq!(tree.all_descendants().len(), 5);
    assert_eq!(tree.find_in_subtree(c.g2.id()).unwrap().children().len(), 1);
}

#[cfg(feature = "sqlite")]
#[tokio::test]
async fn sqlite_file_survives_reopen() {
    let path = std::env::temp_dir().join(format!("campus-store-{}.db", uuid::Uuid::now_v7().simple()));
    let (grade_id, section_id) = {
        let store: Arc<dyn CampusStore> = Arc::new(campus_store::SqliteStore::open(&path, true).unwrap());
        let acme = school(&store, "Acme", "ACM").await;
        let grade = unit(&store, &acme, None, UnitType::Grade, "Grade 1").await;
        let section = unit(&store, &acme, Some(&grade), UnitType::Section, "Section A").await;
        (grade.id(), section.id())
    };

    let store = campus_store::SqliteStore::open(&path, true).unwrap();
    let children = campus_store::AcademicUnitRepository::find_children(&store, grade_id).await.unwrap();
    assert_eq!(ids(&children), vec![section_id]);
    drop(store);

    for suffix in ["", "-wal", "-shm"] {
        let mut file = path.clone().into_os_string();
        file.push(suffix);
        let _ = std::fs::remove_file(file);
    }
}
