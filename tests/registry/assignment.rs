use sporttag::store::Filter;
use sporttag::{AssignmentRequest, DocumentStore, InMemoryStore, RegistryError, SquadAssignment};

use crate::support::{registry, registry_with, ContendedStore};

#[tokio::test]
async fn assign_places_child_in_squad() {
    let (registry, store) = registry();

    let receipt = registry
        .assign(AssignmentRequest::new("c1", "riege-3", 2))
        .await
        .unwrap();
    assert_eq!(receipt.version, 1);

    let stored = store
        .find::<SquadAssignment>(&SquadAssignment::child_filter("c1"))
        .await
        .unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].data.squad_id, "riege-3");
    assert_eq!(stored[0].data.position, 2);
    assert!(registry.locks().is_empty());
}

#[tokio::test]
async fn child_belongs_to_at_most_one_squad() {
    let (registry, store) = registry();
    registry
        .assign(AssignmentRequest::new("c1", "riege-1", 1))
        .await
        .unwrap();

    let err = registry
        .assign(AssignmentRequest::new("c1", "riege-2", 1))
        .await
        .unwrap_err();
    assert!(matches!(err, RegistryError::DuplicateRecord(_)), "{err}");
    assert_eq!(
        store.find::<SquadAssignment>(&Filter::new()).await.unwrap().len(),
        1
    );
}

#[tokio::test]
async fn position_must_be_positive() {
    let (registry, store) = registry();

    let err = registry
        .assign(AssignmentRequest::new("c1", "riege-1", 0))
        .await
        .unwrap_err();
    assert!(matches!(err, RegistryError::InvalidInput(_)), "{err}");
    assert_eq!(store.writes(), 0);
}

#[tokio::test]
async fn reposition_moves_within_squad() {
    let (registry, store) = registry();
    let assigned = registry
        .assign(AssignmentRequest::new("c1", "riege-1", 1))
        .await
        .unwrap();

    let moved = registry
        .reposition(AssignmentRequest::new("c1", "riege-1", 4))
        .await
        .unwrap();
    assert_eq!(moved.id, assigned.id);
    assert_eq!(moved.version, 2);

    let stored = store
        .find::<SquadAssignment>(&SquadAssignment::child_filter("c1"))
        .await
        .unwrap();
    assert_eq!(stored[0].data.position, 4);
}

#[tokio::test]
async fn reposition_in_other_squad_is_not_found() {
    let (registry, _) = registry();
    registry
        .assign(AssignmentRequest::new("c1", "riege-1", 1))
        .await
        .unwrap();

    let err = registry
        .reposition(AssignmentRequest::new("c1", "riege-2", 3))
        .await
        .unwrap_err();
    assert!(matches!(err, RegistryError::NotFound(_)), "{err}");
}

#[tokio::test]
async fn unassign_frees_the_child() {
    let (registry, store) = registry();
    registry
        .assign(AssignmentRequest::new("c1", "riege-1", 1))
        .await
        .unwrap();

    registry
        .unassign(AssignmentRequest::new("c1", "riege-1", 0))
        .await
        .unwrap();
    assert!(store
        .find::<SquadAssignment>(&Filter::new())
        .await
        .unwrap()
        .is_empty());

    let err = registry
        .unassign(AssignmentRequest::new("c1", "riege-1", 0))
        .await
        .unwrap_err();
    assert!(matches!(err, RegistryError::NotFound(_)), "{err}");

    registry
        .assign(AssignmentRequest::new("c1", "riege-2", 1))
        .await
        .unwrap();
}

#[tokio::test]
async fn held_child_lock_blocks_assignment() {
    let (registry, _) = registry();
    let _guard = registry
        .locks()
        .try_acquire(&SquadAssignment::lock_key("c1"))
        .unwrap()
        .unwrap();

    let err = registry
        .assign(AssignmentRequest::new("c1", "riege-1", 1))
        .await
        .unwrap_err();
    assert!(matches!(err, RegistryError::AlreadyInProgress(_)), "{err}");

    registry
        .assign(AssignmentRequest::new("c2", "riege-1", 1))
        .await
        .unwrap();
}

#[tokio::test]
async fn reposition_reports_the_stored_version() {
    let store = InMemoryStore::new();
    let (registry, _) = registry_with(ContendedStore::new(store.clone()));
    let assigned = registry
        .assign(AssignmentRequest::new("c1", "riege-1", 1))
        .await
        .unwrap();

    let moved = registry
        .reposition(AssignmentRequest::new("c1", "riege-1", 2))
        .await
        .unwrap();

    let stored = store.find::<SquadAssignment>(&Filter::new()).await.unwrap();
    assert_eq!(moved.id, assigned.id);
    assert_eq!(stored[0].version, 3);
    assert_eq!(moved.version, stored[0].version);
    assert_eq!(stored[0].data.position, 2);
}
