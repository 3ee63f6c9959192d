mod common;

use common::{remote_sync, writes};
use dashmanager_core::{
    ChangeKind, Collection, FieldErrorKind, GroupDraft, PersonDraft, SyncError,
};
use std::sync::{Arc, Mutex};

#[test]
fn add_person_persists_and_reloads() {
    let (mut sync, _faults) = remote_sync();

    let mut draft = PersonDraft::new("  Ana Souza ", "ana@example.com");
    draft.phone = Some("+55 11 99999-0000".to_string());
    let person = sync.add_person(draft).unwrap();

    assert_eq!(person.name, "Ana Souza");
    assert_eq!(sync.people(), &[person.clone()]);

    let summary = sync.load();
    assert_eq!(summary.people, 1);
    assert_eq!(summary.failed_collections, 0);
    assert_eq!(sync.person(&person.id), Some(&person));
}

#[test]
fn invalid_person_is_rejected_without_store_calls() {
    let (mut sync, faults) = remote_sync();

    let err = sync
        .add_person(PersonDraft::new("", "not-an-email"))
        .unwrap_err();

    match err {
        SyncError::Validation(errors) => {
            assert_eq!(errors.for_field("name").unwrap().kind, FieldErrorKind::Required);
            assert_eq!(
                errors.for_field("email").unwrap().kind,
                FieldErrorKind::InvalidEmail
            );
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(writes(&faults), 0);
    assert!(sync.people().is_empty());
}

#[test]
fn failed_remote_add_leaves_memory_unchanged() {
    let (mut sync, faults) = remote_sync();
    let revision = sync.revision();
    faults.lock().unwrap().fail_writes = true;

    let err = sync
        .add_person(PersonDraft::new("Ana", "ana@example.com"))
        .unwrap_err();

    assert!(matches!(err, SyncError::Store(_)));
    assert!(sync.people().is_empty());
    assert_eq!(sync.revision(), revision);
}

#[test]
fn update_person_replaces_entry_in_place() {
    let (mut sync, _faults) = remote_sync();
    let first = sync.add_person(PersonDraft::new("Ana", "ana@example.com")).unwrap();
    let second = sync
        .add_person(PersonDraft::new("Bruno", "bruno@example.com"))
        .unwrap();

    let mut edited = first.clone();
    edited.bio = Some("Coordinator".to_string());
    edited.email = " ana.souza@example.com ".to_string();
    let saved = sync.update_person(edited).unwrap();

    assert_eq!(saved.email, "ana.souza@example.com");
    assert_eq!(sync.people()[0], saved);
    assert_eq!(sync.people()[1], second);

    sync.load();
    assert_eq!(sync.person(&first.id).unwrap().bio.as_deref(), Some("Coordinator"));
}

#[test]
fn update_or_remove_unknown_person_is_not_found() {
    let (mut sync, faults) = remote_sync();
    let ghost = PersonDraft::new("Ghost", "ghost@example.com").into_person();

    assert!(matches!(
        sync.update_person(ghost.clone()),
        Err(SyncError::NotFound {
            collection: Collection::People,
            ..
        })
    ));
    assert!(matches!(
        sync.remove_person(&ghost.id),
        Err(SyncError::NotFound { .. })
    ));
    assert_eq!(writes(&faults), 0);
}

#[test]
fn add_then_remove_restores_previous_state() {
    let (mut sync, _faults) = remote_sync();
    sync.add_person(PersonDraft::new("Ana", "ana@example.com")).unwrap();
    let before = sync.people().to_vec();

    let temp = sync
        .add_person(PersonDraft::new("Temp", "temp@example.com"))
        .unwrap();
    sync.remove_person(&temp.id).unwrap();

    assert_eq!(sync.people(), before.as_slice());
    sync.load();
    assert_eq!(sync.people(), before.as_slice());
}

#[test]
fn removing_person_cleans_group_memberships() {
    let (mut sync, _faults) = remote_sync();
    let ana = sync.add_person(PersonDraft::new("Ana", "ana@example.com")).unwrap();
    let bruno = sync
        .add_person(PersonDraft::new("Bruno", "bruno@example.com"))
        .unwrap();
    let group = sync
        .add_group(GroupDraft::new("Team").with_members([ana.id.clone(), bruno.id.clone()]))
        .unwrap();

    sync.remove_person(&ana.id).unwrap();

    assert_eq!(sync.group(&group.id).unwrap().members, vec![bruno.id.clone()]);
    sync.load();
    assert_eq!(sync.group(&group.id).unwrap().members, vec![bruno.id]);
}

#[test]
fn subscribers_see_each_applied_change() {
    let (mut sync, faults) = remote_sync();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let subscription = sync.subscribe(move |change| {
        sink.lock().unwrap().push((change.collection, change.kind));
    });

    let person = sync.add_person(PersonDraft::new("Ana", "ana@example.com")).unwrap();
    faults.lock().unwrap().fail_writes = true;
    let _ = sync.remove_person(&person.id);
    faults.lock().unwrap().fail_writes = false;
    sync.remove_person(&person.id).unwrap();

    assert!(sync.unsubscribe(subscription));
    sync.add_person(PersonDraft::new("Bruno", "bruno@example.com")).unwrap();

    assert_eq!(
        seen.lock().unwrap().as_slice(),
        &[
            (Collection::People, ChangeKind::Added),
            (Collection::People, ChangeKind::Removed)
        ]
    );
}
