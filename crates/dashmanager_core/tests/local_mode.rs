use dashmanager_core::local::sanitize::MAX_BIO_CHARS;
use dashmanager_core::{
    Backend, DomainSync, FileKvStore, GroupDraft, KeyValueStore, LocalStore, LocalStoreLimits,
    LocationDraft, MemoryKvStore, PersonDraft,
};

fn limits(max_entities: usize) -> LocalStoreLimits {
    LocalStoreLimits {
        max_entities,
        ..LocalStoreLimits::default()
    }
}

fn session(kv: &MemoryKvStore, max_entities: usize) -> DomainSync {
    let local = LocalStore::new(Box::new(kv.clone()), limits(max_entities));
    let mut sync = DomainSync::new(Backend::Local(local));
    sync.load();
    sync
}

fn names(sync: &DomainSync) -> Vec<String> {
    sync.people().iter().map(|person| person.name.clone()).collect()
}

#[test]
fn only_most_recently_touched_entries_are_persisted() {
    let kv = MemoryKvStore::new();
    let mut sync = session(&kv, 3);
    let mut ids = Vec::new();
    for index in 1..=5 {
        let person = sync
            .add_person(PersonDraft::new(format!("P{index}"), format!("p{index}@example.com")))
            .unwrap();
        ids.push(person.id);
    }
    assert_eq!(sync.people().len(), 5);

    let mut edited = sync.person(&ids[0]).unwrap().clone();
    edited.name = "P1 edited".to_string();
    sync.update_person(edited).unwrap();

    let reloaded = session(&kv, 3);
    assert_eq!(names(&reloaded), vec!["P4", "P5", "P1 edited"]);
}

#[test]
fn quota_failure_keeps_change_in_memory() {
    let kv = MemoryKvStore::with_quota(64);
    let mut sync = session(&kv, 100);

    let mut draft = PersonDraft::new("Ana", "ana@example.com");
    draft.bio = Some("x".repeat(200));
    let person = sync.add_person(draft).unwrap();

    assert_eq!(sync.person(&person.id), Some(&person));
    assert_eq!(kv.get("people").unwrap(), None);
    assert!(session(&kv, 100).people().is_empty());
}

#[test]
fn persisted_text_is_capped_but_memory_is_not() {
    let kv = MemoryKvStore::new();
    let mut sync = session(&kv, 100);
    let mut draft = PersonDraft::new("Ana", "ana@example.com");
    draft.bio = Some("b".repeat(MAX_BIO_CHARS + 20));
    let person = sync.add_person(draft).unwrap();

    assert_eq!(
        sync.person(&person.id).unwrap().bio.as_ref().map(String::len),
        Some(MAX_BIO_CHARS + 20)
    );
    let reloaded = session(&kv, 100);
    assert_eq!(
        reloaded.people()[0].bio.as_ref().map(|bio| bio.chars().count()),
        Some(MAX_BIO_CHARS)
    );
}

#[test]
fn malformed_snapshot_starts_empty_and_reports_failure() {
    let mut kv = MemoryKvStore::new();
    kv.set("locations", "[{\"id\": 1}").unwrap();
    let local = LocalStore::new(Box::new(kv.clone()), limits(100));
    let mut sync = DomainSync::new(Backend::Local(local));

    let summary = sync.load();

    assert_eq!(summary.failed_collections, 1);
    assert!(sync.locations().is_empty());
}

#[test]
fn file_store_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let open = || {
        let kv = FileKvStore::open(dir.path()).unwrap();
        let mut sync = DomainSync::new(Backend::Local(LocalStore::new(Box::new(kv), limits(100))));
        sync.load();
        sync
    };

    let mut sync = open();
    let ana = sync.add_person(PersonDraft::new("Ana", "ana@example.com")).unwrap();
    let group = sync
        .add_group(GroupDraft::new("Team").with_members([ana.id.clone()]))
        .unwrap();
    let location = sync
        .add_location(LocationDraft::new("Salão", "Rua A, 1").with_coordinates(-23.5, -46.6))
        .unwrap();
    sync.remove_person(&ana.id).unwrap();
    drop(sync);

    assert!(dir.path().join("people.json").exists());
    let reopened = open();
    assert!(reopened.people().is_empty());
    assert!(reopened.group(&group.id).unwrap().members.is_empty());
    assert_eq!(reopened.location(&location.id), Some(&location));
}
