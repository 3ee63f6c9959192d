//! Domain state synchronizer.
//!
//! # Responsibility
//! - Own the in-memory people/group/location/territory collections.
//! - Apply every mutation to the configured backend first, then to memory.
//! - Notify subscribers after each applied change.
//!
//! # Invariants
//! - Remote mode: a failed remote call leaves memory untouched.
//! - Local mode: persistence failures are logged and the change is kept in
//!   memory for the rest of the session.
//! - Removing a person removes its id from every group's `members`.
//! - Group/location `updated_at` strictly increases on every update.
//! - Territories stay ordered by `created_at` descending.
//! - Concurrent callers are serialized by `&mut self`; the last completed
//!   call wins, with no version checks.

use super::remote;
use crate::local::LocalStore;
use crate::model::group::{Group, GroupDraft};
use crate::model::location::{Location, LocationDraft};
use crate::model::person::{Person, PersonDraft};
use crate::model::territory::{Territory, TerritoryDraft};
use crate::model::validation::{FieldErrorKind, ValidationErrors};
use crate::model::{next_updated_at, now_utc, EntityId};
use crate::search::{
    dashboard_stats, filter_groups, filter_locations, filter_people, filter_territories,
    DashboardStats,
};
use crate::store::{DataStore, StoreError, StoreResult};
use chrono::Duration as ChronoDuration;
use log::{error, info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Instant;

pub type SyncResult<T> = Result<T, SyncError>;

/// Entity collection owned by the synchronizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    People,
    Groups,
    Locations,
    Territories,
}

impl Collection {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::People => "people",
            Self::Groups => "groups",
            Self::Locations => "locations",
            Self::Territories => "territories",
        }
    }
}

/// Operation-level error returned to callers.
#[derive(Debug)]
pub enum SyncError {
    /// Input rejected before any store call.
    Validation(ValidationErrors),
    /// Remote call failed; memory is unchanged.
    Store(StoreError),
    NotFound {
        collection: Collection,
        id: EntityId,
    },
}

impl Display for SyncError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Store(err) => write!(f, "{err}"),
            Self::NotFound { collection, id } => {
                write!(f, "{} entry not found: {id}", collection.as_str())
            }
        }
    }
}

impl Error for SyncError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Store(err) => Some(err),
            Self::NotFound { .. } => None,
        }
    }
}

impl From<ValidationErrors> for SyncError {
    fn from(value: ValidationErrors) -> Self {
        Self::Validation(value)
    }
}

impl From<StoreError> for SyncError {
    fn from(value: StoreError) -> Self {
        Self::Store(value)
    }
}

/// Persistence behind the synchronizer. The two variants are exclusive.
pub enum Backend {
    Remote(Box<dyn DataStore>),
    /// Degraded mode: local key-value snapshots.
    Local(LocalStore),
}

impl Backend {
    pub fn mode(&self) -> &'static str {
        match self {
            Self::Remote(_) => "remote",
            Self::Local(_) => "local",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Added,
    Updated,
    Removed,
    Reloaded,
}

/// Change notification delivered to subscribers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Change {
    pub collection: Collection,
    pub kind: ChangeKind,
    /// `None` for whole-collection reloads.
    pub id: Option<EntityId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Listener = Box<dyn Fn(&Change) + Send>;

/// Per-collection result of a `load` call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadSummary {
    pub people: usize,
    pub groups: usize,
    pub locations: usize,
    pub territories: usize,
    /// Number of collections that fell back to empty after a failure.
    pub failed_collections: usize,
}

/// In-memory state container synchronized with one backend.
pub struct DomainSync {
    backend: Backend,
    people: Vec<Person>,
    groups: Vec<Group>,
    locations: Vec<Location>,
    territories: Vec<Territory>,
    search_term: String,
    revision: u64,
    next_subscription: u64,
    listeners: Vec<(SubscriptionId, Listener)>,
}

impl DomainSync {
    /// Creates an empty synchronizer; call `load` to fetch existing data.
    pub fn new(backend: Backend) -> Self {
        Self {
            backend,
            people: Vec::new(),
            groups: Vec::new(),
            locations: Vec::new(),
            territories: Vec::new(),
            search_term: String::new(),
            revision: 0,
            next_subscription: 0,
            listeners: Vec::new(),
        }
    }

    pub fn backend(&self) -> &Backend {
        &self.backend
    }

    pub fn people(&self) -> &[Person] {
        &self.people
    }

    pub fn groups(&self) -> &[Group] {
        &self.groups
    }

    pub fn locations(&self) -> &[Location] {
        &self.locations
    }

    /// Territories, newest first.
    pub fn territories(&self) -> &[Territory] {
        &self.territories
    }

    pub fn person(&self, id: &str) -> Option<&Person> {
        self.people.iter().find(|person| person.id == id)
    }

    pub fn group(&self, id: &str) -> Option<&Group> {
        self.groups.iter().find(|group| group.id == id)
    }

    pub fn location(&self, id: &str) -> Option<&Location> {
        self.locations.iter().find(|location| location.id == id)
    }

    pub fn territory(&self, id: &str) -> Option<&Territory> {
        self.territories.iter().find(|territory| territory.id == id)
    }

    /// Monotonic counter of applied changes.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn search_term(&self) -> &str {
        &self.search_term
    }

    pub fn set_search_term(&mut self, term: impl Into<String>) {
        self.search_term = term.into();
    }

    pub fn filtered_people(&self) -> Vec<&Person> {
        filter_people(&self.people, &self.search_term)
    }

    pub fn filtered_groups(&self) -> Vec<&Group> {
        filter_groups(&self.groups, &self.search_term)
    }

    pub fn filtered_locations(&self) -> Vec<&Location> {
        filter_locations(&self.locations, &self.search_term)
    }

    pub fn filtered_territories(&self) -> Vec<&Territory> {
        filter_territories(&self.territories, &self.search_term)
    }

    pub fn stats(&self) -> DashboardStats {
        dashboard_stats(&self.people, &self.groups, &self.locations, &self.territories)
    }

    /// Registers a change listener.
    pub fn subscribe(&mut self, listener: impl Fn(&Change) + Send + 'static) -> SubscriptionId {
        let id = SubscriptionId(self.next_subscription);
        self.next_subscription += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    /// Removes a listener; returns whether it was registered.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(existing, _)| *existing != id);
        self.listeners.len() != before
    }

    /// Re-fetches every collection from the backend.
    ///
    /// Failures are logged and the affected collection starts empty.
    /// In local mode territories are not persisted, so the session's
    /// in-memory territories are kept as they are.
    pub fn load(&mut self) -> LoadSummary {
        let started_at = Instant::now();
        info!(
            "event=sync_load module=sync status=start mode={}",
            self.backend.mode()
        );
        let mut failed = 0;

        match &mut self.backend {
            Backend::Remote(store) => {
                self.people = load_or_empty("people", &mut failed, || {
                    remote::fetch_people(store.as_ref())
                });
                self.groups = load_or_empty("groups", &mut failed, || {
                    remote::fetch_groups(store.as_ref())
                });
                self.locations = load_or_empty("locations", &mut failed, || {
                    remote::fetch_locations(store.as_ref())
                });
                self.territories = load_or_empty("territories", &mut failed, || {
                    remote::fetch_territories(store.as_ref())
                });
            }
            Backend::Local(local) => {
                self.people = load_or_empty("people", &mut failed, || local.load_people());
                self.groups = load_or_empty("groups", &mut failed, || local.load_groups());
                self.locations =
                    load_or_empty("locations", &mut failed, || local.load_locations());
            }
        }

        let summary = LoadSummary {
            people: self.people.len(),
            groups: self.groups.len(),
            locations: self.locations.len(),
            territories: self.territories.len(),
            failed_collections: failed,
        };
        info!(
            "event=sync_load module=sync status={} mode={} duration_ms={} people={} groups={} locations={} territories={} failed={}",
            if failed == 0 { "ok" } else { "degraded" },
            self.backend.mode(),
            started_at.elapsed().as_millis(),
            summary.people,
            summary.groups,
            summary.locations,
            summary.territories,
            failed
        );

        for collection in [
            Collection::People,
            Collection::Groups,
            Collection::Locations,
            Collection::Territories,
        ] {
            self.notify(collection, ChangeKind::Reloaded, None);
        }
        summary
    }

    pub fn add_person(&mut self, draft: PersonDraft) -> SyncResult<Person> {
        let started_at = Instant::now();
        check("person_add", draft.validate())?;
        let person = draft.into_person();

        self.write_remote("person_add", started_at, |store| {
            remote::insert_person(store, &person)
        })?;

        self.people.push(person.clone());
        self.persist_local(Collection::People, &[person.id.as_str()]);
        self.finish("person_add", started_at, Collection::People, ChangeKind::Added, &person.id);
        Ok(person)
    }

    pub fn update_person(&mut self, person: Person) -> SyncResult<Person> {
        let started_at = Instant::now();
        check("person_update", person.validate())?;
        let person = person.normalized();
        let index = self.index_of(Collection::People, &person.id)?;

        self.write_remote_matched("person_update", started_at, Collection::People, &person.id, |store| {
            remote::update_person(store, &person)
        })?;

        self.people[index] = person.clone();
        self.persist_local(Collection::People, &[person.id.as_str()]);
        self.finish("person_update", started_at, Collection::People, ChangeKind::Updated, &person.id);
        Ok(person)
    }

    /// Removes a person and drops it from every group's members.
    pub fn remove_person(&mut self, id: &str) -> SyncResult<()> {
        let started_at = Instant::now();
        let index = self.index_of(Collection::People, id)?;

        self.write_remote("person_remove", started_at, |store| {
            remote::delete_person(store, id)
        })?;

        self.people.remove(index);
        let mut touched_groups = Vec::new();
        for group in self.groups.iter_mut().filter(|group| group.has_member(id)) {
            group.members.retain(|member| member != id);
            touched_groups.push(group.id.clone());
        }

        self.persist_local(Collection::People, &[]);
        if !touched_groups.is_empty() {
            let touched = touched_groups.iter().map(String::as_str).collect::<Vec<_>>();
            self.persist_local(Collection::Groups, &touched);
        }
        for group_id in &touched_groups {
            self.notify(Collection::Groups, ChangeKind::Updated, Some(group_id));
        }
        self.finish("person_remove", started_at, Collection::People, ChangeKind::Removed, id);
        Ok(())
    }

    /// Inserts the group row, then one membership row per member.
    pub fn add_group(&mut self, draft: GroupDraft) -> SyncResult<Group> {
        let started_at = Instant::now();
        check("group_add", draft.validate())?;
        let group = draft.into_group();

        self.write_remote("group_add", started_at, |store| {
            remote::insert_group(store, &group)
        })?;

        self.groups.push(group.clone());
        self.persist_local(Collection::Groups, &[group.id.as_str()]);
        self.finish("group_add", started_at, Collection::Groups, ChangeKind::Added, &group.id);
        Ok(group)
    }

    /// Updates scalars and fully replaces membership rows.
    pub fn update_group(&mut self, group: Group) -> SyncResult<Group> {
        let started_at = Instant::now();
        check("group_update", group.validate())?;
        let index = self.index_of(Collection::Groups, &group.id)?;
        let mut group = group.normalized();
        group.updated_at = next_updated_at(self.groups[index].updated_at);

        self.write_remote_matched("group_update", started_at, Collection::Groups, &group.id, |store| {
            remote::update_group(store, &group)
        })?;

        self.groups[index] = group.clone();
        self.persist_local(Collection::Groups, &[group.id.as_str()]);
        self.finish("group_update", started_at, Collection::Groups, ChangeKind::Updated, &group.id);
        Ok(group)
    }

    pub fn remove_group(&mut self, id: &str) -> SyncResult<()> {
        let started_at = Instant::now();
        let index = self.index_of(Collection::Groups, id)?;

        self.write_remote("group_remove", started_at, |store| {
            remote::delete_group(store, id)
        })?;

        self.groups.remove(index);
        self.persist_local(Collection::Groups, &[]);
        self.finish("group_remove", started_at, Collection::Groups, ChangeKind::Removed, id);
        Ok(())
    }

    /// Inserts the location row, then one tagged assignment row per group/person.
    pub fn add_location(&mut self, draft: LocationDraft) -> SyncResult<Location> {
        let started_at = Instant::now();
        check("location_add", draft.validate())?;
        let location = match draft.into_location() {
            Some(location) => location,
            None => {
                let mut errors = ValidationErrors::new();
                errors.push("address", FieldErrorKind::MissingCoordinates);
                return Err(errors.into());
            }
        };

        self.write_remote("location_add", started_at, |store| {
            remote::insert_location(store, &location)
        })?;

        self.locations.push(location.clone());
        self.persist_local(Collection::Locations, &[location.id.as_str()]);
        self.finish("location_add", started_at, Collection::Locations, ChangeKind::Added, &location.id);
        Ok(location)
    }

    /// Updates scalars and fully replaces assignment rows.
    pub fn update_location(&mut self, location: Location) -> SyncResult<Location> {
        let started_at = Instant::now();
        check("location_update", location.validate())?;
        let index = self.index_of(Collection::Locations, &location.id)?;
        let mut location = location.normalized();
        location.updated_at = next_updated_at(self.locations[index].updated_at);

        self.write_remote_matched(
            "location_update",
            started_at,
            Collection::Locations,
            &location.id,
            |store| remote::update_location(store, &location),
        )?;

        self.locations[index] = location.clone();
        self.persist_local(Collection::Locations, &[location.id.as_str()]);
        self.finish(
            "location_update",
            started_at,
            Collection::Locations,
            ChangeKind::Updated,
            &location.id,
        );
        Ok(location)
    }

    pub fn remove_location(&mut self, id: &str) -> SyncResult<()> {
        let started_at = Instant::now();
        let index = self.index_of(Collection::Locations, id)?;

        self.write_remote("location_remove", started_at, |store| {
            remote::delete_location(store, id)
        })?;

        self.locations.remove(index);
        self.persist_local(Collection::Locations, &[]);
        self.finish("location_remove", started_at, Collection::Locations, ChangeKind::Removed, id);
        Ok(())
    }

    /// Inserts the territory row and its image rows; newest territory first.
    pub fn add_territory(&mut self, draft: TerritoryDraft) -> SyncResult<Territory> {
        let started_at = Instant::now();
        check("territory_add", draft.validate())?;
        let territory = draft.into_territory();

        self.write_remote("territory_add", started_at, |store| {
            remote::insert_territory(store, &territory)
        })?;

        self.territories.insert(0, territory.clone());
        self.finish(
            "territory_add",
            started_at,
            Collection::Territories,
            ChangeKind::Added,
            &territory.id,
        );
        Ok(territory)
    }

    /// Saves a territory together with its full image set.
    pub fn update_territory(&mut self, territory: Territory) -> SyncResult<Territory> {
        let started_at = Instant::now();
        check("territory_update", territory.validate())?;
        let index = self.index_of(Collection::Territories, &territory.id)?;
        let mut territory = territory.normalized();
        let stored = &self.territories[index];
        territory.created_at = stored.created_at;
        for image in &mut territory.images {
            if let Some(existing) = stored.image(&image.id) {
                image.created_at = existing.created_at;
            }
        }
        territory.updated_at = now_utc().max(stored.updated_at + ChronoDuration::microseconds(1));

        self.write_remote_matched(
            "territory_update",
            started_at,
            Collection::Territories,
            &territory.id,
            |store| remote::update_territory(store, &territory),
        )?;

        self.territories[index] = territory.clone();
        self.finish(
            "territory_update",
            started_at,
            Collection::Territories,
            ChangeKind::Updated,
            &territory.id,
        );
        Ok(territory)
    }

    pub fn remove_territory(&mut self, id: &str) -> SyncResult<()> {
        let started_at = Instant::now();
        let index = self.index_of(Collection::Territories, id)?;

        self.write_remote("territory_remove", started_at, |store| {
            remote::delete_territory(store, id)
        })?;

        self.territories.remove(index);
        self.finish(
            "territory_remove",
            started_at,
            Collection::Territories,
            ChangeKind::Removed,
            id,
        );
        Ok(())
    }

    fn index_of(&self, collection: Collection, id: &str) -> SyncResult<usize> {
        let position = match collection {
            Collection::People => self.people.iter().position(|item| item.id == id),
            Collection::Groups => self.groups.iter().position(|item| item.id == id),
            Collection::Locations => self.locations.iter().position(|item| item.id == id),
            Collection::Territories => self.territories.iter().position(|item| item.id == id),
        };
        position.ok_or_else(|| SyncError::NotFound {
            collection,
            id: id.to_string(),
        })
    }

    /// Runs a remote write sequence; no-op in local mode.
    fn write_remote(
        &self,
        op: &'static str,
        started_at: Instant,
        write: impl FnOnce(&dyn DataStore) -> StoreResult<()>,
    ) -> SyncResult<()> {
        match &self.backend {
            Backend::Remote(store) => write(store.as_ref()).map_err(|err| {
                error!(
                    "event={op} module=sync status=error duration_ms={} error={}",
                    started_at.elapsed().as_millis(),
                    err
                );
                SyncError::Store(err)
            }),
            Backend::Local(_) => Ok(()),
        }
    }

    /// Like `write_remote` for updates; zero matched rows becomes `NotFound`.
    fn write_remote_matched(
        &self,
        op: &'static str,
        started_at: Instant,
        collection: Collection,
        id: &str,
        write: impl FnOnce(&dyn DataStore) -> StoreResult<bool>,
    ) -> SyncResult<()> {
        let mut matched = true;
        self.write_remote(op, started_at, |store| {
            matched = write(store)?;
            Ok(())
        })?;
        if !matched {
            warn!(
                "event={op} module=sync status=error duration_ms={} error_code=remote_not_found id={id}",
                started_at.elapsed().as_millis()
            );
            return Err(SyncError::NotFound {
                collection,
                id: id.to_string(),
            });
        }
        Ok(())
    }

    /// Writes the collection snapshot in local mode; failures are only logged.
    fn persist_local(&mut self, collection: Collection, touched: &[&str]) {
        let Backend::Local(local) = &mut self.backend else {
            return;
        };
        let result = match collection {
            Collection::People => local.save_people(&self.people, touched),
            Collection::Groups => local.save_groups(&self.groups, touched),
            Collection::Locations => local.save_locations(&self.locations, touched),
            Collection::Territories => return,
        };
        if let Err(err) = result {
            warn!(
                "event=local_persist module=sync status=error collection={} error_code=persist_failed error={}",
                collection.as_str(),
                err
            );
        }
    }

    fn finish(
        &mut self,
        op: &'static str,
        started_at: Instant,
        collection: Collection,
        kind: ChangeKind,
        id: &str,
    ) {
        info!(
            "event={op} module=sync status=ok mode={} duration_ms={} id={id}",
            self.backend.mode(),
            started_at.elapsed().as_millis()
        );
        self.notify(collection, kind, Some(id));
    }

    fn notify(&mut self, collection: Collection, kind: ChangeKind, id: Option<&str>) {
        self.revision += 1;
        let change = Change {
            collection,
            kind,
            id: id.map(str::to_string),
        };
        for (_, listener) in &self.listeners {
            listener(&change);
        }
    }
}

fn check(op: &'static str, result: Result<(), ValidationErrors>) -> SyncResult<()> {
    result.map_err(|errors| {
        let fields = errors
            .errors()
            .iter()
            .map(|error| error.field)
            .collect::<Vec<_>>()
            .join(",");
        warn!("event={op} module=sync status=invalid fields={fields}");
        SyncError::Validation(errors)
    })
}

fn load_or_empty<T, E: Display>(
    collection: &'static str,
    failed: &mut usize,
    fetch: impl FnOnce() -> Result<Vec<T>, E>,
) -> Vec<T> {
    match fetch() {
        Ok(items) => items,
        Err(err) => {
            *failed += 1;
            error!(
                "event=sync_load module=sync status=error collection={collection} error_code=load_failed error={err}"
            );
            Vec::new()
        }
    }
}
