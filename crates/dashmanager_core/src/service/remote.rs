//! Remote read/write sequences for each entity kind.
//!
//! # Responsibility
//! - Fetch collections with their relation rows embedded and reshape them.
//! - Sequence the per-entity writes (scalar row + relation rows).
//!
//! # Invariants
//! - Relation updates use full replace: delete all rows of the parent, then
//!   reinsert the current set.
//! - Writes run as separate calls; a failure stops the sequence without any
//!   compensating cleanup of earlier calls.

use crate::model::group::Group;
use crate::model::location::Location;
use crate::model::person::Person;
use crate::model::territory::Territory;
use crate::store::rows::{
    from_json_rows, group_from_row, group_member_rows, group_to_row, location_assignment_rows,
    location_from_row, location_to_row, person_from_row, person_to_row, territory_from_row,
    territory_image_rows, territory_to_row, to_json_row, to_json_rows, GroupRow, LocationRow,
    PersonRow, TerritoryRow,
};
use crate::store::{DataStore, Filter, Row, Select, StoreResult, Table};

/// Outcome of a scalar update: whether any row matched the id.
pub(crate) type Matched = bool;

pub(crate) fn fetch_people(store: &dyn DataStore) -> StoreResult<Vec<Person>> {
    let rows = store.select(&Select::from(Table::People))?;
    Ok(from_json_rows::<PersonRow>(rows)?
        .into_iter()
        .map(person_from_row)
        .collect())
}

pub(crate) fn fetch_groups(store: &dyn DataStore) -> StoreResult<Vec<Group>> {
    let rows = store.select(&Select::from(Table::Groups).embed(Table::GroupMembers))?;
    Ok(from_json_rows::<GroupRow>(rows)?
        .into_iter()
        .map(group_from_row)
        .collect())
}

pub(crate) fn fetch_locations(store: &dyn DataStore) -> StoreResult<Vec<Location>> {
    let rows = store.select(&Select::from(Table::Locations).embed(Table::LocationAssignments))?;
    Ok(from_json_rows::<LocationRow>(rows)?
        .into_iter()
        .map(location_from_row)
        .collect())
}

pub(crate) fn fetch_territories(store: &dyn DataStore) -> StoreResult<Vec<Territory>> {
    let query = Select::from(Table::Territories)
        .embed(Table::TerritoryImages)
        .order_by("created_at", true);
    let rows = store.select(&query)?;
    Ok(from_json_rows::<TerritoryRow>(rows)?
        .into_iter()
        .map(territory_from_row)
        .collect())
}

pub(crate) fn insert_person(store: &dyn DataStore, person: &Person) -> StoreResult<()> {
    store.insert(Table::People, &[to_json_row(&person_to_row(person))?])?;
    Ok(())
}

pub(crate) fn update_person(store: &dyn DataStore, person: &Person) -> StoreResult<Matched> {
    let values = scalar_values(to_json_row(&person_to_row(person))?);
    let matched = store.update(Table::People, &values, &[by_id(&person.id)])?;
    Ok(matched > 0)
}

/// Deletes the person's memberships, then the person row.
pub(crate) fn delete_person(store: &dyn DataStore, person_id: &str) -> StoreResult<()> {
    store.delete(
        Table::GroupMembers,
        &[Filter::eq("person_id", person_id)],
    )?;
    store.delete(Table::People, &[by_id(person_id)])?;
    Ok(())
}

pub(crate) fn insert_group(store: &dyn DataStore, group: &Group) -> StoreResult<()> {
    store.insert(Table::Groups, &[to_json_row(&group_to_row(group))?])?;
    insert_members(store, group)
}

pub(crate) fn update_group(store: &dyn DataStore, group: &Group) -> StoreResult<Matched> {
    let values = scalar_values(to_json_row(&group_to_row(group))?);
    let matched = store.update(Table::Groups, &values, &[by_id(&group.id)])?;
    if matched == 0 {
        return Ok(false);
    }
    store.delete(Table::GroupMembers, &[Filter::eq("group_id", group.id.as_str())])?;
    insert_members(store, group)?;
    Ok(true)
}

pub(crate) fn delete_group(store: &dyn DataStore, group_id: &str) -> StoreResult<()> {
    store.delete(Table::GroupMembers, &[Filter::eq("group_id", group_id)])?;
    store.delete(Table::Groups, &[by_id(group_id)])?;
    Ok(())
}

pub(crate) fn insert_location(store: &dyn DataStore, location: &Location) -> StoreResult<()> {
    store.insert(Table::Locations, &[to_json_row(&location_to_row(location))?])?;
    insert_assignments(store, location)
}

pub(crate) fn update_location(store: &dyn DataStore, location: &Location) -> StoreResult<Matched> {
    let values = scalar_values(to_json_row(&location_to_row(location))?);
    let matched = store.update(Table::Locations, &values, &[by_id(&location.id)])?;
    if matched == 0 {
        return Ok(false);
    }
    store.delete(
        Table::LocationAssignments,
        &[Filter::eq("location_id", location.id.as_str())],
    )?;
    insert_assignments(store, location)?;
    Ok(true)
}

pub(crate) fn delete_location(store: &dyn DataStore, location_id: &str) -> StoreResult<()> {
    store.delete(
        Table::LocationAssignments,
        &[Filter::eq("location_id", location_id)],
    )?;
    store.delete(Table::Locations, &[by_id(location_id)])?;
    Ok(())
}

pub(crate) fn insert_territory(store: &dyn DataStore, territory: &Territory) -> StoreResult<()> {
    store.insert(Table::Territories, &[to_json_row(&territory_to_row(territory))?])?;
    insert_images(store, territory)
}

pub(crate) fn update_territory(store: &dyn DataStore, territory: &Territory) -> StoreResult<Matched> {
    let values = scalar_values(to_json_row(&territory_to_row(territory))?);
    let matched = store.update(Table::Territories, &values, &[by_id(&territory.id)])?;
    if matched == 0 {
        return Ok(false);
    }
    store.delete(
        Table::TerritoryImages,
        &[Filter::eq("territory_id", territory.id.as_str())],
    )?;
    insert_images(store, territory)?;
    Ok(true)
}

pub(crate) fn delete_territory(store: &dyn DataStore, territory_id: &str) -> StoreResult<()> {
    store.delete(
        Table::TerritoryImages,
        &[Filter::eq("territory_id", territory_id)],
    )?;
    store.delete(Table::Territories, &[by_id(territory_id)])?;
    Ok(())
}

fn insert_members(store: &dyn DataStore, group: &Group) -> StoreResult<()> {
    let rows = to_json_rows(&group_member_rows(group))?;
    store.insert(Table::GroupMembers, &rows)?;
    Ok(())
}

fn insert_assignments(store: &dyn DataStore, location: &Location) -> StoreResult<()> {
    let rows = to_json_rows(&location_assignment_rows(location))?;
    store.insert(Table::LocationAssignments, &rows)?;
    Ok(())
}

fn insert_images(store: &dyn DataStore, territory: &Territory) -> StoreResult<()> {
    let rows = to_json_rows(&territory_image_rows(territory))?;
    store.insert(Table::TerritoryImages, &rows)?;
    Ok(())
}

fn by_id(id: &str) -> Filter {
    Filter::eq("id", id)
}

/// Drops the primary key from an update payload.
fn scalar_values(mut row: Row) -> Row {
    row.remove("id");
    row
}
