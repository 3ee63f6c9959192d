//! Typed row DTOs and pure row <-> entity mapping.
//!
//! # Responsibility
//! - Give every table row an explicit shape.
//! - Flatten embedded relation rows into id lists on the parent entity.
//! - Produce the relation rows written for one parent entity.
//!
//! # Invariants
//! - A missing, `null` or empty relation array maps to an empty id list.
//! - Location assignments are partitioned by which foreign key is non-null.
//! - Embedded relation fields are never serialized into insert/update rows.

use super::{Row, StoreError, StoreResult};
use crate::model::group::Group;
use crate::model::location::{Coordinates, Location};
use crate::model::person::Person;
use crate::model::territory::{Territory, TerritoryImage};
use crate::model::EntityId;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonRow {
    pub id: String,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub avatar: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupMemberRow {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_id: Option<String>,
    pub person_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupRow {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub avatar: Option<String>,
    pub updated_at: i64,
    #[serde(default, skip_serializing)]
    pub group_members: Option<Vec<GroupMemberRow>>,
}

/// Which foreign key an assignment row carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentKind {
    Group,
    Person,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocationAssignmentRow {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location_id: Option<String>,
    #[serde(default)]
    pub group_id: Option<String>,
    #[serde(default)]
    pub person_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignment_type: Option<AssignmentKind>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationRow {
    pub id: String,
    pub name: String,
    pub address: String,
    #[serde(default)]
    pub visited: bool,
    pub lat: f64,
    pub lng: f64,
    pub updated_at: i64,
    #[serde(default, skip_serializing)]
    pub location_assignments: Option<Vec<LocationAssignmentRow>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerritoryImageRow {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub territory_id: Option<String>,
    pub url: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub assigned_groups: Option<Vec<String>>,
    #[serde(default)]
    pub assigned_people: Option<Vec<String>>,
    #[serde(default)]
    pub position: i64,
    #[serde(with = "timestamp")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerritoryRow {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(with = "timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "timestamp")]
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing)]
    pub territory_images: Option<Vec<TerritoryImageRow>>,
}

/// RFC 3339 with a fixed microsecond fraction so stored text sorts by time.
mod timestamp {
    use chrono::{DateTime, SecondsFormat, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_rfc3339_opts(SecondsFormat::Micros, true))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        DateTime::<Utc>::deserialize(deserializer)
    }
}

/// Serializes a DTO into a JSON row object.
pub fn to_json_row<T: Serialize>(value: &T) -> StoreResult<Row> {
    match serde_json::to_value(value)? {
        Value::Object(row) => Ok(row),
        other => Err(StoreError::InvalidRow(format!(
            "expected object row, got `{other}`"
        ))),
    }
}

/// Deserializes a JSON row object into a DTO.
pub fn from_json_row<T: DeserializeOwned>(row: Row) -> StoreResult<T> {
    Ok(serde_json::from_value(Value::Object(row))?)
}

pub fn from_json_rows<T: DeserializeOwned>(rows: Vec<Row>) -> StoreResult<Vec<T>> {
    rows.into_iter().map(from_json_row).collect()
}

pub fn to_json_rows<T: Serialize>(values: &[T]) -> StoreResult<Vec<Row>> {
    values.iter().map(to_json_row).collect()
}

/// Flattens embedded membership rows into person ids.
pub fn flatten_members(rows: Option<Vec<GroupMemberRow>>) -> Vec<EntityId> {
    rows.unwrap_or_default()
        .into_iter()
        .map(|row| row.person_id)
        .collect()
}

/// Splits assignment rows into `(group_ids, person_ids)`.
///
/// Rows with neither key set are ignored.
pub fn partition_assignments(
    rows: Option<Vec<LocationAssignmentRow>>,
) -> (Vec<EntityId>, Vec<EntityId>) {
    let mut groups = Vec::new();
    let mut people = Vec::new();
    for row in rows.unwrap_or_default() {
        if let Some(group_id) = row.group_id {
            groups.push(group_id);
        } else if let Some(person_id) = row.person_id {
            people.push(person_id);
        }
    }
    (groups, people)
}

pub fn person_from_row(row: PersonRow) -> Person {
    Person {
        id: row.id,
        name: row.name,
        email: row.email,
        phone: row.phone,
        bio: row.bio,
        avatar: row.avatar,
    }
}

pub fn person_to_row(person: &Person) -> PersonRow {
    PersonRow {
        id: person.id.clone(),
        name: person.name.clone(),
        email: person.email.clone(),
        phone: person.phone.clone(),
        bio: person.bio.clone(),
        avatar: person.avatar.clone(),
    }
}

pub fn group_from_row(row: GroupRow) -> Group {
    Group {
        id: row.id,
        name: row.name,
        description: row.description,
        members: flatten_members(row.group_members),
        avatar: row.avatar,
        updated_at: row.updated_at,
    }
}

pub fn group_to_row(group: &Group) -> GroupRow {
    GroupRow {
        id: group.id.clone(),
        name: group.name.clone(),
        description: group.description.clone(),
        avatar: group.avatar.clone(),
        updated_at: group.updated_at,
        group_members: None,
    }
}

pub fn group_member_rows(group: &Group) -> Vec<GroupMemberRow> {
    group
        .members
        .iter()
        .map(|person_id| GroupMemberRow {
            group_id: Some(group.id.clone()),
            person_id: person_id.clone(),
        })
        .collect()
}

pub fn location_from_row(row: LocationRow) -> Location {
    let (assigned_groups, assigned_people) = partition_assignments(row.location_assignments);
    Location {
        id: row.id,
        name: row.name,
        address: row.address,
        visited: row.visited,
        coordinates: Coordinates {
            lat: row.lat,
            lng: row.lng,
        },
        assigned_groups,
        assigned_people,
        updated_at: row.updated_at,
    }
}

pub fn location_to_row(location: &Location) -> LocationRow {
    LocationRow {
        id: location.id.clone(),
        name: location.name.clone(),
        address: location.address.clone(),
        visited: location.visited,
        lat: location.coordinates.lat,
        lng: location.coordinates.lng,
        updated_at: location.updated_at,
        location_assignments: None,
    }
}

/// Builds one assignment row per assigned group, then per assigned person.
pub fn location_assignment_rows(location: &Location) -> Vec<LocationAssignmentRow> {
    let groups = location
        .assigned_groups
        .iter()
        .map(|group_id| LocationAssignmentRow {
            location_id: Some(location.id.clone()),
            group_id: Some(group_id.clone()),
            person_id: None,
            assignment_type: Some(AssignmentKind::Group),
        });
    let people = location
        .assigned_people
        .iter()
        .map(|person_id| LocationAssignmentRow {
            location_id: Some(location.id.clone()),
            group_id: None,
            person_id: Some(person_id.clone()),
            assignment_type: Some(AssignmentKind::Person),
        });
    groups.chain(people).collect()
}

pub fn territory_from_row(row: TerritoryRow) -> Territory {
    let mut image_rows = row.territory_images.unwrap_or_default();
    image_rows.sort_by_key(|image| image.position);
    Territory {
        id: row.id,
        name: row.name,
        description: row.description,
        image_url: row.image_url,
        created_at: row.created_at,
        updated_at: row.updated_at,
        images: image_rows.into_iter().map(territory_image_from_row).collect(),
    }
}

pub fn territory_image_from_row(row: TerritoryImageRow) -> TerritoryImage {
    TerritoryImage {
        id: row.id,
        url: row.url,
        description: row.description,
        assigned_groups: row.assigned_groups.unwrap_or_default(),
        assigned_people: row.assigned_people.unwrap_or_default(),
        created_at: row.created_at,
    }
}

pub fn territory_to_row(territory: &Territory) -> TerritoryRow {
    TerritoryRow {
        id: territory.id.clone(),
        name: territory.name.clone(),
        description: territory.description.clone(),
        image_url: territory.image_url.clone(),
        created_at: territory.created_at,
        updated_at: territory.updated_at,
        territory_images: None,
    }
}

/// Builds image rows with `position` reflecting the image order.
pub fn territory_image_rows(territory: &Territory) -> Vec<TerritoryImageRow> {
    territory
        .images
        .iter()
        .enumerate()
        .map(|(index, image)| TerritoryImageRow {
            id: image.id.clone(),
            territory_id: Some(territory.id.clone()),
            url: image.url.clone(),
            description: image.description.clone(),
            assigned_groups: Some(image.assigned_groups.clone()),
            assigned_people: Some(image.assigned_people.clone()),
            position: index as i64,
            created_at: image.created_at,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{
        from_json_row, group_from_row, group_to_row, location_assignment_rows,
        location_from_row, territory_from_row, to_json_row, GroupRow, LocationRow, TerritoryRow,
    };
    use crate::model::group::GroupDraft;
    use crate::model::location::LocationDraft;
    use serde_json::{json, Value};

    fn object(value: Value) -> super::Row {
        match value {
            Value::Object(row) => row,
            other => panic!("expected object, got {other}"),
        }
    }

    #[test]
    fn empty_member_array_flattens_to_empty_list() {
        let row: GroupRow = from_json_row(object(json!({
            "id": "g1",
            "name": "Team",
            "updated_at": 1,
            "group_members": []
        })))
        .unwrap();
        assert_eq!(group_from_row(row).members, Vec::<String>::new());
    }

    #[test]
    fn absent_or_null_member_array_flattens_to_empty_list() {
        let absent: GroupRow = from_json_row(object(json!({
            "id": "g1",
            "name": "Team",
            "updated_at": 1
        })))
        .unwrap();
        assert!(group_from_row(absent).members.is_empty());

        let null: GroupRow = from_json_row(object(json!({
            "id": "g1",
            "name": "Team",
            "updated_at": 1,
            "group_members": null
        })))
        .unwrap();
        assert!(group_from_row(null).members.is_empty());
    }

    #[test]
    fn member_rows_flatten_in_order() {
        let row: GroupRow = from_json_row(object(json!({
            "id": "g1",
            "name": "Team",
            "updated_at": 1,
            "group_members": [{"person_id": "p1"}, {"person_id": "p2"}]
        })))
        .unwrap();
        assert_eq!(group_from_row(row).members, vec!["p1", "p2"]);
    }

    #[test]
    fn assignments_partition_by_non_null_key() {
        let row: LocationRow = from_json_row(object(json!({
            "id": "l1",
            "name": "Hall",
            "address": "Rua A, 10",
            "visited": false,
            "lat": -23.55,
            "lng": -46.63,
            "updated_at": 1,
            "location_assignments": [
                {"group_id": "g1", "person_id": null},
                {"group_id": null, "person_id": "p1"}
            ]
        })))
        .unwrap();
        let location = location_from_row(row);
        assert_eq!(location.assigned_groups, vec!["g1"]);
        assert_eq!(location.assigned_people, vec!["p1"]);
    }

    #[test]
    fn absent_assignments_yield_empty_lists() {
        let row: LocationRow = from_json_row(object(json!({
            "id": "l1",
            "name": "Hall",
            "address": "Rua A, 10",
            "lat": 0.0,
            "lng": 0.0,
            "updated_at": 1
        })))
        .unwrap();
        let location = location_from_row(row);
        assert!(location.assigned_groups.is_empty());
        assert!(location.assigned_people.is_empty());
        assert!(!location.visited);
    }

    #[test]
    fn scalar_rows_never_carry_embeds() {
        let group = GroupDraft::new("Team").with_members(["p1"]).into_group();
        let row = to_json_row(&group_to_row(&group)).unwrap();
        assert!(!row.contains_key("group_members"));
        assert_eq!(row.get("name"), Some(&json!("Team")));
    }

    #[test]
    fn assignment_rows_are_tagged_by_kind() {
        let mut draft = LocationDraft::new("Hall", "Rua A").with_coordinates(1.0, 2.0);
        draft.assigned_groups = vec!["g1".to_string()];
        draft.assigned_people = vec!["p1".to_string(), "p2".to_string()];
        let location = draft.into_location().unwrap();

        let rows = location_assignment_rows(&location);
        assert_eq!(rows.len(), 3);
        let json_row = to_json_row(&rows[1]).unwrap();
        assert_eq!(json_row.get("assignment_type"), Some(&json!("person")));
        assert_eq!(json_row.get("group_id"), Some(&Value::Null));
    }

    #[test]
    fn territory_images_are_ordered_by_position() {
        let row: TerritoryRow = from_json_row(object(json!({
            "id": "t1",
            "name": "North",
            "created_at": "2024-05-01T10:00:00Z",
            "updated_at": "2024-05-01T10:00:00Z",
            "territory_images": [
                {"id": "i2", "url": "b.jpg", "position": 1, "created_at": "2024-05-01T10:00:00Z"},
                {"id": "i1", "url": "a.jpg", "position": 0, "assigned_groups": null,
                 "created_at": "2024-05-01T10:00:00Z"}
            ]
        })))
        .unwrap();
        let territory = territory_from_row(row);
        let ids = territory
            .images
            .iter()
            .map(|image| image.id.as_str())
            .collect::<Vec<_>>();
        assert_eq!(ids, vec!["i1", "i2"]);
        assert!(territory.images[0].assigned_groups.is_empty());
    }
}
