//! Location domain model.
//!
//! # Invariants
//! - A persisted location always carries coordinates.
//! - `assigned_groups`/`assigned_people` hold ids without duplicates.

use super::validation::{FieldErrorKind, ValidationErrors};
use super::{dedup_ids, new_entity_id, now_epoch_ms, toggle_id, EntityId, Keyed};
use serde::{Deserialize, Serialize};

/// Geographic point in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    pub id: EntityId,
    pub name: String,
    pub address: String,
    #[serde(default)]
    pub visited: bool,
    pub coordinates: Coordinates,
    #[serde(default)]
    pub assigned_groups: Vec<EntityId>,
    #[serde(default)]
    pub assigned_people: Vec<EntityId>,
    pub updated_at: i64,
}

/// Location form input. Coordinates stay optional until an address resolves.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LocationDraft {
    pub name: String,
    pub address: String,
    pub visited: bool,
    pub coordinates: Option<Coordinates>,
    pub assigned_groups: Vec<EntityId>,
    pub assigned_people: Vec<EntityId>,
}

impl LocationDraft {
    pub fn new(name: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
            ..Self::default()
        }
    }

    pub fn with_coordinates(mut self, lat: f64, lng: f64) -> Self {
        self.coordinates = Some(Coordinates { lat, lng });
        self
    }

    pub fn toggle_group(&mut self, group_id: &str) {
        toggle_id(&mut self.assigned_groups, group_id);
    }

    pub fn toggle_person(&mut self, person_id: &str) {
        toggle_id(&mut self.assigned_people, person_id);
    }

    pub fn validate(&self) -> Result<(), ValidationErrors> {
        validate_location_fields(&self.name, &self.address, self.coordinates.is_some())
    }

    /// Builds a location with a generated id.
    ///
    /// Returns `None` when coordinates are missing; call `validate` first.
    pub fn into_location(self) -> Option<Location> {
        let coordinates = self.coordinates?;
        Some(Location {
            id: new_entity_id(),
            name: self.name.trim().to_string(),
            address: self.address.trim().to_string(),
            visited: self.visited,
            coordinates,
            assigned_groups: dedup_ids(self.assigned_groups),
            assigned_people: dedup_ids(self.assigned_people),
            updated_at: now_epoch_ms(),
        })
    }
}

impl Location {
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let has_coordinates = self.coordinates.lat.is_finite() && self.coordinates.lng.is_finite();
        validate_location_fields(&self.name, &self.address, has_coordinates)
    }

    pub fn normalized(&self) -> Location {
        Location {
            id: self.id.clone(),
            name: self.name.trim().to_string(),
            address: self.address.trim().to_string(),
            visited: self.visited,
            coordinates: self.coordinates,
            assigned_groups: dedup_ids(self.assigned_groups.clone()),
            assigned_people: dedup_ids(self.assigned_people.clone()),
            updated_at: self.updated_at,
        }
    }

    pub fn toggle_group(&mut self, group_id: &str) {
        toggle_id(&mut self.assigned_groups, group_id);
    }

    pub fn toggle_person(&mut self, person_id: &str) {
        toggle_id(&mut self.assigned_people, person_id);
    }
}

impl Keyed for Location {
    fn key_id(&self) -> &str {
        &self.id
    }
}

fn validate_location_fields(
    name: &str,
    address: &str,
    has_coordinates: bool,
) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::new();
    errors.require("name", name);
    if address.trim().is_empty() {
        errors.push("address", FieldErrorKind::Required);
    } else if !has_coordinates {
        errors.push("address", FieldErrorKind::MissingCoordinates);
    }
    errors.into_result()
}
