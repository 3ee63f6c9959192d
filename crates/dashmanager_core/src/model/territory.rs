//! Territory and territory image models.
//!
//! # Responsibility
//! - Define territories and the images they own.
//! - Provide the image-management edits applied before a territory save.
//!
//! # Invariants
//! - Images are owned by exactly one territory and persisted with it.
//! - Image order is the order of `images`.

use super::validation::{normalize_optional, ValidationErrors};
use super::{dedup_ids, new_entity_id, now_utc, toggle_id, EntityId, Keyed};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TerritoryImage {
    /// Generated when the caller sends an image without one.
    #[serde(default = "new_entity_id")]
    pub id: EntityId,
    /// Remote URL or inline `data:` URL.
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub assigned_groups: Vec<EntityId>,
    #[serde(default)]
    pub assigned_people: Vec<EntityId>,
    #[serde(default = "now_utc")]
    pub created_at: DateTime<Utc>,
}

impl TerritoryImage {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            id: new_entity_id(),
            url: url.into(),
            description: None,
            assigned_groups: Vec::new(),
            assigned_people: Vec::new(),
            created_at: now_utc(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Territory {
    pub id: EntityId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Cover image reference.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub images: Vec<TerritoryImage>,
}

/// Territory form input without a durable id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TerritoryDraft {
    pub name: String,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub images: Vec<TerritoryImage>,
}

impl TerritoryDraft {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        errors.require("name", &self.name);
        errors.into_result()
    }

    pub fn into_territory(self) -> Territory {
        let now = now_utc();
        Territory {
            id: new_entity_id(),
            name: self.name.trim().to_string(),
            description: normalize_optional(self.description),
            image_url: normalize_optional(self.image_url),
            created_at: now,
            updated_at: now,
            images: self.images.into_iter().map(normalize_image).collect(),
        }
    }
}

impl Territory {
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        errors.require("name", &self.name);
        errors.into_result()
    }

    pub fn normalized(&self) -> Territory {
        Territory {
            id: self.id.clone(),
            name: self.name.trim().to_string(),
            description: normalize_optional(self.description.clone()),
            image_url: normalize_optional(self.image_url.clone()),
            created_at: self.created_at,
            updated_at: self.updated_at,
            images: self.images.iter().cloned().map(normalize_image).collect(),
        }
    }

    /// Appends a new image and returns its id.
    pub fn add_image(&mut self, url: impl Into<String>) -> EntityId {
        let image = TerritoryImage::new(url);
        let id = image.id.clone();
        self.images.push(image);
        id
    }

    /// Removes an image; returns whether it existed.
    pub fn remove_image(&mut self, image_id: &str) -> bool {
        let before = self.images.len();
        self.images.retain(|image| image.id != image_id);
        self.images.len() != before
    }

    pub fn image(&self, image_id: &str) -> Option<&TerritoryImage> {
        self.images.iter().find(|image| image.id == image_id)
    }

    /// Toggles a group assignment on one image; returns whether the image exists.
    pub fn toggle_image_group(&mut self, image_id: &str, group_id: &str) -> bool {
        match self.images.iter_mut().find(|image| image.id == image_id) {
            Some(image) => {
                toggle_id(&mut image.assigned_groups, group_id);
                true
            }
            None => false,
        }
    }

    /// Toggles a person assignment on one image; returns whether the image exists.
    pub fn toggle_image_person(&mut self, image_id: &str, person_id: &str) -> bool {
        match self.images.iter_mut().find(|image| image.id == image_id) {
            Some(image) => {
                toggle_id(&mut image.assigned_people, person_id);
                true
            }
            None => false,
        }
    }
}

impl Keyed for Territory {
    fn key_id(&self) -> &str {
        &self.id
    }
}

fn normalize_image(image: TerritoryImage) -> TerritoryImage {
    TerritoryImage {
        id: image.id,
        url: image.url.trim().to_string(),
        description: normalize_optional(image.description),
        assigned_groups: dedup_ids(image.assigned_groups),
        assigned_people: dedup_ids(image.assigned_people),
        created_at: image.created_at,
    }
}

#[cfg(test)]
mod tests {
    use super::TerritoryDraft;

    #[test]
    fn image_management_edits() {
        let mut territory = TerritoryDraft::new("North").into_territory();
        let first = territory.add_image("https://cdn.example.com/1.jpg");
        let second = territory.add_image("https://cdn.example.com/2.jpg");

        assert!(territory.toggle_image_group(&first, "g1"));
        assert!(territory.toggle_image_person(&first, "p1"));
        assert!(!territory.toggle_image_group("missing", "g1"));

        assert!(territory.remove_image(&second));
        assert!(!territory.remove_image(&second));

        let image = territory.image(&first).expect("first image remains");
        assert_eq!(image.assigned_groups, vec!["g1"]);
        assert_eq!(image.assigned_people, vec!["p1"]);
        assert_eq!(territory.images.len(), 1);
    }

    #[test]
    fn image_json_without_id_or_timestamp_gets_fresh_ones() {
        let draft: TerritoryDraft = serde_json::from_str(
            r#"{"name": "North", "images": [{"url": "https://cdn.example.com/x.jpg"}, {"url": "b.jpg"}]}"#,
        )
        .unwrap();
        let territory = draft.into_territory();

        assert_eq!(territory.images.len(), 2);
        assert!(!territory.images[0].id.is_empty());
        assert_ne!(territory.images[0].id, territory.images[1].id);
    }

    #[test]
    fn new_territory_has_matching_timestamps() {
        let territory = TerritoryDraft::new("South").into_territory();
        assert_eq!(territory.created_at, territory.updated_at);
    }
}
