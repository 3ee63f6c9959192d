//! Group domain model.
//!
//! # Invariants
//! - `members` holds person ids without duplicates; order is not meaningful.
//! - `updated_at` is epoch milliseconds and grows on every mutation.

use super::validation::{normalize_optional, ValidationErrors};
use super::{dedup_ids, new_entity_id, now_epoch_ms, toggle_id, EntityId, Keyed};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Group {
    pub id: EntityId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub members: Vec<EntityId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    pub updated_at: i64,
}

/// Group form input without a durable id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GroupDraft {
    pub name: String,
    pub description: Option<String>,
    pub members: Vec<EntityId>,
    pub avatar: Option<String>,
}

impl GroupDraft {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_members<I, S>(mut self, members: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<EntityId>,
    {
        self.members = members.into_iter().map(Into::into).collect();
        self
    }

    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        errors.require("name", &self.name);
        errors.into_result()
    }

    pub fn into_group(self) -> Group {
        Group {
            id: new_entity_id(),
            name: self.name.trim().to_string(),
            description: normalize_optional(self.description),
            members: dedup_ids(self.members),
            avatar: normalize_optional(self.avatar),
            updated_at: now_epoch_ms(),
        }
    }
}

impl Group {
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        errors.require("name", &self.name);
        errors.into_result()
    }

    /// Returns a copy with trimmed text and deduplicated members.
    pub fn normalized(&self) -> Group {
        Group {
            id: self.id.clone(),
            name: self.name.trim().to_string(),
            description: normalize_optional(self.description.clone()),
            members: dedup_ids(self.members.clone()),
            avatar: normalize_optional(self.avatar.clone()),
            updated_at: self.updated_at,
        }
    }

    pub fn has_member(&self, person_id: &str) -> bool {
        self.members.iter().any(|member| member == person_id)
    }

    /// Adds the person when absent, removes it otherwise.
    pub fn toggle_member(&mut self, person_id: &str) {
        toggle_id(&mut self.members, person_id);
    }

    /// Drops every listed person from the member set.
    pub fn remove_members(&mut self, person_ids: &[EntityId]) {
        self.members.retain(|member| !person_ids.contains(member));
    }
}

impl Keyed for Group {
    fn key_id(&self) -> &str {
        &self.id
    }
}
