//! Person domain model.
//!
//! # Invariants
//! - `name` and `email` are non-empty and trimmed once validated.
//! - `avatar` is either a URL or a `data:` URL with an inline payload.

use super::validation::{is_valid_email, normalize_optional, FieldErrorKind, ValidationErrors};
use super::{new_entity_id, EntityId, Keyed};
use serde::{Deserialize, Serialize};

/// Person managed by the dashboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Person {
    pub id: EntityId,
    pub name: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
}

/// Person form input without a durable id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PersonDraft {
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub bio: Option<String>,
    pub avatar: Option<String>,
}

impl PersonDraft {
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            ..Self::default()
        }
    }

    /// Checks required fields and email shape.
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        validate_person_fields(&self.name, &self.email)
    }

    /// Builds a person with a generated id and trimmed fields.
    pub fn into_person(self) -> Person {
        self.into_person_with_id(new_entity_id())
    }

    pub fn into_person_with_id(self, id: EntityId) -> Person {
        Person {
            id,
            name: self.name.trim().to_string(),
            email: self.email.trim().to_string(),
            phone: normalize_optional(self.phone),
            bio: normalize_optional(self.bio),
            avatar: normalize_optional(self.avatar),
        }
    }
}

impl Person {
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        validate_person_fields(&self.name, &self.email)
    }

    /// Returns a copy with trimmed text fields.
    pub fn normalized(&self) -> Person {
        Person {
            id: self.id.clone(),
            name: self.name.trim().to_string(),
            email: self.email.trim().to_string(),
            phone: normalize_optional(self.phone.clone()),
            bio: normalize_optional(self.bio.clone()),
            avatar: normalize_optional(self.avatar.clone()),
        }
    }
}

impl Keyed for Person {
    fn key_id(&self) -> &str {
        &self.id
    }
}

fn validate_person_fields(name: &str, email: &str) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::new();
    errors.require("name", name);
    if email.trim().is_empty() {
        errors.push("email", FieldErrorKind::Required);
    } else if !is_valid_email(email) {
        errors.push("email", FieldErrorKind::InvalidEmail);
    }
    errors.into_result()
}

#[cfg(test)]
mod tests {
    use super::PersonDraft;
    use crate::model::validation::FieldErrorKind;

    #[test]
    fn draft_validation_reports_every_field() {
        let errors = PersonDraft::new(" ", "not-an-email")
            .validate()
            .expect_err("draft must be rejected");
        assert_eq!(
            errors.for_field("name").map(|error| error.kind),
            Some(FieldErrorKind::Required)
        );
        assert_eq!(
            errors.for_field("email").map(|error| error.kind),
            Some(FieldErrorKind::InvalidEmail)
        );
    }

    #[test]
    fn into_person_trims_and_drops_blank_optionals() {
        let mut draft = PersonDraft::new("  Ana ", " ana@example.com ");
        draft.phone = Some("   ".to_string());
        draft.bio = Some(" volunteer ".to_string());
        let person = draft.into_person_with_id("p1".to_string());

        assert_eq!(person.id, "p1");
        assert_eq!(person.name, "Ana");
        assert_eq!(person.email, "ana@example.com");
        assert_eq!(person.phone, None);
        assert_eq!(person.bio.as_deref(), Some("volunteer"));
    }
}
