//! Field-level validation errors shared by every entity draft.
//!
//! # Responsibility
//! - Collect all field problems of one form submission in a single value.
//! - Keep field names stable so UI layers can map them to inputs.
//!
//! # Invariants
//! - A `ValidationErrors` value returned as `Err` is never empty.

use once_cell::sync::Lazy;
use regex::Regex;
use std::error::Error;
use std::fmt::{Display, Formatter};

static EMAIL_RE: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"\S+@\S+\.\S+").ok());

/// Kind of problem detected on one field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldErrorKind {
    /// Field is empty after trimming.
    Required,
    /// Email does not look like `local@domain.tld`.
    InvalidEmail,
    /// Location has no coordinates yet.
    MissingCoordinates,
}

/// One field-level validation failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldError {
    pub field: &'static str,
    pub kind: FieldErrorKind,
}

impl Display for FieldError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.kind {
            FieldErrorKind::Required => write!(f, "{} is required", self.field),
            FieldErrorKind::InvalidEmail => write!(f, "{} is not a valid email", self.field),
            FieldErrorKind::MissingCoordinates => {
                write!(f, "{} has no coordinates", self.field)
            }
        }
    }
}

/// Non-empty list of field errors for one submission.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors {
    errors: Vec<FieldError>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, field: &'static str, kind: FieldErrorKind) {
        self.errors.push(FieldError { field, kind });
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn errors(&self) -> &[FieldError] {
        &self.errors
    }

    /// Returns the first error recorded for `field`, if any.
    pub fn for_field(&self, field: &str) -> Option<&FieldError> {
        self.errors.iter().find(|error| error.field == field)
    }

    /// Converts the collected errors into a validation result.
    pub fn into_result(self) -> Result<(), ValidationErrors> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }

    pub(crate) fn require(&mut self, field: &'static str, value: &str) {
        if value.trim().is_empty() {
            self.push(field, FieldErrorKind::Required);
        }
    }
}

impl Display for ValidationErrors {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let messages = self
            .errors
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>();
        write!(f, "validation failed: {}", messages.join("; "))
    }
}

impl Error for ValidationErrors {}

/// Returns whether `value` passes the loose email shape check.
pub fn is_valid_email(value: &str) -> bool {
    Option::as_ref(&*EMAIL_RE).is_some_and(|pattern| pattern.is_match(value.trim()))
}

/// Trims an optional text field and maps blank values to `None`.
pub(crate) fn normalize_optional(value: Option<String>) -> Option<String> {
    value
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty())
}

#[cfg(test)]
mod tests {
    use super::{is_valid_email, normalize_optional, FieldErrorKind, ValidationErrors};

    #[test]
    fn email_shape_check_matches_loose_pattern() {
        assert!(is_valid_email("ana@example.com"));
        assert!(is_valid_email("  ana@mail.example.org "));
        assert!(!is_valid_email("ana@example"));
        assert!(!is_valid_email("ana.example.com"));
        assert!(!is_valid_email(""));
    }

    #[test]
    fn empty_collector_is_ok() {
        assert!(ValidationErrors::new().into_result().is_ok());
    }

    #[test]
    fn require_flags_blank_values() {
        let mut errors = ValidationErrors::new();
        errors.require("name", "   ");
        errors.require("email", "a@b.co");
        let errors = errors.into_result().expect_err("blank name must fail");
        assert_eq!(errors.errors().len(), 1);
        assert_eq!(
            errors.for_field("name").map(|error| error.kind),
            Some(FieldErrorKind::Required)
        );
    }

    #[test]
    fn normalize_optional_drops_blank_text() {
        assert_eq!(normalize_optional(Some("  ".to_string())), None);
        assert_eq!(
            normalize_optional(Some(" bio ".to_string())).as_deref(),
            Some("bio")
        );
    }
}
