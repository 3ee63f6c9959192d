//! Local search filters and dashboard counters.
//!
//! # Responsibility
//! - Filter in-memory collections by a free-text term.
//! - Compute the counters shown on the dashboard overview.
//!
//! # Invariants
//! - Matching is a case-insensitive substring test; blank terms match all.
//! - Results are recomputed from the given slice on every call.

use crate::model::group::Group;
use crate::model::location::Location;
use crate::model::person::Person;
use crate::model::territory::Territory;

/// Normalized search needle; `None` means "match everything".
fn needle(term: &str) -> Option<String> {
    let trimmed = term.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_lowercase())
    }
}

fn contains(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(needle)
}

fn contains_opt(haystack: Option<&str>, needle: &str) -> bool {
    haystack.is_some_and(|value| contains(value, needle))
}

fn filter_by<'a, T>(items: &'a [T], term: &str, matches: impl Fn(&T, &str) -> bool) -> Vec<&'a T> {
    match needle(term) {
        Some(needle) => items.iter().filter(|item| matches(item, &needle)).collect(),
        None => items.iter().collect(),
    }
}

/// People whose name or email contains `term`.
pub fn filter_people<'a>(people: &'a [Person], term: &str) -> Vec<&'a Person> {
    filter_by(people, term, |person, needle| {
        contains(&person.name, needle) || contains(&person.email, needle)
    })
}

/// Groups whose name or description contains `term`.
pub fn filter_groups<'a>(groups: &'a [Group], term: &str) -> Vec<&'a Group> {
    filter_by(groups, term, |group, needle| {
        contains(&group.name, needle) || contains_opt(group.description.as_deref(), needle)
    })
}

/// Locations whose name or address contains `term`.
pub fn filter_locations<'a>(locations: &'a [Location], term: &str) -> Vec<&'a Location> {
    filter_by(locations, term, |location, needle| {
        contains(&location.name, needle) || contains(&location.address, needle)
    })
}

/// Territories whose name or description contains `term`.
pub fn filter_territories<'a>(territories: &'a [Territory], term: &str) -> Vec<&'a Territory> {
    filter_by(territories, term, |territory, needle| {
        contains(&territory.name, needle) || contains_opt(territory.description.as_deref(), needle)
    })
}

/// Overview counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DashboardStats {
    pub people: usize,
    pub groups: usize,
    pub locations: usize,
    pub visited_locations: usize,
    pub territories: usize,
}

pub fn dashboard_stats(
    people: &[Person],
    groups: &[Group],
    locations: &[Location],
    territories: &[Territory],
) -> DashboardStats {
    DashboardStats {
        people: people.len(),
        groups: groups.len(),
        locations: locations.len(),
        visited_locations: locations.iter().filter(|location| location.visited).count(),
        territories: territories.len(),
    }
}

#[cfg(test)]
mod tests {
    use super::{dashboard_stats, filter_groups, filter_locations, filter_people};
    use crate::model::group::GroupDraft;
    use crate::model::location::LocationDraft;
    use crate::model::person::PersonDraft;

    #[test]
    fn people_match_name_or_email_case_insensitively() {
        let people = vec![
            PersonDraft::new("Ana Souza", "ana@example.com").into_person(),
            PersonDraft::new("Bruno", "bruno@MAIL.org").into_person(),
        ];
        assert_eq!(filter_people(&people, "SOUZA").len(), 1);
        assert_eq!(filter_people(&people, "mail.org")[0].name, "Bruno");
        assert_eq!(filter_people(&people, "  ").len(), 2);
        assert!(filter_people(&people, "carla").is_empty());
    }

    #[test]
    fn groups_match_description() {
        let mut draft = GroupDraft::new("Team");
        draft.description = Some("Weekend Visits".to_string());
        let groups = vec![draft.into_group(), GroupDraft::new("Other").into_group()];
        assert_eq!(filter_groups(&groups, "weekend").len(), 1);
    }

    #[test]
    fn locations_match_address_and_stats_count_visited() {
        let mut visited = LocationDraft::new("Hall", "Rua das Flores, 10")
            .with_coordinates(0.0, 0.0)
            .into_location()
            .unwrap();
        visited.visited = true;
        let other = LocationDraft::new("Park", "Avenida Central")
            .with_coordinates(0.0, 0.0)
            .into_location()
            .unwrap();
        let locations = vec![visited, other];

        assert_eq!(filter_locations(&locations, "flores").len(), 1);
        let stats = dashboard_stats(&[], &[], &locations, &[]);
        assert_eq!(stats.locations, 2);
        assert_eq!(stats.visited_locations, 1);
    }
}
