//! Domain model for the dashboard collections.
//!
//! # Responsibility
//! - Define the canonical people/group/location/territory records.
//! - Provide drafts (entities without a durable id) and their validation.
//!
//! # Invariants
//! - Every entity is identified by a stable string `EntityId`.
//! - Drafts are validated and trimmed before any store call.

use chrono::{DateTime, SubsecRound, Utc};
use uuid::Uuid;

pub mod group;
pub mod location;
pub mod person;
pub mod territory;
pub mod validation;

/// Stable identifier shared by every entity kind.
pub type EntityId = String;

/// Generates a fresh client-side entity id.
pub fn new_entity_id() -> EntityId {
    Uuid::new_v4().to_string()
}

/// Current wall-clock time in Unix epoch milliseconds.
pub fn now_epoch_ms() -> i64 {
    Utc::now().timestamp_millis()
}

/// Current UTC time truncated to microseconds, the precision stores keep.
pub fn now_utc() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

/// Next `updated_at` value that is strictly greater than `previous`.
///
/// Wall-clock time is used unless the clock did not move past `previous`.
pub fn next_updated_at(previous: i64) -> i64 {
    now_epoch_ms().max(previous.saturating_add(1))
}

/// Entities addressable by id inside a collection.
pub trait Keyed {
    fn key_id(&self) -> &str;
}

/// Adds `id` to `ids` when absent, removes it otherwise.
pub(crate) fn toggle_id(ids: &mut Vec<EntityId>, id: &str) {
    if let Some(position) = ids.iter().position(|existing| existing == id) {
        ids.remove(position);
    } else {
        ids.push(id.to_string());
    }
}

/// Removes duplicate and blank ids while keeping first-seen order.
pub(crate) fn dedup_ids(ids: Vec<EntityId>) -> Vec<EntityId> {
    let mut unique: Vec<EntityId> = Vec::with_capacity(ids.len());
    for id in ids {
        let id = id.trim().to_string();
        if !id.is_empty() && !unique.contains(&id) {
            unique.push(id);
        }
    }
    unique
}
