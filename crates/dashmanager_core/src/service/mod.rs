//! Dashboard use cases.
//!
//! # Responsibility
//! - Keep the in-memory domain state consistent with the active store.
//! - Open sessions from configuration.

pub mod bootstrap;
mod remote;
pub mod sync;

pub use bootstrap::{open_dashboard, open_dashboard_from_env, StartupError};
pub use sync::{
    Backend, Change, ChangeKind, Collection, DomainSync, LoadSummary, SubscriptionId, SyncError,
    SyncResult,
};
