//! Core domain logic for DashManager.
//! Owns the people/group/location/territory state and keeps it in sync with
//! the configured store.

pub mod config;
pub mod local;
pub mod logging;
pub mod model;
pub mod postal;
pub mod search;
pub mod service;
pub mod share;
pub mod store;

pub use config::{ConfigError, DashConfig, StoreMode};
pub use local::{
    FileKvStore, KeyValueStore, LocalStore, LocalStoreError, LocalStoreLimits, MemoryKvStore,
};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::group::{Group, GroupDraft};
pub use model::location::{Coordinates, Location, LocationDraft};
pub use model::person::{Person, PersonDraft};
pub use model::territory::{Territory, TerritoryDraft, TerritoryImage};
pub use model::validation::{FieldError, FieldErrorKind, ValidationErrors};
pub use model::EntityId;
pub use search::DashboardStats;
pub use service::{
    open_dashboard, open_dashboard_from_env, Backend, Change, ChangeKind, Collection, DomainSync,
    LoadSummary, StartupError, SubscriptionId, SyncError, SyncResult,
};
pub use store::{
    open_store, open_store_in_memory, DataStore, RestDataStore, SqliteDataStore, StoreError,
    StoreResult,
};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
