//! FFI use-case API for Flutter-facing calls.
//!
//! # Responsibility
//! - Expose dashboard operations to Dart via FRB as sync calls.
//! - Own the single process-wide dashboard session.
//!
//! # Invariants
//! - Exported functions never panic across the FFI boundary.
//! - Entities cross the boundary as camelCase JSON strings.
//! - Calls are serialized through one session lock.

use dashmanager_core::postal::{prefill_address, PrefillError, ViaCepClient};
use dashmanager_core::share::{share_territory, FunctionShareClient};
use dashmanager_core::model::Keyed;
use dashmanager_core::{
    core_version as core_version_inner, init_logging as init_logging_inner, open_dashboard,
    ping as ping_inner, Backend, DashConfig, DomainSync, FileKvStore, Group, GroupDraft,
    LocalStore, LocalStoreLimits, Location, LocationDraft, Person, PersonDraft, StoreMode,
    SyncError, Territory, TerritoryDraft,
};
use log::warn;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard, OnceLock};

static SESSION: OnceLock<Mutex<Option<Session>>> = OnceLock::new();

struct Session {
    sync: DomainSync,
    config: Option<DashConfig>,
}

/// Minimal health-check API for FRB smoke integration.
#[flutter_rust_bridge::frb(sync)]
pub fn ping() -> String {
    ping_inner().to_owned()
}

/// Expose core crate version through FFI.
#[flutter_rust_bridge::frb(sync)]
pub fn core_version() -> String {
    core_version_inner().to_owned()
}

/// Initializes Rust core logging once per process.
///
/// Returns an empty string on success and the error message otherwise.
/// Repeating the same `level + log_dir` is a no-op.
#[flutter_rust_bridge::frb(sync)]
pub fn init_logging(level: String, log_dir: String) -> String {
    match init_logging_inner(level.as_str(), log_dir.as_str()) {
        Ok(()) => String::new(),
        Err(err) => err.to_string(),
    }
}

/// Result envelope shared by every dashboard call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DashResponse {
    pub ok: bool,
    /// Id of the affected entity, when there is one.
    pub id: Option<String>,
    /// JSON payload (entity or list) on success.
    pub payload_json: Option<String>,
    /// Human-readable message for diagnostics/UI.
    pub message: String,
    /// Names of invalid fields on validation failures.
    pub invalid_fields: Vec<String>,
}

impl DashResponse {
    fn success(message: impl Into<String>, id: Option<String>, payload_json: Option<String>) -> Self {
        Self {
            ok: true,
            id,
            payload_json,
            message: message.into(),
            invalid_fields: Vec::new(),
        }
    }

    fn failure(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            id: None,
            payload_json: None,
            message: message.into(),
            invalid_fields: Vec::new(),
        }
    }

    fn from_sync_error(op: &str, err: SyncError) -> Self {
        let invalid_fields = match &err {
            SyncError::Validation(errors) => errors
                .errors()
                .iter()
                .map(|error| error.field.to_string())
                .collect(),
            _ => Vec::new(),
        };
        Self {
            invalid_fields,
            ..Self::failure(format!("{op} failed: {err}"))
        }
    }
}

/// Dashboard counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DashStats {
    pub people: u32,
    pub groups: u32,
    pub locations: u32,
    pub visited_locations: u32,
    pub territories: u32,
}

/// Opens the dashboard from `DASHMANAGER_*` environment variables.
#[flutter_rust_bridge::frb(sync)]
pub fn dashboard_open() -> DashResponse {
    let config = match DashConfig::from_env() {
        Ok(config) => config,
        Err(err) => return DashResponse::failure(format!("dashboard_open failed: {err}")),
    };
    match open_dashboard(&config) {
        Ok(sync) => install_session(sync, Some(config)),
        Err(err) => DashResponse::failure(format!("dashboard_open failed: {err}")),
    }
}

/// Opens a dashboard over a SQLite file.
#[flutter_rust_bridge::frb(sync)]
pub fn dashboard_open_sqlite(db_path: String) -> DashResponse {
    let config = match default_config() {
        Ok(defaults) => DashConfig {
            store: StoreMode::Sqlite {
                path: PathBuf::from(db_path.trim()),
            },
            ..defaults
        },
        Err(err) => return DashResponse::failure(format!("dashboard_open_sqlite failed: {err}")),
    };
    match open_dashboard(&config) {
        Ok(sync) => install_session(sync, Some(config)),
        Err(err) => DashResponse::failure(format!("dashboard_open_sqlite failed: {err}")),
    }
}

/// Opens a degraded-mode dashboard over local JSON files in `dir`.
#[flutter_rust_bridge::frb(sync)]
pub fn dashboard_open_local(dir: String) -> DashResponse {
    let kv = match FileKvStore::open(dir.trim()) {
        Ok(kv) => kv,
        Err(err) => return DashResponse::failure(format!("dashboard_open_local failed: {err}")),
    };
    let mut sync = DomainSync::new(Backend::Local(LocalStore::new(
        Box::new(kv),
        LocalStoreLimits::default(),
    )));
    sync.load();
    install_session(sync, None)
}

/// Drops the active session.
#[flutter_rust_bridge::frb(sync)]
pub fn dashboard_close() -> bool {
    lock_session().take().is_some()
}

#[flutter_rust_bridge::frb(sync)]
pub fn dashboard_reload() -> DashResponse {
    with_session("dashboard_reload", |session| {
        let summary = session.sync.load();
        Ok(DashResponse::success(
            format!(
                "Loaded {} people, {} groups, {} locations, {} territories ({} failed).",
                summary.people,
                summary.groups,
                summary.locations,
                summary.territories,
                summary.failed_collections
            ),
            None,
            None,
        ))
    })
}

#[flutter_rust_bridge::frb(sync)]
pub fn dashboard_stats() -> Option<DashStats> {
    let guard = lock_session();
    guard.as_ref().map(|session| {
        let stats = session.sync.stats();
        DashStats {
            people: clamp_u32(stats.people),
            groups: clamp_u32(stats.groups),
            locations: clamp_u32(stats.locations),
            visited_locations: clamp_u32(stats.visited_locations),
            territories: clamp_u32(stats.territories),
        }
    })
}

/// Lists `collection` (`people|groups|locations|territories`) as JSON,
/// filtered by `search` when given.
#[flutter_rust_bridge::frb(sync)]
pub fn entity_list(collection: String, search: Option<String>) -> DashResponse {
    with_session("entity_list", |session| {
        session
            .sync
            .set_search_term(search.unwrap_or_default());
        let sync = &session.sync;
        let payload = match collection.trim() {
            "people" => to_json(&sync.filtered_people()),
            "groups" => to_json(&sync.filtered_groups()),
            "locations" => to_json(&sync.filtered_locations()),
            "territories" => to_json(&sync.filtered_territories()),
            other => return Err(format!("unknown collection `{other}`")),
        }?;
        Ok(DashResponse::success("Listed.", None, Some(payload)))
    })
}

/// Adds an entity from a draft JSON object.
#[flutter_rust_bridge::frb(sync)]
pub fn entity_add(collection: String, draft_json: String) -> DashResponse {
    with_session("entity_add", |session| {
        let sync = &mut session.sync;
        let response = match collection.trim() {
            "people" => saved(sync.add_person(from_json::<PersonDraft>(&draft_json)?)),
            "groups" => saved(sync.add_group(from_json::<GroupDraft>(&draft_json)?)),
            "locations" => saved(sync.add_location(from_json::<LocationDraft>(&draft_json)?)),
            "territories" => saved(sync.add_territory(from_json::<TerritoryDraft>(&draft_json)?)),
            other => return Err(format!("unknown collection `{other}`")),
        };
        Ok(response.unwrap_or_else(|err| DashResponse::from_sync_error("entity_add", err)))
    })
}

/// Replaces an existing entity with the given full JSON object.
#[flutter_rust_bridge::frb(sync)]
pub fn entity_update(collection: String, entity_json: String) -> DashResponse {
    with_session("entity_update", |session| {
        let sync = &mut session.sync;
        let response = match collection.trim() {
            "people" => saved(sync.update_person(from_json::<Person>(&entity_json)?)),
            "groups" => saved(sync.update_group(from_json::<Group>(&entity_json)?)),
            "locations" => saved(sync.update_location(from_json::<Location>(&entity_json)?)),
            "territories" => saved(sync.update_territory(from_json::<Territory>(&entity_json)?)),
            other => return Err(format!("unknown collection `{other}`")),
        };
        Ok(response.unwrap_or_else(|err| DashResponse::from_sync_error("entity_update", err)))
    })
}

#[flutter_rust_bridge::frb(sync)]
pub fn entity_remove(collection: String, id: String) -> DashResponse {
    with_session("entity_remove", |session| {
        let sync = &mut session.sync;
        let result = match collection.trim() {
            "people" => sync.remove_person(&id),
            "groups" => sync.remove_group(&id),
            "locations" => sync.remove_location(&id),
            "territories" => sync.remove_territory(&id),
            other => return Err(format!("unknown collection `{other}`")),
        };
        Ok(match result {
            Ok(()) => DashResponse::success("Removed.", Some(id.clone()), None),
            Err(err) => DashResponse::from_sync_error("entity_remove", err),
        })
    })
}

/// Looks up a postal code and returns the prefilled location draft as JSON.
///
/// `draft_json` is the current form state; when the lookup fails it comes
/// back unchanged as the failure's `payload_json`.
#[flutter_rust_bridge::frb(sync)]
pub fn postal_prefill(
    draft_json: String,
    postal_code: String,
    number: Option<String>,
    complement: Option<String>,
) -> DashResponse {
    let mut draft = match from_json::<LocationDraft>(&draft_json) {
        Ok(draft) => draft,
        Err(err) => return DashResponse::failure(format!("postal_prefill failed: {err}")),
    };
    let config = match session_config() {
        Ok(config) => config,
        Err(err) => return DashResponse::failure(format!("postal_prefill failed: {err}")),
    };
    let client = match ViaCepClient::new(config.postal_base_url, config.http_timeout) {
        Ok(client) => client,
        Err(err) => return DashResponse::failure(format!("postal_prefill failed: {err}")),
    };

    match prefill_address(
        &mut draft,
        &client,
        &postal_code,
        number.as_deref(),
        complement.as_deref(),
    ) {
        Ok(_) => match draft_to_json(&draft) {
            Ok(payload) => DashResponse::success("Address found.", None, Some(payload)),
            Err(err) => DashResponse::failure(format!("postal_prefill failed: {err}")),
        },
        Err(err) => {
            let message = match err {
                PrefillError::NotFound => "Postal code not found.".to_string(),
                other => format!("postal_prefill failed: {other}"),
            };
            DashResponse {
                payload_json: Some(draft_json),
                invalid_fields: vec!["address".to_string()],
                ..DashResponse::failure(message)
            }
        }
    }
}

/// Emails a territory through the configured share function.
#[flutter_rust_bridge::frb(sync)]
pub fn territory_share(territory_id: String, email: String) -> DashResponse {
    with_session("territory_share", |session| {
        let config = match session.config.clone() {
            Some(config) => config,
            None => default_config()?,
        };
        let endpoint = config
            .share_function_url
            .clone()
            .ok_or_else(|| "share function url is not configured".to_string())?;
        let api_key = match &config.store {
            StoreMode::Rest { api_key, .. } => Some(api_key.clone()),
            _ => None,
        };
        let client = FunctionShareClient::new(endpoint, api_key, config.http_timeout)
            .map_err(|err| err.to_string())?;
        Ok(
            match share_territory(&client, &session.sync, territory_id.trim(), &email) {
                Ok(()) => DashResponse::success("Territory shared.", Some(territory_id.clone()), None),
                Err(err) => DashResponse::failure(format!("territory_share failed: {err}")),
            },
        )
    })
}

fn install_session(sync: DomainSync, config: Option<DashConfig>) -> DashResponse {
    let mode = sync.backend().mode();
    let message = format!(
        "Dashboard opened ({mode}): {} people, {} groups, {} locations, {} territories.",
        sync.people().len(),
        sync.groups().len(),
        sync.locations().len(),
        sync.territories().len()
    );
    *lock_session() = Some(Session { sync, config });
    DashResponse::success(message, None, None)
}

fn lock_session() -> MutexGuard<'static, Option<Session>> {
    SESSION
        .get_or_init(|| Mutex::new(None))
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn with_session(
    op: &str,
    f: impl FnOnce(&mut Session) -> Result<DashResponse, String>,
) -> DashResponse {
    let mut guard = lock_session();
    let Some(session) = guard.as_mut() else {
        return DashResponse::failure(format!("{op} failed: dashboard is not open"));
    };
    f(session).unwrap_or_else(|err| {
        warn!("event={op} module=ffi status=error error={err}");
        DashResponse::failure(format!("{op} failed: {err}"))
    })
}

fn session_config() -> Result<DashConfig, String> {
    let active = lock_session()
        .as_ref()
        .and_then(|session| session.config.clone());
    match active {
        Some(config) => Ok(config),
        None => default_config(),
    }
}

/// Built-in defaults, used when no environment config is active.
fn default_config() -> Result<DashConfig, String> {
    DashConfig::from_lookup(|_| None).map_err(|err| err.to_string())
}

/// Success envelope for a stored entity.
///
/// The entity is already stored when encoding fails, so the failure still
/// carries its id.
fn saved<T: Serialize + Keyed>(result: Result<T, SyncError>) -> Result<DashResponse, SyncError> {
    let entity = result?;
    let id = entity.key_id().to_string();
    Ok(match to_json(&entity) {
        Ok(payload) => DashResponse::success("Saved.", Some(id), Some(payload)),
        Err(err) => {
            warn!("event=entity_encode module=ffi status=error id={id} error={err}");
            DashResponse {
                id: Some(id),
                ..DashResponse::failure(format!("saved but payload encoding failed: {err}"))
            }
        }
    })
}

fn from_json<T: DeserializeOwned>(text: &str) -> Result<T, String> {
    serde_json::from_str(text).map_err(|err| format!("invalid json: {err}"))
}

fn to_json<T: Serialize>(value: &T) -> Result<String, String> {
    serde_json::to_string(value).map_err(|err| err.to_string())
}

fn draft_to_json(draft: &LocationDraft) -> Result<String, String> {
    to_json(&serde_json::json!({
        "name": draft.name,
        "address": draft.address,
        "visited": draft.visited,
        "coordinates": draft.coordinates,
        "assignedGroups": draft.assigned_groups,
        "assignedPeople": draft.assigned_people,
    }))
}

fn clamp_u32(value: usize) -> u32 {
    u32::try_from(value).unwrap_or(u32::MAX)
}
