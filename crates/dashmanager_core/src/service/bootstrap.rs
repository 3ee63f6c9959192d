//! Session startup from a resolved configuration.
//!
//! # Responsibility
//! - Build the backend selected by `DashConfig::store`.
//! - Reject unreachable or incompatible stores before the first load.
//!
//! # Invariants
//! - Startup failures are `StartupError`, never per-operation `SyncError`.
//! - A successfully opened synchronizer has already run `load` once.

use super::sync::{Backend, DomainSync};
use crate::config::{ConfigError, DashConfig, StoreMode};
use crate::local::{FileKvStore, LocalStore, LocalStoreError};
use crate::store::{open_store, DataStore, RestDataStore, StoreError};
use log::{error, info};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Instant;

#[derive(Debug)]
pub enum StartupError {
    Config(ConfigError),
    /// Store could not be built or failed its connectivity check.
    Store(StoreError),
    Local(LocalStoreError),
}

impl Display for StartupError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(err) => write!(f, "configuration error: {err}"),
            Self::Store(err) => write!(f, "store unavailable: {err}"),
            Self::Local(err) => write!(f, "local storage unavailable: {err}"),
        }
    }
}

impl Error for StartupError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Config(err) => Some(err),
            Self::Store(err) => Some(err),
            Self::Local(err) => Some(err),
        }
    }
}

impl From<ConfigError> for StartupError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

impl From<StoreError> for StartupError {
    fn from(value: StoreError) -> Self {
        Self::Store(value)
    }
}

impl From<LocalStoreError> for StartupError {
    fn from(value: LocalStoreError) -> Self {
        Self::Local(value)
    }
}

/// Opens the configured backend and returns a loaded synchronizer.
pub fn open_dashboard(config: &DashConfig) -> Result<DomainSync, StartupError> {
    let started_at = Instant::now();
    info!(
        "event=dashboard_open module=service status=start store={}",
        config.store.name()
    );

    let backend = build_backend(config).map_err(|err| {
        error!(
            "event=dashboard_open module=service status=error store={} duration_ms={} error={}",
            config.store.name(),
            started_at.elapsed().as_millis(),
            err
        );
        err
    })?;

    let mut sync = DomainSync::new(backend);
    let summary = sync.load();
    info!(
        "event=dashboard_open module=service status=ok store={} duration_ms={} failed_collections={}",
        config.store.name(),
        started_at.elapsed().as_millis(),
        summary.failed_collections
    );
    Ok(sync)
}

/// Resolves configuration from the environment, then opens the dashboard.
pub fn open_dashboard_from_env() -> Result<DomainSync, StartupError> {
    let config = DashConfig::from_env()?;
    open_dashboard(&config)
}

fn build_backend(config: &DashConfig) -> Result<Backend, StartupError> {
    match &config.store {
        StoreMode::Rest { url, api_key } => {
            let store = RestDataStore::new(url.clone(), api_key.clone(), config.http_timeout)?;
            store.check_connection()?;
            Ok(Backend::Remote(Box::new(store)))
        }
        StoreMode::Sqlite { path } => {
            let store = open_store(path)?;
            store.check_connection()?;
            Ok(Backend::Remote(Box::new(store)))
        }
        StoreMode::Local { dir, limits } => {
            let kv = FileKvStore::open(dir)?;
            Ok(Backend::Local(LocalStore::new(Box::new(kv), *limits)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{open_dashboard, StartupError};
    use crate::config::{DashConfig, StoreMode};
    use crate::local::LocalStoreLimits;
    use crate::model::person::PersonDraft;
    use std::time::Duration;

    fn config(store: StoreMode) -> DashConfig {
        DashConfig {
            store,
            log_level: "info".to_string(),
            postal_base_url: "https://viacep.com.br/".parse().unwrap(),
            share_function_url: None,
            http_timeout: Duration::from_secs(1),
        }
    }

    #[test]
    fn sqlite_dashboard_persists_across_sessions() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = config(StoreMode::Sqlite {
            path: dir.path().join("dash.sqlite3"),
        });

        let mut first = open_dashboard(&cfg).unwrap();
        assert_eq!(first.backend().mode(), "remote");
        first
            .add_person(PersonDraft::new("Ana", "ana@example.com"))
            .unwrap();
        drop(first);

        let second = open_dashboard(&cfg).unwrap();
        assert_eq!(second.people().len(), 1);
        assert_eq!(second.people()[0].name, "Ana");
    }

    #[test]
    fn local_dashboard_reloads_saved_people() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = config(StoreMode::Local {
            dir: dir.path().join("local"),
            limits: LocalStoreLimits::default(),
        });

        let mut first = open_dashboard(&cfg).unwrap();
        assert_eq!(first.backend().mode(), "local");
        first
            .add_person(PersonDraft::new("Bruno", "bruno@example.com"))
            .unwrap();
        drop(first);

        let second = open_dashboard(&cfg).unwrap();
        assert_eq!(second.people().len(), 1);
    }

    #[test]
    fn unreachable_rest_store_is_a_startup_error() {
        let cfg = config(StoreMode::Rest {
            url: "http://127.0.0.1:9/".parse().unwrap(),
            api_key: "anon".to_string(),
        });
        assert!(matches!(open_dashboard(&cfg), Err(StartupError::Store(_))));
    }
}
