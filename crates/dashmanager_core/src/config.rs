//! Runtime configuration resolved from environment variables.
//!
//! # Responsibility
//! - Decide which store backs the synchronizer (REST, SQLite or local).
//! - Validate credentials and URLs before anything connects.
//!
//! # Invariants
//! - REST mode requires both URL and key; a URL without key is an error,
//!   never a silent fallback to local mode.
//! - Local mode is used only when no remote store variable is set.

use crate::local::LocalStoreLimits;
use crate::logging::default_log_level;
use reqwest::Url;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;
use std::time::Duration;

pub const ENV_REMOTE_URL: &str = "DASHMANAGER_REMOTE_URL";
pub const ENV_REMOTE_KEY: &str = "DASHMANAGER_REMOTE_KEY";
pub const ENV_DB_PATH: &str = "DASHMANAGER_DB_PATH";
pub const ENV_LOCAL_DIR: &str = "DASHMANAGER_LOCAL_DIR";
pub const ENV_LOCAL_MAX_ENTITIES: &str = "DASHMANAGER_LOCAL_MAX_ENTITIES";
pub const ENV_LOG_LEVEL: &str = "DASHMANAGER_LOG_LEVEL";
pub const ENV_POSTAL_URL: &str = "DASHMANAGER_POSTAL_URL";
pub const ENV_SHARE_URL: &str = "DASHMANAGER_SHARE_URL";
pub const ENV_HTTP_TIMEOUT_SECS: &str = "DASHMANAGER_HTTP_TIMEOUT_SECS";

pub const DEFAULT_LOCAL_DIR: &str = "dashmanager-data";
pub const DEFAULT_POSTAL_URL: &str = "https://viacep.com.br";
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 15;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    MissingCredential(&'static str),
    InvalidUrl {
        key: &'static str,
        value: String,
        message: String,
    },
    InvalidNumber {
        key: &'static str,
        value: String,
    },
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingCredential(key) => write!(f, "missing required setting `{key}`"),
            Self::InvalidUrl {
                key,
                value,
                message,
            } => write!(f, "invalid url in `{key}` (`{value}`): {message}"),
            Self::InvalidNumber { key, value } => {
                write!(f, "invalid positive number in `{key}`: `{value}`")
            }
        }
    }
}

impl Error for ConfigError {}

/// Store selected for this session.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreMode {
    /// Hosted PostgREST-compatible backend.
    Rest { url: Url, api_key: String },
    /// SQLite database file with the dashboard schema.
    Sqlite { path: PathBuf },
    /// Degraded mode over local JSON snapshots.
    Local {
        dir: PathBuf,
        limits: LocalStoreLimits,
    },
}

impl StoreMode {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Rest { .. } => "rest",
            Self::Sqlite { .. } => "sqlite",
            Self::Local { .. } => "local",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DashConfig {
    pub store: StoreMode,
    pub log_level: String,
    pub postal_base_url: Url,
    pub share_function_url: Option<Url>,
    pub http_timeout: Duration,
}

impl DashConfig {
    /// Reads the configuration from process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads the configuration through `lookup`; blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let store = match (get(ENV_REMOTE_URL), get(ENV_DB_PATH)) {
            (Some(url), _) => {
                let api_key = get(ENV_REMOTE_KEY).ok_or(ConfigError::MissingCredential(ENV_REMOTE_KEY))?;
                StoreMode::Rest {
                    url: parse_base_url(ENV_REMOTE_URL, &url)?,
                    api_key,
                }
            }
            (None, Some(path)) => StoreMode::Sqlite {
                path: PathBuf::from(path),
            },
            (None, None) => {
                let mut limits = LocalStoreLimits::default();
                if let Some(value) = get(ENV_LOCAL_MAX_ENTITIES) {
                    limits.max_entities = parse_positive(ENV_LOCAL_MAX_ENTITIES, &value)?;
                }
                StoreMode::Local {
                    dir: PathBuf::from(
                        get(ENV_LOCAL_DIR).unwrap_or_else(|| DEFAULT_LOCAL_DIR.to_string()),
                    ),
                    limits,
                }
            }
        };

        let postal_base_url = parse_base_url(
            ENV_POSTAL_URL,
            &get(ENV_POSTAL_URL).unwrap_or_else(|| DEFAULT_POSTAL_URL.to_string()),
        )?;
        let share_function_url = get(ENV_SHARE_URL)
            .map(|value| parse_url(ENV_SHARE_URL, &value))
            .transpose()?;
        let http_timeout = match get(ENV_HTTP_TIMEOUT_SECS) {
            Some(value) => Duration::from_secs(parse_positive(ENV_HTTP_TIMEOUT_SECS, &value)? as u64),
            None => Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
        };

        Ok(Self {
            store,
            log_level: get(ENV_LOG_LEVEL).unwrap_or_else(|| default_log_level().to_string()),
            postal_base_url,
            share_function_url,
            http_timeout,
        })
    }
}

fn parse_url(key: &'static str, value: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(value).map_err(|err| ConfigError::InvalidUrl {
        key,
        value: value.to_string(),
        message: err.to_string(),
    })?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidUrl {
            key,
            value: value.to_string(),
            message: format!("unsupported scheme `{}`", url.scheme()),
        });
    }
    Ok(url)
}

/// Parses a base URL and guarantees a trailing slash so relative joins keep
/// the full path.
fn parse_base_url(key: &'static str, value: &str) -> Result<Url, ConfigError> {
    let mut url = parse_url(key, value)?;
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

fn parse_positive(key: &'static str, value: &str) -> Result<usize, ConfigError> {
    value
        .parse::<usize>()
        .ok()
        .filter(|number| *number > 0)
        .ok_or_else(|| ConfigError::InvalidNumber {
            key,
            value: value.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::{ConfigError, DashConfig, StoreMode};
    use std::collections::HashMap;
    use std::path::PathBuf;
    use std::time::Duration;

    fn config_from(pairs: &[(&str, &str)]) -> Result<DashConfig, ConfigError> {
        let map = pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect::<HashMap<_, _>>();
        DashConfig::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn defaults_to_local_mode() {
        let config = config_from(&[]).unwrap();
        match config.store {
            StoreMode::Local { dir, limits } => {
                assert_eq!(dir, PathBuf::from("dashmanager-data"));
                assert_eq!(limits.max_entities, 100);
            }
            other => panic!("unexpected mode {other:?}"),
        }
        assert_eq!(config.postal_base_url.as_str(), "https://viacep.com.br/");
        assert_eq!(config.http_timeout, Duration::from_secs(15));
        assert!(config.share_function_url.is_none());
    }

    #[test]
    fn remote_url_requires_key() {
        let err = config_from(&[("DASHMANAGER_REMOTE_URL", "https://x.example.co")]).unwrap_err();
        assert_eq!(err, ConfigError::MissingCredential("DASHMANAGER_REMOTE_KEY"));
    }

    #[test]
    fn remote_mode_wins_over_sqlite_path() {
        let config = config_from(&[
            ("DASHMANAGER_REMOTE_URL", "https://x.example.co/base"),
            ("DASHMANAGER_REMOTE_KEY", "anon"),
            ("DASHMANAGER_DB_PATH", "/tmp/dash.sqlite3"),
        ])
        .unwrap();
        match config.store {
            StoreMode::Rest { url, api_key } => {
                assert_eq!(url.as_str(), "https://x.example.co/base/");
                assert_eq!(api_key, "anon");
            }
            other => panic!("unexpected mode {other:?}"),
        }
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(matches!(
            config_from(&[
                ("DASHMANAGER_REMOTE_URL", "ftp://x"),
                ("DASHMANAGER_REMOTE_KEY", "k")
            ]),
            Err(ConfigError::InvalidUrl { .. })
        ));
        assert!(matches!(
            config_from(&[("DASHMANAGER_LOCAL_MAX_ENTITIES", "0")]),
            Err(ConfigError::InvalidNumber { .. })
        ));
        assert!(matches!(
            config_from(&[("DASHMANAGER_SHARE_URL", "not a url")]),
            Err(ConfigError::InvalidUrl { .. })
        ));
    }

    #[test]
    fn sqlite_mode_from_path() {
        let config = config_from(&[("DASHMANAGER_DB_PATH", " /tmp/dash.sqlite3 ")]).unwrap();
        assert_eq!(
            config.store,
            StoreMode::Sqlite {
                path: PathBuf::from("/tmp/dash.sqlite3")
            }
        );
    }
}
