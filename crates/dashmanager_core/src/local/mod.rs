//! Degraded-mode persistence over a local key-value store.
//!
//! # Responsibility
//! - Persist the people/groups/locations collections as JSON arrays under
//!   fixed keys when no remote store is configured.
//! - Sanitize snapshots (text caps, image downscaling) and keep only the most
//!   recently touched entities per collection.
//!
//! # Invariants
//! - Each key holds a JSON array ordered from oldest to newest touch.
//! - A written snapshot never holds more than `max_entities` items.
//! - Touch order is tracked per key for the whole session, including
//!   entities that were trimmed from the persisted snapshot.

use crate::model::group::Group;
use crate::model::location::Location;
use crate::model::person::Person;
use crate::model::{EntityId, Keyed};
use log::{debug, warn};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

pub mod sanitize;

pub use sanitize::{sanitize_group, sanitize_location, sanitize_person, shrink_inline_image};

pub const DEFAULT_MAX_ENTITIES: usize = 100;
pub const DEFAULT_MAX_INLINE_IMAGE_BYTES: usize = 48 * 1024;
pub const DEFAULT_MAX_IMAGE_WIDTH: u32 = 320;
pub const DEFAULT_JPEG_QUALITY: u8 = 70;

/// Keys used in the local key-value store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreKey {
    People,
    Groups,
    Locations,
}

impl StoreKey {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::People => "people",
            Self::Groups => "groups",
            Self::Locations => "locations",
        }
    }
}

#[derive(Debug)]
pub enum LocalStoreError {
    Io(std::io::Error),
    QuotaExceeded { needed: usize, quota: usize },
    Serialize(serde_json::Error),
    Malformed { key: String, message: String },
}

impl Display for LocalStoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(err) => write!(f, "{err}"),
            Self::QuotaExceeded { needed, quota } => write!(
                f,
                "local storage quota exceeded: {needed} bytes needed, quota {quota}"
            ),
            Self::Serialize(err) => write!(f, "{err}"),
            Self::Malformed { key, message } => {
                write!(f, "malformed local data under `{key}`: {message}")
            }
        }
    }
}

impl Error for LocalStoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            Self::Serialize(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for LocalStoreError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<serde_json::Error> for LocalStoreError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serialize(value)
    }
}

/// String key-value storage, the local counterpart of browser storage.
pub trait KeyValueStore: Send {
    fn get(&self, key: &str) -> Result<Option<String>, LocalStoreError>;
    fn set(&mut self, key: &str, value: &str) -> Result<(), LocalStoreError>;
}

/// One JSON file per key inside a directory.
pub struct FileKvStore {
    dir: PathBuf,
}

impl FileKvStore {
    /// Creates the directory when missing.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, LocalStoreError> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl KeyValueStore for FileKvStore {
    fn get(&self, key: &str) -> Result<Option<String>, LocalStoreError> {
        match std::fs::read_to_string(self.path_for(key)) {
            Ok(text) => Ok(Some(text)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), LocalStoreError> {
        let target = self.path_for(key);
        let staging = self.dir.join(format!("{key}.json.tmp"));
        std::fs::write(&staging, value)?;
        std::fs::rename(&staging, &target)?;
        Ok(())
    }
}

/// In-memory store with an optional byte quota over all values.
///
/// Clones share the same entries.
#[derive(Clone, Default)]
pub struct MemoryKvStore {
    entries: Arc<Mutex<HashMap<String, String>>>,
    quota_bytes: Option<usize>,
}

impl MemoryKvStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_quota(quota_bytes: usize) -> Self {
        Self {
            entries: Arc::default(),
            quota_bytes: Some(quota_bytes),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        // A poisoned map still holds plain strings.
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl KeyValueStore for MemoryKvStore {
    fn get(&self, key: &str) -> Result<Option<String>, LocalStoreError> {
        Ok(self.lock().get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), LocalStoreError> {
        let mut entries = self.lock();
        if let Some(quota) = self.quota_bytes {
            let others = entries
                .iter()
                .filter(|(existing, _)| existing.as_str() != key)
                .map(|(existing, stored)| existing.len() + stored.len())
                .sum::<usize>();
            let needed = others + key.len() + value.len();
            if needed > quota {
                return Err(LocalStoreError::QuotaExceeded { needed, quota });
            }
        }
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Size and retention caps applied to every local write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalStoreLimits {
    pub max_entities: usize,
    pub max_inline_image_bytes: usize,
    pub max_image_width: u32,
    pub jpeg_quality: u8,
}

impl Default for LocalStoreLimits {
    fn default() -> Self {
        Self {
            max_entities: DEFAULT_MAX_ENTITIES,
            max_inline_image_bytes: DEFAULT_MAX_INLINE_IMAGE_BYTES,
            max_image_width: DEFAULT_MAX_IMAGE_WIDTH,
            jpeg_quality: DEFAULT_JPEG_QUALITY,
        }
    }
}

/// Collection snapshot persistence for degraded mode.
pub struct LocalStore {
    kv: Box<dyn KeyValueStore>,
    limits: LocalStoreLimits,
    touch_order: HashMap<StoreKey, Vec<EntityId>>,
}

impl LocalStore {
    pub fn new(kv: Box<dyn KeyValueStore>, limits: LocalStoreLimits) -> Self {
        Self {
            kv,
            limits,
            touch_order: HashMap::new(),
        }
    }

    pub fn limits(&self) -> LocalStoreLimits {
        self.limits
    }

    pub fn load_people(&mut self) -> Result<Vec<Person>, LocalStoreError> {
        self.load(StoreKey::People)
    }

    pub fn load_groups(&mut self) -> Result<Vec<Group>, LocalStoreError> {
        self.load(StoreKey::Groups)
    }

    pub fn load_locations(&mut self) -> Result<Vec<Location>, LocalStoreError> {
        self.load(StoreKey::Locations)
    }

    /// Persists the people snapshot; `touched` ids become the newest.
    ///
    /// Returns the number of persisted entries.
    pub fn save_people(
        &mut self,
        people: &[Person],
        touched: &[&str],
    ) -> Result<usize, LocalStoreError> {
        let limits = self.limits;
        self.save(StoreKey::People, people, touched, |person| {
            sanitize_person(person, &limits)
        })
    }

    pub fn save_groups(
        &mut self,
        groups: &[Group],
        touched: &[&str],
    ) -> Result<usize, LocalStoreError> {
        let limits = self.limits;
        self.save(StoreKey::Groups, groups, touched, |group| {
            sanitize_group(group, &limits)
        })
    }

    pub fn save_locations(
        &mut self,
        locations: &[Location],
        touched: &[&str],
    ) -> Result<usize, LocalStoreError> {
        let limits = self.limits;
        self.save(StoreKey::Locations, locations, touched, |location| {
            sanitize_location(location, &limits)
        })
    }

    fn load<T>(&mut self, key: StoreKey) -> Result<Vec<T>, LocalStoreError>
    where
        T: DeserializeOwned + Keyed,
    {
        let items = match self.kv.get(key.as_str())? {
            Some(text) => {
                serde_json::from_str::<Vec<T>>(&text).map_err(|err| LocalStoreError::Malformed {
                    key: key.as_str().to_string(),
                    message: err.to_string(),
                })?
            }
            None => Vec::new(),
        };

        self.touch_order.insert(
            key,
            items.iter().map(|item| item.key_id().to_string()).collect(),
        );
        Ok(items)
    }

    fn save<T, F>(
        &mut self,
        key: StoreKey,
        items: &[T],
        touched: &[&str],
        sanitize: F,
    ) -> Result<usize, LocalStoreError>
    where
        T: Serialize + Keyed,
        F: Fn(&T) -> T,
    {
        let order = self.touch_order.entry(key).or_default();
        order.retain(|id| items.iter().any(|item| item.key_id() == id));
        for item in items {
            if !order.iter().any(|id| id == item.key_id()) {
                order.push(item.key_id().to_string());
            }
        }
        for id in touched {
            if let Some(position) = order.iter().position(|existing| existing == id) {
                let moved = order.remove(position);
                order.push(moved);
            }
        }

        let keep_from = order.len().saturating_sub(self.limits.max_entities);
        let snapshot = order[keep_from..]
            .iter()
            .filter_map(|id| items.iter().find(|item| item.key_id() == id))
            .map(&sanitize)
            .collect::<Vec<_>>();

        if keep_from > 0 {
            debug!(
                "event=local_trim module=local status=ok key={} dropped={} kept={}",
                key.as_str(),
                keep_from,
                snapshot.len()
            );
        }

        let text = serde_json::to_string(&snapshot)?;
        if let Err(err) = self.kv.set(key.as_str(), &text) {
            warn!(
                "event=local_write module=local status=error key={} bytes={} error={}",
                key.as_str(),
                text.len(),
                err
            );
            return Err(err);
        }
        Ok(snapshot.len())
    }
}
