//! Local persistence for the client.
//!
//! A [`KeyValueStore`] holds raw strings; [`LocalStorage`] layers JSON
//! encoding and the typed accessors on top. No operation panics. Every failure
//! is logged and handed back as a [`StorageError`].

use parking_lot::Mutex;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::path::PathBuf;
use tracing::{error, warn};

use super::error::StorageError;
use crate::db::{Priority, Reminder};

pub const CONFIG_KEY: &str = "reminders_config";
pub const MOCK_DATA_KEY: &str = "reminders_mock_data";
pub const SETTINGS_KEY: &str = "reminders_settings";
pub const SYNC_QUEUE_KEY: &str = "reminders_sync_queue";

/// Keys removed by [`LocalStorage::clear_all`]
pub const APP_KEYS: [&str; 3] = [CONFIG_KEY, MOCK_DATA_KEY, SETTINGS_KEY];

/// Raw string storage that may fail
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}

/// One `<key>.json` file per key under a directory
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StorageError> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !valid {
            return Err(StorageError::InvalidKey(key.to_string()));
        }
        Ok(self.dir.join(format!("{}.json", key)))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let path = self.path_for(key)?;
        match std::fs::read_to_string(&path) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let path = self.path_for(key)?;
        // Write then rename so a crash never leaves half a document behind
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, value)?;
        std::fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let path = self.path_for(key)?;
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// In-process store with an optional byte quota
#[derive(Debug, Default)]
pub struct MemoryStore {
    items: Mutex<HashMap<String, String>>,
    quota: Option<usize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject writes once keys plus values would exceed `bytes`
    pub fn with_quota(bytes: usize) -> Self {
        Self {
            items: Mutex::new(HashMap::new()),
            quota: Some(bytes),
        }
    }

    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.items.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut items = self.items.lock();
        if let Some(quota) = self.quota {
            let used: usize = items
                .iter()
                .filter(|(k, _)| k.as_str() != key)
                .map(|(k, v)| k.len() + v.len())
                .sum();
            let needed = key.len() + value.len();
            let available = quota.saturating_sub(used);
            if needed > available {
                return Err(StorageError::QuotaExceeded { needed, available });
            }
        }
        items.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.items.lock().remove(key);
        Ok(())
    }
}

/// JSON persistence over a [`KeyValueStore`]
#[derive(Debug)]
pub struct LocalStorage<S> {
    store: S,
}

impl<S: KeyValueStore> LocalStorage<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Read and decode a value. `Ok(None)` when the key is absent.
    pub fn get_item<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StorageError> {
        let raw = self.store.get(key).inspect_err(|e| {
            error!(key = %key, error = %e, "Failed to read from local storage");
        })?;

        let Some(raw) = raw else {
            return Ok(None);
        };

        serde_json::from_str(&raw).map(Some).map_err(|source| {
            error!(key = %key, error = %source, "Failed to parse stored value");
            StorageError::Parse {
                key: key.to_string(),
                source,
            }
        })
    }

    pub fn set_item<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<(), StorageError> {
        let raw = serde_json::to_string(value).map_err(|source| {
            error!(key = %key, error = %source, "Failed to serialize value");
            StorageError::Serialize {
                key: key.to_string(),
                source,
            }
        })?;

        self.store.set(key, &raw).inspect_err(|e| {
            error!(key = %key, error = %e, "Failed to write to local storage");
        })
    }

    pub fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        self.store.remove(key).inspect_err(|e| {
            error!(key = %key, error = %e, "Failed to remove from local storage");
        })
    }

    /// Remove every application key. All removals are attempted; the first
    /// failure is returned.
    pub fn clear_all(&self) -> Result<(), StorageError> {
        let mut first_error = None;
        for key in APP_KEYS {
            if let Err(e) = self.remove_item(key) {
                if first_error.is_none() {
                    first_error = Some(e);
                }
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Cached reminders, or the built-in samples when nothing usable is stored
    pub fn get_mock_data(&self) -> Vec<Reminder> {
        match self.get_item::<Value>(MOCK_DATA_KEY) {
            Ok(Some(value @ Value::Array(_))) => match serde_json::from_value(value) {
                Ok(reminders) => reminders,
                Err(e) => {
                    warn!(error = %e, "Cached reminders are unreadable, using samples");
                    sample_reminders()
                }
            },
            _ => sample_reminders(),
        }
    }

    pub fn save_mock_data(&self, reminders: &[Reminder]) -> Result<(), StorageError> {
        self.set_item(MOCK_DATA_KEY, reminders)
    }

    pub fn get_settings(&self) -> Map<String, Value> {
        match self.get_item::<Value>(SETTINGS_KEY) {
            Ok(Some(Value::Object(map))) => map,
            _ => Map::new(),
        }
    }

    pub fn save_settings(&self, settings: &Map<String, Value>) -> Result<(), StorageError> {
        self.set_item(SETTINGS_KEY, settings)
    }
}

/// Sample reminders shown before anything has been cached
pub fn sample_reminders() -> Vec<Reminder> {
    const CREATED: &str = "2025-01-01T09:00:00.000Z";

    let mut call = Reminder::new("sample-1", "Call mom about Thanksgiving plans", CREATED);
    call.priority = Priority::Important;
    call.category = Some("Calls".to_string());
    call.due_date = Some("2025-01-02".to_string());
    call.due_time = Some("18:00:00".to_string());

    let mut hardware = Reminder::new("sample-2", "Pick up nails at the hardware store", CREATED);
    hardware.category = Some("Errands".to_string());
    hardware.location_name = Some("Hardware store".to_string());
    hardware.location_lat = Some(37.7749);
    hardware.location_lng = Some(-122.4194);

    let mut bills = Reminder::new("sample-3", "Pay the electricity bill", CREATED);
    bills.priority = Priority::Urgent;
    bills.category = Some("Bills".to_string());
    bills.due_date = Some("2025-01-03".to_string());

    let mut book = Reminder::new("sample-4", "Read a chapter of that book", CREATED);
    book.priority = Priority::Someday;

    vec![call, hardware, bills, book]
}
