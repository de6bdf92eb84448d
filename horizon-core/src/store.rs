//! Persisted key/value state: user preferences and one fetch record per feed.

use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};

use chrono::NaiveTime;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::Value;
use tracing::{debug, warn};

use crate::{error::StoreError, model::Units};

const KEY_UNITS: &str = "units";
const KEY_DEFAULT_CITY: &str = "defaultCity";
const KEY_NOTIFICATIONS_ENABLED: &str = "notificationsEnabled";
const KEY_NOTIFICATION_TIME: &str = "notificationTime";

const NOTIFICATION_TIME_FORMAT: &str = "%H:%M";

/// Raw key/value surface the preference store is built on.
pub trait KeyValueStore: Send + Sync + std::fmt::Debug {
    fn get(&self, key: &str) -> Option<Value>;
    fn set(&self, key: &str, value: Value) -> Result<(), StoreError>;
    fn remove(&self, key: &str) -> Result<(), StoreError>;
}

/// Process-local store, lost on exit.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<BTreeMap<String, Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<Value> {
        self.entries.lock().get(key).cloned()
    }

    fn set(&self, key: &str, value: Value) -> Result<(), StoreError> {
        self.entries.lock().insert(key.to_string(), value);
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.entries.lock().remove(key);
        Ok(())
    }
}

/// JSON object on disk, rewritten in full after every mutation.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    entries: Mutex<BTreeMap<String, Value>>,
}

impl FileStore {
    /// Open the store at `path`, starting empty if the file does not exist yet.
    ///
    /// A file that does not parse is moved aside to `<path>.corrupt` and the
    /// store starts empty.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let entries = if path.exists() {
            let contents = fs::read_to_string(&path)?;
            if contents.trim().is_empty() {
                BTreeMap::new()
            } else {
                match serde_json::from_str(&contents) {
                    Ok(entries) => entries,
                    Err(e) => {
                        Self::quarantine(&path, &e);
                        BTreeMap::new()
                    }
                }
            }
        } else {
            BTreeMap::new()
        };

        debug!(path = %path.display(), keys = entries.len(), "Opened preference store");
        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn corrupt_path(path: &Path) -> PathBuf {
        let mut name = path.as_os_str().to_owned();
        name.push(".corrupt");
        PathBuf::from(name)
    }

    fn quarantine(path: &Path, error: &serde_json::Error) {
        let aside = Self::corrupt_path(path);
        match fs::rename(path, &aside) {
            Ok(()) => warn!(
                path = %path.display(),
                moved_to = %aside.display(),
                error = %error,
                "Preference store is unreadable, starting empty"
            ),
            Err(e) => warn!(
                path = %path.display(),
                error = %error,
                rename_error = %e,
                "Preference store is unreadable and could not be moved aside, starting empty"
            ),
        }
    }

    fn flush(&self, entries: &BTreeMap<String, Value>) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        // Rename over the old file so a crash never leaves half a document.
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_vec_pretty(entries)?)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Option<Value> {
        self.entries.lock().get(key).cloned()
    }

    fn set(&self, key: &str, value: Value) -> Result<(), StoreError> {
        let mut entries = self.entries.lock();
        entries.insert(key.to_string(), value);
        self.flush(&entries)
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        let mut entries = self.entries.lock();
        if entries.remove(key).is_some() {
            self.flush(&entries)?;
        }
        Ok(())
    }
}

/// The two remote feeds that keep a fetch record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Feed {
    Weather,
    Aqi,
}

impl Feed {
    pub fn as_str(&self) -> &'static str {
        match self {
            Feed::Weather => "weather",
            Feed::Aqi => "aqi",
        }
    }

    fn record_key(&self) -> &'static str {
        match self {
            Feed::Weather => "weatherRecord",
            Feed::Aqi => "aqiRecord",
        }
    }
}

impl std::fmt::Display for Feed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Last successful fetch of one feed.
///
/// Timestamp and payload only change together through [`FetchRecord::fetched`],
/// and the record is stored under a single key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FetchRecord<T> {
    last_fetch_epoch: Option<i64>,
    cached_payload: Option<T>,
}

impl<T> Default for FetchRecord<T> {
    fn default() -> Self {
        Self {
            last_fetch_epoch: None,
            cached_payload: None,
        }
    }
}

impl<T> FetchRecord<T> {
    pub fn fetched(at: i64, payload: T) -> Self {
        Self {
            last_fetch_epoch: Some(at),
            cached_payload: Some(payload),
        }
    }

    pub fn last_fetch_epoch(&self) -> Option<i64> {
        self.last_fetch_epoch
    }

    pub fn cached_payload(&self) -> Option<&T> {
        self.cached_payload.as_ref()
    }

    pub fn into_payload(self) -> Option<T> {
        self.cached_payload
    }
}

/// User-controlled settings, independent of fetch records.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Preferences {
    pub units: Units,
    pub default_city: Option<String>,
    pub notifications_enabled: bool,
    pub notification_time: Option<NaiveTime>,
}

/// Typed accessors over a [`KeyValueStore`], shared by every component.
#[derive(Debug)]
pub struct PreferenceStore {
    backend: Box<dyn KeyValueStore>,
}

impl PreferenceStore {
    pub fn new(backend: impl KeyValueStore + 'static) -> Self {
        Self {
            backend: Box::new(backend),
        }
    }

    /// Preferences backed by a [`FileStore`] at `path`.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        Ok(Self::new(FileStore::open(path)?))
    }

    pub fn in_memory() -> Self {
        Self::new(MemoryStore::new())
    }

    // ===== Primitive accessors =====

    pub fn get_string(&self, key: &str) -> Option<String> {
        match self.backend.get(key)? {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn set_string(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.backend.set(key, Value::String(value.to_string()))
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.backend.get(key)?.as_bool()
    }

    pub fn set_bool(&self, key: &str, value: bool) -> Result<(), StoreError> {
        self.backend.set(key, Value::Bool(value))
    }

    pub fn get_f64(&self, key: &str) -> Option<f64> {
        self.backend.get(key)?.as_f64()
    }

    pub fn set_f64(&self, key: &str, value: f64) -> Result<(), StoreError> {
        let number = serde_json::Number::from_f64(value).ok_or_else(|| {
            StoreError::Serialization(serde::ser::Error::custom(format!(
                "cannot store non-finite number {value} under {key}"
            )))
        })?;
        self.backend.set(key, Value::Number(number))
    }

    pub fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StoreError> {
        match self.backend.get(key) {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    pub fn set_json<T: Serialize>(&self, key: &str, value: &T) -> Result<(), StoreError> {
        self.backend.set(key, serde_json::to_value(value)?)
    }

    pub fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.backend.remove(key)
    }

    // ===== Fetch records =====

    /// Load a feed's record; an unreadable record is treated as empty.
    pub fn load_record<T: DeserializeOwned>(&self, feed: Feed) -> FetchRecord<T> {
        match self.get_json::<FetchRecord<T>>(feed.record_key()) {
            Ok(Some(record)) => record,
            Ok(None) => FetchRecord::default(),
            Err(e) => {
                warn!(feed = %feed, error = %e, "Discarding unreadable fetch record");
                FetchRecord::default()
            }
        }
    }

    pub fn save_record<T: Serialize>(
        &self,
        feed: Feed,
        record: &FetchRecord<T>,
    ) -> Result<(), StoreError> {
        self.set_json(feed.record_key(), record)
    }

    pub fn last_fetch_epoch(&self, feed: Feed) -> Option<i64> {
        self.load_record::<Value>(feed).last_fetch_epoch()
    }

    // ===== Preferences =====

    pub fn units(&self) -> Units {
        self.get_string(KEY_UNITS)
            .and_then(|s| Units::try_from(s.as_str()).ok())
            .unwrap_or_default()
    }

    pub fn set_units(&self, units: Units) -> Result<(), StoreError> {
        self.set_string(KEY_UNITS, units.as_str())
    }

    pub fn default_city(&self) -> Option<String> {
        self.get_string(KEY_DEFAULT_CITY)
            .filter(|city| !city.trim().is_empty())
    }

    pub fn set_default_city(&self, city: &str) -> Result<(), StoreError> {
        self.set_string(KEY_DEFAULT_CITY, city.trim())
    }

    pub fn clear_default_city(&self) -> Result<(), StoreError> {
        self.remove(KEY_DEFAULT_CITY)
    }

    pub fn notifications_enabled(&self) -> bool {
        self.get_bool(KEY_NOTIFICATIONS_ENABLED).unwrap_or(false)
    }

    pub fn set_notifications_enabled(&self, enabled: bool) -> Result<(), StoreError> {
        self.set_bool(KEY_NOTIFICATIONS_ENABLED, enabled)
    }

    pub fn notification_time(&self) -> Option<NaiveTime> {
        let raw = self.get_string(KEY_NOTIFICATION_TIME)?;
        NaiveTime::parse_from_str(&raw, NOTIFICATION_TIME_FORMAT).ok()
    }

    pub fn set_notification_time(&self, time: NaiveTime) -> Result<(), StoreError> {
        self.set_string(
            KEY_NOTIFICATION_TIME,
            &time.format(NOTIFICATION_TIME_FORMAT).to_string(),
        )
    }

    pub fn preferences(&self) -> Preferences {
        Preferences {
            units: self.units(),
            default_city: self.default_city(),
            notifications_enabled: self.notifications_enabled(),
            notification_time: self.notification_time(),
        }
    }
}
