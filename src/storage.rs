use crate::error::{OverlayError, OverlayResult};
use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, de::IgnoredAny, Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tracing::{debug, warn};

/// Persistent string key/value storage behind a [`Cache`].
pub trait CacheStore: Send + Sync {
    fn read(&self, key: &str) -> OverlayResult<Option<String>>;
    fn write(&self, key: &str, value: &str) -> OverlayResult<()>;
    fn remove(&self, key: &str) -> OverlayResult<()>;
    fn keys(&self) -> OverlayResult<Vec<String>>;
}

type SharedEntries = Arc<Mutex<HashMap<String, String>>>;

/// In-process store, lost when the process exits.
#[derive(Clone, Default)]
pub struct MemoryStore {
    pub data: SharedEntries,
}

impl MemoryStore {
    pub fn new() -> MemoryStore {
        MemoryStore::default()
    }
}

impl CacheStore for MemoryStore {
    fn read(&self, key: &str) -> OverlayResult<Option<String>> {
        let data = self.data.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(data.get(key).cloned())
    }

    fn write(&self, key: &str, value: &str) -> OverlayResult<()> {
        let mut data = self.data.lock().unwrap_or_else(PoisonError::into_inner);
        data.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> OverlayResult<()> {
        let mut data = self.data.lock().unwrap_or_else(PoisonError::into_inner);
        data.remove(key);
        Ok(())
    }

    fn keys(&self) -> OverlayResult<Vec<String>> {
        let data = self.data.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(data.keys().cloned().collect())
    }
}

/// One `<key>.json` file per entry in a directory.
///
/// Keys are escaped so that profile URLs can be used as keys: anything outside
/// `[A-Za-z0-9._-]` is written as `%XX`.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> OverlayResult<FileStore> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(FileStore { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", encode_key(key)))
    }
}

impl CacheStore for FileStore {
    fn read(&self, key: &str) -> OverlayResult<Option<String>> {
        match fs::read_to_string(self.path_for(key)) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn write(&self, key: &str, value: &str) -> OverlayResult<()> {
        Ok(fs::write(self.path_for(key), value)?)
    }

    fn remove(&self, key: &str) -> OverlayResult<()> {
        match fs::remove_file(self.path_for(key)) {
            Err(e) if e.kind() != ErrorKind::NotFound => Err(e.into()),
            _ => Ok(()),
        }
    }

    fn keys(&self) -> OverlayResult<Vec<String>> {
        let mut keys = vec![];
        for entry in fs::read_dir(&self.dir)? {
            let name = entry?.file_name();
            if let Some(key) = name
                .to_str()
                .and_then(|n| n.strip_suffix(".json"))
                .and_then(decode_key)
            {
                keys.push(key);
            }
        }
        Ok(keys)
    }
}

fn encode_key(key: &str) -> String {
    key.bytes()
        .map(|b| match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'.' | b'_' | b'-' => (b as char).to_string(),
            _ => format!("%{:02X}", b),
        })
        .collect()
}

fn decode_key(encoded: &str) -> Option<String> {
    let bytes = encoded.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = encoded.get(i + 1..i + 3)?;
            out.push(u8::from_str_radix(hex, 16).ok()?);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(out).ok()
}

/// Stored envelope. `timestamp` is in epoch milliseconds.
#[derive(Debug, Serialize, Deserialize)]
pub struct CacheEntry<T> {
    pub data: T,
    pub timestamp: i64,
}

pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CacheStatus {
    pub key: String,
    pub age_sec: i64,
    pub expired: bool,
}

impl fmt::Display for CacheStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{} ({}s old{})",
            self.key,
            self.age_sec,
            if self.expired { ", expired" } else { "" }
        )
    }
}

/// Key/value cache with a fixed time-to-live, on top of a [`CacheStore`].
///
/// Every key is stored as `<namespace>_<key>` so that several caches can share
/// one store and [`Cache::clear_all`] only touches its own entries. Entries are
/// expired once `now - timestamp >= ttl` and removed as soon as a read finds them
/// expired or unreadable.
#[derive(Clone)]
pub struct Cache {
    store: Arc<dyn CacheStore>,
    namespace: String,
    ttl: Duration,
    clock: Clock,
}

impl Cache {
    pub fn new(store: Arc<dyn CacheStore>, namespace: &str, ttl: Duration) -> Cache {
        Cache {
            store,
            namespace: namespace.to_string(),
            ttl,
            clock: Arc::new(Utc::now),
        }
    }

    pub fn with_clock(mut self, clock: Clock) -> Cache {
        self.clock = clock;
        self
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn full_key(&self, key: &str) -> String {
        format!("{}_{}", self.namespace, key)
    }

    fn now_millis(&self) -> i64 {
        (self.clock)().timestamp_millis()
    }

    fn is_expired(&self, timestamp: i64) -> bool {
        let age = self.now_millis() - timestamp;
        age >= self.ttl.as_millis() as i64
    }

    fn read_entry<T: DeserializeOwned>(&self, full_key: &str) -> Option<CacheEntry<T>> {
        let raw = match self.store.read(full_key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                warn!("Failed to read cache entry {full_key}: {e}");
                return None;
            }
        };
        match serde_json::from_str::<CacheEntry<T>>(&raw) {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!("Dropping corrupt cache entry {full_key}: {e}");
                self.remove(full_key);
                None
            }
        }
    }

    fn remove(&self, full_key: &str) {
        if let Err(e) = self.store.remove(full_key) {
            warn!("Failed to remove cache entry {full_key}: {e}");
        }
    }

    /// Fresh value for `key`, if any.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let full_key = self.full_key(key);
        let entry = self.read_entry::<T>(&full_key)?;
        if self.is_expired(entry.timestamp) {
            debug!("Cache entry {full_key} expired");
            self.remove(&full_key);
            return None;
        }
        Some(entry.data)
    }

    /// Value for `key` regardless of its age.
    pub fn get_stale<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.read_entry::<T>(&self.full_key(key))
            .map(|entry| entry.data)
    }

    pub fn set<T: Serialize>(&self, key: &str, value: &T) {
        let full_key = self.full_key(key);
        let entry = CacheEntry {
            data: value,
            timestamp: self.now_millis(),
        };
        let written = serde_json::to_string(&entry)
            .map_err(OverlayError::from)
            .and_then(|raw| self.store.write(&full_key, &raw));
        match written {
            Ok(()) => debug!("Cached {full_key}"),
            Err(e) => warn!("Failed to cache {full_key}: {e}"),
        }
    }

    pub fn clear(&self, key: &str) {
        self.remove(&self.full_key(key));
    }

    fn own_keys(&self) -> Vec<String> {
        let prefix = format!("{}_", self.namespace);
        match self.store.keys() {
            Ok(keys) => keys.into_iter().filter(|k| k.starts_with(&prefix)).collect(),
            Err(e) => {
                warn!("Failed to list cache entries: {e}");
                vec![]
            }
        }
    }

    pub fn clear_all(&self) {
        for key in self.own_keys() {
            self.remove(&key);
        }
    }

    /// Age and expiry of every entry of this cache, for diagnostics.
    pub fn status(&self) -> Vec<CacheStatus> {
        let now = self.now_millis();
        let mut statuses = self
            .own_keys()
            .into_iter()
            .filter_map(|key| {
                let entry = self.read_entry::<IgnoredAny>(&key)?;
                Some(CacheStatus {
                    age_sec: (now - entry.timestamp) / 1000,
                    expired: self.is_expired(entry.timestamp),
                    key,
                })
            })
            .collect::<Vec<CacheStatus>>();
        statuses.sort_by(|a, b| a.key.cmp(&b.key));
        statuses
    }
}
