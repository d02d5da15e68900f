use crate::error::CacheError;
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use log::{debug, warn};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

/// Default freshness window for cached dropdown data.
pub const DEFAULT_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Session-scoped key/value store for dropdown payloads.
///
/// `ttl` is advisory. Freshness is always decided by the reader through
/// [`read_entry`], never by the storage layer.
pub trait CachePort: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: String, ttl: Duration);
    fn remove(&self, key: &str);
}

/// Source of "now" in epoch milliseconds.
pub trait Clock: Send + Sync {
    fn now_millis(&self) -> i64;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}

/// A clock that only moves when told to.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicI64,
}

impl ManualClock {
    pub fn new(now_millis: i64) -> Self {
        ManualClock {
            now: AtomicI64::new(now_millis),
        }
    }

    pub fn advance(&self, by: Duration) {
        self.now.fetch_add(by.as_millis() as i64, Ordering::SeqCst);
    }

    pub fn set(&self, now_millis: i64) {
        self.now.store(now_millis, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_millis(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}

/// What is stored under a cache key: the payload and when it was fetched.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct CacheEntry<T> {
    pub data: T,
    pub timestamp: i64,
}

impl<T> CacheEntry<T> {
    pub fn is_fresh(&self, now_millis: i64, ttl: Duration) -> bool {
        now_millis.saturating_sub(self.timestamp) < ttl_millis(ttl)
    }
}

// TTLs beyond the i64 millisecond range never expire.
fn ttl_millis(ttl: Duration) -> i64 {
    i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX)
}

#[derive(Debug, PartialEq)]
pub enum CacheLookup<T> {
    Fresh(T),
    /// Present but expired; the caller refetches and the payload is dropped.
    Stale { age_millis: i64 },
    Missing,
    Corrupt(String),
}

pub fn read_entry<T: DeserializeOwned>(
    port: &dyn CachePort,
    key: &str,
    ttl: Duration,
    now_millis: i64,
) -> CacheLookup<T> {
    let Some(raw) = port.get(key) else {
        return CacheLookup::Missing;
    };

    match serde_json::from_str::<CacheEntry<T>>(&raw) {
        Ok(entry) if entry.is_fresh(now_millis, ttl) => CacheLookup::Fresh(entry.data),
        Ok(entry) => CacheLookup::Stale {
            age_millis: now_millis.saturating_sub(entry.timestamp),
        },
        Err(e) => CacheLookup::Corrupt(e.to_string()),
    }
}

pub fn write_entry<T: Serialize>(
    port: &dyn CachePort,
    key: &str,
    data: &T,
    ttl: Duration,
    now_millis: i64,
) -> Result<(), CacheError> {
    let entry = CacheEntry {
        data,
        timestamp: now_millis,
    };
    port.set(key, serde_json::to_string(&entry)?, ttl);
    Ok(())
}

/// In-process cache; the equivalent of one browser tab's session storage.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl CachePort for MemoryCache {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.read().ok()?.get(key).cloned()
    }

    fn set(&self, key: &str, value: String, _ttl: Duration) {
        if let Ok(mut entries) = self.entries.write() {
            entries.insert(key.to_string(), value);
        }
    }

    fn remove(&self, key: &str) {
        if let Ok(mut entries) = self.entries.write() {
            entries.remove(key);
        }
    }
}

/// Cache persisted as one gzip-compressed JSON file per key.
///
/// Lets the CLI keep dropdown data across runs. Read and write failures are logged
/// and behave like a miss.
#[derive(Debug, Clone)]
pub struct FileCache {
    dir: PathBuf,
}

impl FileCache {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, CacheError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(FileCache { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let name: String = key
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        self.dir.join(format!("{}.json.gz", name))
    }

    pub fn try_get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let path = self.path_for(key);
        if !path.exists() {
            return Ok(None);
        }
        let decoder = GzDecoder::new(File::open(path)?);
        let value: serde_json::Value = serde_json::from_reader(BufReader::new(decoder))?;
        Ok(Some(value.to_string()))
    }

    pub fn try_set(&self, key: &str, value: &str) -> Result<(), CacheError> {
        let file = File::create(self.path_for(key))?;
        let encoder = GzEncoder::new(file, Compression::default());
        let mut writer = BufWriter::new(encoder);
        writer.write_all(value.as_bytes())?;
        writer
            .into_inner()
            .map_err(|e| CacheError::Io(e.into_error()))?
            .finish()?;
        Ok(())
    }
}

impl CachePort for FileCache {
    fn get(&self, key: &str) -> Option<String> {
        match self.try_get(key) {
            Ok(value) => value,
            Err(e) => {
                warn!("ignoring unreadable cache entry '{}': {}", key, e);
                None
            }
        }
    }

    fn set(&self, key: &str, value: String, _ttl: Duration) {
        match self.try_set(key, &value) {
            Ok(()) => debug!("cached '{}' in {}", key, self.dir.display()),
            Err(e) => warn!("could not cache '{}': {}", key, e),
        }
    }

    fn remove(&self, key: &str) {
        let path = self.path_for(key);
        if path.exists() {
            if let Err(e) = fs::remove_file(&path) {
                warn!("could not remove cache entry '{}': {}", key, e);
            }
        }
    }
}
