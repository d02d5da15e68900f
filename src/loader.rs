use crate::cache::{CacheLookup, CachePort, Clock, DEFAULT_TTL, SystemClock, read_entry, write_entry};
use crate::error::FetchFailure;
use crate::hierarchy::{HierarchyIndex, IndexSnapshot, build_index};
use crate::report::ReportProfile;
use async_trait::async_trait;
use log::{debug, info, warn};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

/// Where dropdown payloads come from.
#[async_trait]
pub trait DropdownSource: Send + Sync {
    async fn fetch_dropdowns(&self, profile: &ReportProfile) -> Result<Value, FetchFailure>;
}

/// A source that always returns the same payload, e.g. one read from a file.
pub struct StaticSource {
    payload: Value,
}

impl StaticSource {
    pub fn new(payload: Value) -> Self {
        StaticSource { payload }
    }
}

#[async_trait]
impl DropdownSource for StaticSource {
    async fn fetch_dropdowns(&self, _profile: &ReportProfile) -> Result<Value, FetchFailure> {
        Ok(self.payload.clone())
    }
}

/// Loads one form's hierarchy index: session cache first, then the dropdown endpoint.
///
/// All dropdowns of a form share one loader. The first call to [`index`](Self::index)
/// does the cache check and fetch while holding the slot lock, so concurrent callers
/// wait for that single fetch instead of starting their own.
pub struct HierarchyLoader {
    profile: ReportProfile,
    source: Arc<dyn DropdownSource>,
    cache: Arc<dyn CachePort>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
    slot: Mutex<Option<Arc<HierarchyIndex>>>,
}

impl HierarchyLoader {
    pub fn new(
        profile: ReportProfile,
        source: Arc<dyn DropdownSource>,
        cache: Arc<dyn CachePort>,
    ) -> Self {
        HierarchyLoader {
            profile,
            source,
            cache,
            clock: Arc::new(SystemClock),
            ttl: DEFAULT_TTL,
            slot: Mutex::new(None),
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn profile(&self) -> &ReportProfile {
        &self.profile
    }

    pub async fn index(&self) -> Arc<HierarchyIndex> {
        let mut slot = self.slot.lock().await;
        if let Some(index) = slot.as_ref() {
            return Arc::clone(index);
        }

        let index = Arc::new(self.load().await);
        *slot = Some(Arc::clone(&index));
        index
    }

    /// Forget the loaded index so the next call goes back to the cache and source.
    pub async fn invalidate(&self) {
        self.slot.lock().await.take();
    }

    async fn load(&self) -> HierarchyIndex {
        let key = self.profile.cache_key.as_str();

        match read_entry::<IndexSnapshot>(
            self.cache.as_ref(),
            key,
            self.ttl,
            self.clock.now_millis(),
        ) {
            CacheLookup::Fresh(snapshot) => {
                debug!("using cached dropdown data for '{}'", self.profile.name);
                return HierarchyIndex::from_snapshot(snapshot);
            }
            CacheLookup::Stale { age_millis } => {
                debug!(
                    "cached dropdown data for '{}' is {} ms old, refetching",
                    self.profile.name, age_millis
                );
                self.cache.remove(key);
            }
            CacheLookup::Missing => {}
            CacheLookup::Corrupt(e) => {
                warn!("discarding corrupt cache entry '{}': {}", key, e);
                self.cache.remove(key);
            }
        }

        let raw = match self.source.fetch_dropdowns(&self.profile).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!("dropdown fetch for '{}' failed: {}", self.profile.name, e);
                return HierarchyIndex::empty();
            }
        };

        let index = build_index(&raw);
        info!(
            "loaded dropdown data for '{}' ({} issues)",
            self.profile.name,
            index.issues().len()
        );

        if let Err(e) = write_entry(
            self.cache.as_ref(),
            key,
            &index.snapshot(),
            self.ttl,
            self.clock.now_millis(),
        ) {
            warn!("could not cache dropdown data for '{}': {}", self.profile.name, e);
        }

        index
    }
}
