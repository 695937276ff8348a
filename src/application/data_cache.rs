// Data cache - TTL key/value store with insertion-order eviction
use indexmap::IndexMap;
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;

pub const DEFAULT_MAX_SIZE: usize = 100;
pub const DEFAULT_TTL: Duration = Duration::from_secs(5 * 60);
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
pub struct CacheEntry<T> {
    pub key: String,
    pub data: T,
    pub timestamp: Instant,
    pub expires_at: Instant,
}

impl<T> CacheEntry<T> {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    pub size: usize,
    pub hit_rate: f64,
    pub max_size: usize,
}

/// Key/value cache with per-entry expiry.
///
/// Eviction removes the oldest *inserted* entry when a new key arrives at
/// capacity; reads do not refresh an entry's position. Expired entries are
/// dropped lazily on read and by [`DataCache::sweep`].
#[derive(Debug)]
pub struct DataCache<T> {
    entries: IndexMap<String, CacheEntry<T>>,
    max_size: usize,
    default_ttl: Duration,
    hits: u64,
    misses: u64,
}

impl<T: Clone> Default for DataCache<T> {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_SIZE, DEFAULT_TTL)
    }
}

impl<T: Clone> DataCache<T> {
    pub fn new(max_size: usize, default_ttl: Duration) -> Self {
        Self {
            entries: IndexMap::new(),
            max_size: max_size.max(1),
            default_ttl,
            hits: 0,
            misses: 0,
        }
    }

    pub fn get(&mut self, key: &str) -> Option<T> {
        self.get_at(key, Instant::now())
    }

    pub fn get_at(&mut self, key: &str, now: Instant) -> Option<T> {
        let expired = match self.entries.get(key) {
            None => {
                self.misses += 1;
                return None;
            }
            Some(entry) => entry.is_expired(now),
        };

        if expired {
            self.entries.shift_remove(key);
            self.misses += 1;
            return None;
        }

        self.hits += 1;
        self.entries.get(key).map(|entry| entry.data.clone())
    }

    pub fn set(&mut self, key: impl Into<String>, data: T, ttl: Option<Duration>) {
        self.set_at(key, data, ttl, Instant::now());
    }

    pub fn set_at(&mut self, key: impl Into<String>, data: T, ttl: Option<Duration>, now: Instant) {
        let key = key.into();
        if !self.entries.contains_key(&key) && self.entries.len() >= self.max_size {
            if let Some((_, evicted)) = self.entries.shift_remove_index(0) {
                tracing::trace!(
                    "Cache full, evicting {} (cached {:?} ago)",
                    evicted.key,
                    now.saturating_duration_since(evicted.timestamp)
                );
            }
        }

        let ttl = ttl.unwrap_or(self.default_ttl);
        let entry = CacheEntry {
            key: key.clone(),
            data,
            timestamp: now,
            expires_at: now + ttl,
        };
        // Overwriting keeps the key's original insertion position.
        self.entries.insert(key, entry);
    }

    pub fn has(&self, key: &str) -> bool {
        self.has_at(key, Instant::now())
    }

    pub fn has_at(&self, key: &str, now: Instant) -> bool {
        self.entries
            .get(key)
            .is_some_and(|entry| !entry.is_expired(now))
    }

    pub fn remove(&mut self, key: &str) -> bool {
        self.entries.shift_remove(key).is_some()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.hits = 0;
        self.misses = 0;
    }

    /// Drop every expired entry, returning how many were removed.
    pub fn sweep(&mut self) -> usize {
        self.sweep_at(Instant::now())
    }

    pub fn sweep_at(&mut self, now: Instant) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired(now));
        before - self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        let total = self.hits + self.misses;
        let hit_rate = if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        };
        CacheStats {
            size: self.entries.len(),
            hit_rate,
            max_size: self.max_size,
        }
    }
}

pub type SharedCache<T> = Arc<Mutex<DataCache<T>>>;

/// Run [`DataCache::sweep`] on a fixed interval until the handle is aborted.
pub fn spawn_sweeper<T>(cache: SharedCache<T>, every: Duration) -> JoinHandle<()>
where
    T: Clone + Send + 'static,
{
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        // The first tick completes immediately
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let removed = cache.lock().sweep();
            if removed > 0 {
                tracing::debug!("Cache sweep removed {} expired entries", removed);
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expiry_on_read() {
        let mut cache = DataCache::new(10, DEFAULT_TTL);
        let start = Instant::now();
        cache.set_at("tb", 42, Some(Duration::from_millis(100)), start);

        assert_eq!(cache.get_at("tb", start), Some(42));
        assert_eq!(cache.get_at("tb", start + Duration::from_millis(101)), None);
        assert!(cache.is_empty());

        let stats = cache.stats();
        assert_eq!(stats.size, 0);
        assert!((stats.hit_rate - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_eviction_drops_first_inserted() {
        let mut cache = DataCache::new(3, DEFAULT_TTL);
        let now = Instant::now();
        for key in ["a", "b", "c"] {
            cache.set_at(key, key.to_string(), None, now);
        }
        // Reads do not protect an entry from eviction
        cache.get_at("a", now);
        cache.set_at("d", "d".to_string(), None, now);

        assert_eq!(cache.len(), 3);
        assert!(!cache.has_at("a", now));
        assert!(cache.has_at("d", now));
    }

    #[test]
    fn test_overwrite_at_capacity_does_not_evict() {
        let mut cache = DataCache::new(2, DEFAULT_TTL);
        let now = Instant::now();
        cache.set_at("a", 1, None, now);
        cache.set_at("b", 2, None, now);
        cache.set_at("a", 3, None, now);

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get_at("a", now), Some(3));
        assert_eq!(cache.get_at("b", now), Some(2));
    }

    #[test]
    fn test_has_does_not_count() {
        let mut cache = DataCache::new(2, DEFAULT_TTL);
        cache.set("a", 1, None);
        assert!(cache.has("a"));
        assert!(!cache.has("b"));
        assert_eq!(cache.stats().hit_rate, 0.0);
    }

    #[test]
    fn test_sweep_and_clear() {
        let mut cache = DataCache::new(10, DEFAULT_TTL);
        let now = Instant::now();
        cache.set_at("short", 1, Some(Duration::from_millis(10)), now);
        cache.set_at("long", 2, Some(Duration::from_secs(60)), now);
        cache.get_at("long", now);
        cache.get_at("missing", now);

        assert_eq!(cache.sweep_at(now + Duration::from_millis(20)), 1);
        assert!(cache.has_at("long", now));

        cache.clear();
        let stats = cache.stats();
        assert_eq!(stats.size, 0);
        assert_eq!(stats.hit_rate, 0.0);
        assert_eq!(stats.max_size, 10);
    }

    #[tokio::test]
    async fn test_sweeper_task_removes_expired() {
        let cache: SharedCache<u32> = Arc::new(Mutex::new(DataCache::new(10, DEFAULT_TTL)));
        cache.lock().set("gone", 1, Some(Duration::from_millis(1)));

        let handle = spawn_sweeper(cache.clone(), Duration::from_millis(20));
        tokio::time::sleep(Duration::from_millis(100)).await;
        handle.abort();

        assert!(cache.lock().is_empty());
    }
}
