//! Response caching and request spacing shared by the source clients.

use serde_json::Value;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

struct CacheEntry {
    data: Value,
    cached_at: Instant,
}

/// In-memory response cache with TTL and oldest-first eviction.
pub struct ApiResponseCache {
    entries: Mutex<HashMap<String, CacheEntry>>,
    ttl: Duration,
    max_entries: usize,
}

impl ApiResponseCache {
    pub fn new(ttl: Duration, max_entries: usize) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl,
            max_entries,
        }
    }

    /// A cache that never stores anything.
    pub fn disabled() -> Self {
        Self::new(Duration::ZERO, 0)
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries
            .get(key)
            .filter(|entry| entry.cached_at.elapsed() < self.ttl)
            .map(|entry| entry.data.clone())
    }

    pub fn insert(&self, key: String, data: Value) {
        if self.max_entries == 0 || self.ttl.is_zero() {
            return;
        }
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());

        entries.retain(|_, v| v.cached_at.elapsed() < self.ttl);
        if entries.len() >= self.max_entries
            && !entries.contains_key(&key)
            && let Some(oldest_key) = entries
                .iter()
                .min_by_key(|(_, v)| v.cached_at)
                .map(|(k, _)| k.clone())
        {
            entries.remove(&oldest_key);
        }

        entries.insert(
            key,
            CacheEntry {
                data,
                cached_at: Instant::now(),
            },
        );
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Enforces a minimum delay between consecutive requests of one client.
pub struct RequestSpacer {
    min_interval: Duration,
    last_request: Mutex<Option<Instant>>,
}

impl RequestSpacer {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_request: Mutex::new(None),
        }
    }

    /// Reserve the next request slot, sleeping until it opens.
    pub async fn wait(&self) {
        let wait = {
            let mut last = self.last_request.lock().unwrap_or_else(|e| e.into_inner());
            let now = Instant::now();
            let slot = match *last {
                Some(prev) => (prev + self.min_interval).max(now),
                None => now,
            };
            *last = Some(slot);
            slot.saturating_duration_since(now)
        };
        if !wait.is_zero() {
            tokio::time::sleep(wait).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_cache_insert_and_get() {
        let cache = ApiResponseCache::new(Duration::from_secs(60), 10);
        cache.insert("k".into(), json!({"v": 1}));
        assert_eq!(cache.get("k"), Some(json!({"v": 1})));
        assert_eq!(cache.get("missing"), None);
    }

    #[test]
    fn test_cache_evicts_oldest_at_capacity() {
        let cache = ApiResponseCache::new(Duration::from_secs(60), 2);
        cache.insert("a".into(), json!(1));
        std::thread::sleep(Duration::from_millis(2));
        cache.insert("b".into(), json!(2));
        std::thread::sleep(Duration::from_millis(2));
        cache.insert("c".into(), json!(3));
        assert_eq!(cache.len(), 2);
        assert!(cache.get("a").is_none());
        assert!(cache.get("c").is_some());
    }

    #[test]
    fn test_cache_expiry() {
        let cache = ApiResponseCache::new(Duration::from_millis(5), 4);
        cache.insert("k".into(), json!(true));
        std::thread::sleep(Duration::from_millis(10));
        assert!(cache.get("k").is_none());
    }

    #[test]
    fn test_disabled_cache_stores_nothing() {
        let cache = ApiResponseCache::disabled();
        cache.insert("k".into(), json!(1));
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_spacer_delays_second_request() {
        let spacer = RequestSpacer::new(Duration::from_millis(20));
        let start = Instant::now();
        spacer.wait().await;
        spacer.wait().await;
        assert!(start.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn test_zero_spacing_never_sleeps() {
        let spacer = RequestSpacer::new(Duration::ZERO);
        let start = Instant::now();
        tokio_test::block_on(async {
            spacer.wait().await;
            spacer.wait().await;
        });
        assert!(start.elapsed() < Duration::from_millis(50));
    }
}
