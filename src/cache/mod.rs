//! In-process TTL cache shared by reverse-geocoding results and travel plans.
//!
//! Expiry is checked lazily on read; an expired entry is dropped the first
//! time it is looked up. Values are returned as clones so no caller ever
//! holds a reference into the map.

use log::debug;
use std::collections::HashMap;
use std::sync::Mutex;
use tokio::time::{ Duration, Instant };

use crate::models::plan::Plan;

pub const DEFAULT_TTL_SECS: u64 = 1800;

/// Everything the agent keeps in its response cache.
#[derive(Clone, Debug, PartialEq)]
pub enum CachedValue {
    Place(String),
    Plan(Plan),
}

struct CacheEntry<V> {
    value: V,
    inserted_at: Instant,
}

pub struct ResponseCache<V: Clone = CachedValue> {
    ttl: Duration,
    entries: Mutex<HashMap<String, CacheEntry<V>>>,
}

impl<V: Clone> ResponseCache<V> {
    pub fn new(ttl: Duration) -> Self {
        Self { ttl, entries: Mutex::new(HashMap::new()) }
    }

    /// Returns the value iff it was stored less than `ttl` ago.
    pub fn get(&self, key: &str) -> Option<V> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        let expired = match entries.get(key) {
            Some(entry) if entry.inserted_at.elapsed() < self.ttl => {
                return Some(entry.value.clone());
            }
            Some(_) => true,
            None => false,
        };
        if expired {
            debug!("Cache entry expired: {}", key);
            entries.remove(key);
        }
        None
    }

    /// Overwrites any previous entry and restarts its clock.
    pub fn set(&self, key: impl Into<String>, value: V) {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.insert(key.into(), CacheEntry { value, inserted_at: Instant::now() });
    }

    pub fn clear(&self) {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
    }

    /// Entries currently held, expired ones included until they are read.
    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub fn geo_key(lat: f64, lon: f64) -> String {
    format!("geo:{}:{}", lat, lon)
}

/// Interests keep caller order: `[a, b]` and `[b, a]` are different keys.
pub fn plan_key(city: &str, days: u32, interests: &[String]) -> String {
    format!("plan:{}:{}:{}", city, days, interests.join("-"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn entry_lives_until_ttl() {
        let cache: ResponseCache<String> = ResponseCache::new(Duration::from_secs(1800));
        cache.set("geo:41.9:12.5", "Rome".to_string());

        tokio::time::advance(Duration::from_secs(1799)).await;
        assert_eq!(cache.get("geo:41.9:12.5").as_deref(), Some("Rome"));

        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(cache.get("geo:41.9:12.5"), None);
        assert!(cache.is_empty());

        cache.set("geo:41.9:12.5", "Roma".to_string());
        assert_eq!(cache.get("geo:41.9:12.5").as_deref(), Some("Roma"));
        tokio::time::advance(Duration::from_secs(1799)).await;
        assert_eq!(cache.get("geo:41.9:12.5").as_deref(), Some("Roma"));
    }

    #[tokio::test(start_paused = true)]
    async fn entry_is_gone_exactly_at_ttl() {
        let cache: ResponseCache<u32> = ResponseCache::new(Duration::from_secs(10));
        cache.set("k", 1);
        tokio::time::advance(Duration::from_secs(10)).await;
        assert_eq!(cache.get("k"), None);
        assert!(cache.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn set_restarts_the_clock() {
        let cache: ResponseCache<u32> = ResponseCache::new(Duration::from_secs(10));
        cache.set("k", 1);
        tokio::time::advance(Duration::from_secs(8)).await;
        cache.set("k", 2);
        tokio::time::advance(Duration::from_secs(8)).await;
        assert_eq!(cache.get("k"), Some(2));
    }

    #[tokio::test(start_paused = true)]
    async fn zero_ttl_never_hits() {
        let cache: ResponseCache<u32> = ResponseCache::new(Duration::ZERO);
        cache.set("k", 1);
        assert_eq!(cache.get("k"), None);
    }

    #[test]
    fn keys_are_deterministic() {
        assert_eq!(geo_key(41.9, 12.5), "geo:41.9:12.5");
        let interests = vec!["food".to_string(), "art".to_string()];
        assert_eq!(plan_key("Rome", 3, &interests), "plan:Rome:3:food-art");
        assert_eq!(plan_key("Rome", 3, &[]), "plan:Rome:3:");
        assert_ne!(
            plan_key("Rome", 3, &interests),
            plan_key("Rome", 3, &["art".to_string(), "food".to_string()])
        );
    }

    #[test]
    fn clear_drops_everything() {
        let cache = ResponseCache::new(Duration::from_secs(60));
        cache.set("geo:1:2", CachedValue::Place("Rome".into()));
        cache.clear();
        assert!(cache.get("geo:1:2").is_none());
    }
}
