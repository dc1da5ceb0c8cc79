//! In-process TTL caches.
//!
//! Each cache is constructed explicitly and handed to the component that
//! owns its keyspace (app JWTs, installation tokens, the installation
//! directory), so tests can substitute one with a different TTL or
//! pre-seeded contents. Single operations are atomic; nothing spans two
//! cache calls transactionally.

use dashmap::DashMap;
use std::borrow::Borrow;
use std::hash::Hash;
use std::time::{Duration, Instant};

struct Entry<V> {
    value: V,
    expires_at: Instant,
}

pub struct TtlCache<K, V> {
    entries: DashMap<K, Entry<V>>,
    ttl: Duration,
}

impl<K: Eq + Hash, V: Clone> TtlCache<K, V> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
        }
    }

    /// Returns the cached value unless it has aged past the cache TTL.
    /// Expired entries are dropped on access.
    pub fn get<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Eq + Hash + ?Sized,
    {
        let entry = self.entries.get(key)?;
        if entry.expires_at <= Instant::now() {
            drop(entry);
            self.entries.remove(key);
            return None;
        }
        Some(entry.value.clone())
    }

    pub fn insert(&self, key: K, value: V) {
        self.entries.insert(
            key,
            Entry {
                value,
                expires_at: Instant::now() + self.ttl,
            },
        );
    }

    pub fn remove<Q>(&self, key: &Q)
    where
        K: Borrow<Q>,
        Q: Eq + Hash + ?Sized,
    {
        self.entries.remove(key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_within_ttl() {
        let cache: TtlCache<String, i64> = TtlCache::new(Duration::from_secs(60));
        cache.insert("octocat".to_string(), 42);
        assert_eq!(cache.get("octocat"), Some(42));
        assert_eq!(cache.get("missing"), None);
    }

    #[test]
    fn test_zero_ttl_expires_immediately() {
        let cache: TtlCache<i64, String> = TtlCache::new(Duration::ZERO);
        cache.insert(1, "value".to_string());
        assert_eq!(cache.get(&1), None);
    }

    #[test]
    fn test_insert_overwrites() {
        let cache: TtlCache<i64, String> = TtlCache::new(Duration::from_secs(60));
        cache.insert(1, "old".to_string());
        cache.insert(1, "new".to_string());
        assert_eq!(cache.get(&1), Some("new".to_string()));
    }

    #[test]
    fn test_remove() {
        let cache: TtlCache<String, i64> = TtlCache::new(Duration::from_secs(60));
        cache.insert("octocat".to_string(), 42);
        cache.remove("octocat");
        assert_eq!(cache.get("octocat"), None);
    }
}
