use std::{
    collections::HashMap,
    hash::Hash,
    time::{Duration, Instant},
};

/// A bounded, TTL-evicting map used for the webhook idempotency window, the
/// redemption-pending cache, and the secret cache (§3). Oldest entry is
/// evicted on overflow rather than the insert being rejected, matching the
/// gateway's dedupe-cache behavior.
pub struct TtlCache<K, V> {
    entries: HashMap<K, (V, Instant)>,
    ttl: Duration,
    max_entries: usize,
}

impl<K: Eq + Hash + Clone, V> TtlCache<K, V> {
    pub fn new(ttl: Duration, max_entries: usize) -> Self {
        Self {
            entries: HashMap::new(),
            ttl,
            max_entries,
        }
    }

    pub fn evict_expired(&mut self) {
        let ttl = self.ttl;
        self.entries.retain(|_, (_, inserted_at)| inserted_at.elapsed() < ttl);
    }

    pub fn get(&self, key: &K) -> Option<&V> {
        self.entries.get(key).map(|(v, _)| v)
    }

    pub fn contains(&self, key: &K) -> bool {
        self.entries.contains_key(key)
    }

    pub fn insert(&mut self, key: K, value: V) {
        if self.entries.len() >= self.max_entries
            && !self.entries.contains_key(&key)
            && let Some(oldest) = self
                .entries
                .iter()
                .min_by_key(|(_, (_, inserted_at))| *inserted_at)
                .map(|(k, _)| k.clone())
        {
            self.entries.remove(&oldest);
        }
        self.entries.insert(key, (value, Instant::now()));
    }

    pub fn remove(&mut self, key: &K) -> Option<V> {
        self.entries.remove(key).map(|(v, _)| v)
    }

    /// Insert `key` if absent; returns `true` if it was already present
    /// (i.e. this call observed a duplicate), matching the webhook
    /// idempotency contract in §4.2.
    pub fn check_and_insert(&mut self, key: K, value: V) -> bool {
        self.evict_expired();
        if self.entries.contains_key(&key) {
            return true;
        }
        self.insert(key, value);
        false
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn check_and_insert_flags_duplicates() {
        let mut cache: TtlCache<String, ()> = TtlCache::new(Duration::from_secs(600), 1_000);
        assert!(!cache.check_and_insert("id-1".to_string(), ()));
        assert!(cache.check_and_insert("id-1".to_string(), ()));
    }

    #[test]
    fn overflow_evicts_oldest_entry() {
        let mut cache: TtlCache<i32, i32> = TtlCache::new(Duration::from_secs(600), 2);
        cache.insert(1, 1);
        cache.insert(2, 2);
        cache.insert(3, 3);
        assert_eq!(cache.len(), 2);
        assert!(cache.get(&1).is_none());
        assert!(cache.get(&3).is_some());
    }

    #[test]
    fn expired_entries_are_evicted() {
        let mut cache: TtlCache<i32, i32> = TtlCache::new(Duration::from_millis(1), 10);
        cache.insert(1, 1);
        std::thread::sleep(Duration::from_millis(5));
        cache.evict_expired();
        assert!(cache.is_empty());
    }
}
