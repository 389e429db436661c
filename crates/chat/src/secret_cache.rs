//! Secret cache (§3): resource-name to `{value, expires-at}`, default TTL
//! 5 minutes, invalidated on rotation (refresh-token rotation, §4.5).

use std::time::Duration;

use secrecy::Secret;
use ttsrelay_protocol::SECRET_CACHE_TTL_SECS;
use ttsrelay_store::TtlCache;

/// In-memory front for the secret store's resource-named values. The
/// backing secret manager itself (full path
/// `projects/<n>/secrets/<name>/versions/<ver>`, §6) is out of scope here;
/// this cache sits in front of whatever client resolves that path.
pub struct SecretCache {
    entries: TtlCache<String, Secret<String>>,
}

impl SecretCache {
    pub fn new() -> Self {
        Self {
            entries: TtlCache::new(Duration::from_secs(SECRET_CACHE_TTL_SECS as u64), 256),
        }
    }

    pub fn get(&self, resource: &str) -> Option<&Secret<String>> {
        self.entries.get(&resource.to_string())
    }

    /// Store a freshly-fetched or rotated value, replacing any prior entry.
    pub fn put(&mut self, resource: &str, value: Secret<String>) {
        self.entries.insert(resource.to_string(), value);
    }

    /// Drop a cached value, forcing the next `get` to miss (invalidation on
    /// rotation).
    pub fn invalidate(&mut self, resource: &str) {
        self.entries.remove(&resource.to_string());
    }
}

impl Default for SecretCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use secrecy::ExposeSecret;

    use super::*;

    #[test]
    fn put_then_get_round_trips() {
        let mut cache = SecretCache::new();
        cache.put("refresh-token", Secret::new("abc".to_string()));
        assert_eq!(cache.get("refresh-token").unwrap().expose_secret(), "abc");
    }

    #[test]
    fn invalidate_forces_a_miss() {
        let mut cache = SecretCache::new();
        cache.put("refresh-token", Secret::new("abc".to_string()));
        cache.invalidate("refresh-token");
        assert!(cache.get("refresh-token").is_none());
    }

    #[test]
    fn rotation_replaces_value() {
        let mut cache = SecretCache::new();
        cache.put("refresh-token", Secret::new("old".to_string()));
        cache.put("refresh-token", Secret::new("new".to_string()));
        assert_eq!(cache.get("refresh-token").unwrap().expose_secret(), "new");
    }
}
