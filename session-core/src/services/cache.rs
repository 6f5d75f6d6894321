//! Profile cache - last-known-good profiles layered over the key/value store.
//!
//! Entries are written only from fresh backend successes and read only as a
//! fallback, so a cache hit is always a real profile, never partial or
//! default data. Every operation here is best-effort: the cache being
//! broken must never break resolution or sign-out.

use crate::models::Profile;
use crate::services::KeyValueStore;
use std::sync::Arc;

const CACHE_KEY_PREFIX: &str = "profile:";

#[derive(Clone)]
pub struct ProfileCache {
    store: Arc<dyn KeyValueStore>,
}

impl ProfileCache {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    fn key(user_id: &str) -> String {
        format!("{}{}", CACHE_KEY_PREFIX, user_id)
    }

    /// Overwrite the cached profile for a user. Persistence failures are
    /// logged and swallowed.
    pub async fn put(&self, profile: &Profile) {
        let encoded = match serde_json::to_string(profile) {
            Ok(encoded) => encoded,
            Err(e) => {
                tracing::warn!(user_id = %profile.user_id, error = %e, "Failed to encode profile for caching");
                return;
            }
        };

        match self.store.set(&Self::key(&profile.user_id), &encoded).await {
            Ok(()) => tracing::debug!(user_id = %profile.user_id, "Profile cached"),
            Err(e) => {
                tracing::warn!(user_id = %profile.user_id, error = %e, "Failed to cache profile")
            }
        }
    }

    /// Read the cached profile for a user. Storage failures and corrupt
    /// entries are treated as absent.
    pub async fn get(&self, user_id: &str) -> Option<Profile> {
        let raw = match self.store.get(&Self::key(user_id)).await {
            Ok(raw) => raw?,
            Err(e) => {
                tracing::warn!(user_id = %user_id, error = %e, "Failed to read cached profile");
                return None;
            }
        };

        match serde_json::from_str(&raw) {
            Ok(profile) => Some(profile),
            Err(e) => {
                tracing::warn!(user_id = %user_id, error = %e, "Discarding corrupt cache entry");
                None
            }
        }
    }

    /// Remove every profile entry this cache owns. Used exclusively by
    /// sign-out. Failed removals are logged by key and the purge continues
    /// past them.
    pub async fn purge_all(&self) {
        let keys = match self.store.list_keys(CACHE_KEY_PREFIX).await {
            Ok(keys) => keys,
            Err(e) => {
                tracing::error!(error = %e, "Failed to enumerate cached profiles for purge");
                return;
            }
        };

        for key in keys {
            if let Err(e) = self.store.remove(&key).await {
                tracing::error!(key = %key, error = %e, "Failed to purge cached profile");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;
    use crate::services::MemoryStore;

    fn cache_with_store() -> (ProfileCache, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        (ProfileCache::new(store.clone()), store)
    }

    #[tokio::test]
    async fn test_put_then_get() {
        let (cache, _store) = cache_with_store();
        let profile = Profile::new("user-1", "Ada", Role::Admin);

        cache.put(&profile).await;
        assert_eq!(cache.get("user-1").await, Some(profile));
    }

    #[tokio::test]
    async fn test_put_overwrites_existing_entry() {
        let (cache, store) = cache_with_store();
        cache.put(&Profile::new("user-1", "Ada", Role::Admin)).await;
        cache
            .put(&Profile::new("user-1", "Ada L.", Role::Viewer))
            .await;

        assert_eq!(store.entries.lock().unwrap().len(), 1);
        assert_eq!(cache.get("user-1").await.unwrap().role, Role::Viewer);
    }

    #[tokio::test]
    async fn test_corrupt_entry_reads_as_absent() {
        let (cache, store) = cache_with_store();
        store.set("profile:user-1", "not json").await.unwrap();

        assert_eq!(cache.get("user-1").await, None);
    }

    #[tokio::test]
    async fn test_unavailable_store_reads_as_absent() {
        let (cache, store) = cache_with_store();
        cache.put(&Profile::new("user-1", "Ada", Role::Admin)).await;

        store.set_unavailable(true);
        assert_eq!(cache.get("user-1").await, None);
    }

    #[tokio::test]
    async fn test_purge_all_removes_only_profile_entries() {
        let (cache, store) = cache_with_store();
        cache.put(&Profile::new("user-1", "Ada", Role::Admin)).await;
        cache
            .put(&Profile::new("user-2", "Grace", Role::Viewer))
            .await;
        store.set("nonce:x", "1").await.unwrap();

        cache.purge_all().await;

        let entries = store.entries.lock().unwrap();
        assert_eq!(entries.len(), 1);
        assert!(entries.contains_key("nonce:x"));
    }
}
