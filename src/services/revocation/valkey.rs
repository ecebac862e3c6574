use async_trait::async_trait;
use std::{sync::Arc, time::Duration};

use crate::services::cache::{CacheClient, ValkeyClient};
use crate::services::revocation::store::{RevocationError, UserDisabledStore};

/// Valkey-backed disabled-user flags (Redis protocol).
///
/// Admin tooling writes `"1"` under the per-user key when an account is
/// disabled; this adapter only reads. Lookups are advisory, so callers treat
/// backend errors as fail-open.
#[derive(Clone)]
pub struct ValkeyUserDisabledStore<C: CacheClient> {
    cache: Arc<C>,
    // Key prefix to avoid collisions across environments
    prefix: String,
}

impl ValkeyUserDisabledStore<ValkeyClient> {
    pub async fn new(redis_url: &str) -> Result<Self, RevocationError> {
        Self::new_with_prefix(redis_url, "auth:disabled").await
    }

    pub async fn new_with_prefix(
        redis_url: &str,
        prefix: impl Into<String>,
    ) -> Result<Self, RevocationError> {
        let client = ValkeyClient::new(redis_url).await?;

        Ok(Self {
            cache: Arc::new(client),
            prefix: prefix.into(),
        })
    }
}

impl<C: CacheClient> ValkeyUserDisabledStore<C> {
    pub fn new_with_cache(cache: Arc<C>, prefix: impl Into<String>) -> Self {
        Self {
            cache,
            prefix: prefix.into(),
        }
    }

    pub fn key(&self, uid: &str) -> String {
        format!("{}:{}", self.prefix, uid)
    }

    /// Flag a user as disabled for `ttl`. Used by the admin/sign-out flow so
    /// revocation propagates faster than the Postgres source of truth.
    pub async fn mark_disabled(&self, uid: &str, ttl: Duration) -> Result<(), RevocationError> {
        self.cache.set_with_ttl(&self.key(uid), "1", ttl).await?;
        Ok(())
    }
}

#[async_trait]
impl<C: CacheClient> UserDisabledStore for ValkeyUserDisabledStore<C> {
    async fn is_disabled(&self, uid: &str) -> Result<bool, RevocationError> {
        let value = self.cache.get_string(&self.key(uid)).await?;
        Ok(value.as_deref() == Some("1"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::cache::{CacheError, CacheResult};
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Clone, Default)]
    struct MemoryCache {
        entries: Arc<Mutex<HashMap<String, String>>>,
    }

    #[async_trait]
    impl CacheClient for MemoryCache {
        fn backend_name(&self) -> &'static str {
            "memory"
        }

        async fn get_string(&self, key: &str) -> CacheResult<Option<String>> {
            Ok(self.entries.lock().unwrap().get(key).cloned())
        }

        async fn set_with_ttl(
            &self,
            key: &str,
            value: &str,
            _ttl: Duration,
        ) -> CacheResult<()> {
            self.entries
                .lock()
                .unwrap()
                .insert(key.to_string(), value.to_string());
            Ok(())
        }

        async fn del(&self, key: &str) -> CacheResult<u64> {
            Ok(self.entries.lock().unwrap().remove(key).map_or(0, |_| 1))
        }
    }

    /// Always-failing backend for the fail-policy contract.
    #[derive(Clone, Default)]
    struct BrokenCache;

    #[async_trait]
    impl CacheClient for BrokenCache {
        fn backend_name(&self) -> &'static str {
            "broken"
        }

        async fn get_string(&self, _key: &str) -> CacheResult<Option<String>> {
            Err(CacheError::BackendConnection("down".to_string()))
        }

        async fn set_with_ttl(&self, _: &str, _: &str, _: Duration) -> CacheResult<()> {
            Err(CacheError::BackendConnection("down".to_string()))
        }

        async fn del(&self, _key: &str) -> CacheResult<u64> {
            Err(CacheError::BackendConnection("down".to_string()))
        }
    }

    #[tokio::test]
    async fn mark_then_lookup_round_trips() {
        let store =
            ValkeyUserDisabledStore::new_with_cache(Arc::new(MemoryCache::default()), "t:disabled");

        assert!(!store.is_disabled("user-1").await.unwrap());

        store
            .mark_disabled("user-1", Duration::from_secs(60))
            .await
            .unwrap();

        assert!(store.is_disabled("user-1").await.unwrap());
        assert!(!store.is_disabled("user-2").await.unwrap());
    }

    #[tokio::test]
    async fn keys_are_prefixed_per_environment() {
        let store =
            ValkeyUserDisabledStore::new_with_cache(Arc::new(MemoryCache::default()), "prod:disabled");
        assert_eq!(store.key("user-1"), "prod:disabled:user-1");
    }

    #[tokio::test]
    async fn backend_failure_surfaces_as_error() {
        let store = ValkeyUserDisabledStore::new_with_cache(Arc::new(BrokenCache), "t:disabled");
        assert!(store.is_disabled("user-1").await.is_err());
    }
}
