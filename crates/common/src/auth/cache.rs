//! Credential cache
//!
//! Uses moka for concurrent caching with TTL and size-based eviction.
//! Negative results (tokens the identity service does not know) are cached
//! too, so repeated bad tokens do not hit the remote service.

use std::sync::Arc;

use moka::sync::Cache;

use super::credential::Credential;
use crate::config::AuthCacheConfig;

/// Process-local cache from raw token to validated credential.
#[derive(Clone)]
pub struct CredentialCache {
    entries: Cache<String, Arc<Credential>>,
}

impl CredentialCache {
    pub fn new(config: &AuthCacheConfig) -> Self {
        Self {
            entries: Cache::builder()
                .max_capacity(config.capacity)
                .time_to_live(config.ttl())
                .build(),
        }
    }

    pub fn get(&self, token: &str) -> Option<Arc<Credential>> {
        self.entries.get(token)
    }

    pub fn insert(&self, token: &str, credential: Arc<Credential>) {
        self.entries.insert(token.to_string(), credential);
    }

    /// Drop a token, e.g. after it was revoked.
    pub fn invalidate(&self, token: &str) {
        self.entries.invalidate(token);
    }

    pub fn invalidate_all(&self) {
        self.entries.invalidate_all();
    }

    /// Get cache statistics for debugging
    pub fn entry_count(&self) -> u64 {
        self.entries.entry_count()
    }
}

impl std::fmt::Debug for CredentialCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialCache")
            .field("entry_count", &self.entries.entry_count())
            .finish()
    }
}
