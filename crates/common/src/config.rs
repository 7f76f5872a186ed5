use std::time::Duration;

use serde::{Deserialize, Serialize};
use storage::StorageConfig;
use url::Url;

/// Largest number of keys a single backend batch delete may carry.
pub const MAX_BATCH_SIZE: usize = 100;

/// Everything the registry needs, passed in explicitly at construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// The registry's own secret; presenting it grants the owner role
    #[serde(default)]
    pub owner_token: Option<String>,
    pub identity: IdentityConfig,
    #[serde(default)]
    pub auth_cache: AuthCacheConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub bulk: BulkConfig,
}

/// Remote identity (API key) verification endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityConfig {
    #[serde(default = "default_identity_url")]
    pub api_url: Url,
    /// API key the registry authenticates itself with
    pub service_api_key: String,
    /// Keys must belong to this identity to be granted any role
    pub resource_iam_id: String,
}

fn default_identity_url() -> Url {
    Url::parse("https://iam.cloud.ibm.com/v1/").expect("hardcoded URL must parse")
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthCacheConfig {
    /// Maximum number of cached tokens
    #[serde(default = "default_cache_capacity")]
    pub capacity: u64,
    /// Time-to-live for cached credentials, in minutes
    #[serde(default = "default_cache_ttl")]
    pub ttl_minutes: u64,
}

fn default_cache_capacity() -> u64 {
    1000
}

fn default_cache_ttl() -> u64 {
    10
}

impl AuthCacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_minutes * 60)
    }
}

impl Default for AuthCacheConfig {
    fn default() -> Self {
        Self {
            capacity: default_cache_capacity(),
            ttl_minutes: default_cache_ttl(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkConfig {
    /// Paths per batched delete (capped at 100)
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Copies/searches allowed in flight at once (capped at 100)
    #[serde(default = "default_batch_size")]
    pub window: usize,
    /// Top level segments bulk operations never touch
    #[serde(default = "default_reserved_segments")]
    pub reserved_segments: Vec<String>,
}

fn default_batch_size() -> usize {
    MAX_BATCH_SIZE
}

fn default_reserved_segments() -> Vec<String> {
    vec!["api".to_string()]
}

impl BulkConfig {
    pub fn batch_size(&self) -> usize {
        self.batch_size.clamp(1, MAX_BATCH_SIZE)
    }

    pub fn window(&self) -> usize {
        self.window.clamp(1, MAX_BATCH_SIZE)
    }
}

impl Default for BulkConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            window: default_batch_size(),
            reserved_segments: default_reserved_segments(),
        }
    }
}

impl RegistryConfig {
    /// Configuration for an in-memory registry with the given owner token.
    pub fn in_memory(owner_token: &str) -> Self {
        Self {
            owner_token: Some(owner_token.to_string()),
            identity: IdentityConfig {
                api_url: default_identity_url(),
                service_api_key: String::new(),
                resource_iam_id: String::new(),
            },
            auth_cache: AuthCacheConfig::default(),
            storage: StorageConfig::Memory,
            bulk: BulkConfig::default(),
        }
    }
}
