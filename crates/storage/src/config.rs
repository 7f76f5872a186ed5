use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Configuration for the object storage backend.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StorageConfig {
    /// In-memory storage (for testing)
    #[default]
    Memory,

    /// Local filesystem storage
    Local {
        /// Path to the storage directory
        path: PathBuf,
    },

    /// S3-compatible storage (AWS S3, IBM COS, MinIO, etc.)
    S3 {
        /// S3 endpoint URL (e.g., "http://localhost:9000" for MinIO)
        endpoint: String,
        /// Access key ID
        access_key: String,
        /// Secret access key
        secret_key: String,
        /// Bucket name
        bucket: String,
        /// Optional region (defaults to "us-east-1")
        region: Option<String>,
    },
}

impl StorageConfig {
    /// Whether listings from this backend come back in key order.
    ///
    /// The local filesystem walks directories in OS order, so offset based
    /// pagination cannot be used against it.
    pub(crate) fn lists_in_order(&self) -> bool {
        !matches!(self, StorageConfig::Local { .. })
    }
}
