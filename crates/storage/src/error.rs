//! Error types for the storage backend.

/// Errors that can occur when talking to the object storage backend.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Object not found
    #[error("object not found: {0}")]
    NotFound(String),

    /// Backend transport or status failure
    #[error("object storage error: {message}")]
    Backend {
        /// HTTP-like status reported by the backend, when known
        status: Option<u16>,
        message: String,
    },

    /// Key cannot be represented as an object path
    #[error("invalid object key: {0}")]
    InvalidKey(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid configuration
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// S3 bucket not found - must be created before use
    #[error("S3 bucket '{0}' does not exist. Create it before starting the registry.")]
    BucketNotFound(String),
}

impl StorageError {
    /// Status code to report for this error, when one is meaningful.
    pub fn status(&self) -> Option<u16> {
        match self {
            StorageError::NotFound(_) => Some(404),
            StorageError::Backend { status, .. } => *status,
            StorageError::InvalidKey(_) => Some(400),
            _ => None,
        }
    }
}

impl From<object_store::Error> for StorageError {
    fn from(e: object_store::Error) -> Self {
        let status = match &e {
            object_store::Error::NotFound { path, .. } => {
                return StorageError::NotFound(path.clone());
            }
            object_store::Error::InvalidPath { source } => {
                return StorageError::InvalidKey(source.to_string());
            }
            object_store::Error::AlreadyExists { .. } => Some(409),
            object_store::Error::Precondition { .. } => Some(412),
            object_store::Error::NotModified { .. } => Some(304),
            object_store::Error::NotImplemented => Some(501),
            _ => None,
        };
        StorageError::Backend {
            status,
            message: e.to_string(),
        }
    }
}

impl From<StorageError> for std::io::Error {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::Io(e) => e,
            StorageError::NotFound(key) => std::io::Error::new(std::io::ErrorKind::NotFound, key),
            other => std::io::Error::other(other),
        }
    }
}

/// Result type alias for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;
