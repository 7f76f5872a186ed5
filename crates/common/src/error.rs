use storage::StorageError;

/// Errors surfaced by registry operations.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// No token was presented at all
    #[error("Unauthorized")]
    Unauthenticated,
    /// A token was presented but does not grant the operation
    #[error("Forbidden")]
    Forbidden,
    #[error("Not found: {0}")]
    NotFound(String),
    /// Storage backend transport or status failure
    #[error("Backend error: {message}")]
    Backend {
        status: Option<u16>,
        message: String,
    },
    #[error("Invalid path: {0}")]
    InvalidPath(String),
    #[error("Invalid archive: {0}")]
    InvalidArchive(String),
    #[error("Unsupported archive entry: {0}")]
    UnsupportedArchive(String),
    /// The identity service could not be reached
    #[error("Identity service error: {0}")]
    Identity(String),
    /// A bulk operation stopped after some batches were already applied
    #[error("Bulk operation stopped after {completed} items: {source}")]
    PartialBatchFailure {
        completed: usize,
        #[source]
        source: Box<RegistryError>,
    },
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Configuration error: {0}")]
    Config(String),
}

impl RegistryError {
    /// HTTP status a front end should answer with.
    pub fn status_code(&self) -> u16 {
        match self {
            RegistryError::Unauthenticated => 401,
            RegistryError::Forbidden => 403,
            RegistryError::NotFound(_) => 404,
            RegistryError::InvalidPath(_) => 400,
            RegistryError::Backend { status, .. } => status.unwrap_or(500),
            RegistryError::PartialBatchFailure { source, .. } => source.status_code(),
            RegistryError::UnsupportedArchive(_) => 415,
            _ => 500,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, RegistryError::NotFound(_))
    }
}

impl From<StorageError> for RegistryError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::NotFound(key) => RegistryError::NotFound(key),
            StorageError::InvalidKey(key) => RegistryError::InvalidPath(key),
            StorageError::Io(e) => RegistryError::Io(e),
            other => RegistryError::Backend {
                status: other.status(),
                message: other.to_string(),
            },
        }
    }
}

pub type Result<T> = std::result::Result<T, RegistryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_status_is_preserved() {
        let err: RegistryError = StorageError::Backend {
            status: Some(503),
            message: "slow down".to_string(),
        }
        .into();
        assert_eq!(err.status_code(), 503);

        let err: RegistryError = StorageError::NotFound("a/b".to_string()).into();
        assert!(err.is_not_found());
        assert_eq!(err.status_code(), 404);
    }

    #[test]
    fn test_partial_failure_reports_cause_status() {
        let err = RegistryError::PartialBatchFailure {
            completed: 200,
            source: Box::new(RegistryError::Backend {
                status: Some(500),
                message: "boom".to_string(),
            }),
        };
        assert_eq!(err.status_code(), 500);
        assert!(err.to_string().contains("200"));
    }
}
