//! Object Storage Backend
//!
//! This crate provides the key/value view of the bucket that the registry
//! fronts. It exposes a small [`Backend`] trait (prefix listing with a
//! continuation cursor, ranged reads, put, head, batched delete and
//! server-side copy) and an implementation over the `object_store` crate.
//!
//! # Features
//!
//! - Multiple storage backends: S3, MinIO, local filesystem, in-memory
//! - Delimited (one level) and nested (recursive) prefix listing
//! - Streamed reads and writes, ranged reads for archive access
//!
//! # Example
//!
//! ```rust,no_run
//! use storage::{Backend, ObjectStoreBackend, StorageConfig};
//!
//! # async fn example() -> Result<(), storage::StorageError> {
//! let backend = ObjectStoreBackend::new(StorageConfig::Memory).await?;
//! let page = backend.list_page("docs/", true, None).await?;
//! println!("{} folders", page.common_prefixes.len());
//! # Ok(())
//! # }
//! ```

mod backend;
mod config;
mod error;
mod object_store_backend;

pub use backend::{Backend, ByteStream, Continuation, ListPage, ObjectMeta};
pub use config::StorageConfig;
pub use error::{Result, StorageError};
pub use object_store_backend::ObjectStoreBackend;
