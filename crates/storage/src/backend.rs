//! The key/value backend contract the registry is written against.

use std::ops::Range;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use chrono::{DateTime, Utc};
use futures::stream::BoxStream;
use futures::TryStreamExt;

use crate::error::Result;

/// A streamed object body.
pub type ByteStream = BoxStream<'static, Result<Bytes>>;

/// Opaque cursor for resuming a paginated listing.
///
/// Only the backend that produced it knows how to interpret it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Continuation(String);

impl Continuation {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Metadata for a stored object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectMeta {
    /// Full object key (no leading slash)
    pub key: String,
    /// Size in bytes
    pub size: u64,
    pub last_modified: Option<DateTime<Utc>>,
    pub e_tag: Option<String>,
    pub content_type: Option<String>,
    /// Set when the latest version of the key is a delete marker
    pub delete_marker: bool,
}

/// One page of a prefix listing.
#[derive(Debug, Clone, Default)]
pub struct ListPage {
    /// Rolled-up key prefixes, each ending with `/` (delimited listings only)
    pub common_prefixes: Vec<String>,
    /// Objects directly in this page
    pub objects: Vec<ObjectMeta>,
    /// Cursor for the next page, `None` when the listing is complete
    pub continuation: Option<Continuation>,
}

/// A flat key/value object store.
///
/// Keys are forward-slash delimited strings without a leading slash.
/// Listings are lexicographically ordered within and across pages.
#[async_trait]
pub trait Backend: Send + Sync + std::fmt::Debug {
    /// List one page of keys under `prefix`.
    ///
    /// When `delimited` is set, keys containing a `/` after the prefix are
    /// rolled up into `common_prefixes`.
    async fn list_page(
        &self,
        prefix: &str,
        delimited: bool,
        continuation: Option<Continuation>,
    ) -> Result<ListPage>;

    /// Fetch object metadata. Fails with `NotFound` for a missing key.
    async fn head(&self, key: &str) -> Result<ObjectMeta>;

    /// Stream the whole object.
    async fn get(&self, key: &str) -> Result<ByteStream>;

    /// Stream a byte range of the object.
    async fn get_range(&self, key: &str, range: Range<u64>) -> Result<ByteStream>;

    /// Store an object from a stream.
    async fn put(&self, key: &str, body: ByteStream, content_type: Option<&str>) -> Result<()>;

    /// Delete a batch of keys in a single backend call. Missing keys are ignored.
    async fn delete_batch(&self, keys: &[String]) -> Result<()>;

    /// Copy an object inside the bucket.
    async fn copy(&self, from: &str, to: &str) -> Result<()>;

    /// Whether `copy` runs server-side without streaming through us.
    fn supports_server_copy(&self) -> bool {
        true
    }

    /// Read a byte range fully into memory.
    async fn read_range(&self, key: &str, range: Range<u64>) -> Result<Bytes> {
        let capacity = (range.end - range.start) as usize;
        let stream = self.get_range(key, range).await?;
        let buf = stream
            .try_fold(BytesMut::with_capacity(capacity), |mut buf, chunk| async move {
                buf.extend_from_slice(&chunk);
                Ok(buf)
            })
            .await?;
        Ok(buf.freeze())
    }
}
