//! [`Backend`] implementation over the `object_store` crate (S3/MinIO/local filesystem/memory).

use std::ops::Range;
use std::sync::Arc;

use async_trait::async_trait;
use futures::{StreamExt, TryStreamExt};
use object_store::aws::AmazonS3Builder;
use object_store::buffered::BufWriter;
use object_store::local::LocalFileSystem;
use object_store::memory::InMemory;
use object_store::path::Path as ObjectPath;
use object_store::{Attribute, Attributes, GetOptions, ObjectStore};
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::backend::{Backend, ByteStream, Continuation, ListPage, ObjectMeta};
use crate::config::StorageConfig;
use crate::error::{Result, StorageError};

/// Number of keys returned per nested listing page.
const PAGE_SIZE: usize = 1000;

/// Wrapper around the different object storage backends.
#[derive(Debug, Clone)]
pub struct ObjectStoreBackend {
    inner: Arc<dyn ObjectStore>,
    ordered: bool,
    attributes: bool,
}

impl ObjectStoreBackend {
    /// Create a new storage backend from configuration.
    pub async fn new(config: StorageConfig) -> Result<Self> {
        let inner: Arc<dyn ObjectStore> = match &config {
            StorageConfig::Memory => Arc::new(InMemory::new()),

            StorageConfig::Local { path } => {
                // Ensure directory exists
                tokio::fs::create_dir_all(path).await?;
                Arc::new(
                    LocalFileSystem::new_with_prefix(path)
                        .map_err(|e| StorageError::InvalidConfig(e.to_string()))?,
                )
            }

            StorageConfig::S3 {
                endpoint,
                access_key,
                secret_key,
                bucket,
                region,
            } => {
                let builder = AmazonS3Builder::new()
                    .with_endpoint(endpoint)
                    .with_access_key_id(access_key)
                    .with_secret_access_key(secret_key)
                    .with_bucket_name(bucket)
                    .with_region(region.as_deref().unwrap_or("us-east-1"))
                    .with_allow_http(endpoint.starts_with("http://"));

                let store: Arc<dyn ObjectStore> = Arc::new(
                    builder
                        .build()
                        .map_err(|e| StorageError::InvalidConfig(e.to_string()))?,
                );

                // Verify bucket exists by listing (empty prefix)
                // This will fail fast if the bucket doesn't exist
                {
                    let mut stream = store.list(None);
                    match stream.try_next().await {
                        Ok(_) => {}
                        Err(object_store::Error::NotFound { .. }) => {
                            return Err(StorageError::BucketNotFound(bucket.clone()));
                        }
                        Err(e) => {
                            let msg = e.to_string();
                            if msg.contains("NoSuchBucket")
                                || msg.contains("bucket") && msg.contains("not")
                            {
                                return Err(StorageError::BucketNotFound(bucket.clone()));
                            }
                            return Err(e.into());
                        }
                    }
                }

                store
            }
        };

        Ok(Self {
            inner,
            ordered: config.lists_in_order(),
            attributes: !matches!(config, StorageConfig::Local { .. }),
        })
    }

    /// Wrap an already constructed store. Listings are assumed to be ordered.
    pub fn from_store(inner: Arc<dyn ObjectStore>) -> Self {
        Self {
            inner,
            ordered: true,
            attributes: true,
        }
    }

    /// An in-memory backend.
    pub fn memory() -> Self {
        Self::from_store(Arc::new(InMemory::new()))
    }

    fn path(key: &str) -> Result<ObjectPath> {
        ObjectPath::parse(key.trim_end_matches('/'))
            .map_err(|e| StorageError::InvalidKey(format!("{}: {}", key, e)))
    }

    /// Split a listing prefix into the segment-aligned directory that
    /// `object_store` understands and the partial segment to filter on.
    fn split_prefix(prefix: &str) -> Result<(Option<ObjectPath>, Option<&str>)> {
        let (dir, partial) = match prefix.rfind('/') {
            Some(p) if p + 1 == prefix.len() => (prefix, None),
            Some(p) => (&prefix[..=p], Some(prefix)),
            None if prefix.is_empty() => ("", None),
            None => ("", Some(prefix)),
        };
        let dir = if dir.is_empty() {
            None
        } else {
            Some(Self::path(dir)?)
        };
        Ok((dir, partial))
    }

    fn meta(meta: object_store::ObjectMeta) -> ObjectMeta {
        ObjectMeta {
            key: meta.location.to_string(),
            size: meta.size as u64,
            last_modified: Some(meta.last_modified),
            e_tag: meta.e_tag,
            content_type: None,
            delete_marker: false,
        }
    }
}

#[async_trait]
impl Backend for ObjectStoreBackend {
    async fn list_page(
        &self,
        prefix: &str,
        delimited: bool,
        continuation: Option<Continuation>,
    ) -> Result<ListPage> {
        let (dir, partial) = Self::split_prefix(prefix)?;
        let keep = |key: &str| partial.map_or(true, |p| key.starts_with(p));

        if delimited {
            // object_store follows the backend's own continuation tokens
            // internally and returns the whole level at once, so a flat page
            // holds every child of `dir` in memory. Nested listings stay paged.
            let result = self.inner.list_with_delimiter(dir.as_ref()).await?;
            let common_prefixes = result
                .common_prefixes
                .into_iter()
                .map(|p| format!("{}/", p))
                .filter(|p| keep(p))
                .collect();
            let objects = result
                .objects
                .into_iter()
                .map(Self::meta)
                .filter(|m| keep(&m.key))
                .collect();
            return Ok(ListPage {
                common_prefixes,
                objects,
                continuation: None,
            });
        }

        if !self.ordered {
            let mut objects: Vec<ObjectMeta> = self
                .inner
                .list(dir.as_ref())
                .map_ok(Self::meta)
                .try_filter(|m| futures::future::ready(keep(&m.key)))
                .try_collect()
                .await?;
            objects.sort_by(|a, b| a.key.cmp(&b.key));
            return Ok(ListPage {
                common_prefixes: Vec::new(),
                objects,
                continuation: None,
            });
        }

        let stream = match &continuation {
            Some(c) => {
                let offset = Self::path(c.as_str())?;
                self.inner.list_with_offset(dir.as_ref(), &offset)
            }
            None => self.inner.list(dir.as_ref()),
        };
        let batch: Vec<ObjectMeta> = stream
            .take(PAGE_SIZE)
            .map_ok(Self::meta)
            .try_collect()
            .await?;

        let continuation = if batch.len() == PAGE_SIZE {
            batch.last().map(|m| Continuation::new(m.key.clone()))
        } else {
            None
        };
        let objects = batch.into_iter().filter(|m| keep(&m.key)).collect();

        debug!(prefix, more = continuation.is_some(), "listed nested page");
        Ok(ListPage {
            common_prefixes: Vec::new(),
            objects,
            continuation,
        })
    }

    async fn head(&self, key: &str) -> Result<ObjectMeta> {
        let path = Self::path(key)?;
        let meta = self.inner.head(&path).await?;
        Ok(Self::meta(meta))
    }

    async fn get(&self, key: &str) -> Result<ByteStream> {
        let path = Self::path(key)?;
        let result = self.inner.get(&path).await?;
        Ok(result.into_stream().map_err(StorageError::from).boxed())
    }

    async fn get_range(&self, key: &str, range: Range<u64>) -> Result<ByteStream> {
        let path = Self::path(key)?;
        let options = GetOptions {
            range: Some((range.start as usize..range.end as usize).into()),
            ..Default::default()
        };
        let result = self.inner.get_opts(&path, options).await?;
        Ok(result.into_stream().map_err(StorageError::from).boxed())
    }

    async fn put(&self, key: &str, mut body: ByteStream, content_type: Option<&str>) -> Result<()> {
        let path = Self::path(key)?;
        let mut writer = BufWriter::new(self.inner.clone(), path);
        if let (true, Some(content_type)) = (self.attributes, content_type) {
            let mut attributes = Attributes::new();
            attributes.insert(Attribute::ContentType, content_type.to_string().into());
            writer = writer.with_attributes(attributes);
        }

        while let Some(chunk) = body.next().await {
            let written = match chunk {
                Ok(bytes) => writer.write_all(&bytes).await.map_err(StorageError::from),
                Err(e) => Err(e),
            };
            if let Err(e) = written {
                let _ = writer.abort().await;
                return Err(e);
            }
        }
        writer.shutdown().await?;
        Ok(())
    }

    async fn delete_batch(&self, keys: &[String]) -> Result<()> {
        let paths = keys
            .iter()
            .map(|k| Self::path(k))
            .collect::<Result<Vec<_>>>()?;
        let locations = futures::stream::iter(paths.into_iter().map(Ok)).boxed();
        let mut results = self.inner.delete_stream(locations);
        while let Some(result) = results.next().await {
            match result {
                Ok(_) => {}
                // Ignore NotFound errors - the object may already be deleted
                Err(object_store::Error::NotFound { .. }) => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    async fn copy(&self, from: &str, to: &str) -> Result<()> {
        let from = Self::path(from)?;
        let to = Self::path(to)?;
        self.inner.copy(&from, &to).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    fn body(data: &'static [u8]) -> ByteStream {
        futures::stream::once(async move { Ok(Bytes::from_static(data)) }).boxed()
    }

    #[test]
    fn test_split_prefix() {
        let (dir, partial) = ObjectStoreBackend::split_prefix("").unwrap();
        assert!(dir.is_none());
        assert!(partial.is_none());

        let (dir, partial) = ObjectStoreBackend::split_prefix("a/b/").unwrap();
        assert_eq!(dir.unwrap().as_ref(), "a/b");
        assert!(partial.is_none());

        let (dir, partial) = ObjectStoreBackend::split_prefix("a/b/fi").unwrap();
        assert_eq!(dir.unwrap().as_ref(), "a/b");
        assert_eq!(partial, Some("a/b/fi"));
    }

    #[tokio::test]
    async fn test_memory_backend() {
        let backend = ObjectStoreBackend::memory();

        backend
            .put("docs/readme.txt", body(b"hello world"), Some("text/plain"))
            .await
            .unwrap();

        let meta = backend.head("docs/readme.txt").await.unwrap();
        assert_eq!(meta.size, 11);
        assert!(!meta.delete_marker);

        let range = backend.read_range("docs/readme.txt", 6..11).await.unwrap();
        assert_eq!(&range[..], b"world");

        backend.copy("docs/readme.txt", "docs/copy.txt").await.unwrap();
        let page = backend.list_page("docs/", true, None).await.unwrap();
        assert_eq!(page.objects.len(), 2);

        backend
            .delete_batch(&["docs/readme.txt".to_string(), "docs/missing".to_string()])
            .await
            .unwrap();
        assert!(matches!(
            backend.head("docs/readme.txt").await,
            Err(StorageError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_delimited_listing_returns_whole_level() {
        let backend = ObjectStoreBackend::memory();
        for i in 0..PAGE_SIZE + 200 {
            backend.put(&format!("wide/{:05}", i), body(b"x"), None).await.unwrap();
        }
        backend.put("wide/sub/leaf", body(b"x"), None).await.unwrap();

        let page = backend.list_page("wide/", true, None).await.unwrap();
        assert_eq!(page.objects.len(), PAGE_SIZE + 200);
        assert_eq!(page.common_prefixes, vec!["wide/sub/".to_string()]);
        assert!(page.continuation.is_none());

        let nested = backend.list_page("wide/", false, None).await.unwrap();
        assert_eq!(nested.objects.len(), PAGE_SIZE);
        assert!(nested.continuation.is_some());
    }

    #[tokio::test]
    async fn test_local_backend() {
        let temp_dir = tempfile::tempdir().unwrap();
        let config = StorageConfig::Local {
            path: temp_dir.path().to_path_buf(),
        };
        let backend = ObjectStoreBackend::new(config).await.unwrap();

        backend
            .put("b/two.txt", body(b"2"), Some("text/plain"))
            .await
            .unwrap();
        backend.put("a/one.txt", body(b"1"), None).await.unwrap();

        let page = backend.list_page("", false, None).await.unwrap();
        let keys: Vec<_> = page.objects.iter().map(|m| m.key.as_str()).collect();
        assert_eq!(keys, vec!["a/one.txt", "b/two.txt"]);
        assert!(page.continuation.is_none());

        // Verify file exists on disk
        assert!(temp_dir.path().join("a").join("one.txt").exists());
    }
}
