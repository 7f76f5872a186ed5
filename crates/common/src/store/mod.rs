mod content_type;
mod entry;
mod listing;
mod window;

use std::sync::Arc;

use futures::{FutureExt, StreamExt};
use storage::{Backend, ObjectMeta};

pub use content_type::content_type_for;
pub use entry::{ContentSource, Entry};
pub use listing::{EntryStream, ListMode};
pub use storage::ByteStream;

pub(crate) use window::Window;

use crate::auth::Credential;
use crate::config::MAX_BATCH_SIZE;
use crate::error::{RegistryError, Result};

/// Path oriented view of the backend.
#[derive(Debug, Clone)]
pub struct ObjectStore {
    backend: Arc<dyn Backend>,
    window: usize,
}

/// An object body ready to be served.
pub struct Content {
    pub content_type: Option<String>,
    pub size: Option<u64>,
    pub body: ByteStream,
}

impl ObjectStore {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self {
            backend,
            window: MAX_BATCH_SIZE,
        }
    }

    /// Limit concurrent copies in `copy_tree`.
    pub fn with_window(mut self, window: usize) -> Self {
        self.window = window.clamp(1, MAX_BATCH_SIZE);
        self
    }

    pub fn backend(&self) -> &Arc<dyn Backend> {
        &self.backend
    }

    /// Object metadata. Delete-marked objects count as missing.
    pub async fn head(&self, path: &str) -> Result<ObjectMeta> {
        let meta = self.backend.head(path).await?;
        if meta.delete_marker {
            return Err(RegistryError::NotFound(path.to_string()));
        }
        Ok(meta)
    }

    pub async fn get_stream(&self, path: &str) -> Result<ByteStream> {
        Ok(self.backend.get(path).await?)
    }

    /// Store a stream. Without an explicit type one is inferred from the name.
    pub async fn put_stream(
        &self,
        path: &str,
        body: ByteStream,
        content_type: Option<&str>,
    ) -> Result<()> {
        let content_type = content_type
            .map(str::to_string)
            .or_else(|| content_type_for(path));
        self.backend.put(path, body, content_type.as_deref()).await?;
        tracing::debug!(path, "stored object");
        Ok(())
    }

    /// List under `prefix`, filtered by the credential's path rules.
    pub fn list(
        &self,
        prefix: &str,
        mode: ListMode,
        credential: Option<&Credential>,
    ) -> EntryStream {
        let predicate = credential
            .map(|c| c.predicate().clone())
            .filter(|p| !p.is_allow_all());
        listing::list_backend(self.backend.clone(), prefix.to_string(), mode, predicate).boxed()
    }

    /// Delete paths in chunks of at most 100, one backend call per chunk.
    ///
    /// Stops at the first failing chunk. Chunks already issued stay deleted.
    pub async fn delete_many(&self, paths: &[String]) -> Result<()> {
        let mut completed = 0;
        for chunk in paths.chunks(MAX_BATCH_SIZE) {
            if let Err(e) = self.backend.delete_batch(chunk).await {
                let source = RegistryError::from(e);
                if completed == 0 {
                    return Err(source);
                }
                return Err(RegistryError::PartialBatchFailure {
                    completed,
                    source: Box::new(source),
                });
            }
            completed += chunk.len();
        }
        Ok(())
    }

    /// Copy one object, server-side when the backend can.
    pub async fn copy_one(&self, from: &str, to: &str) -> Result<()> {
        if self.backend.supports_server_copy() {
            self.backend.copy(from, to).await?;
        } else {
            let body = self.backend.get(from).await?;
            self.put_stream(to, body, None).await?;
        }
        tracing::debug!(from, to, "copied object");
        Ok(())
    }

    /// Copy every object under `from` to the same relative path under `to`.
    ///
    /// Both prefixes should end with `/`. Returns the number of objects copied.
    pub async fn copy_tree(&self, from: &str, to: &str) -> Result<usize> {
        let mut entries = self.list(from, ListMode::Nested, None);
        let mut window = Window::new(self.window);

        while let Some(entry) = entries.next().await {
            if window.is_failed() {
                break;
            }
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    window.fail(e);
                    break;
                }
            };
            let store = self.clone();
            let target = format!("{}{}", to, entry.name);
            window
                .push(async move { store.copy_one(&entry.path, &target).await }.boxed())
                .await;
        }

        window.finish().await
    }
}

impl std::fmt::Debug for Content {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Content")
            .field("content_type", &self.content_type)
            .field("size", &self.size)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use futures::TryStreamExt;
    use storage::ObjectStoreBackend;

    fn body(data: &'static [u8]) -> ByteStream {
        futures::stream::once(async move { Ok(Bytes::from_static(data)) }).boxed()
    }

    async fn read(store: &ObjectStore, path: &str) -> Vec<u8> {
        let stream = store.get_stream(path).await.unwrap();
        let chunks: Vec<Bytes> = stream.try_collect().await.unwrap();
        chunks.concat()
    }

    #[tokio::test]
    async fn test_put_then_get() {
        let store = ObjectStore::new(Arc::new(ObjectStoreBackend::memory()));

        store.put_stream("a/b.txt", body(b"payload"), None).await.unwrap();
        assert_eq!(read(&store, "a/b.txt").await, b"payload");
        assert_eq!(store.head("a/b.txt").await.unwrap().size, 7);
    }

    #[tokio::test]
    async fn test_copy_tree() {
        let store = ObjectStore::new(Arc::new(ObjectStoreBackend::memory())).with_window(2);
        for path in ["src/a", "src/b/c", "src/b/d/e", "other/x"] {
            store.put_stream(path, body(b"x"), None).await.unwrap();
        }

        assert_eq!(store.copy_tree("src/", "dst/").await.unwrap(), 3);
        assert_eq!(read(&store, "dst/b/d/e").await, b"x");
        assert!(store.head("dst/x").await.unwrap_err().is_not_found());
    }
}
