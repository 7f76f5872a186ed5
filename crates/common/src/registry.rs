use std::sync::Arc;

use storage::{Backend, ObjectStoreBackend};

use crate::archive::{ArchiveAddress, ArchiveVirtualizer};
use crate::auth::{
    AccessGate, Credential, Decision, HttpIdentityService, IdentityService, Role, Token,
    TokenValidator,
};
use crate::bulk::{BulkCoordinator, BulkReport, Export, Selection};
use crate::config::RegistryConfig;
use crate::error::{RegistryError, Result};
use crate::path::{normalize, valid_path};
use crate::search::{search, SearchQuery};
use crate::store::{
    content_type_for, ByteStream, Content, Entry, EntryStream, ListMode, ObjectStore,
};

/// Main entry point for collaborators (route handlers, protocol
/// translators, renderers).
///
/// Every operation takes the caller's credential and checks it against the
/// path it touches before reaching the backend.
#[derive(Debug, Clone)]
pub struct Registry {
    validator: TokenValidator,
    store: ObjectStore,
    archives: ArchiveVirtualizer,
    bulk: BulkCoordinator,
    reserved: Arc<Vec<String>>,
    window: usize,
}

impl Registry {
    /// Build a registry from configuration: the configured storage backend
    /// and the HTTP identity service.
    pub async fn new(config: RegistryConfig) -> Result<Self> {
        let backend = ObjectStoreBackend::new(config.storage.clone()).await?;
        let identity = HttpIdentityService::new(&config.identity)
            .map_err(|e| RegistryError::Config(e.to_string()))?;
        Ok(Self::with_parts(&config, Arc::new(backend), Arc::new(identity)))
    }

    /// Build a registry over explicit collaborators.
    pub fn with_parts(
        config: &RegistryConfig,
        backend: Arc<dyn Backend>,
        identity: Arc<dyn IdentityService>,
    ) -> Self {
        let store = ObjectStore::new(backend.clone()).with_window(config.bulk.window());
        let archives = ArchiveVirtualizer::new(backend);
        let bulk = BulkCoordinator::new(store.clone(), archives.clone(), &config.bulk);

        Self {
            validator: TokenValidator::new(config, identity),
            store,
            archives,
            bulk,
            reserved: Arc::new(config.bulk.reserved_segments.clone()),
            window: config.bulk.window(),
        }
    }

    pub fn store(&self) -> &ObjectStore {
        &self.store
    }

    pub fn validator(&self) -> &TokenValidator {
        &self.validator
    }

    /// Resolve a token to a credential. No token at all is `Unauthenticated`.
    pub async fn authenticate(&self, token: Option<&Token>) -> Result<Arc<Credential>> {
        self.validator.validate(token).await
    }

    pub fn authorize(
        &self,
        credential: Option<&Credential>,
        required: Role,
        path: &str,
    ) -> Decision {
        AccessGate::authorize(credential, required, normalize(path))
    }

    /// List a directory (`a/b/`) or a folder inside an archive (`a/b.zip/c/`).
    pub async fn list(
        &self,
        path: &str,
        mode: ListMode,
        credential: &Credential,
    ) -> Result<EntryStream> {
        let path = normalize(path);
        self.authorize(Some(credential), Role::Reader, path).into_result()?;

        if let Some(address) = ArchiveAddress::parse(path).filter(ArchiveAddress::is_folder) {
            if let Some(entries) = self.archives.list(&address, mode, Some(credential)).await? {
                return Ok(entries);
            }
        }

        Ok(self.store.list(path, mode, Some(credential)))
    }

    /// List inside an archive. Fails with `NotFound` when `archive` is not a
    /// stored archive.
    pub async fn list_archive_entries(
        &self,
        archive: &str,
        inner_prefix: &str,
        mode: ListMode,
        credential: &Credential,
    ) -> Result<EntryStream> {
        let address = ArchiveAddress {
            archive: normalize(archive).trim_end_matches('/').to_string(),
            inner: inner_prefix.trim_start_matches('/').to_string(),
        };
        self.authorize(Some(credential), Role::Reader, &address.path()).into_result()?;

        self.archives
            .list(&address, mode, Some(credential))
            .await?
            .ok_or_else(|| RegistryError::NotFound(address.archive.clone()))
    }

    /// Metadata of a file, plain object or archive member.
    pub async fn head(&self, path: &str, credential: &Credential) -> Result<Entry> {
        let path = normalize(path);
        self.authorize(Some(credential), Role::Reader, path).into_result()?;

        if let Some(address) = ArchiveAddress::parse(path) {
            if let Some(entry) = self.archives.entry(&address).await? {
                return Ok(entry);
            }
        }

        let meta = self.store.head(path).await?;
        Ok(Entry::object(
            self.store.backend().clone(),
            crate::path::file_name(path),
            meta,
        ))
    }

    /// Stream a file, plain object or archive member.
    pub async fn get(&self, path: &str, credential: &Credential) -> Result<Content> {
        let path = normalize(path);
        self.authorize(Some(credential), Role::Reader, path).into_result()?;
        if path.is_empty() || path.ends_with('/') {
            return Err(RegistryError::InvalidPath(path.to_string()));
        }

        if let Some(address) = ArchiveAddress::parse(path) {
            if let Some(entry) = self.archives.entry(&address).await? {
                return Ok(Content {
                    content_type: content_type_for(path),
                    size: entry.size,
                    body: entry.open().await?,
                });
            }
        }

        let meta = self.store.head(path).await?;
        Ok(Content {
            content_type: meta.content_type.clone().or_else(|| content_type_for(path)),
            size: Some(meta.size),
            body: self.store.get_stream(path).await?,
        })
    }

    /// Store a file.
    pub async fn put(
        &self,
        path: &str,
        body: ByteStream,
        content_type: Option<&str>,
        credential: &Credential,
    ) -> Result<()> {
        let path = normalize(path);
        self.authorize(Some(credential), Role::Writer, path).into_result()?;
        if path.ends_with('/') || !valid_path(path, self.reserved.as_slice()) {
            return Err(RegistryError::InvalidPath(path.to_string()));
        }

        self.store.put_stream(path, body, content_type).await?;
        tracing::info!(path, "stored");
        Ok(())
    }

    /// Delete a file, or every object under a directory path.
    pub async fn delete(&self, path: &str, credential: &Arc<Credential>) -> Result<BulkReport> {
        let path = normalize(path);
        self.authorize(Some(credential.as_ref()), Role::Writer, path)
            .into_result()?;

        if path.is_empty() || path.ends_with('/') {
            return self.bulk.delete(&Selection::subtree(path), credential).await;
        }
        if !valid_path(path, self.reserved.as_slice()) {
            return Err(RegistryError::InvalidPath(path.to_string()));
        }

        self.store.delete_many(&[path.to_string()]).await?;
        tracing::info!(path, "deleted");
        Ok(BulkReport {
            completed: 1,
            skipped: 0,
        })
    }

    /// Copy a file (or archive member) to `to`, or a directory tree when
    /// `from` ends with `/`.
    pub async fn copy(
        &self,
        from: &str,
        to: &str,
        credential: &Arc<Credential>,
    ) -> Result<BulkReport> {
        let from = normalize(from);
        let to = normalize(to);
        self.authorize(Some(credential.as_ref()), Role::Reader, from)
            .into_result()?;

        if from.is_empty() || from.ends_with('/') {
            let target = if to.is_empty() || to.ends_with('/') {
                to.to_string()
            } else {
                format!("{}/", to)
            };
            return self.bulk.copy(&Selection::subtree(from), &target, credential).await;
        }

        let (root, name) = match from.rfind('/') {
            Some(p) => (&from[..=p], &from[p + 1..]),
            None => ("", from),
        };
        self.bulk
            .copy(&Selection::items(root, [name]), to, credential)
            .await
    }

    pub async fn bulk_delete(
        &self,
        selection: &Selection,
        credential: &Arc<Credential>,
    ) -> Result<BulkReport> {
        self.bulk.delete(selection, credential).await
    }

    pub async fn bulk_copy(
        &self,
        selection: &Selection,
        target: &str,
        credential: &Arc<Credential>,
    ) -> Result<BulkReport> {
        self.bulk.copy(selection, target, credential).await
    }

    pub fn bulk_export(
        &self,
        selection: &Selection,
        credential: &Arc<Credential>,
    ) -> Result<Export> {
        self.bulk.export(selection, credential)
    }

    pub async fn bulk_upload(
        &self,
        dir: &str,
        files: Vec<(String, ByteStream)>,
        credential: &Arc<Credential>,
    ) -> Result<BulkReport> {
        self.bulk.upload(dir, files, credential).await
    }

    /// Search the files under a directory (or archive folder).
    pub async fn search(
        &self,
        path: &str,
        query: SearchQuery,
        credential: &Credential,
    ) -> Result<EntryStream> {
        let entries = self.list(path, ListMode::Nested, credential).await?;
        Ok(search(entries, Arc::new(query), self.window))
    }
}
