mod address;
mod zip;

use std::sync::Arc;

use async_stream::try_stream;
use futures::StreamExt;
use storage::{Backend, ObjectMeta};

pub use address::{is_archive_name, ArchiveAddress, ARCHIVE_EXTENSIONS};
pub use zip::{open_member, ZipDirectory, ZipEntry};

use crate::auth::Credential;
use crate::error::{RegistryError, Result};
use crate::path::PathPredicate;
use crate::store::{ByteStream, Entry, EntryStream, ListMode};

/// One item of an archive folder listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveItem<'a> {
    /// Synthesized folder, named relative to the inner prefix (ends with `/`)
    Folder(&'a str),
    /// A member file and its name relative to the inner prefix
    File(&'a ZipEntry, &'a str),
}

/// Group sorted entry paths under `prefix`.
///
/// Entries sharing a folder are contiguous once sorted, so remembering the
/// last folder emitted is enough to avoid duplicates.
pub fn group<'a>(
    entries: &'a [ZipEntry],
    prefix: &'a str,
    mode: ListMode,
) -> impl Iterator<Item = ArchiveItem<'a>> + 'a {
    let mut last_folder: Option<&'a str> = None;

    entries
        .iter()
        .filter(move |entry| entry.path.starts_with(prefix) && entry.path.len() > prefix.len())
        .filter_map(move |entry| {
            let name = &entry.path[prefix.len()..];
            match mode {
                ListMode::Nested if entry.is_dir() => None,
                ListMode::Nested => Some(ArchiveItem::File(entry, name)),
                ListMode::Flat => match name.find('/') {
                    Some(p) => {
                        let folder = &name[..=p];
                        if last_folder == Some(folder) {
                            return None;
                        }
                        last_folder = Some(folder);
                        Some(ArchiveItem::Folder(folder))
                    }
                    None => Some(ArchiveItem::File(entry, name)),
                },
            }
        })
}

/// Presents stored zip archives as directories.
#[derive(Debug, Clone)]
pub struct ArchiveVirtualizer {
    backend: Arc<dyn Backend>,
}

impl ArchiveVirtualizer {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self { backend }
    }

    /// Check that the archive object exists.
    ///
    /// A missing or delete-marked object yields `None` so the caller can fall
    /// back to ordinary path handling.
    pub async fn locate(&self, archive: &str) -> Result<Option<ObjectMeta>> {
        match self.backend.head(archive).await {
            Ok(meta) if meta.delete_marker => Ok(None),
            Ok(meta) => Ok(Some(meta)),
            Err(storage::StorageError::NotFound(_)) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Locate the archive and read its directory.
    pub async fn directory(&self, archive: &str) -> Result<Option<Arc<ZipDirectory>>> {
        let Some(meta) = self.locate(archive).await? else {
            return Ok(None);
        };
        let directory = ZipDirectory::read(self.backend.as_ref(), archive, meta.size).await?;
        Ok(Some(Arc::new(directory)))
    }

    /// List a folder inside an archive, or `None` when there is no archive.
    pub async fn list(
        &self,
        address: &ArchiveAddress,
        mode: ListMode,
        credential: Option<&Credential>,
    ) -> Result<Option<EntryStream>> {
        let Some(directory) = self.directory(&address.archive).await? else {
            return Ok(None);
        };
        let predicate = credential.map(|c| c.predicate().clone());
        Ok(Some(
            list_directory(
                self.backend.clone(),
                directory,
                address.archive.clone(),
                address.inner.clone(),
                mode,
                predicate,
            )
            .boxed(),
        ))
    }

    /// Resolve a member file, or `None` when there is no archive.
    ///
    /// A present archive without the member is `NotFound`.
    pub async fn entry(&self, address: &ArchiveAddress) -> Result<Option<Entry>> {
        let Some(directory) = self.directory(&address.archive).await? else {
            return Ok(None);
        };
        self.member(&directory, address).map(Some)
    }

    /// Look a member file up in an already read directory.
    pub fn member(&self, directory: &ZipDirectory, address: &ArchiveAddress) -> Result<Entry> {
        match directory.find(&address.inner) {
            Some(member) if !member.is_dir() => Ok(Entry::archive_member(
                self.backend.clone(),
                crate::path::file_name(&member.path),
                &address.archive,
                Arc::new(member.clone()),
            )),
            _ => Err(RegistryError::NotFound(address.path())),
        }
    }

    /// Stream a member's content, or `None` when there is no archive.
    pub async fn open(&self, address: &ArchiveAddress) -> Result<Option<ByteStream>> {
        match self.entry(address).await? {
            Some(entry) => entry.open().await.map(Some),
            None => Ok(None),
        }
    }
}

fn list_directory(
    backend: Arc<dyn Backend>,
    directory: Arc<ZipDirectory>,
    archive: String,
    prefix: String,
    mode: ListMode,
    predicate: Option<PathPredicate>,
) -> impl futures::Stream<Item = Result<Entry>> + Send + 'static {
    try_stream! {
        let allowed = |path: &str, folder: bool| match &predicate {
            None => true,
            Some(p) if folder => p.matches_dir(path),
            Some(p) => p.matches(path),
        };

        for item in group(directory.entries(), &prefix, mode) {
            match item {
                ArchiveItem::Folder(name) => {
                    let path = format!("{}/{}{}", archive, prefix, name);
                    if allowed(&path, true) {
                        yield Entry::directory(name, path);
                    }
                }
                ArchiveItem::File(member, name) => {
                    let path = format!("{}/{}", archive, member.path);
                    if allowed(&path, false) {
                        yield Entry::archive_member(
                            backend.clone(),
                            name,
                            &archive,
                            Arc::new(member.clone()),
                        );
                    }
                }
            }
        }
    }
}
