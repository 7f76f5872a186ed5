use std::sync::Arc;

use chrono::{DateTime, Utc};
use storage::{Backend, ByteStream, ObjectMeta};

use crate::archive::{self, ZipEntry};
use crate::error::{RegistryError, Result};

/// Where an entry's bytes come from.
#[derive(Debug, Clone)]
pub enum ContentSource {
    /// A plain object in the bucket
    Object {
        backend: Arc<dyn Backend>,
        key: String,
    },
    /// A member of a stored zip archive, read with ranged requests
    ArchiveMember {
        backend: Arc<dyn Backend>,
        archive: String,
        member: Arc<ZipEntry>,
    },
}

impl ContentSource {
    /// Open the content. Nothing is fetched until this is called.
    pub async fn open(&self) -> Result<ByteStream> {
        match self {
            ContentSource::Object { backend, key } => Ok(backend.get(key).await?),
            ContentSource::ArchiveMember {
                backend,
                archive,
                member,
            } => archive::open_member(backend.as_ref(), archive, member).await,
        }
    }
}

/// One item of a listing.
///
/// `name` is relative to the listed prefix; directories end with `/`.
/// `path` is the full registry path.
#[derive(Debug, Clone)]
pub struct Entry {
    pub name: String,
    pub path: String,
    pub is_file: bool,
    pub size: Option<u64>,
    pub last_modified: Option<DateTime<Utc>>,
    source: Option<ContentSource>,
}

impl Entry {
    /// A synthesized directory.
    pub fn directory(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            is_file: false,
            size: None,
            last_modified: None,
            source: None,
        }
    }

    /// A stored object.
    pub fn object(backend: Arc<dyn Backend>, name: impl Into<String>, meta: ObjectMeta) -> Self {
        Self {
            name: name.into(),
            path: meta.key.clone(),
            is_file: true,
            size: Some(meta.size),
            last_modified: meta.last_modified,
            source: Some(ContentSource::Object {
                backend,
                key: meta.key,
            }),
        }
    }

    /// A file inside a stored archive.
    pub fn archive_member(
        backend: Arc<dyn Backend>,
        name: impl Into<String>,
        archive: &str,
        member: Arc<ZipEntry>,
    ) -> Self {
        Self {
            name: name.into(),
            path: format!("{}/{}", archive, member.path),
            is_file: true,
            size: Some(member.uncompressed_size),
            last_modified: member.last_modified,
            source: Some(ContentSource::ArchiveMember {
                backend,
                archive: archive.to_string(),
                member,
            }),
        }
    }

    /// Same entry, renamed relative to another root.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn source(&self) -> Option<&ContentSource> {
        self.source.as_ref()
    }

    pub fn is_archive_member(&self) -> bool {
        matches!(self.source, Some(ContentSource::ArchiveMember { .. }))
    }

    /// Open the entry's content stream.
    pub async fn open(&self) -> Result<ByteStream> {
        match &self.source {
            Some(source) => source.open().await,
            None => Err(RegistryError::InvalidPath(self.path.clone())),
        }
    }
}
