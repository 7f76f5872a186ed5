mod export;
mod selection;

use std::sync::Arc;

use futures::{FutureExt, StreamExt};
use serde::Serialize;

pub use export::{export_name, tar_gz_stream, tar_stream, Export};
pub use selection::Selection;

use crate::archive::ArchiveVirtualizer;
use crate::auth::{AccessGate, Credential, Role};
use crate::config::BulkConfig;
use crate::error::{RegistryError, Result};
use crate::path::valid_path;
use crate::store::{ByteStream, EntryStream, ObjectStore, Window};

/// What a bulk operation did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BulkReport {
    /// Items deleted, copied or written
    pub completed: usize,
    /// Items left alone because the credential does not cover them
    pub skipped: usize,
}

/// Runs delete, copy, export and upload over selections.
#[derive(Debug, Clone)]
pub struct BulkCoordinator {
    store: ObjectStore,
    archives: ArchiveVirtualizer,
    batch_size: usize,
    window: usize,
    reserved: Arc<Vec<String>>,
}

impl BulkCoordinator {
    pub fn new(store: ObjectStore, archives: ArchiveVirtualizer, config: &BulkConfig) -> Self {
        Self {
            store,
            archives,
            batch_size: config.batch_size(),
            window: config.window(),
            reserved: Arc::new(config.reserved_segments.clone()),
        }
    }

    /// Files of a selection, named relative to its root.
    pub fn enumerate(&self, selection: &Selection, credential: &Arc<Credential>) -> EntryStream {
        selection::enumerate(
            self.store.clone(),
            self.archives.clone(),
            selection.clone(),
            credential.clone(),
            self.reserved.clone(),
        )
        .boxed()
    }

    /// Delete every object in the selection.
    ///
    /// Paths are flushed in batches as soon as a batch fills. A failing batch
    /// stops the operation; earlier batches stay deleted.
    pub async fn delete(
        &self,
        selection: &Selection,
        credential: &Arc<Credential>,
    ) -> Result<BulkReport> {
        AccessGate::authorize(Some(credential.as_ref()), Role::Writer, &selection.root)
            .into_result()?;

        let mut entries = self.enumerate(selection, credential);
        let mut batch = Vec::with_capacity(self.batch_size);
        let mut report = BulkReport::default();

        while let Some(entry) = entries.next().await {
            let entry = entry.map_err(|e| partial(report.completed, e))?;

            // Archive members are not objects of their own
            if entry.is_archive_member() {
                report.skipped += 1;
                continue;
            }
            if !AccessGate::authorize(Some(credential.as_ref()), Role::Writer, &entry.path)
                .is_allowed()
            {
                report.skipped += 1;
                continue;
            }

            batch.push(entry.path);
            if batch.len() >= self.batch_size {
                self.flush(&mut batch, &mut report).await?;
            }
        }
        if !batch.is_empty() {
            self.flush(&mut batch, &mut report).await?;
        }

        tracing::info!(
            root = %selection.root,
            deleted = report.completed,
            skipped = report.skipped,
            "bulk delete finished"
        );
        Ok(report)
    }

    async fn flush(&self, batch: &mut Vec<String>, report: &mut BulkReport) -> Result<()> {
        tracing::debug!(size = batch.len(), "deleting batch");
        self.store
            .delete_many(batch)
            .await
            .map_err(|e| partial(report.completed, e))?;
        report.completed += batch.len();
        batch.clear();
        Ok(())
    }

    /// Copy the selection to `target`.
    ///
    /// A directory target (`/`-terminated) keeps the selection's relative
    /// structure. A single selected file copied to a non-directory target is
    /// renamed. Each target path is authorized on its own; excluded targets
    /// are skipped.
    pub async fn copy(
        &self,
        selection: &Selection,
        target: &str,
        credential: &Arc<Credential>,
    ) -> Result<BulkReport> {
        let target = target.trim_start_matches('/');
        if !target.is_empty() && !valid_path::<&str>(target, &[]) {
            return Err(RegistryError::InvalidPath(target.to_string()));
        }
        AccessGate::authorize(Some(credential.as_ref()), Role::Writer, target).into_result()?;

        let single = selection.single_item();
        let mut entries = self.enumerate(selection, credential);
        let mut window = Window::new(self.window);
        let mut skipped = 0;

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

            let to = if target.is_empty() || target.ends_with('/') {
                format!("{}{}", target, entry.name)
            } else if single.as_deref() == Some(entry.path.as_str()) {
                target.to_string()
            } else {
                format!("{}/{}", target, entry.name)
            };

            if !valid_path(&to, self.reserved.as_slice())
                || !AccessGate::authorize(Some(credential.as_ref()), Role::Writer, &to).is_allowed()
            {
                tracing::warn!(from = %entry.path, to = %to, "copy target not allowed, skipping");
                skipped += 1;
                continue;
            }

            let store = self.store.clone();
            let job = async move {
                if entry.is_archive_member() {
                    let body = entry.open().await?;
                    store.put_stream(&to, body, None).await
                } else {
                    store.copy_one(&entry.path, &to).await
                }
            };
            window.push(job.boxed()).await;
        }

        let completed = window.finish().await?;
        tracing::info!(
            root = %selection.root,
            to = %target,
            completed,
            skipped,
            "bulk copy finished"
        );
        Ok(BulkReport { completed, skipped })
    }

    /// Stream the selection as a `.tar.gz`.
    pub fn export(&self, selection: &Selection, credential: &Arc<Credential>) -> Result<Export> {
        AccessGate::authorize(Some(credential.as_ref()), Role::Reader, &selection.root)
            .into_result()?;

        let entries = self.enumerate(selection, credential);
        Ok(Export {
            file_name: export_name(&selection.root),
            content_type: "application/gzip",
            body: tar_gz_stream(entries),
        })
    }

    /// Write named streams under the directory `dir`.
    ///
    /// Names that are not valid paths, or that the credential may not write,
    /// are skipped.
    pub async fn upload(
        &self,
        dir: &str,
        files: Vec<(String, ByteStream)>,
        credential: &Arc<Credential>,
    ) -> Result<BulkReport> {
        let dir = dir.trim_start_matches('/');
        if !dir.is_empty() && !dir.ends_with('/') {
            return Err(RegistryError::InvalidPath(dir.to_string()));
        }
        AccessGate::authorize(Some(credential.as_ref()), Role::Writer, dir).into_result()?;

        let mut report = BulkReport::default();
        for (name, body) in files {
            let path = format!("{}{}", dir, name.trim_start_matches('/'));
            if !valid_path(&path, self.reserved.as_slice())
                || path.ends_with('/')
                || !AccessGate::authorize(Some(credential.as_ref()), Role::Writer, &path)
                    .is_allowed()
            {
                tracing::warn!(path = %path, "upload target not allowed, skipping");
                report.skipped += 1;
                continue;
            }

            self.store
                .put_stream(&path, body, None)
                .await
                .map_err(|e| partial(report.completed, e))?;
            report.completed += 1;
        }

        tracing::info!(
            dir,
            uploaded = report.completed,
            skipped = report.skipped,
            "upload finished"
        );
        Ok(report)
    }
}

fn partial(completed: usize, source: RegistryError) -> RegistryError {
    if completed == 0 {
        return source;
    }
    RegistryError::PartialBatchFailure {
        completed,
        source: Box::new(source),
    }
}
