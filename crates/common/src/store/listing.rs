use std::sync::Arc;

use async_stream::try_stream;
use futures::stream::BoxStream;
use futures::Stream;
use storage::Backend;

use super::entry::Entry;
use crate::error::{RegistryError, Result};
use crate::path::PathPredicate;

/// A lazy, forward-only listing. Dropping it abandons the backend request.
pub type EntryStream = BoxStream<'static, Result<Entry>>;

/// How a listing treats descendants below the prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ListMode {
    /// Immediate children only; deeper keys roll up into one directory each
    #[default]
    Flat,
    /// Every descendant file, named by its path relative to the prefix
    Nested,
}

/// Directory part of a listing prefix: everything up to the last `/`.
pub(crate) fn base_of(prefix: &str) -> &str {
    match prefix.rfind('/') {
        Some(p) => &prefix[..=p],
        None => "",
    }
}

/// Walk every page of a prefix listing.
///
/// The predicate only decides what is yielded; the cursor always advances
/// over the full page the backend returned.
pub(crate) fn list_backend(
    backend: Arc<dyn Backend>,
    prefix: String,
    mode: ListMode,
    predicate: Option<PathPredicate>,
) -> impl Stream<Item = Result<Entry>> + Send + 'static {
    try_stream! {
        let base_len = base_of(&prefix).len();
        let delimited = mode == ListMode::Flat;
        let mut continuation = None;

        loop {
            let page = backend
                .list_page(&prefix, delimited, continuation.take())
                .await
                .map_err(RegistryError::from)?;

            for dir in page.common_prefixes {
                if dir.len() <= base_len {
                    continue;
                }
                if predicate.as_ref().is_some_and(|p| !p.matches_dir(&dir)) {
                    continue;
                }
                yield Entry::directory(&dir[base_len..], dir.clone());
            }

            for meta in page.objects {
                // Directory markers (`a/b/`) and the prefix object itself
                if meta.key.ends_with('/') || meta.key.len() <= base_len {
                    continue;
                }
                if predicate.as_ref().is_some_and(|p| !p.matches(&meta.key)) {
                    continue;
                }
                let name = meta.key[base_len..].to_string();
                yield Entry::object(backend.clone(), name, meta);
            }

            match page.continuation {
                Some(next) => continuation = Some(next),
                None => break,
            }
        }
    }
}
