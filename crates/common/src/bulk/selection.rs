use std::sync::Arc;

use async_stream::try_stream;
use futures::{Stream, StreamExt};

use crate::archive::{group, ArchiveAddress, ArchiveItem, ArchiveVirtualizer, ZipDirectory};
use crate::auth::Credential;
use crate::error::Result;
use crate::path::valid_path;
use crate::store::{Entry, ListMode, ObjectStore};

/// The paths a bulk operation targets.
///
/// `root` is a directory (`a/b/`, or empty for the bucket root). With no
/// `items` everything under the root is selected; otherwise each item is a
/// file or directory name relative to the root.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    pub root: String,
    pub items: Vec<String>,
}

impl Selection {
    /// Everything under `root`.
    pub fn subtree(root: impl Into<String>) -> Self {
        Self {
            root: with_slash(root.into()),
            items: Vec::new(),
        }
    }

    /// Named items under `root`.
    pub fn items<I, S>(root: impl Into<String>, items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            root: with_slash(root.into()),
            items: items.into_iter().map(Into::into).collect(),
        }
    }

    /// The single explicitly named item, if that is all there is.
    pub fn single_item(&self) -> Option<String> {
        match self.items.as_slice() {
            [item] if !item.is_empty() && !item.ends_with('/') => {
                Some(format!("{}{}", self.root, item))
            }
            _ => None,
        }
    }
}

fn with_slash(root: String) -> String {
    let root = root.trim_start_matches('/').to_string();
    if root.is_empty() || root.ends_with('/') {
        root
    } else {
        format!("{}/", root)
    }
}

/// Enumerate the files of a selection in nested mode.
///
/// Yielded entries are named relative to the selection root. Paths that
/// fail `valid_path` are dropped, as are paths hidden by the credential.
/// Explicit items under an archive resolve to its members; explicit items
/// that are objects are yielded as they are, everything else is listed as a
/// directory.
pub(crate) fn enumerate(
    store: ObjectStore,
    archives: ArchiveVirtualizer,
    selection: Selection,
    credential: Arc<Credential>,
    reserved: Arc<Vec<String>>,
) -> impl Stream<Item = Result<Entry>> + Send + 'static {
    try_stream! {
        let root = selection.root.clone();
        let mut names = selection.items.clone();
        names.sort();
        if names.is_empty() {
            names.push(String::new());
        }

        let relative = |path: &str| path.strip_prefix(root.as_str()).unwrap_or(path).to_string();
        let keep = |entry: &Entry| {
            entry.is_file
                && valid_path(&entry.path, reserved.as_slice())
                && credential.allows(&entry.path)
        };

        // Consecutive items often share an archive; read its directory once.
        let mut current: Option<(String, Option<Arc<ZipDirectory>>)> = None;

        for name in names {
            let path = format!("{}{}", root, name.trim_start_matches('/'));

            if let Some(address) = ArchiveAddress::parse(&path) {
                let cached = matches!(&current, Some((archive, _)) if *archive == address.archive);
                if !cached {
                    let directory = archives.directory(&address.archive).await?;
                    current = Some((address.archive.clone(), directory));
                }

                if let Some((_, Some(directory))) = &current {
                    if address.is_folder() {
                        for item in group(directory.entries(), &address.inner, ListMode::Nested) {
                            if let ArchiveItem::File(member, _) = item {
                                let entry = Entry::archive_member(
                                    store.backend().clone(),
                                    "",
                                    &address.archive,
                                    Arc::new(member.clone()),
                                );
                                if keep(&entry) {
                                    let name = relative(&entry.path);
                                    yield entry.with_name(name);
                                }
                            }
                        }
                    } else {
                        match archives.member(directory, &address) {
                            Ok(member) if keep(&member) => {
                                let name = relative(&member.path);
                                yield member.with_name(name);
                            }
                            Ok(_) => {}
                            Err(e) if e.is_not_found() => {
                                tracing::debug!(path = %path, "selected archive member not found");
                            }
                            Err(e) => Err(e)?,
                        }
                    }
                    continue;
                }
            }

            let mut prefix = path.clone();
            if !path.is_empty() && !path.ends_with('/') {
                match store.head(&path).await {
                    Ok(meta) => {
                        let entry = Entry::object(store.backend().clone(), relative(&path), meta);
                        if keep(&entry) {
                            yield entry;
                        }
                        continue;
                    }
                    Err(e) if e.is_not_found() => prefix.push('/'),
                    Err(e) => Err(e)?,
                }
            }

            let mut entries = store.list(&prefix, ListMode::Nested, Some(credential.as_ref()));
            while let Some(entry) = entries.next().await {
                let entry = entry?;
                if keep(&entry) {
                    let name = relative(&entry.path);
                    yield entry.with_name(name);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roots_are_normalized() {
        assert_eq!(Selection::subtree("a/b").root, "a/b/");
        assert_eq!(Selection::subtree("/a/b/").root, "a/b/");
        assert_eq!(Selection::subtree("").root, "");
    }

    #[test]
    fn test_single_item() {
        assert_eq!(
            Selection::items("a", ["x.txt"]).single_item().as_deref(),
            Some("a/x.txt")
        );
        assert!(Selection::items("a", ["x/"]).single_item().is_none());
        assert!(Selection::items("a", ["x", "y"]).single_item().is_none());
        assert!(Selection::subtree("a").single_item().is_none());
    }
}
