//! File name and content search over a listing.
//!
//! File patterns are globs, several per string separated by `,` or `;`.
//! Content patterns are case-insensitive regular expressions tested line by
//! line; a file matches at its first matching line and the rest of it is
//! never read. Patterns that fail to compile are dropped.

use std::sync::Arc;

use futures::StreamExt;
use globset::GlobMatcher;
use regex::{Regex, RegexBuilder};
use tokio::io::AsyncBufReadExt;
use tokio_util::io::StreamReader;

use crate::path::PathMatcher;
use crate::store::{Entry, EntryStream};

/// Compiled search patterns.
#[derive(Debug, Clone, Default)]
pub struct SearchQuery {
    files: Vec<GlobMatcher>,
    content: Vec<Regex>,
}

impl SearchQuery {
    pub fn new<F, C>(file_patterns: &[F], content_patterns: &[C]) -> Self
    where
        F: AsRef<str>,
        C: AsRef<str>,
    {
        let globs: Vec<&str> = file_patterns
            .iter()
            .flat_map(|p| p.as_ref().split([',', ';']))
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .collect();

        let content = content_patterns
            .iter()
            .map(|p| p.as_ref().trim())
            .filter(|p| !p.is_empty())
            .filter_map(|p| match RegexBuilder::new(p).case_insensitive(true).build() {
                Ok(regex) => Some(regex),
                Err(e) => {
                    tracing::warn!(pattern = p, error = %e, "ignoring invalid content pattern");
                    None
                }
            })
            .collect();

        Self {
            files: PathMatcher::compile(&globs),
            content,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty() && self.content.is_empty()
    }

    /// Whether a path passes the file patterns.
    ///
    /// A pattern without `/` is also tried against the bare file name, so
    /// `*.pom` finds poms at any depth.
    pub fn matches_path(&self, path: &str) -> bool {
        if self.files.is_empty() {
            return true;
        }
        let name = crate::path::file_name(path);
        self.files.iter().any(|glob| {
            glob.is_match(path) || (!glob.glob().glob().contains('/') && glob.is_match(name))
        })
    }

    pub fn matches_line(&self, line: &str) -> bool {
        self.content.iter().any(|regex| regex.is_match(line))
    }

    fn searches_content(&self) -> bool {
        !self.content.is_empty()
    }
}

/// Filter a nested listing down to the files matching `query`.
///
/// Up to `window` files are scanned at once. Files whose content cannot be
/// read are logged and left out.
pub fn search(entries: EntryStream, query: Arc<SearchQuery>, window: usize) -> EntryStream {
    let filtered = {
        let query = query.clone();
        entries.filter(move |entry| {
            let keep = match entry {
                Ok(entry) => entry.is_file && query.matches_path(&entry.path),
                Err(_) => true,
            };
            futures::future::ready(keep)
        })
    };

    if !query.searches_content() {
        return filtered.boxed();
    }

    filtered
        .map(move |entry| {
            let query = query.clone();
            async move {
                match entry {
                    Ok(entry) => match scan(&entry, &query).await {
                        Ok(true) => Some(Ok(entry)),
                        Ok(false) => None,
                        Err(e) => {
                            tracing::warn!(
                                path = %entry.path,
                                error = %e,
                                "skipping unreadable file"
                            );
                            None
                        }
                    },
                    Err(e) => Some(Err(e)),
                }
            }
        })
        .buffer_unordered(window.max(1))
        .filter_map(futures::future::ready)
        .boxed()
}

/// Read `entry` line by line until a line matches.
async fn scan(entry: &Entry, query: &SearchQuery) -> crate::Result<bool> {
    let content = entry.open().await?;
    let mut lines = StreamReader::new(content).lines();

    loop {
        match lines.next_line().await {
            Ok(Some(line)) if query.matches_line(&line) => return Ok(true),
            Ok(Some(_)) => {}
            Ok(None) => return Ok(false),
            // Binary content is not searchable
            Err(e) if e.kind() == std::io::ErrorKind::InvalidData => return Ok(false),
            Err(e) => return Err(e.into()),
        }
    }
}
