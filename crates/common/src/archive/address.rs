/// Extensions of zip-format archives that are browsable as directories.
pub const ARCHIVE_EXTENSIONS: &[&str] = &["zip", "jar", "nupkg"];

/// A path that points into a stored archive: `<archive>/<inner>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveAddress {
    /// Key of the archive object
    pub archive: String,
    /// Path inside the archive; empty for the root, `/`-terminated for folders
    pub inner: String,
}

impl ArchiveAddress {
    /// Split `path` at the first segment with an archive extension that is
    /// followed by `/`.
    ///
    /// `a/b.zip` alone is the archive object, not an address inside it.
    pub fn parse(path: &str) -> Option<Self> {
        let mut start = 0;
        while let Some(offset) = path[start..].find('/') {
            let end = start + offset;
            if is_archive_name(&path[start..end]) {
                return Some(Self {
                    archive: path[..end].to_string(),
                    inner: path[end + 1..].to_string(),
                });
            }
            start = end + 1;
        }
        None
    }

    /// Whether the address names a folder (or the root) inside the archive.
    pub fn is_folder(&self) -> bool {
        self.inner.is_empty() || self.inner.ends_with('/')
    }

    /// Full registry path of the address.
    pub fn path(&self) -> String {
        format!("{}/{}", self.archive, self.inner)
    }
}

/// Whether a file name has a recognized archive extension.
pub fn is_archive_name(name: &str) -> bool {
    match name.rsplit_once('.') {
        Some((stem, extension)) if !stem.is_empty() => ARCHIVE_EXTENSIONS
            .iter()
            .any(|known| extension.eq_ignore_ascii_case(known)),
        _ => false,
    }
}
