//! Streaming `.tar.gz` export.
//!
//! The tar stream is pulled member by member: a member's content is only
//! opened once the consumer has read everything before it. The gzip layer
//! flushes at every member boundary so compressed output keeps pace with
//! the members read. A member that fails mid-stream cannot be reported
//! through a status line anymore, so its error text is appended to the body
//! and the archive ends there.

use async_compression::tokio::write::GzipEncoder;
use async_stream::stream;
use bytes::Bytes;
use futures::stream::BoxStream;
use futures::StreamExt;
use storage::{ByteStream, StorageError};
use tar::{EntryType, Header};
use tokio::io::AsyncWriteExt;

use crate::store::EntryStream;

const BLOCK: usize = 512;
const NAME_FIELD: usize = 100;
const LONG_NAME_MARKER: &[u8] = b"././@LongLink";

/// A streamed archive of a selection.
pub struct Export {
    /// Suggested download name, e.g. `libs.tar.gz`
    pub file_name: String,
    pub content_type: &'static str,
    pub body: ByteStream,
}

impl std::fmt::Debug for Export {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Export")
            .field("file_name", &self.file_name)
            .field("content_type", &self.content_type)
            .finish()
    }
}

/// Download name for an export rooted at `root`.
pub fn export_name(root: &str) -> String {
    let name = crate::path::file_name(root);
    let name = if name.is_empty() { "registry" } else { name };
    format!("{}.tar.gz", name)
}

/// Pieces of a tar stream: raw bytes, and the point where a member ends.
enum TarPiece {
    Data(Bytes),
    MemberEnd,
}

/// Uncompressed tar stream of the entries, members named by `Entry::name`.
pub fn tar_stream(entries: EntryStream) -> ByteStream {
    tar_pieces(entries)
        .filter_map(|piece| async move {
            match piece {
                TarPiece::Data(bytes) => Some(Ok(bytes)),
                TarPiece::MemberEnd => None,
            }
        })
        .boxed()
}

/// Gzipped tar stream of the entries.
///
/// Compressed output is flushed after every member, so a consumer that has
/// received member N's bytes has not caused member N+1 to be opened.
pub fn tar_gz_stream(entries: EntryStream) -> ByteStream {
    stream! {
        let mut encoder = GzipEncoder::new(Vec::new());
        let mut pieces = tar_pieces(entries);

        while let Some(piece) = pieces.next().await {
            let written = match piece {
                TarPiece::Data(bytes) => encoder.write_all(&bytes).await,
                TarPiece::MemberEnd => encoder.flush().await,
            };
            if let Err(e) = written {
                yield Err(StorageError::Io(e));
                return;
            }
            if !encoder.get_ref().is_empty() {
                yield Ok(Bytes::from(std::mem::take(encoder.get_mut())));
            }
        }

        if let Err(e) = encoder.shutdown().await {
            yield Err(StorageError::Io(e));
            return;
        }
        let rest = encoder.into_inner();
        if !rest.is_empty() {
            yield Ok(Bytes::from(rest));
        }
    }
    .boxed()
}

fn tar_pieces(mut entries: EntryStream) -> BoxStream<'static, TarPiece> {
    stream! {
        let mut members = 0usize;

        while let Some(entry) = entries.next().await {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    yield TarPiece::Data(failure(&e.to_string()));
                    return;
                }
            };
            if !entry.is_file {
                continue;
            }

            let size = entry.size.unwrap_or(0);
            let mtime = entry.last_modified.map(|t| t.timestamp().max(0) as u64).unwrap_or(0);
            for block in headers(&entry.name, size, mtime) {
                yield TarPiece::Data(block);
            }

            let mut content = match entry.open().await {
                Ok(content) => content,
                Err(e) => {
                    tracing::error!(path = %entry.path, error = %e, "export member failed to open");
                    yield TarPiece::Data(failure(&e.to_string()));
                    return;
                }
            };

            let mut written = 0u64;
            while let Some(chunk) = content.next().await {
                let chunk = match chunk {
                    Ok(chunk) => chunk,
                    Err(e) => {
                        tracing::error!(path = %entry.path, error = %e, "export member failed");
                        yield TarPiece::Data(failure(&e.to_string()));
                        return;
                    }
                };
                written += chunk.len() as u64;
                if written > size {
                    break;
                }
                yield TarPiece::Data(chunk);
            }

            if written != size {
                let message = format!("{}: expected {} bytes, read {}", entry.path, size, written);
                tracing::error!(path = %entry.path, size, written, "export member size mismatch");
                yield TarPiece::Data(failure(&message));
                return;
            }

            let padding = padding(size);
            if padding > 0 {
                yield TarPiece::Data(Bytes::from(vec![0u8; padding]));
            }
            members += 1;
            yield TarPiece::MemberEnd;
        }

        // End of archive: two zero blocks
        yield TarPiece::Data(Bytes::from(vec![0u8; BLOCK * 2]));
        tracing::info!(members, "export finished");
    }
    .boxed()
}

fn failure(message: &str) -> Bytes {
    Bytes::from(format!("\nError: {}\n", message))
}

fn padding(size: u64) -> usize {
    (BLOCK - (size % BLOCK as u64) as usize) % BLOCK
}

/// Header blocks for one member, with a GNU long name record first when
/// the name does not fit the header.
fn headers(name: &str, size: u64, mtime: u64) -> Vec<Bytes> {
    let mut blocks = Vec::new();
    let name = name.as_bytes();

    if name.len() > NAME_FIELD {
        let mut long = Header::new_gnu();
        long.as_old_mut().name[..LONG_NAME_MARKER.len()].copy_from_slice(LONG_NAME_MARKER);
        long.set_mode(0o644);
        long.set_mtime(0);
        long.set_size(name.len() as u64 + 1);
        long.set_entry_type(EntryType::GNULongName);
        long.set_cksum();
        blocks.push(Bytes::copy_from_slice(long.as_bytes()));

        let mut data = name.to_vec();
        data.push(0);
        data.resize(data.len() + padding(data.len() as u64), 0);
        blocks.push(Bytes::from(data));
    }

    let mut header = Header::new_gnu();
    let stored = name.len().min(NAME_FIELD);
    header.as_old_mut().name[..stored].copy_from_slice(&name[..stored]);
    header.set_mode(0o644);
    header.set_mtime(mtime);
    header.set_size(size);
    header.set_entry_type(EntryType::Regular);
    header.set_cksum();
    blocks.push(Bytes::copy_from_slice(header.as_bytes()));

    blocks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_export_name() {
        assert_eq!(export_name("libs/maven/"), "maven.tar.gz");
        assert_eq!(export_name(""), "registry.tar.gz");
    }

    #[test]
    fn test_padding() {
        assert_eq!(padding(0), 0);
        assert_eq!(padding(1), 511);
        assert_eq!(padding(512), 0);
        assert_eq!(padding(513), 511);
    }

    #[test]
    fn test_long_names_use_gnu_record() {
        let name = "a/".repeat(80) + "file.txt";
        let blocks = headers(&name, 3, 0);

        assert_eq!(blocks.len(), 3);
        assert_eq!(&blocks[0][..LONG_NAME_MARKER.len()], LONG_NAME_MARKER);
        assert_eq!(blocks[1].len() % BLOCK, 0);
        assert_eq!(&blocks[1][..name.len()], name.as_bytes());
    }

    #[test]
    fn test_headers_are_readable() {
        let mut archive = Vec::new();
        for block in headers("dir/x.txt", 5, 0) {
            archive.extend_from_slice(&block);
        }
        archive.extend_from_slice(b"hello");
        archive.resize(archive.len() + padding(5) + BLOCK * 2, 0);

        let mut reader = tar::Archive::new(archive.as_slice());
        let mut entries = reader.entries().unwrap();
        let mut entry = entries.next().unwrap().unwrap();
        assert_eq!(entry.path().unwrap().to_str(), Some("dir/x.txt"));

        let mut content = String::new();
        std::io::Read::read_to_string(&mut entry, &mut content).unwrap();
        assert_eq!(content, "hello");
    }
}
