//! Just enough of the zip format to list an archive and stream one member
//! out of it with ranged reads.
//!
//! The central directory sits at the end of the file, so listing costs a
//! tail read (plus a wider one when a long archive comment hides the end
//! record) and at most one more read for the directory itself.

use async_compression::tokio::bufread::DeflateDecoder;
use chrono::{DateTime, NaiveDate, Utc};
use futures::{StreamExt, TryStreamExt};
use storage::{Backend, ByteStream, StorageError};
use tokio_util::io::{ReaderStream, StreamReader};

use crate::error::{RegistryError, Result};

const EOCD_SIGNATURE: u32 = 0x0605_4b50;
const EOCD_LEN: usize = 22;
const ZIP64_LOCATOR_SIGNATURE: u32 = 0x0706_4b50;
const ZIP64_LOCATOR_LEN: usize = 20;
const ZIP64_EOCD_SIGNATURE: u32 = 0x0606_4b50;
const ZIP64_EOCD_LEN: usize = 56;
const CENTRAL_HEADER_SIGNATURE: u32 = 0x0201_4b50;
const CENTRAL_HEADER_LEN: usize = 46;
const LOCAL_HEADER_SIGNATURE: u32 = 0x0403_4b50;
const LOCAL_HEADER_LEN: usize = 30;
const ZIP64_EXTRA_ID: u16 = 0x0001;

/// First tail read; covers archives with short or no comments.
const TAIL_READ: u64 = 4096;
/// End record plus the longest possible comment.
const MAX_TAIL: u64 = (EOCD_LEN + u16::MAX as usize) as u64;

const METHOD_STORED: u16 = 0;
const METHOD_DEFLATED: u16 = 8;
const FLAG_ENCRYPTED: u16 = 0x0001;

/// Central directory record of one archive member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZipEntry {
    /// Path inside the archive; folders end with `/`
    pub path: String,
    pub compressed_size: u64,
    pub uncompressed_size: u64,
    pub local_header_offset: u64,
    pub method: u16,
    pub flags: u16,
    pub last_modified: Option<DateTime<Utc>>,
}

impl ZipEntry {
    pub fn is_dir(&self) -> bool {
        self.path.ends_with('/')
    }

    pub fn is_encrypted(&self) -> bool {
        self.flags & FLAG_ENCRYPTED != 0
    }
}

/// Entries of an archive, sorted by path.
#[derive(Debug, Clone, Default)]
pub struct ZipDirectory {
    entries: Vec<ZipEntry>,
}

impl ZipDirectory {
    /// Read the central directory of the archive stored at `key`.
    pub async fn read(backend: &dyn Backend, key: &str, size: u64) -> Result<Self> {
        if size < EOCD_LEN as u64 {
            return Err(invalid(key, "too short to be a zip archive"));
        }

        let mut tail_start = size - size.min(TAIL_READ);
        let mut tail = backend.read_range(key, tail_start..size).await?;
        let mut eocd = find_eocd(&tail);

        if eocd.is_none() && tail_start > 0 {
            tail_start = size - size.min(MAX_TAIL);
            tail = backend.read_range(key, tail_start..size).await?;
            eocd = find_eocd(&tail);
        }
        let eocd = eocd.ok_or_else(|| invalid(key, "end of central directory not found"))?;

        let mut location = CentralDirectory::from_eocd(&tail[eocd..]);
        if location.needs_zip64() {
            location = read_zip64(backend, key, &tail, tail_start, eocd).await?;
        }

        let end = location
            .offset
            .checked_add(location.size)
            .filter(|end| *end <= size)
            .ok_or_else(|| invalid(key, "central directory out of bounds"))?;

        let mut entries = if location.offset >= tail_start {
            let from = (location.offset - tail_start) as usize;
            let to = (end - tail_start) as usize;
            parse_central_directory(&tail[from..to])
        } else {
            let buf = backend.read_range(key, location.offset..end).await?;
            parse_central_directory(&buf)
        }
        .map_err(|e| invalid(key, &e))?;

        entries.sort_by(|a, b| a.path.cmp(&b.path));
        tracing::debug!(archive = key, entries = entries.len(), "read zip directory");

        Ok(Self { entries })
    }

    pub fn from_entries(mut entries: Vec<ZipEntry>) -> Self {
        entries.sort_by(|a, b| a.path.cmp(&b.path));
        Self { entries }
    }

    pub fn entries(&self) -> &[ZipEntry] {
        &self.entries
    }

    /// Find a member by exact path.
    pub fn find(&self, path: &str) -> Option<&ZipEntry> {
        self.entries
            .binary_search_by(|entry| entry.path.as_str().cmp(path))
            .ok()
            .map(|index| &self.entries[index])
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Stream a member's uncompressed content.
///
/// Reads the local header to find where the data starts, then requests just
/// the compressed byte range.
pub async fn open_member(
    backend: &dyn Backend,
    archive: &str,
    entry: &ZipEntry,
) -> Result<ByteStream> {
    if entry.is_dir() {
        return Err(RegistryError::InvalidPath(format!("{}/{}", archive, entry.path)));
    }
    if entry.is_encrypted() {
        return Err(RegistryError::UnsupportedArchive(format!(
            "{}/{}: encrypted entry",
            archive, entry.path
        )));
    }
    if entry.method != METHOD_STORED && entry.method != METHOD_DEFLATED {
        return Err(RegistryError::UnsupportedArchive(format!(
            "{}/{}: compression method {}",
            archive, entry.path, entry.method
        )));
    }

    let out_of_bounds = || invalid(archive, "member offset out of bounds");
    let offset = entry.local_header_offset;
    let header_end = offset
        .checked_add(LOCAL_HEADER_LEN as u64)
        .ok_or_else(out_of_bounds)?;
    let header = backend.read_range(archive, offset..header_end).await?;
    if header.len() < LOCAL_HEADER_LEN || read_u32(&header, 0) != LOCAL_HEADER_SIGNATURE {
        return Err(invalid(archive, "bad local file header"));
    }

    let variable = read_u16(&header, 26) as u64 + read_u16(&header, 28) as u64;
    let start = header_end.checked_add(variable).ok_or_else(out_of_bounds)?;
    let end = start
        .checked_add(entry.compressed_size)
        .ok_or_else(out_of_bounds)?;
    if entry.compressed_size == 0 {
        return Ok(futures::stream::empty().boxed());
    }
    let data = backend.get_range(archive, start..end).await?;

    if entry.method == METHOD_STORED {
        return Ok(data);
    }

    let decoder = DeflateDecoder::new(StreamReader::new(data));
    Ok(ReaderStream::new(decoder).map_err(StorageError::Io).boxed())
}

fn invalid(key: &str, reason: &str) -> RegistryError {
    RegistryError::InvalidArchive(format!("{}: {}", key, reason))
}

/// Where the central directory lives.
#[derive(Debug, Clone, Copy)]
struct CentralDirectory {
    entries: u64,
    size: u64,
    offset: u64,
}

impl CentralDirectory {
    fn from_eocd(record: &[u8]) -> Self {
        Self {
            entries: read_u16(record, 10) as u64,
            size: read_u32(record, 12) as u64,
            offset: read_u32(record, 16) as u64,
        }
    }

    fn needs_zip64(&self) -> bool {
        self.entries == u16::MAX as u64
            || self.size == u32::MAX as u64
            || self.offset == u32::MAX as u64
    }
}

/// Locate the end of central directory record, scanning backwards.
fn find_eocd(tail: &[u8]) -> Option<usize> {
    if tail.len() < EOCD_LEN {
        return None;
    }
    (0..=tail.len() - EOCD_LEN).rev().find(|&pos| {
        read_u32(tail, pos) == EOCD_SIGNATURE
            && pos + EOCD_LEN + read_u16(tail, pos + 20) as usize <= tail.len()
    })
}

async fn read_zip64(
    backend: &dyn Backend,
    key: &str,
    tail: &[u8],
    tail_start: u64,
    eocd: usize,
) -> Result<CentralDirectory> {
    let locator = eocd
        .checked_sub(ZIP64_LOCATOR_LEN)
        .filter(|&pos| read_u32(tail, pos) == ZIP64_LOCATOR_SIGNATURE)
        .ok_or_else(|| invalid(key, "zip64 locator not found"))?;
    let record_offset = read_u64(tail, locator + 8);
    let record_end = record_offset
        .checked_add(ZIP64_EOCD_LEN as u64)
        .ok_or_else(|| invalid(key, "zip64 record out of bounds"))?;

    let record = if record_offset >= tail_start
        && record_end - tail_start <= tail.len() as u64
    {
        let from = (record_offset - tail_start) as usize;
        tail[from..from + ZIP64_EOCD_LEN].to_vec()
    } else {
        backend
            .read_range(key, record_offset..record_end)
            .await?
            .to_vec()
    };

    if record.len() < ZIP64_EOCD_LEN || read_u32(&record, 0) != ZIP64_EOCD_SIGNATURE {
        return Err(invalid(key, "bad zip64 end of central directory"));
    }

    Ok(CentralDirectory {
        entries: read_u64(&record, 32),
        size: read_u64(&record, 40),
        offset: read_u64(&record, 48),
    })
}

/// Parse consecutive central directory headers.
pub(crate) fn parse_central_directory(buf: &[u8]) -> std::result::Result<Vec<ZipEntry>, String> {
    let mut entries = Vec::new();
    let mut pos = 0;

    while pos + CENTRAL_HEADER_LEN <= buf.len() {
        if read_u32(buf, pos) != CENTRAL_HEADER_SIGNATURE {
            return Err(format!("bad central directory header at {}", pos));
        }

        let flags = read_u16(buf, pos + 8);
        let method = read_u16(buf, pos + 10);
        let time = read_u16(buf, pos + 12);
        let date = read_u16(buf, pos + 14);
        let mut compressed_size = read_u32(buf, pos + 20) as u64;
        let mut uncompressed_size = read_u32(buf, pos + 24) as u64;
        let name_len = read_u16(buf, pos + 28) as usize;
        let extra_len = read_u16(buf, pos + 30) as usize;
        let comment_len = read_u16(buf, pos + 32) as usize;
        let mut local_header_offset = read_u32(buf, pos + 42) as u64;

        let name_start = pos + CENTRAL_HEADER_LEN;
        let extra_start = name_start + name_len;
        let next = extra_start + extra_len + comment_len;
        if next > buf.len() {
            return Err(format!("truncated central directory header at {}", pos));
        }

        // Only the fields saturated in the fixed header appear in the zip64
        // extra block, in this order.
        let mut extra = &buf[extra_start..extra_start + extra_len];
        while extra.len() >= 4 {
            let id = read_u16(extra, 0);
            let len = (read_u16(extra, 2) as usize).min(extra.len() - 4);
            if id == ZIP64_EXTRA_ID {
                let mut field = &extra[4..4 + len];
                for value in [
                    &mut uncompressed_size,
                    &mut compressed_size,
                    &mut local_header_offset,
                ] {
                    if *value == u32::MAX as u64 && field.len() >= 8 {
                        *value = read_u64(field, 0);
                        field = &field[8..];
                    }
                }
            }
            extra = &extra[4 + len..];
        }

        entries.push(ZipEntry {
            path: String::from_utf8_lossy(&buf[name_start..extra_start]).into_owned(),
            compressed_size,
            uncompressed_size,
            local_header_offset,
            method,
            flags,
            last_modified: dos_datetime(date, time),
        });
        pos = next;
    }

    Ok(entries)
}

fn dos_datetime(date: u16, time: u16) -> Option<DateTime<Utc>> {
    let year = 1980 + (date >> 9) as i32;
    let month = ((date >> 5) & 0x0f) as u32;
    let day = (date & 0x1f) as u32;
    let hour = (time >> 11) as u32;
    let minute = ((time >> 5) & 0x3f) as u32;
    let second = ((time & 0x1f) * 2) as u32;

    NaiveDate::from_ymd_opt(year, month, day)?
        .and_hms_opt(hour, minute, second)
        .map(|naive| naive.and_utc())
}

fn read_u16(buf: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([buf[at], buf[at + 1]])
}

fn read_u32(buf: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([buf[at], buf[at + 1], buf[at + 2], buf[at + 3]])
}

fn read_u64(buf: &[u8], at: usize) -> u64 {
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&buf[at..at + 8]);
    u64::from_le_bytes(bytes)
}
