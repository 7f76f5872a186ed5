//! Shared test utilities for registry integration tests
#![allow(dead_code)]

use std::collections::HashMap;
use std::io::{Cursor, Write};
use std::ops::Range;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use futures::{StreamExt, TryStreamExt};

use common::auth::{Credential, IdentityError, IdentityRecord, IdentityService, Token, TokenSource};
use common::config::RegistryConfig;
use common::Registry;
use storage::{Backend, ByteStream, Continuation, ListPage, ObjectMeta, ObjectStoreBackend, StorageError};

pub const OWNER_TOKEN: &str = "owner-secret";
pub const RESOURCE_IAM_ID: &str = "iam-ServiceId-registry";

/// In-memory backend that records the calls made against it.
#[derive(Debug)]
pub struct RecordingBackend {
    inner: ObjectStoreBackend,
    /// Size of every delete batch, in call order
    pub delete_batches: Mutex<Vec<usize>>,
    /// Keys opened with a full GET
    pub gets: Mutex<Vec<String>>,
    pub range_reads: AtomicUsize,
    pub list_calls: AtomicUsize,
    /// 1-based delete call that fails, if any
    pub fail_delete_call: Mutex<Option<usize>>,
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self {
            inner: ObjectStoreBackend::memory(),
            delete_batches: Mutex::new(Vec::new()),
            gets: Mutex::new(Vec::new()),
            range_reads: AtomicUsize::new(0),
            list_calls: AtomicUsize::new(0),
            fail_delete_call: Mutex::new(None),
        }
    }

    pub fn delete_batches(&self) -> Vec<usize> {
        self.delete_batches.lock().unwrap().clone()
    }

    pub fn get_count(&self) -> usize {
        self.gets.lock().unwrap().len()
    }

    pub fn range_reads(&self) -> usize {
        self.range_reads.load(Ordering::SeqCst)
    }

    pub fn fail_delete_on(&self, call: usize) {
        *self.fail_delete_call.lock().unwrap() = Some(call);
    }

    /// Store raw bytes directly, bypassing the registry.
    pub async fn seed(&self, key: &str, data: &[u8]) {
        self.inner
            .put(key, body(data), None)
            .await
            .expect("seed object");
    }
}

#[async_trait]
impl Backend for RecordingBackend {
    async fn list_page(
        &self,
        prefix: &str,
        delimited: bool,
        continuation: Option<Continuation>,
    ) -> storage::Result<ListPage> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.list_page(prefix, delimited, continuation).await
    }

    async fn head(&self, key: &str) -> storage::Result<ObjectMeta> {
        self.inner.head(key).await
    }

    async fn get(&self, key: &str) -> storage::Result<ByteStream> {
        self.gets.lock().unwrap().push(key.to_string());
        self.inner.get(key).await
    }

    async fn get_range(&self, key: &str, range: Range<u64>) -> storage::Result<ByteStream> {
        self.range_reads.fetch_add(1, Ordering::SeqCst);
        self.inner.get_range(key, range).await
    }

    async fn put(&self, key: &str, body: ByteStream, content_type: Option<&str>) -> storage::Result<()> {
        self.inner.put(key, body, content_type).await
    }

    async fn delete_batch(&self, keys: &[String]) -> storage::Result<()> {
        let call = {
            let mut batches = self.delete_batches.lock().unwrap();
            batches.push(keys.len());
            batches.len()
        };
        if *self.fail_delete_call.lock().unwrap() == Some(call) {
            return Err(StorageError::Backend {
                status: Some(503),
                message: "SlowDown".to_string(),
            });
        }
        self.inner.delete_batch(keys).await
    }

    async fn copy(&self, from: &str, to: &str) -> storage::Result<()> {
        self.inner.copy(from, to).await
    }
}

/// Identity service answering from a fixed table.
#[derive(Debug, Default)]
pub struct ScriptedIdentity {
    keys: HashMap<String, IdentityRecord>,
    pub calls: AtomicUsize,
}

impl ScriptedIdentity {
    pub fn with_key(mut self, token: &str, record: IdentityRecord) -> Self {
        self.keys.insert(token.to_string(), record);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IdentityService for ScriptedIdentity {
    async fn lookup(&self, token: &Token) -> Result<Option<IdentityRecord>, IdentityError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.keys.get(token.secret()).cloned())
    }
}

/// An identity record owned by the registry, with the given settings text.
pub fn key_record(id: &str, description: Option<&str>) -> IdentityRecord {
    IdentityRecord {
        id: id.to_string(),
        locked: false,
        disabled: false,
        name: Some(format!("{} key", id)),
        description: description.map(str::to_string),
        iam_id: RESOURCE_IAM_ID.to_string(),
    }
}

pub struct TestRegistry {
    pub registry: Registry,
    pub backend: Arc<RecordingBackend>,
    pub identity: Arc<ScriptedIdentity>,
}

impl TestRegistry {
    pub fn new(identity: ScriptedIdentity) -> Self {
        let mut config = RegistryConfig::in_memory(OWNER_TOKEN);
        config.identity.resource_iam_id = RESOURCE_IAM_ID.to_string();

        let backend = Arc::new(RecordingBackend::new());
        let identity = Arc::new(identity);
        let registry = Registry::with_parts(&config, backend.clone(), identity.clone());

        Self {
            registry,
            backend,
            identity,
        }
    }

    /// A registry with a writer key (`writer`), a reader key (`reader`) and
    /// a writer key scoped to `maven/**` (`maven`).
    pub fn standard() -> Self {
        Self::new(
            ScriptedIdentity::default()
                .with_key("writer", key_record("ApiKey-w", Some(r#"{"role":"writer"}"#)))
                .with_key("reader", key_record("ApiKey-r", None))
                .with_key(
                    "maven",
                    key_record(
                        "ApiKey-m",
                        Some(r#"{"role":"writer","include":"maven/**"}"#),
                    ),
                ),
        )
    }

    pub async fn credential(&self, secret: &str) -> Arc<Credential> {
        let token = Token::new(secret, TokenSource::AuthHeader);
        self.registry
            .authenticate(Some(&token))
            .await
            .expect("authenticate")
    }

    pub async fn owner(&self) -> Arc<Credential> {
        self.credential(OWNER_TOKEN).await
    }
}

/// A single-chunk body.
pub fn body(data: &[u8]) -> ByteStream {
    let data = Bytes::copy_from_slice(data);
    futures::stream::once(async move { Ok(data) }).boxed()
}

/// Collect a body into memory.
pub async fn read_all(stream: ByteStream) -> Vec<u8> {
    let chunks: Vec<Bytes> = stream.try_collect().await.expect("read body");
    chunks.concat()
}

/// Collect listing names, sorted.
pub async fn names(entries: common::store::EntryStream) -> Vec<String> {
    let mut names: Vec<String> = entries
        .map_ok(|entry| entry.name)
        .try_collect()
        .await
        .expect("list");
    names.sort();
    names
}

/// Build a zip archive in memory. Names ending in `/` become folders.
///
/// Files alternate between deflated (even index) and stored (odd index).
pub fn zip_fixture(files: &[(&str, &[u8])]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));

    for (index, (name, data)) in files.iter().enumerate() {
        let method = if index % 2 == 0 {
            zip::CompressionMethod::Deflated
        } else {
            zip::CompressionMethod::Stored
        };
        let options = zip::write::SimpleFileOptions::default().compression_method(method);

        if name.ends_with('/') {
            writer.add_directory(*name, options).unwrap();
            continue;
        }
        writer.start_file(*name, options).unwrap();
        writer.write_all(data).unwrap();
    }

    writer.finish().unwrap().into_inner()
}
