//! Test helpers: in-memory backends and a configurable policy for router tests.
//!
//! Run from workspace root: `cargo test -p fss-service`.

#![allow(dead_code)]

use async_trait::async_trait;
use fss_core::{Provider, StorageMetadata, UploadLimit};
use fss_service::{AccessPolicy, Registry, StorageRouter};
use fss_storage::{Authorizer, ProviderAccessor, StorageAccessor, StorageError, StorageResult};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContentType {
    Avatar,
    Document,
    Attachment,
    Unregistered,
}

#[derive(Clone)]
struct StoredObject {
    data: Vec<u8>,
    filename: String,
    modified: i64,
}

/// Accessor that keeps objects in memory and counts calls per operation.
pub struct MemoryAccessor {
    provider: Provider,
    objects: Mutex<HashMap<(String, String), StoredObject>>,
    clock: AtomicUsize,
    pub writes: AtomicUsize,
    pub reads: AtomicUsize,
    pub metadata_lookups: AtomicUsize,
    pub modified_lookups: AtomicUsize,
    pub deletes: AtomicUsize,
    /// When set, every write fails without storing anything.
    pub fail_writes: AtomicBool,
}

impl MemoryAccessor {
    pub fn new(provider: Provider) -> Arc<Self> {
        Arc::new(Self {
            provider,
            objects: Mutex::new(HashMap::new()),
            clock: AtomicUsize::new(1_700_000_000_000),
            writes: AtomicUsize::new(0),
            reads: AtomicUsize::new(0),
            metadata_lookups: AtomicUsize::new(0),
            modified_lookups: AtomicUsize::new(0),
            deletes: AtomicUsize::new(0),
            fail_writes: AtomicBool::new(false),
        })
    }

    pub fn insert(&self, bucket: &str, path: &str, data: &[u8]) {
        let modified = self.clock.fetch_add(1, Ordering::SeqCst) as i64;
        self.objects.lock().unwrap().insert(
            (bucket.to_string(), path.to_string()),
            StoredObject {
                data: data.to_vec(),
                filename: path.rsplit('/').next().unwrap_or(path).to_string(),
                modified,
            },
        );
    }

    pub fn get(&self, bucket: &str, path: &str) -> Option<Vec<u8>> {
        self.objects
            .lock()
            .unwrap()
            .get(&(bucket.to_string(), path.to_string()))
            .map(|o| o.data.clone())
    }

    pub fn keys(&self) -> Vec<(String, String)> {
        let mut keys: Vec<_> = self.objects.lock().unwrap().keys().cloned().collect();
        keys.sort();
        keys
    }

    pub fn count(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }

    fn object(&self, bucket: &str, path: &str) -> Option<StoredObject> {
        self.objects
            .lock()
            .unwrap()
            .get(&(bucket.to_string(), path.to_string()))
            .cloned()
    }
}

#[async_trait]
impl StorageAccessor for MemoryAccessor {
    async fn write(
        &self,
        bucket: &str,
        path: &str,
        filename: &str,
        reader: &mut (dyn AsyncRead + Send + Unpin),
    ) -> StorageResult<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StorageError::UploadFailed(format!("{} is down", self.provider)));
        }
        let mut data = Vec::new();
        reader.read_to_end(&mut data).await?;
        let modified = self.clock.fetch_add(1, Ordering::SeqCst) as i64;
        self.objects.lock().unwrap().insert(
            (bucket.to_string(), path.to_string()),
            StoredObject {
                data,
                filename: filename.to_string(),
                modified,
            },
        );
        Ok(())
    }

    async fn read(
        &self,
        bucket: &str,
        path: &str,
        out: &mut (dyn AsyncWrite + Send + Unpin),
    ) -> StorageResult<bool> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        match self.object(bucket, path) {
            Some(object) => {
                out.write_all(&object.data).await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn storage_metadata(
        &self,
        bucket: &str,
        path: &str,
    ) -> StorageResult<Option<StorageMetadata>> {
        self.metadata_lookups.fetch_add(1, Ordering::SeqCst);
        Ok(self.object(bucket, path).map(|object| StorageMetadata {
            filename: object.filename,
            size: object.data.len() as u64,
            mime_type: None,
            last_modified: object.modified,
        }))
    }

    async fn last_modified_time(&self, bucket: &str, path: &str) -> StorageResult<i64> {
        self.modified_lookups.fetch_add(1, Ordering::SeqCst);
        Ok(self.object(bucket, path).map_or(0, |o| o.modified))
    }

    async fn delete(&self, bucket: &str, path: &str) -> StorageResult<()> {
        self.deletes.fetch_add(1, Ordering::SeqCst);
        self.objects
            .lock()
            .unwrap()
            .remove(&(bucket.to_string(), path.to_string()));
        Ok(())
    }
}

impl ProviderAccessor for MemoryAccessor {
    fn provider(&self) -> Provider {
        self.provider
    }
}

/// Authorizer that mints `https://<provider>.test/<bucket>/<path>` URLs and
/// records public grants.
pub struct RecordingAuthorizer {
    provider: Provider,
    pub public_grants: Mutex<Vec<String>>,
}

impl RecordingAuthorizer {
    pub fn new(provider: Provider) -> Arc<Self> {
        Arc::new(Self {
            provider,
            public_grants: Mutex::new(Vec::new()),
        })
    }

    pub fn grants(&self) -> Vec<String> {
        self.public_grants.lock().unwrap().clone()
    }
}

#[async_trait]
impl Authorizer<String> for RecordingAuthorizer {
    fn provider(&self) -> Provider {
        self.provider
    }

    async fn authorize_public_read(&self, bucket: &str, path: &str) -> StorageResult<()> {
        self.public_grants
            .lock()
            .unwrap()
            .push(format!("{}/{}", bucket, path));
        Ok(())
    }

    async fn read_url(&self, _user: &String, bucket: &str, path: &str) -> StorageResult<String> {
        Ok(format!("https://{}.test/{}/{}", self.provider, bucket, path))
    }
}

/// Policy storing under `<prefix>/<user>/<filename>` in one bucket.
#[derive(Clone)]
pub struct TestPolicy {
    pub content_type: ContentType,
    pub provider: Provider,
    pub bucket: String,
    pub prefix: String,
    pub limit: UploadLimit,
    pub content_addressed: bool,
    pub store_locally: bool,
    pub read_locally: bool,
    pub public: bool,
    pub owner_only: bool,
    pub thumbnail: BTreeMap<String, String>,
}

impl TestPolicy {
    pub fn new(content_type: ContentType, provider: Provider, bucket: &str, prefix: &str) -> Self {
        Self {
            content_type,
            provider,
            bucket: bucket.to_string(),
            prefix: prefix.to_string(),
            limit: UploadLimit::unrestricted(),
            content_addressed: false,
            store_locally: false,
            read_locally: false,
            public: false,
            owner_only: false,
            thumbnail: BTreeMap::new(),
        }
    }

    fn in_scope(&self, path: &str) -> bool {
        path.starts_with(&format!("{}/", self.prefix))
    }
}

impl AccessPolicy<ContentType, String> for TestPolicy {
    fn content_type(&self) -> ContentType {
        self.content_type
    }

    fn upload_limit(&self, _user: &String) -> UploadLimit {
        self.limit.clone()
    }

    fn path(&self, _resource: &str, user: &String, filename: &str) -> Option<String> {
        if user == "nobody" {
            return None;
        }
        // Surrounding slashes exercise normalization.
        Some(format!("/{}/{}/{}/", self.prefix, user, filename))
    }

    fn is_writable(&self, user: &String, path: &str) -> bool {
        self.in_scope(path) && user != "readonly"
    }

    fn is_readable(&self, user: &String, path: &str) -> bool {
        if !self.in_scope(path) {
            return false;
        }
        !self.owner_only || path.split('/').nth(1) == Some(user.as_str())
    }

    fn provider(&self) -> Provider {
        self.provider
    }

    fn bucket(&self) -> &str {
        &self.bucket
    }

    fn is_content_addressed(&self) -> bool {
        self.content_addressed
    }

    fn store_locally(&self) -> bool {
        self.store_locally
    }

    fn read_locally(&self) -> bool {
        self.read_locally
    }

    fn is_publicly_readable(&self) -> bool {
        self.public
    }

    fn thumbnail_parameters(&self) -> BTreeMap<String, String> {
        self.thumbnail.clone()
    }
}

/// Backends shared by most router tests.
pub struct Harness {
    pub local: Arc<MemoryAccessor>,
    pub s3: Arc<MemoryAccessor>,
    pub own_authorizer: Arc<RecordingAuthorizer>,
    pub s3_authorizer: Arc<RecordingAuthorizer>,
}

impl Harness {
    pub fn new() -> Self {
        Self {
            local: MemoryAccessor::new(Provider::Own),
            s3: MemoryAccessor::new(Provider::S3),
            own_authorizer: RecordingAuthorizer::new(Provider::Own),
            s3_authorizer: RecordingAuthorizer::new(Provider::S3),
        }
    }

    /// Router over `policies` with the local accessor doubling as the `Own`
    /// provider accessor.
    pub fn router(&self, policies: Vec<TestPolicy>) -> StorageRouter<ContentType, String> {
        let mut builder = Registry::<ContentType, String>::builder(self.local.clone())
            .authorizer(self.own_authorizer.clone())
            .authorizer(self.s3_authorizer.clone())
            .provider_accessor(self.local.clone())
            .provider_accessor(self.s3.clone());
        for policy in policies {
            builder = builder.policy(Arc::new(policy));
        }
        StorageRouter::new(builder.build().expect("valid registry"))
    }
}

impl Default for Harness {
    fn default() -> Self {
        Self::new()
    }
}

pub fn user(name: &str) -> String {
    name.to_string()
}
