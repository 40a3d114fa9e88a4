//! Storage contracts
//!
//! This module defines the traits the router dispatches to: byte-level
//! accessors (local mirror and remote providers) and per-provider authorizers.

use async_trait::async_trait;
use fss_core::{Provider, StorageMetadata};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Download failed: {0}")]
    DownloadFailed(String),

    #[error("Delete failed: {0}")]
    DeleteFailed(String),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("Storage backend error: {0}")]
    BackendError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Byte-level access to one storage backend.
///
/// A missing object is not an error: `read` reports `false`,
/// `storage_metadata` returns `None`, `last_modified_time` returns `0` and
/// `delete` succeeds.
/// Every operation may be retried; `write` overwrites whatever is stored at
/// `(bucket, path)`.
#[async_trait]
pub trait StorageAccessor: Send + Sync {
    /// Store everything `reader` yields at `(bucket, path)`.
    ///
    /// `filename` is the name the uploader gave the file. Backends keep it as
    /// metadata so that content-addressed objects can still be presented under
    /// their original name.
    async fn write(
        &self,
        bucket: &str,
        path: &str,
        filename: &str,
        reader: &mut (dyn AsyncRead + Send + Unpin),
    ) -> StorageResult<()>;

    /// Copy the object into `out`. Returns `false` without writing anything
    /// when the object does not exist.
    async fn read(
        &self,
        bucket: &str,
        path: &str,
        out: &mut (dyn AsyncWrite + Send + Unpin),
    ) -> StorageResult<bool>;

    async fn storage_metadata(
        &self,
        bucket: &str,
        path: &str,
    ) -> StorageResult<Option<StorageMetadata>>;

    /// Last modification time in milliseconds since the epoch, `0` if absent.
    async fn last_modified_time(&self, bucket: &str, path: &str) -> StorageResult<i64>;

    /// Remove the object and anything stored alongside it.
    async fn delete(&self, bucket: &str, path: &str) -> StorageResult<()>;
}

/// A remote backend registered for one provider.
pub trait ProviderAccessor: StorageAccessor {
    fn provider(&self) -> Provider;
}

/// Grants access to stored objects and mints read URLs for one provider.
#[async_trait]
pub trait Authorizer<U>: Send + Sync {
    fn provider(&self) -> Provider;

    /// Make `(bucket, path)` publicly readable. Must be idempotent.
    async fn authorize_public_read(&self, bucket: &str, path: &str) -> StorageResult<()>;

    /// URL through which `user` can read `(bucket, path)`.
    ///
    /// `path` may carry a query string (thumbnail parameters); implementations
    /// must keep it in the resulting URL.
    async fn read_url(&self, user: &U, bucket: &str, path: &str) -> StorageResult<String>;
}
