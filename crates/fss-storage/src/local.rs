use crate::keys::{encode_path, last_segment, validate_key};
use crate::traits::{Authorizer, ProviderAccessor, StorageAccessor, StorageError, StorageResult};
use async_trait::async_trait;
use fss_core::{Provider, StorageMetadata};
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};

const SIDECAR_SUFFIX: &str = ".fssmeta.json";

/// Facts recorded next to each stored file.
#[derive(Debug, Serialize, Deserialize)]
struct Sidecar {
    filename: String,
    mime_type: Option<String>,
}

/// Local filesystem storage
///
/// Objects live at `{base_path}/{bucket}/{path}`. Used both as the mirror in
/// front of remote providers and as the accessor of the `Own` provider.
#[derive(Clone)]
pub struct LocalAccessor {
    base_path: PathBuf,
}

impl LocalAccessor {
    /// Create a new LocalAccessor instance
    ///
    /// # Arguments
    /// * `base_path` - Root directory for file storage (e.g., "/var/lib/fss")
    pub async fn new(base_path: impl Into<PathBuf>) -> StorageResult<Self> {
        let base_path = base_path.into();

        fs::create_dir_all(&base_path).await.map_err(|e| {
            StorageError::ConfigError(format!(
                "Failed to create storage directory {}: {}",
                base_path.display(),
                e
            ))
        })?;

        Ok(LocalAccessor { base_path })
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Convert `(bucket, path)` to a filesystem path inside `base_path`
    fn object_path(&self, bucket: &str, path: &str) -> StorageResult<PathBuf> {
        validate_key(bucket, path)?;
        if path.ends_with(SIDECAR_SUFFIX) {
            return Err(StorageError::InvalidKey(format!(
                "paths ending in {} are reserved",
                SIDECAR_SUFFIX
            )));
        }
        Ok(self.base_path.join(bucket).join(path))
    }

    fn sidecar_path(file: &Path) -> PathBuf {
        let mut name = file.as_os_str().to_owned();
        name.push(SIDECAR_SUFFIX);
        PathBuf::from(name)
    }

    /// Ensure parent directory exists
    async fn ensure_parent_dir(&self, path: &Path) -> StorageResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        Ok(())
    }

    async fn read_sidecar(file: &Path) -> Option<Sidecar> {
        let raw = fs::read(Self::sidecar_path(file)).await.ok()?;
        match serde_json::from_slice(&raw) {
            Ok(sidecar) => Some(sidecar),
            Err(e) => {
                tracing::warn!(path = %file.display(), error = %e, "Ignoring corrupt metadata sidecar");
                None
            }
        }
    }

    /// File metadata, `None` when missing or not a regular file.
    async fn file_metadata(path: &Path) -> StorageResult<Option<std::fs::Metadata>> {
        match fs::metadata(path).await {
            Ok(meta) if meta.is_file() => Ok(Some(meta)),
            Ok(_) => Ok(None),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StorageError::BackendError(format!(
                "Failed to stat {}: {}",
                path.display(),
                e
            ))),
        }
    }

    fn modified_millis(meta: &std::fs::Metadata) -> i64 {
        meta.modified()
            .map(|t| chrono::DateTime::<chrono::Utc>::from(t).timestamp_millis())
            .unwrap_or(0)
    }
}

#[async_trait]
impl StorageAccessor for LocalAccessor {
    async fn write(
        &self,
        bucket: &str,
        path: &str,
        filename: &str,
        reader: &mut (dyn AsyncRead + Send + Unpin),
    ) -> StorageResult<()> {
        let file_path = self.object_path(bucket, path)?;
        let start = std::time::Instant::now();

        self.ensure_parent_dir(&file_path).await?;

        let mut file = fs::File::create(&file_path).await.map_err(|e| {
            StorageError::UploadFailed(format!(
                "Failed to create file {}: {}",
                file_path.display(),
                e
            ))
        })?;

        let bytes_copied = tokio::io::copy(&mut *reader, &mut file).await.map_err(|e| {
            StorageError::UploadFailed(format!(
                "Failed to write stream to file {}: {}",
                file_path.display(),
                e
            ))
        })?;

        file.sync_all().await.map_err(|e| {
            StorageError::UploadFailed(format!(
                "Failed to sync file {}: {}",
                file_path.display(),
                e
            ))
        })?;

        let sidecar = Sidecar {
            filename: filename.to_string(),
            mime_type: mime_guess::from_path(filename)
                .first()
                .map(|m| m.essence_str().to_string()),
        };
        let encoded = serde_json::to_vec(&sidecar)
            .map_err(|e| StorageError::UploadFailed(format!("Failed to encode metadata: {}", e)))?;
        fs::write(Self::sidecar_path(&file_path), encoded)
            .await
            .map_err(|e| {
                StorageError::UploadFailed(format!(
                    "Failed to write metadata for {}: {}",
                    file_path.display(),
                    e
                ))
            })?;

        tracing::info!(
            bucket = %bucket,
            path = %path,
            size_bytes = bytes_copied,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local storage write successful"
        );

        Ok(())
    }

    async fn read(
        &self,
        bucket: &str,
        path: &str,
        out: &mut (dyn AsyncWrite + Send + Unpin),
    ) -> StorageResult<bool> {
        let file_path = self.object_path(bucket, path)?;
        let start = std::time::Instant::now();

        if Self::file_metadata(&file_path).await?.is_none() {
            return Ok(false);
        }

        let mut file = fs::File::open(&file_path).await.map_err(|e| {
            StorageError::DownloadFailed(format!(
                "Failed to open file {}: {}",
                file_path.display(),
                e
            ))
        })?;

        let size = tokio::io::copy(&mut file, &mut *out).await.map_err(|e| {
            StorageError::DownloadFailed(format!(
                "Failed to read file {}: {}",
                file_path.display(),
                e
            ))
        })?;
        out.flush().await?;

        tracing::info!(
            bucket = %bucket,
            path = %path,
            size_bytes = size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local storage read successful"
        );

        Ok(true)
    }

    async fn storage_metadata(
        &self,
        bucket: &str,
        path: &str,
    ) -> StorageResult<Option<StorageMetadata>> {
        let file_path = self.object_path(bucket, path)?;
        let Some(meta) = Self::file_metadata(&file_path).await? else {
            return Ok(None);
        };

        let sidecar = Self::read_sidecar(&file_path).await;
        let filename = sidecar
            .as_ref()
            .map(|s| s.filename.clone())
            .unwrap_or_else(|| last_segment(path).to_string());
        let mime_type = sidecar.and_then(|s| s.mime_type).or_else(|| {
            mime_guess::from_path(&filename)
                .first()
                .map(|m| m.essence_str().to_string())
        });

        Ok(Some(StorageMetadata {
            filename,
            size: meta.len(),
            mime_type,
            last_modified: Self::modified_millis(&meta),
        }))
    }

    async fn last_modified_time(&self, bucket: &str, path: &str) -> StorageResult<i64> {
        let file_path = self.object_path(bucket, path)?;
        Ok(Self::file_metadata(&file_path)
            .await?
            .map(|meta| Self::modified_millis(&meta))
            .unwrap_or(0))
    }

    async fn delete(&self, bucket: &str, path: &str) -> StorageResult<()> {
        let file_path = self.object_path(bucket, path)?;
        let start = std::time::Instant::now();

        for target in [Self::sidecar_path(&file_path), file_path.clone()] {
            match fs::remove_file(&target).await {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => {
                    return Err(StorageError::DeleteFailed(format!(
                        "Failed to delete file {}: {}",
                        target.display(),
                        e
                    )))
                }
            }
        }

        tracing::info!(
            bucket = %bucket,
            path = %path,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local storage delete successful"
        );

        Ok(())
    }
}

impl ProviderAccessor for LocalAccessor {
    fn provider(&self) -> Provider {
        Provider::Own
    }
}

/// Authorizer for the `Own` provider
///
/// Files are served by the application itself under `base_url`, so every
/// object is already reachable and granting public read is a no-op.
#[derive(Clone)]
pub struct OwnAuthorizer {
    base_url: String,
}

impl OwnAuthorizer {
    /// * `base_url` - Base URL for serving files (e.g., "http://localhost:8080/fss")
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl<U: Sync> Authorizer<U> for OwnAuthorizer {
    fn provider(&self) -> Provider {
        Provider::Own
    }

    async fn authorize_public_read(&self, bucket: &str, path: &str) -> StorageResult<()> {
        validate_key(bucket, path)?;
        tracing::debug!(bucket = %bucket, path = %path, "Own storage is served directly, public read implied");
        Ok(())
    }

    async fn read_url(&self, _user: &U, bucket: &str, path: &str) -> StorageResult<String> {
        Ok(format!(
            "{}/{}/{}",
            self.base_url.trim_end_matches('/'),
            urlencoding::encode(bucket),
            encode_path(path)
        ))
    }
}
