//! Storage router
//!
//! Routes writes to the access policy of their content type and resolves
//! storage URLs back to the policy that owns them for reads. The router keeps
//! no state of its own beyond the immutable [`Registry`].

use crate::error::{FssError, FssResult};
use crate::path::{
    append_thumbnail_parameters, content_addressed_filename, extension_of, normalize_path,
};
use crate::policy::AccessPolicy;
use crate::registry::Registry;
use crate::upload::UploadBuffer;
use fss_core::{ExtensionMode, FileMeta, Provider, ReadMetadata, StorageUrl, UploadLimit};
use fss_storage::StorageAccessor;
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};

pub struct StorageRouter<T, U> {
    registry: Arc<Registry<T, U>>,
}

impl<T, U> Clone for StorageRouter<T, U> {
    fn clone(&self) -> Self {
        Self {
            registry: Arc::clone(&self.registry),
        }
    }
}

impl<T, U> StorageRouter<T, U>
where
    T: Eq + Hash + Clone + Debug + Send + Sync,
    U: Send + Sync,
{
    pub fn new(registry: Registry<T, U>) -> Self {
        Self {
            registry: Arc::new(registry),
        }
    }

    pub fn registry(&self) -> &Registry<T, U> {
        &self.registry
    }

    fn policy(&self, content_type: &T) -> FssResult<&Arc<dyn AccessPolicy<T, U>>> {
        self.registry
            .policy(content_type)
            .ok_or_else(|| FssError::NoAccessStrategy {
                content_type: format!("{:?}", content_type),
            })
    }

    /// Upload limit that applies to `user` for `content_type`.
    pub fn upload_limit(&self, content_type: &T, user: &U) -> FssResult<UploadLimit> {
        Ok(self.policy(content_type)?.upload_limit(user))
    }

    /// Store an upload and return its storage URL.
    ///
    /// The stream is drained into memory first so that it can be read again
    /// for the content hash, the provider and the local mirror. Any failure
    /// fails the whole write and removes the copies it already made.
    #[tracing::instrument(skip_all, fields(content_type = ?content_type, filename = %filename))]
    pub async fn write<R>(
        &self,
        content_type: &T,
        resource: &str,
        user: &U,
        filename: &str,
        reader: R,
    ) -> FssResult<String>
    where
        R: AsyncRead + Unpin + Send,
    {
        let policy = self.policy(content_type)?;
        let extension = validate_extension(policy.upload_limit(user), filename)?;
        let provider = policy.provider();
        let bucket = policy.bucket();

        let mut upload = UploadBuffer::from_reader(reader).await?;

        let path = if policy.is_content_addressed() {
            let hash = upload.md5_hex().await?;
            policy.path(resource, user, &content_addressed_filename(&hash, extension))
        } else {
            policy.path(resource, user, filename)
        };
        let path = path.ok_or(FssError::NoWriteAuthority)?;
        let path = normalize_path(&path);
        if path.is_empty() || !policy.is_writable(user, path) {
            return Err(FssError::NoWriteAuthority);
        }

        let mut written = Vec::new();
        if let Err(e) = self
            .store_copies(policy.as_ref(), path, filename, &mut upload, &mut written)
            .await
        {
            self.roll_back(&written, bucket, path).await;
            return Err(e);
        }

        let storage_url = StorageUrl::new(provider, bucket, path).to_string();
        tracing::info!(
            storage_url = %storage_url,
            size_bytes = upload.len(),
            "File stored"
        );
        Ok(storage_url)
    }

    /// Provider copy, then local mirror, then public grant. Every copy made
    /// is pushed to `written`.
    async fn store_copies(
        &self,
        policy: &dyn AccessPolicy<T, U>,
        path: &str,
        filename: &str,
        upload: &mut UploadBuffer,
        written: &mut Vec<Arc<dyn StorageAccessor>>,
    ) -> FssResult<()> {
        let provider = policy.provider();
        let bucket = policy.bucket();

        match self.registry.provider_accessor(provider) {
            Some(accessor) => {
                upload.rewind().await?;
                accessor.write(bucket, path, filename, upload.reader()).await?;
                written.push(Arc::clone(accessor));
            }
            None => {
                tracing::debug!(
                    provider = %provider,
                    "No provider accessor registered, skipping provider write"
                );
            }
        }

        // Own files already live in local storage.
        if policy.store_locally() && !provider.is_own() {
            let local = self.registry.local_accessor();
            upload.rewind().await?;
            local.write(bucket, path, filename, upload.reader()).await?;
            written.push(Arc::clone(local));
        }

        if policy.is_publicly_readable() {
            let authorizer = self
                .registry
                .authorizer(provider)
                .ok_or(FssError::MissingAuthorizer { provider })?;
            authorizer.authorize_public_read(bucket, path).await?;
        }
        Ok(())
    }

    async fn roll_back(&self, written: &[Arc<dyn StorageAccessor>], bucket: &str, path: &str) {
        for accessor in written.iter().rev() {
            if let Err(e) = accessor.delete(bucket, path).await {
                tracing::warn!(
                    error = %e,
                    bucket = %bucket,
                    path = %path,
                    "Failed to remove copy of failed upload"
                );
            }
        }
    }

    /// First policy of `bucket`, in registration order, that lets `user` read `path`.
    fn readable_policy(
        &self,
        user: &U,
        bucket: &str,
        path: &str,
    ) -> FssResult<&Arc<dyn AccessPolicy<T, U>>> {
        self.registry
            .policies()
            .find(|policy| policy.bucket() == bucket && policy.is_readable(user, path))
            .ok_or_else(|| FssError::NoReadAuthority {
                url: format!("/{}/{}", bucket, path),
            })
    }

    /// Read URL for a storage URL.
    ///
    /// Returns `Ok(None)` when `storage_url` is malformed and
    /// `Err(NoReadAuthority)` when it is well-formed but `user` may not read it.
    pub async fn read_url(
        &self,
        user: &U,
        storage_url: &str,
        thumbnail: bool,
    ) -> FssResult<Option<String>> {
        match StorageUrl::parse(storage_url) {
            Ok(url) => self.resolve_read_url(user, &url, thumbnail).await.map(Some),
            Err(e) => {
                tracing::debug!(error = %e, "Ignoring malformed storage URL");
                Ok(None)
            }
        }
    }

    async fn resolve_read_url(
        &self,
        user: &U,
        url: &StorageUrl,
        thumbnail: bool,
    ) -> FssResult<String> {
        let path = normalize_path(url.path());
        let policy = self.readable_policy(user, url.bucket(), path)?;

        // The URL's own provider, not the policy's current one, so objects
        // written before a provider change stay readable.
        let provider = if policy.read_locally() {
            Provider::Own
        } else {
            url.provider()
        };
        let authorizer = self
            .registry
            .authorizer(provider)
            .ok_or(FssError::MissingAuthorizer { provider })?;

        let path = if thumbnail {
            append_thumbnail_parameters(path, &policy.thumbnail_parameters())
        } else {
            path.to_string()
        };
        Ok(authorizer.read_url(user, url.bucket(), &path).await?)
    }

    /// Read URLs and storage metadata for a storage URL.
    ///
    /// The read authorization check runs before any backend is asked.
    /// Returns `Ok(None)` for a malformed URL or an object no backend has.
    pub async fn read_metadata(
        &self,
        user: &U,
        storage_url: &str,
    ) -> FssResult<Option<ReadMetadata>> {
        let Ok(url) = StorageUrl::parse(storage_url) else {
            return Ok(None);
        };
        let read_url = self.resolve_read_url(user, &url, false).await?;

        let bucket = url.bucket();
        let path = normalize_path(url.path());
        let mut storage = self
            .registry
            .local_accessor()
            .storage_metadata(bucket, path)
            .await?;
        if storage.is_none() {
            if let Some(accessor) = self.registry.provider_accessor(url.provider()) {
                storage = accessor.storage_metadata(bucket, path).await?;
            }
        }
        let Some(storage) = storage else {
            return Ok(None);
        };

        let thumbnail_read_url = self.resolve_read_url(user, &url, true).await?;
        Ok(Some(ReadMetadata {
            thumbnail_read_url: (thumbnail_read_url != read_url).then_some(thumbnail_read_url),
            read_url,
            storage,
        }))
    }

    /// Resolve many storage URLs at once, keeping input order.
    ///
    /// Malformed, unreadable and missing entries come back as `None`; only
    /// backend failures abort the batch.
    pub async fn resolve_metas(
        &self,
        user: &U,
        storage_urls: &[String],
    ) -> FssResult<Vec<Option<FileMeta>>> {
        let mut metas = Vec::with_capacity(storage_urls.len());
        for storage_url in storage_urls {
            let meta = match self.read_metadata(user, storage_url).await {
                Ok(meta) => meta.map(|m| FileMeta::new(storage_url.as_str(), m)),
                Err(FssError::NoReadAuthority { url }) => {
                    tracing::debug!(url = %url, "Skipping unreadable storage URL");
                    None
                }
                Err(e) => return Err(e),
            };
            metas.push(meta);
        }
        Ok(metas)
    }

    /// Last modification time in milliseconds since the epoch, `0` when no
    /// backend has the object.
    pub async fn last_modified_time(&self, user: &U, bucket: &str, path: &str) -> FssResult<i64> {
        let path = normalize_path(path);
        let policy = self.readable_policy(user, bucket, path)?;

        let local = self
            .registry
            .local_accessor()
            .last_modified_time(bucket, path)
            .await?;
        if local > 0 {
            return Ok(local);
        }
        match self.registry.provider_accessor(policy.provider()) {
            Some(accessor) => Ok(accessor.last_modified_time(bucket, path).await?),
            None => Ok(0),
        }
    }

    /// Copy an object into `out`, local storage first.
    ///
    /// Returns `false`, with nothing written, when no backend has the object.
    pub async fn read<W>(&self, user: &U, bucket: &str, path: &str, out: &mut W) -> FssResult<bool>
    where
        W: AsyncWrite + Unpin + Send,
    {
        let path = normalize_path(path);
        let policy = self.readable_policy(user, bucket, path)?;

        if self
            .registry
            .local_accessor()
            .read(bucket, path, &mut *out)
            .await?
        {
            tracing::debug!(bucket = %bucket, path = %path, "Served from local storage");
            return Ok(true);
        }

        match self.registry.provider_accessor(policy.provider()) {
            Some(accessor) => Ok(accessor.read(bucket, path, &mut *out).await?),
            None => Ok(false),
        }
    }
}

/// Check `filename` against `limit` and return its extension.
fn validate_extension(limit: UploadLimit, filename: &str) -> FssResult<&str> {
    let extension = extension_of(filename);
    if limit.permits(extension) {
        return Ok(extension);
    }

    let allowed = limit.extensions().to_vec();
    let filename = filename.to_string();
    Err(match limit.mode() {
        ExtensionMode::Rejected => FssError::UnsupportedExtension { allowed, filename },
        ExtensionMode::Allowed => FssError::OnlySupportedExtension { allowed, filename },
    })
}
