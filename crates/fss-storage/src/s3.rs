use crate::keys::{encode_path, last_segment, split_query, validate_key};
use crate::traits::{Authorizer, ProviderAccessor, StorageAccessor, StorageError, StorageResult};
use async_trait::async_trait;
use bytes::Bytes;
use fss_core::{Provider, StorageMetadata};
use futures::StreamExt;
use http::Method;
use object_store::aws::{AmazonS3, AmazonS3Builder};
use object_store::path::Path;
use object_store::signer::Signer;
use object_store::Error as ObjectStoreError;
use object_store::{
    Attribute, Attributes, GetOptions, ObjectStore, ObjectStoreExt, PutOptions, PutPayload,
    Result as ObjectResult,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// User metadata key holding the uploader's (percent-encoded) filename.
const FILENAME_METADATA: &str = "fss-filename";

/// S3 accessor
///
/// One `AmazonS3` store per configured bucket; requests for other buckets fail
/// with a configuration error.
#[derive(Clone)]
pub struct S3Accessor {
    stores: Arc<HashMap<String, AmazonS3>>,
}

impl S3Accessor {
    /// Create a new S3Accessor instance
    ///
    /// # Arguments
    /// * `buckets` - S3 bucket names this accessor may write to
    /// * `region` - AWS region (or region identifier for S3-compatible providers)
    /// * `endpoint_url` - Optional custom endpoint URL for S3-compatible providers
    ///   (e.g., "http://localhost:9000" for MinIO)
    pub fn new(
        buckets: &[String],
        region: &str,
        endpoint_url: Option<&str>,
    ) -> StorageResult<Self> {
        let mut stores = HashMap::with_capacity(buckets.len());
        for bucket in buckets {
            let mut builder = AmazonS3Builder::from_env()
                .with_region(region)
                .with_bucket_name(bucket);

            if let Some(endpoint) = endpoint_url {
                let allow_http = endpoint.starts_with("http://");
                builder = builder.with_endpoint(endpoint).with_allow_http(allow_http);
            }

            let store = builder
                .build()
                .map_err(|e| StorageError::ConfigError(e.to_string()))?;
            stores.insert(bucket.clone(), store);
        }

        Ok(S3Accessor {
            stores: Arc::new(stores),
        })
    }

    fn store(&self, bucket: &str) -> StorageResult<&AmazonS3> {
        self.stores.get(bucket).ok_or_else(|| {
            StorageError::ConfigError(format!("S3 bucket '{}' is not configured", bucket))
        })
    }

    fn location(bucket: &str, path: &str) -> StorageResult<Path> {
        validate_key(bucket, path)?;
        Ok(Path::from(path))
    }
}

#[async_trait]
impl StorageAccessor for S3Accessor {
    async fn write(
        &self,
        bucket: &str,
        path: &str,
        filename: &str,
        reader: &mut (dyn AsyncRead + Send + Unpin),
    ) -> StorageResult<()> {
        let location = Self::location(bucket, path)?;
        let store = self.store(bucket)?;
        let start = std::time::Instant::now();

        // object_store takes the payload as a whole; the router has already
        // buffered the upload, so this is one more in-memory copy.
        let mut buffer = Vec::new();
        reader.read_to_end(&mut buffer).await.map_err(|e| {
            StorageError::UploadFailed(format!("Failed to read from stream: {}", e))
        })?;
        let size = buffer.len() as u64;

        let mut attributes = Attributes::new();
        if let Some(mime) = mime_guess::from_path(filename).first() {
            attributes.insert(Attribute::ContentType, mime.essence_str().to_string().into());
        }
        attributes.insert(
            Attribute::Metadata(FILENAME_METADATA.into()),
            urlencoding::encode(filename).into_owned().into(),
        );
        let options = PutOptions {
            attributes,
            ..Default::default()
        };

        let result: ObjectResult<_> = store
            .put_opts(&location, PutPayload::from(Bytes::from(buffer)), options)
            .await;

        result.map_err(|e| {
            tracing::error!(
                error = %e,
                bucket = %bucket,
                path = %path,
                size_bytes = size,
                duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                "S3 write failed"
            );
            StorageError::UploadFailed(e.to_string())
        })?;

        tracing::info!(
            bucket = %bucket,
            path = %path,
            size_bytes = size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "S3 write successful"
        );

        Ok(())
    }

    async fn read(
        &self,
        bucket: &str,
        path: &str,
        out: &mut (dyn AsyncWrite + Send + Unpin),
    ) -> StorageResult<bool> {
        let location = Self::location(bucket, path)?;
        let store = self.store(bucket)?;
        let start = std::time::Instant::now();

        let result = match store.get(&location).await {
            Ok(result) => result,
            Err(ObjectStoreError::NotFound { .. }) => return Ok(false),
            Err(e) => {
                tracing::error!(
                    error = %e,
                    bucket = %bucket,
                    path = %path,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "S3 read failed"
                );
                return Err(StorageError::DownloadFailed(e.to_string()));
            }
        };

        let mut size = 0u64;
        let mut stream = result.into_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| StorageError::DownloadFailed(e.to_string()))?;
            size += chunk.len() as u64;
            out.write_all(&chunk).await?;
        }
        out.flush().await?;

        tracing::info!(
            bucket = %bucket,
            path = %path,
            size_bytes = size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "S3 read successful"
        );

        Ok(true)
    }

    async fn storage_metadata(
        &self,
        bucket: &str,
        path: &str,
    ) -> StorageResult<Option<StorageMetadata>> {
        let location = Self::location(bucket, path)?;
        let store = self.store(bucket)?;

        let options = GetOptions {
            head: true,
            ..Default::default()
        };
        let result = match store.get_opts(&location, options).await {
            Ok(result) => result,
            Err(ObjectStoreError::NotFound { .. }) => return Ok(None),
            Err(e) => return Err(StorageError::BackendError(e.to_string())),
        };

        let filename = result
            .attributes
            .get(&Attribute::Metadata(FILENAME_METADATA.into()))
            .and_then(|v| urlencoding::decode(v.as_ref()).ok().map(|s| s.into_owned()))
            .unwrap_or_else(|| last_segment(path).to_string());
        let mime_type = result
            .attributes
            .get(&Attribute::ContentType)
            .map(|v| AsRef::<str>::as_ref(v).to_string());

        Ok(Some(StorageMetadata {
            filename,
            size: result.meta.size,
            mime_type,
            last_modified: result.meta.last_modified.timestamp_millis(),
        }))
    }

    async fn last_modified_time(&self, bucket: &str, path: &str) -> StorageResult<i64> {
        let location = Self::location(bucket, path)?;
        match self.store(bucket)?.head(&location).await {
            Ok(meta) => Ok(meta.last_modified.timestamp_millis()),
            Err(ObjectStoreError::NotFound { .. }) => Ok(0),
            Err(e) => Err(StorageError::BackendError(e.to_string())),
        }
    }

    async fn delete(&self, bucket: &str, path: &str) -> StorageResult<()> {
        let location = Self::location(bucket, path)?;
        let store = self.store(bucket)?;
        let start = std::time::Instant::now();

        let result: ObjectResult<_> = store.delete(&location).await;
        match result {
            Ok(()) | Err(ObjectStoreError::NotFound { .. }) => {}
            Err(e) => {
                tracing::error!(
                    error = %e,
                    bucket = %bucket,
                    path = %path,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "S3 delete failed"
                );
                return Err(StorageError::DeleteFailed(e.to_string()));
            }
        }

        tracing::info!(
            bucket = %bucket,
            path = %path,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "S3 delete successful"
        );

        Ok(())
    }
}

impl ProviderAccessor for S3Accessor {
    fn provider(&self) -> Provider {
        Provider::S3
    }
}

/// S3 authorizer
///
/// Objects under a published scope (a bucket and path prefix that a bucket
/// policy or CDN exposes under the public base URL) get plain public URLs.
/// Every other object gets a presigned GET URL valid for `expires_in`.
#[derive(Clone)]
pub struct S3Authorizer {
    stores: Arc<HashMap<String, AmazonS3>>,
    public_base_url: Option<String>,
    public_scopes: Vec<(String, String)>,
    expires_in: Duration,
}

impl S3Authorizer {
    pub fn new(accessor: &S3Accessor, public_base_url: Option<String>, expires_in: Duration) -> Self {
        Self {
            stores: Arc::clone(&accessor.stores),
            public_base_url,
            public_scopes: Vec::new(),
            expires_in,
        }
    }

    /// Publish every object of `bucket` under `prefix`. An empty prefix
    /// publishes the whole bucket.
    pub fn with_public_scope(mut self, bucket: impl Into<String>, prefix: &str) -> Self {
        self.public_scopes
            .push((bucket.into(), prefix.trim_matches('/').to_string()));
        self
    }

    fn is_published(&self, bucket: &str, path: &str) -> bool {
        self.public_scopes.iter().any(|(scope_bucket, prefix)| {
            scope_bucket == bucket
                && (prefix.is_empty()
                    || path
                        .strip_prefix(prefix.as_str())
                        .is_some_and(|rest| rest.starts_with('/')))
        })
    }

    /// Public URL for `path` when it lies in a published scope.
    fn public_url(&self, bucket: &str, path: &str) -> Option<String> {
        let base = self.public_base_url.as_ref()?;
        let (object_path, _) = split_query(path);
        if !self.is_published(bucket, object_path) {
            return None;
        }
        Some(format!(
            "{}/{}/{}",
            base.trim_end_matches('/'),
            urlencoding::encode(bucket),
            encode_path(path)
        ))
    }
}

#[async_trait]
impl<U: Sync> Authorizer<U> for S3Authorizer {
    fn provider(&self) -> Provider {
        Provider::S3
    }

    async fn authorize_public_read(&self, bucket: &str, path: &str) -> StorageResult<()> {
        validate_key(bucket, path)?;
        // object_store exposes no ACL API; public access comes from the bucket policy.
        if self.public_base_url.is_none() {
            return Err(StorageError::ConfigError(
                "public read on S3 requires FSS_S3_PUBLIC_BASE_URL and a public bucket policy"
                    .to_string(),
            ));
        }
        if !self.is_published(bucket, path) {
            return Err(StorageError::ConfigError(format!(
                "s3://{}/{} is not under a published scope",
                bucket, path
            )));
        }
        tracing::debug!(bucket = %bucket, path = %path, "S3 public read granted by bucket policy");
        Ok(())
    }

    async fn read_url(&self, _user: &U, bucket: &str, path: &str) -> StorageResult<String> {
        if let Some(url) = self.public_url(bucket, path) {
            return Ok(url);
        }

        let (object_path, query) = split_query(path);
        if query.is_some() {
            // Extra query parameters would invalidate the signature.
            tracing::debug!(
                bucket = %bucket,
                path = %object_path,
                "Dropping query parameters from presigned S3 URL"
            );
        }

        let location = S3Accessor::location(bucket, object_path)?;
        let store = self.stores.get(bucket).ok_or_else(|| {
            StorageError::ConfigError(format!("S3 bucket '{}' is not configured", bucket))
        })?;
        let url = store
            .signed_url(Method::GET, &location, self.expires_in)
            .await
            .map_err(|e| StorageError::BackendError(e.to_string()))?;

        Ok(url.to_string())
    }
}

#[cfg(all(test, feature = "storage-s3"))]
mod tests {
    use super::*;

    fn accessor() -> S3Accessor {
        // Static credentials so presigning stays local.
        std::env::set_var("AWS_ACCESS_KEY_ID", "test-access-key");
        std::env::set_var("AWS_SECRET_ACCESS_KEY", "test-secret-key");
        S3Accessor::new(
            &["media".to_string()],
            "us-east-1",
            Some("http://localhost:9000"),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_unconfigured_bucket_is_config_error() {
        let s3 = accessor();
        let result = s3.last_modified_time("other", "a.jpg").await;
        assert!(matches!(result, Err(StorageError::ConfigError(_))));
    }

    #[tokio::test]
    async fn test_invalid_key_rejected_before_network() {
        let s3 = accessor();
        let result = s3.storage_metadata("media", "../secret").await;
        assert!(matches!(result, Err(StorageError::InvalidKey(_))));
    }

    #[tokio::test]
    async fn test_public_read_requires_public_base_url() {
        let s3 = accessor();
        let private = S3Authorizer::new(&s3, None, Duration::from_secs(60))
            .with_public_scope("media", "avatars");
        let result = Authorizer::<()>::authorize_public_read(&private, "media", "avatars/a.jpg").await;
        assert!(matches!(result, Err(StorageError::ConfigError(_))));

        let public = S3Authorizer::new(
            &s3,
            Some("https://cdn.example.com/".to_string()),
            Duration::from_secs(60),
        )
        .with_public_scope("media", "/avatars/");
        assert!(Authorizer::<()>::authorize_public_read(&public, "media", "avatars/a.jpg")
            .await
            .is_ok());
        let url = Authorizer::<()>::read_url(&public, &(), "media", "avatars/a b.jpg?w=10")
            .await
            .unwrap();
        assert_eq!(url, "https://cdn.example.com/media/avatars/a%20b.jpg?w=10");
    }

    #[tokio::test]
    async fn test_private_objects_get_signed_urls_despite_public_base() {
        let s3 = accessor();
        let authorizer = S3Authorizer::new(
            &s3,
            Some("https://cdn.example.com".to_string()),
            Duration::from_secs(60),
        )
        .with_public_scope("media", "avatars");

        let result =
            Authorizer::<()>::authorize_public_read(&authorizer, "media", "docs/alice/secret.pdf")
                .await;
        assert!(matches!(result, Err(StorageError::ConfigError(_))));

        // Same prefix text but a different segment is still private.
        for path in ["docs/alice/secret.pdf", "avatarsx/b.png"] {
            let url = Authorizer::<()>::read_url(&authorizer, &(), "media", path)
                .await
                .unwrap();
            assert!(!url.starts_with("https://cdn.example.com"), "{url}");
            assert!(url.contains("X-Amz-Signature="), "{url}");
        }
    }
}
