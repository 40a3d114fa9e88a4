#[cfg(feature = "storage-s3")]
use crate::{S3Accessor, S3Authorizer};
use crate::{LocalAccessor, OwnAuthorizer, StorageError, StorageResult};
use fss_core::FssConfig;
use std::sync::Arc;
#[cfg(feature = "storage-s3")]
use std::time::Duration;

/// Backends built from configuration, ready to be registered with the router.
pub struct Backends {
    /// Mirror in front of remote providers; also the `Own` provider accessor.
    pub local: Arc<LocalAccessor>,
    pub own_authorizer: Arc<OwnAuthorizer>,
    #[cfg(feature = "storage-s3")]
    pub s3: Option<(Arc<S3Accessor>, Arc<S3Authorizer>)>,
}

/// Create storage backends based on configuration
pub async fn create_backends(config: &FssConfig) -> StorageResult<Backends> {
    let local = LocalAccessor::new(&config.local_storage_path).await?;
    tracing::info!(
        path = %local.base_path().display(),
        "Local storage initialized"
    );
    let own_authorizer = OwnAuthorizer::new(config.local_base_url.clone());

    #[cfg(feature = "storage-s3")]
    let s3 = if config.s3_enabled() {
        let region = config.region().ok_or_else(|| {
            StorageError::ConfigError("FSS_S3_REGION or AWS_REGION not configured".to_string())
        })?;
        let accessor = S3Accessor::new(&config.s3_buckets, region, config.s3_endpoint.as_deref())?;
        let authorizer = S3Authorizer::new(
            &accessor,
            config.s3_public_base_url.clone(),
            Duration::from_secs(config.presign_expiry_secs),
        );
        tracing::info!(
            buckets = ?config.s3_buckets,
            region = %region,
            "S3 storage initialized"
        );
        Some((Arc::new(accessor), Arc::new(authorizer)))
    } else {
        None
    };

    #[cfg(not(feature = "storage-s3"))]
    if config.s3_enabled() {
        return Err(StorageError::ConfigError(
            "S3 storage backend not available (storage-s3 feature not enabled)".to_string(),
        ));
    }

    Ok(Backends {
        local: Arc::new(local),
        own_authorizer: Arc::new(own_authorizer),
        #[cfg(feature = "storage-s3")]
        s3,
    })
}

#[cfg(all(test, feature = "storage-local"))]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn config(path: &std::path::Path) -> FssConfig {
        FssConfig {
            environment: "test".to_string(),
            local_storage_path: path.display().to_string(),
            local_base_url: "http://localhost:8080/fss".to_string(),
            s3_buckets: Vec::new(),
            s3_region: None,
            s3_endpoint: None,
            aws_region: None,
            s3_public_base_url: None,
            presign_expiry_secs: 60,
            policies_path: None,
            log_format: "pretty".to_string(),
        }
    }

    #[tokio::test]
    async fn test_local_only_backends() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("store");
        let backends = create_backends(&config(&root)).await.unwrap();
        assert!(root.is_dir());
        #[cfg(feature = "storage-s3")]
        assert!(backends.s3.is_none());
        let _ = backends;
    }

    #[cfg(feature = "storage-s3")]
    #[tokio::test]
    async fn test_s3_backends_when_buckets_configured() {
        let dir = tempdir().unwrap();
        let mut cfg = config(dir.path());
        cfg.s3_buckets = vec!["media".to_string()];
        cfg.s3_region = Some("us-east-1".to_string());
        cfg.s3_endpoint = Some("http://localhost:9000".to_string());
        let backends = create_backends(&cfg).await.unwrap();
        assert!(backends.s3.is_some());
    }
}
