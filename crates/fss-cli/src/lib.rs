//! Wiring shared by the `fss` binary: backends from the environment,
//! policies from the definitions file, and the router on top.

use anyhow::Context;
use fss_core::{FssConfig, Provider};
use fss_service::{load_policies, ConfiguredPolicy, Registry, StorageRouter};
use fss_storage::{create_backends, S3Authorizer};
use std::path::Path;
use std::sync::Arc;

/// Router with string content types and users identified by name.
pub type CliRouter = StorageRouter<String, String>;

/// Register every configured backend and `policies` with a new router.
pub async fn build_router(
    config: &FssConfig,
    policies: Vec<ConfiguredPolicy>,
) -> anyhow::Result<CliRouter> {
    let backends = create_backends(config)
        .await
        .context("Failed to initialize storage backends")?;

    let mut builder = Registry::<String, String>::builder(backends.local.clone())
        .provider_accessor(backends.local.clone())
        .authorizer(backends.own_authorizer.clone());
    if let Some((accessor, authorizer)) = backends.s3 {
        let authorizer = Arc::new(publish_scopes((*authorizer).clone(), &policies));
        builder = builder.provider_accessor(accessor).authorizer(authorizer);
    }
    for policy in policies {
        builder = builder.policy(Arc::new(policy));
    }

    let registry = builder.build().context("Invalid storage registry")?;
    Ok(StorageRouter::new(registry))
}

/// Open the scope of every public S3 policy to unsigned reads. Objects
/// outside these scopes keep getting presigned URLs.
fn publish_scopes(authorizer: S3Authorizer, policies: &[ConfiguredPolicy]) -> S3Authorizer {
    policies
        .iter()
        .filter(|policy| {
            let definition = policy.definition();
            definition.public_read && definition.provider == Provider::S3
        })
        .fold(authorizer, |authorizer, policy| {
            authorizer.with_public_scope(policy.definition().bucket.clone(), policy.scope())
        })
}

/// Load the policies file named by `override_path` or, failing that, by the
/// configuration.
pub fn policies_from(
    config: &FssConfig,
    override_path: Option<&Path>,
) -> anyhow::Result<Vec<ConfiguredPolicy>> {
    let path = override_path
        .map(Path::to_path_buf)
        .or_else(|| config.policies_path.as_ref().map(Into::into))
        .context("No policy file given. Pass --policies or set FSS_POLICIES_PATH")?;
    load_policies(&path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use fss_service::PolicyDefinition;

    fn config(dir: &Path) -> FssConfig {
        FssConfig {
            environment: "test".to_string(),
            local_storage_path: dir.join("data").display().to_string(),
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

    fn definitions() -> Vec<PolicyDefinition> {
        serde_json::from_str(
            r#"[{
                "content_type": "document",
                "provider": "own",
                "bucket": "files",
                "path_template": "docs/{user}/{filename}",
                "read_access": "owner",
                "public_read": true
            }]"#,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_build_router_over_local_storage() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        let policies = fss_service::build_policies(definitions()).unwrap();
        let router = build_router(&config, policies).await.unwrap();

        let alice = "alice".to_string();
        let url = router
            .write(&"document".to_string(), "", &alice, "notes.txt", &b"hello"[..])
            .await
            .unwrap();
        assert_eq!(url, "own://files/docs/alice/notes.txt");

        let read_url = router.read_url(&alice, &url, false).await.unwrap();
        assert_eq!(
            read_url.as_deref(),
            Some("http://localhost:8080/fss/files/docs/alice/notes.txt")
        );

        let mut out = Vec::new();
        assert!(router
            .read(&alice, "files", "docs/alice/notes.txt", &mut out)
            .await
            .unwrap());
        assert_eq!(out, b"hello");
    }

    #[tokio::test]
    async fn test_only_public_s3_policies_are_published() {
        use fss_storage::{Authorizer, S3Accessor};
        use std::time::Duration;

        std::env::set_var("AWS_ACCESS_KEY_ID", "test-access-key");
        std::env::set_var("AWS_SECRET_ACCESS_KEY", "test-secret-key");
        let s3 = S3Accessor::new(&["media".to_string()], "us-east-1", Some("http://localhost:9000"))
            .unwrap();
        let definitions: Vec<PolicyDefinition> = serde_json::from_str(
            r#"[{
                "content_type": "avatar",
                "provider": "s3",
                "bucket": "media",
                "path_template": "avatars/{user}/{filename}",
                "public_read": true
            }, {
                "content_type": "document",
                "provider": "s3",
                "bucket": "media",
                "path_template": "docs/{user}/{filename}",
                "read_access": "owner"
            }]"#,
        )
        .unwrap();
        let policies = fss_service::build_policies(definitions).unwrap();
        let authorizer = publish_scopes(
            S3Authorizer::new(
                &s3,
                Some("https://cdn.example.com".to_string()),
                Duration::from_secs(60),
            ),
            &policies,
        );

        let avatar = Authorizer::<String>::read_url(
            &authorizer,
            &"bob".to_string(),
            "media",
            "avatars/alice/me.png",
        )
        .await
        .unwrap();
        assert_eq!(avatar, "https://cdn.example.com/media/avatars/alice/me.png");

        let document = Authorizer::<String>::read_url(
            &authorizer,
            &"alice".to_string(),
            "media",
            "docs/alice/secret.pdf",
        )
        .await
        .unwrap();
        assert!(document.contains("X-Amz-Signature="), "{document}");
    }

    #[test]
    fn test_policies_path_required() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        assert!(policies_from(&config, None).is_err());

        let path = dir.path().join("policies.json");
        std::fs::write(&path, serde_json::to_string(&definitions()).unwrap()).unwrap();
        assert_eq!(policies_from(&config, Some(&path)).unwrap().len(), 1);
    }
}
