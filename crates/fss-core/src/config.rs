//! Configuration module
//!
//! Environment-driven configuration for the storage backends, read URL
//! generation, policy definitions and logging.

use std::env;

// Common constants
const LOCAL_STORAGE_PATH: &str = "./data/fss";
const LOCAL_BASE_URL: &str = "http://localhost:8080/fss";
const PRESIGN_EXPIRY_SECS: u64 = 3600;
// S3 rejects presigned URLs valid for longer than seven days.
const MAX_PRESIGN_EXPIRY_SECS: u64 = 7 * 24 * 3600;

/// Storage service configuration
#[derive(Clone, Debug)]
pub struct FssConfig {
    pub environment: String,
    // Local (own) storage, also used as the mirror for remote providers
    pub local_storage_path: String,
    pub local_base_url: String,
    // S3 configuration
    pub s3_buckets: Vec<String>,
    pub s3_region: Option<String>,
    pub s3_endpoint: Option<String>, // Custom endpoint for S3-compatible providers (MinIO, etc.)
    pub aws_region: Option<String>,
    pub s3_public_base_url: Option<String>,
    pub presign_expiry_secs: u64,
    // Policy definitions (JSON file)
    pub policies_path: Option<String>,
    // Logging
    pub log_format: String,
}

impl FssConfig {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();

        let environment = env::var("ENVIRONMENT")
            .or_else(|_| env::var("APP_ENV"))
            .unwrap_or_else(|_| "development".to_string());

        let config = FssConfig {
            environment,
            local_storage_path: env::var("FSS_LOCAL_STORAGE_PATH")
                .unwrap_or_else(|_| LOCAL_STORAGE_PATH.to_string()),
            local_base_url: env::var("FSS_LOCAL_BASE_URL")
                .unwrap_or_else(|_| LOCAL_BASE_URL.to_string()),
            s3_buckets: env::var("FSS_S3_BUCKETS")
                .or_else(|_| env::var("FSS_S3_BUCKET"))
                .map(|s| {
                    s.split(',')
                        .map(|b| b.trim().to_string())
                        .filter(|b| !b.is_empty())
                        .collect()
                })
                .unwrap_or_default(),
            s3_region: env::var("FSS_S3_REGION").ok(),
            s3_endpoint: env::var("FSS_S3_ENDPOINT").ok().filter(|s| !s.is_empty()),
            aws_region: env::var("AWS_REGION").ok(),
            s3_public_base_url: env::var("FSS_S3_PUBLIC_BASE_URL")
                .ok()
                .filter(|s| !s.is_empty()),
            presign_expiry_secs: env::var("FSS_PRESIGN_EXPIRY_SECS")
                .unwrap_or_else(|_| PRESIGN_EXPIRY_SECS.to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("FSS_PRESIGN_EXPIRY_SECS must be a valid number"))?,
            policies_path: env::var("FSS_POLICIES_PATH").ok().filter(|s| !s.is_empty()),
            log_format: env::var("FSS_LOG_FORMAT")
                .unwrap_or_else(|_| "pretty".to_string())
                .to_lowercase(),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.local_storage_path.trim().is_empty() {
            return Err(anyhow::anyhow!("FSS_LOCAL_STORAGE_PATH must not be empty"));
        }

        if !self.local_base_url.starts_with("http://") && !self.local_base_url.starts_with("https://")
        {
            return Err(anyhow::anyhow!(
                "FSS_LOCAL_BASE_URL must be an http(s) URL"
            ));
        }

        if self.s3_enabled() && self.region().is_none() {
            return Err(anyhow::anyhow!(
                "FSS_S3_REGION or AWS_REGION must be set when S3 buckets are configured"
            ));
        }

        if self.presign_expiry_secs == 0 || self.presign_expiry_secs > MAX_PRESIGN_EXPIRY_SECS {
            return Err(anyhow::anyhow!(
                "FSS_PRESIGN_EXPIRY_SECS must be between 1 and {}",
                MAX_PRESIGN_EXPIRY_SECS
            ));
        }

        if !matches!(self.log_format.as_str(), "pretty" | "json") {
            return Err(anyhow::anyhow!(
                "FSS_LOG_FORMAT must be 'pretty' or 'json', got '{}'",
                self.log_format
            ));
        }

        if self.is_production() && self.local_base_url.starts_with("http://") {
            return Err(anyhow::anyhow!(
                "FSS_LOCAL_BASE_URL must use https in production"
            ));
        }

        Ok(())
    }

    /// Check if the application is running in production mode
    pub fn is_production(&self) -> bool {
        let env = self.environment.to_lowercase();
        env == "production" || env == "prod"
    }

    pub fn s3_enabled(&self) -> bool {
        !self.s3_buckets.is_empty()
    }

    pub fn region(&self) -> Option<&str> {
        self.s3_region.as_deref().or(self.aws_region.as_deref())
    }

    pub fn json_logs(&self) -> bool {
        self.log_format == "json"
    }
}
