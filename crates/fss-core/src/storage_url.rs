//! Storage URLs
//!
//! A storage URL is the opaque reference handed back to callers after a write.
//! It encodes the provider, bucket and path of the stored object as
//! `<provider>://<bucket>/<path>`. The path may carry a `?query` suffix.
//!
//! Parsing never panics: malformed input yields [`InvalidStorageUrl`], which
//! callers treat as "no such reference" rather than as a failure.

use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

use crate::provider::Provider;

const SCHEME_SEPARATOR: &str = "://";

/// Returned when a string is not a well-formed storage URL.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid storage URL: {0}")]
pub struct InvalidStorageUrl(pub String);

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StorageUrl {
    provider: Provider,
    bucket: String,
    path: String,
}

impl StorageUrl {
    pub fn new(provider: Provider, bucket: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            provider,
            bucket: bucket.into(),
            path: path.into(),
        }
    }

    pub fn parse(value: &str) -> Result<Self, InvalidStorageUrl> {
        let invalid = || InvalidStorageUrl(value.to_string());

        let (scheme, rest) = value.split_once(SCHEME_SEPARATOR).ok_or_else(invalid)?;
        // Exact match only, so that serialize(parse(s)) == s.
        let provider = [Provider::Own, Provider::S3]
            .into_iter()
            .find(|p| p.as_str() == scheme)
            .ok_or_else(invalid)?;

        let (bucket, path) = rest.split_once('/').ok_or_else(invalid)?;
        if !Self::is_valid_bucket(bucket) || path.is_empty() {
            return Err(invalid());
        }

        Ok(Self::new(provider, bucket, path))
    }

    /// Whether `bucket` survives a round trip through a storage URL:
    /// non-empty, without `/` and without whitespace.
    pub fn is_valid_bucket(bucket: &str) -> bool {
        !bucket.is_empty() && !bucket.contains('/') && !bucket.chars().any(char::is_whitespace)
    }

    pub fn provider(&self) -> Provider {
        self.provider
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn path(&self) -> &str {
        &self.path
    }
}

impl FromStr for StorageUrl {
    type Err = InvalidStorageUrl;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Display for StorageUrl {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(
            f,
            "{}{}{}/{}",
            self.provider, SCHEME_SEPARATOR, self.bucket, self.path
        )
    }
}
