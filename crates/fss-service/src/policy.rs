use fss_core::{Provider, UploadLimit};
use std::collections::BTreeMap;

/// Access policy for one content type
///
/// A policy decides where uploads of its content type go and who may read
/// them back. Policies are built once at startup and never change afterwards.
///
/// Several policies may share a bucket, but then their `is_readable` answers
/// must partition the bucket: for any `(user, path)` at most one policy of that
/// bucket may claim read access. Read resolution picks the first claimant in
/// registration order.
pub trait AccessPolicy<T, U>: Send + Sync {
    /// Content type this policy is registered under.
    fn content_type(&self) -> T;

    fn upload_limit(&self, user: &U) -> UploadLimit;

    /// Storage path for an upload, or `None` to refuse the write outright.
    ///
    /// `filename` is the effective filename: the content hash plus extension
    /// for content-addressed policies, the uploader's name otherwise.
    fn path(&self, resource: &str, user: &U, filename: &str) -> Option<String>;

    /// Final write gate, checked against the normalized path.
    fn is_writable(&self, user: &U, path: &str) -> bool;

    /// Read gate. Must be free of side effects: the router asks every policy
    /// of a bucket while resolving a read.
    fn is_readable(&self, user: &U, path: &str) -> bool;

    fn provider(&self) -> Provider;

    fn bucket(&self) -> &str;

    /// Name uploads by the MD5 of their content instead of the given filename.
    fn is_content_addressed(&self) -> bool {
        false
    }

    /// Mirror uploads to local storage in addition to the provider.
    fn store_locally(&self) -> bool {
        false
    }

    /// Serve read URLs from own storage regardless of the provider.
    fn read_locally(&self) -> bool {
        false
    }

    fn is_publicly_readable(&self) -> bool {
        false
    }

    fn thumbnail_parameters(&self) -> BTreeMap<String, String> {
        BTreeMap::new()
    }
}
