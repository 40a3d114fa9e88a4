//! FSS Storage Library
//!
//! This crate provides the byte-level storage contracts the router talks to,
//! plus implementations for the local filesystem and S3-compatible stores.
//!
//! # Object layout
//!
//! Every backend addresses an object by `(bucket, path)`. Paths arrive already
//! normalized by the router: no leading or trailing `/`. Backends must reject
//! paths containing `..` segments. Key validation is centralized in the `keys`
//! module so all backends stay consistent.

#[cfg(feature = "storage-local")]
pub mod factory;
pub(crate) mod keys;
#[cfg(feature = "storage-local")]
pub mod local;
#[cfg(feature = "storage-s3")]
pub mod s3;
pub mod traits;

// Re-export commonly used types
#[cfg(feature = "storage-local")]
pub use factory::{create_backends, Backends};
pub use fss_core::Provider;
#[cfg(feature = "storage-local")]
pub use local::{LocalAccessor, OwnAuthorizer};
#[cfg(feature = "storage-s3")]
pub use s3::{S3Accessor, S3Authorizer};
pub use traits::{Authorizer, ProviderAccessor, StorageAccessor, StorageError, StorageResult};
