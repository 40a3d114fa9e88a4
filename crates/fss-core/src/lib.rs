//! FSS Core Library
//!
//! This crate provides the shared vocabulary of the file storage service:
//! providers, storage URLs, upload limits, metadata models, error metadata and
//! configuration. It has no I/O of its own; backends live in `fss-storage` and
//! the routing engine in `fss-service`.

pub mod config;
pub mod error;
pub mod models;
pub mod provider;
pub mod storage_url;
pub mod upload_limit;

// Re-export commonly used types
pub use config::FssConfig;
pub use error::{ErrorMetadata, LogLevel};
pub use models::{FileMeta, ReadMetadata, StorageMetadata};
pub use provider::Provider;
pub use storage_url::{InvalidStorageUrl, StorageUrl};
pub use upload_limit::{ExtensionMode, UploadLimit};
