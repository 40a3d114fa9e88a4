//! Metadata models returned by the storage service

use serde::{Deserialize, Serialize};

/// Backend-reported facts about a stored object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageMetadata {
    /// Filename given by the uploader (not the content-addressed name).
    pub filename: String,
    pub size: u64,
    pub mime_type: Option<String>,
    /// Milliseconds since the Unix epoch.
    pub last_modified: i64,
}

/// Everything a client needs to display a stored file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadMetadata {
    pub read_url: String,
    pub thumbnail_read_url: Option<String>,
    pub storage: StorageMetadata,
}

/// Flattened read metadata keyed by the storage URL it was resolved from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileMeta {
    pub storage_url: String,
    pub filename: String,
    pub size: u64,
    pub mime_type: Option<String>,
    pub last_modified: i64,
    pub read_url: String,
    pub thumbnail_read_url: Option<String>,
}

impl FileMeta {
    pub fn new(storage_url: impl Into<String>, metadata: ReadMetadata) -> Self {
        let ReadMetadata {
            read_url,
            thumbnail_read_url,
            storage,
        } = metadata;
        Self {
            storage_url: storage_url.into(),
            filename: storage.filename,
            size: storage.size,
            mime_type: storage.mime_type,
            last_modified: storage.last_modified,
            read_url,
            thumbnail_read_url,
        }
    }
}
