//! Error types module
//!
//! Every failure the storage router reports is an `FssError`. Authorization
//! and validation failures carry the offending value so that callers can
//! render a message without re-deriving context.

use fss_core::{ErrorMetadata, LogLevel, Provider};
use fss_storage::StorageError;
use std::io;

#[derive(Debug, thiserror::Error)]
pub enum FssError {
    #[error("No access strategy registered for content type {content_type}")]
    NoAccessStrategy { content_type: String },

    #[error("No write authority")]
    NoWriteAuthority,

    #[error("No read authority for {url}")]
    NoReadAuthority { url: String },

    #[error("Extension of {filename} is not supported; rejected extensions: {}", .allowed.join(","))]
    UnsupportedExtension {
        allowed: Vec<String>,
        filename: String,
    },

    #[error("Only {} extensions are supported, got {filename}", .allowed.join(","))]
    OnlySupportedExtension {
        allowed: Vec<String>,
        filename: String,
    },

    #[error("No authorizer registered for provider {provider}")]
    MissingAuthorizer { provider: Provider },

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Result type for router operations
pub type FssResult<T> = Result<T, FssError>;

/// Static metadata for each variant: (http_status, error_code, recoverable, suggested_action, sensitive, log_level).
fn fss_error_static_metadata(
    err: &FssError,
) -> (
    u16,
    &'static str,
    bool,
    Option<&'static str>,
    bool,
    LogLevel,
) {
    match err {
        FssError::NoAccessStrategy { .. } => (
            500,
            "NO_ACCESS_STRATEGY_FOR_TYPE",
            false,
            Some("Register an access policy for this content type"),
            true,
            LogLevel::Error,
        ),
        FssError::NoWriteAuthority => (
            403,
            "NO_WRITE_AUTHORITY",
            false,
            Some("Check that you may upload to this location"),
            false,
            LogLevel::Debug,
        ),
        FssError::NoReadAuthority { .. } => (
            403,
            "NO_READ_AUTHORITY",
            false,
            Some("Check that you may read this file"),
            false,
            LogLevel::Debug,
        ),
        FssError::UnsupportedExtension { .. } => (
            400,
            "UNSUPPORTED_EXTENSION",
            false,
            Some("Upload a file with a different extension"),
            false,
            LogLevel::Debug,
        ),
        FssError::OnlySupportedExtension { .. } => (
            400,
            "ONLY_SUPPORTED_EXTENSION",
            false,
            Some("Upload a file with one of the supported extensions"),
            false,
            LogLevel::Debug,
        ),
        FssError::MissingAuthorizer { .. } => (
            500,
            "MISSING_AUTHORIZER",
            false,
            Some("Contact support if this error persists"),
            true,
            LogLevel::Error,
        ),
        FssError::Storage(StorageError::InvalidKey(_)) => (
            400,
            "INVALID_STORAGE_KEY",
            false,
            Some("Check the storage path"),
            false,
            LogLevel::Debug,
        ),
        FssError::Storage(StorageError::ConfigError(_)) => (
            500,
            "STORAGE_CONFIG_ERROR",
            false,
            Some("Contact support if this error persists"),
            true,
            LogLevel::Error,
        ),
        FssError::Storage(_) => (
            502,
            "STORAGE_ERROR",
            true,
            Some("Retry after a short delay"),
            true,
            LogLevel::Warn,
        ),
        FssError::Io(_) => (
            500,
            "IO_ERROR",
            true,
            Some("Retry the upload"),
            true,
            LogLevel::Warn,
        ),
    }
}

impl FssError {
    /// Whether the error points at a deployment problem rather than a bad request.
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            FssError::NoAccessStrategy { .. }
                | FssError::MissingAuthorizer { .. }
                | FssError::Storage(StorageError::ConfigError(_))
        )
    }
}

impl ErrorMetadata for FssError {
    fn http_status_code(&self) -> u16 {
        fss_error_static_metadata(self).0
    }

    fn error_code(&self) -> &'static str {
        fss_error_static_metadata(self).1
    }

    fn is_recoverable(&self) -> bool {
        fss_error_static_metadata(self).2
    }

    fn suggested_action(&self) -> Option<&'static str> {
        fss_error_static_metadata(self).3
    }

    fn is_sensitive(&self) -> bool {
        fss_error_static_metadata(self).4
    }

    fn log_level(&self) -> LogLevel {
        fss_error_static_metadata(self).5
    }

    fn client_message(&self) -> String {
        match self {
            FssError::NoAccessStrategy { .. } | FssError::MissingAuthorizer { .. } => {
                "File storage is not configured for this request".to_string()
            }
            FssError::Storage(StorageError::InvalidKey(ref msg)) => msg.clone(),
            FssError::Storage(_) | FssError::Io(_) => "Failed to access storage".to_string(),
            other => other.to_string(),
        }
    }
}
