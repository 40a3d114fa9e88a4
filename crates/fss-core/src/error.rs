//! Error presentation
//!
//! Concrete error enums live next to the code that raises them (`StorageError`
//! in `fss-storage`, `FssError` in `fss-service`). This module holds the
//! presentation contract they share so that an HTTP or CLI layer can render any
//! of them without matching on variants it does not own.

/// Log level for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Debug level - for expected errors like denied access or bad extensions
    Debug,
    /// Warning level - for recoverable backend issues
    Warn,
    /// Error level - for unexpected failures and misconfiguration
    Error,
}

/// Metadata for error responses - defines how an error should be presented
pub trait ErrorMetadata {
    /// HTTP status code to return
    fn http_status_code(&self) -> u16;

    /// Machine-readable error code (e.g., "NO_READ_AUTHORITY")
    fn error_code(&self) -> &'static str;

    /// Whether this error is recoverable (can be retried)
    fn is_recoverable(&self) -> bool;

    /// Suggested action for the client
    fn suggested_action(&self) -> Option<&'static str>;

    /// Client-facing message (may differ from internal error message)
    fn client_message(&self) -> String;

    /// Whether details should be hidden in production
    fn is_sensitive(&self) -> bool;

    /// Log level for this error
    fn log_level(&self) -> LogLevel;
}
