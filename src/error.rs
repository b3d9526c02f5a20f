//! Error types for curve ingestion.
//!
//! Two layers of errors exist in this crate:
//!
//! - [`DecodeError`] is produced by the wire decoder for a single message. It is
//!   always contained inside the channel manager: the offending message is
//!   dropped and the connection stays open.
//! - [`CrowError`] is the crate-wide error returned by fallible public
//!   operations (transports, configuration loading, encoding).
//!
//! ## Recovery and Retry
//!
//! ```rust
//! use crow::CrowError;
//!
//! let error = CrowError::connection_failed("server refused the upgrade");
//! if error.is_retryable() {
//!     for suggestion in error.recovery_suggestions() {
//!         println!("  - {}", suggestion);
//!     }
//! }
//! ```

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for crow operations.
pub type Result<T, E = CrowError> = std::result::Result<T, E>;

/// Failure to turn one wire message into a curve update.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum DecodeError {
    /// The payload is not a complete raw-deflate stream of UTF-8 text.
    #[error("Decompression failed: {reason}")]
    Decompression { reason: String },

    /// The payload decompressed but is not a `{timestamp, points}` record.
    #[error("Schema mismatch: {details}")]
    Schema { details: String },
}

impl DecodeError {
    /// Helper constructor for decompression failures.
    pub fn decompression(reason: impl Into<String>) -> Self {
        DecodeError::Decompression { reason: reason.into() }
    }

    /// Helper constructor for schema failures.
    pub fn schema(details: impl Into<String>) -> Self {
        DecodeError::Schema { details: details.into() }
    }
}

/// Main error type for crow operations.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum CrowError {
    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error("Connection to {uri} failed: {reason}")]
    Connection {
        uri: String,
        reason: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Operation timed out after {duration:?}")]
    Timeout { duration: Duration },

    #[error("Invalid configuration: {reason}")]
    Config { reason: String },

    #[error("I/O error on {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl CrowError {
    /// Returns whether this error is potentially recoverable through retry.
    pub fn is_retryable(&self) -> bool {
        match self {
            CrowError::Connection { .. } => true,
            CrowError::Timeout { .. } => true,
            CrowError::Decode(_) => false,
            CrowError::Config { .. } => false,
            CrowError::Io { .. } => false,
        }
    }

    /// Returns suggested recovery actions for this error.
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            CrowError::Decode(DecodeError::Decompression { .. }) => vec![
                "Check that the producer compresses with raw deflate (no zlib or gzip header)",
                "Verify frames are delivered whole by the transport",
            ],
            CrowError::Decode(DecodeError::Schema { .. }) => vec![
                "Check the producer emits {timestamp, points: [{x, y, z}]}",
                "Verify producer and client versions match",
            ],
            CrowError::Connection { .. } => vec![
                "Check the server address and channel number",
                "Ensure the curve server is running and reachable",
                "Enable a reconnect policy to retry automatically",
            ],
            CrowError::Timeout { .. } => vec![
                "Increase the connect timeout",
                "Check network latency to the server",
            ],
            CrowError::Config { .. } => vec![
                "Check the configuration file syntax",
                "Verify CROW_SERVER and CROW_CHANNEL environment overrides",
            ],
            CrowError::Io { .. } => vec![
                "Check the file exists and is readable",
                "Check file permissions",
            ],
        }
    }

    /// Helper constructor for connection errors.
    pub fn connection_failed(reason: impl Into<String>) -> Self {
        CrowError::Connection { uri: "<unknown>".to_string(), reason: reason.into(), source: None }
    }

    /// Helper constructor for connection errors against a known endpoint.
    pub fn connection_to(
        uri: impl Into<String>,
        reason: impl Into<String>,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        CrowError::Connection { uri: uri.into(), reason: reason.into(), source }
    }

    /// Helper constructor for configuration errors.
    pub fn config_invalid(reason: impl Into<String>) -> Self {
        CrowError::Config { reason: reason.into() }
    }

    /// Helper constructor for file errors with path context.
    pub fn io_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        CrowError::Io { path: path.into(), source }
    }
}

impl From<std::io::Error> for CrowError {
    fn from(err: std::io::Error) -> Self {
        CrowError::Io { path: PathBuf::from("<unknown>"), source: err }
    }
}
