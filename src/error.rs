//! Error handling for the deimos scanner
//!
//! Fatal setup errors surface through this enum; per-target transient
//! failures (refused connects, DNS misses, CDN lookup errors) are swallowed
//! at the call site and logged instead.

use thiserror::Error;

/// Main error type for scanning operations
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("Permission denied: {0}")]
    PermissionError(String),

    #[error("Invalid target: {0}")]
    InvalidTarget(String),

    #[error("Port range error: {0}")]
    PortRangeError(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Raw socket error: {0}")]
    RawSocketError(String),

    #[error("Source selection error: {0}")]
    SourceError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Output error: {0}")]
    OutputError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl ScanError {
    /// True for errors that must abort before the scan starts.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, ScanError::NetworkError(_))
    }
}

/// Convert common errors to ScanError
impl From<std::net::AddrParseError> for ScanError {
    fn from(e: std::net::AddrParseError) -> Self {
        ScanError::InvalidTarget(e.to_string())
    }
}

impl From<std::num::ParseIntError> for ScanError {
    fn from(e: std::num::ParseIntError) -> Self {
        ScanError::PortRangeError(e.to_string())
    }
}
