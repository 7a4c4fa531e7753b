//! Deimos - a port scanner for the impatient
//!
//! Shuffled, rate-limited enumeration of a (host x port) space with a
//! privileged stateless SYN mode and an unprivileged connect mode.

pub mod config;
pub mod error;
pub mod network;
pub mod output;
pub mod scanner;
pub mod top_ports;
pub mod utils;

// Re-export commonly used types
pub use config::ScanConfig;
pub use error::ScanError;
pub use network::ScanMode;
pub use scanner::engine::ScanEngine;

pub type Result<T> = std::result::Result<T, ScanError>;
