//! Network primitives shared by both scan modes

pub mod packet;
pub mod protocol;
pub mod socket;

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Scanning technique selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScanMode {
    /// Stateless raw SYN probes; requires raw-socket privilege
    Syn,
    /// Full three-way handshakes via the kernel socket API
    Connect,
}

impl ScanMode {
    pub fn name(&self) -> &'static str {
        match self {
            ScanMode::Syn => "syn",
            ScanMode::Connect => "connect",
        }
    }

    pub fn requires_raw_socket(&self) -> bool {
        matches!(self, ScanMode::Syn)
    }
}

impl FromStr for ScanMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "syn" => Ok(ScanMode::Syn),
            "connect" => Ok(ScanMode::Connect),
            _ => Err(format!("unknown scan type: {}", s)),
        }
    }
}
