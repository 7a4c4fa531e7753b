//! Configuration module for the deimos scanner

use crate::network::ScanMode;
use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;
use std::path::PathBuf;
use std::time::Duration;

/// Main configuration structure for a scan run.
///
/// Immutable after construction; the orchestrator and its workers only ever
/// read from it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanConfig {
    /// Targets to scan: IPv4 literals, CIDRs, hostnames, or files of those
    pub targets: Vec<String>,

    /// Ports to scan (sorted, unique)
    pub ports: Vec<u16>,

    /// Addresses to skip at dispatch time (IPs, ranges, CIDRs)
    pub exclude_ips: Vec<String>,

    /// Packet rate cap in packets per second; also the connect pool bound
    pub rate: usize,

    /// Additional passes over the search space (total passes = retries + 1)
    pub retries: usize,

    /// Per-connect timeout in milliseconds
    pub timeout: u64,

    /// Scanning technique to use
    pub mode: ScanMode,

    /// Re-probe discovered ports via connect after the scan
    pub verify: bool,

    /// Post-scan sleep in seconds, allows late SYN/ACKs to arrive
    pub warm_up_time: u64,

    /// Restrict CDN-hosted addresses to ports 80 and 443
    pub exclude_cdn: bool,

    /// Source address for raw-mode packets (auto-detected when absent)
    pub source_ip: Option<Ipv4Addr>,

    /// Network interface for raw-mode packets (auto-detected when absent)
    pub interface: Option<String>,

    /// Output file path; `.json` is appended in structured mode
    pub output: Option<PathBuf>,

    /// Emit structured JSON records instead of host:port lines
    pub json: bool,

    /// Enable the periodic progress reporter
    pub progress: bool,

    /// External command to run against discovered ports after the scan
    pub nmap_cli: Option<String>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            targets: Vec::new(),
            ports: Vec::new(),
            exclude_ips: Vec::new(),
            rate: 1000,
            retries: 3,
            timeout: 1000,
            mode: ScanMode::Connect,
            verify: false,
            warm_up_time: 2,
            exclude_cdn: false,
            source_ip: None,
            interface: None,
            output: None,
            json: false,
            progress: false,
            nmap_cli: None,
        }
    }
}

impl ScanConfig {
    /// Get the per-connect timeout as a Duration
    pub fn timeout_duration(&self) -> Duration {
        Duration::from_millis(self.timeout)
    }

    /// Get the post-scan warm-up sleep as a Duration
    pub fn warm_up_duration(&self) -> Duration {
        Duration::from_secs(self.warm_up_time)
    }

    /// Validate the configuration before a scan starts
    pub fn validate(&self) -> crate::Result<()> {
        if self.targets.is_empty() {
            return Err(crate::ScanError::InvalidTarget(
                "no targets specified".to_string(),
            ));
        }

        if self.ports.is_empty() {
            return Err(crate::ScanError::PortRangeError(
                "no ports specified".to_string(),
            ));
        }

        if self.ports.iter().any(|&p| p == 0) {
            return Err(crate::ScanError::PortRangeError(
                "port 0 is not scannable".to_string(),
            ));
        }

        if self.rate == 0 {
            return Err(crate::ScanError::ConfigError(
                "rate must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> ScanConfig {
        ScanConfig {
            targets: vec!["127.0.0.1".to_string()],
            ports: vec![80, 443],
            ..Default::default()
        }
    }

    #[test]
    fn test_valid_config_passes() {
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn test_empty_targets_rejected() {
        let config = ScanConfig {
            targets: Vec::new(),
            ..valid_config()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_ports_rejected() {
        let config = ScanConfig {
            ports: Vec::new(),
            ..valid_config()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_port_zero_rejected() {
        let config = ScanConfig {
            ports: vec![0, 80],
            ..valid_config()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_rate_rejected() {
        let config = ScanConfig {
            rate: 0,
            ..valid_config()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_timeout_duration() {
        let config = ScanConfig {
            timeout: 1500,
            ..valid_config()
        };
        assert_eq!(config.timeout_duration(), Duration::from_millis(1500));
    }
}
