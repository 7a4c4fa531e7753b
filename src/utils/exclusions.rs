//! Excluded-address filter
//!
//! Exclusions are never subtracted from the target index; the dispatch loop
//! rejects matching pairs instead.

use crate::ScanError;
use ipnet::Ipv4Net;
use std::collections::HashSet;
use std::net::Ipv4Addr;

/// Addresses the dispatcher must never probe.
#[derive(Debug, Default)]
pub struct AddressExclusions {
    addresses: HashSet<Ipv4Addr>,
    ranges: Vec<(Ipv4Addr, Ipv4Addr)>,
    networks: Vec<Ipv4Net>,
}

impl AddressExclusions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a filter from exclusion entries: single IPs, `start-end`
    /// ranges, or CIDRs.
    pub fn parse(entries: &[String]) -> crate::Result<Self> {
        let mut exclusions = Self::new();
        for entry in entries {
            let entry = entry.trim();
            if !entry.is_empty() {
                exclusions.add_entry(entry)?;
            }
        }
        Ok(exclusions)
    }

    /// Add a single exclusion entry.
    pub fn add_entry(&mut self, entry: &str) -> crate::Result<()> {
        if entry.contains('/') {
            let net: Ipv4Net = entry.parse().map_err(|_| {
                ScanError::InvalidTarget(format!("invalid excluded CIDR: {}", entry))
            })?;
            self.networks.push(net);
        } else if let Some((start, end)) = entry.split_once('-') {
            let start: Ipv4Addr = start.trim().parse().map_err(|_| {
                ScanError::InvalidTarget(format!("invalid excluded range start: {}", entry))
            })?;
            let end: Ipv4Addr = end.trim().parse().map_err(|_| {
                ScanError::InvalidTarget(format!("invalid excluded range end: {}", entry))
            })?;
            if start > end {
                return Err(ScanError::InvalidTarget(format!(
                    "excluded range is reversed: {}",
                    entry
                )));
            }
            self.ranges.push((start, end));
        } else {
            let addr: Ipv4Addr = entry.parse().map_err(|_| {
                ScanError::InvalidTarget(format!("invalid excluded address: {}", entry))
            })?;
            self.addresses.insert(addr);
        }
        Ok(())
    }

    /// True when the address must be skipped.
    pub fn is_excluded(&self, addr: Ipv4Addr) -> bool {
        if self.addresses.contains(&addr) {
            return true;
        }
        if self.ranges.iter().any(|(start, end)| addr >= *start && addr <= *end) {
            return true;
        }
        self.networks.iter().any(|net| net.contains(&addr))
    }

    pub fn is_empty(&self) -> bool {
        self.addresses.is_empty() && self.ranges.is_empty() && self.networks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_address() {
        let exclusions =
            AddressExclusions::parse(&["10.0.0.5".to_string()]).unwrap();
        assert!(exclusions.is_excluded(Ipv4Addr::new(10, 0, 0, 5)));
        assert!(!exclusions.is_excluded(Ipv4Addr::new(10, 0, 0, 6)));
    }

    #[test]
    fn test_range() {
        let exclusions =
            AddressExclusions::parse(&["10.0.0.10-10.0.0.20".to_string()]).unwrap();
        assert!(exclusions.is_excluded(Ipv4Addr::new(10, 0, 0, 10)));
        assert!(exclusions.is_excluded(Ipv4Addr::new(10, 0, 0, 20)));
        assert!(!exclusions.is_excluded(Ipv4Addr::new(10, 0, 0, 21)));
    }

    #[test]
    fn test_cidr() {
        let exclusions =
            AddressExclusions::parse(&["192.168.0.0/24".to_string()]).unwrap();
        assert!(exclusions.is_excluded(Ipv4Addr::new(192, 168, 0, 200)));
        assert!(!exclusions.is_excluded(Ipv4Addr::new(192, 168, 1, 1)));
    }

    #[test]
    fn test_invalid_entries_rejected() {
        assert!(AddressExclusions::parse(&["not-an-ip".to_string()]).is_err());
        assert!(AddressExclusions::parse(&["10.0.0.20-10.0.0.10".to_string()]).is_err());
        assert!(AddressExclusions::parse(&["10.0.0.0/33".to_string()]).is_err());
    }

    #[test]
    fn test_empty_filter_excludes_nothing() {
        let exclusions = AddressExclusions::new();
        assert!(exclusions.is_empty());
        assert!(!exclusions.is_excluded(Ipv4Addr::new(8, 8, 8, 8)));
    }
}
