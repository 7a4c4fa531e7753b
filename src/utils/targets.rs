//! Target ingest and indexed addressing over coalesced ranges
//!
//! The index never materializes individual addresses: the dispatch loop
//! addresses the flattened host space by logical index and `ip_of` resolves
//! it through prefix sums over the coalesced ranges.

use crate::ScanError;
use ipnet::Ipv4Net;
use std::collections::HashMap;
use std::net::{Ipv4Addr, ToSocketAddrs};
use std::path::Path;

/// Sentinel name meaning "no name known - emit the literal IP".
pub const NO_NAME_SENTINEL: &str = "ip";

/// Contiguous IPv4 range: `count` addresses starting at `base`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetRange {
    pub base: u32,
    pub count: u32,
}

impl TargetRange {
    fn end(&self) -> u64 {
        u64::from(self.base) + u64::from(self.count)
    }
}

/// Coalesced, indexable view of the target address space.
#[derive(Debug, Default)]
pub struct TargetIndex {
    ranges: Vec<TargetRange>,
    prefix: Vec<u64>,
    total: u64,
    fqdns: HashMap<Ipv4Addr, Vec<String>>,
}

impl TargetIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a range. Call [`coalesce`](Self::coalesce) once after ingest.
    pub fn add(&mut self, range: TargetRange) {
        if range.count > 0 {
            self.ranges.push(range);
        }
    }

    pub fn add_ip(&mut self, ip: Ipv4Addr) {
        self.add(TargetRange {
            base: u32::from(ip),
            count: 1,
        });
    }

    pub fn add_net(&mut self, net: Ipv4Net) -> crate::Result<()> {
        if net.prefix_len() == 0 {
            return Err(ScanError::InvalidTarget(
                "0.0.0.0/0 is not a scannable target".to_string(),
            ));
        }
        self.add(TargetRange {
            base: u32::from(net.network()),
            count: (1u64 << (32 - net.prefix_len())) as u32,
        });
        Ok(())
    }

    /// Record a resolved name for an address, for output-time reverse lookup.
    pub fn add_name(&mut self, ip: Ipv4Addr, name: &str) {
        let names = self.fqdns.entry(ip).or_default();
        if !names.iter().any(|n| n == name) {
            names.push(name.to_string());
        }
    }

    /// Merge overlapping and adjacent ranges and rebuild the prefix sums.
    /// Called once after ingest; `ip_of` is only valid afterwards.
    pub fn coalesce(&mut self) {
        self.ranges.sort_by_key(|r| r.base);

        let mut merged: Vec<TargetRange> = Vec::with_capacity(self.ranges.len());
        for range in self.ranges.drain(..) {
            match merged.last_mut() {
                Some(last) if u64::from(range.base) <= last.end() => {
                    let span = last.end().max(range.end()) - u64::from(last.base);
                    // A merge spanning the entire IPv4 space would overflow
                    // the count; clamping drops only the broadcast address.
                    last.count = span.min(u64::from(u32::MAX)) as u32;
                }
                _ => merged.push(range),
            }
        }
        self.ranges = merged;

        self.prefix.clear();
        let mut total = 0u64;
        for range in &self.ranges {
            self.prefix.push(total);
            total += u64::from(range.count);
        }
        self.total = total;
    }

    /// Total addressable hosts.
    pub fn count(&self) -> u64 {
        self.total
    }

    /// The i-th host of the flattened space, in O(log R).
    pub fn ip_of(&self, index: u64) -> Option<Ipv4Addr> {
        if index >= self.total {
            return None;
        }
        let slot = self.prefix.partition_point(|&start| start <= index) - 1;
        let range = &self.ranges[slot];
        let offset = index - self.prefix[slot];
        Some(Ipv4Addr::from(range.base + offset as u32))
    }

    /// Names recorded for an address at ingest; the sentinel when none.
    pub fn fqdn_of(&self, ip: Ipv4Addr) -> Vec<String> {
        match self.fqdns.get(&ip) {
            Some(names) => names.clone(),
            None => vec![NO_NAME_SENTINEL.to_string()],
        }
    }

    pub fn ranges(&self) -> &[TargetRange] {
        &self.ranges
    }
}

/// Ingest of target strings: IPv4 literals, CIDRs, hostnames, or files
/// containing one target per line.
#[derive(Debug, Default)]
pub struct TargetLoader;

impl TargetLoader {
    pub fn load(&self, targets: &[String]) -> crate::Result<TargetIndex> {
        let mut index = TargetIndex::new();
        for target in targets {
            self.load_one(&mut index, target.trim(), true)?;
        }
        Ok(index)
    }

    fn load_one(&self, index: &mut TargetIndex, target: &str, allow_files: bool) -> crate::Result<()> {
        if target.is_empty() || target.starts_with('#') {
            return Ok(());
        }

        if let Ok(ip) = target.parse::<Ipv4Addr>() {
            index.add_ip(ip);
            return Ok(());
        }

        if let Ok(net) = target.parse::<Ipv4Net>() {
            return index.add_net(net);
        }

        let path = Path::new(target);
        if allow_files && path.is_file() {
            let contents = std::fs::read_to_string(path).map_err(|e| {
                ScanError::InvalidTarget(format!("could not read target list {}: {}", target, e))
            })?;
            for line in contents.lines() {
                self.load_one(index, line.trim(), false)?;
            }
            return Ok(());
        }

        // Hostname: resolve now, keep the name for output. A miss skips the
        // host rather than aborting the run.
        match (target, 0u16).to_socket_addrs() {
            Ok(addrs) => {
                let mut found = false;
                for addr in addrs {
                    if let std::net::IpAddr::V4(ip) = addr.ip() {
                        index.add_ip(ip);
                        index.add_name(ip, target);
                        found = true;
                    }
                }
                if !found {
                    log::warn!("no IPv4 address for {}, skipping", target);
                }
            }
            Err(e) => log::warn!("could not resolve {}: {}, skipping", target, e),
        }
        Ok(())
    }
}
