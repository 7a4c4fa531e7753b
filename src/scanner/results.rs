//! Concurrent store of discovered (ip, port) pairs

use dashmap::DashMap;
use std::collections::BTreeSet;
use std::net::Ipv4Addr;

/// Set of open (ip, port) tuples discovered during a scan.
///
/// All mutation goes through entry-level operations on a sharded map, so the
/// connect workers and the SYN collector can insert concurrently without a
/// coarse lock. Iteration via [`snapshot`](Self::snapshot) is only meaningful
/// once the scan state has reached `Done`.
#[derive(Debug, Default)]
pub struct ScanResults {
    ports: DashMap<Ipv4Addr, BTreeSet<u16>>,
}

impl ScanResults {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an open port. Returns false when the pair was already present.
    pub fn add(&self, ip: Ipv4Addr, port: u16) -> bool {
        self.ports.entry(ip).or_default().insert(port)
    }

    /// True when the pair has already been recorded.
    pub fn has(&self, ip: Ipv4Addr, port: u16) -> bool {
        self.ports.get(&ip).map_or(false, |set| set.contains(&port))
    }

    /// Replace a host's entire port set (used by the verification pass).
    /// An empty set drops the host from the results.
    pub fn set_ports(&self, ip: Ipv4Addr, ports: BTreeSet<u16>) {
        if ports.is_empty() {
            self.ports.remove(&ip);
        } else {
            self.ports.insert(ip, ports);
        }
    }

    /// Current port set of a host, if any.
    pub fn ports_of(&self, ip: Ipv4Addr) -> Option<BTreeSet<u16>> {
        self.ports.get(&ip).map(|set| set.clone())
    }

    /// Stable, ip-ordered snapshot of the results.
    pub fn snapshot(&self) -> Vec<(Ipv4Addr, BTreeSet<u16>)> {
        let mut entries: Vec<_> = self
            .ports
            .iter()
            .map(|entry| (*entry.key(), entry.value().clone()))
            .collect();
        entries.sort_by_key(|(ip, _)| u32::from(*ip));
        entries
    }

    pub fn host_count(&self) -> usize {
        self.ports.len()
    }

    pub fn total_ports(&self) -> usize {
        self.ports.iter().map(|entry| entry.value().len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.ports.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_add_and_has() {
        let results = ScanResults::new();
        let ip = Ipv4Addr::new(10, 0, 0, 2);

        assert!(!results.has(ip, 80));
        assert!(results.add(ip, 80));
        assert!(results.has(ip, 80));
        // Duplicate insert reports false
        assert!(!results.add(ip, 80));
        assert_eq!(results.total_ports(), 1);
    }

    #[test]
    fn test_set_ports_replaces() {
        let results = ScanResults::new();
        let ip = Ipv4Addr::new(10, 0, 0, 2);
        results.add(ip, 80);
        results.add(ip, 81);

        results.set_ports(ip, BTreeSet::from([80]));
        assert_eq!(results.ports_of(ip), Some(BTreeSet::from([80])));

        results.set_ports(ip, BTreeSet::new());
        assert!(results.is_empty());
    }

    #[test]
    fn test_snapshot_ordered_by_ip() {
        let results = ScanResults::new();
        results.add(Ipv4Addr::new(10, 0, 0, 9), 22);
        results.add(Ipv4Addr::new(10, 0, 0, 1), 80);
        results.add(Ipv4Addr::new(10, 0, 0, 5), 443);

        let snapshot = results.snapshot();
        let ips: Vec<_> = snapshot.iter().map(|(ip, _)| *ip).collect();
        assert_eq!(
            ips,
            vec![
                Ipv4Addr::new(10, 0, 0, 1),
                Ipv4Addr::new(10, 0, 0, 5),
                Ipv4Addr::new(10, 0, 0, 9),
            ]
        );
    }

    #[test]
    fn test_concurrent_adds_deduplicate() {
        let results = Arc::new(ScanResults::new());
        let ip = Ipv4Addr::new(192, 168, 1, 1);

        let mut handles = Vec::new();
        for _ in 0..8 {
            let results = Arc::clone(&results);
            handles.push(std::thread::spawn(move || {
                for port in 1..=100u16 {
                    results.add(ip, port);
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }

        // Eight producers inserting the same 100 pairs leave exactly 100
        assert_eq!(results.total_ports(), 100);
        assert_eq!(results.host_count(), 1);
    }
}
