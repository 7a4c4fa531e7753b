//! CDN classification and the scan-policy filter
//!
//! Scanning arbitrary ports of a CDN edge is wasted traffic: everything
//! terminates at the same proxy. With exclusion enabled, CDN-hosted
//! addresses are restricted to the HTTP(S) ports; classification failures
//! fail open so reachable targets are never silently dropped.

use dashmap::DashMap;
use ipnet::Ipv4Net;
use std::net::Ipv4Addr;

/// Ports still allowed against CDN-hosted addresses.
const CDN_ALLOWED_PORTS: [u16; 2] = [80, 443];

/// Cached classification verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CdnVerdict {
    Cdn,
    NonCdn,
    Unknown,
}

/// Classifies an address as CDN-hosted or not.
pub trait CdnProvider: Send + Sync {
    fn classify(&self, ip: Ipv4Addr) -> Result<bool, String>;
}

/// Built-in provider backed by well-known CDN announcement ranges.
#[derive(Debug)]
pub struct RangeCdnProvider {
    ranges: Vec<Ipv4Net>,
}

/// Published edge ranges of the large CDN operators. Not exhaustive, but
/// wide enough to keep full-range scans off the obvious proxies.
const BUILTIN_CDN_RANGES: &[&str] = &[
    // Cloudflare
    "103.21.244.0/22",
    "103.22.200.0/22",
    "103.31.4.0/22",
    "104.16.0.0/13",
    "104.24.0.0/14",
    "108.162.192.0/18",
    "131.0.72.0/22",
    "141.101.64.0/18",
    "162.158.0.0/15",
    "172.64.0.0/13",
    "173.245.48.0/20",
    "188.114.96.0/20",
    "190.93.240.0/20",
    "197.234.240.0/22",
    "198.41.128.0/17",
    // Fastly
    "151.101.0.0/16",
    "199.232.0.0/16",
    // Akamai
    "23.32.0.0/11",
    "104.64.0.0/10",
    "184.24.0.0/13",
    // CloudFront
    "13.32.0.0/15",
    "13.224.0.0/14",
    "54.230.0.0/16",
    "99.84.0.0/16",
    "205.251.192.0/19",
    // Imperva/Incapsula
    "199.83.128.0/21",
    "198.143.32.0/19",
];

impl RangeCdnProvider {
    pub fn builtin() -> Self {
        Self::from_ranges(
            BUILTIN_CDN_RANGES
                .iter()
                .filter_map(|s| s.parse().ok())
                .collect(),
        )
    }

    pub fn from_ranges(ranges: Vec<Ipv4Net>) -> Self {
        Self { ranges }
    }
}

impl CdnProvider for RangeCdnProvider {
    fn classify(&self, ip: Ipv4Addr) -> Result<bool, String> {
        Ok(self.ranges.iter().any(|net| net.contains(&ip)))
    }
}

/// CDN-aware dispatch filter with verdict caching.
pub struct CdnFilter {
    exclude_cdn: bool,
    provider: Box<dyn CdnProvider>,
    cache: DashMap<Ipv4Addr, CdnVerdict>,
}

impl CdnFilter {
    pub fn new(exclude_cdn: bool) -> Self {
        Self::with_provider(exclude_cdn, Box::new(RangeCdnProvider::builtin()))
    }

    pub fn with_provider(exclude_cdn: bool, provider: Box<dyn CdnProvider>) -> Self {
        Self {
            exclude_cdn,
            provider,
            cache: DashMap::new(),
        }
    }

    /// Scan policy: with exclusion off, everything passes; CDN-hosted
    /// addresses only get the HTTP(S) ports; unknown classifications pass.
    pub fn allow(&self, ip: Ipv4Addr, port: u16) -> bool {
        if !self.exclude_cdn {
            return true;
        }
        match self.verdict(ip) {
            CdnVerdict::Cdn => CDN_ALLOWED_PORTS.contains(&port),
            CdnVerdict::NonCdn | CdnVerdict::Unknown => true,
        }
    }

    fn verdict(&self, ip: Ipv4Addr) -> CdnVerdict {
        if let Some(cached) = self.cache.get(&ip) {
            return *cached;
        }
        let verdict = match self.provider.classify(ip) {
            Ok(true) => CdnVerdict::Cdn,
            Ok(false) => CdnVerdict::NonCdn,
            Err(e) => {
                log::debug!("cdn classification for {} failed: {}", ip, e);
                CdnVerdict::Unknown
            }
        };
        self.cache.insert(ip, verdict);
        verdict
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct AlwaysCdn;
    impl CdnProvider for AlwaysCdn {
        fn classify(&self, _ip: Ipv4Addr) -> Result<bool, String> {
            Ok(true)
        }
    }

    struct FailingProvider;
    impl CdnProvider for FailingProvider {
        fn classify(&self, _ip: Ipv4Addr) -> Result<bool, String> {
            Err("lookup backend down".to_string())
        }
    }

    #[test]
    fn test_disabled_filter_allows_everything() {
        let filter = CdnFilter::with_provider(false, Box::new(AlwaysCdn));
        assert!(filter.allow(Ipv4Addr::new(1, 2, 3, 4), 8080));
    }

    #[test]
    fn test_cdn_hosts_restricted_to_http_ports() {
        let filter = CdnFilter::with_provider(true, Box::new(AlwaysCdn));
        let ip = Ipv4Addr::new(1, 2, 3, 4);
        assert!(filter.allow(ip, 80));
        assert!(filter.allow(ip, 443));
        assert!(!filter.allow(ip, 22));
        assert!(!filter.allow(ip, 8080));
    }

    #[test]
    fn test_classification_failure_fails_open() {
        let filter = CdnFilter::with_provider(true, Box::new(FailingProvider));
        assert!(filter.allow(Ipv4Addr::new(1, 2, 3, 4), 8080));
    }

    #[test]
    fn test_non_cdn_unrestricted() {
        let provider = RangeCdnProvider::from_ranges(vec!["104.16.0.0/13".parse().unwrap()]);
        let filter = CdnFilter::with_provider(true, Box::new(provider));
        assert!(filter.allow(Ipv4Addr::new(10, 0, 0, 1), 22));
        assert!(!filter.allow(Ipv4Addr::new(104, 16, 1, 1), 22));
        assert!(filter.allow(Ipv4Addr::new(104, 16, 1, 1), 443));
    }

    #[test]
    fn test_builtin_ranges_parse() {
        let provider = RangeCdnProvider::builtin();
        assert_eq!(provider.ranges.len(), BUILTIN_CDN_RANGES.len());
    }
}
