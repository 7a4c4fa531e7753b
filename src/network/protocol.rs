//! Packet pacing and source-address discovery

use crate::ScanError;
use rand::Rng;
use std::net::Ipv4Addr;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// Well-known address probed to learn the outbound route when the user did
/// not pin a source IP and interface.
pub const EXTERNAL_TUNE_TARGET: &str = "8.8.8.8:80";

/// Token-bucket rate limiter for controlling packet sending rate.
///
/// Capacity is one second's worth of tokens, so a full bucket allows a burst
/// of at most `rate` packets on top of the steady refill.
pub struct RateLimiter {
    rate: u64,
    bucket: Mutex<Bucket>,
}

struct Bucket {
    tokens: f64,
    max_tokens: f64,
    last_refill: Instant,
}

impl RateLimiter {
    pub fn new(packets_per_second: u64) -> Self {
        let rate = packets_per_second.max(1);
        Self {
            rate,
            bucket: Mutex::new(Bucket {
                tokens: rate as f64,
                max_tokens: rate as f64,
                last_refill: Instant::now(),
            }),
        }
    }

    /// Suspend until a token is available, then consume it.
    pub async fn take(&self) {
        loop {
            let delay = {
                let mut bucket = self.bucket.lock().await;
                bucket.refill(self.rate);
                if bucket.tokens >= 1.0 {
                    bucket.tokens -= 1.0;
                    return;
                }
                bucket.delay_until_next(self.rate)
            };
            tokio::time::sleep(delay).await;
        }
    }
}

impl Bucket {
    /// Add tokens based on elapsed time, clamped to the bucket capacity.
    fn refill(&mut self, rate: u64) {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();

        let tokens_to_add = elapsed * rate as f64;
        if tokens_to_add.is_finite() && tokens_to_add >= 0.0 {
            self.tokens = (self.tokens + tokens_to_add).min(self.max_tokens);
        }

        self.last_refill = now;
    }

    /// Time until the next token becomes available.
    fn delay_until_next(&self, rate: u64) -> Duration {
        let needed_tokens = 1.0 - self.tokens;
        let delay_secs = needed_tokens / rate as f64;

        if delay_secs.is_finite() && delay_secs > 0.0 && delay_secs <= 60.0 {
            Duration::from_secs_f64(delay_secs)
        } else {
            Duration::from_millis(1)
        }
    }
}

/// Network utilities
pub struct NetworkUtils;

impl NetworkUtils {
    /// Discover the outbound source address via the host routing table.
    ///
    /// A connected UDP socket never sends a packet; the kernel just picks
    /// the route and local address for the well-known external target.
    pub fn local_source_ip() -> crate::Result<Ipv4Addr> {
        let socket = std::net::UdpSocket::bind("0.0.0.0:0")
            .map_err(|e| ScanError::SourceError(e.to_string()))?;
        socket
            .connect(EXTERNAL_TUNE_TARGET)
            .map_err(|e| ScanError::SourceError(e.to_string()))?;

        let local_addr = socket
            .local_addr()
            .map_err(|e| ScanError::SourceError(e.to_string()))?;

        match local_addr.ip() {
            std::net::IpAddr::V4(ipv4) => Ok(ipv4),
            std::net::IpAddr::V6(_) => Err(ScanError::SourceError(
                "IPv6 source addresses are not supported".to_string(),
            )),
        }
    }

    /// Name of the interface that carries the given source address.
    pub fn interface_for(ip: Ipv4Addr) -> crate::Result<String> {
        pnet::datalink::interfaces()
            .into_iter()
            .find(|iface| iface.ips.iter().any(|net| net.ip() == std::net::IpAddr::V4(ip)))
            .map(|iface| iface.name)
            .ok_or_else(|| {
                ScanError::SourceError(format!("no interface carries source address {}", ip))
            })
    }

    /// Check that the given interface name exists on this host.
    pub fn interface_exists(name: &str) -> bool {
        pnet::datalink::interfaces()
            .iter()
            .any(|iface| iface.name == name)
    }

    /// Generate a random ephemeral source port
    pub fn random_source_port() -> u16 {
        let mut rng = rand::thread_rng();
        rng.gen_range(32768..65535)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_full_bucket_bursts_without_waiting() {
        let limiter = RateLimiter::new(100);
        let start = Instant::now();
        for _ in 0..100 {
            limiter.take().await;
        }
        // A full bucket admits one second's worth immediately
        assert!(start.elapsed() < Duration::from_millis(500));
    }

    #[tokio::test]
    async fn test_rate_ceiling_over_window() {
        let limiter = RateLimiter::new(100);
        let start = Instant::now();
        // 250 takes = 100 burst + 150 refilled, so at least ~1.5 s elapse
        for _ in 0..250 {
            limiter.take().await;
        }
        assert!(start.elapsed() >= Duration::from_millis(1300));
    }

    #[test]
    fn test_random_source_port_is_ephemeral() {
        for _ in 0..100 {
            let port = NetworkUtils::random_source_port();
            assert!((32768..65535).contains(&port));
        }
    }

    #[test]
    fn test_zero_rate_clamped() {
        // Construction with 0 must not divide by zero later
        let limiter = RateLimiter::new(0);
        assert_eq!(limiter.rate, 1);
    }
}
