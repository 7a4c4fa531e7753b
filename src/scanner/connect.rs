//! Connect-mode probing

use std::collections::BTreeSet;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::task::JoinSet;
use tokio::time::timeout;

/// Probe a single port with a full three-way handshake.
///
/// A completed connect counts as open; every error and the timeout count as
/// closed. Transient failures are logged at debug and swallowed.
pub async fn connect_port(ip: Ipv4Addr, port: u16, connect_timeout: Duration) -> bool {
    let addr = SocketAddr::new(IpAddr::V4(ip), port);

    match timeout(connect_timeout, TcpStream::connect(addr)).await {
        Ok(Ok(stream)) => {
            drop(stream);
            true
        }
        Ok(Err(e)) => {
            log::debug!("connect {}:{} failed: {}", ip, port, e);
            false
        }
        Err(_) => false,
    }
}

/// Re-probe a host's discovered ports concurrently; returns the subset that
/// still completes a handshake.
pub async fn connect_verify(
    ip: Ipv4Addr,
    ports: BTreeSet<u16>,
    connect_timeout: Duration,
) -> BTreeSet<u16> {
    let mut tasks = JoinSet::new();
    for port in ports {
        tasks.spawn(async move { (port, connect_port(ip, port, connect_timeout).await) });
    }

    let mut verified = BTreeSet::new();
    while let Some(res) = tasks.join_next().await {
        if let Ok((port, true)) = res {
            verified.insert(port);
        }
    }
    verified
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    async fn local_listener() -> (TcpListener, u16) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        (listener, port)
    }

    #[tokio::test]
    async fn test_connect_port_open() {
        let (_listener, port) = local_listener().await;
        assert!(connect_port(Ipv4Addr::LOCALHOST, port, Duration::from_millis(500)).await);
    }

    #[tokio::test]
    async fn test_connect_port_closed() {
        // Below the ephemeral range; nothing listens there in tests
        assert!(!connect_port(Ipv4Addr::LOCALHOST, 19989, Duration::from_millis(500)).await);
    }

    #[tokio::test]
    async fn test_connect_verify_keeps_only_live_ports() {
        let (_listener, open_port) = local_listener().await;
        let closed_port = 19988;

        let candidates = BTreeSet::from([open_port, closed_port]);
        let verified =
            connect_verify(Ipv4Addr::LOCALHOST, candidates, Duration::from_millis(500)).await;

        assert_eq!(verified, BTreeSet::from([open_port]));
    }
}
