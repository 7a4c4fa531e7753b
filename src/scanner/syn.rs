//! Stateless SYN emitter and background reply collector
//!
//! The emitter runs inline with the rate-limited dispatch loop; crafting and
//! sending a probe never blocks beyond the send syscall. The collector is a
//! background thread that owns the receive half of the raw channel, keeps
//! SYN/ACK replies addressed to our source port, and discards RSTs. No
//! per-flow timers: lost replies are covered by the retry passes and the
//! optional connect-verification step.

use crate::network::packet::{PacketParser, SynPacketBuilder};
use crate::network::protocol::NetworkUtils;
use crate::network::socket;
use crate::scanner::{ScanResults, ScanState};
use crate::ScanError;
use pnet::packet::ipv4::MutableIpv4Packet;
use pnet::packet::Packet;
use pnet::transport::{ipv4_packet_iter, TransportReceiver, TransportSender};
use std::net::{IpAddr, Ipv4Addr};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::JoinHandle;
use std::time::Duration;

const COLLECTOR_POLL: Duration = Duration::from_millis(100);

/// Raw SYN scanner: one send half shared with the dispatcher, one collector
/// thread feeding the result store.
pub struct SynScanner {
    sender: Mutex<TransportSender>,
    receiver: Mutex<Option<TransportReceiver>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    stop: Arc<AtomicBool>,
    source_ip: Ipv4Addr,
    source_port: u16,
    interface: String,
}

impl SynScanner {
    /// Open the raw handlers and resolve the source address.
    ///
    /// Fails when the process lacks raw-socket privilege or no usable source
    /// can be determined.
    pub fn new(source_ip: Option<Ipv4Addr>, interface: Option<String>) -> crate::Result<Self> {
        let (tx, rx) = socket::open_raw_channel()?;
        let (source_ip, interface) = resolve_source(source_ip, interface)?;

        Ok(Self {
            sender: Mutex::new(tx),
            receiver: Mutex::new(Some(rx)),
            workers: Mutex::new(Vec::new()),
            stop: Arc::new(AtomicBool::new(false)),
            source_ip,
            source_port: NetworkUtils::random_source_port(),
            interface,
        })
    }

    /// Start the background collector. Call once before dispatch begins;
    /// subsequent calls are no-ops.
    pub fn start_workers(&self, results: Arc<ScanResults>, state: Arc<ScanState>) {
        let Some(mut rx) = lock(&self.receiver).take() else {
            return;
        };
        let stop = Arc::clone(&self.stop);
        let source_port = self.source_port;

        let handle = std::thread::spawn(move || {
            let mut iter = ipv4_packet_iter(&mut rx);
            while !stop.load(Ordering::Relaxed) {
                match iter.next_with_timeout(COLLECTOR_POLL) {
                    Ok(Some((packet, _addr))) => {
                        let Some(reply) = PacketParser::parse_tcp_reply(packet.packet()) else {
                            continue;
                        };
                        if reply.dest_port != source_port {
                            continue;
                        }
                        // RSTs mean closed; only SYN/ACK marks a listener
                        if !reply.is_syn_ack() {
                            continue;
                        }
                        // Replies landing after Done are dropped
                        if state.is_done() {
                            continue;
                        }
                        if results.add(reply.source_ip, reply.source_port) {
                            log::debug!(
                                "received syn/ack from {}:{}",
                                reply.source_ip,
                                reply.source_port
                            );
                        }
                    }
                    Ok(None) => {}
                    Err(e) => log::debug!("collector read error: {}", e),
                }
            }
        });

        lock(&self.workers).push(handle);
    }

    /// Craft and send one SYN probe to `(ip, port)`.
    pub fn enqueue_syn(&self, ip: Ipv4Addr, port: u16) -> crate::Result<()> {
        let mut buf = SynPacketBuilder::new(self.source_ip, ip, self.source_port, port).build();
        let packet = MutableIpv4Packet::new(&mut buf)
            .ok_or_else(|| ScanError::RawSocketError("probe buffer too small".to_string()))?;

        lock(&self.sender)
            .send_to(packet, IpAddr::V4(ip))
            .map_err(|e| ScanError::NetworkError(e.to_string()))?;
        Ok(())
    }

    /// Signal the collector to exit and join it.
    pub fn shutdown(&self) {
        self.stop.store(true, Ordering::Relaxed);
        for handle in lock(&self.workers).drain(..) {
            let _ = handle.join();
        }
    }

    pub fn source_ip(&self) -> Ipv4Addr {
        self.source_ip
    }

    pub fn source_port(&self) -> u16 {
        self.source_port
    }

    pub fn interface(&self) -> &str {
        &self.interface
    }
}

/// Lock a mutex, recovering from poisoning (a panicked worker must not take
/// the whole scan down with it).
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Pick the source address and interface for raw emission.
///
/// When the user pinned both, they win (after an existence check on the
/// interface). Otherwise the outbound route to a well-known external address
/// decides.
fn resolve_source(
    source_ip: Option<Ipv4Addr>,
    interface: Option<String>,
) -> crate::Result<(Ipv4Addr, String)> {
    if let (Some(ip), Some(name)) = (source_ip, interface.as_deref()) {
        if !NetworkUtils::interface_exists(name) {
            return Err(ScanError::SourceError(format!(
                "interface {} does not exist",
                name
            )));
        }
        return Ok((ip, name.to_string()));
    }

    let ip = match source_ip {
        Some(ip) => ip,
        None => NetworkUtils::local_source_ip()?,
    };
    let name = match interface {
        Some(name) => name,
        None => NetworkUtils::interface_for(ip)?,
    };
    Ok((ip, name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_source_rejects_unknown_interface() {
        let result = resolve_source(
            Some(Ipv4Addr::new(10, 0, 0, 1)),
            Some("does-not-exist0".to_string()),
        );
        assert!(matches!(result, Err(ScanError::SourceError(_))));
    }

    #[test]
    fn test_resolve_source_honors_explicit_pair() {
        // Use a real interface name so the existence check passes
        let Some(iface) = pnet::datalink::interfaces().into_iter().next() else {
            return;
        };
        let ip = Ipv4Addr::new(10, 9, 8, 7);
        let (resolved_ip, resolved_iface) =
            resolve_source(Some(ip), Some(iface.name.clone())).unwrap();
        assert_eq!(resolved_ip, ip);
        assert_eq!(resolved_iface, iface.name);
    }
}
