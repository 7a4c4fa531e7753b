//! Raw socket acquisition for the SYN scan path

use crate::ScanError;
use pnet::packet::ip::IpNextHeaderProtocols;
use pnet::transport::{
    transport_channel, TransportChannelType, TransportReceiver, TransportSender,
};
use std::io;

const TRANSPORT_BUFFER_SIZE: usize = 4096;

/// Check whether the process holds raw-socket privilege.
pub fn has_raw_socket_privilege() -> bool {
    #[cfg(unix)]
    {
        unsafe { libc::geteuid() == 0 }
    }
    #[cfg(not(unix))]
    {
        false
    }
}

/// Open a Layer-3 transport channel pair for raw TCP.
///
/// The sender carries complete IPv4 packets (so the source address is under
/// our control); the receiver yields inbound IPv4 packets for the collector.
pub fn open_raw_channel() -> crate::Result<(TransportSender, TransportReceiver)> {
    transport_channel(
        TRANSPORT_BUFFER_SIZE,
        TransportChannelType::Layer3(IpNextHeaderProtocols::Tcp),
    )
    .map_err(|e| {
        if e.kind() == io::ErrorKind::PermissionDenied {
            ScanError::PermissionError(
                "raw socket requires root or CAP_NET_RAW".to_string(),
            )
        } else {
            ScanError::RawSocketError(e.to_string())
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unprivileged_channel_fails_cleanly() {
        // Either we are root (channel opens) or we get a typed error;
        // this must never panic.
        match open_raw_channel() {
            Ok(_) => assert!(has_raw_socket_privilege()),
            Err(e) => assert!(matches!(
                e,
                ScanError::PermissionError(_) | ScanError::RawSocketError(_)
            )),
        }
    }
}
