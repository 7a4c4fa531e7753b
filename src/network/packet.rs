//! SYN probe crafting and reply parsing

use pnet::packet::ip::IpNextHeaderProtocols;
use pnet::packet::ipv4::{Ipv4Flags, Ipv4Packet, MutableIpv4Packet};
use pnet::packet::tcp::{MutableTcpPacket, TcpFlags, TcpPacket};
use rand::Rng;
use std::net::Ipv4Addr;

const IP_HEADER_LEN: usize = 20;
const TCP_HEADER_LEN: usize = 20;

/// Builder for the IPv4 + TCP SYN probes emitted in raw mode
pub struct SynPacketBuilder {
    source_ip: Ipv4Addr,
    dest_ip: Ipv4Addr,
    source_port: u16,
    dest_port: u16,
    seq_num: u32,
    ip_id: u16,
    window_size: u16,
}

impl SynPacketBuilder {
    pub fn new(source_ip: Ipv4Addr, dest_ip: Ipv4Addr, source_port: u16, dest_port: u16) -> Self {
        let mut rng = rand::thread_rng();
        Self {
            source_ip,
            dest_ip,
            source_port,
            dest_port,
            seq_num: rng.gen(),
            ip_id: rng.gen(),
            window_size: 65535,
        }
    }

    pub fn seq_num(mut self, seq_num: u32) -> Self {
        self.seq_num = seq_num;
        self
    }

    pub fn window_size(mut self, window_size: u16) -> Self {
        self.window_size = window_size;
        self
    }

    /// Build the complete IP + TCP packet
    pub fn build(self) -> Vec<u8> {
        let total_len = IP_HEADER_LEN + TCP_HEADER_LEN;
        let mut packet_buf = vec![0u8; total_len];

        // Build IP header
        {
            let mut ip_packet = MutableIpv4Packet::new(&mut packet_buf[..IP_HEADER_LEN]).unwrap();
            ip_packet.set_version(4);
            ip_packet.set_header_length(5); // 5 * 4 = 20 bytes
            ip_packet.set_total_length(total_len as u16);
            ip_packet.set_identification(self.ip_id);
            ip_packet.set_flags(Ipv4Flags::DontFragment);
            ip_packet.set_ttl(64);
            ip_packet.set_next_level_protocol(IpNextHeaderProtocols::Tcp);
            ip_packet.set_source(self.source_ip);
            ip_packet.set_destination(self.dest_ip);

            let checksum = pnet::packet::ipv4::checksum(&ip_packet.to_immutable());
            ip_packet.set_checksum(checksum);
        }

        // Build TCP header
        {
            let mut tcp_packet = MutableTcpPacket::new(&mut packet_buf[IP_HEADER_LEN..]).unwrap();
            tcp_packet.set_source(self.source_port);
            tcp_packet.set_destination(self.dest_port);
            tcp_packet.set_sequence(self.seq_num);
            tcp_packet.set_acknowledgement(0);
            tcp_packet.set_data_offset(5); // 5 * 4 = 20 bytes
            tcp_packet.set_flags(TcpFlags::SYN);
            tcp_packet.set_window(self.window_size);
            tcp_packet.set_urgent_ptr(0);

            let checksum = pnet::packet::tcp::ipv4_checksum(
                &tcp_packet.to_immutable(),
                &self.source_ip,
                &self.dest_ip,
            );
            tcp_packet.set_checksum(checksum);
        }

        packet_buf
    }
}

/// Parser for inbound raw packets
pub struct PacketParser;

impl PacketParser {
    /// Parse a full IPv4 + TCP reply and extract the relevant fields
    pub fn parse_tcp_reply(packet: &[u8]) -> Option<TcpReply> {
        if packet.len() < IP_HEADER_LEN + TCP_HEADER_LEN {
            return None;
        }

        let ip_packet = Ipv4Packet::new(packet)?;
        if ip_packet.get_next_level_protocol() != IpNextHeaderProtocols::Tcp {
            return None;
        }

        let ip_header_len = (ip_packet.get_header_length() as usize) * 4;
        let tcp_packet = TcpPacket::new(packet.get(ip_header_len..)?)?;

        let flags = tcp_packet.get_flags();
        Some(TcpReply {
            source_ip: ip_packet.get_source(),
            dest_ip: ip_packet.get_destination(),
            source_port: tcp_packet.get_source(),
            dest_port: tcp_packet.get_destination(),
            syn_ack: (flags & (TcpFlags::SYN | TcpFlags::ACK)) == (TcpFlags::SYN | TcpFlags::ACK),
            rst: (flags & TcpFlags::RST) != 0,
        })
    }
}

/// Decoded TCP reply
#[derive(Debug, Clone, Copy)]
pub struct TcpReply {
    pub source_ip: Ipv4Addr,
    pub dest_ip: Ipv4Addr,
    pub source_port: u16,
    pub dest_port: u16,
    syn_ack: bool,
    rst: bool,
}

impl TcpReply {
    pub fn is_syn_ack(&self) -> bool {
        self.syn_ack
    }

    pub fn is_rst(&self) -> bool {
        self.rst
    }
}
