//! Synthetic frames for tests.
//!
//! Test-only: compiled for this crate's tests and, for other crates, only
//! with the `test-support` feature. Every builder panics on an unparsable
//! address; callers pass literals.

use std::net::Ipv4Addr;

use crate::frame::{Frame, LinkType, IP_PROTO_TCP, IP_PROTO_UDP};

pub use crate::classify::tcp_flags::{ACK, CWR, ECE, FIN, NS, PSH, RST, SYN, URG};

const IP_PROTO_ICMP: u8 = 1;
const SRC_MAC: [u8; 6] = [0x02, 0x00, 0x00, 0x00, 0x00, 0x01];
const DST_MAC: [u8; 6] = [0x02, 0x00, 0x00, 0x00, 0x00, 0x02];

fn addr(s: &str) -> Ipv4Addr {
    s.parse().expect("synthetic frame address must be a valid IPv4 literal")
}

fn ethernet(ethertype: u16, payload: &[u8]) -> Frame {
    let mut data = Vec::with_capacity(14 + payload.len());
    data.extend_from_slice(&DST_MAC);
    data.extend_from_slice(&SRC_MAC);
    data.extend_from_slice(&ethertype.to_be_bytes());
    data.extend_from_slice(payload);
    Frame::new(LinkType::Ethernet, data)
}

fn ipv4(src: &str, dst: &str, protocol: u8, payload: &[u8]) -> Vec<u8> {
    let total_len = (20 + payload.len()) as u16;
    let mut packet = Vec::with_capacity(usize::from(total_len));
    packet.push(0x45);
    packet.push(0);
    packet.extend_from_slice(&total_len.to_be_bytes());
    packet.extend_from_slice(&[0x00, 0x01]); // identification
    packet.extend_from_slice(&[0x40, 0x00]); // DF, offset 0
    packet.push(64);
    packet.push(protocol);
    packet.extend_from_slice(&[0x00, 0x00]); // checksum is not verified
    packet.extend_from_slice(&addr(src).octets());
    packet.extend_from_slice(&addr(dst).octets());
    packet.extend_from_slice(payload);
    packet
}

/// Ethernet + IPv4 + TCP frame with the given flag bits.
pub fn tcp_frame(src: &str, dst: &str, flags: u16) -> Frame {
    let mut segment = Vec::with_capacity(20);
    segment.extend_from_slice(&40000u16.to_be_bytes());
    segment.extend_from_slice(&443u16.to_be_bytes());
    segment.extend_from_slice(&1u32.to_be_bytes()); // seq
    segment.extend_from_slice(&0u32.to_be_bytes()); // ack
    segment.push(0x50 | ((flags >> 8) as u8 & 0x01));
    segment.push(flags as u8);
    segment.extend_from_slice(&65535u16.to_be_bytes());
    segment.extend_from_slice(&[0, 0, 0, 0]);
    ethernet(0x0800, &ipv4(src, dst, IP_PROTO_TCP, &segment))
}

/// Ethernet + IPv4 + UDP frame with a small payload.
pub fn udp_frame(src: &str, dst: &str) -> Frame {
    let payload = b"netguard";
    let mut datagram = Vec::with_capacity(8 + payload.len());
    datagram.extend_from_slice(&53000u16.to_be_bytes());
    datagram.extend_from_slice(&53u16.to_be_bytes());
    datagram.extend_from_slice(&((8 + payload.len()) as u16).to_be_bytes());
    datagram.extend_from_slice(&[0, 0]);
    datagram.extend_from_slice(payload);
    ethernet(0x0800, &ipv4(src, dst, IP_PROTO_UDP, &datagram))
}

/// Ethernet + IPv4 + ICMP echo request.
pub fn icmp_frame(src: &str, dst: &str) -> Frame {
    let echo = [8, 0, 0, 0, 0, 1, 0, 1];
    ethernet(0x0800, &ipv4(src, dst, IP_PROTO_ICMP, &echo))
}

/// Ethernet ARP request. Carries no IP layer.
pub fn arp_frame() -> Frame {
    let mut arp = vec![0x00, 0x01, 0x08, 0x00, 6, 4, 0x00, 0x01];
    arp.extend_from_slice(&SRC_MAC);
    arp.extend_from_slice(&[10, 0, 0, 1]);
    arp.extend_from_slice(&[0; 6]);
    arp.extend_from_slice(&[10, 0, 0, 2]);
    ethernet(0x0806, &arp)
}
