//! Link-layer frames and the layer summary extracted from them.
//!
//! Decoding stops at the transport header: only what classification needs is
//! read (IPv4 addresses, transport protocol, TCP flag bits).

use std::net::Ipv4Addr;

use thiserror::Error;

const ETHERNET_HEADER_LEN: usize = 14;
const VLAN_TAG_LEN: usize = 4;
const MAX_VLAN_TAGS: usize = 2;
const SLL_HEADER_LEN: usize = 16;
const IPV4_MIN_HEADER_LEN: usize = 20;

const ETHERTYPE_IPV4: u16 = 0x0800;
const ETHERTYPE_VLAN: u16 = 0x8100;
const ETHERTYPE_QINQ: u16 = 0x88a8;

pub const IP_PROTO_TCP: u8 = 6;
pub const IP_PROTO_UDP: u8 = 17;

/// Link-layer framing of captured bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkType {
    /// Ethernet II, optionally 802.1Q / 802.1ad tagged.
    Ethernet,
    /// Linux cooked capture (the `any` pseudo-device).
    LinuxSll,
    /// Bare IP packets with no link header.
    RawIp,
    /// Any other DLT value. Never carries an IP layer we can read.
    Unknown(i32),
}

/// One captured frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub link_type: LinkType,
    /// Captured bytes (at most the snap length).
    pub data: Vec<u8>,
    /// Length of the frame on the wire.
    pub wire_len: u32,
}

impl Frame {
    pub fn new(link_type: LinkType, data: Vec<u8>) -> Self {
        let wire_len = data.len() as u32;
        Self {
            link_type,
            data,
            wire_len,
        }
    }

    /// Total captured size in bytes.
    pub fn captured_len(&self) -> usize {
        self.data.len()
    }

    /// Decode the layers of this frame.
    pub fn decode(&self) -> Result<LayerInfo, DecodeError> {
        decode(self.link_type, &self.data)
    }
}

/// Errors decoding a frame that claims to carry IPv4.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("truncated link header: {len} bytes")]
    TruncatedLink { len: usize },

    #[error("truncated IPv4 header: {len} bytes")]
    TruncatedIpv4 { len: usize },

    #[error("bad IPv4 version {0}")]
    BadVersion(u8),

    #[error("bad IPv4 header length {ihl} words for {len} bytes")]
    BadHeaderLength { ihl: u8, len: usize },
}

/// IPv4 addressing of a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ipv4Layer {
    pub src: Ipv4Addr,
    pub dst: Ipv4Addr,
    pub protocol: u8,
}

/// Transport layer present in a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    /// TCP. `flags` is `None` when the header was cut short before the
    /// flag bytes.
    Tcp { flags: Option<u16> },
    Udp,
    None,
}

/// Layers found in a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayerInfo {
    pub ipv4: Option<Ipv4Layer>,
    pub transport: Transport,
}

impl LayerInfo {
    /// A frame with no IP layer.
    pub const NON_IP: LayerInfo = LayerInfo {
        ipv4: None,
        transport: Transport::None,
    };

    pub fn has_ip(&self) -> bool {
        self.ipv4.is_some()
    }
}

fn read_u16(data: &[u8], offset: usize) -> u16 {
    u16::from_be_bytes([data[offset], data[offset + 1]])
}

/// Decode `data` framed as `link_type`.
///
/// Frames that do not carry IPv4 decode to [`LayerInfo::NON_IP`]. A frame that
/// claims IPv4 but has a broken header is an error.
pub fn decode(link_type: LinkType, data: &[u8]) -> Result<LayerInfo, DecodeError> {
    match link_type {
        LinkType::Ethernet => decode_ethernet(data),
        LinkType::LinuxSll => {
            if data.len() < SLL_HEADER_LEN {
                return Err(DecodeError::TruncatedLink { len: data.len() });
            }
            if read_u16(data, 14) != ETHERTYPE_IPV4 {
                return Ok(LayerInfo::NON_IP);
            }
            decode_ipv4(&data[SLL_HEADER_LEN..])
        }
        LinkType::RawIp => match data.first() {
            Some(b) if b >> 4 == 4 => decode_ipv4(data),
            _ => Ok(LayerInfo::NON_IP),
        },
        LinkType::Unknown(_) => Ok(LayerInfo::NON_IP),
    }
}

fn decode_ethernet(data: &[u8]) -> Result<LayerInfo, DecodeError> {
    if data.len() < ETHERNET_HEADER_LEN {
        return Err(DecodeError::TruncatedLink { len: data.len() });
    }

    let mut ethertype = read_u16(data, 12);
    let mut offset = ETHERNET_HEADER_LEN;
    let mut tags = 0;
    while (ethertype == ETHERTYPE_VLAN || ethertype == ETHERTYPE_QINQ) && tags < MAX_VLAN_TAGS {
        if data.len() < offset + VLAN_TAG_LEN {
            return Err(DecodeError::TruncatedLink { len: data.len() });
        }
        ethertype = read_u16(data, offset + 2);
        offset += VLAN_TAG_LEN;
        tags += 1;
    }

    if ethertype != ETHERTYPE_IPV4 {
        return Ok(LayerInfo::NON_IP);
    }
    decode_ipv4(&data[offset..])
}

fn decode_ipv4(packet: &[u8]) -> Result<LayerInfo, DecodeError> {
    if packet.len() < IPV4_MIN_HEADER_LEN {
        return Err(DecodeError::TruncatedIpv4 { len: packet.len() });
    }

    let version = packet[0] >> 4;
    if version != 4 {
        return Err(DecodeError::BadVersion(version));
    }

    let ihl = packet[0] & 0x0f;
    let header_len = usize::from(ihl) * 4;
    if header_len < IPV4_MIN_HEADER_LEN || header_len > packet.len() {
        return Err(DecodeError::BadHeaderLength {
            ihl,
            len: packet.len(),
        });
    }

    let protocol = packet[9];
    let src = Ipv4Addr::new(packet[12], packet[13], packet[14], packet[15]);
    let dst = Ipv4Addr::new(packet[16], packet[17], packet[18], packet[19]);
    let ipv4 = Ipv4Layer { src, dst, protocol };

    // Non-first fragments carry no transport header.
    let fragment_offset = read_u16(packet, 6) & 0x1fff;
    if fragment_offset != 0 {
        return Ok(LayerInfo {
            ipv4: Some(ipv4),
            transport: Transport::None,
        });
    }

    let segment = &packet[header_len..];
    let transport = match protocol {
        IP_PROTO_TCP => Transport::Tcp {
            flags: (segment.len() >= 14)
                .then(|| (u16::from(segment[12] & 0x01) << 8) | u16::from(segment[13])),
        },
        IP_PROTO_UDP => Transport::Udp,
        _ => Transport::None,
    };

    Ok(LayerInfo {
        ipv4: Some(ipv4),
        transport,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synth;

    fn ip(s: &str) -> Ipv4Addr {
        s.parse().expect("valid address")
    }

    // ===========================================
    // Ethernet
    // ===========================================

    #[test]
    fn test_decode_ethernet_tcp() {
        let frame = synth::tcp_frame("10.0.0.1", "10.0.0.2", synth::SYN | synth::ACK);
        let info = frame.decode().expect("decode");

        let ipv4 = info.ipv4.expect("ipv4 layer");
        assert_eq!(ipv4.src, ip("10.0.0.1"));
        assert_eq!(ipv4.dst, ip("10.0.0.2"));
        assert_eq!(info.transport, Transport::Tcp { flags: Some(0x12) });
    }

    #[test]
    fn test_decode_ethernet_udp() {
        let frame = synth::udp_frame("192.168.1.10", "8.8.8.8");
        let info = frame.decode().expect("decode");
        assert_eq!(info.transport, Transport::Udp);
        assert_eq!(info.ipv4.expect("ipv4").dst, ip("8.8.8.8"));
    }

    #[test]
    fn test_decode_ethernet_icmp_has_no_transport() {
        let frame = synth::icmp_frame("10.0.0.1", "10.0.0.2");
        let info = frame.decode().expect("decode");
        assert!(info.has_ip());
        assert_eq!(info.transport, Transport::None);
    }

    #[test]
    fn test_decode_arp_is_non_ip() {
        let info = synth::arp_frame().decode().expect("decode");
        assert_eq!(info, LayerInfo::NON_IP);
    }

    #[test]
    fn test_decode_ipv6_ethertype_is_non_ip() {
        let mut data = vec![0u8; 60];
        data[12] = 0x86;
        data[13] = 0xdd;
        let info = decode(LinkType::Ethernet, &data).expect("decode");
        assert!(!info.has_ip());
    }

    #[test]
    fn test_decode_vlan_tagged() {
        let inner = synth::tcp_frame("10.1.1.1", "10.1.1.2", synth::SYN);
        let mut data = inner.data[..12].to_vec();
        data.extend_from_slice(&[0x81, 0x00, 0x00, 0x64]);
        data.extend_from_slice(&inner.data[12..]);

        let info = decode(LinkType::Ethernet, &data).expect("decode");
        assert_eq!(info.ipv4.expect("ipv4").src, ip("10.1.1.1"));
        assert_eq!(info.transport, Transport::Tcp { flags: Some(0x02) });
    }

    #[test]
    fn test_decode_double_vlan_tagged() {
        let inner = synth::udp_frame("10.1.1.1", "10.1.1.2");
        let mut data = inner.data[..12].to_vec();
        data.extend_from_slice(&[0x88, 0xa8, 0x00, 0x0a]);
        data.extend_from_slice(&[0x81, 0x00, 0x00, 0x64]);
        data.extend_from_slice(&inner.data[12..]);

        let info = decode(LinkType::Ethernet, &data).expect("decode");
        assert_eq!(info.transport, Transport::Udp);
    }

    #[test]
    fn test_decode_truncated_ethernet() {
        let err = decode(LinkType::Ethernet, &[0u8; 10]).unwrap_err();
        assert_eq!(err, DecodeError::TruncatedLink { len: 10 });
    }

    // ===========================================
    // IPv4 validation
    // ===========================================

    #[test]
    fn test_decode_truncated_ipv4() {
        let frame = synth::tcp_frame("10.0.0.1", "10.0.0.2", synth::SYN);
        let err = decode(LinkType::Ethernet, &frame.data[..20]).unwrap_err();
        assert_eq!(err, DecodeError::TruncatedIpv4 { len: 6 });
    }

    #[test]
    fn test_decode_bad_ihl() {
        let mut frame = synth::udp_frame("10.0.0.1", "10.0.0.2");
        frame.data[14] = 0x43; // version 4, IHL 3
        assert!(matches!(
            frame.decode(),
            Err(DecodeError::BadHeaderLength { ihl: 3, .. })
        ));
    }

    #[test]
    fn test_decode_ihl_past_end() {
        let mut frame = synth::udp_frame("10.0.0.1", "10.0.0.2");
        frame.data[14] = 0x4f; // 60-byte header in a shorter packet
        frame.data.truncate(14 + 40);
        assert!(matches!(frame.decode(), Err(DecodeError::BadHeaderLength { .. })));
    }

    #[test]
    fn test_decode_bad_version_behind_ipv4_ethertype() {
        let mut frame = synth::udp_frame("10.0.0.1", "10.0.0.2");
        frame.data[14] = 0x65;
        assert_eq!(frame.decode().unwrap_err(), DecodeError::BadVersion(6));
    }

    #[test]
    fn test_decode_truncated_tcp_header_has_no_flags() {
        let frame = synth::tcp_frame("10.0.0.1", "10.0.0.2", synth::SYN);
        let cut = &frame.data[..14 + 20 + 8];
        let info = decode(LinkType::Ethernet, cut).expect("decode");
        assert_eq!(info.transport, Transport::Tcp { flags: None });
    }

    #[test]
    fn test_decode_non_first_fragment() {
        let mut frame = synth::tcp_frame("10.0.0.1", "10.0.0.2", synth::SYN);
        frame.data[14 + 6] = 0x00;
        frame.data[14 + 7] = 0xb9; // offset 185 * 8
        let info = frame.decode().expect("decode");
        assert!(info.has_ip());
        assert_eq!(info.transport, Transport::None);
    }

    #[test]
    fn test_decode_ns_flag() {
        let mut frame = synth::tcp_frame("10.0.0.1", "10.0.0.2", synth::ACK);
        frame.data[14 + 20 + 12] |= 0x01;
        let info = frame.decode().expect("decode");
        assert_eq!(info.transport, Transport::Tcp { flags: Some(0x110) });
    }

    // ===========================================
    // Other link types
    // ===========================================

    #[test]
    fn test_decode_raw_ip() {
        let eth = synth::udp_frame("172.16.0.1", "172.16.0.2");
        let info = decode(LinkType::RawIp, &eth.data[14..]).expect("decode");
        assert_eq!(info.ipv4.expect("ipv4").src, ip("172.16.0.1"));
    }

    #[test]
    fn test_decode_raw_ipv6_is_non_ip() {
        let info = decode(LinkType::RawIp, &[0x60, 0, 0, 0]).expect("decode");
        assert!(!info.has_ip());
        assert!(!decode(LinkType::RawIp, &[]).expect("decode").has_ip());
    }

    #[test]
    fn test_decode_linux_sll() {
        let eth = synth::tcp_frame("10.9.9.9", "10.0.0.1", synth::FIN | synth::ACK);
        let mut data = vec![0u8; 14];
        data.extend_from_slice(&[0x08, 0x00]);
        data.extend_from_slice(&eth.data[14..]);

        let info = decode(LinkType::LinuxSll, &data).expect("decode");
        assert_eq!(info.ipv4.expect("ipv4").src, ip("10.9.9.9"));
        assert_eq!(info.transport, Transport::Tcp { flags: Some(0x11) });
    }

    #[test]
    fn test_decode_unknown_link_type() {
        let info = decode(LinkType::Unknown(147), &[0u8; 64]).expect("decode");
        assert!(!info.has_ip());
    }

    #[test]
    fn test_frame_captured_len() {
        let frame = synth::udp_frame("10.0.0.1", "10.0.0.2");
        assert_eq!(frame.captured_len(), frame.data.len());
        assert_eq!(frame.wire_len as usize, frame.data.len());
    }
}
