//! Classification of decoded frames into record fields.

use std::net::Ipv4Addr;

use netguard_schema::Protocol;

use crate::frame::{LayerInfo, Transport};

/// TCP flag bits as they appear in the header (NS is bit 8).
pub mod tcp_flags {
    pub const FIN: u16 = 0x001;
    pub const SYN: u16 = 0x002;
    pub const RST: u16 = 0x004;
    pub const PSH: u16 = 0x008;
    pub const ACK: u16 = 0x010;
    pub const URG: u16 = 0x020;
    pub const ECE: u16 = 0x040;
    pub const CWR: u16 = 0x080;
    pub const NS: u16 = 0x100;
}

const FLAG_LETTERS: [(u16, char); 9] = [
    (tcp_flags::FIN, 'F'),
    (tcp_flags::SYN, 'S'),
    (tcp_flags::RST, 'R'),
    (tcp_flags::PSH, 'P'),
    (tcp_flags::ACK, 'A'),
    (tcp_flags::URG, 'U'),
    (tcp_flags::ECE, 'E'),
    (tcp_flags::CWR, 'C'),
    (tcp_flags::NS, 'N'),
];

/// Render TCP flag bits as letters in bit order, e.g. SYN+ACK is `"SA"`.
pub fn render_tcp_flags(bits: u16) -> String {
    FLAG_LETTERS
        .iter()
        .filter(|(bit, _)| bits & bit != 0)
        .map(|(_, letter)| *letter)
        .collect()
}

/// Record fields derived from one IP frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub src: Ipv4Addr,
    pub dst: Ipv4Addr,
    pub protocol: Protocol,
    pub flags: String,
}

/// Map layer presence to protocol and flags.
///
/// TCP wins over UDP; anything else with an IP layer is `Other` with empty
/// flags. Returns `None` when there is no IP layer.
pub fn classify(info: &LayerInfo) -> Option<Classification> {
    let ipv4 = info.ipv4?;
    let (protocol, flags) = match info.transport {
        Transport::Tcp { flags } => (
            Protocol::Tcp,
            flags.map(render_tcp_flags).unwrap_or_default(),
        ),
        Transport::Udp => (Protocol::Udp, String::new()),
        Transport::None => (Protocol::Other, String::new()),
    };

    Some(Classification {
        src: ipv4.src,
        dst: ipv4.dst,
        protocol,
        flags,
    })
}
