//! Packet record types for NetGuard.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Surrogate key assigned by the store; strictly increasing in insertion order.
pub type RecordId = i64;

/// Canonical transport classification of a captured packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Protocol {
    Tcp,
    Udp,
    Other,
}

impl Protocol {
    /// All protocols in canonical display order.
    pub const ALL: [Protocol; 3] = [Protocol::Tcp, Protocol::Udp, Protocol::Other];

    /// Map a raw protocol name onto the canonical set.
    ///
    /// Surrounding whitespace and case are ignored. Anything that is not TCP
    /// or UDP becomes `Other`; raw names are never kept.
    pub fn from_raw(raw: &str) -> Self {
        match raw.trim().to_ascii_uppercase().as_str() {
            "TCP" => Protocol::Tcp,
            "UDP" => Protocol::Udp,
            _ => Protocol::Other,
        }
    }

    /// Stored canonical string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Tcp => "TCP",
            Protocol::Udp => "UDP",
            Protocol::Other => "OTHER",
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Validation errors for records.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RecordError {
    #[error("source address is required")]
    EmptySource,

    #[error("destination address is required")]
    EmptyDestination,
}

/// A record as handed to the store. It has no id or timestamp yet: the store
/// assigns both at write time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRecord {
    src_ip: String,
    dst_ip: String,
    protocol: Protocol,
    length: u64,
    flags: String,
}

impl NewRecord {
    /// Build a validated record.
    ///
    /// `protocol` is a raw name and is normalized with [`Protocol::from_raw`].
    pub fn new(
        src_ip: &str,
        dst_ip: &str,
        protocol: &str,
        length: u64,
        flags: &str,
    ) -> Result<Self, RecordError> {
        Self::with_protocol(src_ip, dst_ip, Protocol::from_raw(protocol), length, flags)
    }

    /// Build a validated record from an already-classified protocol.
    pub fn with_protocol(
        src_ip: &str,
        dst_ip: &str,
        protocol: Protocol,
        length: u64,
        flags: &str,
    ) -> Result<Self, RecordError> {
        let src_ip = src_ip.trim();
        let dst_ip = dst_ip.trim();
        if src_ip.is_empty() {
            return Err(RecordError::EmptySource);
        }
        if dst_ip.is_empty() {
            return Err(RecordError::EmptyDestination);
        }

        Ok(Self {
            src_ip: src_ip.to_string(),
            dst_ip: dst_ip.to_string(),
            protocol,
            length,
            flags: flags.to_string(),
        })
    }

    pub fn src_ip(&self) -> &str {
        &self.src_ip
    }

    pub fn dst_ip(&self) -> &str {
        &self.dst_ip
    }

    pub fn protocol(&self) -> Protocol {
        self.protocol
    }

    pub fn length(&self) -> u64 {
        self.length
    }

    pub fn flags(&self) -> &str {
        &self.flags
    }
}

/// A persisted record read back from the store. Immutable once written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PacketRecord {
    pub id: RecordId,
    pub src_ip: String,
    pub dst_ip: String,
    pub protocol: Protocol,
    pub length: u64,
    pub flags: String,
    /// Unix seconds, assigned by the store.
    pub captured_at: u64,
}

impl PacketRecord {
    /// Serialize to a single JSON line.
    pub fn to_json(&self) -> String {
        // PacketRecord holds only strings, integers and a unit enum.
        serde_json::to_string(self).expect("PacketRecord serialization cannot fail")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ===========================================
    // Protocol normalization
    // ===========================================

    #[test]
    fn test_protocol_from_raw_canonical() {
        assert_eq!(Protocol::from_raw("TCP"), Protocol::Tcp);
        assert_eq!(Protocol::from_raw("UDP"), Protocol::Udp);
        assert_eq!(Protocol::from_raw("OTHER"), Protocol::Other);
    }

    #[test]
    fn test_protocol_from_raw_trims_and_uppercases() {
        assert_eq!(Protocol::from_raw(" tcp \n"), Protocol::Tcp);
        assert_eq!(Protocol::from_raw("\tUdp"), Protocol::Udp);
    }

    #[test]
    fn test_protocol_from_raw_unknown_maps_to_other() {
        assert_eq!(Protocol::from_raw("ICMP"), Protocol::Other);
        assert_eq!(Protocol::from_raw("Other"), Protocol::Other);
        assert_eq!(Protocol::from_raw(""), Protocol::Other);
        assert_eq!(Protocol::from_raw("tcpx"), Protocol::Other);
    }

    #[test]
    fn test_protocol_as_str_round_trips() {
        for p in Protocol::ALL {
            assert_eq!(Protocol::from_raw(p.as_str()), p);
        }
    }

    #[test]
    fn test_protocol_display() {
        assert_eq!(Protocol::Other.to_string(), "OTHER");
    }

    #[test]
    fn test_protocol_serde_uppercase() {
        let json = serde_json::to_string(&Protocol::Udp).expect("serialize");
        assert_eq!(json, "\"UDP\"");
    }

    // ===========================================
    // NewRecord validation
    // ===========================================

    #[test]
    fn test_new_record_normalizes_protocol() {
        let record = NewRecord::new("10.0.0.1", "10.0.0.2", " tcp \n", 60, "S").expect("valid");
        assert_eq!(record.protocol(), Protocol::Tcp);
        assert_eq!(record.length(), 60);
        assert_eq!(record.flags(), "S");
    }

    #[test]
    fn test_new_record_trims_addresses() {
        let record = NewRecord::new(" 10.0.0.1 ", "10.0.0.2\n", "UDP", 0, "").expect("valid");
        assert_eq!(record.src_ip(), "10.0.0.1");
        assert_eq!(record.dst_ip(), "10.0.0.2");
    }

    #[test]
    fn test_new_record_rejects_empty_source() {
        let err = NewRecord::new("  ", "10.0.0.2", "TCP", 1, "").unwrap_err();
        assert_eq!(err, RecordError::EmptySource);
    }

    #[test]
    fn test_new_record_rejects_empty_destination() {
        let err = NewRecord::new("10.0.0.1", "", "TCP", 1, "").unwrap_err();
        assert_eq!(err, RecordError::EmptyDestination);
    }

    #[test]
    fn test_new_record_allows_empty_flags() {
        let record =
            NewRecord::with_protocol("10.0.0.1", "10.0.0.2", Protocol::Other, 98, "").expect("valid");
        assert!(record.flags().is_empty());
    }

    #[test]
    fn test_record_error_display() {
        assert_eq!(RecordError::EmptySource.to_string(), "source address is required");
    }

    // ===========================================
    // PacketRecord
    // ===========================================

    #[test]
    fn test_packet_record_to_json() {
        let record = PacketRecord {
            id: 7,
            src_ip: "10.0.0.1".to_string(),
            dst_ip: "10.0.0.2".to_string(),
            protocol: Protocol::Tcp,
            length: 1500,
            flags: "PA".to_string(),
            captured_at: 1704067200,
        };
        let json = record.to_json();
        assert!(json.contains("\"id\":7"));
        assert!(json.contains("\"protocol\":\"TCP\""));

        let restored: PacketRecord = serde_json::from_str(&json).expect("parse");
        assert_eq!(restored, record);
    }
}
