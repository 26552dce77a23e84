// network/types.rs - Shared data model for the inspection pipeline
use std::net::Ipv4Addr;

/// Application protocol of a parsed packet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(clippy::upper_case_acronyms)] // Protocol names are standardized
pub enum Protocol {
    TCP,
    UDP,
    HTTP,
    HTTPS,
    DNS,
    UNKNOWN,
}

impl std::fmt::Display for Protocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Protocol::TCP => write!(f, "TCP"),
            Protocol::UDP => write!(f, "UDP"),
            Protocol::HTTP => write!(f, "HTTP"),
            Protocol::HTTPS => write!(f, "HTTPS"),
            Protocol::DNS => write!(f, "DNS"),
            Protocol::UNKNOWN => write!(f, "UNKNOWN"),
        }
    }
}

/// Decoded IPv4 header fields. Derived once per frame, never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ipv4Header {
    pub version: u8,
    /// Header length in bytes (IHL * 4, always in 20-60)
    pub header_len: usize,
    /// Transport protocol number (6 = TCP, 17 = UDP)
    pub protocol: u8,
    pub source: Ipv4Addr,
    pub dest: Ipv4Addr,
}

/// One successfully parsed and classified frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedPacket {
    /// Capture time, milliseconds since the Unix epoch
    pub timestamp_ms: i64,
    pub protocol: Protocol,
    pub source_addr: Ipv4Addr,
    pub dest_addr: Ipv4Addr,
    pub source_port: u16,
    pub dest_port: u16,
    pub payload: Vec<u8>,
    pub is_encrypted: bool,
}

impl ParsedPacket {
    /// Convert into the record handed to the result sink.
    pub fn into_record(self, vulnerability_count: usize) -> PacketRecord {
        PacketRecord {
            timestamp_ms: self.timestamp_ms,
            protocol: self.protocol.to_string(),
            source_addr: self.source_addr.to_string(),
            dest_addr: self.dest_addr.to_string(),
            source_port: self.source_port,
            dest_port: self.dest_port,
            payload: self.payload,
            is_encrypted: self.is_encrypted,
            vulnerability_count,
        }
    }
}

/// Per-packet row handed to the result sink
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PacketRecord {
    pub timestamp_ms: i64,
    pub protocol: String,
    pub source_addr: String,
    pub dest_addr: String,
    pub source_port: u16,
    pub dest_port: u16,
    pub payload: Vec<u8>,
    pub is_encrypted: bool,
    pub vulnerability_count: usize,
}
