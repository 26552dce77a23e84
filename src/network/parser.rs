// network/parser.rs - IPv4 and transport header parsing with classification
use crate::network::dpi;
use crate::network::types::{Ipv4Header, ParsedPacket};
use std::net::Ipv4Addr;
use thiserror::Error;

const PROTO_TCP: u8 = 6;
const PROTO_UDP: u8 = 17;

/// Why a frame was rejected before analysis.
///
/// Every variant is contained at single-frame granularity: the frame is
/// still forwarded, only its analysis is dropped.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("unsupported IP version {0}")]
    UnsupportedVersion(u8),
    #[error("truncated frame: header declares {declared} bytes, {available} available")]
    TruncatedFrame { declared: usize, available: usize },
    #[error("unsupported transport protocol {0}")]
    UnsupportedTransport(u8),
    #[error("transport header ends at byte {end} past frame length {frame_len}")]
    MalformedOffset { end: usize, frame_len: usize },
}

/// Parse the IPv4 header of a raw frame.
///
/// No checksum validation is performed; the checksum bytes are skipped.
pub fn parse_ipv4(frame: &[u8]) -> Result<Ipv4Header, ParseError> {
    if frame.len() < 20 {
        return Err(ParseError::TruncatedFrame {
            declared: 20,
            available: frame.len(),
        });
    }

    let version = frame[0] >> 4;
    if version != 4 {
        return Err(ParseError::UnsupportedVersion(version));
    }

    let ihl = frame[0] & 0x0F;
    let header_len = (ihl as usize) * 4;
    if !(20..=60).contains(&header_len) || header_len > frame.len() {
        return Err(ParseError::TruncatedFrame {
            declared: header_len,
            available: frame.len(),
        });
    }

    Ok(Ipv4Header {
        version,
        header_len,
        protocol: frame[9],
        source: Ipv4Addr::new(frame[12], frame[13], frame[14], frame[15]),
        dest: Ipv4Addr::new(frame[16], frame[17], frame[18], frame[19]),
    })
}

/// Packet parser - stateless, thread-safe
#[derive(Debug, Default)]
pub struct PacketParser;

impl PacketParser {
    pub fn new() -> Self {
        Self
    }

    /// Parse a raw IPv4 frame into a classified packet.
    ///
    /// `timestamp_ms` is the capture time stamped by the reader when the
    /// frame was pulled off the interface.
    pub fn parse(&self, frame: &[u8], timestamp_ms: i64) -> Result<ParsedPacket, ParseError> {
        let header = parse_ipv4(frame)?;

        match header.protocol {
            PROTO_TCP => self.parse_tcp(frame, &header, timestamp_ms),
            PROTO_UDP => self.parse_udp(frame, &header, timestamp_ms),
            other => Err(ParseError::UnsupportedTransport(other)),
        }
    }

    fn parse_tcp(
        &self,
        frame: &[u8],
        header: &Ipv4Header,
        timestamp_ms: i64,
    ) -> Result<ParsedPacket, ParseError> {
        let ip_len = header.header_len;
        if frame.len() < ip_len + 20 {
            return Err(ParseError::TruncatedFrame {
                declared: ip_len + 20,
                available: frame.len(),
            });
        }

        let source_port = u16::from_be_bytes([frame[ip_len], frame[ip_len + 1]]);
        let dest_port = u16::from_be_bytes([frame[ip_len + 2], frame[ip_len + 3]]);

        // Data offset nibble gives the TCP header length in 32-bit words
        let tcp_len = ((frame[ip_len + 12] >> 4) as usize) * 4;
        let payload_start = ip_len + tcp_len;
        if !(20..=60).contains(&tcp_len) || payload_start > frame.len() {
            return Err(ParseError::MalformedOffset {
                end: payload_start,
                frame_len: frame.len(),
            });
        }

        let payload = frame[payload_start..].to_vec();
        let class = dpi::classify(&payload, dest_port, true);

        Ok(ParsedPacket {
            timestamp_ms,
            protocol: class.protocol,
            source_addr: header.source,
            dest_addr: header.dest,
            source_port,
            dest_port,
            payload,
            is_encrypted: class.is_encrypted,
        })
    }

    fn parse_udp(
        &self,
        frame: &[u8],
        header: &Ipv4Header,
        timestamp_ms: i64,
    ) -> Result<ParsedPacket, ParseError> {
        let ip_len = header.header_len;
        // Fixed 8-byte UDP header; length and checksum fields are skipped
        if frame.len() < ip_len + 8 {
            return Err(ParseError::TruncatedFrame {
                declared: ip_len + 8,
                available: frame.len(),
            });
        }

        let source_port = u16::from_be_bytes([frame[ip_len], frame[ip_len + 1]]);
        let dest_port = u16::from_be_bytes([frame[ip_len + 2], frame[ip_len + 3]]);

        let payload = frame[ip_len + 8..].to_vec();
        let class = dpi::classify(&payload, dest_port, false);

        Ok(ParsedPacket {
            timestamp_ms,
            protocol: class.protocol,
            source_addr: header.source,
            dest_addr: header.dest,
            source_port,
            dest_port,
            payload,
            is_encrypted: class.is_encrypted,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::types::Protocol;

    fn ipv4_frame(protocol: u8, transport: &[u8]) -> Vec<u8> {
        let mut frame = vec![0u8; 20];
        frame[0] = 0x45; // version 4, IHL 5
        frame[9] = protocol;
        frame[12..16].copy_from_slice(&[192, 168, 1, 10]);
        frame[16..20].copy_from_slice(&[93, 184, 216, 34]);
        frame.extend_from_slice(transport);
        frame
    }

    fn tcp_segment(source_port: u16, dest_port: u16, payload: &[u8]) -> Vec<u8> {
        let mut seg = vec![0u8; 20];
        seg[0..2].copy_from_slice(&source_port.to_be_bytes());
        seg[2..4].copy_from_slice(&dest_port.to_be_bytes());
        seg[12] = 0x50; // data offset 5 words
        seg.extend_from_slice(payload);
        seg
    }

    #[test]
    fn test_short_frame_rejected() {
        let err = parse_ipv4(&[0x45; 19]).unwrap_err();
        assert_eq!(
            err,
            ParseError::TruncatedFrame {
                declared: 20,
                available: 19
            }
        );
    }

    #[test]
    fn test_non_ipv4_rejected() {
        let mut frame = vec![0u8; 40];
        frame[0] = 0x60; // IPv6
        assert_eq!(
            parse_ipv4(&frame).unwrap_err(),
            ParseError::UnsupportedVersion(6)
        );
    }

    #[test]
    fn test_declared_header_past_frame_end() {
        let mut frame = vec![0u8; 20];
        frame[0] = 0x4F; // IHL 15 -> 60 byte header, frame only 20
        assert!(matches!(
            parse_ipv4(&frame).unwrap_err(),
            ParseError::TruncatedFrame { declared: 60, .. }
        ));
    }

    #[test]
    fn test_header_fields() {
        let frame = ipv4_frame(PROTO_TCP, &tcp_segment(1234, 80, b""));
        let header = parse_ipv4(&frame).unwrap();
        assert_eq!(header.version, 4);
        assert_eq!(header.header_len, 20);
        assert_eq!(header.protocol, 6);
        assert_eq!(header.source.to_string(), "192.168.1.10");
        assert_eq!(header.dest.to_string(), "93.184.216.34");
    }

    #[test]
    fn test_unsupported_transport() {
        let frame = ipv4_frame(99, &[0u8; 20]);
        let parser = PacketParser::new();
        assert_eq!(
            parser.parse(&frame, 0).unwrap_err(),
            ParseError::UnsupportedTransport(99)
        );
    }

    #[test]
    fn test_tcp_packet() {
        let payload = b"GET /index.html HTTP/1.1\r\n\r\n";
        let frame = ipv4_frame(PROTO_TCP, &tcp_segment(50123, 80, payload));
        let packet = PacketParser::new().parse(&frame, 1234).unwrap();

        assert_eq!(packet.timestamp_ms, 1234);
        assert_eq!(packet.source_port, 50123);
        assert_eq!(packet.dest_port, 80);
        assert_eq!(packet.protocol, Protocol::HTTP);
        assert_eq!(packet.payload, payload);
        assert!(!packet.is_encrypted);
    }

    #[test]
    fn test_tcp_bad_data_offset() {
        let mut seg = tcp_segment(1, 2, b"");
        seg[12] = 0xF0; // 60-byte TCP header declared, segment is 20 bytes
        let frame = ipv4_frame(PROTO_TCP, &seg);
        assert!(matches!(
            PacketParser::new().parse(&frame, 0).unwrap_err(),
            ParseError::MalformedOffset { .. }
        ));
    }

    #[test]
    fn test_tcp_truncated_segment() {
        let frame = ipv4_frame(PROTO_TCP, &[0u8; 10]);
        assert!(matches!(
            PacketParser::new().parse(&frame, 0).unwrap_err(),
            ParseError::TruncatedFrame { .. }
        ));
    }

    #[test]
    fn test_udp_packet() {
        let mut seg = vec![0u8; 8];
        seg[0..2].copy_from_slice(&53000u16.to_be_bytes());
        seg[2..4].copy_from_slice(&53u16.to_be_bytes());
        seg.extend_from_slice(&[0xAB; 12]);
        let frame = ipv4_frame(PROTO_UDP, &seg);

        let packet = PacketParser::new().parse(&frame, 0).unwrap();
        assert_eq!(packet.protocol, Protocol::DNS);
        assert_eq!(packet.source_port, 53000);
        assert_eq!(packet.dest_port, 53);
        assert_eq!(packet.payload.len(), 12);
    }

    #[test]
    fn test_empty_payload_allowed() {
        let frame = ipv4_frame(PROTO_TCP, &tcp_segment(1, 9999, b""));
        let packet = PacketParser::new().parse(&frame, 0).unwrap();
        assert!(packet.payload.is_empty());
        assert_eq!(packet.protocol, Protocol::TCP);
    }
}
