use crate::network::types::Protocol;

mod http;
mod tls;

pub use http::is_http_request;
pub use tls::is_tls_record;

// Well-known port numbers used for protocol classification.
const PORT_DNS: u16 = 53;
const PORT_HTTP: u16 = 80;
const PORT_HTTPS: u16 = 443;

/// Result of classifying a payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub protocol: Protocol,
    pub is_encrypted: bool,
}

/// Classify a transport payload by destination port and payload prefix.
///
/// The TLS-record heuristic only sets the encrypted flag; it never upgrades
/// an HTTP or generic classification to HTTPS.
pub fn classify(payload: &[u8], dest_port: u16, is_tcp: bool) -> Classification {
    let protocol = if dest_port == PORT_HTTPS {
        Protocol::HTTPS
    } else if dest_port == PORT_HTTP || is_http_request(payload) {
        Protocol::HTTP
    } else if is_tcp {
        Protocol::TCP
    } else if dest_port == PORT_DNS {
        Protocol::DNS
    } else {
        Protocol::UDP
    };

    Classification {
        protocol,
        is_encrypted: protocol == Protocol::HTTPS || is_tls_record(payload),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_port_443_is_https_and_encrypted() {
        let c = classify(b"anything at all", 443, true);
        assert_eq!(c.protocol, Protocol::HTTPS);
        assert!(c.is_encrypted);

        // Port wins even with an empty payload, on TCP and UDP alike
        let c = classify(b"", 443, false);
        assert_eq!(c.protocol, Protocol::HTTPS);
        assert!(c.is_encrypted);
    }

    #[test]
    fn test_http_by_prefix_on_nonstandard_port() {
        let c = classify(b"GET /x", 8080, true);
        assert_eq!(c.protocol, Protocol::HTTP);
        assert!(!c.is_encrypted);
    }

    #[test]
    fn test_http_by_port_without_method() {
        let c = classify(b"\x00\x01\x02", 80, true);
        assert_eq!(c.protocol, Protocol::HTTP);
    }

    #[test]
    fn test_tcp_fallback() {
        let c = classify(b"\x00\x01", 6000, true);
        assert_eq!(c.protocol, Protocol::TCP);
    }

    #[test]
    fn test_udp_dns_and_fallback() {
        assert_eq!(classify(b"", 53, false).protocol, Protocol::DNS);
        assert_eq!(classify(b"", 5000, false).protocol, Protocol::UDP);
    }

    #[test]
    fn test_tls_heuristic_sets_encrypted_only() {
        let c = classify(&[0x16, 0x03, 0x01, 0x00, 0x10], 8443, true);
        assert_eq!(c.protocol, Protocol::TCP);
        assert!(c.is_encrypted);

        let c = classify(&[0x00, 0x00, 0x00], 8443, true);
        assert!(!c.is_encrypted);
    }
}
