use std::net::IpAddr;

use http::HeaderMap;

/// Proxy headers consulted for the client address, most trusted first.
/// The same list is used for gate decisions and blocklist keys so the two
/// can never disagree on which IP a request belongs to.
pub const TRUSTED_IP_HEADERS: [&str; 3] = ["cf-connecting-ip", "x-real-ip", "x-forwarded-for"];

const MAX_FORWARDED_ENTRY_CHARS: usize = 64;

/// Resolve the client IP from proxy headers, falling back to the socket
/// peer address. Header values that do not parse as a public IP are
/// ignored rather than trusted.
pub fn resolve_client_ip(headers: &HeaderMap, peer: Option<IpAddr>) -> Option<IpAddr> {
    for name in TRUSTED_IP_HEADERS {
        let Some(value) = headers.get(name).and_then(|v| v.to_str().ok()) else {
            continue;
        };
        // X-Forwarded-For is a comma-separated chain; the first hop is the
        // original client.
        let candidate = value.split(',').next().unwrap_or("").trim();
        if candidate.is_empty() || candidate.len() > MAX_FORWARDED_ENTRY_CHARS {
            continue;
        }
        if let Ok(ip) = candidate.parse::<IpAddr>() {
            if is_public_ip(&ip) {
                return Some(ip);
            }
        }
    }
    peer
}

pub fn is_public_ip(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            !(v4.is_private()
                || v4.is_loopback()
                || v4.is_link_local()
                || v4.is_broadcast()
                || v4.is_documentation()
                || v4.is_unspecified()
                // CGNAT 100.64.0.0/10
                || (v4.octets()[0] == 100 && (v4.octets()[1] & 0xc0) == 64))
        }
        IpAddr::V6(v6) => {
            !(v6.is_loopback()
                || v6.is_unspecified()
                || v6.is_multicast()
                // fc00::/7 unique local, fe80::/10 link local
                || (v6.segments()[0] & 0xfe00) == 0xfc00
                || (v6.segments()[0] & 0xffc0) == 0xfe80)
        }
    }
}

#[cfg(test)]
mod tests {
    use http::HeaderValue;

    use super::*;

    fn headers(pairs: &[(&str, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(
                http::HeaderName::from_bytes(name.as_bytes()).unwrap(),
                HeaderValue::from_str(value).unwrap(),
            );
        }
        map
    }

    #[test]
    fn prefers_trusted_headers_in_order() {
        let map = headers(&[
            ("x-forwarded-for", "93.184.216.34, 10.0.0.1"),
            ("x-real-ip", "1.1.1.1"),
        ]);
        let ip = resolve_client_ip(&map, None).unwrap();
        assert_eq!(ip, "1.1.1.1".parse::<IpAddr>().unwrap());
    }

    #[test]
    fn forwarded_for_takes_first_hop() {
        let map = headers(&[("x-forwarded-for", "93.184.216.34, 172.16.0.1")]);
        let ip = resolve_client_ip(&map, None).unwrap();
        assert_eq!(ip, "93.184.216.34".parse::<IpAddr>().unwrap());
    }

    #[test]
    fn private_header_values_fall_through_to_peer() {
        let peer: IpAddr = "93.184.216.34".parse().unwrap();
        let map = headers(&[("x-real-ip", "192.168.1.5")]);
        assert_eq!(resolve_client_ip(&map, Some(peer)), Some(peer));
    }

    #[test]
    fn garbage_header_values_are_ignored() {
        let peer: IpAddr = "93.184.216.34".parse().unwrap();
        let map = headers(&[("x-forwarded-for", "not-an-ip")]);
        assert_eq!(resolve_client_ip(&map, Some(peer)), Some(peer));
    }

    #[test]
    fn public_ip_classification() {
        assert!(is_public_ip(&"8.8.8.8".parse().unwrap()));
        assert!(!is_public_ip(&"10.1.2.3".parse().unwrap()));
        assert!(!is_public_ip(&"127.0.0.1".parse().unwrap()));
        assert!(!is_public_ip(&"100.64.0.1".parse().unwrap()));
        assert!(!is_public_ip(&"fe80::1".parse().unwrap()));
        assert!(is_public_ip(&"2001:4860:4860::8888".parse().unwrap()));
    }
}
