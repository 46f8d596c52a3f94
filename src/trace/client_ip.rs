//! Client address resolution.
//!
//! Precedence:
//! 1. first entry of `x-forwarded-for` (comma-joined or repeated header)
//! 2. transport-reported address (`x-real-ip`, set by the fronting proxy)
//! 3. socket peer address
//! 4. the literal `unknown`

use axum::http::HeaderMap;
use std::net::SocketAddr;

pub const X_FORWARDED_FOR: &str = "x-forwarded-for";
pub const X_REAL_IP: &str = "x-real-ip";
pub const UNKNOWN: &str = "unknown";

pub fn resolve_client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    if let Some(ip) = forwarded_for(headers) {
        return ip;
    }

    if let Some(ip) = header_str(headers, X_REAL_IP) {
        return ip.to_string();
    }

    match peer {
        Some(addr) => addr.ip().to_string(),
        None => UNKNOWN.to_string(),
    }
}

fn forwarded_for(headers: &HeaderMap) -> Option<String> {
    // A repeated header arrives as several values; the first hop is always
    // the first entry of the first value.
    let first = headers.get_all(X_FORWARDED_FOR).iter().next()?;
    let first = first.to_str().ok()?;
    let hop = first.split(',').next()?.trim();
    (!hop.is_empty()).then(|| hop.to_string())
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn comma_joined_forwarded_for_uses_first_hop() {
        let mut headers = HeaderMap::new();
        headers.insert(X_FORWARDED_FOR, HeaderValue::from_static("203.0.113.195, 70.41.3.18"));
        assert_eq!(resolve_client_ip(&headers, None), "203.0.113.195");
    }

    #[test]
    fn repeated_forwarded_for_uses_first_value() {
        let mut headers = HeaderMap::new();
        headers.append(X_FORWARDED_FOR, HeaderValue::from_static(" 203.0.113.195 "));
        headers.append(X_FORWARDED_FOR, HeaderValue::from_static("70.41.3.18"));
        assert_eq!(resolve_client_ip(&headers, None), "203.0.113.195");
    }

    #[test]
    fn falls_back_to_transport_ip() {
        let mut headers = HeaderMap::new();
        headers.insert(X_REAL_IP, HeaderValue::from_static("192.168.1.1"));
        let peer: SocketAddr = "10.0.0.9:5000".parse().unwrap();
        assert_eq!(resolve_client_ip(&headers, Some(peer)), "192.168.1.1");
    }

    #[test]
    fn falls_back_to_socket_address() {
        let peer: SocketAddr = "10.0.0.9:5000".parse().unwrap();
        assert_eq!(resolve_client_ip(&HeaderMap::new(), Some(peer)), "10.0.0.9");
    }

    #[test]
    fn unknown_when_nothing_available() {
        assert_eq!(resolve_client_ip(&HeaderMap::new(), None), "unknown");
    }

    #[test]
    fn empty_forwarded_for_is_skipped() {
        let mut headers = HeaderMap::new();
        headers.insert(X_FORWARDED_FOR, HeaderValue::from_static(" , 70.41.3.18"));
        headers.insert(X_REAL_IP, HeaderValue::from_static("192.168.1.1"));
        assert_eq!(resolve_client_ip(&headers, None), "192.168.1.1");
    }
}
