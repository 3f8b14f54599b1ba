//! Caller identity used as the rate limiting key

use std::convert::Infallible;
use std::net::SocketAddr;

use axum::{
    extract::{ConnectInfo, FromRequestParts},
    http::{request::Parts, HeaderMap},
};

use crate::api::state::AppState;

/// Header set by reverse proxies in front of the service
pub const FORWARDED_FOR_HEADER: &str = "x-forwarded-for";

/// Identity reported when neither the peer address nor a trusted header is known
pub const UNKNOWN_IDENTITY: &str = "unknown";

/// Network identity of the caller
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientIdentity(pub String);

impl ClientIdentity {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromRequestParts<AppState> for ClientIdentity {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr);

        Ok(Self(resolve_identity(
            &parts.headers,
            peer,
            state.trust_forwarded_for,
        )))
    }
}

/// Pick the caller identity
///
/// The first `X-Forwarded-For` hop wins only when the header is trusted,
/// otherwise the peer IP is used.
pub fn resolve_identity(
    headers: &HeaderMap,
    peer: Option<SocketAddr>,
    trust_forwarded_for: bool,
) -> String {
    if trust_forwarded_for {
        let forwarded = headers
            .get(FORWARDED_FOR_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').map(str::trim).find(|hop| !hop.is_empty()));

        if let Some(hop) = forwarded {
            return hop.to_string();
        }
    }

    peer.map(|addr| addr.ip().to_string())
        .unwrap_or_else(|| UNKNOWN_IDENTITY.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn peer() -> Option<SocketAddr> {
        Some("10.0.0.7:51234".parse().unwrap())
    }

    fn forwarded(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(FORWARDED_FOR_HEADER, value.parse().unwrap());
        headers
    }

    #[test]
    fn test_peer_ip_without_port() {
        assert_eq!(resolve_identity(&HeaderMap::new(), peer(), false), "10.0.0.7");
    }

    #[test]
    fn test_forwarded_ignored_when_untrusted() {
        let headers = forwarded("203.0.113.9");
        assert_eq!(resolve_identity(&headers, peer(), false), "10.0.0.7");
    }

    #[test]
    fn test_first_forwarded_hop_when_trusted() {
        let headers = forwarded(" 203.0.113.9 , 198.51.100.1");
        assert_eq!(resolve_identity(&headers, peer(), true), "203.0.113.9");
    }

    #[test]
    fn test_empty_forwarded_falls_back_to_peer() {
        let headers = forwarded(" , ");
        assert_eq!(resolve_identity(&headers, peer(), true), "10.0.0.7");
    }

    #[test]
    fn test_unknown_identity() {
        assert_eq!(resolve_identity(&HeaderMap::new(), None, true), UNKNOWN_IDENTITY);
    }
}
