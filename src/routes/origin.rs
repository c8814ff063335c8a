//! Works out which anonymous caller a request comes from.

use std::{
    convert::Infallible,
    net::{IpAddr, SocketAddr},
};

use axum::{
    async_trait,
    extract::{ConnectInfo, FromRequestParts},
    http::{header::USER_AGENT, request::Parts, HeaderMap},
};

use crate::session::Origin;

const IP_HEADERS: [&str; 2] = ["client-ip", "x-forwarded-for"];

pub struct ClientOrigin(pub Origin);

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for ClientOrigin {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _: &S) -> Result<Self, Self::Rejection> {
        let peer = parts.extensions.get::<ConnectInfo<SocketAddr>>().map(|c| c.0.ip());
        Ok(ClientOrigin(resolve(&parts.headers, peer)))
    }
}

/// First public address from the proxy headers, else the socket peer.
pub fn resolve(headers: &HeaderMap, peer: Option<IpAddr>) -> Origin {
    let forwarded = IP_HEADERS
        .iter()
        .filter_map(|h| headers.get(*h)?.to_str().ok())
        .flat_map(|v| v.split(','))
        .filter_map(|s| s.trim().parse::<IpAddr>().ok())
        .find(is_public);

    let ip = forwarded
        .or(peer)
        .map_or_else(|| "0.0.0.0".to_owned(), |ip| ip.to_string());
    let user_agent = headers
        .get(USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();

    Origin::new(ip, user_agent)
}

/// Rejects private and reserved ranges on both families.
fn is_public(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            let first = v4.octets()[0];
            !(v4.is_private() || v4.is_loopback() || v4.is_link_local() || first == 0 || first >= 240)
        }
        IpAddr::V6(v6) => {
            let head = v6.segments()[0];
            !(v6.is_loopback()
                || v6.is_unspecified()
                || head & 0xfe00 == 0xfc00 // unique local
                || head & 0xffc0 == 0xfe80 // link local
                || v6.to_ipv4_mapped().is_some())
        }
    }
}
