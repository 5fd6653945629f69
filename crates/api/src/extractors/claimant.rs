//! Claimant identity extractor.
//!
//! A claimant is the (IP address, session id) pair the cooldown is keyed on,
//! plus the user agent kept for diagnostics.

use axum::{
    async_trait,
    extract::{ConnectInfo, FromRequestParts},
    http::{header::USER_AGENT, request::Parts, Extensions, HeaderMap},
};
use domain::models::Claimant;
use std::net::{IpAddr, SocketAddr};

use crate::app::AppState;
use crate::error::ApiError;
use crate::services::session::SessionId;

const FORWARDED_FOR: &str = "x-forwarded-for";
const MAX_USER_AGENT_LEN: usize = 512;

/// Placeholder when the peer address is unknown (no connect info, no
/// trusted proxy header).
pub const UNKNOWN_IP: &str = "unknown";

/// Client IP address used for claim cooldowns and request throttling.
///
/// With `trust_proxy` the first parseable `X-Forwarded-For` hop wins;
/// otherwise, or when the header is absent, the socket peer address.
pub fn client_ip(headers: &HeaderMap, extensions: &Extensions, trust_proxy: bool) -> String {
    if trust_proxy {
        let forwarded = headers
            .get(FORWARDED_FOR)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .and_then(|hop| hop.trim().parse::<IpAddr>().ok());
        if let Some(ip) = forwarded {
            return canonical_ip(ip);
        }
    }

    extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| canonical_ip(addr.ip()))
        .unwrap_or_else(|| UNKNOWN_IP.to_string())
}

/// IPv4-mapped IPv6 addresses are reported as plain IPv4 so a dual-stack
/// listener does not give one client two identities.
fn canonical_ip(ip: IpAddr) -> String {
    match ip {
        IpAddr::V6(v6) => match v6.to_ipv4_mapped() {
            Some(v4) => v4.to_string(),
            None => v6.to_string(),
        },
        IpAddr::V4(v4) => v4.to_string(),
    }
}

/// The claimant making the request.
///
/// Requires the session middleware on the route.
#[derive(Debug, Clone)]
pub struct ClientClaimant(pub Claimant);

#[async_trait]
impl FromRequestParts<AppState> for ClientClaimant {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let session = parts
            .extensions
            .get::<SessionId>()
            .cloned()
            .ok_or_else(|| ApiError::Internal("session middleware not installed".to_string()))?;

        let ip = client_ip(
            &parts.headers,
            &parts.extensions,
            state.config.security.trust_proxy_headers,
        );

        let mut claimant = Claimant::new(ip, session.value);
        if let Some(agent) = parts
            .headers
            .get(USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
        {
            claimant = claimant.with_user_agent(agent.chars().take(MAX_USER_AGENT_LEN).collect::<String>());
        }

        Ok(ClientClaimant(claimant))
    }
}
