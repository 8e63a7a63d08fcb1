use std::net::{IpAddr, SocketAddr};

use actix_web::{http::header::USER_AGENT, HttpRequest};
use sha2::{Digest, Sha256};

use crate::{
    errors::{AppError, AppResult},
    models::domain::User,
};

/// Address the request came from. Forwarded headers are only honoured when the
/// deployment sits behind a trusted proxy.
pub fn client_ip(req: &HttpRequest, trust_forwarded_for: bool) -> Option<IpAddr> {
    if trust_forwarded_for {
        let info = req.connection_info();
        if let Some(raw) = info.realip_remote_addr() {
            if let Ok(ip) = raw.parse::<IpAddr>() {
                return Some(ip);
            }
            if let Ok(addr) = raw.parse::<SocketAddr>() {
                return Some(addr.ip());
            }
        }
    }
    req.peer_addr().map(|addr| addr.ip())
}

/// Whether the caller reached us over TLS. `X-Forwarded-Proto` and `Forwarded`
/// are client-controlled, so they only count behind a trusted proxy.
pub fn is_https(req: &HttpRequest, trust_forwarded_for: bool) -> bool {
    if trust_forwarded_for {
        return req.connection_info().scheme() == "https";
    }
    req.app_config().secure()
}

/// The kiosk browser announces itself in its user agent.
pub fn is_kiosk_client(req: &HttpRequest) -> bool {
    req.headers()
        .get(USER_AGENT)
        .and_then(|h| h.to_str().ok())
        .map(|ua| ua.contains("SEB"))
        .unwrap_or(false)
}

/// Compares two shared secrets without leaking where they differ.
pub fn secrets_match(presented: &str, expected: &str) -> bool {
    let presented = Sha256::digest(presented.as_bytes());
    let expected = Sha256::digest(expected.as_bytes());
    presented
        .iter()
        .zip(expected.iter())
        .fold(0u8, |acc, (a, b)| acc | (a ^ b))
        == 0
}

pub fn require_not_guest(user: &User) -> AppResult<()> {
    if user.is_guest() {
        return Err(AppError::Authorization(
            "Guest users can not use this page".to_string(),
        ));
    }
    Ok(())
}

pub fn require_staff(user: &User) -> AppResult<()> {
    if !user.can_use_remote_login() {
        return Err(AppError::Authorization(
            "You do not have permission to access this page".to_string(),
        ));
    }
    Ok(())
}
