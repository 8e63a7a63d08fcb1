use std::net::IpAddr;

use rand::{distributions::Alphanumeric, rngs::OsRng, Rng};
use serde::{Deserialize, Serialize};

use crate::auth::ip::address_in_subnet;

/// Namespace shared by every hand-off token this service mints.
pub const LOGIN_TOKEN_NAMESPACE: &str = "quizaccess_sebserver";

const TOKEN_LENGTH: usize = 32;

/// Single-use hand-off credential. Only the SHA-256 digest of the value is stored.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct LoginToken {
    pub namespace: String,
    pub value_hash: String,
    pub user_id: i64,
    pub resource_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip_restriction: Option<String>,
    /// Unix seconds.
    pub valid_until: i64,
    /// Unix seconds.
    pub created_at: i64,
}

impl LoginToken {
    pub fn new(
        namespace: &str,
        value: &str,
        user_id: i64,
        resource_id: i64,
        ip_restriction: Option<String>,
        ttl_secs: i64,
        now: i64,
    ) -> Self {
        Self {
            namespace: namespace.to_string(),
            value_hash: hash_token(value),
            user_id,
            resource_id,
            ip_restriction: ip_restriction.filter(|r| !r.trim().is_empty()),
            valid_until: now + ttl_secs,
            created_at: now,
        }
    }

    /// A token is still valid in the second it expires.
    pub fn is_expired_at(&self, now: i64) -> bool {
        self.valid_until < now
    }

    pub fn allows_address(&self, addr: Option<IpAddr>) -> bool {
        match (&self.ip_restriction, addr) {
            (None, _) => true,
            (Some(_), None) => false,
            (Some(restriction), Some(addr)) => address_in_subnet(addr, restriction),
        }
    }
}

pub fn generate_token_value() -> String {
    OsRng
        .sample_iter(&Alphanumeric)
        .take(TOKEN_LENGTH)
        .map(char::from)
        .collect()
}

pub fn hash_token(token: &str) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Why a redemption request was turned away.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    SessionUserMismatch,
    WebservicesDisabled,
    HttpsRequired,
    AdminNotAllowed,
    TokenNotFound,
    TokenExpired,
    IpMismatch,
    TokenUserMismatch,
    UserNotFound,
    UserInactive,
}

impl RejectReason {
    pub fn code(&self) -> &'static str {
        match self {
            RejectReason::SessionUserMismatch => "session_user_mismatch",
            RejectReason::WebservicesDisabled => "webservices_disabled",
            RejectReason::HttpsRequired => "https_required",
            RejectReason::AdminNotAllowed => "admin_not_allowed",
            RejectReason::TokenNotFound => "token_not_found",
            RejectReason::TokenExpired => "token_expired",
            RejectReason::IpMismatch => "ip_mismatch",
            RejectReason::TokenUserMismatch => "token_user_mismatch",
            RejectReason::UserNotFound => "user_not_found",
            RejectReason::UserInactive => "user_inactive",
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            RejectReason::SessionUserMismatch => {
                "Login key does not belong to the current user. Either download the config file manually, or reload the exam page again."
            }
            RejectReason::WebservicesDisabled => "Web services must be enabled to use automatic login",
            RejectReason::HttpsRequired => "Automatic login requires a secure (https) connection",
            RejectReason::AdminNotAllowed => "Automatic login is not allowed for site administrators",
            RejectReason::TokenNotFound => "There is no login key record. It could have expired.",
            RejectReason::TokenExpired => "The login key has expired",
            RejectReason::IpMismatch => "The login key is not valid for this IP address",
            RejectReason::TokenUserMismatch => "Login key does not belong to the requested user",
            RejectReason::UserNotFound => "Can not find user",
            RejectReason::UserInactive => "The user account is suspended or deleted",
        }
    }

    /// Reasons rooted in who is asking rather than in the token itself.
    pub fn is_authorization(&self) -> bool {
        matches!(
            self,
            RejectReason::SessionUserMismatch
                | RejectReason::WebservicesDisabled
                | RejectReason::HttpsRequired
                | RejectReason::AdminNotAllowed
                | RejectReason::UserInactive
        )
    }
}
