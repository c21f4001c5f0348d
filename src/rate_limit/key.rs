//! Rate-limit key derivation.

use std::fmt;
use std::net::IpAddr;

use crate::auth::Identity;

/// Partition used for rate-limit accounting.
///
/// Exactly one key per request: the verified identity when there is one,
/// otherwise the network origin.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RateLimitKey {
    User(String),
    Ip(Option<IpAddr>),
}

impl RateLimitKey {
    pub fn for_request(identity: Option<&Identity>, origin: Option<IpAddr>) -> Self {
        match identity {
            Some(identity) => RateLimitKey::User(identity.subject().to_string()),
            None => RateLimitKey::Ip(origin),
        }
    }

    /// Label used for metrics; never includes the key value.
    pub fn kind(&self) -> &'static str {
        match self {
            RateLimitKey::User(_) => "user",
            RateLimitKey::Ip(_) => "ip",
        }
    }
}

impl fmt::Display for RateLimitKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RateLimitKey::User(id) => write!(f, "user:{id}"),
            RateLimitKey::Ip(Some(addr)) => write!(f, "ip:{addr}"),
            RateLimitKey::Ip(None) => f.write_str("ip:unknown"),
        }
    }
}
