//! Audit entry type.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One completed request. Written once, never modified.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Verified subject, `None` for anonymous callers.
    pub identity: Option<String>,
    pub method: String,
    pub route: String,
    pub status: u16,
    /// Pipeline entry to handler completion, in milliseconds. Zero for rejections.
    pub elapsed_ms: f64,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    pub rate_limit_key: String,
}

/// Request-side fields known before the outcome.
#[derive(Debug, Clone)]
pub struct AuditContext {
    pub identity: Option<String>,
    pub method: String,
    pub route: String,
    pub request_id: Option<String>,
    pub rate_limit_key: String,
}

impl AuditContext {
    /// Complete the entry with the outcome.
    pub fn finish(self, status: u16, elapsed: Duration) -> AuditEntry {
        AuditEntry {
            identity: self.identity,
            method: self.method,
            route: self.route,
            status,
            elapsed_ms: elapsed.as_secs_f64() * 1000.0,
            timestamp: Utc::now(),
            request_id: self.request_id,
            rate_limit_key: self.rate_limit_key,
        }
    }
}
