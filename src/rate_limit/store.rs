//! Window store abstraction.
//!
//! A store keeps, per key, the timestamps of recent admissions. The whole
//! expire-count-insert sequence is one call so each backend can make it
//! atomic per key in its own way (entry lock, server-side script).

use async_trait::async_trait;
use thiserror::Error;

/// Result of one expire-count-insert round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowDecision {
    pub admitted: bool,
    /// Entries in the window after this check (including the new one when admitted).
    pub count: u64,
}

/// Parameters of a single check.
#[derive(Debug, Clone, Copy)]
pub struct WindowCheck<'a> {
    /// Fully qualified store key, e.g. `rate_limit:user:42`.
    pub key: &'a str,
    pub now: i64,
    pub window_secs: u64,
    pub limit: u64,
    /// Unique member for the timestamp set.
    pub member: &'a str,
}

impl WindowCheck<'_> {
    /// Timestamps at or before this instant are expired.
    pub fn window_start(&self) -> i64 {
        self.now - self.window_secs as i64
    }
}

/// Backing store failures. All of them make the limiter fail open.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("rate-limit store unavailable: {0}")]
    Unavailable(String),

    #[error("rate-limit store timed out after {0} ms")]
    Timeout(u64),

    #[error("rate-limit store returned an unexpected reply: {0}")]
    Protocol(String),
}

impl StoreError {
    /// Metric label.
    pub fn reason(&self) -> &'static str {
        match self {
            StoreError::Unavailable(_) => "unavailable",
            StoreError::Timeout(_) => "timeout",
            StoreError::Protocol(_) => "protocol",
        }
    }
}

#[async_trait]
pub trait WindowStore: Send + Sync {
    /// Expire entries `<= now - window`, count the rest, and record `now`
    /// only if the count is below `limit`. Atomic per key.
    async fn check_and_record(&self, check: WindowCheck<'_>) -> Result<WindowDecision, StoreError>;

    /// Backend name for logs and health output.
    fn name(&self) -> &'static str;
}
