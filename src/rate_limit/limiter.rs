//! Sliding-window log limiter.
//!
//! Exact, not approximated: every admission is a stored timestamp, and a
//! check counts the timestamps still inside the trailing window.
//!
//! ```text
//! now = clock()            window_start = now - window
//! drop stamps <= window_start
//! count >= limit  → Denied   (nothing recorded)
//! otherwise       → record now, refresh TTL → Admitted
//! store failure   → Degraded (admitted, logged)
//! ```

use std::sync::Arc;
use std::time::Duration;

use crate::config::RateLimitConfig;
use crate::observability::metrics;
use crate::rate_limit::clock::Clock;
use crate::rate_limit::key::RateLimitKey;
use crate::rate_limit::store::{StoreError, WindowCheck, WindowStore};

/// Admissions allowed per window for one gateway tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitPolicy {
    pub limit: u64,
    pub window_secs: u64,
}

impl RateLimitPolicy {
    pub const fn new(limit: u64, window_secs: u64) -> Self {
        Self { limit, window_secs }
    }
}

impl Default for RateLimitPolicy {
    fn default() -> Self {
        Self::new(100, 60)
    }
}

/// Decision for one request.
#[derive(Debug)]
pub enum LimitOutcome {
    /// Recorded in the window.
    Admitted { count: u64, limit: u64 },
    /// Window is full; nothing recorded.
    Denied { count: u64, limit: u64 },
    /// The store could not be consulted; admitted without accounting.
    Degraded { reason: StoreError },
    /// Rate limiting is switched off.
    Bypassed,
}

impl LimitOutcome {
    pub fn is_admitted(&self) -> bool {
        !matches!(self, LimitOutcome::Denied { .. })
    }

    /// `(limit, remaining)` when the store gave a definite answer.
    pub fn quota(&self) -> Option<(u64, u64)> {
        match *self {
            LimitOutcome::Admitted { count, limit } | LimitOutcome::Denied { count, limit } => {
                Some((limit, limit.saturating_sub(count)))
            }
            _ => None,
        }
    }
}

/// Applies a [`RateLimitPolicy`] against a shared [`WindowStore`].
#[derive(Clone)]
pub struct SlidingWindowLimiter {
    store: Arc<dyn WindowStore>,
    clock: Arc<dyn Clock>,
    policy: RateLimitPolicy,
    key_prefix: String,
    store_timeout: Duration,
    enabled: bool,
}

impl SlidingWindowLimiter {
    pub fn new(store: Arc<dyn WindowStore>, clock: Arc<dyn Clock>, policy: RateLimitPolicy) -> Self {
        Self {
            store,
            clock,
            policy,
            key_prefix: "rate_limit:".to_string(),
            store_timeout: Duration::from_millis(250),
            enabled: true,
        }
    }

    pub fn from_config(store: Arc<dyn WindowStore>, clock: Arc<dyn Clock>, config: &RateLimitConfig) -> Self {
        Self::new(store, clock, RateLimitPolicy::new(config.limit, config.window_secs))
            .with_key_prefix(config.key_prefix.clone())
            .with_store_timeout(Duration::from_millis(config.store_timeout_ms))
            .with_enabled(config.enabled)
    }

    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = prefix.into();
        self
    }

    pub fn with_store_timeout(mut self, timeout: Duration) -> Self {
        self.store_timeout = timeout;
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn policy(&self) -> RateLimitPolicy {
        self.policy
    }

    pub fn store_name(&self) -> &'static str {
        self.store.name()
    }

    /// Run one admission check for `key`.
    pub async fn check(&self, key: &RateLimitKey) -> LimitOutcome {
        if !self.enabled {
            return LimitOutcome::Bypassed;
        }

        let limit = self.policy.limit;
        if limit == 0 {
            return LimitOutcome::Denied { count: 0, limit };
        }

        let store_key = format!("{}{}", self.key_prefix, key);
        let now = self.clock.now_secs();
        let member = format!("{now}:{}", uuid::Uuid::new_v4());
        let check = WindowCheck {
            key: &store_key,
            now,
            window_secs: self.policy.window_secs,
            limit,
            member: &member,
        };

        let result = match tokio::time::timeout(self.store_timeout, self.store.check_and_record(check)).await {
            Ok(result) => result,
            Err(_) => Err(StoreError::Timeout(self.store_timeout.as_millis() as u64)),
        };

        match result {
            Ok(decision) if decision.admitted => LimitOutcome::Admitted {
                count: decision.count,
                limit,
            },
            Ok(decision) => {
                tracing::debug!(key = %key, count = decision.count, limit, "Rate limit exceeded");
                LimitOutcome::Denied {
                    count: decision.count,
                    limit,
                }
            }
            Err(reason) => {
                tracing::warn!(
                    key = %key,
                    store = self.store.name(),
                    error = %reason,
                    "Rate-limit store unavailable, admitting request in degraded mode"
                );
                metrics::record_rate_limit_degraded(reason.reason());
                LimitOutcome::Degraded { reason }
            }
        }
    }
}
