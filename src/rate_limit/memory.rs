//! In-process window store.
//!
//! Suitable for a single gateway instance. Per-key atomicity comes from the
//! `DashMap` entry guard: the whole expire-count-insert sequence runs while
//! the key's shard lock is held, and never across an await point.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::rate_limit::clock::Clock;
use crate::rate_limit::store::{StoreError, WindowCheck, WindowDecision, WindowStore};

struct WindowRecord {
    stamps: VecDeque<i64>,
    /// Key is reclaimable at or after this instant.
    expires_at: i64,
}

/// Window store backed by a concurrent map.
#[derive(Default)]
pub struct MemoryWindowStore {
    records: DashMap<String, WindowRecord>,
}

impl MemoryWindowStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop keys whose TTL has passed. Returns how many were removed.
    pub fn purge_expired(&self, now: i64) -> usize {
        let before = self.records.len();
        self.records.retain(|_, record| record.expires_at > now);
        let removed = before.saturating_sub(self.records.len());
        tracing::debug!(removed, remaining = self.records.len(), "window store sweep complete");
        removed
    }

    /// Number of keys currently held.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Timestamps currently stored for `key`, oldest first.
    pub fn snapshot(&self, key: &str) -> Vec<i64> {
        self.records
            .get(key)
            .map(|r| r.stamps.iter().copied().collect())
            .unwrap_or_default()
    }
}

#[async_trait]
impl WindowStore for MemoryWindowStore {
    async fn check_and_record(&self, check: WindowCheck<'_>) -> Result<WindowDecision, StoreError> {
        let window_start = check.window_start();

        let mut entry = self
            .records
            .entry(check.key.to_string())
            .or_insert_with(|| WindowRecord {
                stamps: VecDeque::new(),
                expires_at: check.now,
            });
        let record = entry.value_mut();

        if record.expires_at <= check.now {
            record.stamps.clear();
        }
        record.stamps.retain(|&stamp| stamp > window_start);

        let count = record.stamps.len() as u64;
        if count >= check.limit {
            return Ok(WindowDecision {
                admitted: false,
                count,
            });
        }

        record.stamps.push_back(check.now);
        record.expires_at = check.now + check.window_secs as i64;

        Ok(WindowDecision {
            admitted: true,
            count: count + 1,
        })
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

/// Periodically reclaim idle keys until shutdown.
pub fn start_sweeper(
    store: Arc<MemoryWindowStore>,
    clock: Arc<dyn Clock>,
    every: Duration,
    mut shutdown: broadcast::Receiver<()>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.tick().await;
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    store.purge_expired(clock.now_secs());
                }
                _ = shutdown.recv() => {
                    tracing::debug!("window store sweeper stopping");
                    break;
                }
            }
        }
    })
}
