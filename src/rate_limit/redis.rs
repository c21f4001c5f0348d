//! Redis-backed window store.
//!
//! Each key is a sorted set scored by admission time. The expire-count-insert
//! sequence runs as one Lua script, which Redis executes atomically, so
//! gateway instances sharing a Redis agree on every window.

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use tokio::sync::Mutex;

use crate::rate_limit::store::{StoreError, WindowCheck, WindowDecision, WindowStore};

const SLIDING_WINDOW_SCRIPT: &str = r#"
local key = KEYS[1]
local now = tonumber(ARGV[1])
local window = tonumber(ARGV[2])
local limit = tonumber(ARGV[3])
redis.call('ZREMRANGEBYSCORE', key, '-inf', now - window)
local count = redis.call('ZCARD', key)
if count >= limit then
    return {0, count}
end
redis.call('ZADD', key, now, ARGV[4])
redis.call('EXPIRE', key, window)
return {1, count + 1}
"#;

/// Window store shared through Redis.
pub struct RedisWindowStore {
    client: redis::Client,
    script: redis::Script,
    connection: Mutex<Option<MultiplexedConnection>>,
}

impl RedisWindowStore {
    /// Create the store. No connection is made until the first check, so a
    /// Redis outage at startup does not keep the gateway down.
    pub fn new(url: &str) -> Result<Self, StoreError> {
        let client = redis::Client::open(url)
            .map_err(|e| StoreError::Unavailable(format!("invalid redis url: {e}")))?;

        Ok(Self {
            client,
            script: redis::Script::new(SLIDING_WINDOW_SCRIPT),
            connection: Mutex::new(None),
        })
    }

    async fn connection(&self) -> Result<MultiplexedConnection, StoreError> {
        let mut cached = self.connection.lock().await;
        if let Some(conn) = cached.as_ref() {
            return Ok(conn.clone());
        }

        let conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        tracing::info!("connected to redis rate-limit store");
        *cached = Some(conn.clone());
        Ok(conn)
    }

    async fn forget_connection(&self) {
        self.connection.lock().await.take();
    }
}

#[async_trait]
impl WindowStore for RedisWindowStore {
    async fn check_and_record(&self, check: WindowCheck<'_>) -> Result<WindowDecision, StoreError> {
        let mut conn = self.connection().await?;

        let reply: Result<Vec<i64>, redis::RedisError> = self
            .script
            .key(check.key)
            .arg(check.now)
            .arg(check.window_secs)
            .arg(check.limit)
            .arg(check.member)
            .invoke_async(&mut conn)
            .await;

        match reply {
            Ok(values) => match values.as_slice() {
                [admitted, count] if *count >= 0 => Ok(WindowDecision {
                    admitted: *admitted == 1,
                    count: *count as u64,
                }),
                other => Err(StoreError::Protocol(format!("{other:?}"))),
            },
            Err(e) => {
                if e.is_io_error() || e.is_connection_dropped() || e.is_connection_refusal() {
                    self.forget_connection().await;
                }
                Err(StoreError::Unavailable(e.to_string()))
            }
        }
    }

    fn name(&self) -> &'static str {
        "redis"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn check<'a>(key: &'a str, now: i64, member: &'a str) -> WindowCheck<'a> {
        WindowCheck {
            key,
            now,
            window_secs: 60,
            limit: 2,
            member,
        }
    }

    #[test]
    fn test_invalid_url() {
        assert!(matches!(
            RedisWindowStore::new("not a url"),
            Err(StoreError::Unavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_unreachable_server_is_unavailable() {
        let store = RedisWindowStore::new("redis://127.0.0.1:1/").unwrap();
        let result = store.check_and_record(check("rate_limit:test", 0, "a")).await;
        assert!(matches!(result, Err(StoreError::Unavailable(_))));
    }

    #[tokio::test]
    #[ignore] // Requires Redis
    async fn test_redis_window() {
        let store = RedisWindowStore::new("redis://127.0.0.1/").unwrap();
        let key = format!("rate_limit:test:{}", uuid::Uuid::new_v4());

        assert!(store.check_and_record(check(&key, 1000, "a")).await.unwrap().admitted);
        assert!(store.check_and_record(check(&key, 1000, "b")).await.unwrap().admitted);
        let denied = store.check_and_record(check(&key, 1001, "c")).await.unwrap();
        assert!(!denied.admitted);
        assert_eq!(denied.count, 2);

        let later = store.check_and_record(check(&key, 1060, "d")).await.unwrap();
        assert!(later.admitted);
        assert_eq!(later.count, 1);
    }
}
