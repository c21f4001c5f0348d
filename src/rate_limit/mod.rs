//! Rate limiting subsystem.
//!
//! # Data Flow
//! ```text
//! Identity / peer address
//!     → key.rs (user:<id> | ip:<addr>)
//!     → limiter.rs (policy, timeout, fail-open)
//!     → store.rs trait
//!         → memory.rs (DashMap, single instance)
//!         → redis.rs (Lua script, shared across instances)
//! ```
//!
//! # Design Decisions
//! - Sliding-window log: exact counts, denied checks record nothing
//! - Expiry happens inside every check, not in a background sweep
//! - Per-key atomicity is the store's job; no global lock in the limiter
//! - Store outages admit traffic and are logged as degraded mode

pub mod clock;
pub mod key;
pub mod limiter;
pub mod memory;
pub mod redis;
pub mod store;

pub use clock::{Clock, ManualClock, SystemClock};
pub use key::RateLimitKey;
pub use limiter::{LimitOutcome, RateLimitPolicy, SlidingWindowLimiter};
pub use memory::MemoryWindowStore;
pub use self::redis::RedisWindowStore;
pub use store::{StoreError, WindowCheck, WindowDecision, WindowStore};
