//! Request admission subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → middleware.rs (peer address from ConnectInfo)
//!     → pipeline.rs
//!         → auth::TokenValidator (best effort)
//!         → rate_limit::SlidingWindowLimiter (user:<id> | ip:<addr>)
//!         → denied: audit + 429
//!         → admitted: guard.rs armed → downstream handler → audit
//! ```
//!
//! # Design Decisions
//! - Availability over strictness: internal failures degrade, never reject
//! - Limit exceeded is a normal outcome with its own status (429)
//! - Recording is tied to the guard's lifetime, not to a happy-path call

pub mod guard;
pub mod middleware;
pub mod pipeline;

pub use middleware::{admission_middleware, client_origin};
pub use pipeline::{Admission, AdmissionPipeline};
