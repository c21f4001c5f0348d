//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events, pretty or JSON)
//!     → metrics.rs (counters, histograms)
//!
//! Consumers:
//!     → Log aggregation (stdout)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Degraded modes (store outage, audit failure) are always visible here
//! - Request ID flows through spans and audit entries
//! - Metrics are cheap (atomic increments); labels never carry identities

pub mod logging;
pub mod metrics;
