//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Admitted request (host, path)
//!     → router.rs (route lookup)
//!     → matcher.rs (evaluate match conditions)
//!     → Return: matched Route or None (404)
//!
//! Route Compilation (at startup):
//!     ServiceConfig[]
//!     → Parse upstream URIs
//!     → Sort by prefix length (longest first)
//!     → Freeze as immutable ServiceRouter
//! ```
//!
//! # Design Decisions
//! - Routes compiled at startup, immutable at runtime
//! - No regex in hot path (prefix matching only)
//! - Deterministic: same input always matches same route

pub mod matcher;
pub mod router;

pub use router::{InvalidUpstream, Route, ServiceRouter};
