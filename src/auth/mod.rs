//! Authentication subsystem.
//!
//! # Data Flow
//! ```text
//! Authorization: Bearer <jwt>
//!     → token.rs (extract_bearer, verify signature + expiry)
//!     → Identity (subject) or TokenError
//! ```
//!
//! # Design Decisions
//! - Verification is a pure function of (token, key); no store lookups
//! - A failed verification is an ordinary value, never a panic
//! - Callers decide what a failure means; the admission pipeline treats it as anonymous

pub mod token;

pub use token::{extract_bearer, Identity, TokenError, TokenValidator};
