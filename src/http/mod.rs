//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware stack)
//!     → request.rs (request id assigned or kept)
//!     → cors.rs (preflight answered, CORS headers)
//!     → admission pipeline (identity, rate limit, audit)
//!     → forward.rs (route lookup, proxy to upstream)
//!     → response.rs (gateway-generated bodies, quota headers)
//!     → Send to client
//! ```

pub mod cors;
pub mod forward;
pub mod request;
pub mod response;
pub mod server;

pub use request::X_REQUEST_ID;
pub use server::{GatewayServer, Sweeper};
