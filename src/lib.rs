//! Request admission gateway.
//!
//! Sits in front of downstream HTTP services and decides, per request,
//! who is calling (bearer token), whether they are within their rate
//! limit (sliding-window log), and records every decision (audit trail).

pub mod admission;
pub mod audit;
pub mod auth;
pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod rate_limit;
pub mod routing;

pub use admission::AdmissionPipeline;
pub use config::schema::GatewayConfig;
pub use http::GatewayServer;
pub use lifecycle::Shutdown;
