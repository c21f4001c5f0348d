//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the admission gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Bearer token verification.
    pub auth: AuthConfig,

    /// Sliding-window rate limiting.
    pub rate_limit: RateLimitConfig,

    /// Audit sink selection.
    pub audit: AuditConfig,

    /// Internal services fronted by the gateway.
    pub services: Vec<ServiceConfig>,

    /// Cross-origin resource sharing.
    pub cors: CorsConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8000").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8000".to_string(),
        }
    }
}

/// Timeout configuration for various operations.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time spent in the downstream handler) in seconds.
    pub request_secs: u64,

    /// Upstream service response timeout in seconds.
    pub upstream_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            request_secs: 30,
            upstream_secs: 10,
        }
    }
}

/// Token verification settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Shared HMAC secret. Overridden by `GATEWAY_JWT_SECRET`.
    #[serde(skip_serializing)]
    pub secret: String,

    /// Signing algorithm name (HS256, HS384, HS512).
    pub algorithm: String,

    /// Expected `iss` claim, if any.
    pub issuer: Option<String>,

    /// Clock skew tolerance in seconds.
    pub leeway_secs: u64,

    /// Lifetime of tokens minted by the gateway tooling.
    pub token_ttl_secs: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            secret: String::new(),
            algorithm: "HS256".to_string(),
            issuer: None,
            leeway_secs: 0,
            token_ttl_secs: 30 * 60,
        }
    }
}

/// Which backing store holds the window records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Memory,
    Redis,
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Enable rate limiting. When disabled every request is admitted.
    pub enabled: bool,

    /// Admissions allowed per window.
    pub limit: u64,

    /// Window length in seconds.
    pub window_secs: u64,

    /// Namespace prepended to every key in the store.
    pub key_prefix: String,

    /// Backing store.
    pub store: StoreBackend,

    /// Redis connection URL (required for the redis store).
    pub redis_url: Option<String>,

    /// Upper bound on a single store round trip in milliseconds.
    pub store_timeout_ms: u64,

    /// How often the memory store reclaims idle keys.
    pub sweep_interval_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            limit: 100,
            window_secs: 60,
            key_prefix: "rate_limit:".to_string(),
            store: StoreBackend::Memory,
            redis_url: None,
            store_timeout_ms: 250,
            sweep_interval_secs: 60,
        }
    }
}

/// Where audit entries are written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditSinkKind {
    File,
    Tracing,
    Memory,
}

/// Audit configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AuditConfig {
    pub sink: AuditSinkKind,

    /// Path of the JSON-lines file for the file sink.
    pub path: Option<String>,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            sink: AuditSinkKind::Tracing,
            path: None,
        }
    }
}

/// An internal service reachable through the gateway.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServiceConfig {
    /// Service identifier for logging/metrics.
    pub name: String,

    /// Path prefix to match (segment boundary aware).
    pub path_prefix: String,

    /// Host header to match (case-insensitive), if any.
    #[serde(default)]
    pub host: Option<String>,

    /// Upstream base URI, e.g. "http://127.0.0.1:9001".
    pub upstream: String,

    /// Remove `path_prefix` before forwarding.
    #[serde(default)]
    pub strip_prefix: bool,
}

/// CORS policy applied in front of the admission pipeline.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CorsConfig {
    pub enabled: bool,

    /// Allowed origins; `"*"` allows any.
    pub allowed_origins: Vec<String>,

    /// With `"*"` origins, the request origin is echoed back instead.
    pub allow_credentials: bool,

    pub max_age_secs: u64,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            allowed_origins: vec!["*".to_string()],
            allow_credentials: true,
            max_age_secs: 600,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: true,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
