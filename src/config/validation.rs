//! Configuration validation.
//!
//! Serde handles syntax; this module checks values that parse fine but
//! cannot run: missing secrets, zero windows, conflicting services.
//! All problems are reported, not just the first.

use std::collections::HashSet;

use axum::http::Uri;
use thiserror::Error;

use crate::config::schema::{AuditSinkKind, GatewayConfig, StoreBackend};

/// A single semantic problem with a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("auth.secret must not be empty")]
    MissingSecret,

    #[error("auth.algorithm `{0}` is not a supported HMAC algorithm")]
    UnsupportedAlgorithm(String),

    #[error("rate_limit.window_secs must be greater than zero")]
    ZeroWindow,

    #[error("rate_limit.store_timeout_ms must be greater than zero")]
    ZeroStoreTimeout,

    #[error("rate_limit.redis_url is required for the redis store")]
    MissingRedisUrl,

    #[error("audit.path is required for the file sink")]
    MissingAuditPath,

    #[error("timeouts.{0} must be greater than zero")]
    ZeroTimeout(&'static str),

    #[error("service name `{0}` is declared more than once")]
    DuplicateServiceName(String),

    #[error("service `{0}` reuses a path prefix and host of another service")]
    DuplicateServiceRoute(String),

    #[error("service `{0}` path_prefix must start with `/`")]
    InvalidPathPrefix(String),

    #[error("service `{name}` upstream `{upstream}` is not an http:// URI")]
    InvalidUpstream { name: String, upstream: String },
}

/// Validate a parsed configuration.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.auth.secret.is_empty() {
        errors.push(ValidationError::MissingSecret);
    }
    if !matches!(config.auth.algorithm.as_str(), "HS256" | "HS384" | "HS512") {
        errors.push(ValidationError::UnsupportedAlgorithm(config.auth.algorithm.clone()));
    }

    let rl = &config.rate_limit;
    if rl.window_secs == 0 {
        errors.push(ValidationError::ZeroWindow);
    }
    if rl.store_timeout_ms == 0 {
        errors.push(ValidationError::ZeroStoreTimeout);
    }
    if rl.store == StoreBackend::Redis && rl.redis_url.as_deref().unwrap_or("").is_empty() {
        errors.push(ValidationError::MissingRedisUrl);
    }

    if config.audit.sink == AuditSinkKind::File
        && config.audit.path.as_deref().unwrap_or("").is_empty()
    {
        errors.push(ValidationError::MissingAuditPath);
    }

    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::ZeroTimeout("request_secs"));
    }
    if config.timeouts.upstream_secs == 0 {
        errors.push(ValidationError::ZeroTimeout("upstream_secs"));
    }

    let mut names = HashSet::new();
    let mut routes = HashSet::new();
    for service in &config.services {
        if !names.insert(service.name.as_str()) {
            errors.push(ValidationError::DuplicateServiceName(service.name.clone()));
        }
        let host = service.host.as_deref().map(str::to_lowercase);
        if !routes.insert((service.path_prefix.clone(), host)) {
            errors.push(ValidationError::DuplicateServiceRoute(service.name.clone()));
        }
        if !service.path_prefix.starts_with('/') {
            errors.push(ValidationError::InvalidPathPrefix(service.name.clone()));
        }
        if !is_http_uri(&service.upstream) {
            errors.push(ValidationError::InvalidUpstream {
                name: service.name.clone(),
                upstream: service.upstream.clone(),
            });
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn is_http_uri(raw: &str) -> bool {
    match raw.parse::<Uri>() {
        Ok(uri) => uri.scheme_str() == Some("http") && uri.authority().is_some(),
        Err(_) => false,
    }
}
