//! Configuration loading from disk.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::GatewayConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Environment variable overriding `auth.secret`.
pub const ENV_JWT_SECRET: &str = "GATEWAY_JWT_SECRET";
/// Environment variable overriding `rate_limit.redis_url`.
pub const ENV_REDIS_URL: &str = "GATEWAY_REDIS_URL";

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join(.0))]
    Validation(Vec<ValidationError>),
}

fn join(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<GatewayConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    let mut config: GatewayConfig = toml::from_str(&content)?;

    apply_env_overrides(&mut config, |name| std::env::var(name).ok());
    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Apply secrets and endpoints supplied through the environment.
///
/// Takes a lookup function so callers (and tests) control the source.
pub fn apply_env_overrides<F>(config: &mut GatewayConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(secret) = lookup(ENV_JWT_SECRET).filter(|s| !s.is_empty()) {
        config.auth.secret = secret;
    }
    if let Some(url) = lookup(ENV_REDIS_URL).filter(|s| !s.is_empty()) {
        config.rate_limit.redis_url = Some(url);
    }
}
