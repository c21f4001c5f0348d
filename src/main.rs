//! Admission gateway.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ─────────────▶ trace ─▶ request id ─▶ catch panic ─▶ admission ─▶ timeout ─▶ forward ─▶ Upstream
//!                                                            │
//!                                              ┌─────────────┼──────────────┐
//!                                              ▼             ▼              ▼
//!                                            auth       rate_limit        audit
//!                                         (bearer JWT)  (memory|redis)  (file|tracing)
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use admission_gateway::config::{load_config, loader::apply_env_overrides, validation::validate_config, ConfigError};
use admission_gateway::lifecycle::{build_server, spawn_signal_handler, Shutdown};
use admission_gateway::observability::{logging::init_logging, metrics::init_metrics};
use admission_gateway::GatewayConfig;

#[derive(Parser)]
#[command(name = "admission-gateway")]
#[command(about = "Authenticating, rate-limiting, auditing HTTP gateway", long_about = None)]
struct Args {
    /// Path to the TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override `listener.bind_address`.
    #[arg(short, long)]
    bind: Option<String>,
}

fn resolve_config(args: &Args) -> Result<GatewayConfig, ConfigError> {
    let mut config = match &args.config {
        Some(path) => load_config(path)?,
        None => {
            let mut config = GatewayConfig::default();
            apply_env_overrides(&mut config, |name| std::env::var(name).ok());
            validate_config(&config).map_err(ConfigError::Validation)?;
            config
        }
    };
    if let Some(bind) = &args.bind {
        config.listener.bind_address = bind.clone();
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let config = resolve_config(&args)?;

    init_logging(&config.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "admission-gateway starting");

    tracing::info!(
        bind_address = %config.listener.bind_address,
        services = config.services.len(),
        limit = config.rate_limit.limit,
        window_secs = config.rate_limit.window_secs,
        request_timeout_secs = config.timeouts.request_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let server = build_server(&config).await?;

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    let stopped = shutdown.subscribe();
    spawn_signal_handler(shutdown);

    server.run(listener, stopped).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
