//! Startup orchestration.
//!
//! # Responsibilities
//! - Build the window store, audit sink and token validator from config
//! - Assemble the admission pipeline
//! - Compile routes and hand everything to the HTTP server
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Subsystems initialize in order, not concurrently
//! - Redis is not contacted here; an unreachable store degrades at request time

use std::sync::Arc;
use std::time::Duration;

use crate::admission::AdmissionPipeline;
use crate::audit::{AuditError, AuditRecorder, AuditSink, InMemoryAuditSink, JsonLinesAuditSink, TracingAuditSink};
use crate::auth::{TokenError, TokenValidator};
use crate::config::{AuditSinkKind, GatewayConfig, StoreBackend};
use crate::http::{GatewayServer, Sweeper};
use crate::rate_limit::{
    Clock, MemoryWindowStore, RedisWindowStore, SlidingWindowLimiter, StoreError, SystemClock, WindowStore,
};
use crate::routing::InvalidUpstream;

#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("token validator: {0}")]
    Token(#[from] TokenError),

    #[error("rate limit store: {0}")]
    Store(#[from] StoreError),

    #[error("audit sink: {0}")]
    Audit(#[from] AuditError),

    #[error("audit sink 'file' requires audit.path")]
    MissingAuditPath,

    #[error("routes: {0}")]
    Routes(#[from] InvalidUpstream),
}

/// A pipeline plus the background work its store needs.
pub struct PipelineParts {
    pub pipeline: AdmissionPipeline,
    pub sweeper: Option<Sweeper>,
}

/// Construct the admission pipeline described by `config`.
pub async fn build_pipeline(config: &GatewayConfig) -> Result<PipelineParts, StartupError> {
    let validator = TokenValidator::from_config(&config.auth)?;
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let rate_limit = &config.rate_limit;
    let (store, sweeper): (Arc<dyn WindowStore>, Option<Sweeper>) = match rate_limit.store {
        StoreBackend::Memory => {
            let store = Arc::new(MemoryWindowStore::new());
            let sweeper = Sweeper {
                store: store.clone(),
                clock: clock.clone(),
                every: Duration::from_secs(rate_limit.sweep_interval_secs.max(1)),
            };
            (store, Some(sweeper))
        }
        StoreBackend::Redis => {
            let url = rate_limit.redis_url.as_deref().unwrap_or_default();
            (Arc::new(RedisWindowStore::new(url)?), None)
        }
    };
    let limiter = SlidingWindowLimiter::from_config(store, clock, rate_limit);

    let sink: Arc<dyn AuditSink> = match config.audit.sink {
        AuditSinkKind::File => {
            let path = config.audit.path.as_ref().ok_or(StartupError::MissingAuditPath)?;
            Arc::new(JsonLinesAuditSink::open(path).await?)
        }
        AuditSinkKind::Tracing => Arc::new(TracingAuditSink),
        AuditSinkKind::Memory => Arc::new(InMemoryAuditSink::new()),
    };

    tracing::info!(
        store = limiter.store_name(),
        sink = sink.name(),
        limit = rate_limit.limit,
        window_secs = rate_limit.window_secs,
        enabled = rate_limit.enabled,
        "Admission pipeline ready"
    );

    Ok(PipelineParts {
        pipeline: AdmissionPipeline::new(validator, limiter, AuditRecorder::new(sink)),
        sweeper,
    })
}

/// Build the complete server for `config`.
pub async fn build_server(config: &GatewayConfig) -> Result<GatewayServer, StartupError> {
    let parts = build_pipeline(config).await?;
    Ok(GatewayServer::new(config, parts.pipeline, parts.sweeper)?)
}
