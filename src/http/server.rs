//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with the health and forwarding handlers
//! - Wire up middleware (trace, request id, CORS, panic catching, admission, timeout)
//! - Bind server to listener with peer address info
//! - Run the memory store sweeper alongside the server
//! - Stop on the shutdown broadcast

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::State,
    response::IntoResponse,
    routing::{any, get},
    Json, Router,
};
use serde_json::json;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{catch_panic::CatchPanicLayer, timeout::TimeoutLayer, trace::TraceLayer};

use crate::admission::{admission_middleware, AdmissionPipeline};
use crate::config::{CorsConfig, GatewayConfig};
use crate::http::cors::build_cors_layer;
use crate::http::forward::{forward, ForwardState};
use crate::http::request::{propagate_request_id_layer, set_request_id_layer};
use crate::rate_limit::{memory::start_sweeper, Clock, MemoryWindowStore};
use crate::routing::{InvalidUpstream, ServiceRouter};

/// Background expiry for the in-process window store.
pub struct Sweeper {
    pub store: Arc<MemoryWindowStore>,
    pub clock: Arc<dyn Clock>,
    pub every: Duration,
}

#[derive(Clone)]
struct HealthState {
    store: &'static str,
    sink: &'static str,
    services: usize,
}

/// HTTP server for the admission gateway.
pub struct GatewayServer {
    router: Router,
    sweeper: Option<Sweeper>,
}

impl GatewayServer {
    /// Create a new server around an already-built pipeline.
    pub fn new(
        config: &GatewayConfig,
        pipeline: AdmissionPipeline,
        sweeper: Option<Sweeper>,
    ) -> Result<Self, InvalidUpstream> {
        let service_router = Arc::new(ServiceRouter::from_config(&config.services)?);
        let health = HealthState {
            store: pipeline.limiter().store_name(),
            sink: pipeline.recorder().sink_name(),
            services: service_router.len(),
        };
        let forward_state = ForwardState::new(
            service_router,
            Duration::from_secs(config.timeouts.upstream_secs),
        );

        let router = Self::build_router(
            Arc::new(pipeline),
            forward_state,
            health,
            &config.cors,
            Duration::from_secs(config.timeouts.request_secs),
        );
        Ok(Self { router, sweeper })
    }

    /// Build the Axum router with all middleware layers.
    ///
    /// Layers run outermost first: trace, request id, CORS, panic catching,
    /// admission, then the request timeout, so a timed-out request is
    /// still recorded with the 408 the timeout layer produces.
    #[allow(deprecated)]
    fn build_router(
        pipeline: Arc<AdmissionPipeline>,
        forward_state: ForwardState,
        health: HealthState,
        cors: &CorsConfig,
        request_timeout: Duration,
    ) -> Router {
        let health_routes = Router::new()
            .route("/health", get(health_handler))
            .with_state(health);

        let router = Router::new()
            .route("/{*path}", any(forward))
            .route("/", any(forward))
            .with_state(forward_state)
            .merge(health_routes)
            .layer(TimeoutLayer::new(request_timeout))
            .layer(axum::middleware::from_fn_with_state(pipeline, admission_middleware))
            .layer(CatchPanicLayer::new());

        let router = match build_cors_layer(cors) {
            Some(cors) => router.layer(cors),
            None => router,
        };

        router
            .layer(propagate_request_id_layer())
            .layer(set_request_id_layer())
            .layer(TraceLayer::new_for_http())
    }

    /// The fully layered router, for serving in-process.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Run the server until the shutdown broadcast fires.
    pub async fn run(self, listener: TcpListener, mut shutdown: broadcast::Receiver<()>) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let sweeper = self.sweeper.map(|s| start_sweeper(s.store, s.clock, s.every, shutdown.resubscribe()));

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received, draining connections");
            })
            .await?;

        if let Some(handle) = sweeper {
            let _ = handle.await;
        }

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

async fn health_handler(State(health): State<HealthState>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "rate_limit_store": health.store,
        "audit_sink": health.sink,
        "services": health.services,
    }))
}
