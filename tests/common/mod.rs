//! Shared utilities for integration and load testing.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::Request,
    routing::any,
    Json, Router,
};
use serde_json::{json, Value};
use tokio::io::AsyncWriteExt;
use tokio::net::TcpListener;

use admission_gateway::audit::{AuditRecorder, InMemoryAuditSink};
use admission_gateway::auth::TokenValidator;
use admission_gateway::config::{GatewayConfig, ServiceConfig};
use admission_gateway::rate_limit::{ManualClock, MemoryWindowStore, RateLimitPolicy, SlidingWindowLimiter};
use admission_gateway::{AdmissionPipeline, GatewayServer, Shutdown};

pub const SECRET: &str = "integration-secret";

async fn echo(request: Request) -> Json<Value> {
    let header = |name: &str| {
        request
            .headers()
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };
    Json(json!({
        "method": request.method().as_str(),
        "path": request.uri().path(),
        "query": request.uri().query(),
        "subject": header("x-gateway-subject"),
        "forwarded_for": header("x-forwarded-for"),
        "request_id": header("x-request-id"),
        "authorization": header("authorization"),
    }))
}

/// Start an upstream that answers every request with a JSON echo of what it saw.
pub async fn start_echo_backend() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = Router::new()
        .route("/", any(echo))
        .route("/{*path}", any(echo));

    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    addr
}

/// Start a backend that accepts connections and never answers.
pub async fn start_silent_backend() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            held.push(socket);
        }
    });
    addr
}

/// Start a backend that returns a fixed status with a plain body.
pub async fn start_status_backend(status_line: &'static str) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                let mut buf = [0u8; 4096];
                let _ = tokio::io::AsyncReadExt::read(&mut socket, &mut buf).await;
                let body = "upstream says no";
                let response = format!(
                    "HTTP/1.1 {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    status_line,
                    body.len(),
                    body
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
                tokio::time::sleep(Duration::from_millis(10)).await;
            });
        }
    });
    addr
}

/// An address nothing is listening on.
pub async fn closed_port() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}

pub fn service(name: &str, prefix: &str, upstream: SocketAddr) -> ServiceConfig {
    ServiceConfig {
        name: name.into(),
        path_prefix: prefix.into(),
        host: None,
        upstream: format!("http://{upstream}"),
        strip_prefix: false,
    }
}

pub fn config_with(services: Vec<ServiceConfig>) -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.auth.secret = SECRET.into();
    config.services = services;
    config
}

/// Server with an in-memory store, a frozen clock and an inspectable audit sink.
pub fn gateway(config: &GatewayConfig, limit: u64, window_secs: u64) -> (GatewayServer, Arc<InMemoryAuditSink>) {
    let sink = Arc::new(InMemoryAuditSink::new());
    let limiter = SlidingWindowLimiter::new(
        Arc::new(MemoryWindowStore::new()),
        Arc::new(ManualClock::new(1_700_000_000)),
        RateLimitPolicy::new(limit, window_secs),
    );
    let pipeline = AdmissionPipeline::new(TokenValidator::hs256(SECRET), limiter, AuditRecorder::new(sink.clone()));
    let server = GatewayServer::new(config, pipeline, None).unwrap();
    (server, sink)
}

/// Serve `server` on an ephemeral port.
pub async fn start_gateway(server: GatewayServer) -> (SocketAddr, Shutdown) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();
    let stopped = shutdown.subscribe();

    tokio::spawn(async move {
        let _ = server.run(listener, stopped).await;
    });
    (addr, shutdown)
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}

pub fn token(subject: &str) -> String {
    TokenValidator::hs256(SECRET)
        .issue(subject, Duration::from_secs(600))
        .unwrap()
}
