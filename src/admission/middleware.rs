//! Axum adapter for the admission pipeline.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::Request,
    middleware::Next,
    response::Response,
};

use crate::admission::pipeline::AdmissionPipeline;

/// Peer address of the connection, when the server was started with connect info.
pub fn client_origin(request: &Request<Body>) -> Option<IpAddr> {
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip())
}

/// Middleware function running every request through the pipeline.
pub async fn admission_middleware(
    State(pipeline): State<Arc<AdmissionPipeline>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let origin = client_origin(&request);
    pipeline.run(request, origin, |request| next.run(request)).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::{AuditRecorder, InMemoryAuditSink};
    use crate::auth::{Identity, TokenValidator};
    use crate::rate_limit::{ManualClock, MemoryWindowStore, RateLimitPolicy, SlidingWindowLimiter};
    use axum::http::StatusCode;
    use axum::routing::get;
    use axum::{Extension, Router};
    use tower::ServiceExt;

    fn app(sink: Arc<InMemoryAuditSink>) -> Router {
        let limiter = SlidingWindowLimiter::new(
            Arc::new(MemoryWindowStore::new()),
            Arc::new(ManualClock::new(0)),
            RateLimitPolicy::new(2, 60),
        );
        let pipeline = Arc::new(AdmissionPipeline::new(
            TokenValidator::hs256("mw-secret"),
            limiter,
            AuditRecorder::new(sink),
        ));

        Router::new()
            .route(
                "/whoami",
                get(|identity: Option<Extension<Identity>>| async move {
                    identity.map(|Extension(i)| i.to_string()).unwrap_or_else(|| "anonymous".into())
                }),
            )
            .layer(axum::middleware::from_fn_with_state(pipeline, admission_middleware))
    }

    fn request(peer: &str) -> Request<Body> {
        let mut request = Request::builder().uri("/whoami").body(Body::empty()).unwrap();
        let addr: SocketAddr = peer.parse().unwrap();
        request.extensions_mut().insert(ConnectInfo(addr));
        request
    }

    #[tokio::test]
    async fn test_limits_per_peer_address() {
        let sink = Arc::new(InMemoryAuditSink::new());
        let app = app(sink.clone());

        for _ in 0..2 {
            let response = app.clone().oneshot(request("10.1.1.1:5000")).await.unwrap();
            assert_eq!(response.status(), StatusCode::OK);
        }
        let response = app.clone().oneshot(request("10.1.1.1:5001")).await.unwrap();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);

        let other = app.clone().oneshot(request("10.2.2.2:5000")).await.unwrap();
        assert_eq!(other.status(), StatusCode::OK);

        let keys: Vec<String> = sink.entries().into_iter().map(|e| e.rate_limit_key).collect();
        assert_eq!(keys, vec!["ip:10.1.1.1", "ip:10.1.1.1", "ip:10.1.1.1", "ip:10.2.2.2"]);
    }

    #[tokio::test]
    async fn test_missing_connect_info_uses_unknown_origin() {
        let sink = Arc::new(InMemoryAuditSink::new());
        let response = app(sink.clone())
            .oneshot(Request::builder().uri("/whoami").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(sink.entries()[0].rate_limit_key, "ip:unknown");
    }

    #[tokio::test]
    async fn test_identity_reaches_handler() {
        let sink = Arc::new(InMemoryAuditSink::new());
        let token = TokenValidator::hs256("mw-secret")
            .issue("7", std::time::Duration::from_secs(60))
            .unwrap();
        let mut request = request("10.1.1.1:5000");
        request
            .headers_mut()
            .insert("authorization", format!("Bearer {token}").parse().unwrap());

        let response = app(sink).oneshot(request).await.unwrap();
        let body = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        assert_eq!(&body[..], b"7");
    }
}
