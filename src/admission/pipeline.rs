//! The per-request admission state machine.
//!
//! ```text
//! START ─validate token─▶ IDENTIFIED ─derive key─▶ KEYED ─limiter─┬─▶ DENIED ──▶ RECORDED(429) ─▶ END
//!                                                                 └─▶ ADMITTED ─▶ handler ─▶ RECORDED(status) ─▶ END
//! ```
//!
//! Nothing that happens inside the pipeline is allowed to fail the request:
//! bad tokens become anonymous callers, store outages admit, audit failures
//! are logged. Only the downstream handler decides the response status of
//! an admitted request.

use std::future::Future;
use std::net::IpAddr;
use std::time::Instant;

use axum::body::Body;
use axum::http::{HeaderMap, Request};
use axum::response::Response;

use crate::admission::guard::RecordGuard;
use crate::audit::{AuditContext, AuditRecorder};
use crate::auth::{extract_bearer, Identity, TokenValidator};
use crate::http::request::request_id;
use crate::http::response::{apply_quota_headers, too_many_requests};
use crate::observability::metrics;
use crate::rate_limit::{LimitOutcome, RateLimitKey, SlidingWindowLimiter};

/// State of a request after the admission check.
#[derive(Debug)]
pub struct Admission {
    pub identity: Option<Identity>,
    pub key: RateLimitKey,
    pub outcome: LimitOutcome,
}

/// Orchestrates token validation, rate limiting and audit recording.
///
/// Built once at startup with its collaborators injected, then shared
/// (behind an `Arc`) by every request.
#[derive(Clone)]
pub struct AdmissionPipeline {
    validator: TokenValidator,
    limiter: SlidingWindowLimiter,
    recorder: AuditRecorder,
}

impl AdmissionPipeline {
    pub fn new(validator: TokenValidator, limiter: SlidingWindowLimiter, recorder: AuditRecorder) -> Self {
        Self {
            validator,
            limiter,
            recorder,
        }
    }

    pub fn limiter(&self) -> &SlidingWindowLimiter {
        &self.limiter
    }

    pub fn recorder(&self) -> &AuditRecorder {
        &self.recorder
    }

    /// START → IDENTIFIED. Any credential problem yields `None`.
    pub fn identify(&self, headers: &HeaderMap) -> Option<Identity> {
        let token = extract_bearer(headers)?;
        match self.validator.validate(token) {
            Ok(identity) => Some(identity),
            Err(err) => {
                tracing::debug!(error = %err, "Bearer token rejected, continuing as anonymous");
                None
            }
        }
    }

    /// START → ADMITTED | DENIED.
    pub async fn admit(&self, headers: &HeaderMap, origin: Option<IpAddr>) -> Admission {
        let identity = self.identify(headers);
        let key = RateLimitKey::for_request(identity.as_ref(), origin);
        let outcome = self.limiter.check(&key).await;
        Admission {
            identity,
            key,
            outcome,
        }
    }

    /// Run the whole pipeline around `handler`.
    ///
    /// Exactly one audit entry is produced whichever way the request ends:
    /// denied, handled, panicked, or dropped mid-flight.
    pub async fn run<F, Fut>(&self, mut request: Request<Body>, origin: Option<IpAddr>, handler: F) -> Response
    where
        F: FnOnce(Request<Body>) -> Fut,
        Fut: Future<Output = Response>,
    {
        let started = Instant::now();
        let method = request.method().to_string();
        let route = request.uri().path().to_string();

        let identity = self.identify(request.headers());
        let key = RateLimitKey::for_request(identity.as_ref(), origin);
        let context = AuditContext {
            identity: identity.as_ref().map(|i| i.subject().to_string()),
            method: method.clone(),
            route: route.clone(),
            request_id: request_id(request.headers()).map(str::to_string),
            rate_limit_key: key.to_string(),
        };
        let guard = RecordGuard::arm(self.recorder.clone(), context, started);

        let outcome = self.limiter.check(&key).await;
        let quota = outcome.quota();

        if !outcome.is_admitted() {
            tracing::warn!(key = %key, route = %route, "Rate limit exceeded");
            metrics::record_rate_limited(key.kind());

            let mut response = too_many_requests();
            guard.reject(response.status()).await;
            apply_quota_headers(&mut response, quota);
            metrics::record_request(&method, response.status().as_u16(), started);
            return response;
        }

        if let Some(identity) = identity {
            request.extensions_mut().insert(identity);
        }

        let mut response = handler(request).await;
        let status = response.status();
        guard.complete(status).await;

        apply_quota_headers(&mut response, quota);
        metrics::record_request(&method, status.as_u16(), started);
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::{AuditEntry, AuditError, AuditSink, InMemoryAuditSink};
    use crate::http::response::{X_RATELIMIT_LIMIT, X_RATELIMIT_REMAINING};
    use crate::rate_limit::{
        ManualClock, MemoryWindowStore, RateLimitPolicy, StoreError, WindowCheck, WindowDecision, WindowStore,
    };
    use async_trait::async_trait;
    use axum::http::header::AUTHORIZATION;
    use axum::http::StatusCode;
    use axum::response::IntoResponse;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    const SECRET: &str = "pipeline-secret";

    struct BrokenStore;

    #[async_trait]
    impl WindowStore for BrokenStore {
        async fn check_and_record(&self, _: WindowCheck<'_>) -> Result<WindowDecision, StoreError> {
            Err(StoreError::Unavailable("connection refused".into()))
        }

        fn name(&self) -> &'static str {
            "broken"
        }
    }

    struct SlowStore {
        delay: Duration,
        inner: MemoryWindowStore,
    }

    #[async_trait]
    impl WindowStore for SlowStore {
        async fn check_and_record(&self, check: WindowCheck<'_>) -> Result<WindowDecision, StoreError> {
            tokio::time::sleep(self.delay).await;
            self.inner.check_and_record(check).await
        }

        fn name(&self) -> &'static str {
            "slow"
        }
    }

    struct FailingSink;

    #[async_trait]
    impl AuditSink for FailingSink {
        async fn append(&self, _: &AuditEntry) -> Result<(), AuditError> {
            Err(AuditError::Rejected("disk full".into()))
        }

        fn name(&self) -> &'static str {
            "failing"
        }
    }

    struct Harness {
        pipeline: AdmissionPipeline,
        sink: Arc<InMemoryAuditSink>,
        validator: TokenValidator,
    }

    fn harness_with(store: Arc<dyn WindowStore>, limit: u64) -> Harness {
        let validator = TokenValidator::hs256(SECRET);
        let sink = Arc::new(InMemoryAuditSink::new());
        let limiter = SlidingWindowLimiter::new(store, Arc::new(ManualClock::new(1_000)), RateLimitPolicy::new(limit, 60));
        Harness {
            pipeline: AdmissionPipeline::new(validator.clone(), limiter, AuditRecorder::new(sink.clone())),
            sink,
            validator,
        }
    }

    fn harness(limit: u64) -> Harness {
        harness_with(Arc::new(MemoryWindowStore::new()), limit)
    }

    fn origin() -> Option<IpAddr> {
        Some("10.0.0.1".parse().unwrap())
    }

    fn request(path: &str, token: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().uri(path).header("x-request-id", "req-1");
        if let Some(token) = token {
            builder = builder.header(AUTHORIZATION, format!("Bearer {token}"));
        }
        builder.body(Body::empty()).unwrap()
    }

    async fn ok(_req: Request<Body>) -> Response {
        StatusCode::OK.into_response()
    }

    #[tokio::test]
    async fn test_anonymous_request_is_keyed_by_origin() {
        let h = harness(10);
        let response = h.pipeline.run(request("/data", None), origin(), ok).await;

        assert_eq!(response.status(), StatusCode::OK);
        let entries = h.sink.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].identity, None);
        assert_eq!(entries[0].rate_limit_key, "ip:10.0.0.1");
        assert_eq!(entries[0].route, "/data");
        assert_eq!(entries[0].status, 200);
        assert_eq!(entries[0].request_id.as_deref(), Some("req-1"));
    }

    #[tokio::test]
    async fn test_valid_token_identifies_caller() {
        let h = harness(10);
        let token = h.validator.issue("42", Duration::from_secs(60)).unwrap();

        let response = h
            .pipeline
            .run(request("/user-profile", Some(&token)), origin(), |req: Request<Body>| async move {
                let identity = req.extensions().get::<Identity>().cloned();
                assert_eq!(identity, Some(Identity::new("42")));
                StatusCode::OK.into_response()
            })
            .await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[X_RATELIMIT_LIMIT], "10");
        assert_eq!(response.headers()[X_RATELIMIT_REMAINING], "9");
        let entry = &h.sink.entries()[0];
        assert_eq!(entry.identity.as_deref(), Some("42"));
        assert_eq!(entry.rate_limit_key, "user:42");
    }

    #[tokio::test]
    async fn test_expired_token_falls_back_to_origin() {
        let h = harness(10);
        let now = jsonwebtoken::get_current_timestamp();
        let token = h.validator.issue_at("42", now - 7200, now - 3600).unwrap();

        let admission = h.pipeline.admit(request("/data", Some(&token)).headers(), origin()).await;
        assert_eq!(admission.identity, None);
        assert_eq!(admission.key.to_string(), "ip:10.0.0.1");
    }

    #[tokio::test]
    async fn test_denied_request_skips_handler() {
        let h = harness(1);
        h.pipeline.run(request("/data", None), origin(), ok).await;

        let invoked = AtomicBool::new(false);
        let response = h
            .pipeline
            .run(request("/data", None), origin(), |_req| async {
                invoked.store(true, Ordering::SeqCst);
                StatusCode::OK.into_response()
            })
            .await;

        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()[X_RATELIMIT_REMAINING], "0");
        assert!(!invoked.load(Ordering::SeqCst));

        let entries = h.sink.entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].status, 429);
        assert_eq!(entries[1].elapsed_ms, 0.0);
    }

    #[tokio::test]
    async fn test_handler_error_is_recorded_once() {
        let h = harness(10);
        let response = h
            .pipeline
            .run(request("/data", None), origin(), |_req| async {
                StatusCode::BAD_GATEWAY.into_response()
            })
            .await;

        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        let entries = h.sink.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].status, 502);
    }

    #[tokio::test]
    async fn test_elapsed_includes_handler_time() {
        let h = harness(10);
        h.pipeline
            .run(request("/slow", None), origin(), |_req| async {
                tokio::time::sleep(Duration::from_millis(30)).await;
                StatusCode::OK.into_response()
            })
            .await;

        assert!(h.sink.entries()[0].elapsed_ms >= 30.0);
    }

    #[tokio::test]
    async fn test_store_outage_admits_and_records() {
        let h = harness_with(Arc::new(BrokenStore), 1);
        for _ in 0..3 {
            let response = h.pipeline.run(request("/data", None), origin(), ok).await;
            assert_eq!(response.status(), StatusCode::OK);
            assert!(response.headers().get(X_RATELIMIT_LIMIT).is_none());
        }
        assert_eq!(h.sink.len(), 3);
    }

    #[tokio::test]
    async fn test_audit_failure_does_not_affect_response() {
        let limiter = SlidingWindowLimiter::new(
            Arc::new(MemoryWindowStore::new()),
            Arc::new(ManualClock::new(0)),
            RateLimitPolicy::new(1, 60),
        );
        let pipeline = AdmissionPipeline::new(
            TokenValidator::hs256(SECRET),
            limiter,
            AuditRecorder::new(Arc::new(FailingSink)),
        );

        let first = pipeline.run(request("/data", None), origin(), ok).await;
        assert_eq!(first.status(), StatusCode::OK);
        let second = pipeline.run(request("/data", None), origin(), ok).await;
        assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
    }

    #[tokio::test]
    async fn test_cancelled_request_is_recorded() {
        let h = harness(10);
        let pipeline = h.pipeline.clone();

        let result = tokio::time::timeout(
            Duration::from_millis(20),
            pipeline.run(request("/hang", None), origin(), |_req| async {
                std::future::pending::<()>().await;
                StatusCode::OK.into_response()
            }),
        )
        .await;
        assert!(result.is_err());

        tokio::time::sleep(Duration::from_millis(50)).await;
        let entries = h.sink.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].status, 499);
        assert_eq!(entries[0].route, "/hang");
    }

    #[tokio::test]
    async fn test_cancelled_during_rate_limit_check_is_recorded() {
        let store = Arc::new(SlowStore {
            delay: Duration::from_millis(100),
            inner: MemoryWindowStore::new(),
        });
        let h = harness_with(store, 10);
        let token = h.validator.issue("alice", Duration::from_secs(60)).unwrap();
        let invoked = AtomicBool::new(false);

        let result = tokio::time::timeout(
            Duration::from_millis(20),
            h.pipeline.run(request("/data", Some(&token)), origin(), |_req| async {
                invoked.store(true, Ordering::SeqCst);
                StatusCode::OK.into_response()
            }),
        )
        .await;
        assert!(result.is_err());

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(!invoked.load(Ordering::SeqCst));
        let entries = h.sink.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].status, 499);
        assert_eq!(entries[0].identity.as_deref(), Some("alice"));
        assert_eq!(entries[0].rate_limit_key, "user:alice");
        assert_eq!(entries[0].request_id.as_deref(), Some("req-1"));
    }

    #[tokio::test]
    async fn test_cancelled_while_recording_rejection_keeps_entry() {
        let h = harness(1);
        h.pipeline.run(request("/data", None), origin(), ok).await;

        // The limiter answers synchronously; the future is dropped while the rejection is being written.
        let denied = h.pipeline.run(request("/data", None), origin(), ok);
        let _ = tokio::time::timeout(Duration::ZERO, denied).await;

        tokio::time::sleep(Duration::from_millis(50)).await;
        let statuses: Vec<u16> = h.sink.entries().iter().map(|e| e.status).collect();
        assert_eq!(statuses, vec![200, 429]);
    }

    #[tokio::test]
    async fn test_numeric_subject_is_keyed_by_user() {
        #[derive(serde::Serialize)]
        struct Raw {
            sub: u64,
            exp: u64,
        }
        let h = harness(10);
        let token = jsonwebtoken::encode(
            &jsonwebtoken::Header::default(),
            &Raw {
                sub: 7,
                exp: jsonwebtoken::get_current_timestamp() + 60,
            },
            &jsonwebtoken::EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap();

        h.pipeline.run(request("/data", Some(&token)), origin(), ok).await;
        let entry = &h.sink.entries()[0];
        assert_eq!(entry.identity.as_deref(), Some("7"));
        assert_eq!(entry.rate_limit_key, "user:7");
    }

    #[tokio::test]
    async fn test_panicking_handler_is_recorded() {
        let h = harness(10);
        let pipeline = h.pipeline.clone();

        let joined = tokio::spawn(async move {
            pipeline
                .run(request("/boom", None), origin(), |_req| async {
                    if true {
                        panic!("handler exploded");
                    }
                    StatusCode::OK.into_response()
                })
                .await
        })
        .await;
        assert!(joined.unwrap_err().is_panic());

        tokio::time::sleep(Duration::from_millis(50)).await;
        let entries = h.sink.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].status, 500);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_same_key_admits_exactly_limit() {
        let h = harness(5);
        let pipeline = Arc::new(h.pipeline.clone());

        let mut tasks = Vec::new();
        for _ in 0..40 {
            let pipeline = pipeline.clone();
            tasks.push(tokio::spawn(async move {
                pipeline.run(request("/data", None), origin(), ok).await.status()
            }));
        }

        let mut admitted = 0;
        let mut denied = 0;
        for task in tasks {
            match task.await.unwrap() {
                StatusCode::OK => admitted += 1,
                StatusCode::TOO_MANY_REQUESTS => denied += 1,
                other => panic!("unexpected status {other}"),
            }
        }
        assert_eq!(admitted, 5);
        assert_eq!(denied, 35);
        assert_eq!(h.sink.len(), 40);
    }
}
