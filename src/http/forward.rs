//! Upstream forwarding.
//!
//! Runs behind the admission pipeline, so only admitted requests get here.
//! The route decides the upstream; the response status is whatever the
//! upstream returns, or 404/502/504 when there is nothing to relay.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderMap, HeaderName, HeaderValue, Request, StatusCode, Version},
    response::Response,
};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};

use crate::admission::client_origin;
use crate::auth::Identity;
use crate::http::response::error_response;
use crate::observability::metrics;
use crate::routing::ServiceRouter;

pub const X_FORWARDED_FOR: HeaderName = HeaderName::from_static("x-forwarded-for");
pub const X_GATEWAY_SUBJECT: HeaderName = HeaderName::from_static("x-gateway-subject");

pub type UpstreamClient = Client<HttpConnector, Body>;

const HOP_BY_HOP: [HeaderName; 8] = [
    header::CONNECTION,
    HeaderName::from_static("keep-alive"),
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
];

/// State shared by the forwarding handler.
#[derive(Clone)]
pub struct ForwardState {
    pub router: Arc<ServiceRouter>,
    pub client: UpstreamClient,
    pub upstream_timeout: Duration,
}

impl ForwardState {
    pub fn new(router: Arc<ServiceRouter>, upstream_timeout: Duration) -> Self {
        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());
        Self {
            router,
            client,
            upstream_timeout,
        }
    }
}

/// Remove connection-scoped headers, including any named by `Connection`.
pub fn strip_hop_by_hop(headers: &mut HeaderMap) {
    let named: Vec<HeaderName> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .filter_map(|name| HeaderName::from_bytes(name.trim().as_bytes()).ok())
        .collect();

    for name in named.iter().chain(HOP_BY_HOP.iter()) {
        headers.remove(name);
    }
}

/// Proxy an admitted request to the matching service.
pub async fn forward(State(state): State<ForwardState>, request: Request<Body>) -> Response {
    let origin = client_origin(&request);
    let identity = request.extensions().get::<Identity>().cloned();
    let (parts, body) = request.into_parts();

    let Some(route) = state.router.match_request(&parts) else {
        tracing::debug!(path = %parts.uri.path(), "No route matched");
        return error_response(StatusCode::NOT_FOUND, "No matching route");
    };

    let uri = match route.upstream_uri(&parts.uri) {
        Ok(uri) => uri,
        Err(e) => {
            tracing::error!(service = %route.name, error = %e, "Failed to build upstream URI");
            metrics::record_upstream_error(&route.name);
            return error_response(StatusCode::BAD_GATEWAY, "Bad gateway");
        }
    };

    let mut headers = parts.headers;
    strip_hop_by_hop(&mut headers);
    headers.remove(&X_GATEWAY_SUBJECT);
    if let Some(subject) = identity.and_then(|i| HeaderValue::from_str(i.subject()).ok()) {
        headers.insert(X_GATEWAY_SUBJECT, subject);
    }
    if let Some(ip) = origin {
        let forwarded = match headers.get(&X_FORWARDED_FOR).and_then(|v| v.to_str().ok()) {
            Some(prior) => format!("{prior}, {ip}"),
            None => ip.to_string(),
        };
        if let Ok(value) = HeaderValue::from_str(&forwarded) {
            headers.insert(X_FORWARDED_FOR, value);
        }
    }
    if let Ok(host) = HeaderValue::from_str(route.authority().as_str()) {
        headers.insert(header::HOST, host);
    }

    let mut upstream = Request::new(body);
    *upstream.method_mut() = parts.method;
    *upstream.uri_mut() = uri;
    *upstream.version_mut() = Version::HTTP_11;
    *upstream.headers_mut() = headers;

    tracing::debug!(service = %route.name, uri = %upstream.uri(), "Forwarding request");

    match tokio::time::timeout(state.upstream_timeout, state.client.request(upstream)).await {
        Ok(Ok(response)) => {
            let (mut parts, body) = response.into_parts();
            strip_hop_by_hop(&mut parts.headers);
            Response::from_parts(parts, Body::new(body))
        }
        Ok(Err(e)) => {
            tracing::error!(service = %route.name, error = %e, "Upstream request failed");
            metrics::record_upstream_error(&route.name);
            error_response(StatusCode::BAD_GATEWAY, "Upstream request failed")
        }
        Err(_) => {
            tracing::warn!(
                service = %route.name,
                timeout_ms = state.upstream_timeout.as_millis() as u64,
                "Upstream timed out"
            );
            metrics::record_upstream_error(&route.name);
            error_response(StatusCode::GATEWAY_TIMEOUT, "Upstream timed out")
        }
    }
}
