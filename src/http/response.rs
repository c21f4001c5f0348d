//! Gateway-generated responses.
//!
//! Every response the gateway produces itself (as opposed to one relayed
//! from an upstream service) has a JSON body of the form
//! `{"detail": "<message>"}`.

use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

pub const X_RATELIMIT_LIMIT: HeaderName = HeaderName::from_static("x-ratelimit-limit");
pub const X_RATELIMIT_REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-remaining");

/// Status recorded for requests whose client went away before completion.
pub const CLIENT_CLOSED_REQUEST: u16 = 499;

pub fn error_response(status: StatusCode, detail: &str) -> Response {
    (status, Json(json!({ "detail": detail }))).into_response()
}

pub fn too_many_requests() -> Response {
    error_response(StatusCode::TOO_MANY_REQUESTS, "Too many requests")
}

/// Attach `x-ratelimit-*` headers when a definite quota is known.
pub fn apply_quota_headers(response: &mut Response, quota: Option<(u64, u64)>) {
    if let Some((limit, remaining)) = quota {
        let headers = response.headers_mut();
        headers.insert(X_RATELIMIT_LIMIT, HeaderValue::from(limit));
        headers.insert(X_RATELIMIT_REMAINING, HeaderValue::from(remaining));
    }
}
