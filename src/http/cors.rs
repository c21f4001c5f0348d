//! Cross-origin policy.
//!
//! Sits outside the admission pipeline: preflight requests are answered
//! here and never reach the limiter or the audit trail.

use std::time::Duration;

use axum::http::{HeaderName, HeaderValue};
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer};

use crate::config::CorsConfig;
use crate::http::request::X_REQUEST_ID;
use crate::http::response::{X_RATELIMIT_LIMIT, X_RATELIMIT_REMAINING};

/// Build the CORS layer, or `None` when disabled.
pub fn build_cors_layer(config: &CorsConfig) -> Option<CorsLayer> {
    if !config.enabled {
        return None;
    }

    let wildcard = config.allowed_origins.iter().any(|o| o == "*");
    let origin = match (wildcard, config.allow_credentials) {
        (true, false) => AllowOrigin::any(),
        // Credentialed responses may not carry `*`.
        (true, true) => AllowOrigin::mirror_request(),
        (false, _) => {
            let origins: Vec<HeaderValue> = config
                .allowed_origins
                .iter()
                .filter_map(|origin| origin.parse().ok())
                .collect();
            AllowOrigin::list(origins)
        }
    };

    let exposed: [HeaderName; 3] = [X_REQUEST_ID, X_RATELIMIT_LIMIT, X_RATELIMIT_REMAINING];

    Some(
        CorsLayer::new()
            .allow_origin(origin)
            .allow_methods(AllowMethods::mirror_request())
            .allow_headers(AllowHeaders::mirror_request())
            .expose_headers(exposed)
            .allow_credentials(config.allow_credentials)
            .max_age(Duration::from_secs(config.max_age_secs)),
    )
}
