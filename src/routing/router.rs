//! Route lookup and dispatch.
//!
//! # Responsibilities
//! - Compile `[[services]]` into routes
//! - Look up the matching route for a request
//! - Rewrite the request URI for the chosen upstream
//!
//! # Design Decisions
//! - Immutable after construction (thread-safe without locks)
//! - Longest path prefix wins; ties go to the route with a host condition
//! - Explicit `None` rather than a silent default route

use std::str::FromStr;

use axum::http::request::Parts;
use axum::http::uri::{Authority, PathAndQuery, Scheme};
use axum::http::Uri;

use crate::config::ServiceConfig;
use crate::routing::matcher::{AndMatcher, HostMatcher, Matcher, PathPrefixMatcher};

#[derive(Debug, thiserror::Error)]
#[error("service '{name}' has invalid upstream '{upstream}'")]
pub struct InvalidUpstream {
    pub name: String,
    pub upstream: String,
}

/// A compiled downstream service.
#[derive(Debug)]
pub struct Route {
    pub name: String,
    prefix: PathPrefixMatcher,
    conditions: AndMatcher,
    has_host: bool,
    scheme: Scheme,
    authority: Authority,
    base_path: String,
    strip_prefix: bool,
}

impl Route {
    fn compile(config: &ServiceConfig) -> Result<Self, InvalidUpstream> {
        let invalid = || InvalidUpstream {
            name: config.name.clone(),
            upstream: config.upstream.clone(),
        };

        let uri = Uri::from_str(&config.upstream).map_err(|_| invalid())?;
        let scheme = uri.scheme().cloned().ok_or_else(invalid)?;
        let authority = uri.authority().cloned().ok_or_else(invalid)?;
        let base_path = uri.path().trim_end_matches('/').to_string();

        let prefix = PathPrefixMatcher::new(config.path_prefix.clone());
        let mut matchers: Vec<Box<dyn Matcher>> = vec![Box::new(prefix.clone())];
        if let Some(host) = &config.host {
            matchers.push(Box::new(HostMatcher::new(host.clone())));
        }

        Ok(Self {
            name: config.name.clone(),
            prefix,
            conditions: AndMatcher::new(matchers),
            has_host: config.host.is_some(),
            scheme,
            authority,
            base_path,
            strip_prefix: config.strip_prefix,
        })
    }

    pub fn authority(&self) -> &Authority {
        &self.authority
    }

    /// Build the upstream URI for an incoming request URI.
    pub fn upstream_uri(&self, original: &Uri) -> Result<Uri, axum::http::Error> {
        let mut path = original.path();
        if self.strip_prefix {
            path = path.strip_prefix(self.prefix.prefix()).unwrap_or(path);
        }

        let mut target = format!("{}{}", self.base_path, path);
        if target.is_empty() {
            target.push('/');
        }
        if let Some(query) = original.query() {
            target.push('?');
            target.push_str(query);
        }

        Uri::builder()
            .scheme(self.scheme.clone())
            .authority(self.authority.clone())
            .path_and_query(PathAndQuery::from_str(&target)?)
            .build()
    }

    fn rank(&self) -> (usize, bool) {
        (self.prefix.specificity(), self.has_host)
    }
}

/// Maps requests to downstream services.
#[derive(Debug, Default)]
pub struct ServiceRouter {
    routes: Vec<Route>,
}

impl ServiceRouter {
    /// Compile routes, most specific first.
    pub fn from_config(services: &[ServiceConfig]) -> Result<Self, InvalidUpstream> {
        let mut routes = services.iter().map(Route::compile).collect::<Result<Vec<_>, _>>()?;
        routes.sort_by(|a, b| b.rank().cmp(&a.rank()));

        for route in &routes {
            tracing::debug!(service = %route.name, prefix = %route.prefix.prefix(), upstream = %route.authority, "Route compiled");
        }
        Ok(Self { routes })
    }

    pub fn match_request(&self, parts: &Parts) -> Option<&Route> {
        self.routes.iter().find(|route| route.conditions.matches(parts))
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}
