//! Bearer token verification.
//!
//! Tokens are HMAC-signed JWTs. Only the subject is used by the gateway; any
//! other claims pass through untouched to the services behind it.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use axum::http::{header::AUTHORIZATION, HeaderMap};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::AuthConfig;

/// Verified subject of a request.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Identity(String);

impl Identity {
    pub fn new(subject: impl Into<String>) -> Self {
        Self(subject.into())
    }

    pub fn subject(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Why a credential was not accepted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenError {
    #[error("token has expired")]
    Expired,

    #[error("token signature does not verify")]
    InvalidSignature,

    #[error("token issuer is not accepted")]
    InvalidIssuer,

    #[error("token is missing the `{0}` claim")]
    MissingClaim(String),

    #[error("token subject is empty")]
    EmptySubject,

    #[error("unsupported algorithm `{0}`")]
    UnsupportedAlgorithm(String),

    #[error("malformed token: {0}")]
    Malformed(String),

    #[error("failed to sign token: {0}")]
    Signing(String),
}

impl From<jsonwebtoken::errors::Error> for TokenError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        match err.kind() {
            ErrorKind::ExpiredSignature => TokenError::Expired,
            ErrorKind::InvalidSignature => TokenError::InvalidSignature,
            ErrorKind::InvalidIssuer => TokenError::InvalidIssuer,
            ErrorKind::MissingRequiredClaim(claim) => TokenError::MissingClaim(claim.clone()),
            _ => TokenError::Malformed(err.to_string()),
        }
    }
}

/// Subjects are issued either as strings or as numeric user ids.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum Subject {
    Text(String),
    Numeric(u64),
}

impl Subject {
    fn into_string(self) -> String {
        match self {
            Subject::Text(s) => s,
            Subject::Numeric(n) => n.to_string(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    sub: Option<Subject>,
    exp: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    iat: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    iss: Option<String>,
}

/// Verifies bearer credentials against a fixed key and algorithm.
///
/// Cheap to clone; keys are shared.
#[derive(Clone)]
pub struct TokenValidator {
    algorithm: Algorithm,
    issuer: Option<String>,
    token_ttl: Duration,
    encoding_key: Arc<EncodingKey>,
    decoding_key: Arc<DecodingKey>,
    validation: Arc<Validation>,
}

impl TokenValidator {
    pub fn from_config(config: &AuthConfig) -> Result<Self, TokenError> {
        let algorithm = Algorithm::from_str(&config.algorithm)
            .map_err(|_| TokenError::UnsupportedAlgorithm(config.algorithm.clone()))?;
        if !matches!(algorithm, Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512) {
            return Err(TokenError::UnsupportedAlgorithm(config.algorithm.clone()));
        }

        let mut validation = Validation::new(algorithm);
        validation.leeway = config.leeway_secs;
        // `sub` is checked after decoding: the library only accepts string subjects.
        if let Some(ref issuer) = config.issuer {
            validation.set_required_spec_claims(&["exp", "iss"]);
            validation.set_issuer(&[issuer]);
        } else {
            validation.set_required_spec_claims(&["exp"]);
        }

        Ok(Self {
            algorithm,
            issuer: config.issuer.clone(),
            token_ttl: Duration::from_secs(config.token_ttl_secs),
            encoding_key: Arc::new(EncodingKey::from_secret(config.secret.as_bytes())),
            decoding_key: Arc::new(DecodingKey::from_secret(config.secret.as_bytes())),
            validation: Arc::new(validation),
        })
    }

    /// HS256 validator with no issuer and no leeway.
    pub fn hs256(secret: &str) -> Self {
        let config = AuthConfig {
            secret: secret.to_string(),
            ..AuthConfig::default()
        };
        match Self::from_config(&config) {
            Ok(validator) => validator,
            Err(_) => unreachable!("HS256 is always supported"),
        }
    }

    /// Verify signature and expiry and return the token's subject.
    pub fn validate(&self, token: &str) -> Result<Identity, TokenError> {
        let data = decode::<Claims>(token, &self.decoding_key, &self.validation)?;
        let subject = data
            .claims
            .sub
            .ok_or_else(|| TokenError::MissingClaim("sub".into()))?
            .into_string();
        if subject.trim().is_empty() {
            return Err(TokenError::EmptySubject);
        }
        Ok(Identity(subject))
    }

    /// Mint a token for `subject` that expires after `ttl`.
    pub fn issue(&self, subject: &str, ttl: Duration) -> Result<String, TokenError> {
        let now = jsonwebtoken::get_current_timestamp();
        self.issue_at(subject, now, now.saturating_add(ttl.as_secs()))
    }

    /// Mint a token for `subject` with the configured lifetime.
    pub fn issue_default(&self, subject: &str) -> Result<String, TokenError> {
        self.issue(subject, self.token_ttl)
    }

    pub fn token_ttl(&self) -> Duration {
        self.token_ttl
    }

    /// Mint a token with explicit issue and expiry timestamps.
    pub fn issue_at(&self, subject: &str, issued_at: u64, expires_at: u64) -> Result<String, TokenError> {
        let claims = Claims {
            sub: Some(Subject::Text(subject.to_string())),
            exp: expires_at,
            iat: Some(issued_at),
            iss: self.issuer.clone(),
        };
        encode(&Header::new(self.algorithm), &claims, &self.encoding_key)
            .map_err(|e| TokenError::Signing(e.to_string()))
    }
}

impl fmt::Debug for TokenValidator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenValidator")
            .field("algorithm", &self.algorithm)
            .field("issuer", &self.issuer)
            .finish_non_exhaustive()
    }
}

/// Token from an `Authorization: Bearer <token>` header, if present.
pub fn extract_bearer(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}
