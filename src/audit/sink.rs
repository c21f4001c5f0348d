//! Audit sink abstraction and the tracing-backed sink.

use async_trait::async_trait;
use thiserror::Error;

use crate::audit::entry::AuditEntry;

#[derive(Debug, Error)]
pub enum AuditError {
    #[error("audit sink I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to encode audit entry: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("audit sink rejected entry: {0}")]
    Rejected(String),
}

/// Append-only destination for audit entries.
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn append(&self, entry: &AuditEntry) -> Result<(), AuditError>;

    fn name(&self) -> &'static str;
}

/// Emits each entry as a structured event on the `audit` target.
///
/// Durability is whatever the log pipeline provides.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAuditSink;

#[async_trait]
impl AuditSink for TracingAuditSink {
    async fn append(&self, entry: &AuditEntry) -> Result<(), AuditError> {
        tracing::info!(
            target: "audit",
            identity = entry.identity.as_deref().unwrap_or("-"),
            method = %entry.method,
            route = %entry.route,
            status = entry.status,
            elapsed_ms = entry.elapsed_ms,
            request_id = entry.request_id.as_deref().unwrap_or("-"),
            rate_limit_key = %entry.rate_limit_key,
            "request completed"
        );
        Ok(())
    }

    fn name(&self) -> &'static str {
        "tracing"
    }
}
