//! Audit recorder: the only way the request path writes audit entries.
//!
//! Sink failures are logged, counted, and handed back as a value. They never
//! reach the caller of the request.

use std::sync::Arc;

use crate::audit::entry::AuditEntry;
use crate::audit::sink::{AuditError, AuditSink};
use crate::observability::metrics;

/// What happened to an entry.
#[derive(Debug)]
pub enum RecordOutcome {
    Written,
    Dropped(AuditError),
}

impl RecordOutcome {
    pub fn is_written(&self) -> bool {
        matches!(self, RecordOutcome::Written)
    }
}

#[derive(Clone)]
pub struct AuditRecorder {
    sink: Arc<dyn AuditSink>,
}

impl AuditRecorder {
    pub fn new(sink: Arc<dyn AuditSink>) -> Self {
        Self { sink }
    }

    pub fn sink_name(&self) -> &'static str {
        self.sink.name()
    }

    pub async fn record(&self, entry: AuditEntry) -> RecordOutcome {
        match self.sink.append(&entry).await {
            Ok(()) => RecordOutcome::Written,
            Err(err) => {
                tracing::error!(
                    sink = self.sink.name(),
                    route = %entry.route,
                    status = entry.status,
                    error = %err,
                    "Failed to write audit entry"
                );
                metrics::record_audit_failure(self.sink.name());
                RecordOutcome::Dropped(err)
            }
        }
    }
}
