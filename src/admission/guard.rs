//! Guaranteed audit recording.
//!
//! A [`RecordGuard`] is armed as soon as the request is identified, before
//! the first await. The normal paths consume it with [`RecordGuard::complete`]
//! or [`RecordGuard::reject`]. If the request future is dropped instead
//! (client disconnect, outer timeout, slow store) or unwinds from a panic,
//! `Drop` records the request on a spawned task.
//!
//! Writes always run on their own task, so dropping the request future
//! while an entry is being written does not lose the entry.

use std::time::{Duration, Instant};

use axum::http::StatusCode;

use crate::audit::{AuditContext, AuditEntry, AuditRecorder, RecordOutcome};
use crate::http::response::CLIENT_CLOSED_REQUEST;

pub struct RecordGuard {
    recorder: AuditRecorder,
    context: Option<AuditContext>,
    started: Instant,
}

impl RecordGuard {
    pub fn arm(recorder: AuditRecorder, context: AuditContext, started: Instant) -> Self {
        Self {
            recorder,
            context: Some(context),
            started,
        }
    }

    /// Record the handler's status. Elapsed time stops here, before the write.
    pub async fn complete(self, status: StatusCode) -> Option<RecordOutcome> {
        let elapsed = self.started.elapsed();
        self.finish(status, elapsed).await
    }

    /// Record a request turned away before reaching the handler.
    pub async fn reject(self, status: StatusCode) -> Option<RecordOutcome> {
        self.finish(status, Duration::ZERO).await
    }

    async fn finish(mut self, status: StatusCode, elapsed: Duration) -> Option<RecordOutcome> {
        let context = self.context.take()?;
        let entry = context.finish(status.as_u16(), elapsed);
        spawn_record(self.recorder.clone(), entry)?.await.ok()
    }
}

fn spawn_record(recorder: AuditRecorder, entry: AuditEntry) -> Option<tokio::task::JoinHandle<RecordOutcome>> {
    match tokio::runtime::Handle::try_current() {
        Ok(handle) => Some(handle.spawn(async move { recorder.record(entry).await })),
        Err(_) => {
            tracing::error!(route = %entry.route, status = entry.status, "No runtime available to record request");
            None
        }
    }
}

impl Drop for RecordGuard {
    fn drop(&mut self) {
        let Some(context) = self.context.take() else {
            return;
        };

        let status = if std::thread::panicking() {
            StatusCode::INTERNAL_SERVER_ERROR.as_u16()
        } else {
            CLIENT_CLOSED_REQUEST
        };
        let entry = context.finish(status, self.started.elapsed());
        tracing::debug!(route = %entry.route, status, "Request abandoned before completion");
        spawn_record(self.recorder.clone(), entry);
    }
}
