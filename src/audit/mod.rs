//! Audit subsystem.
//!
//! # Data Flow
//! ```text
//! Admission pipeline (one call per request, every exit path)
//!     → recorder.rs (never raises; returns RecordOutcome)
//!     → sink.rs trait
//!         → file.rs (JSON lines, durable)
//!         → sink.rs TracingAuditSink (structured event on target "audit")
//!         → memory.rs (tests, development)
//! ```
//!
//! # Design Decisions
//! - Append-only: no reads in the request path
//! - A broken sink degrades to a log line and a metric, never a failed request

pub mod entry;
pub mod file;
pub mod memory;
pub mod recorder;
pub mod sink;

pub use entry::{AuditContext, AuditEntry};
pub use file::JsonLinesAuditSink;
pub use memory::InMemoryAuditSink;
pub use recorder::{AuditRecorder, RecordOutcome};
pub use sink::{AuditError, AuditSink, TracingAuditSink};
