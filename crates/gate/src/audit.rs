//! Moderail-Gate: Audit Sink
//!
//! The durable exhaust for the interception guarantee: the engine submits
//! exactly one record per moderation, whatever the outcome. `submit` must
//! never block the request path; the bounded queue sheds load by rejecting
//! (the engine records the drop), never by waiting.

use crate::types::{Disposition, Region, RuleKind, RuleOutcome};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use thiserror::Error;
use uuid::Uuid;

/// One persisted moderation event. Denormalized: everything an audit reader
/// needs travels in the record, no back-references into the rule table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    pub request_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub region: Region,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    pub user_message: String,
    pub bot_response: String,
    pub final_response: String,
    pub is_flagged: bool,
    pub is_blocked: bool,
    pub disposition: Disposition,
    pub triggered: Vec<RuleOutcome>,
    pub scores: HashMap<RuleKind, f64>,
    pub latency_ns: u64,
}

/// Audit submission failures. Observability failures never fail the request.
#[derive(Debug, Error)]
pub enum AuditError {
    #[error("audit queue at capacity ({capacity}); record dropped")]
    QueueFull { capacity: usize },
    #[error("audit sink failure: {0}")]
    Sink(String),
}

/// A destination for audit records. `submit` must return without blocking:
/// enqueue, hand off, or reject, but never wait on downstream I/O.
pub trait AuditSink: Send + Sync {
    fn submit(&self, record: AuditRecord) -> Result<(), AuditError>;
}

/// Bounded in-memory queue a downstream consumer drains.
///
/// Overflow rejects the new record rather than evicting an old one; the
/// engine counts every rejected submission.
pub struct QueueAuditSink {
    queue: Mutex<VecDeque<AuditRecord>>,
    capacity: usize,
}

impl QueueAuditSink {
    pub fn new(capacity: usize) -> Self {
        Self {
            queue: Mutex::new(VecDeque::with_capacity(capacity.min(1024))),
            capacity,
        }
    }

    /// Remove and return up to `max` records, oldest first.
    pub fn drain(&self, max: usize) -> Vec<AuditRecord> {
        let mut queue = self.queue.lock();
        let take = max.min(queue.len());
        queue.drain(..take).collect()
    }

    pub fn len(&self) -> usize {
        self.queue.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.lock().is_empty()
    }
}

impl AuditSink for QueueAuditSink {
    fn submit(&self, record: AuditRecord) -> Result<(), AuditError> {
        let mut queue = self.queue.lock();
        if queue.len() >= self.capacity {
            return Err(AuditError::QueueFull {
                capacity: self.capacity,
            });
        }
        queue.push_back(record);
        Ok(())
    }
}

/// Unbounded recording sink for tests and embedded use.
#[derive(Default)]
pub struct MemoryAuditSink {
    records: Mutex<Vec<AuditRecord>>,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<AuditRecord> {
        self.records.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }
}

impl AuditSink for MemoryAuditSink {
    fn submit(&self, record: AuditRecord) -> Result<(), AuditError> {
        self.records.lock().push(record);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(tag: &str) -> AuditRecord {
        AuditRecord {
            request_id: Uuid::new_v4(),
            timestamp: Utc::now(),
            region: Region::Global,
            session_id: None,
            user_message: String::new(),
            bot_response: tag.to_string(),
            final_response: tag.to_string(),
            is_flagged: false,
            is_blocked: false,
            disposition: Disposition::Completed,
            triggered: Vec::new(),
            scores: HashMap::new(),
            latency_ns: 0,
        }
    }

    #[test]
    fn test_queue_accepts_up_to_capacity() {
        let sink = QueueAuditSink::new(2);
        assert!(sink.submit(record("a")).is_ok());
        assert!(sink.submit(record("b")).is_ok());
        assert!(matches!(
            sink.submit(record("c")),
            Err(AuditError::QueueFull { capacity: 2 })
        ));
        assert_eq!(sink.len(), 2);
    }

    #[test]
    fn test_drain_is_fifo() {
        let sink = QueueAuditSink::new(8);
        sink.submit(record("first")).unwrap();
        sink.submit(record("second")).unwrap();

        let drained = sink.drain(1);
        assert_eq!(drained.len(), 1);
        assert_eq!(drained[0].bot_response, "first");
        assert_eq!(sink.len(), 1);
    }

    #[test]
    fn test_drain_after_overflow_frees_capacity() {
        let sink = QueueAuditSink::new(1);
        sink.submit(record("a")).unwrap();
        assert!(sink.submit(record("b")).is_err());
        sink.drain(usize::MAX);
        assert!(sink.submit(record("c")).is_ok());
    }

    #[test]
    fn test_memory_sink_records_everything() {
        let sink = MemoryAuditSink::new();
        sink.submit(record("x")).unwrap();
        sink.submit(record("y")).unwrap();
        assert_eq!(sink.len(), 2);
        assert_eq!(sink.records()[1].bot_response, "y");
    }
}
