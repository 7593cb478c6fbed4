//! Failsafe & Interception Accounting
//!
//! The 100%-interception property under failure: a panicking detector, a
//! saturated audit queue, a cancelled caller. In every case the caller gets
//! a deliverable result and the ledger records what happened.

use moderail_gate::{
    AuditSink, CancelToken, DetectorError, Disposition, GateConfig, MemoryAuditSink,
    ModerationEngine, ModerationRequest, QueueAuditSink, Rule, RuleKind, RuleStore,
    ToxicityScorer, ToxicityScores,
};
use std::sync::Arc;

struct PanickingScorer;

impl ToxicityScorer for PanickingScorer {
    fn score(&self, _text: &str) -> Result<ToxicityScores, DetectorError> {
        panic!("injected model crash");
    }
}

struct SlowScorer;

impl ToxicityScorer for SlowScorer {
    fn score(&self, _text: &str) -> Result<ToxicityScores, DetectorError> {
        std::thread::sleep(std::time::Duration::from_millis(10));
        Ok(ToxicityScores::default())
    }
}

fn base_config() -> GateConfig {
    GateConfig {
        refresh_floor_ms: 0,
        ..GateConfig::default()
    }
}

#[tokio::test]
async fn injected_panic_fails_open_and_is_accounted() {
    let store = Arc::new(RuleStore::new());
    store
        .upsert(Rule::new("Toxicity Filter", RuleKind::Toxicity))
        .unwrap();

    let sink = Arc::new(MemoryAuditSink::new());
    let engine = ModerationEngine::new(store)
        .with_config(base_config())
        .with_scorer(Arc::new(PanickingScorer))
        .with_audit_sink(sink.clone());

    let reply = "anything the model would have seen";
    let result = engine
        .moderate(ModerationRequest::builder(reply).build())
        .await;

    // Fail open: the caller is never penalized for an engine defect.
    assert!(!result.is_blocked);
    assert!(!result.is_flagged);
    assert_eq!(result.final_response, reply);
    assert!(result.triggered.is_empty());

    let metrics = engine.metrics();
    assert_eq!(metrics.interceptions(false), 1);
    assert_eq!(metrics.interceptions(true), 0);

    let records = sink.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].disposition, Disposition::EngineError);
    assert_eq!(records[0].final_response, reply);
}

#[tokio::test]
async fn audit_attempts_match_invocations_exactly() {
    let store = Arc::new(RuleStore::new());
    store.upsert(Rule::new("PII", RuleKind::Pii)).unwrap();

    let engine = ModerationEngine::new(store)
        .with_config(base_config())
        .with_audit_sink(Arc::new(MemoryAuditSink::new()));

    for reply in ["clean text", "alice@example.com", "", "another clean one"] {
        engine
            .moderate(ModerationRequest::builder(reply).build())
            .await;
    }

    let metrics = engine.metrics();
    assert_eq!(metrics.invocations(), 4);
    assert_eq!(metrics.audit_attempts(), 4);
}

#[tokio::test]
async fn saturated_audit_queue_drops_with_metric() {
    let store = Arc::new(RuleStore::new());
    let sink = Arc::new(QueueAuditSink::new(1));
    let engine = ModerationEngine::new(store)
        .with_config(base_config())
        .with_audit_sink(sink.clone());

    for _ in 0..3 {
        let result = engine
            .moderate(ModerationRequest::builder("hello").build())
            .await;
        // Sink backpressure never reaches the caller.
        assert_eq!(result.final_response, "hello");
    }

    let metrics = engine.metrics();
    assert_eq!(sink.len(), 1);
    assert_eq!(metrics.audit_dropped(), 2);
    assert_eq!(metrics.audit_attempts(), 3);
    assert_eq!(metrics.interceptions(true), 3);
}

#[tokio::test]
async fn failing_sink_counts_but_returns_result() {
    struct RefusingSink;
    impl AuditSink for RefusingSink {
        fn submit(
            &self,
            _record: moderail_gate::AuditRecord,
        ) -> Result<(), moderail_gate::AuditError> {
            Err(moderail_gate::AuditError::Sink("disk on fire".into()))
        }
    }

    let engine = ModerationEngine::new(Arc::new(RuleStore::new()))
        .with_config(base_config())
        .with_audit_sink(Arc::new(RefusingSink));

    let result = engine
        .moderate(ModerationRequest::builder("still delivered").build())
        .await;
    assert_eq!(result.final_response, "still delivered");
    assert_eq!(engine.metrics().audit_failures(), 1);
}

#[tokio::test]
async fn cancelled_request_is_audited_as_cancelled() {
    let store = Arc::new(RuleStore::new());
    store.upsert(Rule::new("PII", RuleKind::Pii)).unwrap();

    let sink = Arc::new(MemoryAuditSink::new());
    let engine = ModerationEngine::new(store)
        .with_config(base_config())
        .with_audit_sink(sink.clone());

    let cancel = CancelToken::new();
    cancel.cancel();

    let result = engine
        .moderate_cancellable(
            ModerationRequest::builder("alice@example.com").build(),
            &cancel,
        )
        .await;

    assert!(!result.is_blocked);
    assert_eq!(sink.records()[0].disposition, Disposition::Cancelled);
    assert_eq!(engine.metrics().interceptions(true), 1);
}

#[tokio::test]
async fn slow_model_counts_timeout_and_fails_open() {
    let store = Arc::new(RuleStore::new());
    store
        .upsert(Rule::new("Toxicity Filter", RuleKind::Toxicity))
        .unwrap();

    let engine = ModerationEngine::new(store)
        .with_config(GateConfig {
            refresh_floor_ms: 0,
            toxicity_timeout_ms: 1,
            ..GateConfig::default()
        })
        .with_scorer(Arc::new(SlowScorer));

    let result = engine
        .moderate(ModerationRequest::builder("some reply").build())
        .await;

    assert!(!result.is_flagged);
    assert_eq!(
        engine
            .metrics()
            .detector_error_count(moderail_gate::DetectorFailure::Timeout),
        1
    );
}
