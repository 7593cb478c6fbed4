//! Moderail-Gate: Moderation Engine
//!
//! Orchestrates one moderation: fetch the rule snapshot, run the detectors
//! in priority order, compose the verdict, stamp latency, then emit metrics
//! and exactly one audit record. No error and no panic ever crosses this
//! boundary to the caller; every failure mode degrades to a deliverable
//! [`ModerationResult`] plus observable counters.

use crate::audit::{AuditError, AuditRecord, AuditSink, QueueAuditSink};
use crate::config::{GateConfig, ToxicityFailurePolicy};
use crate::decision;
use crate::detectors::toxicity::{LexiconScorer, ToxicityScorer, ToxicityScores};
use crate::detectors::{keyword, pattern, DetectorError};
use crate::metrics::{DetectorFailure, GateMetrics, Outcome};
use crate::rules::{CompiledRule, RuleCheck};
use crate::store::{RuleSource, SnapshotCache};
use crate::types::{
    CancelToken, Disposition, ModerationRequest, ModerationResult, RuleKind, RuleOutcome,
};
use chrono::Utc;
use moderail_governance::{FinancialTermScanner, MedicalTermScanner, PiiScanner};
use serde_json::json;
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{Duration, Instant};
use uuid::Uuid;

/// The Moderail moderation engine.
///
/// Construct once at process init and share; all state is internally
/// synchronized and `moderate` may be called from any number of workers.
pub struct ModerationEngine {
    source: Arc<dyn RuleSource>,
    cache: SnapshotCache,
    scorer: Arc<dyn ToxicityScorer>,
    audit: Arc<dyn AuditSink>,
    metrics: Arc<GateMetrics>,
    config: GateConfig,
}

impl ModerationEngine {
    /// Engine over `source` with the default configuration, the embedded
    /// lexicon toxicity model, and a bounded in-memory audit queue.
    pub fn new(source: Arc<dyn RuleSource>) -> Self {
        let config = GateConfig::default();
        let metrics = Arc::new(GateMetrics::new());
        let cache = Self::build_cache(&source, &metrics, &config);
        Self {
            source,
            cache,
            scorer: Arc::new(LexiconScorer::new()),
            audit: Arc::new(QueueAuditSink::new(config.audit_queue_capacity)),
            metrics,
            config,
        }
    }

    /// Replace the configuration. Rebuilds the snapshot cache and the
    /// default audit queue, so apply this before `with_scorer`,
    /// `with_audit_sink`, or `with_metrics`.
    pub fn with_config(mut self, config: GateConfig) -> Self {
        self.cache = Self::build_cache(&self.source, &self.metrics, &config);
        self.audit = Arc::new(QueueAuditSink::new(config.audit_queue_capacity));
        self.config = config;
        self
    }

    /// Replace the toxicity model.
    pub fn with_scorer(mut self, scorer: Arc<dyn ToxicityScorer>) -> Self {
        self.scorer = scorer;
        self
    }

    /// Replace the audit sink.
    pub fn with_audit_sink(mut self, sink: Arc<dyn AuditSink>) -> Self {
        self.audit = sink;
        self
    }

    /// Share a metrics exporter (e.g. one scraped endpoint for several
    /// engines). Rebuilds the snapshot cache onto the new exporter.
    pub fn with_metrics(mut self, metrics: Arc<GateMetrics>) -> Self {
        self.cache = Self::build_cache(&self.source, &metrics, &self.config);
        self.metrics = metrics;
        self
    }

    fn build_cache(
        source: &Arc<dyn RuleSource>,
        metrics: &Arc<GateMetrics>,
        config: &GateConfig,
    ) -> SnapshotCache {
        SnapshotCache::new(
            source.clone(),
            metrics.clone(),
            Duration::from_millis(config.refresh_floor_ms),
            config.regex_size_limit,
            config.default_toxicity_threshold,
        )
    }

    pub fn metrics(&self) -> Arc<GateMetrics> {
        self.metrics.clone()
    }

    pub fn config(&self) -> &GateConfig {
        &self.config
    }

    /// Moderate one reply.
    pub async fn moderate(&self, request: ModerationRequest) -> ModerationResult {
        self.moderate_cancellable(request, &CancelToken::new())
            .await
    }

    /// Moderate one reply with cooperative cancellation. A cancelled request
    /// stops evaluating further rules but still produces a result, a metrics
    /// update, and an audit record tagged `cancelled`.
    pub async fn moderate_cancellable(
        &self,
        request: ModerationRequest,
        cancel: &CancelToken,
    ) -> ModerationResult {
        let start = Instant::now();
        let request_id = Uuid::new_v4();
        self.metrics.record_invocation();

        let evaluation = catch_unwind(AssertUnwindSafe(|| self.evaluate(&request, cancel)));

        let (result, disposition, intercepted) = match evaluation {
            Ok(evaluation) => {
                let verdict = decision::compose(&evaluation.triggered);
                let final_response = verdict
                    .fallback
                    .map(|category| category.message().to_string())
                    .unwrap_or_else(|| request.bot_response.clone());
                let latency_ns = start.elapsed().as_nanos() as u64;
                let result = ModerationResult {
                    request_id,
                    final_response,
                    is_flagged: verdict.is_flagged,
                    is_blocked: verdict.is_blocked,
                    triggered: evaluation.triggered,
                    scores: evaluation.scores,
                    latency_ns,
                    region: request.region,
                    session_id: request.session_id.clone(),
                };
                (result, evaluation.disposition, true)
            }
            Err(panic) => {
                // Failsafe: deliver the reply unmodified. The miss shows up
                // on the interception counter and the audit disposition.
                tracing::error!(
                    request_id = %request_id,
                    panic = %panic_message(&*panic),
                    "engine evaluation panicked; failing open"
                );
                let latency_ns = start.elapsed().as_nanos() as u64;
                let result = ModerationResult {
                    request_id,
                    final_response: request.bot_response.clone(),
                    is_flagged: false,
                    is_blocked: false,
                    triggered: Vec::new(),
                    scores: HashMap::new(),
                    latency_ns,
                    region: request.region,
                    session_id: request.session_id.clone(),
                };
                (result, Disposition::EngineError, false)
            }
        };

        self.finish(&request, &result, disposition, intercepted);
        result
    }

    /// Metrics and audit emission. Runs exactly once per invocation, after
    /// `latency_ns` is already stamped.
    fn finish(
        &self,
        request: &ModerationRequest,
        result: &ModerationResult,
        disposition: Disposition,
        intercepted: bool,
    ) {
        self.metrics
            .observe_latency(result.latency_ns, self.config.sla_ms * 1_000_000);
        let outcome = if result.is_blocked {
            Outcome::Blocked
        } else if result.is_flagged {
            Outcome::Flagged
        } else {
            Outcome::Allowed
        };
        self.metrics.record_outcome(result.region, outcome);
        self.metrics.record_interception(intercepted);
        for outcome in &result.triggered {
            self.metrics.record_trigger(outcome.kind);
        }

        let record = AuditRecord {
            request_id: result.request_id,
            timestamp: Utc::now(),
            region: result.region,
            session_id: result.session_id.clone(),
            user_message: request.user_message.clone(),
            bot_response: request.bot_response.clone(),
            final_response: result.final_response.clone(),
            is_flagged: result.is_flagged,
            is_blocked: result.is_blocked,
            disposition,
            triggered: result.triggered.clone(),
            scores: result.scores.clone(),
            latency_ns: result.latency_ns,
        };
        match self.audit.submit(record) {
            Ok(()) => self.metrics.record_audit_submitted(),
            Err(AuditError::QueueFull { .. }) => {
                self.metrics.record_audit_dropped();
                tracing::warn!(
                    request_id = %result.request_id,
                    "audit queue full; record dropped"
                );
            }
            Err(error) => {
                self.metrics.record_audit_failure();
                tracing::warn!(
                    request_id = %result.request_id,
                    error = %error,
                    "audit emission failed"
                );
            }
        }

        tracing::info!(
            request_id = %result.request_id,
            region = result.region.as_str(),
            flagged = result.is_flagged,
            blocked = result.is_blocked,
            disposition = disposition.as_str(),
            triggered = result.triggered.len(),
            latency_ms = result.latency_ns / 1_000_000,
            "moderation complete"
        );
    }

    fn evaluate(&self, request: &ModerationRequest, cancel: &CancelToken) -> Evaluation {
        let mut evaluation = Evaluation {
            triggered: Vec::new(),
            scores: HashMap::new(),
            disposition: Disposition::Completed,
        };
        // An empty reply cannot trigger anything; skip the snapshot walk.
        if request.bot_response.is_empty() {
            return evaluation;
        }

        let snapshot = self.cache.current();
        let response_lower = request.bot_response.to_lowercase();

        for rule in snapshot.rules_for(request.region) {
            if cancel.is_cancelled() {
                evaluation.disposition = Disposition::Cancelled;
                break;
            }
            match self.evaluate_rule(rule, &request.bot_response, &response_lower) {
                Ok(eval) => {
                    if let Some(score) = eval.score {
                        evaluation
                            .scores
                            .entry(rule.kind)
                            .and_modify(|existing| *existing = existing.max(score))
                            .or_insert(score);
                    }
                    if let Some(outcome) = eval.outcome {
                        evaluation.triggered.push(outcome);
                    }
                }
                Err(error) => {
                    self.metrics.record_detector_error(DetectorFailure::RuleEval);
                    tracing::warn!(
                        rule_id = %rule.id,
                        error = %error,
                        "rule evaluation failed; rule skipped"
                    );
                }
            }
        }
        evaluation
    }

    fn evaluate_rule(
        &self,
        rule: &CompiledRule,
        response: &str,
        response_lower: &str,
    ) -> Result<RuleEval, DetectorError> {
        let (triggered, score, matches) = match &rule.check {
            RuleCheck::Keyword { patterns } => {
                let matched = keyword::find_matches(response_lower, patterns);
                (!matched.is_empty(), None, json!({ "keywords": matched }))
            }
            RuleCheck::Pattern { regexes } => {
                let matched = pattern::find_matches(response, regexes);
                (!matched.is_empty(), None, json!({ "patterns": matched }))
            }
            RuleCheck::Toxicity { threshold } => match self.score_toxicity(response) {
                Ok(scores) => {
                    let max = scores.max();
                    (
                        max >= *threshold,
                        Some(max),
                        json!({ "labels": scores.as_map(), "threshold": threshold }),
                    )
                }
                Err(error) => {
                    let failure = match &error {
                        DetectorError::Timeout { .. } => DetectorFailure::Timeout,
                        _ => DetectorFailure::Model,
                    };
                    self.metrics.record_detector_error(failure);
                    tracing::warn!(
                        rule_id = %rule.id,
                        error = %error,
                        "toxicity inference failed"
                    );
                    match self.config.toxicity_failure_policy {
                        ToxicityFailurePolicy::FailOpen => {
                            return Ok(RuleEval {
                                outcome: None,
                                score: None,
                            })
                        }
                        ToxicityFailurePolicy::FailClosed => {
                            (true, None, json!({ "model_error": error.to_string() }))
                        }
                    }
                }
            },
            RuleCheck::Pii => {
                let scan = PiiScanner::new().scan(response);
                let matches =
                    serde_json::to_value(&scan).unwrap_or(serde_json::Value::Null);
                (scan.has_pii, None, matches)
            }
            RuleCheck::Financial => {
                let scan = FinancialTermScanner::new().scan(response);
                (scan.flagged, None, json!({ "terms": scan.matched_terms }))
            }
            RuleCheck::Medical => {
                let scan = MedicalTermScanner::new().scan(response);
                (scan.flagged, None, json!({ "terms": scan.matched_terms }))
            }
        };

        let outcome = triggered.then(|| RuleOutcome {
            rule_id: rule.id,
            rule_name: rule.name.clone(),
            kind: rule.kind,
            triggered: true,
            should_block: decision::should_block(rule.kind, &rule.name),
            score,
            matches,
        });
        Ok(RuleEval { outcome, score })
    }

    /// Run the toxicity model under its soft budget. Inference is
    /// synchronous, so the budget is checked after the call: one overrun is
    /// tolerated on the clock but reported and treated as a failure.
    fn score_toxicity(&self, response: &str) -> Result<ToxicityScores, DetectorError> {
        let started = Instant::now();
        let scores = self.scorer.score(response)?;
        if started.elapsed() > Duration::from_millis(self.config.toxicity_timeout_ms) {
            return Err(DetectorError::Timeout {
                budget_ms: self.config.toxicity_timeout_ms,
            });
        }
        Ok(scores)
    }
}

struct Evaluation {
    triggered: Vec<RuleOutcome>,
    scores: HashMap<RuleKind, f64>,
    disposition: Disposition,
}

struct RuleEval {
    outcome: Option<RuleOutcome>,
    score: Option<f64>,
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
