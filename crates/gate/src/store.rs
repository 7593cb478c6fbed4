//! Moderail-Gate: Rule Store & Snapshot Cache
//!
//! The authoritative, externally administered rule table, and the
//! copy-on-write snapshot the engine actually reads. Mutations publish a new
//! epoch; the request path does one atomic epoch compare and, at most, one
//! `Arc` clone. Rebuilds happen off to the side of other readers, which keep
//! serving the previous snapshot.

use crate::metrics::{DetectorFailure, GateMetrics};
use crate::rules::{compile, CompiledRule, Rule, RuleSet, RuleValidationError};
use crate::types::Region;
use chrono::Duration as ChronoDuration;
use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use uuid::Uuid;

/// Rule store read failures.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("rule store unavailable: {0}")]
    Unavailable(String),
}

/// Errors loading a YAML rule document into the store.
#[derive(Debug, Error)]
pub enum StoreLoadError {
    #[error(transparent)]
    Parse(#[from] serde_yaml::Error),
    #[error(transparent)]
    Validation(#[from] RuleValidationError),
}

/// Where the cache reads rules from. `load_active` is one bulk read; the
/// request path never fetches per rule.
pub trait RuleSource: Send + Sync {
    /// Monotonic value advanced on every mutation.
    fn epoch(&self) -> u64;
    /// All active rules, unordered.
    fn load_active(&self) -> Result<Vec<Rule>, StoreError>;
}

/// In-process authoritative rule table.
///
/// The administrative layer drives `upsert`/`set_active`/`remove`; the
/// engine only ever sees the compiled snapshot.
pub struct RuleStore {
    rules: RwLock<HashMap<Uuid, Rule>>,
    epoch: AtomicU64,
}

impl RuleStore {
    pub fn new() -> Self {
        Self {
            rules: RwLock::new(HashMap::new()),
            // Starts ahead of the cache's empty snapshot (epoch 0) so the
            // first read always builds.
            epoch: AtomicU64::new(1),
        }
    }

    fn bump_epoch(&self) {
        self.epoch.fetch_add(1, Ordering::Release);
    }

    /// Insert or replace a rule. `created_at` is preserved on replace and
    /// `updated_at` advances strictly monotonically per rule.
    pub fn upsert(&self, mut rule: Rule) -> Result<(), RuleValidationError> {
        rule.validate()?;
        {
            let mut rules = self.rules.write();
            let now = Utc::now();
            match rules.get(&rule.id) {
                Some(previous) => {
                    rule.created_at = previous.created_at;
                    rule.updated_at = if now > previous.updated_at {
                        now
                    } else {
                        previous.updated_at + ChronoDuration::nanoseconds(1)
                    };
                }
                None => {
                    rule.created_at = now;
                    rule.updated_at = now;
                }
            }
            rules.insert(rule.id, rule);
        }
        self.bump_epoch();
        Ok(())
    }

    /// Soft-delete or restore. Returns false for an unknown id; a no-op
    /// toggle does not advance the epoch.
    pub fn set_active(&self, id: Uuid, active: bool) -> bool {
        let changed = {
            let mut rules = self.rules.write();
            match rules.get_mut(&id) {
                Some(rule) if rule.is_active != active => {
                    rule.is_active = active;
                    let now = Utc::now();
                    rule.updated_at = if now > rule.updated_at {
                        now
                    } else {
                        rule.updated_at + ChronoDuration::nanoseconds(1)
                    };
                    true
                }
                Some(_) => return true,
                None => return false,
            }
        };
        if changed {
            self.bump_epoch();
        }
        true
    }

    pub fn remove(&self, id: Uuid) -> Option<Rule> {
        let removed = self.rules.write().remove(&id);
        if removed.is_some() {
            self.bump_epoch();
        }
        removed
    }

    pub fn get(&self, id: Uuid) -> Option<Rule> {
        self.rules.read().get(&id).cloned()
    }

    pub fn all(&self) -> Vec<Rule> {
        self.rules.read().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.rules.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.read().is_empty()
    }

    /// Load a YAML rule document (see [`RuleSet`]). Returns how many rules
    /// were inserted; stops at the first invalid rule.
    pub fn load_yaml(&self, yaml: &str) -> Result<usize, StoreLoadError> {
        let set = RuleSet::from_yaml(yaml)?;
        let count = set.rules.len();
        for rule in set.rules {
            self.upsert(rule)?;
        }
        Ok(count)
    }
}

impl Default for RuleStore {
    fn default() -> Self {
        Self::new()
    }
}

impl RuleSource for RuleStore {
    fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::Acquire)
    }

    fn load_active(&self) -> Result<Vec<Rule>, StoreError> {
        Ok(self
            .rules
            .read()
            .values()
            .filter(|rule| rule.is_active)
            .cloned()
            .collect())
    }
}

/// Immutable compiled view of the active rule set.
#[derive(Debug)]
pub struct RuleSnapshot {
    pub epoch: u64,
    rules: Vec<CompiledRule>,
}

impl RuleSnapshot {
    pub fn empty() -> Self {
        Self {
            epoch: 0,
            rules: Vec::new(),
        }
    }

    /// Rules applying to `region`, already in priority-descending order.
    pub fn rules_for(&self, region: Region) -> impl Iterator<Item = &CompiledRule> {
        self.rules.iter().filter(move |rule| rule.applies_to(region))
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// Process-local cache of the compiled active rule set.
pub struct SnapshotCache {
    source: Arc<dyn RuleSource>,
    metrics: Arc<GateMetrics>,
    current: RwLock<Arc<RuleSnapshot>>,
    /// Held by the single rebuilder; stores the last rebuild attempt.
    rebuild_gate: Mutex<Option<Instant>>,
    refresh_floor: Duration,
    regex_size_limit: usize,
    default_threshold: f64,
}

impl SnapshotCache {
    pub fn new(
        source: Arc<dyn RuleSource>,
        metrics: Arc<GateMetrics>,
        refresh_floor: Duration,
        regex_size_limit: usize,
        default_threshold: f64,
    ) -> Self {
        Self {
            source,
            metrics,
            current: RwLock::new(Arc::new(RuleSnapshot::empty())),
            rebuild_gate: Mutex::new(None),
            refresh_floor,
            regex_size_limit,
            default_threshold,
        }
    }

    /// The current snapshot. Fresh-path cost: one atomic load plus one `Arc`
    /// clone. On a stale epoch, one caller rebuilds from a single bulk read
    /// while everyone else keeps the previous snapshot.
    pub fn current(&self) -> Arc<RuleSnapshot> {
        let snapshot = self.current.read().clone();
        if snapshot.epoch == self.source.epoch() {
            return snapshot;
        }

        let Some(mut last_attempt) = self.rebuild_gate.try_lock() else {
            return snapshot;
        };
        if let Some(at) = *last_attempt {
            if at.elapsed() < self.refresh_floor {
                return snapshot;
            }
        }
        *last_attempt = Some(Instant::now());

        // Capture the epoch before the bulk read: a mutation landing during
        // the read leaves the stored epoch ahead, forcing another rebuild.
        let epoch = self.source.epoch();
        let rules = match self.source.load_active() {
            Ok(rules) => rules,
            Err(error) => {
                self.metrics.record_store_failure();
                tracing::error!(
                    error = %error,
                    "rule store read failed; serving last good snapshot"
                );
                return snapshot;
            }
        };

        let mut compiled = Vec::with_capacity(rules.len());
        for rule in &rules {
            match compile(rule, self.regex_size_limit, self.default_threshold) {
                Ok(entry) => compiled.push(entry),
                Err(error) => {
                    self.metrics
                        .record_detector_error(DetectorFailure::RegexCompile);
                    tracing::warn!(
                        rule_id = %rule.id,
                        rule_name = %rule.name,
                        error = %error,
                        "rule skipped: pattern rejected at compile"
                    );
                }
            }
        }
        compiled.sort_by(CompiledRule::order);

        let next = Arc::new(RuleSnapshot {
            epoch,
            rules: compiled,
        });
        *self.current.write() = next.clone();
        next
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RuleKind;

    fn cache_over(store: &Arc<RuleStore>, metrics: &Arc<GateMetrics>) -> SnapshotCache {
        SnapshotCache::new(
            store.clone(),
            metrics.clone(),
            Duration::ZERO,
            1 << 20,
            0.7,
        )
    }

    #[test]
    fn test_upsert_bumps_epoch_and_preserves_created_at() {
        let store = RuleStore::new();
        let before = store.epoch();

        let rule = Rule::new("PII", RuleKind::Pii);
        let id = rule.id;
        store.upsert(rule).unwrap();
        assert!(store.epoch() > before);

        let created_at = store.get(id).unwrap().created_at;
        let mut replacement = store.get(id).unwrap();
        replacement.priority = 50;
        store.upsert(replacement).unwrap();
        assert_eq!(store.get(id).unwrap().created_at, created_at);
    }

    #[test]
    fn test_updated_at_strictly_monotonic() {
        let store = RuleStore::new();
        let rule = Rule::new("PII", RuleKind::Pii);
        let id = rule.id;
        store.upsert(rule).unwrap();

        let mut last = store.get(id).unwrap().updated_at;
        for _ in 0..5 {
            store.upsert(store.get(id).unwrap()).unwrap();
            let next = store.get(id).unwrap().updated_at;
            assert!(next > last, "updated_at must strictly advance");
            last = next;
        }
    }

    #[test]
    fn test_set_active_noop_does_not_bump_epoch() {
        let store = RuleStore::new();
        let rule = Rule::new("PII", RuleKind::Pii);
        let id = rule.id;
        store.upsert(rule).unwrap();

        let epoch = store.epoch();
        assert!(store.set_active(id, true));
        assert_eq!(store.epoch(), epoch);

        assert!(store.set_active(id, false));
        assert!(store.epoch() > epoch);
        assert!(!store.set_active(Uuid::new_v4(), false));
    }

    #[test]
    fn test_inactive_rules_invisible_to_snapshot() {
        let store = Arc::new(RuleStore::new());
        let metrics = Arc::new(GateMetrics::new());
        let cache = cache_over(&store, &metrics);

        let rule = Rule::new("PII", RuleKind::Pii);
        let id = rule.id;
        store.upsert(rule).unwrap();
        assert_eq!(cache.current().len(), 1);

        store.set_active(id, false);
        assert_eq!(cache.current().len(), 0);

        store.set_active(id, true);
        assert_eq!(cache.current().len(), 1);
    }

    #[test]
    fn test_snapshot_ordering_priority_then_id() {
        let store = Arc::new(RuleStore::new());
        let metrics = Arc::new(GateMetrics::new());
        let cache = cache_over(&store, &metrics);

        store
            .upsert(Rule::new("low", RuleKind::Pii).with_priority(1))
            .unwrap();
        store
            .upsert(Rule::new("high", RuleKind::Medical).with_priority(100))
            .unwrap();

        let snapshot = cache.current();
        let names: Vec<_> = snapshot
            .rules_for(Region::Us)
            .map(|r| r.name.clone())
            .collect();
        assert_eq!(names, vec!["high", "low"]);
    }

    #[test]
    fn test_invalid_regex_rule_skipped_with_metric() {
        let store = Arc::new(RuleStore::new());
        let metrics = Arc::new(GateMetrics::new());
        let cache = cache_over(&store, &metrics);

        store
            .upsert(Rule::new("bad", RuleKind::Regex).with_patterns(["(unclosed"]))
            .unwrap();
        store.upsert(Rule::new("good", RuleKind::Pii)).unwrap();

        let snapshot = cache.current();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(
            metrics.detector_error_count(DetectorFailure::RegexCompile),
            1
        );
    }

    #[test]
    fn test_failing_source_serves_last_good_snapshot() {
        struct FlakySource {
            inner: RuleStore,
            fail: std::sync::atomic::AtomicBool,
        }
        impl RuleSource for FlakySource {
            fn epoch(&self) -> u64 {
                RuleSource::epoch(&self.inner)
            }
            fn load_active(&self) -> Result<Vec<Rule>, StoreError> {
                if self.fail.load(Ordering::Relaxed) {
                    Err(StoreError::Unavailable("connection reset".into()))
                } else {
                    self.inner.load_active()
                }
            }
        }

        let source = Arc::new(FlakySource {
            inner: RuleStore::new(),
            fail: std::sync::atomic::AtomicBool::new(false),
        });
        source.inner.upsert(Rule::new("PII", RuleKind::Pii)).unwrap();

        let metrics = Arc::new(GateMetrics::new());
        let cache = SnapshotCache::new(
            source.clone(),
            metrics.clone(),
            Duration::ZERO,
            1 << 20,
            0.7,
        );
        assert_eq!(cache.current().len(), 1);

        // Store mutates, then becomes unreachable: readers keep the last
        // good snapshot and the failure is counted.
        source.inner.upsert(Rule::new("Tox", RuleKind::Toxicity)).unwrap();
        source.fail.store(true, Ordering::Relaxed);
        assert_eq!(cache.current().len(), 1);
        assert_eq!(metrics.store_failures(), 1);

        source.fail.store(false, Ordering::Relaxed);
        assert_eq!(cache.current().len(), 2);
    }
}
