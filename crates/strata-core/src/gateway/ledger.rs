//! # Metrics and Provenance
//!
//! Both are written on the success path only (failures bump counters).
//! Each derived triple gets exactly one provenance record: the first
//! request that derives it is credited, later re-derivations are not
//! recorded again.

use super::outcome::ErrorCategory;
use crate::reasoning::Inference;
use crate::{AgentId, SessionId, Triple};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::time::{SystemTime, UNIX_EPOCH};

/// Monotonic request counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metrics {
    pub total_requests: u64,
    pub successful: u64,
    pub failed: u64,
    pub authentication_failures: u64,
    pub parse_failures: u64,
    pub shape_violations: u64,
    pub logic_contradictions: u64,
    pub consistency_violations: u64,
    pub system_failures: u64,
    pub rollbacks: u64,
    pub reasoning_iterations_total: u64,
    pub derived_facts_total: u64,
    /// Running mean over all requests, integer microseconds.
    pub average_processing_micros: u64,
}

impl Metrics {
    fn observe_duration(&mut self, micros: u64) {
        self.total_requests = self.total_requests.saturating_add(1);
        let n = u128::from(self.total_requests);
        let total = u128::from(self.average_processing_micros) * (n - 1) + u128::from(micros);
        self.average_processing_micros = u64::try_from(total / n).unwrap_or(u64::MAX);
    }

    pub(crate) fn record_success(&mut self, micros: u64, iterations: u32, derived: usize) {
        self.observe_duration(micros);
        self.successful = self.successful.saturating_add(1);
        self.reasoning_iterations_total = self
            .reasoning_iterations_total
            .saturating_add(u64::from(iterations));
        self.derived_facts_total = self
            .derived_facts_total
            .saturating_add(u64::try_from(derived).unwrap_or(u64::MAX));
    }

    pub(crate) fn record_failure(&mut self, micros: u64, category: ErrorCategory) {
        self.observe_duration(micros);
        self.failed = self.failed.saturating_add(1);
        let counter = match category {
            ErrorCategory::Authentication => &mut self.authentication_failures,
            ErrorCategory::Parse => &mut self.parse_failures,
            ErrorCategory::Shape => &mut self.shape_violations,
            ErrorCategory::Contradiction => &mut self.logic_contradictions,
            ErrorCategory::Consistency => &mut self.consistency_violations,
            ErrorCategory::System => &mut self.system_failures,
        };
        *counter = counter.saturating_add(1);
    }

    pub(crate) fn record_rollback(&mut self) {
        self.rollbacks = self.rollbacks.saturating_add(1);
    }
}

/// Who derived a fact, where and how.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvenanceRecord {
    /// Fingerprint of the triple.
    pub fact_id: String,
    pub triple: Triple,
    pub source_agent: AgentId,
    pub session_id: SessionId,
    pub rule_id: String,
    pub rule_version: u32,
    pub iteration: u32,
    /// URI of the graph the request targeted.
    pub graph: String,
    /// Unix time in milliseconds.
    pub recorded_at: u64,
}

/// Append-only provenance log plus metrics.
#[derive(Debug, Default)]
pub struct Ledger {
    pub(crate) metrics: Metrics,
    records: Vec<ProvenanceRecord>,
    known: BTreeSet<String>,
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}

/// Attribution shared by every fact of one request.
pub(crate) struct Attribution<'a> {
    pub agent: &'a AgentId,
    pub session: &'a SessionId,
    pub graph: String,
    pub rule_version: u32,
}

impl Ledger {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record provenance for derived facts. Returns how many were new.
    pub(crate) fn record_derived(&mut self, source: &Attribution<'_>, derived: &[Inference]) -> usize {
        let recorded_at = now_millis();
        let mut added = 0usize;
        for inference in derived {
            let fact_id = inference.triple.fingerprint();
            if !self.known.insert(fact_id.clone()) {
                continue;
            }
            self.records.push(ProvenanceRecord {
                fact_id,
                triple: inference.triple.clone(),
                source_agent: source.agent.clone(),
                session_id: source.session.clone(),
                rule_id: inference.rule_id.clone(),
                rule_version: source.rule_version,
                iteration: inference.iteration,
                graph: source.graph.clone(),
                recorded_at,
            });
            added = added.saturating_add(1);
        }
        added
    }

    /// Records in insertion order, optionally for one agent.
    #[must_use]
    pub fn provenance(&self, agent: Option<&AgentId>) -> Vec<ProvenanceRecord> {
        self.records
            .iter()
            .filter(|r| agent.is_none_or(|a| &r.source_agent == a))
            .cloned()
            .collect()
    }

    #[must_use]
    pub fn metrics(&self) -> Metrics {
        self.metrics.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Iri;

    fn inference(class: &str) -> Inference {
        Inference {
            triple: Triple::typed(Iri::tourism("A"), Iri::tourism(class)),
            rule_id: "r".to_string(),
            iteration: 1,
        }
    }

    #[test]
    fn average_is_running_mean() {
        let mut metrics = Metrics::default();
        metrics.record_success(100, 2, 3);
        metrics.record_failure(300, ErrorCategory::Shape);
        metrics.record_success(200, 1, 0);
        assert_eq!(metrics.total_requests, 3);
        assert_eq!(metrics.average_processing_micros, 200);
        assert_eq!(metrics.successful, 2);
        assert_eq!(metrics.failed, 1);
        assert_eq!(metrics.shape_violations, 1);
        assert_eq!(metrics.reasoning_iterations_total, 3);
        assert_eq!(metrics.derived_facts_total, 3);
    }

    #[test]
    fn each_fact_recorded_once() {
        let a1 = AgentId::new("a1").expect("id");
        let a2 = AgentId::new("a2").expect("id");
        let session = SessionId::new("s").expect("id");
        let mut ledger = Ledger::new();
        let graph = "http://example.org/staging/x".to_string();
        let from_a1 = Attribution {
            agent: &a1,
            session: &session,
            graph: graph.clone(),
            rule_version: 1,
        };
        let from_a2 = Attribution {
            agent: &a2,
            session: &session,
            graph,
            rule_version: 1,
        };

        let first = [inference("X"), inference("Y")];
        assert_eq!(ledger.record_derived(&from_a1, &first), 2);
        assert_eq!(ledger.record_derived(&from_a2, &[inference("X"), inference("Z")]), 1);

        assert_eq!(ledger.provenance(None).len(), 3);
        assert_eq!(ledger.provenance(Some(&a1)).len(), 2);
        assert_eq!(ledger.provenance(Some(&a2))[0].triple, inference("Z").triple);
    }
}
