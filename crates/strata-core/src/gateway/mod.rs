//! # Validator Gateway
//!
//! The owned service context every write and read goes through.
//!
//! ## Lifecycle
//!
//! 1. `Gateway::new(config, store, shapes)` builds the context
//! 2. `bootstrap(standing)` loads the ontology, shapes and rules graphs once
//! 3. operations (`submit_delta`, `commit_session`, `promote_session`, ...)
//! 4. `shutdown()` logs and returns the final metrics
//!
//! ## Gate Sequence
//!
//! Every write runs `Authenticated → Parsed → AgentConsistent → ShapeValid →
//! Reasoned → GloballyConsistent` and stops at the first gate that fails,
//! reporting everything that gate found (see [`PipelineState`]).
//!
//! ## Two-Stage Commit
//!
//! `commit_session` promotes an agent's Staging into the session Consensus,
//! `promote_session` promotes a Consensus into Main. Both re-validate what was
//! actually written as a second, independent gate and restore the exact
//! prior content of the target layer when that gate fails.
//!
//! ## Locking
//!
//! Staging writes hold the agent's staging lock; commits hold the session
//! lock; promotions hold the Main lock. Locks are always taken in the order
//! Main → session → staging.

mod ledger;
mod outcome;
mod registry;

pub use ledger::{Ledger, Metrics, ProvenanceRecord};
pub use outcome::{ErrorCategory, GateError, PipelineState, Rejection, ValidationResult};
pub use registry::{AgentCredential, AgentSummary, Registry, default_permissions};

use crate::config::StrataConfig;
use crate::consistency::OntologyConstraints;
use crate::formats::{Snapshot, parse_graph};
use crate::primitives::{MAX_DELTA_TRIPLES, MAX_PAYLOAD_BYTES};
use crate::query::{QueryResult, SelectQuery};
use crate::reasoning::Reasoner;
use crate::rules::RuleSet;
use crate::shapes::{ShapeSet, ShapeValidator};
use crate::storage::{LayerStore, RetryingStore, StoreError};
use crate::{AgentId, Graph, GraphName, Permission, SessionId, StrataError};
use ledger::Attribution;
use outcome::Accepted;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

/// Tourism ontology loaded into the standing ontology graph.
pub const STANDARD_ONTOLOGY: &str = include_str!("../../config/tourism_ontology.ttl");

// =============================================================================
// REQUEST TYPES
// =============================================================================

/// What a delta does to the agent's staging graph.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeltaOperation {
    #[default]
    Add,
    Remove,
}

impl DeltaOperation {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Remove => "remove",
        }
    }
}

/// The three standing definition graphs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StandingGraphs {
    pub ontology: Graph,
    pub shapes: Graph,
    pub rules: Graph,
}

impl StandingGraphs {
    /// Tourism ontology, the standard shapes and a catalogue of `rules`.
    pub fn standard(base_uri: &str, rules: &RuleSet) -> Result<Self, StrataError> {
        Ok(Self {
            ontology: parse_graph(STANDARD_ONTOLOGY)?,
            shapes: ShapeSet::standard().to_graph(),
            rules: rules.catalogue(base_uri)?,
        })
    }
}

/// Triple counts per stored layer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayStatus {
    /// Graph key (`main`, `consensus/s1`, ...) to triple count.
    pub layers: BTreeMap<String, usize>,
    pub agents: usize,
    pub rule_version: u32,
    pub rules: usize,
}

// =============================================================================
// GATEWAY
// =============================================================================

/// The validator gateway.
pub struct Gateway<S: LayerStore> {
    config: StrataConfig,
    store: RetryingStore<S>,
    reasoner: Reasoner,
    constraints: OntologyConstraints,
    shapes: Box<dyn ShapeValidator>,
    registry: RwLock<Registry>,
    ledger: Mutex<Ledger>,
    session_locks: Mutex<BTreeMap<SessionId, Arc<Mutex<()>>>>,
    staging_locks: Mutex<BTreeMap<AgentId, Arc<Mutex<()>>>>,
    main_lock: Mutex<()>,
}

impl<S: LayerStore> std::fmt::Debug for Gateway<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gateway")
            .field("base_uri", &self.config.base_uri)
            .field("rules", &self.reasoner.rules().len())
            .field("agents", &self.registry.read().len())
            .finish()
    }
}

fn elapsed_micros(start: Instant) -> u64 {
    u64::try_from(start.elapsed().as_micros()).unwrap_or(u64::MAX)
}

/// Log a store failure and turn it into a generic system rejection.
fn store_failure(gate: PipelineState, operation: &str, graph: &GraphName, err: &StoreError) -> Rejection {
    tracing::error!(
        gate = %gate,
        operation,
        graph = %graph,
        error = %err,
        "store call failed"
    );
    Rejection::single(gate, GateError::system())
}

fn parse_delta(payload: &str) -> Result<Graph, Rejection> {
    let reject = |error: GateError| Rejection::single(PipelineState::Parsed, error);
    if payload.len() > MAX_PAYLOAD_BYTES {
        return Err(reject(GateError::parse(format!(
            "payload of {} bytes exceeds the {MAX_PAYLOAD_BYTES} byte limit",
            payload.len()
        ))));
    }
    let delta = parse_graph(payload).map_err(|e| reject(e.into()))?;
    if delta.is_empty() {
        return Err(reject(GateError::parse("payload contains no triples")));
    }
    if delta.len() > MAX_DELTA_TRIPLES {
        return Err(reject(GateError::parse(format!(
            "delta of {} triples exceeds the {MAX_DELTA_TRIPLES} triple limit",
            delta.len()
        ))));
    }
    Ok(delta)
}

impl<S: LayerStore> Gateway<S> {
    /// Build a gateway over `store`. The configuration is validated and the
    /// configured rule set loaded; malformed rules are logged, not fatal.
    pub fn new(
        config: StrataConfig,
        store: S,
        shapes: Box<dyn ShapeValidator>,
    ) -> Result<Self, StrataError> {
        config.validate()?;
        let rules = config.rule_set()?;
        tracing::info!(
            base_uri = %config.base_uri,
            rules = rules.len(),
            rule_version = rules.version,
            max_iterations = config.max_iterations,
            tolerance = %config.tolerance,
            "gateway initialized"
        );
        Ok(Self {
            store: RetryingStore::new(store, config.store_settings()),
            reasoner: Reasoner::new(rules),
            constraints: config.constraints(),
            shapes,
            registry: RwLock::new(Registry::new()),
            ledger: Mutex::new(Ledger::new()),
            session_locks: Mutex::new(BTreeMap::new()),
            staging_locks: Mutex::new(BTreeMap::new()),
            main_lock: Mutex::new(()),
            config,
        })
    }

    #[must_use]
    pub fn config(&self) -> &StrataConfig {
        &self.config
    }

    #[must_use]
    pub fn base_uri(&self) -> &str {
        &self.config.base_uri
    }

    #[must_use]
    pub fn rules(&self) -> &RuleSet {
        self.reasoner.rules()
    }

    /// The wrapped store.
    #[must_use]
    pub fn store(&self) -> &S {
        self.store.inner()
    }

    /// Load the standing graphs. Graphs that already hold data are left as
    /// they are, so calling this on every start is safe. Returns the number
    /// of triples written.
    pub fn bootstrap(&self, standing: &StandingGraphs) -> Result<usize, StrataError> {
        let mut loaded = 0usize;
        for (name, graph) in [
            (GraphName::Ontology, &standing.ontology),
            (GraphName::Shapes, &standing.shapes),
            (GraphName::Rules, &standing.rules),
        ] {
            if !self.store.fetch(&name)?.is_empty() {
                tracing::debug!(graph = %name, "standing graph already loaded");
                continue;
            }
            self.store.replace(&name, graph)?;
            loaded = loaded.saturating_add(graph.len());
            tracing::info!(graph = %name, triples = graph.len(), "standing graph loaded");
        }
        Ok(loaded)
    }

    /// Stop the gateway and hand back the final metrics.
    pub fn shutdown(self) -> Metrics {
        let metrics = self.ledger.lock().metrics();
        tracing::info!(
            total_requests = metrics.total_requests,
            successful = metrics.successful,
            failed = metrics.failed,
            rollbacks = metrics.rollbacks,
            "gateway shut down"
        );
        metrics
    }

    // =========================================================================
    // AGENTS
    // =========================================================================

    /// Register or re-register an agent. An empty permission list grants
    /// `Read` and `WriteStaging`.
    pub fn register_agent(
        &self,
        agent: AgentId,
        secret: &str,
        permissions: &[Permission],
    ) -> Result<bool, StrataError> {
        let created = self.registry.write().register(agent.clone(), secret, permissions)?;
        tracing::info!(agent = %agent, created, "agent registered");
        Ok(created)
    }

    pub fn deactivate_agent(&self, agent: &AgentId) -> bool {
        let found = self.registry.write().deactivate(agent);
        if found {
            tracing::info!(agent = %agent, "agent deactivated");
        }
        found
    }

    /// Check an agent's secret.
    #[must_use]
    pub fn authenticate(&self, agent: &AgentId, secret: &str) -> bool {
        self.registry.read().authenticate(agent, secret)
    }

    #[must_use]
    pub fn agents(&self) -> Vec<AgentSummary> {
        self.registry.read().list()
    }

    fn authorize(&self, agent: &AgentId, permission: Permission) -> Result<(), Rejection> {
        self.registry
            .read()
            .authorize(agent, permission)
            .map_err(|message| {
                tracing::warn!(agent = %agent, permission = permission.as_str(), %message, "authorization failed");
                Rejection::single(PipelineState::Authenticated, GateError::authentication(message))
            })
    }

    /// Reject a graph URI that is not the agent's own staging graph.
    fn own_staging(&self, agent: &AgentId, uri: &str) -> Result<GraphName, Rejection> {
        let staging = GraphName::Staging(agent.clone());
        if GraphName::parse(self.base_uri(), uri).as_ref() == Some(&staging) {
            return Ok(staging);
        }
        Err(Rejection::single(
            PipelineState::Authenticated,
            GateError::authentication(format!(
                "agent '{agent}' may only write to {}",
                staging.uri(self.base_uri())
            )),
        ))
    }

    // =========================================================================
    // STORE ACCESS
    // =========================================================================

    fn fetch(&self, graph: &GraphName, gate: PipelineState) -> Result<Graph, Rejection> {
        self.store
            .fetch(graph)
            .map_err(|e| store_failure(gate, "fetch", graph, &e))
    }

    fn replace(&self, graph: &GraphName, content: &Graph, gate: PipelineState) -> Result<(), Rejection> {
        self.store
            .replace(graph, content)
            .map_err(|e| store_failure(gate, "replace", graph, &e))
    }

    fn clear(&self, graph: &GraphName, gate: PipelineState) -> Result<(), Rejection> {
        self.store
            .clear(graph)
            .map_err(|e| store_failure(gate, "clear", graph, &e))
    }

    /// Put `graph` back to `content` after a failed second gate.
    fn restore(&self, graph: &GraphName, content: &Graph, mut rejection: Rejection) -> Rejection {
        match self.store.replace(graph, content) {
            Ok(()) => {
                tracing::warn!(graph = %graph, gate = %rejection.gate, "promotion rolled back");
                rejection.rolled_back = true;
                rejection
            }
            Err(e) => store_failure(rejection.gate, "restore", graph, &e),
        }
    }

    fn session_lock(&self, session: &SessionId) -> Arc<Mutex<()>> {
        Arc::clone(self.session_locks.lock().entry(session.clone()).or_default())
    }

    fn staging_lock(&self, agent: &AgentId) -> Arc<Mutex<()>> {
        Arc::clone(self.staging_locks.lock().entry(agent.clone()).or_default())
    }

    // =========================================================================
    // GATES
    // =========================================================================

    /// ShapeValid → Reasoned → GloballyConsistent over one merged view.
    fn validate_view(&self, mut view: Graph) -> Result<Accepted, Rejection> {
        let report = self.shapes.validate(&view);
        if !report.conforms {
            return Err(Rejection::new(
                PipelineState::ShapeValid,
                report.violations.into_iter().map(GateError::Shape).collect(),
            ));
        }

        let outcome = self.reasoner.run(&mut view, self.config.max_iterations);
        if !outcome.reached_fixpoint {
            tracing::warn!(
                iterations = outcome.iterations,
                derived = outcome.inferences.len(),
                "reasoning stopped at the iteration cap"
            );
        }
        if !outcome.contradictions.is_empty() {
            return Err(Rejection::new(
                PipelineState::Reasoned,
                outcome
                    .contradictions
                    .into_iter()
                    .map(GateError::Contradiction)
                    .collect(),
            ));
        }

        let violations = self.constraints.check_global(&view);
        if !violations.is_empty() {
            return Err(Rejection::new(
                PipelineState::GloballyConsistent,
                violations.into_iter().map(GateError::Consistency).collect(),
            ));
        }

        Ok(Accepted {
            derived: outcome.inferences,
            iterations: outcome.iterations,
            reached_fixpoint: outcome.reached_fixpoint,
        })
    }

    /// The full gate sequence for candidate staging content.
    fn validate_candidate(
        &self,
        staging: &GraphName,
        session: &GraphName,
        candidate: &Graph,
        consensus: &Graph,
        main: &Graph,
    ) -> Result<Accepted, Rejection> {
        let conflicts = self
            .constraints
            .check_agent(staging, session, candidate, consensus, main);
        if !conflicts.is_empty() {
            return Err(Rejection::new(
                PipelineState::AgentConsistent,
                conflicts.into_iter().map(GateError::Consistency).collect(),
            ));
        }
        self.validate_view(self.constraints.merge_layers(main, consensus, candidate))
    }

    /// Validate `upper` laid over `lower`, including their cross-layer
    /// conflicts.
    fn validate_pair(
        &self,
        upper_name: &GraphName,
        lower_name: &GraphName,
        upper: &Graph,
        lower: &Graph,
    ) -> Result<Accepted, Rejection> {
        let accepted = self.validate_view(self.constraints.overlay(upper, lower))?;
        let conflicts = self
            .constraints
            .cross_layer(upper, lower, upper_name, lower_name);
        if !conflicts.is_empty() {
            return Err(Rejection::new(
                PipelineState::GloballyConsistent,
                conflicts.into_iter().map(GateError::Consistency).collect(),
            ));
        }
        Ok(accepted)
    }

    // =========================================================================
    // WRITE OPERATIONS
    // =========================================================================

    /// Apply a delta to the agent's staging graph.
    ///
    /// The candidate staging content (existing staging plus or minus the
    /// delta) goes through every gate; only on acceptance does it replace
    /// the staging graph.
    pub fn submit_delta(
        &self,
        agent: &AgentId,
        session: &SessionId,
        target_graph: &str,
        payload: &str,
        operation: DeltaOperation,
    ) -> ValidationResult {
        let start = Instant::now();
        tracing::debug!(agent = %agent, session = %session, operation = operation.as_str(), bytes = payload.len(), "delta received");
        let outcome = self.try_submit(agent, session, target_graph, payload, operation);
        let graph = GraphName::Staging(agent.clone());
        self.finish("submit_delta", "Delta accepted into staging", agent, session, &graph, start, outcome)
    }

    fn try_submit(
        &self,
        agent: &AgentId,
        session: &SessionId,
        target_graph: &str,
        payload: &str,
        operation: DeltaOperation,
    ) -> Result<Accepted, Rejection> {
        self.authorize(agent, Permission::WriteStaging)?;
        let staging = self.own_staging(agent, target_graph)?;
        let delta = parse_delta(payload)?;

        let lock = self.staging_lock(agent);
        let _staging_guard = lock.lock();

        let gate = PipelineState::AgentConsistent;
        let existing = self.fetch(&staging, gate)?;
        let session_name = GraphName::Consensus(session.clone());
        let consensus = self.fetch(&session_name, gate)?;
        let main = self.fetch(&GraphName::Main, gate)?;

        let candidate = match operation {
            DeltaOperation::Add => existing.union(&delta),
            DeltaOperation::Remove => existing.difference(&delta),
        };
        let accepted =
            self.validate_candidate(&staging, &session_name, &candidate, &consensus, &main)?;
        self.replace(&staging, &candidate, PipelineState::Committed)?;
        Ok(accepted)
    }

    /// Promote an agent's staging graph into the session's Consensus.
    ///
    /// The staged data is validated again, written into Consensus, and the
    /// written Consensus is validated against Main as a second gate. When
    /// that gate fails Consensus is restored and Staging is left untouched;
    /// on success Staging is cleared.
    pub fn commit_session(
        &self,
        agent: &AgentId,
        session: &SessionId,
        staging_graph: &str,
    ) -> ValidationResult {
        let start = Instant::now();
        tracing::debug!(agent = %agent, session = %session, "commit received");
        let outcome = self.try_commit(agent, session, staging_graph);
        let graph = GraphName::Consensus(session.clone());
        self.finish("commit_session", "Session committed to consensus", agent, session, &graph, start, outcome)
    }

    fn try_commit(
        &self,
        agent: &AgentId,
        session: &SessionId,
        staging_graph: &str,
    ) -> Result<Accepted, Rejection> {
        self.authorize(agent, Permission::WriteConsensus)?;
        let staging = self.own_staging(agent, staging_graph)?;
        let session_name = GraphName::Consensus(session.clone());

        let session_lock = self.session_lock(session);
        let _session_guard = session_lock.lock();
        let staging_lock = self.staging_lock(agent);
        let _staging_guard = staging_lock.lock();

        let gate = PipelineState::AgentConsistent;
        let staged = self.fetch(&staging, gate)?;
        if staged.is_empty() {
            return Err(Rejection::single(
                PipelineState::Parsed,
                GateError::parse("no staged data to commit"),
            ));
        }
        let before = self.fetch(&session_name, gate)?;
        let main = self.fetch(&GraphName::Main, gate)?;
        self.validate_candidate(&staging, &session_name, &staged, &before, &main)?;

        let promoted = self.constraints.overlay(&staged, &before);
        self.replace(&session_name, &promoted, PipelineState::Committed)?;

        // Second gate: what was written, against the current Main.
        let second = self
            .fetch(&session_name, PipelineState::GloballyConsistent)
            .and_then(|consensus| {
                let main = self.fetch(&GraphName::Main, PipelineState::GloballyConsistent)?;
                self.validate_pair(&session_name, &GraphName::Main, &consensus, &main)
            });
        let accepted = match second {
            Ok(accepted) => accepted,
            Err(rejection) => return Err(self.restore(&session_name, &before, rejection)),
        };

        if let Err(rejection) = self.clear(&staging, PipelineState::Committed) {
            return Err(self.restore(&session_name, &before, rejection));
        }
        Ok(accepted)
    }

    /// Promote a session's Consensus into Main.
    ///
    /// Consensus and Main are validated together, Consensus is written into
    /// Main, and Main is validated again. When that fails Main is restored;
    /// on success the Consensus graph is cleared.
    pub fn promote_session(&self, agent: &AgentId, session: &SessionId) -> ValidationResult {
        let start = Instant::now();
        tracing::debug!(agent = %agent, session = %session, "promotion received");
        let outcome = self.try_promote(agent, session);
        self.finish("promote_session", "Consensus promoted to main", agent, session, &GraphName::Main, start, outcome)
    }

    fn try_promote(&self, agent: &AgentId, session: &SessionId) -> Result<Accepted, Rejection> {
        self.authorize(agent, Permission::WriteConsensus)?;
        let session_name = GraphName::Consensus(session.clone());

        let _main_guard = self.main_lock.lock();
        let session_lock = self.session_lock(session);
        let _session_guard = session_lock.lock();

        let gate = PipelineState::AgentConsistent;
        let consensus = self.fetch(&session_name, gate)?;
        if consensus.is_empty() {
            return Err(Rejection::single(
                PipelineState::Parsed,
                GateError::parse(format!("session '{session}' has no consensus data to promote")),
            ));
        }
        let before = self.fetch(&GraphName::Main, gate)?;
        self.validate_pair(&session_name, &GraphName::Main, &consensus, &before)?;

        let promoted = self.constraints.overlay(&consensus, &before);
        self.replace(&GraphName::Main, &promoted, PipelineState::Committed)?;

        let second = self
            .fetch(&GraphName::Main, PipelineState::GloballyConsistent)
            .and_then(|main| self.validate_view(main));
        let accepted = match second {
            Ok(accepted) => accepted,
            Err(rejection) => return Err(self.restore(&GraphName::Main, &before, rejection)),
        };

        if let Err(rejection) = self.clear(&session_name, PipelineState::Committed) {
            return Err(self.restore(&GraphName::Main, &before, rejection));
        }
        Ok(accepted)
    }

    /// Record metrics and provenance, and build the caller's result.
    fn finish(
        &self,
        operation: &'static str,
        message: &str,
        agent: &AgentId,
        session: &SessionId,
        graph: &GraphName,
        start: Instant,
        outcome: Result<Accepted, Rejection>,
    ) -> ValidationResult {
        let micros = elapsed_micros(start);
        let mut ledger = self.ledger.lock();
        match outcome {
            Ok(accepted) => {
                ledger.metrics.record_success(
                    micros,
                    accepted.iterations,
                    accepted.derived.len(),
                );
                let source = Attribution {
                    agent,
                    session,
                    graph: graph.uri(self.base_uri()),
                    rule_version: self.reasoner.rules().version,
                };
                let recorded = ledger.record_derived(&source, &accepted.derived);
                tracing::info!(
                    operation,
                    agent = %agent,
                    session = %session,
                    derived = accepted.derived.len(),
                    recorded,
                    iterations = accepted.iterations,
                    micros,
                    "request committed"
                );
                ValidationResult::accepted(message, accepted, micros)
            }
            Err(rejection) => {
                let category = rejection.category();
                ledger.metrics.record_failure(micros, category);
                if rejection.rolled_back {
                    ledger.metrics.record_rollback();
                }
                tracing::info!(
                    operation,
                    agent = %agent,
                    session = %session,
                    gate = %rejection.gate,
                    category = ?category,
                    errors = rejection.errors.len(),
                    rolled_back = rejection.rolled_back,
                    micros,
                    "request rejected"
                );
                ValidationResult::rejected(rejection, micros)
            }
        }
    }

    // =========================================================================
    // READ OPERATIONS
    // =========================================================================

    /// Run a `SELECT` query over one named graph, or over the union of all
    /// stored graphs when `graph_uri` is `None`.
    pub fn query_graph(
        &self,
        agent: &AgentId,
        query: &str,
        graph_uri: Option<&str>,
    ) -> Result<QueryResult, Rejection> {
        self.authorize(agent, Permission::Read)?;
        let parsed = SelectQuery::parse(query).map_err(|e| {
            let error = match e {
                StrataError::Parse(err) => GateError::from(err),
                other => GateError::parse(other.to_string()),
            };
            Rejection::single(PipelineState::Parsed, error)
        })?;

        let gate = PipelineState::Committed;
        let view = match graph_uri {
            Some(uri) => {
                let name = GraphName::parse(self.base_uri(), uri).ok_or_else(|| {
                    Rejection::single(
                        PipelineState::Parsed,
                        GateError::parse(format!("unknown graph '{uri}'")),
                    )
                })?;
                self.fetch(&name, gate)?
            }
            None => {
                let names = self
                    .store
                    .graph_names()
                    .map_err(|e| store_failure(gate, "graph_names", &GraphName::Main, &e))?;
                let mut all = Graph::new();
                for name in names {
                    all.extend(self.fetch(&name, gate)?.iter());
                }
                all
            }
        };
        let result = parsed.execute(&view);
        tracing::debug!(agent = %agent, rows = result.rows.len(), "query answered");
        Ok(result)
    }

    #[must_use]
    pub fn metrics(&self) -> Metrics {
        self.ledger.lock().metrics()
    }

    /// Provenance records in recording order, optionally for one agent.
    #[must_use]
    pub fn provenance(&self, agent: Option<&AgentId>) -> Vec<ProvenanceRecord> {
        self.ledger.lock().provenance(agent)
    }

    /// Triple counts of every stored layer.
    pub fn status(&self) -> Result<GatewayStatus, StrataError> {
        let mut layers = BTreeMap::new();
        for name in self.store.graph_names()? {
            let count = self.store.fetch(&name)?.len();
            layers.insert(name.key(), count);
        }
        Ok(GatewayStatus {
            layers,
            agents: self.registry.read().len(),
            rule_version: self.reasoner.rules().version,
            rules: self.reasoner.rules().len(),
        })
    }

    // =========================================================================
    // SNAPSHOTS
    // =========================================================================

    /// Every stored layer.
    pub fn export_snapshot(&self) -> Result<Snapshot, StrataError> {
        let _main_guard = self.main_lock.lock();
        let mut snapshot = Snapshot::default();
        for name in self.store.graph_names()? {
            let graph = self.store.fetch(&name)?;
            snapshot.layers.insert(name, graph);
        }
        Ok(snapshot)
    }

    /// Replace the stored layers named in `snapshot`. Returns the number of
    /// triples written.
    pub fn import_snapshot(&self, snapshot: &Snapshot) -> Result<usize, StrataError> {
        let _main_guard = self.main_lock.lock();
        for (name, graph) in &snapshot.layers {
            self.store.replace(name, graph)?;
        }
        let triples = snapshot.triple_count();
        tracing::info!(layers = snapshot.layers.len(), triples, "snapshot imported");
        Ok(triples)
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitives::DEFAULT_BASE_URI;
    use crate::storage::MemoryStore;
    use crate::{Iri, Triple};

    fn agent(name: &str) -> AgentId {
        AgentId::new(name).expect("agent id")
    }

    fn session(name: &str) -> SessionId {
        SessionId::new(name).expect("session id")
    }

    fn staging_uri(name: &str) -> String {
        GraphName::Staging(agent(name)).uri(DEFAULT_BASE_URI)
    }

    fn gateway() -> Gateway<MemoryStore> {
        let gateway = Gateway::new(
            StrataConfig::default(),
            MemoryStore::new(),
            Box::new(ShapeSet::standard()),
        )
        .expect("gateway");
        gateway
            .register_agent(
                agent("a1"),
                "k1",
                &[Permission::Read, Permission::WriteStaging, Permission::WriteConsensus],
            )
            .expect("register");
        gateway
    }

    const CITY: &str = "tourism:Dubai a tourism:City ; tourism:isCoastal true .";

    #[test]
    fn delta_lands_in_own_staging() {
        let gateway = gateway();
        let result = gateway.submit_delta(
            &agent("a1"),
            &session("s1"),
            &staging_uri("a1"),
            CITY,
            DeltaOperation::Add,
        );
        assert!(result.success, "{result:?}");
        assert_eq!(result.state, PipelineState::Committed);

        let staged = gateway
            .store()
            .fetch(&GraphName::Staging(agent("a1")))
            .expect("fetch");
        assert_eq!(staged.len(), 2);
        // Derived facts are reported, not written.
        assert!(!staged.contains(&Triple::typed(Iri::tourism("Dubai"), Iri::tourism("CoastalCity"))));
        assert_eq!(result.derived.len(), 1);
    }

    #[test]
    fn foreign_staging_graph_is_an_authentication_failure() {
        let gateway = gateway();
        let result = gateway.submit_delta(
            &agent("a1"),
            &session("s1"),
            &staging_uri("a2"),
            CITY,
            DeltaOperation::Add,
        );
        assert_eq!(result.failed_gate, Some(PipelineState::Authenticated));
        assert_eq!(result.category(), Some(ErrorCategory::Authentication));
        assert_eq!(gateway.metrics().authentication_failures, 1);
    }

    #[test]
    fn unknown_agent_is_rejected() {
        let gateway = gateway();
        let result = gateway.submit_delta(
            &agent("ghost"),
            &session("s1"),
            &staging_uri("ghost"),
            CITY,
            DeltaOperation::Add,
        );
        assert_eq!(result.category(), Some(ErrorCategory::Authentication));
    }

    #[test]
    fn malformed_and_empty_payloads_are_parse_failures() {
        let gateway = gateway();
        for payload in ["tourism:Dubai a", "# nothing here"] {
            let result = gateway.submit_delta(
                &agent("a1"),
                &session("s1"),
                &staging_uri("a1"),
                payload,
                DeltaOperation::Add,
            );
            assert_eq!(result.failed_gate, Some(PipelineState::Parsed));
            assert_eq!(result.category(), Some(ErrorCategory::Parse));
        }
        assert_eq!(gateway.metrics().parse_failures, 2);
    }

    #[test]
    fn remove_shrinks_staging() {
        let gateway = gateway();
        let (a1, s1, uri) = (agent("a1"), session("s1"), staging_uri("a1"));
        assert!(gateway.submit_delta(&a1, &s1, &uri, CITY, DeltaOperation::Add).success);
        let result = gateway.submit_delta(
            &a1,
            &s1,
            &uri,
            "tourism:Dubai tourism:isCoastal true .",
            DeltaOperation::Remove,
        );
        assert!(result.success, "{result:?}");
        let staged = gateway
            .store()
            .fetch(&GraphName::Staging(a1))
            .expect("fetch");
        assert_eq!(staged.len(), 1);
    }

    #[test]
    fn commit_then_promote_moves_data_to_main() {
        let gateway = gateway();
        let (a1, s1, uri) = (agent("a1"), session("s1"), staging_uri("a1"));
        assert!(gateway.submit_delta(&a1, &s1, &uri, CITY, DeltaOperation::Add).success);
        assert!(gateway.commit_session(&a1, &s1, &uri).success);
        assert!(gateway.store().fetch(&GraphName::Staging(a1.clone())).expect("fetch").is_empty());

        let result = gateway.promote_session(&a1, &s1);
        assert!(result.success, "{result:?}");
        assert_eq!(gateway.store().fetch(&GraphName::Main).expect("fetch").len(), 2);
        assert!(gateway.store().fetch(&GraphName::Consensus(s1)).expect("fetch").is_empty());
    }

    #[test]
    fn empty_staging_cannot_be_committed() {
        let gateway = gateway();
        let result = gateway.commit_session(&agent("a1"), &session("s1"), &staging_uri("a1"));
        assert_eq!(result.category(), Some(ErrorCategory::Parse));
        assert!(result.errors[0].message().contains("no staged data"));
    }

    #[test]
    fn commit_needs_consensus_permission() {
        let gateway = gateway();
        gateway.register_agent(agent("w"), "k", &[]).expect("register");
        let result = gateway.commit_session(&agent("w"), &session("s1"), &staging_uri("w"));
        assert_eq!(result.failed_gate, Some(PipelineState::Authenticated));
    }

    #[test]
    fn bootstrap_loads_standing_graphs_once() {
        let gateway = gateway();
        let standing = StandingGraphs::standard(gateway.base_uri(), gateway.rules()).expect("standing");
        let loaded = gateway.bootstrap(&standing).expect("bootstrap");
        assert!(loaded > 0);
        assert_eq!(gateway.bootstrap(&standing).expect("second bootstrap"), 0);
        let status = gateway.status().expect("status");
        assert_eq!(status.layers.get("shapes"), Some(&standing.shapes.len()));
    }

    #[test]
    fn query_scoped_to_one_graph() {
        let gateway = gateway();
        let (a1, s1, uri) = (agent("a1"), session("s1"), staging_uri("a1"));
        assert!(gateway.submit_delta(&a1, &s1, &uri, CITY, DeltaOperation::Add).success);

        let text = "SELECT ?c WHERE { ?c a tourism:City }";
        let all = gateway.query_graph(&a1, text, None).expect("query");
        assert_eq!(all.rows.len(), 1);
        let main = gateway
            .query_graph(&a1, text, Some(&GraphName::Main.uri(DEFAULT_BASE_URI)))
            .expect("query");
        assert!(main.rows.is_empty());

        let bad = gateway.query_graph(&a1, "SELECT WHERE", None).expect_err("bad query");
        assert_eq!(bad.category(), ErrorCategory::Parse);
    }

    #[test]
    fn snapshot_round_trip_through_gateway() {
        let source = gateway();
        let (a1, s1, uri) = (agent("a1"), session("s1"), staging_uri("a1"));
        assert!(source.submit_delta(&a1, &s1, &uri, CITY, DeltaOperation::Add).success);
        let snapshot = source.export_snapshot().expect("export");

        let target = gateway();
        assert_eq!(target.import_snapshot(&snapshot).expect("import"), 2);
        assert_eq!(target.export_snapshot().expect("export"), snapshot);
    }

    #[test]
    fn shutdown_returns_final_metrics() {
        let gateway = gateway();
        gateway.submit_delta(
            &agent("a1"),
            &session("s1"),
            &staging_uri("a1"),
            CITY,
            DeltaOperation::Add,
        );
        let metrics = gateway.shutdown();
        assert_eq!(metrics.total_requests, 1);
        assert_eq!(metrics.successful, 1);
    }
}
