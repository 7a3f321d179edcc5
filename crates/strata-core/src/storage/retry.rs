//! # Bounded Store Access
//!
//! `RetryingStore` wraps any `LayerStore` so that every call has a deadline
//! and a bounded number of retries on transient failure.
//!
//! Calls are blocking and cannot be interrupted mid-flight. The deadline is
//! therefore enforced between attempts: a retry that would start after the
//! deadline is not made and the call fails with `StoreError::Timeout`.

use super::{LayerStore, StoreError};
use crate::primitives::{DEFAULT_STORE_BACKOFF_MS, DEFAULT_STORE_RETRIES, DEFAULT_STORE_TIMEOUT_MS};
use crate::{Graph, GraphName};
use std::time::{Duration, Instant};

/// Deadline and retry policy for store calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreSettings {
    /// Overall deadline for one call including its retries.
    pub timeout: Duration,
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Linear backoff unit: retry `n` waits `n * backoff`.
    pub backoff: Duration,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(DEFAULT_STORE_TIMEOUT_MS),
            max_retries: DEFAULT_STORE_RETRIES,
            backoff: Duration::from_millis(DEFAULT_STORE_BACKOFF_MS),
        }
    }
}

/// A `LayerStore` with deadline and retry applied to every call.
#[derive(Debug)]
pub struct RetryingStore<S> {
    inner: S,
    settings: StoreSettings,
}

impl<S: LayerStore> RetryingStore<S> {
    #[must_use]
    pub fn new(inner: S, settings: StoreSettings) -> Self {
        Self { inner, settings }
    }

    /// The wrapped backend.
    #[must_use]
    pub fn inner(&self) -> &S {
        &self.inner
    }

    #[must_use]
    pub fn settings(&self) -> StoreSettings {
        self.settings
    }

    fn call<T>(
        &self,
        operation: &str,
        graph: Option<&GraphName>,
        f: impl Fn(&S) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let started = Instant::now();
        let mut attempt: u32 = 0;
        loop {
            let result = f(&self.inner);
            let elapsed = started.elapsed();
            match result {
                Ok(value) => {
                    if elapsed > self.settings.timeout {
                        tracing::warn!(
                            operation,
                            graph = ?graph,
                            elapsed_ms = elapsed.as_millis() as u64,
                            "store call completed after its deadline"
                        );
                    }
                    return Ok(value);
                }
                Err(err) if err.is_transient() && attempt < self.settings.max_retries => {
                    attempt = attempt.saturating_add(1);
                    let pause = self.settings.backoff.saturating_mul(attempt);
                    if elapsed.saturating_add(pause) > self.settings.timeout {
                        tracing::error!(
                            operation,
                            attempt,
                            error = %err,
                            "store call deadline exceeded"
                        );
                        return Err(StoreError::Timeout {
                            operation: operation.to_string(),
                            elapsed_ms: elapsed.as_millis() as u64,
                        });
                    }
                    tracing::warn!(
                        operation,
                        graph = ?graph,
                        attempt,
                        error = %err,
                        "transient store failure, retrying"
                    );
                    std::thread::sleep(pause);
                }
                Err(err) => {
                    tracing::error!(operation, attempts = attempt.saturating_add(1), error = %err, "store call failed");
                    return Err(err);
                }
            }
        }
    }
}

impl<S: LayerStore> LayerStore for RetryingStore<S> {
    fn fetch(&self, graph: &GraphName) -> Result<Graph, StoreError> {
        self.call("fetch", Some(graph), |s| s.fetch(graph))
    }

    fn insert(&self, graph: &GraphName, triples: &Graph) -> Result<usize, StoreError> {
        self.call("insert", Some(graph), |s| s.insert(graph, triples))
    }

    fn delete(&self, graph: &GraphName, triples: &Graph) -> Result<usize, StoreError> {
        self.call("delete", Some(graph), |s| s.delete(graph, triples))
    }

    fn clear(&self, graph: &GraphName) -> Result<(), StoreError> {
        self.call("clear", Some(graph), |s| s.clear(graph))
    }

    fn replace(&self, graph: &GraphName, content: &Graph) -> Result<(), StoreError> {
        self.call("replace", Some(graph), |s| s.replace(graph, content))
    }

    fn graph_names(&self) -> Result<Vec<GraphName>, StoreError> {
        self.call("graph_names", None, |s| s.graph_names())
    }
}
