//! # Storage Module
//!
//! The Graph Layer Store seam and its backends.
//!
//! The gateway never touches graph partitions directly. Every read and write
//! goes through a `LayerStore` with blocking request/response calls; those
//! calls are the only points where a request can stall, so they are wrapped
//! in a `RetryingStore` that bounds them with a deadline and retries
//! transient failures.
//!
//! ## Backends
//!
//! - `MemoryStore`: in-process map of graphs
//! - `RedbStore`: disk-backed, one ACID write transaction per call

mod memory;
mod redb_store;
mod retry;

pub use memory::MemoryStore;
pub use redb_store::RedbStore;
pub use retry::{RetryingStore, StoreSettings};

use crate::{Graph, GraphName, StrataError};
use std::path::Path;
use thiserror::Error;

// =============================================================================
// ERRORS
// =============================================================================

/// Failure of a store call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// The backend cannot be reached right now.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// The call (including retries) exceeded its deadline.
    #[error("store call '{operation}' timed out after {elapsed_ms} ms")]
    Timeout { operation: String, elapsed_ms: u64 },

    /// Stored bytes could not be decoded.
    #[error("stored data is corrupt: {0}")]
    Corrupt(String),

    /// Any other backend failure.
    #[error("store backend error: {0}")]
    Backend(String),
}

impl StoreError {
    /// Whether retrying the same call may succeed.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable(_) | Self::Timeout { .. })
    }
}

// =============================================================================
// LAYER STORE TRAIT
// =============================================================================

/// Read/write access to named graph partitions.
///
/// All methods take `&self`; backends provide their own interior locking.
/// Writes to a single graph are atomic: a failed call leaves the graph as
/// it was.
pub trait LayerStore: Send + Sync {
    /// Full content of `graph` (empty if it does not exist).
    fn fetch(&self, graph: &GraphName) -> Result<Graph, StoreError>;

    /// Add triples. Returns how many were new.
    fn insert(&self, graph: &GraphName, triples: &Graph) -> Result<usize, StoreError>;

    /// Remove triples. Returns how many were present.
    fn delete(&self, graph: &GraphName, triples: &Graph) -> Result<usize, StoreError>;

    /// Remove every triple of `graph`.
    fn clear(&self, graph: &GraphName) -> Result<(), StoreError>;

    /// Atomically set `graph` to exactly `content`.
    fn replace(&self, graph: &GraphName, content: &Graph) -> Result<(), StoreError>;

    /// Every non-empty graph, in `GraphName` order.
    fn graph_names(&self) -> Result<Vec<GraphName>, StoreError>;
}

// =============================================================================
// STORAGE BACKEND
// =============================================================================

/// Backend chosen at startup.
#[derive(Debug)]
pub enum StorageBackend {
    /// In-memory layers (fast, volatile).
    InMemory(MemoryStore),
    /// Disk-backed layers using redb (ACID, persistent).
    Persistent(RedbStore),
}

impl Default for StorageBackend {
    fn default() -> Self {
        Self::InMemory(MemoryStore::new())
    }
}

impl StorageBackend {
    /// Open or create a redb database at the given path.
    pub fn redb(path: impl AsRef<Path>) -> Result<Self, StrataError> {
        Ok(Self::Persistent(RedbStore::open(path)?))
    }

    #[must_use]
    pub fn is_persistent(&self) -> bool {
        matches!(self, Self::Persistent(_))
    }

    fn as_store(&self) -> &dyn LayerStore {
        match self {
            Self::InMemory(store) => store,
            Self::Persistent(store) => store,
        }
    }
}

impl LayerStore for StorageBackend {
    fn fetch(&self, graph: &GraphName) -> Result<Graph, StoreError> {
        self.as_store().fetch(graph)
    }

    fn insert(&self, graph: &GraphName, triples: &Graph) -> Result<usize, StoreError> {
        self.as_store().insert(graph, triples)
    }

    fn delete(&self, graph: &GraphName, triples: &Graph) -> Result<usize, StoreError> {
        self.as_store().delete(graph, triples)
    }

    fn clear(&self, graph: &GraphName) -> Result<(), StoreError> {
        self.as_store().clear(graph)
    }

    fn replace(&self, graph: &GraphName, content: &Graph) -> Result<(), StoreError> {
        self.as_store().replace(graph, content)
    }

    fn graph_names(&self) -> Result<Vec<GraphName>, StoreError> {
        self.as_store().graph_names()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Iri, Triple};

    #[test]
    fn backends_behave_alike() {
        let dir = tempfile::tempdir().expect("tempdir");
        let backends = [
            StorageBackend::default(),
            StorageBackend::redb(dir.path().join("layers.redb")).expect("open"),
        ];
        let mut graph = Graph::new();
        graph.insert(Triple::typed(Iri::tourism("Reef"), Iri::tourism("Attraction")));

        for backend in &backends {
            backend.replace(&GraphName::Main, &graph).expect("replace");
            assert_eq!(backend.fetch(&GraphName::Main).expect("fetch"), graph);
            assert_eq!(backend.graph_names().expect("names"), vec![GraphName::Main]);
            backend.clear(&GraphName::Main).expect("clear");
            assert!(backend.graph_names().expect("names").is_empty());
        }
        assert!(!backends[0].is_persistent());
        assert!(backends[1].is_persistent());
    }

    #[test]
    fn transient_classification() {
        assert!(StoreError::Unavailable("down".into()).is_transient());
        assert!(
            StoreError::Timeout {
                operation: "fetch".into(),
                elapsed_ms: 10
            }
            .is_transient()
        );
        assert!(!StoreError::Corrupt("bad".into()).is_transient());
        assert!(!StoreError::Backend("disk full".into()).is_transient());
    }
}
