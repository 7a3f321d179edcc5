//! In-process `LayerStore`.

use super::{LayerStore, StoreError};
use crate::{Graph, GraphName};
use parking_lot::RwLock;
use std::collections::BTreeMap;

/// Graph partitions held in memory behind a `RwLock`.
#[derive(Debug, Default)]
pub struct MemoryStore {
    graphs: RwLock<BTreeMap<GraphName, Graph>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl LayerStore for MemoryStore {
    fn fetch(&self, graph: &GraphName) -> Result<Graph, StoreError> {
        Ok(self.graphs.read().get(graph).cloned().unwrap_or_default())
    }

    fn insert(&self, graph: &GraphName, triples: &Graph) -> Result<usize, StoreError> {
        let mut graphs = self.graphs.write();
        let target = graphs.entry(graph.clone()).or_default();
        Ok(target.extend(triples.iter()))
    }

    fn delete(&self, graph: &GraphName, triples: &Graph) -> Result<usize, StoreError> {
        let mut graphs = self.graphs.write();
        let Some(target) = graphs.get_mut(graph) else {
            return Ok(0);
        };
        let removed = triples.iter().filter(|t| target.remove(t)).count();
        if target.is_empty() {
            graphs.remove(graph);
        }
        Ok(removed)
    }

    fn clear(&self, graph: &GraphName) -> Result<(), StoreError> {
        self.graphs.write().remove(graph);
        Ok(())
    }

    fn replace(&self, graph: &GraphName, content: &Graph) -> Result<(), StoreError> {
        let mut graphs = self.graphs.write();
        if content.is_empty() {
            graphs.remove(graph);
        } else {
            graphs.insert(graph.clone(), content.clone());
        }
        Ok(())
    }

    fn graph_names(&self) -> Result<Vec<GraphName>, StoreError> {
        Ok(self
            .graphs
            .read()
            .iter()
            .filter(|(_, g)| !g.is_empty())
            .map(|(name, _)| name.clone())
            .collect())
    }
}
