//! # redb-backed Layer Store
//!
//! A disk-backed `LayerStore` using the redb embedded database.
//!
//! One multimap table holds every layer: the key is the graph key
//! (`main`, `consensus/<session>`, `staging/<agent>`, ...), each value is a
//! postcard-encoded triple. Every write call runs in its own ACID write
//! transaction, so a failed `replace` leaves the previous content intact.

use super::{LayerStore, StoreError};
use crate::{Graph, GraphName, StrataError, Triple};
use redb::{
    Database, MultimapTableDefinition, ReadableDatabase, ReadableMultimapTable,
};
use std::path::Path;

/// Table of layers: graph key -> postcard(Triple)
const LAYERS: MultimapTableDefinition<&str, &[u8]> = MultimapTableDefinition::new("layers");

fn backend(e: impl std::fmt::Display) -> StoreError {
    StoreError::Backend(e.to_string())
}

fn encode(triple: &Triple) -> Result<Vec<u8>, StoreError> {
    postcard::to_stdvec(triple).map_err(|e| StoreError::Corrupt(e.to_string()))
}

fn decode(bytes: &[u8]) -> Result<Triple, StoreError> {
    postcard::from_bytes(bytes).map_err(|e| StoreError::Corrupt(e.to_string()))
}

/// A disk-backed layer store.
pub struct RedbStore {
    db: Database,
}

impl std::fmt::Debug for RedbStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedbStore").finish_non_exhaustive()
    }
}

impl RedbStore {
    /// Open or create a layer database at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StrataError> {
        let db = Database::create(path.as_ref()).map_err(|e| StrataError::Io(e.to_string()))?;

        // Initialize the table so read transactions can always open it.
        let write_txn = db.begin_write().map_err(|e| StrataError::Io(e.to_string()))?;
        let _ = write_txn
            .open_multimap_table(LAYERS)
            .map_err(|e| StrataError::Io(e.to_string()))?;
        write_txn
            .commit()
            .map_err(|e| StrataError::Io(e.to_string()))?;

        Ok(Self { db })
    }

    /// Compact the database file.
    pub fn compact(&mut self) -> Result<(), StrataError> {
        self.db
            .compact()
            .map_err(|e| StrataError::Io(e.to_string()))?;
        Ok(())
    }
}

impl LayerStore for RedbStore {
    fn fetch(&self, graph: &GraphName) -> Result<Graph, StoreError> {
        let read_txn = self.db.begin_read().map_err(backend)?;
        let table = read_txn.open_multimap_table(LAYERS).map_err(backend)?;
        let mut out = Graph::new();
        for value in table.get(graph.key().as_str()).map_err(backend)? {
            let value = value.map_err(backend)?;
            out.insert(decode(value.value())?);
        }
        Ok(out)
    }

    fn insert(&self, graph: &GraphName, triples: &Graph) -> Result<usize, StoreError> {
        let key = graph.key();
        let write_txn = self.db.begin_write().map_err(backend)?;
        let mut added = 0usize;
        {
            let mut table = write_txn.open_multimap_table(LAYERS).map_err(backend)?;
            for triple in triples.iter() {
                let bytes = encode(&triple)?;
                let existed = table
                    .insert(key.as_str(), bytes.as_slice())
                    .map_err(backend)?;
                if !existed {
                    added = added.saturating_add(1);
                }
            }
        }
        write_txn.commit().map_err(backend)?;
        Ok(added)
    }

    fn delete(&self, graph: &GraphName, triples: &Graph) -> Result<usize, StoreError> {
        let key = graph.key();
        let write_txn = self.db.begin_write().map_err(backend)?;
        let mut removed = 0usize;
        {
            let mut table = write_txn.open_multimap_table(LAYERS).map_err(backend)?;
            for triple in triples.iter() {
                let bytes = encode(&triple)?;
                if table
                    .remove(key.as_str(), bytes.as_slice())
                    .map_err(backend)?
                {
                    removed = removed.saturating_add(1);
                }
            }
        }
        write_txn.commit().map_err(backend)?;
        Ok(removed)
    }

    fn clear(&self, graph: &GraphName) -> Result<(), StoreError> {
        let write_txn = self.db.begin_write().map_err(backend)?;
        {
            let mut table = write_txn.open_multimap_table(LAYERS).map_err(backend)?;
            let _ = table.remove_all(graph.key().as_str()).map_err(backend)?;
        }
        write_txn.commit().map_err(backend)
    }

    fn replace(&self, graph: &GraphName, content: &Graph) -> Result<(), StoreError> {
        let key = graph.key();
        let write_txn = self.db.begin_write().map_err(backend)?;
        {
            let mut table = write_txn.open_multimap_table(LAYERS).map_err(backend)?;
            let _ = table.remove_all(key.as_str()).map_err(backend)?;
            for triple in content.iter() {
                let bytes = encode(&triple)?;
                table
                    .insert(key.as_str(), bytes.as_slice())
                    .map_err(backend)?;
            }
        }
        write_txn.commit().map_err(backend)
    }

    fn graph_names(&self) -> Result<Vec<GraphName>, StoreError> {
        let read_txn = self.db.begin_read().map_err(backend)?;
        let table = read_txn.open_multimap_table(LAYERS).map_err(backend)?;
        let mut names = Vec::new();
        for entry in table.iter().map_err(backend)? {
            let (key, _values) = entry.map_err(backend)?;
            let name = GraphName::from_key(key.value())
                .ok_or_else(|| StoreError::Corrupt(format!("unknown layer key '{}'", key.value())))?;
            names.push(name);
        }
        names.sort();
        Ok(names)
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Iri, SessionId};
    use tempfile::tempdir;

    fn one(name: &str) -> Graph {
        [Triple::typed(Iri::tourism(name), Iri::tourism("City"))]
            .into_iter()
            .collect()
    }

    #[test]
    fn insert_fetch_delete() {
        let temp = tempdir().expect("temp dir");
        let store = RedbStore::open(temp.path().join("layers.redb")).expect("open db");

        let both = one("Dubai").union(&one("Paris"));
        assert_eq!(store.insert(&GraphName::Main, &both).expect("insert"), 2);
        assert_eq!(store.insert(&GraphName::Main, &both).expect("insert"), 0);
        assert_eq!(store.fetch(&GraphName::Main).expect("fetch"), both);

        assert_eq!(store.delete(&GraphName::Main, &one("Dubai")).expect("delete"), 1);
        assert_eq!(store.fetch(&GraphName::Main).expect("fetch"), one("Paris"));
    }

    #[test]
    fn replace_and_clear() {
        let temp = tempdir().expect("temp dir");
        let store = RedbStore::open(temp.path().join("layers.redb")).expect("open db");
        let consensus = GraphName::Consensus(SessionId::new("s1").expect("sid"));

        store.insert(&consensus, &one("Dubai")).expect("insert");
        store.replace(&consensus, &one("Paris")).expect("replace");
        assert_eq!(store.fetch(&consensus).expect("fetch"), one("Paris"));

        store.clear(&consensus).expect("clear");
        assert!(store.fetch(&consensus).expect("fetch").is_empty());
        assert!(store.graph_names().expect("names").is_empty());
    }

    #[test]
    fn persistence() {
        let temp = tempdir().expect("temp dir");
        let db_path = temp.path().join("layers.redb");
        {
            let store = RedbStore::open(&db_path).expect("open db");
            store.insert(&GraphName::Main, &one("Dubai")).expect("insert");
        }
        let store = RedbStore::open(&db_path).expect("reopen db");
        assert_eq!(store.fetch(&GraphName::Main).expect("fetch"), one("Dubai"));
        assert_eq!(store.graph_names().expect("names"), vec![GraphName::Main]);
    }
}
