//! # Snapshot Format
//!
//! Binary dump of every stored layer, used by `export` / `import`.
//!
//! Format: Header (37 bytes) + postcard-serialized layers.
//! - 4 bytes: Magic ("STRA")
//! - 1 byte: Version
//! - 32 bytes: BLAKE3 digest of the payload
//!
//! File I/O is in the app layer; this module is a pure transformation.
//!
//! ## Limits
//!
//! Size and header are validated before the payload is deserialized, and
//! the digest is verified before any graph is rebuilt.

use crate::graph::SerializableGraph;
use crate::{Graph, GraphName, StrataError, primitives};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// =============================================================================
// LIMITS
// =============================================================================

/// Maximum accepted snapshot size (500 MB).
pub const MAX_SNAPSHOT_SIZE: usize = 500 * 1024 * 1024;

const HEADER_LEN: usize = 4 + 1 + 32;

// =============================================================================
// HEADER
// =============================================================================

/// The snapshot header precedes the layer payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SnapshotHeader {
    pub magic: [u8; 4],
    pub version: u8,
    pub checksum: [u8; 32],
}

impl SnapshotHeader {
    /// Header for `payload` at the current format version.
    #[must_use]
    pub fn for_payload(payload: &[u8]) -> Self {
        Self {
            magic: *primitives::MAGIC_BYTES,
            version: primitives::FORMAT_VERSION,
            checksum: *blake3::hash(payload).as_bytes(),
        }
    }

    pub fn validate(&self) -> Result<(), StrataError> {
        if &self.magic != primitives::MAGIC_BYTES {
            return Err(StrataError::Serialization(
                "Invalid magic bytes".to_string(),
            ));
        }
        if self.version != primitives::FORMAT_VERSION {
            return Err(StrataError::Serialization(format!(
                "Unsupported version: {} (expected {})",
                self.version,
                primitives::FORMAT_VERSION
            )));
        }
        Ok(())
    }

    #[must_use]
    pub fn to_bytes(&self) -> [u8; HEADER_LEN] {
        let mut bytes = [0u8; HEADER_LEN];
        bytes[0..4].copy_from_slice(&self.magic);
        bytes[4] = self.version;
        bytes[5..].copy_from_slice(&self.checksum);
        bytes
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, StrataError> {
        if bytes.len() < HEADER_LEN {
            return Err(StrataError::Serialization(format!(
                "Data too short: minimum {HEADER_LEN} bytes required"
            )));
        }
        let mut magic = [0u8; 4];
        magic.copy_from_slice(&bytes[0..4]);
        let mut checksum = [0u8; 32];
        checksum.copy_from_slice(&bytes[5..HEADER_LEN]);
        Ok(Self {
            magic,
            version: bytes[4],
            checksum,
        })
    }

    /// Hex form of the payload digest.
    #[must_use]
    pub fn checksum_hex(&self) -> String {
        blake3::Hash::from_bytes(self.checksum).to_hex().to_string()
    }
}

// =============================================================================
// SNAPSHOT
// =============================================================================

/// Content of every layer, keyed by `GraphName`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    pub layers: BTreeMap<GraphName, Graph>,
}

#[derive(Serialize, Deserialize)]
struct SerializableSnapshot {
    layers: Vec<(String, SerializableGraph)>,
}

impl Snapshot {
    /// Total number of triples across layers.
    #[must_use]
    pub fn triple_count(&self) -> usize {
        self.layers.values().map(Graph::len).sum()
    }
}

/// Serialize a snapshot (header + payload).
pub fn snapshot_to_bytes(snapshot: &Snapshot) -> Result<Vec<u8>, StrataError> {
    let serializable = SerializableSnapshot {
        layers: snapshot
            .layers
            .iter()
            .map(|(name, graph)| (name.key(), SerializableGraph::from(graph)))
            .collect(),
    };
    let payload = postcard::to_stdvec(&serializable)
        .map_err(|e| StrataError::Serialization(e.to_string()))?;

    let header = SnapshotHeader::for_payload(&payload);
    let mut result = Vec::with_capacity(HEADER_LEN + payload.len());
    result.extend_from_slice(&header.to_bytes());
    result.extend_from_slice(&payload);
    Ok(result)
}

/// Deserialize a snapshot, validating size, header and digest first.
pub fn snapshot_from_bytes(bytes: &[u8]) -> Result<Snapshot, StrataError> {
    if bytes.len() > MAX_SNAPSHOT_SIZE {
        return Err(StrataError::Serialization(format!(
            "Data size {} bytes exceeds maximum allowed {} bytes",
            bytes.len(),
            MAX_SNAPSHOT_SIZE
        )));
    }
    let header = SnapshotHeader::from_bytes(bytes)?;
    header.validate()?;

    let payload = &bytes[HEADER_LEN..];
    if blake3::hash(payload).as_bytes() != &header.checksum {
        return Err(StrataError::Serialization(
            "Checksum mismatch: snapshot is corrupted".to_string(),
        ));
    }

    let serializable: SerializableSnapshot = postcard::from_bytes(payload).map_err(|e| {
        StrataError::Serialization(format!("Failed to deserialize snapshot: {e}"))
    })?;

    let mut layers = BTreeMap::new();
    for (key, graph) in serializable.layers {
        let name = GraphName::from_key(&key).ok_or_else(|| {
            StrataError::Serialization(format!("Unknown graph layer '{key}'"))
        })?;
        layers.insert(name, Graph::from(graph));
    }
    Ok(Snapshot { layers })
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Iri, SessionId, Triple};

    fn sample() -> Snapshot {
        let mut main = Graph::new();
        main.insert(Triple::typed(Iri::tourism("Dubai"), Iri::tourism("City")));
        let mut consensus = Graph::new();
        consensus.insert(Triple::typed(Iri::tourism("Paris"), Iri::tourism("City")));
        let mut layers = BTreeMap::new();
        layers.insert(GraphName::Main, main);
        layers.insert(
            GraphName::Consensus(SessionId::new("s1").expect("sid")),
            consensus,
        );
        Snapshot { layers }
    }

    #[test]
    fn bytes_roundtrip_bit_exact() {
        let bytes1 = snapshot_to_bytes(&sample()).expect("serialize");
        let restored = snapshot_from_bytes(&bytes1).expect("deserialize");
        assert_eq!(restored, sample());
        let bytes2 = snapshot_to_bytes(&restored).expect("reserialize");
        assert_eq!(bytes1, bytes2, "save -> load -> save must produce identical bytes");
    }

    #[test]
    fn invalid_magic_rejected() {
        let mut bytes = snapshot_to_bytes(&sample()).expect("serialize");
        bytes[0..4].copy_from_slice(b"XXXX");
        assert!(snapshot_from_bytes(&bytes).is_err());
    }

    #[test]
    fn flipped_payload_byte_fails_checksum() {
        let mut bytes = snapshot_to_bytes(&sample()).expect("serialize");
        let last = bytes.len() - 1;
        bytes[last] ^= 0xFF;
        let err = snapshot_from_bytes(&bytes).expect_err("corrupt");
        assert!(err.to_string().contains("Checksum mismatch"));
    }

    #[test]
    fn short_input_rejected() {
        assert!(snapshot_from_bytes(b"STRA").is_err());
    }
}
