//! # Formats
//!
//! Textual (Turtle subset) and binary (snapshot) encodings.

pub mod snapshot;
pub mod turtle;

pub use snapshot::{Snapshot, SnapshotHeader, snapshot_from_bytes, snapshot_to_bytes};
pub use turtle::{ParseError, Prefixes, parse_document, parse_graph, to_turtle};
