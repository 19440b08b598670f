//! Data model for the legal knowledge graph and per-query records.

pub mod bundle;
pub mod candidate;
pub mod node;

pub use bundle::{ContextBundle, GroundedSegment};
pub use candidate::{Candidate, Provenance};
pub use node::{EdgeKind, Jurisdiction, LegalEdge, LegalNode, NodeId, NodeKind};
