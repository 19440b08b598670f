#![forbid(unsafe_code)]
//! juris-core library.
//!
//! Data model, error codes, configuration, boost rules, and store adapters
//! for the hybrid legal knowledge retrieval engine.
//!
//! # Conventions
//!
//! - **Errors**: typed `thiserror` enums at module boundaries,
//!   `anyhow::Result` for loaders and fixture tooling.
//! - **Logging**: `tracing` macros (`info!`, `warn!`, `debug!`, `trace!`).

pub mod config;
pub mod error;
pub mod model;
pub mod rules;
pub mod store;

pub use config::{RetrievalConfig, load_retrieval_config};
pub use error::ErrorCode;
pub use model::{
    Candidate, ContextBundle, EdgeKind, GroundedSegment, Jurisdiction, LegalEdge, LegalNode,
    NodeId, NodeKind, Provenance,
};
pub use rules::{BoostRule, RuleError, RuleSet, RuleSetHandle, Trigger};
pub use store::{GraphStore, SimilarityHit, SimilarityIndex, StoreError};
