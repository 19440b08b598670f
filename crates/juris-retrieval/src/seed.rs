//! Seed selection: nearest-neighbor hits plus literal identifier matches.
//!
//! The two lookups have no data dependency on each other and are run
//! concurrently by the engine; this module provides each half and the join.
//! Exact identifier matches enter with similarity pinned to 1.0 so they
//! dominate approximate hits.

use std::collections::BTreeMap;

use tracing::debug;

use juris_core::{Candidate, GraphStore, NodeId, SimilarityIndex, StoreError};

/// A zero, empty, or non-finite embedding cannot be searched.
#[must_use]
pub fn is_degenerate(embedding: &[f32]) -> bool {
    if embedding.is_empty() || embedding.iter().any(|v| !v.is_finite()) {
        return true;
    }
    let norm_sq: f32 = embedding.iter().map(|v| v * v).sum();
    norm_sq.sqrt() <= f32::EPSILON
}

/// K-nearest-neighbor seeds, hydrated from the graph store.
///
/// Index hits missing from the graph (index/graph generation drift) are
/// logged and skipped rather than surfaced as phantom candidates.
pub fn similarity_seeds(
    index: &dyn SimilarityIndex,
    graph: &dyn GraphStore,
    embedding: &[f32],
    k: usize,
) -> Result<BTreeMap<NodeId, Candidate>, StoreError> {
    let hits = index.search(embedding, k)?;
    let mut seeds = BTreeMap::new();
    for hit in hits {
        match graph.get_node(&hit.id)? {
            Some(node) => {
                seeds.insert(node.id.clone(), Candidate::seed(node, hit.score));
            }
            None => debug!(id = %hit.id, "index hit absent from graph store, skipping"),
        }
    }
    Ok(seeds)
}

/// Direct lookups of explicitly-mentioned legal identifiers.
///
/// Unknown identifiers resolve to nothing; that is not an error — the query
/// may simply mention an instrument outside the corpus.
pub fn identifier_seeds(
    graph: &dyn GraphStore,
    identifiers: &[String],
) -> Result<BTreeMap<NodeId, Candidate>, StoreError> {
    let mut seeds = BTreeMap::new();
    for ident in identifiers {
        let nodes = graph.lookup_identifier(ident)?;
        if nodes.is_empty() {
            debug!(identifier = %ident, "identifier did not resolve, skipping");
        }
        for node in nodes {
            if !seeds.contains_key(&node.id) {
                seeds.insert(node.id.clone(), Candidate::seed(node, 1.0));
            }
        }
    }
    Ok(seeds)
}

/// Union of the two seed halves, keyed by node id.
///
/// A node present in both keeps its maximum similarity — an exact identifier
/// match (1.0) dominates whatever the index scored it.
#[must_use]
pub fn merge_seeds(
    mut base: BTreeMap<NodeId, Candidate>,
    other: BTreeMap<NodeId, Candidate>,
) -> BTreeMap<NodeId, Candidate> {
    for (id, candidate) in other {
        match base.get_mut(&id) {
            Some(existing) => {
                existing.similarity = existing.similarity.max(candidate.similarity);
            }
            None => {
                base.insert(id, candidate);
            }
        }
    }
    base
}
