//! Collaborator interfaces to the externally-owned stores.
//!
//! The engine consumes two stores read-only: a similarity index over a fixed
//! embedding space and a typed legal knowledge graph. Both are long-lived and
//! populated elsewhere; this module defines the trait boundary plus two
//! adapters — SQLite-backed ([`sqlite::SqliteStore`]) and in-memory
//! ([`memory::MemoryStore`]).

pub mod memory;
pub mod sqlite;

use crate::model::node::{EdgeKind, LegalEdge, LegalNode, NodeId};

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// One nearest-neighbor hit, similarity normalized to `[0, 1]`.
#[derive(Debug, Clone, PartialEq)]
pub struct SimilarityHit {
    pub id: NodeId,
    pub score: f32,
}

/// Nearest-neighbor search over the embedding space.
pub trait SimilarityIndex: Send + Sync {
    /// Return up to `k` hits ordered by descending similarity; ties break on
    /// ascending node id so results are reproducible.
    fn search(&self, embedding: &[f32], k: usize) -> Result<Vec<SimilarityHit>, StoreError>;
}

/// Read access to the typed legal knowledge graph.
pub trait GraphStore: Send + Sync {
    fn get_node(&self, id: &NodeId) -> Result<Option<LegalNode>, StoreError>;

    /// Edges incident to `id` in either direction whose kind is in `kinds`,
    /// paired with the node at the other endpoint, ordered by (neighbor id,
    /// edge kind). Which kinds to ask for at which traversal depth is the
    /// expander's policy; the store only filters.
    fn neighbors(
        &self,
        id: &NodeId,
        kinds: &[EdgeKind],
    ) -> Result<Vec<(LegalEdge, LegalNode)>, StoreError>;

    /// Resolve a literal legal identifier (exact node id or exact citation)
    /// to its nodes, ordered by id. Unknown identifiers resolve to nothing.
    fn lookup_identifier(&self, ident: &str) -> Result<Vec<LegalNode>, StoreError>;
}

/// Store-level failure. Timeouts count as unavailability.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("{store} unavailable: {reason}")]
    Unavailable { store: &'static str, reason: String },

    #[error("{store} returned corrupt data: {detail}")]
    Corrupt { store: &'static str, detail: String },
}

impl StoreError {
    /// Whether a single retry with backoff is worthwhile.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable { .. })
    }
}

/// Cosine similarity mapped from `[-1, 1]` to `[0, 1]`.
///
/// Returns `None` for dimension mismatches and zero-norm vectors, which the
/// adapters treat as "row not comparable" and skip.
#[must_use]
pub fn normalized_cosine(left: &[f32], right: &[f32]) -> Option<f32> {
    if left.len() != right.len() || left.is_empty() {
        return None;
    }

    let mut dot = 0.0_f32;
    let mut left_norm_sq = 0.0_f32;
    let mut right_norm_sq = 0.0_f32;

    for (a, b) in left.iter().zip(right.iter()) {
        dot += a * b;
        left_norm_sq += a * a;
        right_norm_sq += b * b;
    }

    let denom = left_norm_sq.sqrt() * right_norm_sq.sqrt();
    if denom <= f32::EPSILON {
        return None;
    }

    let cosine = (dot / denom).clamp(-1.0, 1.0);
    Some(((cosine + 1.0) * 0.5).clamp(0.0, 1.0))
}

/// Sort hits by descending score, then ascending id, and truncate to `k`.
pub(crate) fn finalize_hits(mut hits: Vec<SimilarityHit>, k: usize) -> Vec<SimilarityHit> {
    hits.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.id.cmp(&b.id))
    });
    hits.truncate(k);
    hits
}
