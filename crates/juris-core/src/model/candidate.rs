//! Transient per-query candidate records.
//!
//! A candidate accumulates up to three independent score axes — similarity,
//! graph distance, and boost — which stay separate until the fusion ranker
//! combines them. Mandatory inclusion is modeled as the `forced` flag on the
//! candidate itself, so truncation has a single uniform code path instead of
//! a special-cased branch for safety-critical content.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::model::node::{LegalNode, NodeId};

/// How a candidate entered the result set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Provenance {
    /// Matched directly by similarity search or a literal identifier.
    Seed,
    /// Discovered by graph expansion at the given depth.
    Expanded { from: NodeId, depth: usize },
    /// Force-inserted by a mandatory boost rule.
    BoostInjected { rule: String },
}

impl fmt::Display for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Seed => f.write_str("seed"),
            Self::Expanded { from, .. } => write!(f, "expanded-from-{from}"),
            Self::BoostInjected { .. } => f.write_str("boost-injected"),
        }
    }
}

/// A node under consideration for the output bundle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub node: LegalNode,
    /// Normalized similarity contribution in `[0, 1]`; `0.0` if not seed-matched.
    pub similarity: f32,
    /// Distance-decayed graph contribution; `0.0` if not reached by expansion.
    pub graph_distance: f32,
    /// Additive boost contribution from matched rules.
    pub boost: f32,
    /// Combined score, written by the fusion ranker.
    pub fused_score: f32,
    /// Mandatory-inclusion marker: forced candidates survive truncation.
    pub forced: bool,
    pub provenance: Provenance,
}

impl Candidate {
    /// A candidate entering via similarity search or literal identifier match.
    #[must_use]
    pub fn seed(node: LegalNode, similarity: f32) -> Self {
        Self {
            node,
            similarity: similarity.clamp(0.0, 1.0),
            graph_distance: 0.0,
            boost: 0.0,
            fused_score: 0.0,
            forced: false,
            provenance: Provenance::Seed,
        }
    }

    /// A candidate discovered by graph expansion.
    #[must_use]
    pub fn expanded(node: LegalNode, graph_distance: f32, from: NodeId, depth: usize) -> Self {
        Self {
            node,
            similarity: 0.0,
            graph_distance,
            boost: 0.0,
            fused_score: 0.0,
            forced: false,
            provenance: Provenance::Expanded { from, depth },
        }
    }

    /// A candidate force-inserted by a mandatory boost rule.
    #[must_use]
    pub fn injected(node: LegalNode, boost: f32, rule: impl Into<String>) -> Self {
        Self {
            node,
            similarity: 0.0,
            graph_distance: 0.0,
            boost,
            fused_score: 0.0,
            forced: true,
            provenance: Provenance::BoostInjected { rule: rule.into() },
        }
    }

    #[must_use]
    pub fn id(&self) -> &NodeId {
        &self.node.id
    }

    /// Weighted fusion of the three score axes.
    ///
    /// Boosts are additive on top of the weighted similarity/graph sum and may
    /// push the result past `1.0` — that is how mandatory-adjacent content
    /// outranks everything else.
    #[must_use]
    pub fn fuse(&self, w_sim: f32, w_graph: f32) -> f32 {
        w_sim * self.similarity + w_graph * self.graph_distance + self.boost
    }
}
