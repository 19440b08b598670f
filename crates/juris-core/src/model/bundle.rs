//! The output contract handed to the answer generator.

use serde::{Deserialize, Serialize};

use crate::model::candidate::Provenance;
use crate::model::node::{Jurisdiction, NodeId};

/// One grounded evidence segment in the final bundle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroundedSegment {
    pub node_id: NodeId,
    pub text: String,
    pub citation: String,
    pub jurisdiction: Jurisdiction,
    pub hierarchy_rank: u32,
    pub provenance: Provenance,
    pub fused_score: f32,
}

/// Ordered, provenance-tagged evidence set for one query.
///
/// The segment count is bounded within `[min_results, max_results]` except
/// when mandatory candidates alone exceed `max_results`, in which case every
/// mandatory candidate is kept and nothing else. `degraded` is set whenever a
/// fallback path produced the bundle (index outage, under-minimum fill).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextBundle {
    pub segments: Vec<GroundedSegment>,
    pub degraded: bool,
}

impl ContextBundle {
    #[must_use]
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Render the evidence block for the answer generator's prompt.
    ///
    /// Each segment becomes a `[citation | provenance]` header followed by its
    /// text, separated by blank lines.
    #[must_use]
    pub fn render_context(&self) -> String {
        let mut out = String::new();
        for (idx, seg) in self.segments.iter().enumerate() {
            if idx > 0 {
                out.push_str("\n\n");
            }
            out.push('[');
            out.push_str(&seg.citation);
            out.push_str(" | ");
            out.push_str(&seg.provenance.to_string());
            out.push_str("]\n");
            out.push_str(&seg.text);
        }
        out
    }
}
