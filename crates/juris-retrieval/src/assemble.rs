//! Final packaging of ranked candidates into the output contract.
//!
//! Pure transformation: attaches each node's citation and provenance tag and
//! sets the degraded flag. No store calls, no side effects.

use juris_core::{Candidate, ContextBundle, GroundedSegment, LegalNode};

/// Map the ranked candidate sequence into the bundle handed to the answer
/// generator.
#[must_use]
pub fn assemble(ranked: Vec<Candidate>, degraded: bool) -> ContextBundle {
    let segments = ranked
        .into_iter()
        .map(|candidate| {
            let Candidate {
                node,
                provenance,
                fused_score,
                ..
            } = candidate;
            let LegalNode {
                id,
                jurisdiction,
                hierarchy_rank,
                text,
                citation,
                ..
            } = node;
            GroundedSegment {
                node_id: id,
                text,
                citation,
                jurisdiction,
                hierarchy_rank,
                provenance,
                fused_score,
            }
        })
        .collect();

    ContextBundle { segments, degraded }
}
