//! Bounded breadth-first expansion from the seed set.
//!
//! # Overview
//!
//! Expansion surfaces nodes that are semantically connected but not
//! seed-similar — a Definition referenced by an Exception that is itself
//! close to the query. Traversal runs breadth-first from all seeds
//! simultaneously, bounded by a hard depth limit and a per-level frontier
//! cap. Legal graphs are cyclic (Article ↔ Exception ↔ Condition), so the
//! visited set is keyed by node id and never assumes acyclicity.
//!
//! # Edge policy
//!
//! - DEFINES, EXCEPTS, CONDITIONS_ON, PROTECTS: always traversable.
//! - REFERENCES: traversable only from the seeds themselves (discovered
//!   nodes land at depth 1) — deeper cross-reference chains drift off topic.
//! - SUPERSEDES: traversed and recorded for the ranker's hierarchy
//!   tie-break, but it grants no graph-distance score; precedence is not
//!   relevance.
//!
//! Edges are followed in either direction: an edge into a frontier node
//! connects it to the graph just as much as an edge out of it.

use std::collections::{BTreeMap, BTreeSet, btree_map::Entry};

use tracing::debug;

use juris_core::{
    Candidate, EdgeKind, GraphStore, LegalNode, NodeId, RetrievalConfig, StoreError,
};

/// Result of expansion: the enlarged candidate set plus every SUPERSEDES
/// pair observed along the way (source supersedes target).
#[derive(Debug, Default)]
pub struct Expansion {
    pub candidates: BTreeMap<NodeId, Candidate>,
    pub supersedes: BTreeSet<(NodeId, NodeId)>,
}

/// Edge kinds the expander asks the store for when discovering nodes at
/// `depth`. REFERENCES drops out after the first hop.
const fn traversable_kinds(depth: usize) -> &'static [EdgeKind] {
    const FIRST_HOP: [EdgeKind; 6] = [
        EdgeKind::Defines,
        EdgeKind::Excepts,
        EdgeKind::ConditionsOn,
        EdgeKind::Supersedes,
        EdgeKind::Protects,
        EdgeKind::References,
    ];
    const DEEPER: [EdgeKind; 5] = [
        EdgeKind::Defines,
        EdgeKind::Excepts,
        EdgeKind::ConditionsOn,
        EdgeKind::Supersedes,
        EdgeKind::Protects,
    ];
    if depth == 1 { &FIRST_HOP } else { &DEEPER }
}

/// Expand outward from `seeds` up to `config.max_depth` levels.
///
/// Score semantics:
/// - a node first reached at depth `d` scores `config.decay(d)`;
/// - multiple paths keep the best (minimum-depth) score;
/// - seeds re-reached by expansion keep their similarity axis and gain the
///   graph axis — the axes are independent and never overwritten.
pub fn expand(
    graph: &dyn GraphStore,
    seeds: BTreeMap<NodeId, Candidate>,
    config: &RetrievalConfig,
) -> Result<Expansion, StoreError> {
    let mut candidates = seeds;
    let mut supersedes = BTreeSet::new();
    let mut frontier: Vec<NodeId> = candidates.keys().cloned().collect();

    for depth in 1..=config.max_depth {
        // id -> (best score this level, discoverer, node)
        let mut discovered: BTreeMap<NodeId, (f32, NodeId, LegalNode)> = BTreeMap::new();

        for id in &frontier {
            for (edge, node) in graph.neighbors(id, traversable_kinds(depth))? {
                if edge.kind == EdgeKind::Supersedes {
                    supersedes.insert((edge.source.clone(), edge.target.clone()));
                }

                let score = if edge.kind == EdgeKind::Supersedes {
                    0.0
                } else {
                    config.decay(depth)
                };

                if let Some(existing) = candidates.get_mut(&node.id) {
                    // Already a seed or discovered at a shallower level; the
                    // graph axis keeps its best value.
                    if score > existing.graph_distance {
                        existing.graph_distance = score;
                    }
                    continue;
                }

                match discovered.entry(node.id.clone()) {
                    Entry::Occupied(mut entry) => {
                        let (best, from, _) = entry.get_mut();
                        if score > *best {
                            *best = score;
                            *from = id.clone();
                        } else if (score - *best).abs() <= f32::EPSILON && *id < *from {
                            // Same score via several parents: keep the
                            // lexically smallest discoverer for determinism.
                            *from = id.clone();
                        }
                    }
                    Entry::Vacant(entry) => {
                        entry.insert((score, id.clone(), node));
                    }
                }
            }
        }

        let mut level: Vec<(NodeId, (f32, NodeId, LegalNode))> = discovered.into_iter().collect();
        level.sort_by(|(id_a, (score_a, ..)), (id_b, (score_b, ..))| {
            score_b
                .partial_cmp(score_a)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| id_a.cmp(id_b))
        });
        if level.len() > config.max_frontier {
            debug!(
                depth,
                discovered = level.len(),
                cap = config.max_frontier,
                "frontier cap hit, truncating level"
            );
            level.truncate(config.max_frontier);
        }

        frontier = Vec::with_capacity(level.len());
        for (id, (score, from, node)) in level {
            candidates.insert(id.clone(), Candidate::expanded(node, score, from, depth));
            frontier.push(id);
        }
        if frontier.is_empty() {
            break;
        }
    }

    Ok(Expansion {
        candidates,
        supersedes,
    })
}
