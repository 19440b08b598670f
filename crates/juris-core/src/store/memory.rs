//! In-memory store over a petgraph digraph.
//!
//! Backs unit and integration tests, and small embedded deployments where the
//! whole legal corpus fits in memory. Honors the same insert-time invariants
//! as the SQLite adapter: unique ids, non-empty citations, edges between
//! existing nodes, SUPERSEDES pointing from the dominant (lower-rank) node.

use anyhow::{Result, bail};
use petgraph::Direction;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef as _;
use std::collections::HashMap;

use crate::model::node::{EdgeKind, LegalEdge, LegalNode, NodeId};
use crate::store::{
    GraphStore, SimilarityHit, SimilarityIndex, StoreError, finalize_hits, normalized_cosine,
};

/// Petgraph-backed knowledge graph plus brute-force similarity index.
#[derive(Debug, Default)]
pub struct MemoryStore {
    graph: DiGraph<LegalNode, EdgeKind>,
    index: HashMap<NodeId, NodeIndex>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Insert a node, rejecting duplicates and invariant violations.
    pub fn insert_node(&mut self, node: LegalNode) -> Result<()> {
        node.validate()?;
        if self.index.contains_key(&node.id) {
            bail!("duplicate node id {}", node.id);
        }
        let id = node.id.clone();
        let idx = self.graph.add_node(node);
        self.index.insert(id, idx);
        Ok(())
    }

    /// Insert a directed edge between existing nodes.
    ///
    /// SUPERSEDES edges must run from the lower-rank (dominant) node to the
    /// higher-rank node.
    pub fn insert_edge(&mut self, source: &NodeId, target: &NodeId, kind: EdgeKind) -> Result<()> {
        let Some(&source_idx) = self.index.get(source) else {
            bail!("edge source {source} does not exist");
        };
        let Some(&target_idx) = self.index.get(target) else {
            bail!("edge target {target} does not exist");
        };
        if kind == EdgeKind::Supersedes {
            let source_rank = self.graph[source_idx].hierarchy_rank;
            let target_rank = self.graph[target_idx].hierarchy_rank;
            if source_rank >= target_rank {
                bail!(
                    "supersedes edge {source} -> {target} must run from lower rank \
                     to higher rank (got {source_rank} -> {target_rank})"
                );
            }
        }
        self.graph.add_edge(source_idx, target_idx, kind);
        Ok(())
    }
}

impl GraphStore for MemoryStore {
    fn get_node(&self, id: &NodeId) -> Result<Option<LegalNode>, StoreError> {
        Ok(self.index.get(id).map(|&idx| self.graph[idx].clone()))
    }

    fn neighbors(
        &self,
        id: &NodeId,
        kinds: &[EdgeKind],
    ) -> Result<Vec<(LegalEdge, LegalNode)>, StoreError> {
        let Some(&idx) = self.index.get(id) else {
            return Ok(Vec::new());
        };

        let mut out = Vec::new();
        for edge in self.graph.edges_directed(idx, Direction::Outgoing) {
            if !kinds.contains(edge.weight()) {
                continue;
            }
            let other = &self.graph[edge.target()];
            out.push((
                LegalEdge {
                    kind: *edge.weight(),
                    source: id.clone(),
                    target: other.id.clone(),
                },
                other.clone(),
            ));
        }
        for edge in self.graph.edges_directed(idx, Direction::Incoming) {
            if !kinds.contains(edge.weight()) {
                continue;
            }
            let other = &self.graph[edge.source()];
            out.push((
                LegalEdge {
                    kind: *edge.weight(),
                    source: other.id.clone(),
                    target: id.clone(),
                },
                other.clone(),
            ));
        }

        out.sort_by(|(edge_a, node_a), (edge_b, node_b)| {
            node_a
                .id
                .cmp(&node_b.id)
                .then_with(|| edge_a.kind.cmp(&edge_b.kind))
        });
        Ok(out)
    }

    fn lookup_identifier(&self, ident: &str) -> Result<Vec<LegalNode>, StoreError> {
        let mut out: Vec<LegalNode> = self
            .graph
            .node_weights()
            .filter(|node| node.id.as_str() == ident || node.citation == ident)
            .cloned()
            .collect();
        out.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(out)
    }
}

impl SimilarityIndex for MemoryStore {
    fn search(&self, embedding: &[f32], k: usize) -> Result<Vec<SimilarityHit>, StoreError> {
        if k == 0 {
            return Ok(Vec::new());
        }

        let mut hits = Vec::new();
        for node in self.graph.node_weights() {
            let Some(score) = normalized_cosine(embedding, &node.embedding) else {
                continue;
            };
            hits.push(SimilarityHit {
                id: node.id.clone(),
                score,
            });
        }
        Ok(finalize_hits(hits, k))
    }
}
