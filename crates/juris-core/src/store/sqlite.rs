//! SQLite adapter for the knowledge graph and similarity index.
//!
//! Nodes live in `legal_nodes` with their embedding serialized as a JSON
//! array; edges live in `legal_edges`. KNN is brute-force cosine in Rust over
//! the stored vectors, mapped from `[-1, 1]` to `[0, 1]` for consistency with
//! the rest of the fusion pipeline. The connection is mutex-guarded so the
//! similarity lookup and the literal-identifier lookup of one query can run
//! concurrently against the same handle.
//!
//! The engine never writes; `insert_node` / `insert_edge` exist for fixture
//! and population tooling.

use anyhow::{Context, Result, bail};
use rusqlite::{Connection, OptionalExtension as _, params};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tracing::debug;

use crate::model::node::{EdgeKind, LegalEdge, LegalNode, NodeId};
use crate::store::{
    GraphStore, SimilarityHit, SimilarityIndex, StoreError, finalize_hits, normalized_cosine,
};

const STORE: &str = "sqlite knowledge store";

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS legal_nodes (
    id             TEXT PRIMARY KEY,
    kind           TEXT NOT NULL,
    jurisdiction   TEXT NOT NULL,
    hierarchy_rank INTEGER NOT NULL,
    text           TEXT NOT NULL,
    citation       TEXT NOT NULL,
    embedding_json TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS legal_edges (
    source TEXT NOT NULL REFERENCES legal_nodes(id),
    target TEXT NOT NULL REFERENCES legal_nodes(id),
    kind   TEXT NOT NULL,
    PRIMARY KEY (source, target, kind)
);
CREATE INDEX IF NOT EXISTS idx_legal_edges_target ON legal_edges(target);
CREATE INDEX IF NOT EXISTS idx_legal_nodes_citation ON legal_nodes(citation);
";

/// Mutex-guarded SQLite store implementing both collaborator traits.
#[derive(Debug)]
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) a store at `path`, applying the busy timeout from
    /// config so lock waits surface as unavailability rather than hanging.
    pub fn open(path: &Path, busy_timeout: Duration) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("failed to open store at {}", path.display()))?;
        conn.busy_timeout(busy_timeout)
            .context("failed to set busy timeout")?;
        conn.execute_batch(SCHEMA)
            .context("failed to ensure store schema")?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// In-memory store, used by tests and ephemeral fixtures.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("failed to open in-memory store")?;
        conn.execute_batch(SCHEMA)
            .context("failed to ensure store schema")?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        match self.conn.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Insert a node, rejecting duplicates and invariant violations.
    pub fn insert_node(&self, node: &LegalNode) -> Result<()> {
        node.validate()?;
        let embedding_json =
            serde_json::to_string(&node.embedding).context("failed to encode embedding")?;
        let inserted = self.conn().execute(
            "INSERT OR IGNORE INTO legal_nodes
             (id, kind, jurisdiction, hierarchy_rank, text, citation, embedding_json)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                node.id.as_str(),
                node.kind.to_string(),
                node.jurisdiction.to_string(),
                node.hierarchy_rank,
                node.text,
                node.citation,
                embedding_json,
            ],
        )?;
        if inserted == 0 {
            bail!("duplicate node id {}", node.id);
        }
        Ok(())
    }

    /// Insert a directed edge between existing nodes.
    ///
    /// SUPERSEDES edges must run from the lower-rank (dominant) node to the
    /// higher-rank node.
    pub fn insert_edge(&self, source: &NodeId, target: &NodeId, kind: EdgeKind) -> Result<()> {
        let conn = self.conn();
        let rank_of = |id: &NodeId| -> Result<u32> {
            conn.query_row(
                "SELECT hierarchy_rank FROM legal_nodes WHERE id = ?1",
                params![id.as_str()],
                |row| row.get::<_, u32>(0),
            )
            .optional()?
            .with_context(|| format!("edge endpoint {id} does not exist"))
        };

        let source_rank = rank_of(source)?;
        let target_rank = rank_of(target)?;
        if kind == EdgeKind::Supersedes && source_rank >= target_rank {
            bail!(
                "supersedes edge {source} -> {target} must run from lower rank \
                 to higher rank (got {source_rank} -> {target_rank})"
            );
        }

        conn.execute(
            "INSERT OR REPLACE INTO legal_edges (source, target, kind) VALUES (?1, ?2, ?3)",
            params![source.as_str(), target.as_str(), kind.to_string()],
        )?;
        Ok(())
    }
}

fn unavailable(err: &rusqlite::Error) -> StoreError {
    StoreError::Unavailable {
        store: STORE,
        reason: err.to_string(),
    }
}

fn corrupt(detail: impl Into<String>) -> StoreError {
    StoreError::Corrupt {
        store: STORE,
        detail: detail.into(),
    }
}

/// Raw column values of one `legal_nodes` row.
type NodeRow = (String, String, String, u32, String, String, String);

fn node_row(row: &rusqlite::Row<'_>, offset: usize) -> rusqlite::Result<NodeRow> {
    Ok((
        row.get(offset)?,
        row.get(offset + 1)?,
        row.get(offset + 2)?,
        row.get(offset + 3)?,
        row.get(offset + 4)?,
        row.get(offset + 5)?,
        row.get(offset + 6)?,
    ))
}

fn node_from_row(raw: NodeRow) -> Result<LegalNode, StoreError> {
    let (id, kind, jurisdiction, hierarchy_rank, text, citation, embedding_json) = raw;
    let kind = kind
        .parse()
        .map_err(|e| corrupt(format!("node {id}: {e}")))?;
    let jurisdiction = jurisdiction
        .parse()
        .map_err(|e| corrupt(format!("node {id}: {e}")))?;
    let embedding: Vec<f32> = serde_json::from_str(&embedding_json)
        .map_err(|e| corrupt(format!("node {id}: malformed embedding: {e}")))?;
    Ok(LegalNode {
        id: NodeId::new(id),
        kind,
        jurisdiction,
        hierarchy_rank,
        text,
        embedding,
        citation,
    })
}

const NODE_COLUMNS: &str =
    "id, kind, jurisdiction, hierarchy_rank, text, citation, embedding_json";

impl GraphStore for SqliteStore {
    fn get_node(&self, id: &NodeId) -> Result<Option<LegalNode>, StoreError> {
        let conn = self.conn();
        let raw = conn
            .query_row(
                &format!("SELECT {NODE_COLUMNS} FROM legal_nodes WHERE id = ?1"),
                params![id.as_str()],
                |row| node_row(row, 0),
            )
            .optional()
            .map_err(|e| unavailable(&e))?;
        raw.map(node_from_row).transpose()
    }

    fn neighbors(
        &self,
        id: &NodeId,
        kinds: &[EdgeKind],
    ) -> Result<Vec<(LegalEdge, LegalNode)>, StoreError> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare(
                "SELECT e.kind, e.source, e.target,
                        n.id, n.kind, n.jurisdiction, n.hierarchy_rank,
                        n.text, n.citation, n.embedding_json
                 FROM legal_edges e
                 JOIN legal_nodes n
                   ON n.id = CASE WHEN e.source = ?1 THEN e.target ELSE e.source END
                 WHERE e.source = ?1 OR e.target = ?1
                 ORDER BY n.id, e.kind",
            )
            .map_err(|e| unavailable(&e))?;

        let rows = stmt
            .query_map(params![id.as_str()], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    node_row(row, 3)?,
                ))
            })
            .map_err(|e| unavailable(&e))?;

        let mut out = Vec::new();
        for row in rows {
            let (edge_kind, source, target, raw) = row.map_err(|e| unavailable(&e))?;
            let kind: EdgeKind = edge_kind
                .parse()
                .map_err(|e| corrupt(format!("edge {source} -> {target}: {e}")))?;
            if !kinds.contains(&kind) {
                continue;
            }
            let node = node_from_row(raw)?;
            out.push((
                LegalEdge {
                    kind,
                    source: NodeId::new(source),
                    target: NodeId::new(target),
                },
                node,
            ));
        }
        Ok(out)
    }

    fn lookup_identifier(&self, ident: &str) -> Result<Vec<LegalNode>, StoreError> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {NODE_COLUMNS} FROM legal_nodes
                 WHERE id = ?1 OR citation = ?1
                 ORDER BY id"
            ))
            .map_err(|e| unavailable(&e))?;

        let rows = stmt
            .query_map(params![ident], |row| node_row(row, 0))
            .map_err(|e| unavailable(&e))?;

        let mut out = Vec::new();
        for row in rows {
            out.push(node_from_row(row.map_err(|e| unavailable(&e))?)?);
        }
        Ok(out)
    }
}

impl SimilarityIndex for SqliteStore {
    fn search(&self, embedding: &[f32], k: usize) -> Result<Vec<SimilarityHit>, StoreError> {
        if k == 0 {
            return Ok(Vec::new());
        }

        let conn = self.conn();
        let mut stmt = conn
            .prepare("SELECT id, embedding_json FROM legal_nodes")
            .map_err(|e| unavailable(&e))?;
        let rows = stmt
            .query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })
            .map_err(|e| unavailable(&e))?;

        let mut hits = Vec::new();
        for row in rows {
            let (id, embedding_json) = row.map_err(|e| unavailable(&e))?;
            let stored: Vec<f32> = match serde_json::from_str(&embedding_json) {
                Ok(value) => value,
                Err(err) => {
                    debug!("skipping malformed embedding row for {id}: {err}");
                    continue;
                }
            };
            let Some(score) = normalized_cosine(embedding, &stored) else {
                debug!("skipping incomparable embedding row for {id}");
                continue;
            };
            hits.push(SimilarityHit {
                id: NodeId::new(id),
                score,
            });
        }

        Ok(finalize_hits(hits, k))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::node::{Jurisdiction, NodeKind};

    fn node(id: &str, rank: u32, embedding: Vec<f32>) -> LegalNode {
        LegalNode {
            id: NodeId::from(id),
            kind: NodeKind::Article,
            jurisdiction: if rank == 0 {
                Jurisdiction::Eu
            } else {
                Jurisdiction::National
            },
            hierarchy_rank: rank,
            text: format!("text of {id}"),
            embedding,
            citation: format!("Cite {id}"),
        }
    }

    fn populated() -> SqliteStore {
        let store = SqliteStore::open_in_memory().expect("open store");
        store
            .insert_node(&node("dublin3-art-3", 0, vec![1.0, 0.0]))
            .expect("insert");
        store
            .insert_node(&node("dublin3-art-8", 0, vec![0.0, 1.0]))
            .expect("insert");
        store
            .insert_node(&node("asylg-s24", 1, vec![0.7, 0.7]))
            .expect("insert");
        store
            .insert_edge(
                &NodeId::from("dublin3-art-3"),
                &NodeId::from("dublin3-art-8"),
                EdgeKind::References,
            )
            .expect("edge");
        store
    }

    #[test]
    fn round_trips_a_node() {
        let store = populated();
        let fetched = store
            .get_node(&NodeId::from("dublin3-art-3"))
            .expect("get_node succeeds")
            .expect("node exists");
        assert_eq!(fetched.id.as_str(), "dublin3-art-3");
        assert_eq!(fetched.kind, NodeKind::Article);
        assert_eq!(fetched.jurisdiction, Jurisdiction::Eu);
        assert_eq!(fetched.embedding, vec![1.0, 0.0]);
    }

    #[test]
    fn missing_node_is_none() {
        let store = populated();
        assert!(
            store
                .get_node(&NodeId::from("ghost"))
                .expect("get_node succeeds")
                .is_none()
        );
    }

    #[test]
    fn duplicate_insert_is_rejected() {
        let store = populated();
        assert!(
            store
                .insert_node(&node("dublin3-art-3", 0, vec![1.0, 0.0]))
                .is_err()
        );
    }

    #[test]
    fn edge_endpoints_must_exist() {
        let store = populated();
        assert!(
            store
                .insert_edge(
                    &NodeId::from("dublin3-art-3"),
                    &NodeId::from("ghost"),
                    EdgeKind::Defines
                )
                .is_err()
        );
    }

    #[test]
    fn supersedes_direction_is_enforced() {
        let store = populated();
        assert!(
            store
                .insert_edge(
                    &NodeId::from("asylg-s24"),
                    &NodeId::from("dublin3-art-3"),
                    EdgeKind::Supersedes
                )
                .is_err()
        );
        assert!(
            store
                .insert_edge(
                    &NodeId::from("dublin3-art-3"),
                    &NodeId::from("asylg-s24"),
                    EdgeKind::Supersedes
                )
                .is_ok()
        );
    }

    #[test]
    fn neighbors_include_incoming_edges() {
        let store = populated();
        let neighbors = store
            .neighbors(&NodeId::from("dublin3-art-8"), &EdgeKind::ALL)
            .expect("neighbors");
        assert_eq!(neighbors.len(), 1);
        assert_eq!(neighbors[0].0.kind, EdgeKind::References);
        assert_eq!(neighbors[0].1.id.as_str(), "dublin3-art-3");

        let filtered = store
            .neighbors(&NodeId::from("dublin3-art-8"), &[EdgeKind::Defines])
            .expect("neighbors");
        assert!(filtered.is_empty());
    }

    #[test]
    fn lookup_identifier_matches_id_and_citation() {
        let store = populated();
        assert_eq!(
            store
                .lookup_identifier("dublin3-art-8")
                .expect("lookup succeeds")
                .len(),
            1
        );
        assert_eq!(
            store
                .lookup_identifier("Cite asylg-s24")
                .expect("lookup succeeds")
                .len(),
            1
        );
        assert!(
            store
                .lookup_identifier("Article 99")
                .expect("lookup succeeds")
                .is_empty()
        );
    }

    #[test]
    fn search_returns_ranked_results() {
        let store = populated();
        let hits = store.search(&[1.0, 0.0], 10).expect("search");
        assert_eq!(hits.len(), 3);
        assert_eq!(hits[0].id.as_str(), "dublin3-art-3");
        assert!(hits[0].score >= hits[1].score);
    }

    #[test]
    fn search_skips_malformed_embedding_rows() {
        let store = populated();
        store
            .conn()
            .execute(
                "INSERT INTO legal_nodes
                 (id, kind, jurisdiction, hierarchy_rank, text, citation, embedding_json)
                 VALUES ('broken', 'article', 'eu', 0, 't', 'c', 'not-json')",
                [],
            )
            .expect("raw insert");

        let hits = store.search(&[1.0, 0.0], 10).expect("search");
        assert!(hits.iter().all(|h| h.id.as_str() != "broken"));
    }

    #[test]
    fn corrupt_enum_surfaces_as_corrupt_error() {
        let store = populated();
        store
            .conn()
            .execute(
                "UPDATE legal_nodes SET kind = 'statute' WHERE id = 'asylg-s24'",
                [],
            )
            .expect("raw update");

        let err = store
            .get_node(&NodeId::from("asylg-s24"))
            .expect_err("corrupt row must error");
        assert!(!err.is_transient());
    }
}
