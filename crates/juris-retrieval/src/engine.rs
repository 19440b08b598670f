//! Query orchestration: concurrent seed lookups, retry/fallback policy,
//! expansion, ranking, and assembly.
//!
//! A query evaluation is a short-lived, read-only pipeline. The similarity
//! search and the literal-identifier lookup have no data dependency and run
//! concurrently; their results join before expansion. The only shared state
//! is the rule snapshot, cloned once per query from the atomically-swapped
//! handle — concurrent queries never contend on a lock during evaluation.

use std::sync::Arc;
use std::thread;

use tracing::{info, info_span, warn};

use juris_core::{
    ContextBundle, ErrorCode, GraphStore, RetrievalConfig, RuleSetHandle, SimilarityIndex,
    StoreError,
};

use crate::assemble;
use crate::error::RetrievalError;
use crate::expand;
use crate::fusion::{self, FusionInput};
use crate::seed;

/// One grounding query.
///
/// The embedding comes from the external embedding model; `query_text` is
/// the raw (translated) query for text-triggered boost rules; `identifiers`
/// are literal legal identifiers an external collaborator parsed out of the
/// query (e.g. "article 8" → the article's node id or citation).
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct GroundingRequest {
    pub embedding: Vec<f32>,
    #[serde(default)]
    pub query_text: Option<String>,
    #[serde(default)]
    pub identifiers: Vec<String>,
}

impl GroundingRequest {
    #[must_use]
    pub fn new(embedding: Vec<f32>) -> Self {
        Self {
            embedding,
            query_text: None,
            identifiers: Vec::new(),
        }
    }
}

/// The hybrid retrieval and grounding engine.
///
/// Holds read-only handles to the externally-owned stores and the hot-
/// reloadable rule set. Cheap to share across threads; queries are fully
/// independent.
pub struct GroundingEngine {
    index: Arc<dyn SimilarityIndex>,
    graph: Arc<dyn GraphStore>,
    rules: Arc<RuleSetHandle>,
    config: RetrievalConfig,
}

impl GroundingEngine {
    /// Build an engine, validating the configuration up front.
    pub fn new(
        index: Arc<dyn SimilarityIndex>,
        graph: Arc<dyn GraphStore>,
        rules: Arc<RuleSetHandle>,
        config: RetrievalConfig,
    ) -> anyhow::Result<Self> {
        config.validate()?;
        Ok(Self {
            index,
            graph,
            rules,
            config,
        })
    }

    #[must_use]
    pub const fn config(&self) -> &RetrievalConfig {
        &self.config
    }

    /// Evaluate one query into a bounded, ordered, provenance-tagged bundle.
    ///
    /// Failure policy (see [`RetrievalError`]):
    /// - degenerate embedding → `EmptyQuery`, before any store call;
    /// - similarity index down after one retry → graph-only retrieval from
    ///   the explicit identifiers with `degraded = true`, or
    ///   `RetrievalFailed` when none resolve;
    /// - graph store down after one retry → `StoreUnavailable`;
    /// - fewer than `min_results` after ranking → returned with
    ///   `degraded = true`, never an error.
    pub fn ground(&self, request: &GroundingRequest) -> Result<ContextBundle, RetrievalError> {
        let query_id = query_id(&request.embedding);
        let span = info_span!("ground", query_id = %query_id);
        let _guard = span.enter();

        if seed::is_degenerate(&request.embedding) {
            return Err(RetrievalError::EmptyQuery { query_id });
        }

        let (similarity_result, identifier_result) = thread::scope(|scope| {
            let similarity = scope.spawn(|| {
                self.with_retry("similarity search", || {
                    seed::similarity_seeds(
                        self.index.as_ref(),
                        self.graph.as_ref(),
                        &request.embedding,
                        self.config.seed_k,
                    )
                })
            });
            let identifiers = scope.spawn(|| {
                self.with_retry("identifier lookup", || {
                    seed::identifier_seeds(self.graph.as_ref(), &request.identifiers)
                })
            });
            (similarity.join(), identifiers.join())
        });
        let similarity_result = flatten_join(similarity_result, &query_id)?;
        let identifier_seeds = flatten_join(identifier_result, &query_id)?.map_err(|source| {
            RetrievalError::StoreUnavailable {
                query_id: query_id.clone(),
                source,
            }
        })?;

        let mut degraded = false;
        let seeds = match similarity_result {
            Ok(similarity_seeds) => seed::merge_seeds(similarity_seeds, identifier_seeds),
            Err(source) => {
                if identifier_seeds.is_empty() {
                    return Err(RetrievalError::RetrievalFailed { query_id, source });
                }
                warn!(
                    code = %ErrorCode::IndexUnavailable,
                    "similarity index down, degrading to graph-only retrieval: {source}"
                );
                degraded = true;
                identifier_seeds
            }
        };

        let expansion = self
            .with_retry("graph expansion", || {
                expand::expand(self.graph.as_ref(), seeds.clone(), &self.config)
            })
            .map_err(|source| RetrievalError::StoreUnavailable {
                query_id: query_id.clone(),
                source,
            })?;

        let rules = self.rules.current();
        let ranked = fusion::rank(
            FusionInput {
                candidates: expansion.candidates,
                supersedes: expansion.supersedes,
                query_text: request.query_text.as_deref(),
            },
            &rules,
            self.graph.as_ref(),
            &self.config,
        );

        if ranked.len() < self.config.min_results {
            warn!(
                code = %ErrorCode::UnderMinimum,
                results = ranked.len(),
                min_results = self.config.min_results,
                "bundle below minimum, returning partial result as degraded"
            );
            degraded = true;
        }

        info!(results = ranked.len(), degraded, "grounding complete");
        Ok(assemble::assemble(ranked, degraded))
    }

    /// Run a store operation, retrying once after a short backoff when the
    /// failure is transient. A timeout is treated like unavailability.
    fn with_retry<T>(
        &self,
        what: &'static str,
        op: impl Fn() -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        match op() {
            Ok(value) => Ok(value),
            Err(err) if err.is_transient() => {
                warn!("{what} failed, retrying once after backoff: {err}");
                thread::sleep(self.config.retry_backoff());
                op()
            }
            Err(err) => Err(err),
        }
    }
}

/// Deterministic query id: a truncated blake3 digest of the embedding bytes.
/// Identical queries log and fail under the same id across invocations.
fn query_id(embedding: &[f32]) -> String {
    let mut hasher = blake3::Hasher::new();
    for value in embedding {
        hasher.update(&value.to_le_bytes());
    }
    let hex = hasher.finalize().to_hex();
    hex[..12].to_string()
}

fn flatten_join<T>(
    joined: thread::Result<Result<T, StoreError>>,
    query_id: &str,
) -> Result<Result<T, StoreError>, RetrievalError> {
    joined.map_err(|_| RetrievalError::Internal {
        query_id: query_id.to_string(),
        detail: "seed lookup thread panicked".to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_id_is_deterministic_and_short() {
        let a = query_id(&[0.1, 0.2, 0.3]);
        let b = query_id(&[0.1, 0.2, 0.3]);
        let c = query_id(&[0.1, 0.2, 0.4]);
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 12);
        assert!(a.chars().all(|ch| ch.is_ascii_hexdigit()));
    }

    #[test]
    fn request_deserializes_with_defaults() {
        let request: GroundingRequest =
            serde_json::from_str(r#"{"embedding":[0.5,0.5]}"#).expect("deserialize");
        assert!(request.query_text.is_none());
        assert!(request.identifiers.is_empty());
    }
}
