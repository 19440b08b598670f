//! Engine-level error taxonomy.
//!
//! Every variant carries the deterministic query id and, where a collaborator
//! failed, the underlying store error — enough context for a caller to act
//! without parsing message text. Under-minimum bundles are not errors: they
//! come back as degraded bundles (a partial grounded answer is safer than
//! none).

use juris_core::{ErrorCode, StoreError};

/// Failure of one grounding query.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RetrievalError {
    /// The query embedding was empty, zero, or non-finite. Non-retryable.
    #[error("query {query_id}: embedding is empty or degenerate")]
    EmptyQuery { query_id: String },

    /// The similarity index stayed unreachable after the retry and no
    /// graph-only fallback was possible.
    #[error("query {query_id}: retrieval failed, no fallback available")]
    RetrievalFailed {
        query_id: String,
        #[source]
        source: StoreError,
    },

    /// The knowledge graph store stayed unreachable after the retry.
    #[error("query {query_id}: knowledge graph store unavailable")]
    StoreUnavailable {
        query_id: String,
        #[source]
        source: StoreError,
    },

    /// A seed-lookup thread died; nothing was written anywhere.
    #[error("query {query_id}: internal error: {detail}")]
    Internal { query_id: String, detail: String },
}

impl RetrievalError {
    /// The machine-readable code for this failure.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::EmptyQuery { .. } => ErrorCode::EmptyQuery,
            Self::RetrievalFailed { .. } => ErrorCode::RetrievalFailed,
            Self::StoreUnavailable { .. } => ErrorCode::StoreUnavailable,
            Self::Internal { .. } => ErrorCode::InternalUnexpected,
        }
    }

    /// The query this failure belongs to.
    #[must_use]
    pub fn query_id(&self) -> &str {
        match self {
            Self::EmptyQuery { query_id }
            | Self::RetrievalFailed { query_id, .. }
            | Self::StoreUnavailable { query_id, .. }
            | Self::Internal { query_id, .. } => query_id,
        }
    }
}
