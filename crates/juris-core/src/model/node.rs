use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// Stable identifier of a legal knowledge node.
///
/// IDs are opaque strings minted at ingestion time (e.g. `"dublin3-art-8"`).
/// Lexical order on IDs is the deterministic final tie-break in ranking, so
/// `NodeId` derives `Ord`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    /// Construct a node ID from a raw string without validation.
    ///
    /// ID shape is an ingestion concern; the engine only requires stability
    /// and uniqueness.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// The five kinds of legal knowledge node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Article,
    Definition,
    Exception,
    Condition,
    Regulation,
}

impl NodeKind {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Article => "article",
            Self::Definition => "definition",
            Self::Exception => "exception",
            Self::Condition => "condition",
            Self::Regulation => "regulation",
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NodeKind {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "article" => Ok(Self::Article),
            "definition" => Ok(Self::Definition),
            "exception" => Ok(Self::Exception),
            "condition" => Ok(Self::Condition),
            "regulation" => Ok(Self::Regulation),
            _ => Err(ParseEnumError {
                what: "node kind",
                value: s.to_string(),
            }),
        }
    }
}

/// Jurisdiction level of an instrument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Jurisdiction {
    Eu,
    National,
}

impl Jurisdiction {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Eu => "eu",
            Self::National => "national",
        }
    }
}

impl fmt::Display for Jurisdiction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Jurisdiction {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "eu" => Ok(Self::Eu),
            "national" => Ok(Self::National),
            _ => Err(ParseEnumError {
                what: "jurisdiction",
                value: s.to_string(),
            }),
        }
    }
}

/// Failure to parse a stored enum value.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid {what}: {value:?}")]
pub struct ParseEnumError {
    pub what: &'static str,
    pub value: String,
}

/// A single legal knowledge segment.
///
/// Every node carries exactly one canonical citation and one hierarchy rank
/// (lower rank = higher legal precedence; an EU regulation outranks a national
/// statute). Embeddings are fixed-dimension and comparable only within one
/// index generation — mixing generations is an ingestion bug, not something
/// the engine defends against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegalNode {
    pub id: NodeId,
    pub kind: NodeKind,
    pub jurisdiction: Jurisdiction,
    /// Legal precedence rank. Lower wins ties; never a relevance signal.
    pub hierarchy_rank: u32,
    /// The text segment handed to the answer generator.
    pub text: String,
    /// Embedding vector in the index generation's space.
    pub embedding: Vec<f32>,
    /// Canonical citation string, always non-empty.
    pub citation: String,
}

impl LegalNode {
    /// Check the node-level invariants enforced at store boundaries.
    pub fn validate(&self) -> Result<(), InvalidNode> {
        if self.id.as_str().is_empty() {
            return Err(InvalidNode {
                id: self.id.clone(),
                reason: "empty node id",
            });
        }
        if self.citation.trim().is_empty() {
            return Err(InvalidNode {
                id: self.id.clone(),
                reason: "empty citation",
            });
        }
        Ok(())
    }
}

/// Node-level invariant violation, rejected at insert time.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid node {id}: {reason}")]
pub struct InvalidNode {
    pub id: NodeId,
    pub reason: &'static str,
}

/// The six directed edge kinds of the legal graph.
///
/// Ordering is derived so neighbor lists can be sorted deterministically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    Defines,
    Excepts,
    ConditionsOn,
    Supersedes,
    Protects,
    References,
}

impl EdgeKind {
    /// Every edge kind, for unfiltered neighbor queries.
    pub const ALL: [Self; 6] = [
        Self::Defines,
        Self::Excepts,
        Self::ConditionsOn,
        Self::Supersedes,
        Self::Protects,
        Self::References,
    ];

    const fn as_str(self) -> &'static str {
        match self {
            Self::Defines => "defines",
            Self::Excepts => "excepts",
            Self::ConditionsOn => "conditions_on",
            Self::Supersedes => "supersedes",
            Self::Protects => "protects",
            Self::References => "references",
        }
    }
}

impl fmt::Display for EdgeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EdgeKind {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "defines" => Ok(Self::Defines),
            "excepts" => Ok(Self::Excepts),
            "conditions_on" => Ok(Self::ConditionsOn),
            "supersedes" => Ok(Self::Supersedes),
            "protects" => Ok(Self::Protects),
            "references" => Ok(Self::References),
            _ => Err(ParseEnumError {
                what: "edge kind",
                value: s.to_string(),
            }),
        }
    }
}

/// A directed, typed edge between two legal nodes.
///
/// Edges reference only existing nodes; SUPERSEDES edges point from the
/// dominant (lower-rank) node to the superseded (higher-rank) node. Both
/// invariants are enforced by the store adapters at insert time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegalEdge {
    pub kind: EdgeKind,
    pub source: NodeId,
    pub target: NodeId,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_node(id: &str, citation: &str) -> LegalNode {
        LegalNode {
            id: NodeId::from(id),
            kind: NodeKind::Article,
            jurisdiction: Jurisdiction::Eu,
            hierarchy_rank: 0,
            text: "text".into(),
            embedding: vec![1.0, 0.0],
            citation: citation.into(),
        }
    }

    #[test]
    fn node_id_orders_lexically() {
        let a = NodeId::from("charter-art-24");
        let b = NodeId::from("dublin3-art-8");
        assert!(a < b);
    }

    #[test]
    fn node_kind_round_trips() {
        for kind in [
            NodeKind::Article,
            NodeKind::Definition,
            NodeKind::Exception,
            NodeKind::Condition,
            NodeKind::Regulation,
        ] {
            let parsed: NodeKind = kind.to_string().parse().expect("round trip");
            assert_eq!(parsed, kind);
        }
    }

    #[test]
    fn edge_kind_round_trips() {
        for kind in [
            EdgeKind::Defines,
            EdgeKind::Excepts,
            EdgeKind::ConditionsOn,
            EdgeKind::Supersedes,
            EdgeKind::Protects,
            EdgeKind::References,
        ] {
            let parsed: EdgeKind = kind.to_string().parse().expect("round trip");
            assert_eq!(parsed, kind);
        }
    }

    #[test]
    fn unknown_enum_values_are_rejected() {
        assert!("statute".parse::<NodeKind>().is_err());
        assert!("eu-charter".parse::<Jurisdiction>().is_err());
        assert!("cites".parse::<EdgeKind>().is_err());
    }

    #[test]
    fn empty_citation_is_invalid() {
        let node = make_node("dublin3-art-8", "  ");
        let err = node.validate().expect_err("empty citation must fail");
        assert_eq!(err.reason, "empty citation");
    }

    #[test]
    fn valid_node_passes() {
        let node = make_node("dublin3-art-8", "Regulation (EU) 604/2013, Art. 8");
        assert!(node.validate().is_ok());
    }
}
