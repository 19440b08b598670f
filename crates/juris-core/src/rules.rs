//! Declarative boost rules for mandatory and weighted inclusion.
//!
//! # Overview
//!
//! A boost rule couples a trigger predicate (over the raw query text and/or
//! the current candidate set) with a set of target nodes and an additive
//! weight. Non-mandatory rules up-weight targets already in the candidate
//! set; mandatory rules force their targets into the final bundle regardless
//! of fused score. Rule evaluation is order-independent: boosts are additive,
//! so any evaluation order merges to the same totals.
//!
//! The rule set is an immutable snapshot. Hot reload replaces the whole
//! snapshot atomically through [`RuleSetHandle`]; a query in flight keeps the
//! snapshot it started with.

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::{Arc, RwLock};

use crate::model::node::NodeId;

// ---------------------------------------------------------------------------
// Trigger
// ---------------------------------------------------------------------------

/// Trigger predicate of a boost rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Trigger {
    /// Fires when the raw query text contains any of the terms
    /// (case-insensitive substring match).
    QueryMentions { terms: Vec<String> },
    /// Fires when the candidate set already contains any of the listed nodes.
    CandidateAnyOf { ids: Vec<NodeId> },
}

impl Trigger {
    /// Evaluate against the raw query text and the current candidate id set.
    ///
    /// `query_text` is `None` when the caller supplied only an embedding; a
    /// text trigger cannot fire then.
    #[must_use]
    pub fn matches(&self, query_text: Option<&str>, candidates: &BTreeSet<NodeId>) -> bool {
        match self {
            Self::QueryMentions { terms } => query_text.is_some_and(|text| {
                let lowered = text.to_lowercase();
                terms
                    .iter()
                    .any(|term| lowered.contains(&term.to_lowercase()))
            }),
            Self::CandidateAnyOf { ids } => ids.iter().any(|id| candidates.contains(id)),
        }
    }
}

// ---------------------------------------------------------------------------
// BoostRule / RuleSet
// ---------------------------------------------------------------------------

/// One declarative inclusion rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoostRule {
    /// Stable rule name, carried into provenance of injected candidates.
    pub name: String,
    pub trigger: Trigger,
    /// Nodes to up-weight or force-include.
    pub targets: Vec<NodeId>,
    /// Additive score bonus; may exceed 1.0 to guarantee rank dominance.
    pub weight: f32,
    /// Mandatory targets appear in the output regardless of fused score.
    #[serde(default)]
    pub mandatory: bool,
}

impl BoostRule {
    /// The vulnerable-group protection rule shipped with every deployment:
    /// queries mentioning minors force-include the minor-protection articles.
    #[must_use]
    pub fn minor_protection(targets: Vec<NodeId>) -> Self {
        Self {
            name: "minor-protection".to_string(),
            trigger: Trigger::QueryMentions {
                terms: [
                    "minor",
                    "child",
                    "unaccompanied",
                    "15-year",
                    "16-year",
                    "17-year",
                ]
                .into_iter()
                .map(String::from)
                .collect(),
            },
            targets,
            weight: 1.5,
            mandatory: true,
        }
    }

    fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            bail!("rule with empty name");
        }
        if !self.weight.is_finite() {
            bail!("rule {:?} has a non-finite weight", self.name);
        }
        if self.mandatory && self.targets.is_empty() {
            bail!("mandatory rule {:?} has an empty target set", self.name);
        }
        Ok(())
    }
}

/// An immutable snapshot of the active boost rules.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuleSet {
    #[serde(default, rename = "rule")]
    rules: Vec<BoostRule>,
}

impl RuleSet {
    /// Build a snapshot from rules, checking per-rule invariants.
    pub fn new(rules: Vec<BoostRule>) -> Result<Self> {
        for rule in &rules {
            rule.validate()?;
        }
        Ok(Self { rules })
    }

    /// Load a rule set from a TOML document of `[[rule]]` tables.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read rules file {}", path.display()))?;
        let parsed: Self = toml::from_str(&raw)
            .with_context(|| format!("failed to parse rules file {}", path.display()))?;
        Self::new(parsed.rules)
            .with_context(|| format!("invalid rule in {}", path.display()))
    }

    pub fn iter(&self) -> impl Iterator<Item = &BoostRule> {
        self.rules.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Rule evaluation failure. Never fatal to a query: the offending rule is
/// logged and skipped, and nothing is fabricated in its place.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RuleError {
    #[error("rule {rule:?}: mandatory target {target} not found in the graph store")]
    UnresolvedTarget { rule: String, target: NodeId },
}

// ---------------------------------------------------------------------------
// RuleSetHandle
// ---------------------------------------------------------------------------

/// Shared handle over the active rule snapshot.
///
/// Readers clone an `Arc` and evaluate against a frozen snapshot; reload
/// swaps the `Arc` atomically. No lock is held during query evaluation.
#[derive(Debug, Default)]
pub struct RuleSetHandle {
    inner: RwLock<Arc<RuleSet>>,
}

impl RuleSetHandle {
    #[must_use]
    pub fn new(rules: RuleSet) -> Self {
        Self {
            inner: RwLock::new(Arc::new(rules)),
        }
    }

    /// The current snapshot; safe for concurrent read.
    #[must_use]
    pub fn current(&self) -> Arc<RuleSet> {
        match self.inner.read() {
            Ok(guard) => Arc::clone(&guard),
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }

    /// Atomically replace the snapshot (hot reload).
    pub fn replace(&self, rules: RuleSet) {
        let next = Arc::new(rules);
        match self.inner.write() {
            Ok(mut guard) => *guard = next,
            Err(poisoned) => *poisoned.into_inner() = next,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    fn candidate_set(ids: &[&str]) -> BTreeSet<NodeId> {
        ids.iter().map(|id| NodeId::from(*id)).collect()
    }

    #[test]
    fn query_mentions_is_case_insensitive() {
        let trigger = Trigger::QueryMentions {
            terms: vec!["unaccompanied".into()],
        };
        assert!(trigger.matches(Some("My UNACCOMPANIED brother arrived"), &BTreeSet::new()));
        assert!(!trigger.matches(Some("family reunification"), &BTreeSet::new()));
        assert!(!trigger.matches(None, &BTreeSet::new()));
    }

    #[test]
    fn candidate_any_of_matches_present_ids() {
        let trigger = Trigger::CandidateAnyOf {
            ids: vec![NodeId::from("dublin3-art-8")],
        };
        assert!(trigger.matches(None, &candidate_set(&["dublin3-art-8", "charter-art-24"])));
        assert!(!trigger.matches(None, &candidate_set(&["charter-art-24"])));
    }

    #[test]
    fn minor_protection_rule_fires_on_keywords() {
        let rule = BoostRule::minor_protection(vec![NodeId::from("dublin3-art-8")]);
        assert!(rule.mandatory);
        assert!(
            rule.trigger
                .matches(Some("What happens to a 16-year-old?"), &BTreeSet::new())
        );
        assert!(
            !rule
                .trigger
                .matches(Some("employment rights"), &BTreeSet::new())
        );
    }

    #[test]
    fn mandatory_rule_requires_targets() {
        let rule = BoostRule {
            name: "broken".into(),
            trigger: Trigger::QueryMentions { terms: vec![] },
            targets: vec![],
            weight: 1.0,
            mandatory: true,
        };
        assert!(RuleSet::new(vec![rule]).is_err());
    }

    #[test]
    fn rule_set_loads_from_toml() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        write!(
            file,
            r#"
[[rule]]
name = "minor-protection"
targets = ["dublin3-art-8"]
weight = 1.5
mandatory = true

[rule.trigger]
kind = "query_mentions"
terms = ["minor", "child"]

[[rule]]
name = "asylum-procedure-context"
targets = ["apd-art-31"]
weight = 0.2

[rule.trigger]
kind = "candidate_any_of"
ids = ["dublin3-art-3"]
"#
        )
        .expect("write rules");

        let rules = RuleSet::load(file.path()).expect("load rules");
        assert_eq!(rules.len(), 2);

        let minor = rules.iter().next().expect("first rule");
        assert_eq!(minor.name, "minor-protection");
        assert!(minor.mandatory);

        let contextual = rules.iter().nth(1).expect("second rule");
        assert!(!contextual.mandatory);
        assert!((contextual.weight - 0.2).abs() < 1e-6);
    }

    #[test]
    fn handle_swaps_snapshots_atomically() {
        let handle = RuleSetHandle::new(RuleSet::default());
        let before = handle.current();
        assert!(before.is_empty());

        let rule = BoostRule::minor_protection(vec![NodeId::from("dublin3-art-8")]);
        handle.replace(RuleSet::new(vec![rule]).expect("valid rule"));

        // The old snapshot is untouched; the new one is visible.
        assert!(before.is_empty());
        assert_eq!(handle.current().len(), 1);
    }
}
