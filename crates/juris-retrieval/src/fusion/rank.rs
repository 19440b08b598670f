//! The fusion ranker.
//!
//! # Overview
//!
//! Merges the seed and expansion score axes into one fused score, applies
//! boost rules, and produces the final bounded ordering:
//!
//! 1. fused = w_sim·similarity + w_graph·graph + boost. Boosts are additive
//!    bonuses and may exceed 1.0 so safety-critical content outranks
//!    everything scored on relevance alone.
//! 2. Every rule is evaluated against the raw query text and the candidate
//!    set as it stood before any rule applied — evaluation is therefore
//!    order-independent (injections never trigger other rules mid-pass, and
//!    additive boosts commute).
//! 3. Candidates are unique by node id by construction.
//! 4. Ordering: fused score descending; ties broken by hierarchy rank
//!    (legal precedence, not relevance), then by observed SUPERSEDES pairs
//!    (superseding node first, superseded node demoted but kept visible),
//!    then by lexical node id. Truncation to `max_results` re-inserts any
//!    forced candidate by displacing the lowest-scoring non-forced one; if
//!    forced candidates alone exceed `max_results`, they are all kept and
//!    nothing else is.
//!
//! A mandatory rule whose target cannot be resolved is logged and skipped in
//! its entirety — a half-applied rule would be worse than a missing one, and
//! nothing is ever fabricated.

use std::collections::{BTreeMap, BTreeSet};

use tracing::warn;

use juris_core::rules::RuleError;
use juris_core::{
    Candidate, ErrorCode, GraphStore, LegalNode, NodeId, RetrievalConfig, RuleSet,
};

/// Everything the ranker needs for one query.
#[derive(Debug)]
pub struct FusionInput<'a> {
    /// Merged seed + expansion candidates, keyed by node id.
    pub candidates: BTreeMap<NodeId, Candidate>,
    /// SUPERSEDES pairs observed during expansion (source supersedes target).
    pub supersedes: BTreeSet<(NodeId, NodeId)>,
    /// Raw query text for text-triggered rules; `None` disables them.
    pub query_text: Option<&'a str>,
}

/// Produce the final bounded, ordered candidate sequence.
///
/// Rule-resolution failures are logged and skipped, never fatal, so ranking
/// itself is infallible once the candidate set is in memory.
pub fn rank(
    input: FusionInput<'_>,
    rules: &RuleSet,
    graph: &dyn GraphStore,
    config: &RetrievalConfig,
) -> Vec<Candidate> {
    let FusionInput {
        mut candidates,
        supersedes,
        query_text,
    } = input;

    apply_rules(&mut candidates, rules, graph, query_text);

    let mut ranked: Vec<Candidate> = candidates.into_values().collect();
    for candidate in &mut ranked {
        candidate.fused_score = candidate.fuse(config.w_sim, config.w_graph);
    }

    sort_candidates(&mut ranked, &supersedes);
    truncate_with_forced(ranked, config.max_results)
}

fn apply_rules(
    candidates: &mut BTreeMap<NodeId, Candidate>,
    rules: &RuleSet,
    graph: &dyn GraphStore,
    query_text: Option<&str>,
) {
    // Snapshot of the pre-boost candidate set: triggers see the same world
    // regardless of rule order.
    let present: BTreeSet<NodeId> = candidates.keys().cloned().collect();

    for rule in rules.iter() {
        if !rule.trigger.matches(query_text, &present) {
            continue;
        }

        // Resolve mandatory injections up front so a stale rule never
        // half-applies.
        let mut injections: Vec<LegalNode> = Vec::new();
        let mut resolvable = true;
        if rule.mandatory {
            for target in &rule.targets {
                if candidates.contains_key(target) {
                    continue;
                }
                match graph.get_node(target) {
                    Ok(Some(node)) => injections.push(node),
                    Ok(None) => {
                        let err = RuleError::UnresolvedTarget {
                            rule: rule.name.clone(),
                            target: target.clone(),
                        };
                        warn!(code = %ErrorCode::RuleResolution, "{err}; skipping rule");
                        resolvable = false;
                        break;
                    }
                    Err(err) => {
                        warn!(
                            code = %ErrorCode::RuleResolution,
                            rule = %rule.name,
                            target = %target,
                            "store failure while resolving rule target: {err}; skipping rule"
                        );
                        resolvable = false;
                        break;
                    }
                }
            }
        }
        if !resolvable {
            continue;
        }

        for target in &rule.targets {
            if let Some(existing) = candidates.get_mut(target) {
                existing.boost += rule.weight;
                if rule.mandatory {
                    existing.forced = true;
                }
            }
        }
        for node in injections {
            candidates.insert(
                node.id.clone(),
                Candidate::injected(node, rule.weight, rule.name.clone()),
            );
        }
    }
}

fn sort_candidates(ranked: &mut [Candidate], supersedes: &BTreeSet<(NodeId, NodeId)>) {
    ranked.sort_by(|a, b| {
        b.fused_score
            .partial_cmp(&a.fused_score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.node.hierarchy_rank.cmp(&b.node.hierarchy_rank))
            .then_with(|| {
                if supersedes.contains(&(a.node.id.clone(), b.node.id.clone())) {
                    std::cmp::Ordering::Less
                } else if supersedes.contains(&(b.node.id.clone(), a.node.id.clone())) {
                    std::cmp::Ordering::Greater
                } else {
                    std::cmp::Ordering::Equal
                }
            })
            .then_with(|| a.node.id.cmp(&b.node.id))
    });
}

/// Truncate to `max_results` while keeping every forced candidate.
///
/// Forced candidates displace the lowest-scoring non-forced ones; the bundle
/// exceeds `max_results` only when forced candidates alone do.
fn truncate_with_forced(ranked: Vec<Candidate>, max_results: usize) -> Vec<Candidate> {
    let forced_total = ranked.iter().filter(|c| c.forced).count();
    if forced_total >= max_results {
        return ranked.into_iter().filter(|c| c.forced).collect();
    }
    if ranked.len() <= max_results {
        return ranked;
    }

    let mut out = Vec::with_capacity(max_results);
    let mut forced_remaining = forced_total;
    for candidate in ranked {
        let slots_left = max_results - out.len();
        if slots_left == 0 {
            break;
        }
        if candidate.forced {
            out.push(candidate);
            forced_remaining -= 1;
        } else if slots_left > forced_remaining {
            out.push(candidate);
        }
    }
    out
}
