//! Fusion-ranking benchmark: score fusion, rule evaluation, ordering, and
//! truncation over a few hundred candidates — the in-memory hot path of
//! every query.

use std::collections::{BTreeMap, BTreeSet};

use criterion::{BatchSize, Criterion, criterion_group, criterion_main};

use juris_core::rules::{BoostRule, RuleSet, Trigger};
use juris_core::store::MemoryStore;
use juris_core::{
    Candidate, Jurisdiction, LegalNode, NodeId, NodeKind, RetrievalConfig,
};
use juris_retrieval::{FusionInput, rank};

fn candidate(i: usize) -> Candidate {
    let id = format!("node-{i:04}");
    let mut cand = Candidate::seed(
        LegalNode {
            id: NodeId::from(id.as_str()),
            kind: NodeKind::Article,
            jurisdiction: if i % 3 == 0 {
                Jurisdiction::National
            } else {
                Jurisdiction::Eu
            },
            hierarchy_rank: (i % 3) as u32,
            text: format!("segment text {i}"),
            embedding: vec![1.0, 0.0],
            citation: format!("Cite {i}"),
        },
        (i % 100) as f32 / 100.0,
    );
    cand.graph_distance = if i % 2 == 0 { 0.6 } else { 0.0 };
    cand
}

fn build_input(n: usize) -> FusionInput<'static> {
    let candidates: BTreeMap<NodeId, Candidate> = (0..n)
        .map(candidate)
        .map(|c| (c.node.id.clone(), c))
        .collect();

    let mut supersedes = BTreeSet::new();
    for i in (0..n).step_by(10) {
        supersedes.insert((
            NodeId::from(format!("node-{i:04}").as_str()),
            NodeId::from(format!("node-{:04}", i + 1).as_str()),
        ));
    }

    FusionInput {
        candidates,
        supersedes,
        query_text: Some("asylum procedure for an unaccompanied minor"),
    }
}

fn bench_rank(c: &mut Criterion) {
    let store = MemoryStore::new();
    let config = RetrievalConfig::default();
    let rules = RuleSet::new(vec![
        BoostRule {
            name: "minor-context".into(),
            trigger: Trigger::QueryMentions {
                terms: vec!["minor".into()],
            },
            targets: vec![NodeId::from("node-0005"), NodeId::from("node-0017")],
            weight: 0.4,
            mandatory: false,
        },
        BoostRule {
            name: "procedure-context".into(),
            trigger: Trigger::CandidateAnyOf {
                ids: vec![NodeId::from("node-0001")],
            },
            targets: vec![NodeId::from("node-0002")],
            weight: 0.2,
            mandatory: false,
        },
    ])
    .expect("valid rules");

    let mut group = c.benchmark_group("fusion");
    for n in [50_usize, 200, 800] {
        group.bench_function(format!("rank_{n}_candidates"), |b| {
            b.iter_batched(
                || build_input(n),
                |input| rank(input, &rules, &store, &config),
                BatchSize::SmallInput,
            );
        });
    }
    group.finish();
}

criterion_group!(benches, bench_rank);
criterion_main!(benches);
