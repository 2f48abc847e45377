//! Property tests for the merge solver
//!
//! Random redundant networks are generated and reduced; the invariants
//! checked are idempotence (reducing twice equals reducing once), external
//! connection preservation, and determinism of the surviving network.

use component_models::{ComponentModelRef, ConnectionPolicy, TaskContextModel};
use network_plan::Plan;
use network_reduction::MergeSolver;
use proptest::prelude::*;
use serde_json::json;
use std::sync::Arc;

fn model(name: &str) -> ComponentModelRef {
    ComponentModelRef::TaskContext(Arc::new(TaskContextModel::new(name)))
}

/// A randomly redundant producer/consumer network
fn build_plan(producers: usize, consumers: usize, rates: &[u8]) -> Plan {
    let mut plan = Plan::new();
    let producer_ids: Vec<_> = (0..producers)
        .map(|_| plan.add_task(model("producer")))
        .collect();
    for (index, rate) in rates.iter().take(consumers).enumerate() {
        let consumer = plan.add_task(model("consumer"));
        plan.task_mut(consumer)
            .unwrap()
            .set_argument("rate", json!(rate));
        let producer = producer_ids[index % producer_ids.len()];
        plan.connect(producer, "out", consumer, "in", ConnectionPolicy::Data)
            .unwrap();
    }
    plan
}

proptest! {
    /// Reducing an already-reduced plan merges nothing
    #[test]
    fn prop_reduction_is_idempotent(
        producers in 1usize..4,
        consumers in 0usize..6,
        rates in proptest::collection::vec(0u8..3, 6),
    ) {
        let mut plan = build_plan(producers, consumers, &rates);
        MergeSolver::new(&mut plan).merge_identical_tasks().unwrap();
        let after_first = plan.task_ids();

        let merges = MergeSolver::new(&mut plan).merge_identical_tasks().unwrap();
        prop_assert!(merges.is_empty());
        prop_assert_eq!(plan.task_ids(), after_first);
    }

    /// Reduction never loses an externally-visible port pair
    #[test]
    fn prop_reduction_preserves_port_pairs(
        producers in 1usize..4,
        consumers in 1usize..6,
        rates in proptest::collection::vec(0u8..3, 6),
    ) {
        let mut plan = build_plan(producers, consumers, &rates);
        let pairs_before: std::collections::BTreeSet<(String, String)> = plan
            .flow()
            .each_connection()
            .into_iter()
            .map(|c| (c.source_port, c.sink_port))
            .collect();

        MergeSolver::new(&mut plan).merge_identical_tasks().unwrap();

        let pairs_after: std::collections::BTreeSet<(String, String)> = plan
            .flow()
            .each_connection()
            .into_iter()
            .map(|c| (c.source_port, c.sink_port))
            .collect();
        prop_assert_eq!(pairs_before, pairs_after);
    }

    /// Equal inputs reduce to byte-for-byte equal surviving networks
    #[test]
    fn prop_reduction_is_deterministic(
        producers in 1usize..4,
        consumers in 0usize..6,
        rates in proptest::collection::vec(0u8..3, 6),
    ) {
        let mut first = build_plan(producers, consumers, &rates);
        let mut second = build_plan(producers, consumers, &rates);

        MergeSolver::new(&mut first).merge_identical_tasks().unwrap();
        MergeSolver::new(&mut second).merge_identical_tasks().unwrap();

        prop_assert_eq!(first.task_ids(), second.task_ids());
        prop_assert_eq!(
            first.flow().each_connection(),
            second.flow().each_connection()
        );
    }
}
