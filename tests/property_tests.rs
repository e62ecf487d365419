use chrono::{Duration, NaiveDate, NaiveDateTime};
use forensics_engine::core::account::AccountId;
use forensics_engine::core::config::EngineConfig;
use forensics_engine::core::transaction::{Transaction, TxnId};
use forensics_engine::detect::cycles::{
    find_cycles, AMOUNT_TOLERANCE, CYCLE_WINDOW_HOURS, FLOW_CONSERVATION_MIN,
    MAX_EXTERNAL_NEIGHBORS,
};
use forensics_engine::detect::shells::{find_shell_chains, MIN_INTERMEDIARIES};
use forensics_engine::graph::flow_graph::FlowGraph;
use forensics_engine::prelude::*;
use proptest::prelude::*;
use rust_decimal::Decimal;
use std::collections::HashSet;

fn base() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 3, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
}

/// Accounts drawn from a small pool so cycles and shared counterparties
/// actually occur.
fn arb_account() -> impl Strategy<Value = AccountId> {
    prop::sample::select(vec![
        AccountId::new("A"),
        AccountId::new("B"),
        AccountId::new("C"),
        AccountId::new("D"),
        AccountId::new("E"),
        AccountId::new("F"),
        AccountId::new("G"),
        AccountId::new("H"),
    ])
}

/// A batch of up to 60 transactions with unique ids, positive amounts,
/// and timestamps inside a six-week span. Self-pairs are dropped.
fn arb_batch() -> impl Strategy<Value = Vec<Transaction>> {
    prop::collection::vec(
        (arb_account(), arb_account(), 1u64..10_000u64, 0i64..1_000 * 60),
        1..60,
    )
    .prop_map(|raw| {
        raw.into_iter()
            .enumerate()
            .filter(|(_, (sender, receiver, _, _))| sender != receiver)
            .map(|(i, (sender, receiver, amount, minutes))| {
                Transaction::new(
                    TxnId::new(format!("TX-{:05}", i)),
                    sender,
                    receiver,
                    Decimal::from(amount),
                    base() + Duration::minutes(minutes),
                )
                .expect("generated amounts are positive")
            })
            .collect()
    })
}

fn analyze(batch: Vec<Transaction>) -> Analysis {
    ForensicsEngine::new().analyze(batch)
}

fn json_without_timing(analysis: &Analysis) -> String {
    let mut report = analysis.report.clone();
    report.summary.processing_time_seconds = 0.0;
    report.to_json().expect("report serializes")
}

proptest! {
    // ===================================================================
    // INVARIANT 1: Suspicion scores stay within [0, 100].
    // ===================================================================
    #[test]
    fn scores_bounded(batch in arb_batch()) {
        let analysis = analyze(batch);
        for v in &analysis.report.suspicious_accounts {
            prop_assert!(v.suspicion_score <= 100);
        }
        for node in &analysis.graph_data.nodes {
            prop_assert!(node.suspicion_score <= 100);
        }
    }

    // ===================================================================
    // INVARIANT 2: Pattern-less accounts only appear when cluster-boosted
    // past the report threshold.
    // ===================================================================
    #[test]
    fn patternless_accounts_need_boost(batch in arb_batch()) {
        let analysis = analyze(batch);
        for v in &analysis.report.suspicious_accounts {
            if v.detected_patterns.is_empty() {
                prop_assert!(v.suspicion_score >= 15);
            }
        }
    }

    // ===================================================================
    // INVARIANT 3: Every reported cycle honors all four constraints.
    // ===================================================================
    #[test]
    fn cycles_honor_constraints(batch in arb_batch()) {
        let graph = FlowGraph::build(batch);
        let scan = find_cycles(&graph, &EngineConfig::default());
        for cycle in &scan.cycles {
            prop_assert!((3..=5).contains(&cycle.len()));
            prop_assert!(
                cycle.window_end - cycle.window_start
                    <= Duration::hours(CYCLE_WINDOW_HOURS)
            );

            let amounts: Vec<f64> = cycle
                .edges
                .iter()
                .map(|&i| graph.edge(i).amount_f64())
                .collect();
            let mean = amounts.iter().sum::<f64>() / amounts.len() as f64;
            for &a in &amounts {
                prop_assert!((a - mean).abs() <= AMOUNT_TOLERANCE * mean + 1e-9);
            }
            let min = amounts.iter().cloned().fold(f64::INFINITY, f64::min);
            let max = amounts.iter().cloned().fold(0.0_f64, f64::max);
            prop_assert!(min / max >= FLOW_CONSERVATION_MIN - 1e-9);

            let members: HashSet<&AccountId> = cycle.accounts.iter().collect();
            for account in &cycle.accounts {
                let outside = graph.external_neighbors_within(
                    account,
                    cycle.window_start,
                    cycle.window_end,
                    &members,
                );
                prop_assert!(outside <= MAX_EXTERNAL_NEIGHBORS);
            }

            // Edges really connect consecutive members.
            for (i, &edge) in cycle.edges.iter().enumerate() {
                let e = graph.edge(edge);
                prop_assert_eq!(&e.from, &cycle.accounts[i]);
                prop_assert_eq!(&e.to, &cycle.accounts[(i + 1) % cycle.len()]);
            }
        }
    }

    // ===================================================================
    // INVARIANT 4: No two reported cycles are rotations of each other.
    // ===================================================================
    #[test]
    fn cycles_canonical(batch in arb_batch()) {
        let graph = FlowGraph::build(batch);
        let scan = find_cycles(&graph, &EngineConfig::default());
        let mut seen: HashSet<Vec<AccountId>> = HashSet::new();
        for cycle in &scan.cycles {
            let canonical =
                forensics_engine::detect::cycles::canonical_rotation(&cycle.accounts);
            prop_assert!(seen.insert(canonical), "duplicate rotation reported");
        }
    }

    // ===================================================================
    // INVARIANT 5: Shell chains carry ≥2 intermediaries and distinct
    // endpoints.
    // ===================================================================
    #[test]
    fn shell_chains_well_formed(batch in arb_batch()) {
        let graph = FlowGraph::build(batch);
        let scan = find_shell_chains(&graph, &EngineConfig::default());
        for chain in &scan.chains {
            prop_assert!(chain.intermediaries().len() >= MIN_INTERMEDIARIES);
            prop_assert!(chain.source() != chain.sink());
            prop_assert!(chain.len() <= 7);
        }
    }

    // ===================================================================
    // INVARIANT 6: The ranked list is sorted by score descending, then
    // account id ascending.
    // ===================================================================
    #[test]
    fn report_ordering(batch in arb_batch()) {
        let analysis = analyze(batch);
        let list = &analysis.report.suspicious_accounts;
        for pair in list.windows(2) {
            let ordered = pair[0].suspicion_score > pair[1].suspicion_score
                || (pair[0].suspicion_score == pair[1].suspicion_score
                    && pair[0].account_id < pair[1].account_id);
            prop_assert!(ordered);
        }
    }

    // ===================================================================
    // INVARIANT 7: Same input, same seed → byte-identical JSON (timing
    // normalized).
    // ===================================================================
    #[test]
    fn idempotent_runs(batch in arb_batch()) {
        let first = analyze(batch.clone());
        let second = analyze(batch);
        prop_assert_eq!(json_without_timing(&first), json_without_timing(&second));
    }

    // ===================================================================
    // INVARIANT 8: Input order is irrelevant; timestamps decide.
    // ===================================================================
    #[test]
    fn permutation_invariant(batch in arb_batch()) {
        let mut reversed = batch.clone();
        reversed.reverse();
        let a = analyze(batch);
        let b = analyze(reversed);
        prop_assert_eq!(json_without_timing(&a), json_without_timing(&b));
    }

    // ===================================================================
    // Rings always reference accounts that exist, and ring risk equals
    // the best member score.
    // ===================================================================
    #[test]
    fn ring_members_exist(batch in arb_batch()) {
        let analysis = analyze(batch);
        let node_ids: HashSet<&str> = analysis
            .graph_data
            .nodes
            .iter()
            .map(|n| n.id.as_str())
            .collect();
        for ring in &analysis.report.fraud_rings {
            prop_assert!(!ring.member_accounts.is_empty());
            for member in &ring.member_accounts {
                prop_assert!(node_ids.contains(member.as_str()));
            }
            let best = ring
                .member_accounts
                .iter()
                .filter_map(|m| {
                    analysis
                        .report
                        .suspicious_accounts
                        .iter()
                        .find(|v| &v.account_id == m)
                        .map(|v| v.suspicion_score)
                })
                .max()
                .unwrap_or(0);
            prop_assert_eq!(ring.risk_score, best);
        }
    }
}
