use crate::core::account::AccountId;
use crate::core::config::EngineConfig;
use crate::graph::flow_graph::FlowGraph;
use chrono::{Duration, NaiveDateTime};
use log::debug;
use std::collections::{HashMap, HashSet};

/// Cycle lengths considered: 3, 4 or 5 hops.
pub const MIN_CYCLE_LEN: usize = 3;
pub const MAX_CYCLE_LEN: usize = 5;

/// Degree band for DFS participation. Excludes isolated nodes and hubs.
pub const ELIGIBLE_DEGREE_MIN: usize = 2;
pub const ELIGIBLE_DEGREE_MAX: usize = 20;

/// All edges of a reported cycle fall inside this window, in hours.
pub const CYCLE_WINDOW_HOURS: i64 = 72;

/// Every edge amount must sit within ±15% of the cycle mean.
pub const AMOUNT_TOLERANCE: f64 = 0.15;

/// min(amounts) / max(amounts) must be at least this.
pub const FLOW_CONSERVATION_MIN: f64 = 0.70;

/// Per cycle node: external counterparties active inside the window.
pub const MAX_EXTERNAL_NEIGHBORS: usize = 5;

/// Parallel-edge combinations tried per discovered node sequence.
const COMBO_CAP: usize = 64;

/// A validated circular flow.
///
/// `accounts` is the canonical rotation (lexicographically smallest id
/// first); `edges[i]` is the chosen edge from `accounts[i]` to
/// `accounts[(i + 1) % len]`.
#[derive(Debug, Clone)]
pub struct CycleHit {
    pub accounts: Vec<AccountId>,
    pub edges: Vec<usize>,
    pub window_start: NaiveDateTime,
    pub window_end: NaiveDateTime,
}

impl CycleHit {
    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }

    pub fn window_hours(&self) -> f64 {
        (self.window_end - self.window_start).num_seconds() as f64 / 3_600.0
    }
}

/// Outcome of the cycle scan, including budget diagnostics.
#[derive(Debug, Clone, Default)]
pub struct CycleScan {
    pub cycles: Vec<CycleHit>,
    /// Starting nodes whose DFS hit the per-start step budget.
    pub starts_budget_exhausted: usize,
    /// True when the global candidate cap stopped the scan early.
    pub candidate_cap_hit: bool,
}

/// Find all validated cycles of length 3–5 in the graph.
///
/// Bounded DFS from each eligible node in ascending account order.
/// Traversal only descends to nodes ordered after the start, so each
/// node sequence is discovered exactly once, already rooted at its
/// smallest member; canonicalization plus a seen-set still guard the
/// parallel-edge case.
pub fn find_cycles(graph: &FlowGraph, config: &EngineConfig) -> CycleScan {
    let eligible: HashSet<&AccountId> = graph
        .accounts()
        .iter()
        .filter(|account| {
            graph
                .node(account)
                .map(|n| (ELIGIBLE_DEGREE_MIN..=ELIGIBLE_DEGREE_MAX).contains(&n.total_degree()))
                .unwrap_or(false)
        })
        .collect();

    // Successor lists among eligible nodes, grouped by counterparty and
    // ordered by counterparty id for deterministic traversal.
    let mut adj: HashMap<&AccountId, Vec<(&AccountId, Vec<usize>)>> = HashMap::new();
    for &account in &eligible {
        let Some(stats) = graph.node(account) else {
            continue;
        };
        let mut grouped: HashMap<&AccountId, Vec<usize>> = HashMap::new();
        for &idx in &stats.outbound {
            let to = &graph.edge(idx).to;
            if eligible.contains(to) {
                grouped.entry(to).or_default().push(idx);
            }
        }
        let mut successors: Vec<(&AccountId, Vec<usize>)> = grouped.into_iter().collect();
        successors.sort_by(|a, b| a.0.cmp(b.0));
        adj.insert(account, successors);
    }

    let mut scan = CycleScan::default();
    let mut seen: HashSet<Vec<AccountId>> = HashSet::new();

    'starts: for start in graph.accounts() {
        if !eligible.contains(start) {
            continue;
        }
        let mut steps = 0usize;
        let mut path: Vec<&AccountId> = Vec::with_capacity(MAX_CYCLE_LEN);
        let mut path_set: HashSet<&AccountId> = HashSet::new();
        let exhausted = dfs_from(
            start,
            start,
            graph,
            config,
            &adj,
            &mut path,
            &mut path_set,
            &mut steps,
            &mut seen,
            &mut scan,
        );
        if exhausted {
            scan.starts_budget_exhausted += 1;
        }
        if scan.cycles.len() >= config.cycle_candidate_cap {
            scan.candidate_cap_hit = true;
            debug!(
                "cycle scan stopped at candidate cap {}",
                config.cycle_candidate_cap
            );
            break 'starts;
        }
    }

    scan
}

/// Returns true when the per-start step budget ran out.
#[allow(clippy::too_many_arguments)]
fn dfs_from<'g>(
    current: &'g AccountId,
    start: &'g AccountId,
    graph: &FlowGraph,
    config: &EngineConfig,
    adj: &HashMap<&AccountId, Vec<(&'g AccountId, Vec<usize>)>>,
    path: &mut Vec<&'g AccountId>,
    path_set: &mut HashSet<&'g AccountId>,
    steps: &mut usize,
    seen: &mut HashSet<Vec<AccountId>>,
    scan: &mut CycleScan,
) -> bool {
    path.push(current);
    path_set.insert(current);

    let mut exhausted = false;
    if let Some(successors) = adj.get(current) {
        for (next, _) in successors {
            *steps += 1;
            if *steps > config.dfs_step_budget {
                exhausted = true;
                break;
            }
            if scan.cycles.len() >= config.cycle_candidate_cap {
                break;
            }
            if *next == start && path.len() >= MIN_CYCLE_LEN {
                let nodes: Vec<AccountId> = path.iter().map(|a| (*a).clone()).collect();
                if let Some(hit) = validate_sequence(&nodes, graph) {
                    let canonical = canonical_rotation(&hit.accounts);
                    if seen.insert(canonical) {
                        scan.cycles.push(hit);
                    }
                }
            } else if path.len() < MAX_CYCLE_LEN
                && *next > start
                && !path_set.contains(*next)
            {
                exhausted |= dfs_from(
                    *next, start, graph, config, adj, path, path_set, steps, seen, scan,
                );
                if exhausted {
                    break;
                }
            }
        }
    }

    path.pop();
    path_set.remove(current);
    exhausted
}

/// Check the four cycle constraints against a node sequence, searching
/// parallel-edge combinations in edge-list order. First passing
/// combination wins.
fn validate_sequence(nodes: &[AccountId], graph: &FlowGraph) -> Option<CycleHit> {
    let k = nodes.len();
    let mut hops: Vec<Vec<usize>> = Vec::with_capacity(k);
    for i in 0..k {
        let from = &nodes[i];
        let to = &nodes[(i + 1) % k];
        let stats = graph.node(from)?;
        let candidates: Vec<usize> = stats
            .outbound
            .iter()
            .copied()
            .filter(|&idx| graph.edge(idx).to == *to)
            .collect();
        if candidates.is_empty() {
            return None;
        }
        hops.push(candidates);
    }

    let mut chosen = Vec::with_capacity(k);
    let mut tried = 0usize;
    search_combos(graph, nodes, &hops, &mut chosen, &mut tried)
}

fn search_combos(
    graph: &FlowGraph,
    nodes: &[AccountId],
    hops: &[Vec<usize>],
    chosen: &mut Vec<usize>,
    tried: &mut usize,
) -> Option<CycleHit> {
    if chosen.len() == hops.len() {
        *tried += 1;
        if *tried > COMBO_CAP {
            return None;
        }
        return check_combination(graph, nodes, chosen);
    }
    if *tried > COMBO_CAP {
        return None;
    }
    for &idx in &hops[chosen.len()] {
        chosen.push(idx);
        if let Some(hit) = search_combos(graph, nodes, hops, chosen, tried) {
            return Some(hit);
        }
        chosen.pop();
        if *tried > COMBO_CAP {
            break;
        }
    }
    None
}

fn check_combination(graph: &FlowGraph, nodes: &[AccountId], edges: &[usize]) -> Option<CycleHit> {
    let timestamps: Vec<NaiveDateTime> = edges.iter().map(|&i| graph.edge(i).timestamp).collect();
    let window_start = *timestamps.iter().min()?;
    let window_end = *timestamps.iter().max()?;
    if window_end - window_start > Duration::hours(CYCLE_WINDOW_HOURS) {
        return None;
    }

    let amounts: Vec<f64> = edges.iter().map(|&i| graph.edge(i).amount_f64()).collect();
    let mean = amounts.iter().sum::<f64>() / amounts.len() as f64;
    if amounts.iter().any(|&a| (a - mean).abs() > AMOUNT_TOLERANCE * mean) {
        return None;
    }

    let min = amounts.iter().cloned().fold(f64::INFINITY, f64::min);
    let max = amounts.iter().cloned().fold(0.0_f64, f64::max);
    if max <= 0.0 || min / max < FLOW_CONSERVATION_MIN {
        return None;
    }

    let members: HashSet<&AccountId> = nodes.iter().collect();
    for node in nodes {
        let outside = graph.external_neighbors_within(node, window_start, window_end, &members);
        if outside > MAX_EXTERNAL_NEIGHBORS {
            return None;
        }
    }

    Some(CycleHit {
        accounts: nodes.to_vec(),
        edges: edges.to_vec(),
        window_start,
        window_end,
    })
}

/// Minimal rotation of a cycle under account-id ordering. O(L²), trivial
/// at L ≤ 5.
pub fn canonical_rotation(accounts: &[AccountId]) -> Vec<AccountId> {
    if accounts.is_empty() {
        return Vec::new();
    }
    let n = accounts.len();
    let mut best = accounts.to_vec();
    for i in 1..n {
        let rotated: Vec<AccountId> = accounts[i..]
            .iter()
            .chain(accounts[..i].iter())
            .cloned()
            .collect();
        if rotated < best {
            best = rotated;
        }
    }
    best
}
