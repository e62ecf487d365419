use crate::core::account::AccountId;
use crate::core::config::EngineConfig;
use crate::graph::flow_graph::FlowGraph;
use chrono::Duration;
use log::debug;
use std::collections::{HashMap, HashSet, VecDeque};

/// Candidate band: total degree of a shell intermediary.
pub const CANDIDATE_DEGREE_MIN: usize = 2;
pub const CANDIDATE_DEGREE_MAX: usize = 3;

/// Fraction of inbound value that must be forwarded onward.
pub const MIN_PASSTHROUGH_RATIO: f64 = 0.80;

/// Inbound value counts as forwarded when sent within this many hours.
pub const FORWARD_WINDOW_HOURS: i64 = 24;

/// Candidate lifetime ceiling as a fraction of the batch span.
pub const MAX_LIFETIME_FRACTION: f64 = 0.30;

/// A valid chain carries at least this many candidate intermediaries.
pub const MIN_INTERMEDIARIES: usize = 2;

/// Total chain length ceiling, endpoints included.
pub const MAX_CHAIN_NODES: usize = 7;

/// A walked passthrough chain between two distinct external endpoints.
#[derive(Debug, Clone)]
pub struct ShellChain {
    /// Source, intermediaries in hop order, sink.
    pub accounts: Vec<AccountId>,
}

impl ShellChain {
    pub fn source(&self) -> &AccountId {
        &self.accounts[0]
    }

    pub fn sink(&self) -> &AccountId {
        &self.accounts[self.accounts.len() - 1]
    }

    pub fn intermediaries(&self) -> &[AccountId] {
        &self.accounts[1..self.accounts.len() - 1]
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }
}

/// Outcome of the shell scan, including the walk budget diagnostic.
#[derive(Debug, Clone, Default)]
pub struct ShellScan {
    pub chains: Vec<ShellChain>,
    pub budget_exhausted: bool,
}

/// Find passthrough chains: non-candidate source, ≥2 candidate
/// intermediaries, first non-candidate sink.
pub fn find_shell_chains(graph: &FlowGraph, config: &EngineConfig) -> ShellScan {
    let candidates: HashSet<&AccountId> = graph
        .accounts()
        .iter()
        .filter(|account| is_candidate(graph, account))
        .collect();

    // Deduplicated successor lists, ascending for deterministic BFS.
    let mut successors: HashMap<&AccountId, Vec<&AccountId>> = HashMap::new();
    for account in graph.accounts() {
        let Some(stats) = graph.node(account) else {
            continue;
        };
        let mut next: Vec<&AccountId> = stats
            .outbound
            .iter()
            .map(|&i| &graph.edge(i).to)
            .collect();
        next.sort();
        next.dedup();
        successors.insert(account, next);
    }

    let mut scan = ShellScan::default();
    let mut seen_pairs: HashSet<(&AccountId, &AccountId)> = HashSet::new();
    let mut steps = 0usize;

    'sources: for source in graph.accounts() {
        if candidates.contains(source) {
            continue;
        }
        let entry: Vec<&AccountId> = successors
            .get(source)
            .map(|next| {
                next.iter()
                    .copied()
                    .filter(|n| candidates.contains(n))
                    .collect()
            })
            .unwrap_or_default();
        if entry.is_empty() {
            continue;
        }

        let mut visited: HashSet<&AccountId> = entry.iter().copied().collect();
        let mut queue: VecDeque<Vec<&AccountId>> = entry
            .into_iter()
            .map(|c| vec![source, c])
            .collect();

        while let Some(path) = queue.pop_front() {
            let last = *path.last().expect("paths are never empty");
            let Some(next_hops) = successors.get(last) else {
                continue;
            };
            for &next in next_hops {
                steps += 1;
                if steps > config.shell_step_budget {
                    scan.budget_exhausted = true;
                    debug!("shell walk stopped at step budget {}", config.shell_step_budget);
                    break 'sources;
                }
                if candidates.contains(next) {
                    if !visited.contains(next) && path.len() + 1 < MAX_CHAIN_NODES {
                        visited.insert(next);
                        let mut extended = path.clone();
                        extended.push(next);
                        queue.push_back(extended);
                    }
                } else if next != source
                    && path.len() - 1 >= MIN_INTERMEDIARIES
                    && seen_pairs.insert((source, next))
                {
                    let mut accounts: Vec<AccountId> =
                        path.iter().map(|a| (*a).clone()).collect();
                    accounts.push(next.clone());
                    scan.chains.push(ShellChain { accounts });
                }
            }
        }
    }

    scan
}

/// A node qualifies as a shell intermediary when it is low-degree,
/// short-lived relative to the batch, forwards nearly all inbound value
/// quickly, and sits between at least two distinct endpoints.
fn is_candidate(graph: &FlowGraph, account: &AccountId) -> bool {
    let Some(stats) = graph.node(account) else {
        return false;
    };
    let degree = stats.total_degree();
    if !(CANDIDATE_DEGREE_MIN..=CANDIDATE_DEGREE_MAX).contains(&degree) {
        return false;
    }
    if stats.inbound.is_empty() || stats.outbound.is_empty() {
        return false;
    }

    // Some predecessor and successor must differ, otherwise the node
    // only bounces funds back where they came from.
    let preds: HashSet<&AccountId> = stats.inbound.iter().map(|&i| &graph.edge(i).from).collect();
    let succs: HashSet<&AccountId> = stats.outbound.iter().map(|&i| &graph.edge(i).to).collect();
    let only_bounce = preds.len() == 1 && succs.len() == 1 && preds == succs;
    if only_bounce {
        return false;
    }

    let lifetime_seconds = stats.lifetime().num_seconds() as f64;
    if lifetime_seconds > MAX_LIFETIME_FRACTION * graph.span_seconds() {
        return false;
    }

    passthrough_ratio(graph, account) >= MIN_PASSTHROUGH_RATIO
}

/// Fraction of inbound value forwarded within the forward window,
/// matched first-in-first-out.
fn passthrough_ratio(graph: &FlowGraph, account: &AccountId) -> f64 {
    let Some(stats) = graph.node(account) else {
        return 0.0;
    };
    let total_in: f64 = stats
        .inbound
        .iter()
        .map(|&i| graph.edge(i).amount_f64())
        .sum();
    if total_in <= 0.0 {
        return 0.0;
    }

    let window = Duration::hours(FORWARD_WINDOW_HOURS);
    let mut pending: VecDeque<(chrono::NaiveDateTime, f64)> = VecDeque::new();
    let mut forwarded = 0.0;
    let mut next_in = 0usize;

    for &out_idx in &stats.outbound {
        let out = graph.edge(out_idx);
        while next_in < stats.inbound.len() {
            let inc = graph.edge(stats.inbound[next_in]);
            if inc.timestamp > out.timestamp {
                break;
            }
            pending.push_back((inc.timestamp, inc.amount_f64()));
            next_in += 1;
        }
        // Inbound value older than the window can no longer be forwarded.
        while let Some(&(ts, _)) = pending.front() {
            if out.timestamp - ts > window {
                pending.pop_front();
            } else {
                break;
            }
        }

        let mut remaining = out.amount_f64();
        while remaining > 0.0 {
            let Some((ts, available)) = pending.pop_front() else {
                break;
            };
            let used = available.min(remaining);
            forwarded += used;
            remaining -= used;
            if available > used {
                pending.push_front((ts, available - used));
            }
        }
    }

    forwarded / total_in
}
