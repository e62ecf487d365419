use crate::core::account::AccountId;
use crate::detect::cycles::CycleHit;
use crate::detect::shells::ShellChain;
use crate::detect::smurfing::{SmurfHit, SmurfKind};
use crate::graph::flow_graph::FlowGraph;
use crate::score::rings::RingSet;
use serde::Serialize;
use std::collections::{BTreeSet, HashMap, HashSet};

/// Pattern weights.
pub const WEIGHT_CYCLE_3: f64 = 25.0;
pub const WEIGHT_CYCLE_4: f64 = 20.0;
pub const WEIGHT_CYCLE_5: f64 = 15.0;
pub const WEIGHT_SMURFING: f64 = 22.0;
pub const WEIGHT_SHELL: f64 = 18.0;
pub const WEIGHT_VELOCITY: f64 = 10.0;

/// Ceiling on the summed pattern weights.
pub const BASE_SCORE_CAP: f64 = 70.0;

/// Merchant suppression: −20 when the account looks like steady
/// commercial traffic.
pub const MERCHANT_PENALTY: f64 = 20.0;
pub const MERCHANT_MIN_EDGES: usize = 10;
pub const MERCHANT_REPEAT_RATIO: f64 = 0.30;
pub const MERCHANT_TIMING_CV_MAX: f64 = 1.5;

/// Broad-activity suppression: −50 for large always-on accounts.
pub const ACTIVITY_PENALTY: f64 = 50.0;
pub const ACTIVITY_MIN_DEGREE: usize = 50;
pub const ACTIVITY_SPAN_FRACTION: f64 = 0.70;
pub const ACTIVITY_AMOUNT_CV_MIN: f64 = 0.5;
pub const ACTIVITY_GAP_FRACTION: f64 = 0.20;

/// Cluster booster: +8 when at least two counterparties already score
/// above 30.
pub const CLUSTER_BONUS: f64 = 8.0;
pub const CLUSTER_NEIGHBOR_SCORE: f64 = 30.0;
pub const CLUSTER_MIN_NEIGHBORS: usize = 2;

/// Accounts without patterns are dropped below this score.
pub const REPORT_THRESHOLD: f64 = 15.0;

/// Score ceiling after clamping.
pub const SCORE_MAX: f64 = 100.0;

/// Tags attached to flagged accounts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum PatternTag {
    CycleLength3,
    CycleLength4,
    CycleLength5,
    SmurfingAggregator,
    SmurfingDisperser,
    ShellNetwork,
    HighVelocity,
}

impl PatternTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            PatternTag::CycleLength3 => "cycle_length_3",
            PatternTag::CycleLength4 => "cycle_length_4",
            PatternTag::CycleLength5 => "cycle_length_5",
            PatternTag::SmurfingAggregator => "smurfing_aggregator",
            PatternTag::SmurfingDisperser => "smurfing_disperser",
            PatternTag::ShellNetwork => "shell_network",
            PatternTag::HighVelocity => "high_velocity",
        }
    }

    pub fn weight(&self) -> f64 {
        match self {
            PatternTag::CycleLength3 => WEIGHT_CYCLE_3,
            PatternTag::CycleLength4 => WEIGHT_CYCLE_4,
            PatternTag::CycleLength5 => WEIGHT_CYCLE_5,
            PatternTag::SmurfingAggregator | PatternTag::SmurfingDisperser => WEIGHT_SMURFING,
            PatternTag::ShellNetwork => WEIGHT_SHELL,
            PatternTag::HighVelocity => WEIGHT_VELOCITY,
        }
    }

    /// Velocity is corroborating evidence only; everything else stands
    /// on its own.
    pub fn is_structural(&self) -> bool {
        !matches!(self, PatternTag::HighVelocity)
    }
}

/// Final per-account outcome, serialized into the report.
#[derive(Debug, Clone, Serialize)]
pub struct AccountVerdict {
    pub account_id: String,
    pub suspicion_score: u32,
    pub detected_patterns: Vec<String>,
    pub ring_id: Option<String>,
    pub explanation: String,
}

/// Everything the composer consumes. The graph and all detector output
/// are read-only by this point.
pub struct ComposerInput<'a> {
    pub graph: &'a FlowGraph,
    pub cycles: &'a [CycleHit],
    pub smurfs: &'a [SmurfHit],
    pub shells: &'a [ShellChain],
    pub velocity: &'a [AccountId],
    pub anomaly: &'a HashMap<AccountId, f64>,
    pub rings: &'a RingSet,
}

/// Per-account pattern evidence and scoring state.
#[derive(Debug, Default)]
struct Evidence {
    tags: BTreeSet<PatternTag>,
    /// Shortest cycle the account sits in, with its window hours.
    best_cycle: Option<(usize, f64)>,
    /// First smurfing hit at this account.
    smurf: Option<(SmurfKind, usize, f64)>,
    boost_neighbors: usize,
}

/// Compose final suspicion scores and verdicts.
///
/// Steps 1–4 (base weights, anomaly bonus, merchant penalty, activity
/// suppression) are computed per account in ascending id order. The
/// cluster booster then runs as a single pass over the completed
/// step-4 scores, so no account observes a half-updated neighbor.
pub fn compose(input: &ComposerInput<'_>) -> Vec<AccountVerdict> {
    let graph = input.graph;
    let mut evidence: HashMap<&AccountId, Evidence> = HashMap::new();

    for cycle in input.cycles {
        let len = cycle.len();
        let tag = match len {
            3 => PatternTag::CycleLength3,
            4 => PatternTag::CycleLength4,
            _ => PatternTag::CycleLength5,
        };
        for account in &cycle.accounts {
            let entry = evidence.entry(account).or_default();
            entry.tags.insert(tag);
            let better = match entry.best_cycle {
                Some((existing, _)) => len < existing,
                None => true,
            };
            if better {
                entry.best_cycle = Some((len, cycle.window_hours()));
            }
        }
    }
    for hit in input.smurfs {
        let tag = match hit.kind {
            SmurfKind::Aggregator => PatternTag::SmurfingAggregator,
            SmurfKind::Disperser => PatternTag::SmurfingDisperser,
        };
        let entry = evidence.entry(&hit.account).or_default();
        entry.tags.insert(tag);
        if entry.smurf.is_none() {
            entry.smurf = Some((hit.kind, hit.window_edges, hit.window_hours()));
        }
    }
    for chain in input.shells {
        for account in chain.intermediaries() {
            evidence
                .entry(account)
                .or_default()
                .tags
                .insert(PatternTag::ShellNetwork);
        }
    }

    let velocity: HashSet<&AccountId> = input.velocity.iter().collect();
    for account in &velocity {
        if let Some(entry) = evidence.get_mut(*account) {
            if entry.tags.iter().any(PatternTag::is_structural) {
                entry.tags.insert(PatternTag::HighVelocity);
            }
        }
    }

    // Steps 1–4 for every account.
    let mut scores: HashMap<&AccountId, f64> = HashMap::new();
    for account in graph.accounts() {
        let tags = evidence
            .get(account)
            .map(|e| e.tags.clone())
            .unwrap_or_default();
        let base: f64 = tags.iter().map(PatternTag::weight).sum();
        let mut score = base.min(BASE_SCORE_CAP);
        score += input.anomaly.get(account).copied().unwrap_or(0.0);
        if merchant_suppressed(graph, account) {
            score -= MERCHANT_PENALTY;
        }
        if activity_suppressed(graph, account) {
            score -= ACTIVITY_PENALTY;
        }
        scores.insert(account, score);
    }

    // Step 5: cluster booster over the finished step-4 scores.
    let mut boosted: HashMap<&AccountId, usize> = HashMap::new();
    for account in graph.accounts() {
        let hot = graph
            .counterparties(account)
            .iter()
            .filter(|n| scores.get(n).copied().unwrap_or(0.0) > CLUSTER_NEIGHBOR_SCORE)
            .count();
        if hot >= CLUSTER_MIN_NEIGHBORS {
            boosted.insert(account, hot);
        }
    }
    for (&account, &hot) in &boosted {
        *scores.get_mut(account).expect("scored above") += CLUSTER_BONUS;
        evidence.entry(account).or_default().boost_neighbors = hot;
    }

    // Step 6: clamp, then zero out accounts the anomaly signal alone
    // cannot justify.
    let mut verdicts = Vec::new();
    for account in graph.accounts() {
        let mut score = scores[account].clamp(0.0, SCORE_MAX);
        let entry = evidence.get(account);
        let tags: Vec<PatternTag> = entry
            .map(|e| e.tags.iter().copied().collect())
            .unwrap_or_default();
        if tags.is_empty() {
            let rescued = boosted.contains_key(account) && score >= REPORT_THRESHOLD;
            if !rescued {
                score = 0.0;
            }
        }
        let rounded = score.round() as u32;
        if rounded == 0 {
            continue;
        }
        verdicts.push(AccountVerdict {
            account_id: account.to_string(),
            suspicion_score: rounded,
            detected_patterns: tags.iter().map(|t| t.as_str().to_string()).collect(),
            ring_id: input.rings.ring_id_for(account).map(str::to_string),
            explanation: explanation(account, entry, input.rings),
        });
    }

    verdicts.sort_by(|a, b| {
        b.suspicion_score
            .cmp(&a.suspicion_score)
            .then_with(|| a.account_id.cmp(&b.account_id))
    });
    verdicts
}

/// Short human string derived from the highest-weighted pattern.
fn explanation(account: &AccountId, evidence: Option<&Evidence>, rings: &RingSet) -> String {
    let ring = rings.ring_id_for(account).unwrap_or("no ring");
    let Some(entry) = evidence else {
        return "Flagged through counterparty risk".to_string();
    };
    let top = entry.tags.iter().max_by(|a, b| {
        a.weight()
            .partial_cmp(&b.weight())
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    match top {
        Some(PatternTag::CycleLength3)
        | Some(PatternTag::CycleLength4)
        | Some(PatternTag::CycleLength5) => {
            let (len, hours) = entry.best_cycle.unwrap_or((3, 0.0));
            format!(
                "Part of a {}-account cycle {} closed within {:.0}h",
                len, ring, hours
            )
        }
        Some(PatternTag::SmurfingAggregator) => {
            let (_, edges, hours) = entry
                .smurf
                .unwrap_or((SmurfKind::Aggregator, 0, 0.0));
            format!(
                "Aggregated {} similar-sized transfers over {:.0}h, then dispersed the balance",
                edges, hours
            )
        }
        Some(PatternTag::SmurfingDisperser) => {
            let (_, edges, hours) = entry.smurf.unwrap_or((SmurfKind::Disperser, 0, 0.0));
            format!(
                "Dispersed {} similar-sized transfers within {:.0}h from a narrow funding base",
                edges, hours
            )
        }
        Some(PatternTag::ShellNetwork) => {
            format!("Relay account forwarding inbound value along chain {}", ring)
        }
        Some(PatternTag::HighVelocity) => {
            "Turned inbound funds around within the hour".to_string()
        }
        None => format!(
            "Transacts with {} already-flagged counterparties",
            entry.boost_neighbors
        ),
    }
}

/// Merchant heuristic: a dominant counterparty, regular timing, and
/// enough history. Skipped entirely below ten edges.
fn merchant_suppressed(graph: &FlowGraph, account: &AccountId) -> bool {
    let Some(stats) = graph.node(account) else {
        return false;
    };
    let total = stats.total_degree();
    if total < MERCHANT_MIN_EDGES {
        return false;
    }

    let mut per_counterparty: HashMap<&AccountId, usize> = HashMap::new();
    for &idx in stats.inbound.iter() {
        *per_counterparty.entry(&graph.edge(idx).from).or_insert(0) += 1;
    }
    for &idx in stats.outbound.iter() {
        *per_counterparty.entry(&graph.edge(idx).to).or_insert(0) += 1;
    }
    let top = per_counterparty.values().copied().max().unwrap_or(0);
    if (top as f64) / (total as f64) < MERCHANT_REPEAT_RATIO {
        return false;
    }

    timing_cv(graph, account) < MERCHANT_TIMING_CV_MAX
}

/// CV of inter-arrival times across all the account's edges.
fn timing_cv(graph: &FlowGraph, account: &AccountId) -> f64 {
    let edges = graph.all_edges_sorted(account);
    if edges.len() < 2 {
        return 0.0;
    }
    let gaps: Vec<f64> = edges
        .windows(2)
        .map(|w| {
            (graph.edge(w[1]).timestamp - graph.edge(w[0]).timestamp).num_seconds() as f64
        })
        .collect();
    let mean = gaps.iter().sum::<f64>() / gaps.len() as f64;
    if mean <= f64::EPSILON {
        // All edges at one instant: perfectly regular.
        return 0.0;
    }
    let variance = gaps.iter().map(|g| (g - mean) * (g - mean)).sum::<f64>() / gaps.len() as f64;
    variance.sqrt() / mean
}

/// Always-on heuristic: big, continuously active, irregular amounts,
/// and no meaningful inactivity gap.
fn activity_suppressed(graph: &FlowGraph, account: &AccountId) -> bool {
    let Some(stats) = graph.node(account) else {
        return false;
    };
    if stats.total_degree() <= ACTIVITY_MIN_DEGREE {
        return false;
    }

    let batch_span = graph.span_seconds();
    if batch_span <= 0.0 {
        return false;
    }
    let active_span = stats.lifetime().num_seconds() as f64;
    if active_span / batch_span <= ACTIVITY_SPAN_FRACTION {
        return false;
    }

    if amount_cv(graph, account) <= ACTIVITY_AMOUNT_CV_MIN {
        return false;
    }

    let edges = graph.all_edges_sorted(account);
    let max_gap = edges
        .windows(2)
        .map(|w| {
            (graph.edge(w[1]).timestamp - graph.edge(w[0]).timestamp).num_seconds() as f64
        })
        .fold(0.0_f64, f64::max);
    max_gap < ACTIVITY_GAP_FRACTION * active_span
}

/// CV of all edge amounts at an account, both directions.
fn amount_cv(graph: &FlowGraph, account: &AccountId) -> f64 {
    let edges = graph.all_edges_sorted(account);
    if edges.is_empty() {
        return 0.0;
    }
    let amounts: Vec<f64> = edges.iter().map(|&i| graph.edge(i).amount_f64()).collect();
    let mean = amounts.iter().sum::<f64>() / amounts.len() as f64;
    if mean <= f64::EPSILON {
        return 0.0;
    }
    let variance =
        amounts.iter().map(|a| (a - mean) * (a - mean)).sum::<f64>() / amounts.len() as f64;
    variance.sqrt() / mean
}
