use crate::core::account::AccountId;
use crate::graph::flow_graph::FlowGraph;
use chrono::{Duration, NaiveDateTime};
use std::collections::HashSet;

/// Sliding window length for both scans, in hours.
pub const WINDOW_HOURS: i64 = 72;

/// Minimum edges inside a window for either scan.
pub const MIN_WINDOW_EDGES: usize = 10;

/// Coefficient-of-variation ceiling for "similarly sized" amounts.
pub const MAX_AMOUNT_CV: f64 = 0.40;

/// Aggregator: minimum outbound edges following the window.
pub const MIN_DISPERSAL_EDGES: usize = 5;

/// Aggregator: outbound edges count up to this long after window close.
pub const DISPERSAL_TAIL_HOURS: i64 = 48;

/// Aggregator: at most this fraction of inbound value may be retained.
pub const MAX_RETENTION: f64 = 0.50;

/// Mean holding time ceiling, in hours.
pub const MAX_HOLDING_HOURS: f64 = 30.0;

/// Disperser: maximum distinct funding counterparties.
pub const MAX_FUNDING_SOURCES: usize = 2;

/// Disperser: funding phase reaches back this far before window close.
pub const FUNDING_LOOKBACK_HOURS: i64 = 72;

/// Which side of a smurfing operation an account played.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SmurfKind {
    /// Fan-in: many similar inbound transfers, then dispersal.
    Aggregator,
    /// Fan-out: many similar outbound transfers from a narrow source.
    Disperser,
}

/// A qualifying smurfing window at one hub account.
#[derive(Debug, Clone)]
pub struct SmurfHit {
    pub account: AccountId,
    pub kind: SmurfKind,
    pub window_start: NaiveDateTime,
    pub window_end: NaiveDateTime,
    /// Edges inside the qualifying window.
    pub window_edges: usize,
    /// Amount CV of the winning window (lowest across candidates).
    pub cv: f64,
    /// Distinct counterparties seen in the hit, ascending, hub excluded.
    pub counterparties: Vec<AccountId>,
}

impl SmurfHit {
    pub fn window_hours(&self) -> f64 {
        (self.window_end - self.window_start).num_seconds() as f64 / 3_600.0
    }
}

/// One direction of an account's edge list, unpacked for windowed
/// statistics. Prefix sums make per-window mean/CV amortized O(1).
struct Series {
    ids: Vec<usize>,
    ts: Vec<NaiveDateTime>,
    prefix_sum: Vec<f64>,
    prefix_sumsq: Vec<f64>,
}

impl Series {
    fn inbound(graph: &FlowGraph, account: &AccountId) -> Self {
        let ids = graph
            .node(account)
            .map(|n| n.inbound.clone())
            .unwrap_or_default();
        Self::from_ids(graph, ids)
    }

    fn outbound(graph: &FlowGraph, account: &AccountId) -> Self {
        let ids = graph
            .node(account)
            .map(|n| n.outbound.clone())
            .unwrap_or_default();
        Self::from_ids(graph, ids)
    }

    fn from_ids(graph: &FlowGraph, ids: Vec<usize>) -> Self {
        let ts: Vec<NaiveDateTime> = ids.iter().map(|&i| graph.edge(i).timestamp).collect();
        let mut prefix_sum = Vec::with_capacity(ids.len() + 1);
        let mut prefix_sumsq = Vec::with_capacity(ids.len() + 1);
        let (mut sum, mut sumsq) = (0.0, 0.0);
        prefix_sum.push(sum);
        prefix_sumsq.push(sumsq);
        for &i in &ids {
            let a = graph.edge(i).amount_f64();
            sum += a;
            sumsq += a * a;
            prefix_sum.push(sum);
            prefix_sumsq.push(sumsq);
        }
        Self {
            ids,
            ts,
            prefix_sum,
            prefix_sumsq,
        }
    }

    fn len(&self) -> usize {
        self.ids.len()
    }

    /// Sum of amounts over the inclusive index range.
    fn sum(&self, lo: usize, hi: usize) -> f64 {
        self.prefix_sum[hi + 1] - self.prefix_sum[lo]
    }

    /// Coefficient of variation over the inclusive index range.
    /// Near-zero means cannot qualify and report infinity.
    fn cv(&self, lo: usize, hi: usize) -> f64 {
        let n = (hi - lo + 1) as f64;
        let mean = self.sum(lo, hi) / n;
        if mean <= f64::EPSILON {
            return f64::INFINITY;
        }
        let sumsq = self.prefix_sumsq[hi + 1] - self.prefix_sumsq[lo];
        let variance = (sumsq / n - mean * mean).max(0.0);
        variance.sqrt() / mean
    }

    /// Index of the first timestamp `>= at`.
    fn first_at_or_after(&self, at: NaiveDateTime) -> usize {
        self.ts.partition_point(|&t| t < at)
    }

    /// Index one past the last timestamp `<= at`.
    fn first_after(&self, at: NaiveDateTime) -> usize {
        self.ts.partition_point(|&t| t <= at)
    }

    /// Index of the last timestamp `<= at`, if any.
    fn last_at_or_before(&self, at: NaiveDateTime) -> Option<usize> {
        let n = self.first_after(at);
        n.checked_sub(1)
    }
}

/// Scan every account for aggregator and disperser behavior.
///
/// Both scans slide a 72 h window one edge at a time over the sorted
/// edge lists. Overlapping qualifying windows collapse to a single hit
/// per account and kind; the window with the lowest amount CV wins.
pub fn find_smurfing(graph: &FlowGraph) -> Vec<SmurfHit> {
    let mut hits = Vec::new();
    for account in graph.accounts() {
        if let Some(hit) = scan_aggregator(graph, account) {
            hits.push(hit);
        }
        if let Some(hit) = scan_disperser(graph, account) {
            hits.push(hit);
        }
    }
    hits
}

fn scan_aggregator(graph: &FlowGraph, account: &AccountId) -> Option<SmurfHit> {
    let inbound = Series::inbound(graph, account);
    if inbound.len() < MIN_WINDOW_EDGES {
        return None;
    }
    let outbound = Series::outbound(graph, account);
    let window = Duration::hours(WINDOW_HOURS);
    let tail = Duration::hours(DISPERSAL_TAIL_HOURS);

    let mut best: Option<SmurfHit> = None;
    let mut j = 0usize;
    for i in 0..inbound.len() {
        if j < i {
            j = i;
        }
        while j + 1 < inbound.len() && inbound.ts[j + 1] - inbound.ts[i] <= window {
            j += 1;
        }
        let count = j - i + 1;
        if count < MIN_WINDOW_EDGES {
            continue;
        }
        let cv = inbound.cv(i, j);
        if cv > MAX_AMOUNT_CV {
            continue;
        }
        if let Some(prev) = &best {
            if prev.cv <= cv {
                continue;
            }
        }

        let close = inbound.ts[j];
        let out_lo = outbound.first_at_or_after(inbound.ts[i]);
        let out_hi = outbound.first_after(close + tail);
        if out_hi - out_lo < MIN_DISPERSAL_EDGES {
            continue;
        }

        let in_sum = inbound.sum(i, j);
        let out_sum = outbound.sum(out_lo, out_hi - 1);
        if 1.0 - out_sum / in_sum > MAX_RETENTION {
            continue;
        }

        if mean_holding_hours(&inbound, &outbound.ts[out_lo..out_hi]) > MAX_HOLDING_HOURS {
            continue;
        }

        let mut counterparties: Vec<AccountId> = inbound.ids[i..=j]
            .iter()
            .map(|&e| graph.edge(e).from.clone())
            .chain(
                outbound.ids[out_lo..out_hi]
                    .iter()
                    .map(|&e| graph.edge(e).to.clone()),
            )
            .collect();
        counterparties.sort();
        counterparties.dedup();

        best = Some(SmurfHit {
            account: account.clone(),
            kind: SmurfKind::Aggregator,
            window_start: inbound.ts[i],
            window_end: close,
            window_edges: count,
            cv,
            counterparties,
        });
    }
    best
}

fn scan_disperser(graph: &FlowGraph, account: &AccountId) -> Option<SmurfHit> {
    let outbound = Series::outbound(graph, account);
    if outbound.len() < MIN_WINDOW_EDGES {
        return None;
    }
    let inbound = Series::inbound(graph, account);
    let window = Duration::hours(WINDOW_HOURS);
    let lookback = Duration::hours(FUNDING_LOOKBACK_HOURS);

    let mut best: Option<SmurfHit> = None;
    let mut j = 0usize;
    for i in 0..outbound.len() {
        if j < i {
            j = i;
        }
        while j + 1 < outbound.len() && outbound.ts[j + 1] - outbound.ts[i] <= window {
            j += 1;
        }
        let count = j - i + 1;
        if count < MIN_WINDOW_EDGES {
            continue;
        }
        let cv = outbound.cv(i, j);
        if cv > MAX_AMOUNT_CV {
            continue;
        }
        if let Some(prev) = &best {
            if prev.cv <= cv {
                continue;
            }
        }

        // Funding phase: inbound activity in the 72 h leading up to the
        // window close must come from a narrow set of sources.
        let fund_lo = inbound.first_at_or_after(outbound.ts[i] - lookback);
        let fund_hi = inbound.first_after(outbound.ts[j]);
        if fund_hi <= fund_lo {
            continue;
        }
        let sources: HashSet<&AccountId> = inbound.ids[fund_lo..fund_hi]
            .iter()
            .map(|&e| &graph.edge(e).from)
            .collect();
        if sources.len() > MAX_FUNDING_SOURCES {
            continue;
        }

        if mean_holding_hours(&inbound, &outbound.ts[i..=j]) > MAX_HOLDING_HOURS {
            continue;
        }

        let mut counterparties: Vec<AccountId> = outbound.ids[i..=j]
            .iter()
            .map(|&e| graph.edge(e).to.clone())
            .chain(
                inbound.ids[fund_lo..fund_hi]
                    .iter()
                    .map(|&e| graph.edge(e).from.clone()),
            )
            .collect();
        counterparties.sort();
        counterparties.dedup();

        best = Some(SmurfHit {
            account: account.clone(),
            kind: SmurfKind::Disperser,
            window_start: outbound.ts[i],
            window_end: outbound.ts[j],
            window_edges: count,
            cv,
            counterparties,
        });
    }
    best
}

/// Mean gap in hours between each outbound timestamp and the nearest
/// earlier inbound edge. Infinity when no outbound edge has a
/// predecessor, which disqualifies the window.
fn mean_holding_hours(inbound: &Series, out_ts: &[NaiveDateTime]) -> f64 {
    let mut total = 0.0;
    let mut n = 0usize;
    for &at in out_ts {
        let Some(pred) = inbound.last_at_or_before(at) else {
            continue;
        };
        total += (at - inbound.ts[pred]).num_seconds() as f64 / 3_600.0;
        n += 1;
    }
    if n == 0 {
        return f64::INFINITY;
    }
    total / n as f64
}
