use crate::core::account::AccountId;
use crate::core::transaction::{Transaction, TxnId};
use chrono::{Duration, NaiveDateTime};
use log::warn;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::collections::{HashMap, HashSet};

/// A single directed edge in the flow graph: one transaction.
///
/// Parallel edges between the same (sender, receiver) pair are kept
/// separate; the graph is a true multi-graph.
#[derive(Debug, Clone)]
pub struct Edge {
    pub txn_id: TxnId,
    pub from: AccountId,
    pub to: AccountId,
    pub amount: Decimal,
    pub timestamp: NaiveDateTime,
}

impl Edge {
    /// Amount as `f64` for statistical computations. Amounts are
    /// positive and well within f64 range, so the conversion is lossless
    /// for detection purposes.
    pub fn amount_f64(&self) -> f64 {
        self.amount.to_f64().unwrap_or(0.0)
    }
}

/// Cached per-account view of the graph.
///
/// Edge lists hold indices into the flat edge table, sorted by
/// `(timestamp, txn_id)`. They are built once per batch and never
/// mutated afterwards.
#[derive(Debug, Clone)]
pub struct NodeStats {
    pub inbound: Vec<usize>,
    pub outbound: Vec<usize>,
    pub volume_in: Decimal,
    pub volume_out: Decimal,
    pub first_seen: NaiveDateTime,
    pub last_seen: NaiveDateTime,
}

impl NodeStats {
    fn new(seen: NaiveDateTime) -> Self {
        Self {
            inbound: Vec::new(),
            outbound: Vec::new(),
            volume_in: Decimal::ZERO,
            volume_out: Decimal::ZERO,
            first_seen: seen,
            last_seen: seen,
        }
    }

    pub fn in_degree(&self) -> usize {
        self.inbound.len()
    }

    pub fn out_degree(&self) -> usize {
        self.outbound.len()
    }

    pub fn total_degree(&self) -> usize {
        self.inbound.len() + self.outbound.len()
    }

    /// Active span of the account: last seen minus first seen.
    pub fn lifetime(&self) -> Duration {
        self.last_seen - self.first_seen
    }
}

/// Directed multi-graph over one transaction batch.
///
/// Nodes are accounts, edges are transactions. Construction is O(E)
/// plus the per-node edge-list sorts; after construction the graph is
/// immutable and every detector reads it concurrently-safe.
///
/// # Examples
///
/// ```
/// use forensics_engine::core::account::AccountId;
/// use forensics_engine::core::transaction::{Transaction, TxnId};
/// use forensics_engine::graph::flow_graph::FlowGraph;
/// use chrono::NaiveDate;
/// use rust_decimal_macros::dec;
///
/// let t0 = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap().and_hms_opt(0, 0, 0).unwrap();
/// let txns = vec![
///     Transaction::new(TxnId::new("T1"), AccountId::new("A"), AccountId::new("B"), dec!(100), t0).unwrap(),
/// ];
/// let graph = FlowGraph::build(txns);
/// assert_eq!(graph.account_count(), 2);
/// assert_eq!(graph.edge_count(), 1);
/// ```
#[derive(Debug, Clone)]
pub struct FlowGraph {
    edges: Vec<Edge>,
    nodes: HashMap<AccountId, NodeStats>,
    /// All accounts, ascending. Fixed iteration order for determinism.
    accounts: Vec<AccountId>,
    self_loops_dropped: usize,
}

impl FlowGraph {
    /// Build the graph from a batch of validated transactions.
    ///
    /// Input order is irrelevant: edge lists are ordered by timestamp
    /// with `txn_id` breaking ties. Self-loops are dropped with a
    /// warning count.
    pub fn build(transactions: Vec<Transaction>) -> Self {
        let mut edges = Vec::with_capacity(transactions.len());
        let mut self_loops_dropped = 0usize;

        for txn in transactions {
            if txn.is_self_loop() {
                self_loops_dropped += 1;
                continue;
            }
            edges.push(Edge {
                txn_id: txn.txn_id().clone(),
                from: txn.sender().clone(),
                to: txn.receiver().clone(),
                amount: txn.amount(),
                timestamp: txn.timestamp(),
            });
        }
        if self_loops_dropped > 0 {
            warn!("dropped {} self-loop transaction(s)", self_loops_dropped);
        }

        let mut nodes: HashMap<AccountId, NodeStats> = HashMap::new();
        for (idx, edge) in edges.iter().enumerate() {
            let from = nodes
                .entry(edge.from.clone())
                .or_insert_with(|| NodeStats::new(edge.timestamp));
            from.outbound.push(idx);
            from.volume_out += edge.amount;
            from.first_seen = from.first_seen.min(edge.timestamp);
            from.last_seen = from.last_seen.max(edge.timestamp);

            let to = nodes
                .entry(edge.to.clone())
                .or_insert_with(|| NodeStats::new(edge.timestamp));
            to.inbound.push(idx);
            to.volume_in += edge.amount;
            to.first_seen = to.first_seen.min(edge.timestamp);
            to.last_seen = to.last_seen.max(edge.timestamp);
        }

        for stats in nodes.values_mut() {
            stats
                .inbound
                .sort_by(|&a, &b| edge_key(&edges[a]).cmp(&edge_key(&edges[b])));
            stats
                .outbound
                .sort_by(|&a, &b| edge_key(&edges[a]).cmp(&edge_key(&edges[b])));
        }

        let mut accounts: Vec<AccountId> = nodes.keys().cloned().collect();
        accounts.sort();

        Self {
            edges,
            nodes,
            accounts,
            self_loops_dropped,
        }
    }

    /// All accounts in ascending id order.
    pub fn accounts(&self) -> &[AccountId] {
        &self.accounts
    }

    pub fn node(&self, account: &AccountId) -> Option<&NodeStats> {
        self.nodes.get(account)
    }

    pub fn edge(&self, idx: usize) -> &Edge {
        &self.edges[idx]
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn account_count(&self) -> usize {
        self.accounts.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    pub fn self_loops_dropped(&self) -> usize {
        self.self_loops_dropped
    }

    /// Earliest and latest timestamp in the batch, if any edge exists.
    pub fn span(&self) -> Option<(NaiveDateTime, NaiveDateTime)> {
        let first = self.edges.iter().map(|e| e.timestamp).min()?;
        let last = self.edges.iter().map(|e| e.timestamp).max()?;
        Some((first, last))
    }

    /// Batch span in seconds; zero for empty or single-instant batches.
    pub fn span_seconds(&self) -> f64 {
        match self.span() {
            Some((first, last)) => (last - first).num_milliseconds() as f64 / 1_000.0,
            None => 0.0,
        }
    }

    /// Distinct counterparties of an account (either direction),
    /// ascending.
    pub fn counterparties(&self, account: &AccountId) -> Vec<AccountId> {
        let mut out: Vec<AccountId> = match self.nodes.get(account) {
            Some(stats) => stats
                .inbound
                .iter()
                .map(|&i| self.edges[i].from.clone())
                .chain(stats.outbound.iter().map(|&i| self.edges[i].to.clone()))
                .collect(),
            None => return Vec::new(),
        };
        out.sort();
        out.dedup();
        out
    }

    /// Count counterparties of `account` outside `members` that have at
    /// least one edge with the account inside `[start, end]`.
    pub fn external_neighbors_within(
        &self,
        account: &AccountId,
        start: NaiveDateTime,
        end: NaiveDateTime,
        members: &HashSet<&AccountId>,
    ) -> usize {
        let Some(stats) = self.nodes.get(account) else {
            return 0;
        };
        let mut seen: HashSet<&AccountId> = HashSet::new();
        for &idx in stats.inbound.iter().chain(stats.outbound.iter()) {
            let edge = &self.edges[idx];
            if edge.timestamp < start || edge.timestamp > end {
                continue;
            }
            let other = if edge.from == *account {
                &edge.to
            } else {
                &edge.from
            };
            if !members.contains(other) {
                seen.insert(other);
            }
        }
        seen.len()
    }

    /// All edge indices touching an account, merged across both
    /// directions and ordered by `(timestamp, txn_id)`.
    pub fn all_edges_sorted(&self, account: &AccountId) -> Vec<usize> {
        let Some(stats) = self.nodes.get(account) else {
            return Vec::new();
        };
        let mut merged = Vec::with_capacity(stats.total_degree());
        let (mut i, mut j) = (0usize, 0usize);
        while i < stats.inbound.len() && j < stats.outbound.len() {
            let a = stats.inbound[i];
            let b = stats.outbound[j];
            if edge_key(&self.edges[a]) <= edge_key(&self.edges[b]) {
                merged.push(a);
                i += 1;
            } else {
                merged.push(b);
                j += 1;
            }
        }
        merged.extend_from_slice(&stats.inbound[i..]);
        merged.extend_from_slice(&stats.outbound[j..]);
        merged
    }
}

fn edge_key(edge: &Edge) -> (NaiveDateTime, &TxnId) {
    (edge.timestamp, &edge.txn_id)
}
