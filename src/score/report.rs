use crate::graph::flow_graph::FlowGraph;
use crate::score::composer::AccountVerdict;
use crate::score::rings::RingSet;
use rust_decimal::prelude::ToPrimitive;
use serde::Serialize;
use std::collections::HashMap;

/// Top-level forensic report, serialized for the upload collaborator.
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub summary: Summary,
    pub fraud_rings: Vec<RingReport>,
    pub suspicious_accounts: Vec<AccountVerdict>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Summary {
    pub total_accounts_analyzed: usize,
    pub suspicious_accounts_flagged: usize,
    pub fraud_rings_detected: usize,
    pub processing_time_seconds: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct RingReport {
    pub ring_id: String,
    pub pattern_type: String,
    pub member_accounts: Vec<String>,
    pub risk_score: u32,
}

impl Report {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// Assemble the report from composed verdicts and rings.
///
/// Ring risk is the maximum member suspicion after clamping; members
/// absent from the ranked list count as zero.
pub fn build_report(
    graph: &FlowGraph,
    verdicts: Vec<AccountVerdict>,
    rings: &RingSet,
    processing_time_seconds: f64,
) -> Report {
    let score_of: HashMap<&str, u32> = verdicts
        .iter()
        .map(|v| (v.account_id.as_str(), v.suspicion_score))
        .collect();

    let fraud_rings: Vec<RingReport> = rings
        .rings
        .iter()
        .map(|ring| RingReport {
            ring_id: ring.id.clone(),
            pattern_type: ring.kind.pattern_type().to_string(),
            member_accounts: ring.members.iter().map(|m| m.to_string()).collect(),
            risk_score: ring
                .members
                .iter()
                .map(|m| score_of.get(m.as_str()).copied().unwrap_or(0))
                .max()
                .unwrap_or(0),
        })
        .collect();

    Report {
        summary: Summary {
            total_accounts_analyzed: graph.account_count(),
            suspicious_accounts_flagged: verdicts.len(),
            fraud_rings_detected: fraud_rings.len(),
            processing_time_seconds,
        },
        fraud_rings,
        suspicious_accounts: verdicts,
    }
}

/// Node/edge payload for the visualization collaborator.
#[derive(Debug, Clone, Serialize)]
pub struct GraphData {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GraphNode {
    pub id: String,
    pub label: String,
    pub suspicion_score: u32,
    pub in_degree: usize,
    pub out_degree: usize,
    pub total_incoming: f64,
    pub total_outgoing: f64,
    pub detected_patterns: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GraphEdge {
    pub from: String,
    pub to: String,
    pub value: f64,
    pub title: String,
}

/// Every account becomes a node (ascending id); every edge a
/// timestamp-ordered entry.
pub fn build_graph_data(graph: &FlowGraph, verdicts: &[AccountVerdict]) -> GraphData {
    let verdict_of: HashMap<&str, &AccountVerdict> = verdicts
        .iter()
        .map(|v| (v.account_id.as_str(), v))
        .collect();

    let nodes = graph
        .accounts()
        .iter()
        .map(|account| {
            let stats = graph.node(account).expect("account listed but missing");
            let verdict = verdict_of.get(account.as_str());
            GraphNode {
                id: account.to_string(),
                label: account.to_string(),
                suspicion_score: verdict.map(|v| v.suspicion_score).unwrap_or(0),
                in_degree: stats.in_degree(),
                out_degree: stats.out_degree(),
                total_incoming: stats.volume_in.to_f64().unwrap_or(0.0),
                total_outgoing: stats.volume_out.to_f64().unwrap_or(0.0),
                detected_patterns: verdict
                    .map(|v| v.detected_patterns.clone())
                    .unwrap_or_default(),
            }
        })
        .collect();

    let mut order: Vec<usize> = (0..graph.edge_count()).collect();
    order.sort_by(|&a, &b| {
        let ea = graph.edge(a);
        let eb = graph.edge(b);
        (ea.timestamp, &ea.txn_id).cmp(&(eb.timestamp, &eb.txn_id))
    });
    let edges = order
        .into_iter()
        .map(|idx| {
            let edge = graph.edge(idx);
            GraphEdge {
                from: edge.from.to_string(),
                to: edge.to.to_string(),
                value: edge.amount_f64(),
                title: format!("{}: {} at {}", edge.txn_id, edge.amount, edge.timestamp),
            }
        })
        .collect();

    GraphData { nodes, edges }
}
