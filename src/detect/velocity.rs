use crate::core::account::AccountId;
use crate::graph::flow_graph::FlowGraph;
use chrono::Duration;

/// Outbound must follow inbound within this window.
pub const TURNAROUND_HOURS: i64 = 1;

/// Outbound amount must be at least this fraction of the inbound.
pub const MIN_TURNAROUND_FRACTION: f64 = 0.50;

/// Flag accounts that turn inbound funds around within the hour.
///
/// A merge pass over the two sorted edge lists: for each outbound edge,
/// only inbound edges inside the trailing one-hour window are compared.
/// Returns flagged accounts in ascending id order.
pub fn find_velocity(graph: &FlowGraph) -> Vec<AccountId> {
    let mut flagged = Vec::new();
    let window = Duration::hours(TURNAROUND_HOURS);

    'accounts: for account in graph.accounts() {
        let Some(stats) = graph.node(account) else {
            continue;
        };
        if stats.inbound.is_empty() || stats.outbound.is_empty() {
            continue;
        }
        let mut lo = 0usize;
        for &out_idx in &stats.outbound {
            let out = graph.edge(out_idx);
            while lo < stats.inbound.len()
                && out.timestamp - graph.edge(stats.inbound[lo]).timestamp > window
            {
                lo += 1;
            }
            for &in_idx in &stats.inbound[lo..] {
                let inc = graph.edge(in_idx);
                if inc.timestamp > out.timestamp {
                    break;
                }
                if out.amount_f64() >= MIN_TURNAROUND_FRACTION * inc.amount_f64() {
                    flagged.push(account.clone());
                    continue 'accounts;
                }
            }
        }
    }

    flagged
}
