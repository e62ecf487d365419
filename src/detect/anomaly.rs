use crate::core::account::AccountId;
use crate::core::config::EngineConfig;
use crate::graph::flow_graph::FlowGraph;
use rand::rngs::StdRng;
use rand::seq::index::sample;
use rand::{Rng, SeedableRng};
use rust_decimal::prelude::ToPrimitive;
use std::collections::HashMap;

/// Maximum points the anomaly signal can contribute to a score.
pub const ANOMALY_SCALE: f64 = 15.0;

/// Per-node features: in-degree, out-degree, volume in, volume out.
const FEATURE_COUNT: usize = 4;

const EULER_MASCHERONI: f64 = 0.577_215_664_901_532_9;

/// Score every account with an isolation forest over degree/volume
/// features, min-max normalized across the batch to `0..=15`.
///
/// The signal is advisory: composition rules prevent it from flagging
/// an account on its own. Scores are deterministic for a given seed;
/// accounts are processed in ascending id order.
pub fn anomaly_scores(graph: &FlowGraph, config: &EngineConfig) -> HashMap<AccountId, f64> {
    let accounts = graph.accounts();
    let n = accounts.len();
    if n < 2 {
        return accounts
            .iter()
            .map(|a| (a.clone(), 0.0))
            .collect();
    }

    let features: Vec<[f64; FEATURE_COUNT]> = accounts
        .iter()
        .map(|account| {
            let stats = graph.node(account).expect("account listed but missing");
            [
                stats.in_degree() as f64,
                stats.out_degree() as f64,
                stats.volume_in.to_f64().unwrap_or(0.0),
                stats.volume_out.to_f64().unwrap_or(0.0),
            ]
        })
        .collect();

    let mut rng = StdRng::seed_from_u64(config.anomaly_seed);
    let sample_size = config.anomaly_sample.min(n).max(2);
    let height_limit = (sample_size as f64).log2().ceil() as usize;

    let trees: Vec<IsoNode> = (0..config.anomaly_trees)
        .map(|_| {
            let indices: Vec<usize> = sample(&mut rng, n, sample_size).into_vec();
            build_tree(&features, &indices, 0, height_limit, &mut rng)
        })
        .collect();

    let expected = average_path_length(sample_size);
    let raw: Vec<f64> = features
        .iter()
        .map(|point| {
            let mean_path: f64 = trees
                .iter()
                .map(|tree| path_length(tree, point, 0))
                .sum::<f64>()
                / trees.len() as f64;
            2.0_f64.powf(-mean_path / expected)
        })
        .collect();

    let min = raw.iter().cloned().fold(f64::INFINITY, f64::min);
    let max = raw.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let spread = max - min;

    accounts
        .iter()
        .zip(raw)
        .map(|(account, score)| {
            let normalized = if spread <= f64::EPSILON {
                0.0
            } else {
                (score - min) / spread * ANOMALY_SCALE
            };
            (account.clone(), normalized)
        })
        .collect()
}

enum IsoNode {
    Split {
        dim: usize,
        value: f64,
        left: Box<IsoNode>,
        right: Box<IsoNode>,
    },
    Leaf {
        size: usize,
    },
}

fn build_tree(
    features: &[[f64; FEATURE_COUNT]],
    indices: &[usize],
    depth: usize,
    height_limit: usize,
    rng: &mut StdRng,
) -> IsoNode {
    if depth >= height_limit || indices.len() <= 1 {
        return IsoNode::Leaf {
            size: indices.len(),
        };
    }

    // Only dimensions with actual spread can split this partition.
    let mut splittable: Vec<(usize, f64, f64)> = Vec::with_capacity(FEATURE_COUNT);
    for dim in 0..FEATURE_COUNT {
        let mut lo = f64::INFINITY;
        let mut hi = f64::NEG_INFINITY;
        for &i in indices.iter() {
            lo = lo.min(features[i][dim]);
            hi = hi.max(features[i][dim]);
        }
        if hi > lo {
            splittable.push((dim, lo, hi));
        }
    }
    if splittable.is_empty() {
        return IsoNode::Leaf {
            size: indices.len(),
        };
    }
    let (dim, lo, hi) = splittable[rng.gen_range(0..splittable.len())];

    let value = rng.gen_range(lo..hi);
    let mut left: Vec<usize> = Vec::new();
    let mut right: Vec<usize> = Vec::new();
    for &i in indices.iter() {
        if features[i][dim] < value {
            left.push(i);
        } else {
            right.push(i);
        }
    }
    if left.is_empty() || right.is_empty() {
        return IsoNode::Leaf {
            size: indices.len(),
        };
    }

    IsoNode::Split {
        dim,
        value,
        left: Box::new(build_tree(features, &left, depth + 1, height_limit, rng)),
        right: Box::new(build_tree(features, &right, depth + 1, height_limit, rng)),
    }
}

fn path_length(node: &IsoNode, point: &[f64; FEATURE_COUNT], depth: usize) -> f64 {
    match node {
        IsoNode::Leaf { size } => depth as f64 + average_path_length(*size),
        IsoNode::Split {
            dim,
            value,
            left,
            right,
        } => {
            if point[*dim] < *value {
                path_length(left, point, depth + 1)
            } else {
                path_length(right, point, depth + 1)
            }
        }
    }
}

/// Expected path length of an unsuccessful BST search over `n` points;
/// the standard isolation-forest normalizer.
fn average_path_length(n: usize) -> f64 {
    match n {
        0 | 1 => 0.0,
        2 => 1.0,
        _ => {
            let n = n as f64;
            2.0 * ((n - 1.0).ln() + EULER_MASCHERONI) - 2.0 * (n - 1.0) / n
        }
    }
}
