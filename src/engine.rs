use crate::core::config::EngineConfig;
use crate::core::error::EngineError;
use crate::core::transaction::{Transaction, TransactionRecord};
use crate::detect::{anomaly, cycles, shells, smurfing, velocity};
use crate::graph::flow_graph::FlowGraph;
use crate::score::composer::{compose, ComposerInput};
use crate::score::report::{build_graph_data, build_report, GraphData, Report};
use crate::score::rings::assemble_rings;
use log::{error, info};
use std::collections::BTreeMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::time::Instant;

/// Non-fatal per-batch counters surfaced alongside the report.
#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    pub self_loops_dropped: usize,
    /// Cycle-search starts that hit the per-start DFS step budget.
    pub dfs_budget_exhausted_starts: usize,
    /// True when the global cycle candidate cap stopped the scan.
    pub cycle_candidate_cap_hit: bool,
    /// True when the shell walk hit its global step budget.
    pub shell_budget_exhausted: bool,
    /// Detectors that failed internally and yielded empty results.
    pub detector_failures: BTreeMap<&'static str, u32>,
}

/// Everything one batch run produces.
#[derive(Debug, Clone)]
pub struct Analysis {
    pub report: Report,
    pub graph_data: GraphData,
    pub diagnostics: Diagnostics,
}

/// The batch pipeline: graph build, detectors, composition, report.
///
/// The graph is built once and treated as immutable; detectors consume
/// it read-only and are mutually independent. A detector failure is
/// isolated: it logs, increments a diagnostic counter, and contributes
/// an empty result. Only malformed input aborts a batch.
///
/// # Examples
///
/// ```
/// use forensics_engine::prelude::*;
/// use chrono::NaiveDate;
/// use rust_decimal_macros::dec;
///
/// let t0 = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap().and_hms_opt(0, 0, 0).unwrap();
/// let txns = vec![
///     Transaction::new(TxnId::new("T1"), AccountId::new("A"), AccountId::new("B"), dec!(100), t0).unwrap(),
/// ];
/// let analysis = ForensicsEngine::new().analyze(txns);
/// assert_eq!(analysis.report.summary.total_accounts_analyzed, 2);
/// ```
#[derive(Debug, Clone, Default)]
pub struct ForensicsEngine {
    config: EngineConfig,
}

impl ForensicsEngine {
    pub fn new() -> Self {
        Self {
            config: EngineConfig::default(),
        }
    }

    pub fn with_config(config: EngineConfig) -> Self {
        Self { config }
    }

    /// Parse raw collaborator records, then analyze. Malformed records
    /// are fatal and name the offending transaction.
    pub fn analyze_records(&self, records: &[TransactionRecord]) -> Result<Analysis, EngineError> {
        let transactions = records
            .iter()
            .map(TransactionRecord::parse)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(self.analyze(transactions))
    }

    /// Run the full pipeline over one batch of validated transactions.
    pub fn analyze(&self, transactions: Vec<Transaction>) -> Analysis {
        let started = Instant::now();
        let graph = FlowGraph::build(transactions);

        let mut diagnostics = Diagnostics {
            self_loops_dropped: graph.self_loops_dropped(),
            ..Default::default()
        };

        if graph.is_empty() {
            info!("empty graph: producing zeroed report");
            let rings = assemble_rings(&[], &[], &[]);
            let report = build_report(&graph, Vec::new(), &rings, started.elapsed().as_secs_f64());
            let graph_data = build_graph_data(&graph, &[]);
            return Analysis {
                report,
                graph_data,
                diagnostics,
            };
        }

        let cycle_scan = run_isolated("cycles", &mut diagnostics, || {
            cycles::find_cycles(&graph, &self.config)
        })
        .unwrap_or_default();
        diagnostics.dfs_budget_exhausted_starts = cycle_scan.starts_budget_exhausted;
        diagnostics.cycle_candidate_cap_hit = cycle_scan.candidate_cap_hit;

        let smurf_hits = run_isolated("smurfing", &mut diagnostics, || {
            smurfing::find_smurfing(&graph)
        })
        .unwrap_or_default();

        let shell_scan = run_isolated("shells", &mut diagnostics, || {
            shells::find_shell_chains(&graph, &self.config)
        })
        .unwrap_or_default();
        diagnostics.shell_budget_exhausted = shell_scan.budget_exhausted;

        let velocity_hits = run_isolated("velocity", &mut diagnostics, || {
            velocity::find_velocity(&graph)
        })
        .unwrap_or_default();

        let anomaly_scores = run_isolated("anomaly", &mut diagnostics, || {
            anomaly::anomaly_scores(&graph, &self.config)
        })
        .unwrap_or_default();

        let rings = assemble_rings(&cycle_scan.cycles, &smurf_hits, &shell_scan.chains);
        let verdicts = compose(&ComposerInput {
            graph: &graph,
            cycles: &cycle_scan.cycles,
            smurfs: &smurf_hits,
            shells: &shell_scan.chains,
            velocity: &velocity_hits,
            anomaly: &anomaly_scores,
            rings: &rings,
        });

        let graph_data = build_graph_data(&graph, &verdicts);
        let report = build_report(&graph, verdicts, &rings, started.elapsed().as_secs_f64());
        info!(
            "analyzed {} accounts / {} transactions: {} flagged, {} rings",
            report.summary.total_accounts_analyzed,
            graph.edge_count(),
            report.summary.suspicious_accounts_flagged,
            report.summary.fraud_rings_detected,
        );

        Analysis {
            report,
            graph_data,
            diagnostics,
        }
    }
}

/// Run one detector, translating an internal panic into an empty result
/// plus a failure counter.
fn run_isolated<T>(
    name: &'static str,
    diagnostics: &mut Diagnostics,
    detector: impl FnOnce() -> T,
) -> Option<T> {
    match catch_unwind(AssertUnwindSafe(detector)) {
        Ok(result) => Some(result),
        Err(_) => {
            error!("detector '{}' failed; continuing with empty result", name);
            *diagnostics.detector_failures.entry(name).or_insert(0) += 1;
            None
        }
    }
}
