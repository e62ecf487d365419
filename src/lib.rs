//! # forensics-engine
//!
//! Transaction forensics engine for money-mule detection.
//!
//! Given a batch of financial transactions, the engine builds a directed
//! multi-graph, runs four pattern detectors (circular flows, structuring,
//! passthrough shell chains, in-and-out velocity) plus an unsupervised
//! anomaly model, and composes a bounded 0–100 suspicion score per
//! account. Co-implicated accounts are grouped into named rings.
//!
//! ## Architecture
//!
//! - **core** — Foundational types: accounts, transactions, config, errors
//! - **graph** — The immutable flow multi-graph and union-find
//! - **detect** — Cycle, smurfing, shell, velocity, and anomaly detectors
//! - **score** — Suspicion composition, rings, and report shaping
//! - **engine** — The batch pipeline tying it all together

pub mod core;
pub mod detect;
pub mod engine;
pub mod graph;
pub mod score;
pub mod testkit;

/// Convenience re-exports for common usage.
pub mod prelude {
    pub use crate::core::account::AccountId;
    pub use crate::core::config::EngineConfig;
    pub use crate::core::error::EngineError;
    pub use crate::core::transaction::{Transaction, TransactionRecord, TxnId};
    pub use crate::engine::{Analysis, Diagnostics, ForensicsEngine};
    pub use crate::graph::flow_graph::FlowGraph;
    pub use crate::score::report::{GraphData, Report};
}
