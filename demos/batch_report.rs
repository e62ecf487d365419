//! Full batch report demo.
//!
//! Generates a random background batch, plants two mule triangles on
//! top, and prints the resulting forensic report as JSON.

use forensics_engine::prelude::*;
use forensics_engine::testkit::{generate_random_batch, plant_triangle, BatchConfig};

fn main() {
    env_logger::init();

    let config = BatchConfig {
        account_count: 120,
        transaction_count: 900,
        ..Default::default()
    };
    let mut batch = generate_random_batch(&config);
    plant_triangle(&mut batch, "ALPHA", 2_400);
    plant_triangle(&mut batch, "BETA", 860);

    eprintln!(
        "analyzing {} transactions across ~{} accounts",
        batch.len(),
        config.account_count
    );

    let analysis = ForensicsEngine::new().analyze(batch);

    eprintln!(
        "flagged {} accounts in {} rings ({} self-loops dropped)",
        analysis.report.summary.suspicious_accounts_flagged,
        analysis.report.summary.fraud_rings_detected,
        analysis.diagnostics.self_loops_dropped
    );

    println!("{}", analysis.report.to_json().expect("report serializes"));
}
