//! Triangle ring walkthrough.
//!
//! Three accounts route a similar amount around within two hours; the
//! engine flags all of them and groups them into one cycle ring.

use chrono::{Duration, NaiveDate};
use forensics_engine::prelude::*;
use rust_decimal_macros::dec;

fn main() {
    env_logger::init();

    let t0 = NaiveDate::from_ymd_opt(2024, 3, 1)
        .unwrap()
        .and_hms_opt(9, 0, 0)
        .unwrap();

    println!("Transactions:");
    println!("  A → B  $1000  09:00");
    println!("  B → C  $980   10:00");
    println!("  C → A  $1010  11:00\n");

    let transactions = vec![
        Transaction::new(
            TxnId::new("TX-1"),
            AccountId::new("A"),
            AccountId::new("B"),
            dec!(1000),
            t0,
        )
        .unwrap(),
        Transaction::new(
            TxnId::new("TX-2"),
            AccountId::new("B"),
            AccountId::new("C"),
            dec!(980),
            t0 + Duration::hours(1),
        )
        .unwrap(),
        Transaction::new(
            TxnId::new("TX-3"),
            AccountId::new("C"),
            AccountId::new("A"),
            dec!(1010),
            t0 + Duration::hours(2),
        )
        .unwrap(),
    ];

    let analysis = ForensicsEngine::new().analyze(transactions);
    let report = &analysis.report;

    println!("━━━ Rings ━━━\n");
    for ring in &report.fraud_rings {
        println!(
            "  {} ({}) — members: {}, risk {}",
            ring.ring_id,
            ring.pattern_type,
            ring.member_accounts.join(", "),
            ring.risk_score
        );
    }

    println!("\n━━━ Ranked accounts ━━━\n");
    for verdict in &report.suspicious_accounts {
        println!(
            "  {:<4} score {:>3}  [{}]",
            verdict.account_id,
            verdict.suspicion_score,
            verdict.detected_patterns.join(", ")
        );
        println!("        {}", verdict.explanation);
    }
}
