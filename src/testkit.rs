//! Synthetic batch generation for tests and benchmarks.
//!
//! Generates random transaction batches, optionally with a planted
//! mule ring, to exercise the detectors at size.

use crate::core::account::AccountId;
use crate::core::transaction::{Transaction, TxnId};
use chrono::{Duration, NaiveDate, NaiveDateTime};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_decimal::Decimal;

/// Configuration for generating a random transaction batch.
#[derive(Debug, Clone)]
pub struct BatchConfig {
    /// Number of accounts in the population.
    pub account_count: usize,
    /// Number of transactions to generate.
    pub transaction_count: usize,
    /// Minimum transaction amount.
    pub min_amount: f64,
    /// Maximum transaction amount.
    pub max_amount: f64,
    /// Batch time span in hours; timestamps are uniform within it.
    pub span_hours: i64,
    /// Seed for reproducible batches.
    pub seed: u64,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            account_count: 50,
            transaction_count: 400,
            min_amount: 10.0,
            max_amount: 25_000.0,
            span_hours: 24 * 30,
            seed: 7,
        }
    }
}

/// Anchor instant for generated timestamps.
pub fn base_time() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 3, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .expect("valid anchor date")
}

/// Generate a random batch of transactions.
pub fn generate_random_batch(config: &BatchConfig) -> Vec<Transaction> {
    let mut rng = StdRng::seed_from_u64(config.seed);
    let accounts: Vec<AccountId> = (0..config.account_count)
        .map(|i| AccountId::new(format!("ACC-{:04}", i)))
        .collect();

    let mut transactions = Vec::with_capacity(config.transaction_count);
    for i in 0..config.transaction_count {
        let sender_idx = rng.gen_range(0..accounts.len());
        let mut receiver_idx = rng.gen_range(0..accounts.len());
        while receiver_idx == sender_idx {
            receiver_idx = rng.gen_range(0..accounts.len());
        }

        let amount_f64 = rng.gen_range(config.min_amount..config.max_amount);
        let amount = Decimal::from_f64_retain(amount_f64)
            .unwrap_or_else(|| Decimal::from(100))
            .round_dp(2);
        let at = base_time() + Duration::minutes(rng.gen_range(0..config.span_hours * 60));

        if let Ok(txn) = Transaction::new(
            TxnId::new(format!("TXN-{:06}", i)),
            accounts[sender_idx].clone(),
            accounts[receiver_idx].clone(),
            amount,
            at,
        ) {
            transactions.push(txn);
        }
    }
    transactions
}

/// Plant a tight mule triangle on top of a batch: three fresh accounts
/// routing a similar amount around within a few hours.
pub fn plant_triangle(transactions: &mut Vec<Transaction>, label: &str, amount: i64) {
    let members = [
        AccountId::new(format!("RING-{}-A", label)),
        AccountId::new(format!("RING-{}-B", label)),
        AccountId::new(format!("RING-{}-C", label)),
    ];
    for (hop, (from, to)) in [(0usize, 1usize), (1, 2), (2, 0)].iter().enumerate() {
        let txn = Transaction::new(
            TxnId::new(format!("RING-{}-{}", label, hop)),
            members[*from].clone(),
            members[*to].clone(),
            Decimal::from(amount + hop as i64),
            base_time() + Duration::hours(hop as i64),
        )
        .expect("planted amounts are positive");
        transactions.push(txn);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_size_and_no_self_loops() {
        let config = BatchConfig {
            account_count: 10,
            transaction_count: 100,
            ..Default::default()
        };
        let batch = generate_random_batch(&config);
        assert_eq!(batch.len(), 100);
        assert!(batch.iter().all(|t| !t.is_self_loop()));
    }

    #[test]
    fn test_batch_reproducible_for_seed() {
        let config = BatchConfig::default();
        let a = generate_random_batch(&config);
        let b = generate_random_batch(&config);
        assert_eq!(a.len(), b.len());
        for (x, y) in a.iter().zip(b.iter()) {
            assert_eq!(x.txn_id(), y.txn_id());
            assert_eq!(x.amount(), y.amount());
            assert_eq!(x.timestamp(), y.timestamp());
        }
    }

    #[test]
    fn test_planted_triangle_shape() {
        let mut batch = Vec::new();
        plant_triangle(&mut batch, "X", 900);
        assert_eq!(batch.len(), 3);
        assert_eq!(batch[0].sender().as_str(), "RING-X-A");
        assert_eq!(batch[2].receiver().as_str(), "RING-X-A");
    }
}
