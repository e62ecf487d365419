use crate::core::account::AccountId;
use crate::core::error::EngineError;
use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque identifier of a single transaction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TxnId(String);

impl TxnId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TxnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A single directed transfer between two accounts.
///
/// Transactions are immutable once created and form the edges of the
/// flow graph. Timestamps are naive instants: the batch is analyzed in
/// whatever clock the feed used, and no timezone conversion is applied.
///
/// # Examples
///
/// ```
/// use forensics_engine::core::account::AccountId;
/// use forensics_engine::core::transaction::{Transaction, TxnId};
/// use chrono::NaiveDate;
/// use rust_decimal_macros::dec;
///
/// let txn = Transaction::new(
///     TxnId::new("TX-1"),
///     AccountId::new("A"),
///     AccountId::new("B"),
///     dec!(1000),
///     NaiveDate::from_ymd_opt(2024, 3, 1).unwrap().and_hms_opt(9, 30, 0).unwrap(),
/// ).unwrap();
///
/// assert_eq!(txn.amount(), dec!(1000));
/// ```
#[derive(Debug, Clone, Serialize)]
pub struct Transaction {
    txn_id: TxnId,
    sender: AccountId,
    receiver: AccountId,
    /// The transferred amount. Always positive.
    amount: Decimal,
    timestamp: NaiveDateTime,
}

impl Transaction {
    /// Create a new transaction, rejecting non-positive amounts.
    pub fn new(
        txn_id: TxnId,
        sender: AccountId,
        receiver: AccountId,
        amount: Decimal,
        timestamp: NaiveDateTime,
    ) -> Result<Self, EngineError> {
        if amount <= Decimal::ZERO {
            return Err(EngineError::malformed(
                txn_id.as_str(),
                format!("amount must be positive, got {}", amount),
            ));
        }
        Ok(Self {
            txn_id,
            sender,
            receiver,
            amount,
            timestamp,
        })
    }

    // --- Accessors ---

    pub fn txn_id(&self) -> &TxnId {
        &self.txn_id
    }

    pub fn sender(&self) -> &AccountId {
        &self.sender
    }

    pub fn receiver(&self) -> &AccountId {
        &self.receiver
    }

    pub fn amount(&self) -> Decimal {
        self.amount
    }

    pub fn timestamp(&self) -> NaiveDateTime {
        self.timestamp
    }

    /// True when sender and receiver are the same account. Self-loops
    /// are excluded from graph construction.
    pub fn is_self_loop(&self) -> bool {
        self.sender == self.receiver
    }
}

/// Raw record shape handed over by the CSV parsing collaborator.
///
/// All fields arrive as strings; [`TransactionRecord::parse`] converts
/// them into a validated [`Transaction`] or fails with
/// [`EngineError::MalformedInput`].
#[derive(Debug, Clone, Deserialize)]
pub struct TransactionRecord {
    pub transaction_id: String,
    pub sender_id: String,
    pub receiver_id: String,
    pub amount: String,
    /// ISO-8601 without timezone, e.g. `2024-03-01T09:30:00`.
    pub timestamp: String,
}

/// Accepted timestamp layouts. The feed emits the `T`-separated form;
/// the space-separated form shows up in hand-edited files.
const TIMESTAMP_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

impl TransactionRecord {
    /// Validate and convert this record into a [`Transaction`].
    pub fn parse(&self) -> Result<Transaction, EngineError> {
        let amount: Decimal = self.amount.trim().parse().map_err(|_| {
            EngineError::malformed(
                &self.transaction_id,
                format!("unparseable amount '{}'", self.amount),
            )
        })?;

        let timestamp = parse_timestamp(self.timestamp.trim()).ok_or_else(|| {
            EngineError::malformed(
                &self.transaction_id,
                format!("unparseable timestamp '{}'", self.timestamp),
            )
        })?;

        Transaction::new(
            TxnId::new(&self.transaction_id),
            AccountId::new(&self.sender_id),
            AccountId::new(&self.receiver_id),
            amount,
            timestamp,
        )
    }
}

fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    TIMESTAMP_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
}
