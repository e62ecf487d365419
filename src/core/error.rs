use thiserror::Error;

/// Errors surfaced to callers of the forensics engine.
///
/// Only malformed input is fatal. Detector budget exhaustion and
/// internal detector failures are reported through
/// [`Diagnostics`](crate::engine::Diagnostics) counters instead, and the
/// batch always produces a report.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A submitted record carried a non-positive amount or an
    /// unparseable field. The offending transaction id is preserved so
    /// the upload collaborator can point at the bad row.
    #[error("malformed input in transaction '{txn_id}': {detail}")]
    MalformedInput { txn_id: String, detail: String },
}

impl EngineError {
    pub(crate) fn malformed(txn_id: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::MalformedInput {
            txn_id: txn_id.into(),
            detail: detail.into(),
        }
    }
}
