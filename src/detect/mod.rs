//! Pattern detectors. Each consumes the immutable flow graph read-only
//! and none depends on another's output.

pub mod anomaly;
pub mod cycles;
pub mod shells;
pub mod smurfing;
pub mod velocity;
