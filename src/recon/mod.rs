//! Reconciliation engine: raw scans in, attendance ledger upserts and
//! change events out.

pub mod engine;
pub mod rules;

pub use engine::{ReconEngine, SyncSummary};
pub use rules::ReconPolicy;
