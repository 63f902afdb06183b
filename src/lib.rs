//! Device synchronization and attendance reconciliation engine.
//!
//! Pulls raw scan logs from biometric terminals on per-device timers,
//! reconciles them into a per-employee/per-day attendance ledger and
//! pushes resulting change events to permission-scoped subscribers.

pub mod api;
pub mod config;
pub mod db;
pub mod docs;
pub mod error;
pub mod model;
pub mod realtime;
pub mod recon;
pub mod registry;
pub mod routes;
pub mod scheduler;
pub mod store;
pub mod terminal;
