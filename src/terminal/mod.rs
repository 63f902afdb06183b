//! Terminal link: speaks the device wire protocol to fetch rosters and
//! scan logs.
//!
//! Terminals support only one active session, so connections are opened
//! fresh per call and torn down before returning, on every path. Any
//! network or protocol failure surfaces as
//! [`SyncError::DeviceUnreachable`]; retries are the scheduler's job
//! (the next tick), never this layer's.
//!
//! [`SyncError::DeviceUnreachable`]: crate::error::SyncError::DeviceUnreachable

pub mod client;
pub mod protocol;

use async_trait::async_trait;
use chrono::NaiveDateTime;

use crate::error::SyncResult;
use crate::model::{Device, RawScanEvent, RosterEntry};

#[async_trait]
pub trait TerminalLink: Send + Sync {
    /// Fetch the terminal's full current user roster.
    async fn fetch_roster(&self, device: &Device) -> SyncResult<Vec<RosterEntry>>;

    /// Fetch scan events since a lower-bound *device-clock* timestamp
    /// (`None` = everything the terminal still holds). Results are
    /// ordered by device timestamp, most recent last.
    async fn fetch_scans(
        &self,
        device: &Device,
        since: Option<NaiveDateTime>,
    ) -> SyncResult<Vec<RawScanEvent>>;
}

pub use client::TcpTerminalLink;
