//! Shared fixtures for the integration tests: canned devices and
//! employees, plus a scripted terminal link.
#![allow(dead_code)] // each test binary uses a different subset

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use tokio::sync::Mutex;

use hrm_sync::error::{SyncError, SyncResult};
use hrm_sync::model::{Device, Employee, RawScanEvent, RosterEntry, SyncStatus, VerifyMode};
use hrm_sync::realtime::Broadcaster;
use hrm_sync::recon::{ReconEngine, ReconPolicy};
use hrm_sync::store::memory::{MemoryAttendanceStore, MemoryEmployeeStore};
use hrm_sync::store::{AttendanceStore, EmployeeStore};
use hrm_sync::terminal::TerminalLink;

pub fn device(id: u64) -> Device {
    Device {
        id,
        name: format!("terminal-{id}"),
        ip: "127.0.0.1".into(),
        port: 4370,
        comm_key: 0,
        timeout_secs: 5,
        sync_interval_secs: 60,
        is_active: true,
        last_sync_time: None,
        last_sync_status: SyncStatus::Pending,
        last_sync_error: None,
    }
}

pub fn employee(id: u64, bio_id: u32, is_active: bool) -> Employee {
    Employee {
        id,
        bio_id,
        display_name: format!("employee-{bio_id}"),
        is_active,
    }
}

pub fn day() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 6, 3).unwrap()
}

pub fn at(time: &str) -> NaiveDateTime {
    day().and_time(time.parse().unwrap())
}

pub fn scan(bio_id: u32, timestamp: NaiveDateTime) -> RawScanEvent {
    RawScanEvent {
        bio_id,
        timestamp,
        verify_mode: VerifyMode::Fingerprint,
        raw: Vec::new(),
    }
}

pub struct TestHarness {
    pub employees: Arc<MemoryEmployeeStore>,
    pub ledger: Arc<MemoryAttendanceStore>,
    pub broadcaster: Arc<Broadcaster>,
    pub engine: Arc<ReconEngine>,
}

/// Engine wired to in-memory stores with the default policy
/// (09:00–17:00 shift, 15 min grace).
pub fn harness(employees: Vec<Employee>) -> TestHarness {
    let employees = Arc::new(MemoryEmployeeStore::with_employees(employees));
    let ledger = Arc::new(MemoryAttendanceStore::new());
    let broadcaster = Arc::new(Broadcaster::new());
    let engine = Arc::new(ReconEngine::new(
        Arc::clone(&employees) as Arc<dyn EmployeeStore>,
        Arc::clone(&ledger) as Arc<dyn AttendanceStore>,
        Arc::clone(&broadcaster),
        ReconPolicy::default(),
    ));
    TestHarness {
        employees,
        ledger,
        broadcaster,
        engine,
    }
}

/// Scripted per-device behavior for a [`ScriptedLink`].
#[derive(Clone, Default)]
pub struct DeviceScript {
    pub roster: Vec<RosterEntry>,
    pub scans: Vec<RawScanEvent>,
    pub unreachable: bool,
}

/// Terminal link that replays canned data per device and records the
/// `since` bound of every scan fetch.
#[derive(Default)]
pub struct ScriptedLink {
    scripts: HashMap<u64, DeviceScript>,
    pub fetches: Mutex<Vec<(u64, Option<NaiveDateTime>)>>,
}

impl ScriptedLink {
    pub fn new(scripts: HashMap<u64, DeviceScript>) -> Self {
        Self {
            scripts,
            fetches: Mutex::new(Vec::new()),
        }
    }

    pub fn single(device_id: u64, script: DeviceScript) -> Self {
        Self::new(HashMap::from([(device_id, script)]))
    }

    fn script(&self, device: &Device) -> SyncResult<&DeviceScript> {
        let script = self
            .scripts
            .get(&device.id)
            .ok_or_else(|| SyncError::DeviceUnreachable(format!("{}: no route", device.addr())))?;
        if script.unreachable {
            return Err(SyncError::DeviceUnreachable(format!(
                "{}: connection refused",
                device.addr()
            )));
        }
        Ok(script)
    }
}

#[async_trait]
impl TerminalLink for ScriptedLink {
    async fn fetch_roster(&self, device: &Device) -> SyncResult<Vec<RosterEntry>> {
        Ok(self.script(device)?.roster.clone())
    }

    async fn fetch_scans(
        &self,
        device: &Device,
        since: Option<NaiveDateTime>,
    ) -> SyncResult<Vec<RawScanEvent>> {
        let script = self.script(device)?;
        self.fetches.lock().await.push((device.id, since));

        let mut scans = script.scans.clone();
        if let Some(since) = since {
            scans.retain(|s| s.timestamp > since);
        }
        scans.sort_by_key(|s| s.timestamp);
        Ok(scans)
    }
}
