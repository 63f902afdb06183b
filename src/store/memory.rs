//! In-memory store implementations.
//!
//! Used by the integration tests to drive the engine and scheduler
//! without a database; semantics mirror the MySQL stores, including the
//! unique (employee, date) ledger key.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use tokio::sync::Mutex;

use super::{AttendanceStore, EmployeeStore};
use crate::error::{SyncError, SyncResult};
use crate::model::{AttendanceRecord, Device, Employee, NewAttendanceRecord, SyncStatus};
use crate::registry::DeviceRegistry;

#[derive(Default)]
pub struct MemoryEmployeeStore {
    rows: Mutex<Vec<Employee>>,
}

impl MemoryEmployeeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_employees(employees: Vec<Employee>) -> Self {
        Self {
            rows: Mutex::new(employees),
        }
    }

    pub async fn snapshot(&self) -> Vec<Employee> {
        self.rows.lock().await.clone()
    }
}

#[async_trait]
impl EmployeeStore for MemoryEmployeeStore {
    async fn find_by_bio_id(&self, bio_id: u32) -> SyncResult<Option<Employee>> {
        Ok(self
            .rows
            .lock()
            .await
            .iter()
            .find(|e| e.bio_id == bio_id)
            .cloned())
    }

    async fn activate(&self, id: u64) -> SyncResult<()> {
        if let Some(emp) = self.rows.lock().await.iter_mut().find(|e| e.id == id) {
            emp.is_active = true;
        }
        Ok(())
    }

    async fn upsert_from_roster(&self, bio_id: u32, name: &str) -> SyncResult<bool> {
        let mut rows = self.rows.lock().await;
        if let Some(emp) = rows.iter_mut().find(|e| e.bio_id == bio_id) {
            emp.display_name = name.to_string();
            return Ok(false);
        }
        let id = rows.iter().map(|e| e.id).max().unwrap_or(0) + 1;
        rows.push(Employee {
            id,
            bio_id,
            display_name: name.to_string(),
            is_active: false,
        });
        Ok(true)
    }
}

#[derive(Default)]
pub struct MemoryAttendanceStore {
    rows: Mutex<Vec<AttendanceRecord>>,
    next_id: Mutex<u64>,
}

impl MemoryAttendanceStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn records(&self) -> Vec<AttendanceRecord> {
        self.rows.lock().await.clone()
    }
}

#[async_trait]
impl AttendanceStore for MemoryAttendanceStore {
    async fn find_for_day(
        &self,
        employee_id: u64,
        date: NaiveDate,
    ) -> SyncResult<Option<AttendanceRecord>> {
        Ok(self
            .rows
            .lock()
            .await
            .iter()
            .find(|r| r.employee_id == employee_id && r.date == date)
            .cloned())
    }

    async fn insert(&self, rec: &NewAttendanceRecord) -> SyncResult<AttendanceRecord> {
        let mut rows = self.rows.lock().await;
        if rows
            .iter()
            .any(|r| r.employee_id == rec.employee_id && r.date == rec.date)
        {
            return Err(SyncError::LedgerConflict {
                employee_id: rec.employee_id,
                date: rec.date,
            });
        }
        let mut next_id = self.next_id.lock().await;
        *next_id += 1;
        let record = AttendanceRecord {
            id: *next_id,
            employee_id: rec.employee_id,
            date: rec.date,
            check_in: Some(rec.check_in),
            check_out: None,
            status: rec.status,
            is_late: rec.is_late,
            late_minutes: rec.late_minutes,
            early_minutes: 0,
            overtime_minutes: 0,
            working_hours: 0.0,
            overtime_hours: 0.0,
            verify_mode: rec.verify_mode,
            device_id: rec.device_id,
        };
        rows.push(record.clone());
        Ok(record)
    }

    async fn update(&self, rec: &AttendanceRecord) -> SyncResult<()> {
        let mut rows = self.rows.lock().await;
        if let Some(existing) = rows.iter_mut().find(|r| r.id == rec.id) {
            *existing = rec.clone();
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryDeviceRegistry {
    rows: Mutex<HashMap<u64, Device>>,
}

impl MemoryDeviceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_devices(devices: Vec<Device>) -> Self {
        Self {
            rows: Mutex::new(devices.into_iter().map(|d| (d.id, d)).collect()),
        }
    }

    pub async fn snapshot(&self, id: u64) -> Option<Device> {
        self.rows.lock().await.get(&id).cloned()
    }
}

#[async_trait]
impl DeviceRegistry for MemoryDeviceRegistry {
    async fn list_active(&self) -> SyncResult<Vec<Device>> {
        let mut devices: Vec<Device> = self
            .rows
            .lock()
            .await
            .values()
            .filter(|d| d.is_active)
            .cloned()
            .collect();
        devices.sort_by_key(|d| d.id);
        Ok(devices)
    }

    async fn get(&self, id: u64) -> SyncResult<Device> {
        self.rows
            .lock()
            .await
            .get(&id)
            .cloned()
            .ok_or(SyncError::DeviceNotFound(id))
    }

    async fn record_sync_outcome(
        &self,
        id: u64,
        status: SyncStatus,
        error: Option<&str>,
        at: DateTime<Utc>,
    ) -> SyncResult<()> {
        let mut rows = self.rows.lock().await;
        let device = rows.get_mut(&id).ok_or(SyncError::DeviceNotFound(id))?;
        device.last_sync_time = Some(at);
        device.last_sync_status = status;
        device.last_sync_error = error.map(str::to_string);
        Ok(())
    }
}
