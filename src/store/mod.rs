//! Persistence seams for the reconciliation core.
//!
//! The engine and scheduler only ever see these traits; production wiring
//! uses the MySQL implementations, tests drive the in-memory ones.

pub mod memory;
pub mod mysql;

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::error::SyncResult;
use crate::model::{AttendanceRecord, Employee, NewAttendanceRecord};

#[async_trait]
pub trait EmployeeStore: Send + Sync {
    /// Look up the employee bound to a terminal-assigned biometric id.
    async fn find_by_bio_id(&self, bio_id: u32) -> SyncResult<Option<Employee>>;

    /// Activate an employee. Idempotent: activating an already-active
    /// employee is a no-op, not an error.
    async fn activate(&self, id: u64) -> SyncResult<()>;

    /// Upsert an inert employee from a device roster entry. Returns `true`
    /// when a new row was created. An existing row keeps its id and active
    /// flag but takes the roster name, so terminal-side renames propagate.
    async fn upsert_from_roster(&self, bio_id: u32, name: &str) -> SyncResult<bool>;
}

#[async_trait]
pub trait AttendanceStore: Send + Sync {
    /// The single record for (employee, date), if any. Uniqueness on that
    /// key is enforced by the store.
    async fn find_for_day(
        &self,
        employee_id: u64,
        date: NaiveDate,
    ) -> SyncResult<Option<AttendanceRecord>>;

    /// Insert a freshly opened record. A duplicate-key violation on
    /// (employee, date) surfaces as [`SyncError::LedgerConflict`].
    ///
    /// [`SyncError::LedgerConflict`]: crate::error::SyncError::LedgerConflict
    async fn insert(&self, rec: &NewAttendanceRecord) -> SyncResult<AttendanceRecord>;

    /// Persist the mutable fields of an existing record.
    async fn update(&self, rec: &AttendanceRecord) -> SyncResult<()>;
}
