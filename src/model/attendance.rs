use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::scan::VerifyMode;

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    sqlx::Type,
    strum_macros::Display,
    strum_macros::EnumString,
    ToSchema,
)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AttendanceStatus {
    Present,
    Absent,
    Late,
    EarlyLeave,
    HalfDay,
}

/// The reconciled attendance unit: one row per (employee, calendar date).
///
/// Minute fields are the source of truth for duration arithmetic; the
/// fractional-hour fields are derived for storage and reporting only.
/// Once both `check_in` and `check_out` are set the record is closed and
/// further scans for that date are skipped, not reconciled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct AttendanceRecord {
    pub id: u64,
    pub employee_id: u64,

    #[schema(value_type = String, format = "date")]
    pub date: NaiveDate,

    #[schema(value_type = Option<String>, example = "08:12:00")]
    pub check_in: Option<NaiveTime>,

    #[schema(value_type = Option<String>, example = "17:01:00")]
    pub check_out: Option<NaiveTime>,

    pub status: AttendanceStatus,

    pub is_late: bool,
    pub late_minutes: i64,
    pub early_minutes: i64,
    pub overtime_minutes: i64,

    #[schema(example = 8.82)]
    pub working_hours: f64,
    pub overtime_hours: f64,

    pub verify_mode: VerifyMode,

    /// Device that produced the originating scan.
    pub device_id: u64,
}

impl AttendanceRecord {
    /// Both punches recorded; no further scans reconcile into this row.
    pub fn is_closed(&self) -> bool {
        self.check_in.is_some() && self.check_out.is_some()
    }
}

/// Insert shape for a freshly opened attendance record.
#[derive(Debug, Clone)]
pub struct NewAttendanceRecord {
    pub employee_id: u64,
    pub date: NaiveDate,
    pub check_in: NaiveTime,
    pub status: AttendanceStatus,
    pub is_late: bool,
    pub late_minutes: i64,
    pub verify_mode: VerifyMode,
    pub device_id: u64,
}
