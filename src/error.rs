use chrono::NaiveDate;

/// Failure taxonomy for the sync/reconciliation core.
///
/// Propagation rules:
/// - `DeviceUnreachable` is recorded as device health and never crosses
///   into the broadcaster or other devices' schedules.
/// - `UnknownBiometricId` is logged and dropped per scan; it never aborts
///   a batch.
/// - `LedgerConflict` is retried once inside the reconciliation pass,
///   then surfaces as a failed-record count in the sync summary.
/// - `Persistence` aborts the current device's batch only.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("device unreachable: {0}")]
    DeviceUnreachable(String),

    #[error("no employee matches biometric id {0}")]
    UnknownBiometricId(u32),

    #[error("concurrent writer raced on attendance for employee {employee_id} on {date}")]
    LedgerConflict { employee_id: u64, date: NaiveDate },

    #[error("persistence failure: {0}")]
    Persistence(#[from] sqlx::Error),

    #[error("device {0} not found")]
    DeviceNotFound(u64),
}

impl SyncError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::LedgerConflict { .. })
    }
}

pub type SyncResult<T> = Result<T, SyncError>;
