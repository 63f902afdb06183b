use std::sync::Arc;

use chrono::{Duration, NaiveDate, NaiveTime};
use serde::Serialize;
use utoipa::ToSchema;

use super::rules::{ReconPolicy, minutes_to_hours};
use crate::error::{SyncError, SyncResult};
use crate::model::{
    AttendanceRecord, AttendanceStatus, ChangeEvent, ChangeKind, NewAttendanceRecord,
    RawScanEvent, VerifyMode,
};
use crate::realtime::Broadcaster;
use crate::store::{AttendanceStore, EmployeeStore};

/// Operator-visible result of one reconciliation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct SyncSummary {
    /// Attendance records opened with a fresh check-in.
    pub created: u32,
    /// Records closed (or amended) with a check-out.
    pub updated: u32,
    /// Scans discarded: outside the look-back window, unknown biometric
    /// id, duplicate punch, or an already-closed record.
    pub skipped: u32,
    /// Employees activated by their first reconciled scan.
    pub activated: u32,
    /// Scans that failed after the single conflict retry.
    pub errors: u32,
}

enum UpsertOutcome {
    Created(AttendanceRecord),
    Updated(AttendanceRecord),
    Skipped,
}

/// The reconciliation core: turns an ordered batch of raw scans into
/// ledger upserts and change events.
///
/// Sole writer of attendance state. The (employee, date) key is the unit
/// of mutual exclusion; concurrent device syncs racing on the same key
/// are resolved by the store's uniqueness guarantee plus a single retry.
pub struct ReconEngine {
    employees: Arc<dyn EmployeeStore>,
    ledger: Arc<dyn AttendanceStore>,
    broadcaster: Arc<Broadcaster>,
    policy: ReconPolicy,
}

impl ReconEngine {
    pub fn new(
        employees: Arc<dyn EmployeeStore>,
        ledger: Arc<dyn AttendanceStore>,
        broadcaster: Arc<Broadcaster>,
        policy: ReconPolicy,
    ) -> Self {
        Self {
            employees,
            ledger,
            broadcaster,
            policy,
        }
    }

    /// Reconcile one device's scan batch.
    ///
    /// `lookback` bounds how far behind the batch's own most recent
    /// device timestamp a scan may be, never behind host "now" (device
    /// and host clocks drift). Scans are processed in device-timestamp
    /// order; a failure on one scan never aborts the rest, except for
    /// storage-layer failures which abort the batch.
    pub async fn reconcile(
        &self,
        device_id: u64,
        mut batch: Vec<RawScanEvent>,
        lookback: Duration,
    ) -> SyncResult<SyncSummary> {
        let mut summary = SyncSummary::default();
        if batch.is_empty() {
            return Ok(summary);
        }

        batch.sort_by_key(|s| s.timestamp);
        // Anchor the recency window at the device's own latest timestamp.
        let anchor = batch[batch.len() - 1].timestamp;
        let cutoff = anchor - lookback;

        for scan in &batch {
            if scan.timestamp < cutoff {
                tracing::trace!(
                    device_id,
                    bio_id = scan.bio_id,
                    timestamp = %scan.timestamp,
                    "Scan outside look-back window"
                );
                summary.skipped += 1;
                continue;
            }
            self.apply_scan(device_id, scan, &mut summary).await?;
        }

        tracing::info!(
            device_id,
            created = summary.created,
            updated = summary.updated,
            skipped = summary.skipped,
            activated = summary.activated,
            errors = summary.errors,
            "Reconciliation pass complete"
        );
        Ok(summary)
    }

    /// Handle one scan. Unknown biometric ids and duplicates are counted
    /// and dropped here; only persistence failures propagate.
    async fn apply_scan(
        &self,
        device_id: u64,
        scan: &RawScanEvent,
        summary: &mut SyncSummary,
    ) -> SyncResult<()> {
        let Some(employee) = self.employees.find_by_bio_id(scan.bio_id).await? else {
            let err = SyncError::UnknownBiometricId(scan.bio_id);
            tracing::warn!(device_id, timestamp = %scan.timestamp, error = %err, "Scan dropped");
            summary.skipped += 1;
            return Ok(());
        };

        if !employee.is_active {
            self.employees.activate(employee.id).await?;
            summary.activated += 1;
            tracing::info!(employee_id = employee.id, bio_id = employee.bio_id, "Employee activated by first scan");
        }

        let date = scan.timestamp.date();
        let time = scan.timestamp.time();

        let outcome = match self
            .upsert(device_id, employee.id, date, time, scan.verify_mode)
            .await
        {
            Ok(outcome) => outcome,
            Err(e) if e.is_conflict() => {
                // Another writer opened the row between our read and
                // insert; re-read once, which lands on the update path.
                tracing::debug!(employee_id = employee.id, %date, "Ledger conflict, retrying");
                match self
                    .upsert(device_id, employee.id, date, time, scan.verify_mode)
                    .await
                {
                    Ok(outcome) => outcome,
                    Err(SyncError::Persistence(e)) => return Err(SyncError::Persistence(e)),
                    Err(e) => {
                        tracing::error!(employee_id = employee.id, %date, error = %e, "Scan failed after retry");
                        summary.errors += 1;
                        return Ok(());
                    }
                }
            }
            Err(e) => return Err(e),
        };

        match outcome {
            UpsertOutcome::Created(record) => {
                summary.created += 1;
                self.broadcaster
                    .publish_change(&ChangeEvent::new(ChangeKind::Created, record))
                    .await;
            }
            UpsertOutcome::Updated(record) => {
                summary.updated += 1;
                self.broadcaster
                    .publish_change(&ChangeEvent::new(ChangeKind::Updated, record))
                    .await;
            }
            UpsertOutcome::Skipped => summary.skipped += 1,
        }
        Ok(())
    }

    /// The ledger upsert rule, keyed by (employee, calendar date):
    /// no record → open with a check-in; open record → close with a
    /// check-out and recompute; closed record → redundant, skip.
    async fn upsert(
        &self,
        device_id: u64,
        employee_id: u64,
        date: NaiveDate,
        time: NaiveTime,
        verify_mode: VerifyMode,
    ) -> SyncResult<UpsertOutcome> {
        let existing = self.ledger.find_for_day(employee_id, date).await?;

        let Some(mut record) = existing else {
            let late_minutes = self.policy.late_minutes(time);
            let new = NewAttendanceRecord {
                employee_id,
                date,
                check_in: time,
                status: AttendanceStatus::Present,
                is_late: late_minutes > 0,
                late_minutes,
                verify_mode,
                device_id,
            };
            let record = self.ledger.insert(&new).await?;
            return Ok(UpsertOutcome::Created(record));
        };

        if record.is_closed() {
            // Single in/out pair per day: once closed, later scans are
            // counted but never reconciled (multi-entry days collapse).
            return Ok(UpsertOutcome::Skipped);
        }

        let Some(check_in) = record.check_in else {
            // Manually opened shell without a punch: this scan becomes
            // the check-in.
            let late_minutes = self.policy.late_minutes(time);
            record.check_in = Some(time);
            record.is_late = late_minutes > 0;
            record.late_minutes = late_minutes;
            record.verify_mode = verify_mode;
            self.ledger.update(&record).await?;
            return Ok(UpsertOutcome::Updated(record));
        };

        if time <= check_in {
            // Re-delivery of the opening scan, or an out-of-order scan
            // from another device. Closing here would break
            // check_in <= check_out, so it is redundant.
            return Ok(UpsertOutcome::Skipped);
        }

        let worked = ReconPolicy::worked_minutes(check_in, time);
        record.check_out = Some(time);
        record.status = self.policy.status_for_worked(worked);
        record.early_minutes = self.policy.early_minutes(time);
        record.overtime_minutes = self.policy.overtime_minutes(worked);
        record.working_hours = minutes_to_hours(worked);
        record.overtime_hours = minutes_to_hours(record.overtime_minutes);
        self.ledger.update(&record).await?;
        Ok(UpsertOutcome::Updated(record))
    }
}
