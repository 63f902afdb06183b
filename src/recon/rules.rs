//! Pure attendance derivation rules.
//!
//! All duration arithmetic is in whole minutes; fractional hours exist
//! only at the storage boundary so repeated partial updates never
//! accumulate floating-point drift.

use chrono::NaiveTime;

use crate::model::AttendanceStatus;

/// Expected-shift policy applied to every reconciled record.
///
/// Lateness uses a fixed expected shift start/end for all employees;
/// per-employee shift lookups are deliberately not part of this rule.
#[derive(Debug, Clone, Copy)]
pub struct ReconPolicy {
    pub shift_start: NaiveTime,
    pub shift_end: NaiveTime,
    /// Grace period after `shift_start` before a check-in counts late.
    pub grace_minutes: i64,
    /// Net worked minutes for a full `present` day (default 8h).
    pub full_day_minutes: i64,
    /// Net worked minutes below which the day is `early_leave` (default 4h).
    pub half_day_minutes: i64,
}

impl Default for ReconPolicy {
    fn default() -> Self {
        Self {
            shift_start: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            shift_end: NaiveTime::from_hms_opt(17, 0, 0).unwrap(),
            grace_minutes: 15,
            full_day_minutes: 8 * 60,
            half_day_minutes: 4 * 60,
        }
    }
}

impl ReconPolicy {
    /// Net minutes between two punches on the same day.
    pub fn worked_minutes(check_in: NaiveTime, check_out: NaiveTime) -> i64 {
        (check_out - check_in).num_minutes().max(0)
    }

    /// Status from net worked minutes. Shared by device reconciliation
    /// and manual edits so both paths agree.
    pub fn status_for_worked(&self, worked_minutes: i64) -> AttendanceStatus {
        if worked_minutes >= self.full_day_minutes {
            AttendanceStatus::Present
        } else if worked_minutes >= self.half_day_minutes {
            AttendanceStatus::HalfDay
        } else {
            AttendanceStatus::EarlyLeave
        }
    }

    /// Minutes past the expected shift start, zero within the grace
    /// window. Counted from shift start, not from the end of grace.
    pub fn late_minutes(&self, check_in: NaiveTime) -> i64 {
        let past_start = (check_in - self.shift_start).num_minutes();
        if past_start > self.grace_minutes {
            past_start
        } else {
            0
        }
    }

    /// Symmetric rule for leaving before the expected shift end.
    pub fn early_minutes(&self, check_out: NaiveTime) -> i64 {
        let before_end = (self.shift_end - check_out).num_minutes();
        if before_end > self.grace_minutes {
            before_end
        } else {
            0
        }
    }

    /// Minutes worked beyond a full day.
    pub fn overtime_minutes(&self, worked_minutes: i64) -> i64 {
        (worked_minutes - self.full_day_minutes).max(0)
    }
}

/// Convert minutes to fractional hours rounded to two decimals, for the
/// stored report fields.
pub fn minutes_to_hours(minutes: i64) -> f64 {
    (minutes as f64 / 60.0 * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn status_thresholds() {
        let p = ReconPolicy::default();
        assert_eq!(p.status_for_worked(480), AttendanceStatus::Present);
        assert_eq!(p.status_for_worked(529), AttendanceStatus::Present);
        assert_eq!(p.status_for_worked(479), AttendanceStatus::HalfDay);
        assert_eq!(p.status_for_worked(240), AttendanceStatus::HalfDay);
        assert_eq!(p.status_for_worked(239), AttendanceStatus::EarlyLeave);
        assert_eq!(p.status_for_worked(0), AttendanceStatus::EarlyLeave);
    }

    #[test]
    fn grace_window_absorbs_small_lateness() {
        let p = ReconPolicy::default();
        assert_eq!(p.late_minutes(t(8, 45)), 0);
        assert_eq!(p.late_minutes(t(9, 0)), 0);
        assert_eq!(p.late_minutes(t(9, 15)), 0);
        // Past the grace window the full delta from shift start counts.
        assert_eq!(p.late_minutes(t(9, 16)), 16);
        assert_eq!(p.late_minutes(t(10, 30)), 90);
    }

    #[test]
    fn early_leave_mirrors_lateness() {
        let p = ReconPolicy::default();
        assert_eq!(p.early_minutes(t(17, 0)), 0);
        assert_eq!(p.early_minutes(t(16, 45)), 0);
        assert_eq!(p.early_minutes(t(16, 44)), 16);
        assert_eq!(p.early_minutes(t(18, 0)), 0);
    }

    #[test]
    fn overtime_beyond_full_day() {
        let p = ReconPolicy::default();
        assert_eq!(p.overtime_minutes(480), 0);
        assert_eq!(p.overtime_minutes(529), 49);
        assert_eq!(p.overtime_minutes(200), 0);
    }

    #[test]
    fn hours_rounded_to_two_decimals() {
        assert_eq!(minutes_to_hours(529), 8.82);
        assert_eq!(minutes_to_hours(49), 0.82);
        assert_eq!(minutes_to_hours(0), 0.0);
        assert_eq!(minutes_to_hours(480), 8.0);
    }
}
