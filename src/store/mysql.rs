use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::MySqlPool;

use super::{AttendanceStore, EmployeeStore};
use crate::error::{SyncError, SyncResult};
use crate::model::{AttendanceRecord, Employee, NewAttendanceRecord};

const ATTENDANCE_COLUMNS: &str = "id, employee_id, date, check_in, check_out, status, is_late, \
     late_minutes, early_minutes, overtime_minutes, working_hours, overtime_hours, \
     verify_mode, device_id";

pub struct MySqlEmployeeStore {
    pool: MySqlPool,
}

impl MySqlEmployeeStore {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl EmployeeStore for MySqlEmployeeStore {
    async fn find_by_bio_id(&self, bio_id: u32) -> SyncResult<Option<Employee>> {
        let emp = sqlx::query_as::<_, Employee>(
            "SELECT id, bio_id, display_name, is_active FROM employees WHERE bio_id = ?",
        )
        .bind(bio_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(emp)
    }

    async fn activate(&self, id: u64) -> SyncResult<()> {
        // No-op when already active.
        sqlx::query("UPDATE employees SET is_active = 1 WHERE id = ? AND is_active = 0")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn upsert_from_roster(&self, bio_id: u32, name: &str) -> SyncResult<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO employees (bio_id, display_name, is_active)
            VALUES (?, ?, 0)
            ON DUPLICATE KEY UPDATE display_name = VALUES(display_name)
            "#,
        )
        .bind(bio_id)
        .bind(name)
        .execute(&self.pool)
        .await?;

        // MySQL reports 1 affected row for an insert, 2 for an update
        // that changed the name, 0 for a no-op.
        Ok(result.rows_affected() == 1)
    }
}

pub struct MySqlAttendanceStore {
    pool: MySqlPool,
}

impl MySqlAttendanceStore {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AttendanceStore for MySqlAttendanceStore {
    async fn find_for_day(
        &self,
        employee_id: u64,
        date: NaiveDate,
    ) -> SyncResult<Option<AttendanceRecord>> {
        let rec = sqlx::query_as::<_, AttendanceRecord>(&format!(
            "SELECT {ATTENDANCE_COLUMNS} FROM attendance WHERE employee_id = ? AND date = ?"
        ))
        .bind(employee_id)
        .bind(date)
        .fetch_optional(&self.pool)
        .await?;
        Ok(rec)
    }

    async fn insert(&self, rec: &NewAttendanceRecord) -> SyncResult<AttendanceRecord> {
        let result = sqlx::query(
            r#"
            INSERT INTO attendance
                (employee_id, date, check_in, status, is_late, late_minutes,
                 early_minutes, overtime_minutes, working_hours, overtime_hours,
                 verify_mode, device_id)
            VALUES (?, ?, ?, ?, ?, ?, 0, 0, 0, 0, ?, ?)
            "#,
        )
        .bind(rec.employee_id)
        .bind(rec.date)
        .bind(rec.check_in)
        .bind(rec.status)
        .bind(rec.is_late)
        .bind(rec.late_minutes)
        .bind(rec.verify_mode)
        .bind(rec.device_id)
        .execute(&self.pool)
        .await;

        let result = match result {
            Ok(r) => r,
            Err(e) => {
                // Unique (employee_id, date) key: a duplicate means another
                // writer opened the row first.
                if let sqlx::Error::Database(db_err) = &e {
                    if db_err.code().as_deref() == Some("23000") {
                        return Err(SyncError::LedgerConflict {
                            employee_id: rec.employee_id,
                            date: rec.date,
                        });
                    }
                }
                return Err(e.into());
            }
        };

        Ok(AttendanceRecord {
            id: result.last_insert_id(),
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
        })
    }

    async fn update(&self, rec: &AttendanceRecord) -> SyncResult<()> {
        sqlx::query(
            r#"
            UPDATE attendance
            SET check_in = ?, check_out = ?, status = ?, is_late = ?,
                late_minutes = ?, early_minutes = ?, overtime_minutes = ?,
                working_hours = ?, overtime_hours = ?, verify_mode = ?
            WHERE id = ?
            "#,
        )
        .bind(rec.check_in)
        .bind(rec.check_out)
        .bind(rec.status)
        .bind(rec.is_late)
        .bind(rec.late_minutes)
        .bind(rec.early_minutes)
        .bind(rec.overtime_minutes)
        .bind(rec.working_hours)
        .bind(rec.overtime_hours)
        .bind(rec.verify_mode)
        .bind(rec.id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
