//! Device registry: connection parameters, sync cadence and health state.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::MySqlPool;

use crate::error::{SyncError, SyncResult};
use crate::model::{Device, SyncStatus};

/// Per-device registry consulted by the scheduler and terminal link.
///
/// `record_sync_outcome` persistence failures are the caller's problem to
/// log, not to propagate: a health write must never fail a sync attempt.
#[async_trait]
pub trait DeviceRegistry: Send + Sync {
    async fn list_active(&self) -> SyncResult<Vec<Device>>;

    async fn get(&self, id: u64) -> SyncResult<Device>;

    /// Durably record the outcome of a sync attempt.
    async fn record_sync_outcome(
        &self,
        id: u64,
        status: SyncStatus,
        error: Option<&str>,
        at: DateTime<Utc>,
    ) -> SyncResult<()>;
}

const DEVICE_COLUMNS: &str = "id, name, ip, port, comm_key, timeout_secs, sync_interval_secs, \
     is_active, last_sync_time, last_sync_status, last_sync_error";

pub struct MySqlDeviceRegistry {
    pool: MySqlPool,
}

impl MySqlDeviceRegistry {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DeviceRegistry for MySqlDeviceRegistry {
    async fn list_active(&self) -> SyncResult<Vec<Device>> {
        let devices = sqlx::query_as::<_, Device>(&format!(
            "SELECT {DEVICE_COLUMNS} FROM devices WHERE is_active = 1 ORDER BY id"
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(devices)
    }

    async fn get(&self, id: u64) -> SyncResult<Device> {
        sqlx::query_as::<_, Device>(&format!(
            "SELECT {DEVICE_COLUMNS} FROM devices WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(SyncError::DeviceNotFound(id))
    }

    async fn record_sync_outcome(
        &self,
        id: u64,
        status: SyncStatus,
        error: Option<&str>,
        at: DateTime<Utc>,
    ) -> SyncResult<()> {
        sqlx::query(
            r#"
            UPDATE devices
            SET last_sync_time = ?, last_sync_status = ?, last_sync_error = ?
            WHERE id = ?
            "#,
        )
        .bind(at)
        .bind(status)
        .bind(error)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
