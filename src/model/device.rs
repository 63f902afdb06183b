use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Outcome of the most recent sync attempt for a device.
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
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum SyncStatus {
    Pending,
    Success,
    Failed,
}

/// A biometric terminal registered with the system.
///
/// Health fields (`last_sync_*`) are written only by the sync scheduler;
/// everything else is operator-managed. Devices are soft-deactivated via
/// `is_active`, never hard-deleted while scan logs reference them.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct Device {
    pub id: u64,

    #[schema(example = "Main entrance")]
    pub name: String,

    #[schema(example = "192.168.1.201")]
    pub ip: String,

    #[schema(example = 4370)]
    pub port: u16,

    /// Communication key configured on the terminal (0 = none).
    pub comm_key: u32,

    /// Per-operation protocol timeout, seconds.
    pub timeout_secs: u32,

    /// How often the scheduler polls this device, seconds.
    pub sync_interval_secs: u32,

    pub is_active: bool,

    pub last_sync_time: Option<DateTime<Utc>>,
    pub last_sync_status: SyncStatus,
    pub last_sync_error: Option<String>,
}

impl Device {
    pub fn addr(&self) -> String {
        format!("{}:{}", self.ip, self.port)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(u64::from(self.timeout_secs.max(1)))
    }

    pub fn sync_interval(&self) -> Duration {
        Duration::from_secs(u64::from(self.sync_interval_secs.max(1)))
    }
}

/// Health snapshot returned by the sync-status endpoint.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct DeviceSyncStatus {
    pub device_id: u64,
    pub name: String,
    pub is_active: bool,
    pub last_sync_time: Option<DateTime<Utc>>,
    pub last_sync_status: SyncStatus,
    pub last_sync_error: Option<String>,
}

impl From<&Device> for DeviceSyncStatus {
    fn from(d: &Device) -> Self {
        Self {
            device_id: d.id,
            name: d.name.clone(),
            is_active: d.is_active,
            last_sync_time: d.last_sync_time,
            last_sync_status: d.last_sync_status,
            last_sync_error: d.last_sync_error.clone(),
        }
    }
}
