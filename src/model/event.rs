use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::attendance::AttendanceRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Created,
    Updated,
}

/// Notification that an attendance record changed, fanned out to
/// subscribers.
///
/// Carries the full updated record plus the owning employee id so
/// channel routing never has to re-load anything.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub kind: ChangeKind,
    pub employee_id: u64,
    pub record: AttendanceRecord,
    pub at: DateTime<Utc>,
}

impl ChangeEvent {
    pub fn new(kind: ChangeKind, record: AttendanceRecord) -> Self {
        Self {
            kind,
            employee_id: record.employee_id,
            record,
            at: Utc::now(),
        }
    }

    /// Serialized wire form for push delivery.
    pub fn to_bytes(&self) -> Bytes {
        // Serialization of these plain fields cannot fail.
        Bytes::from(serde_json::to_vec(self).unwrap_or_default())
    }
}
