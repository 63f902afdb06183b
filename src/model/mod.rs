pub mod attendance;
pub mod device;
pub mod employee;
pub mod event;
pub mod scan;

pub use attendance::{AttendanceRecord, AttendanceStatus, NewAttendanceRecord};
pub use device::{Device, DeviceSyncStatus, SyncStatus};
pub use employee::Employee;
pub use event::{ChangeEvent, ChangeKind};
pub use scan::{RawScanEvent, RosterEntry, VerifyMode};
