use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// How the terminal verified the person behind a scan.
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
pub enum VerifyMode {
    Fingerprint,
    Face,
    Card,
    Password,
}

impl VerifyMode {
    /// Map the verification code reported in an attendance log entry.
    pub fn from_code(code: u8) -> Self {
        match code {
            0 => Self::Password,
            2 => Self::Card,
            15 => Self::Face,
            _ => Self::Fingerprint,
        }
    }
}

/// An immutable attendance fact pulled from a terminal.
///
/// `timestamp` is the terminal's own clock; it is never compared against
/// host time. `raw` keeps the undecoded log entry for troubleshooting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawScanEvent {
    pub bio_id: u32,
    pub timestamp: NaiveDateTime,
    pub verify_mode: VerifyMode,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub raw: Vec<u8>,
}

/// One entry of a terminal's user roster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterEntry {
    pub bio_id: u32,
    pub name: String,
}
