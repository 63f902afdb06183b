//! Wire protocol for biometric terminals.
//!
//! Terminals speak a framed binary command protocol over TCP. Every frame
//! is a fixed 12-byte header followed by a variable payload:
//!
//! ```text
//! offset  size  field
//! 0       2     magic (0x5AA5, little-endian)
//! 2       2     command
//! 4       2     session id (0 until Connect is acknowledged)
//! 6       2     reply counter
//! 8       2     checksum (ones'-complement sum, checksum field zeroed)
//! 10      2     payload length
//! 12      n     payload
//! ```
//!
//! Encoding and decoding here is pure; all I/O lives in the client.

use chrono::{DateTime, NaiveDateTime};

use crate::model::{RawScanEvent, RosterEntry, VerifyMode};

pub const MAGIC: u16 = 0x5AA5;

/// Fixed header size in bytes.
pub const HEADER_LEN: usize = 12;

/// Name field width in a user roster entry.
const USER_NAME_LEN: usize = 24;

/// Size of one attendance log entry in a ReadAttLog response.
const ATT_ENTRY_LEN: usize = 16;

/// Size of one user entry in a ReadUsers response.
const USER_ENTRY_LEN: usize = 4 + USER_NAME_LEN;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum Command {
    Connect = 1000,
    Disconnect = 1001,
    Auth = 1102,
    ReadUsers = 1009,
    ReadAttLog = 1013,
    Ack = 2000,
    Refuse = 2001,
}

impl Command {
    pub fn from_u16(raw: u16) -> Option<Self> {
        match raw {
            1000 => Some(Self::Connect),
            1001 => Some(Self::Disconnect),
            1102 => Some(Self::Auth),
            1009 => Some(Self::ReadUsers),
            1013 => Some(Self::ReadAttLog),
            2000 => Some(Self::Ack),
            2001 => Some(Self::Refuse),
            _ => None,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("bad magic 0x{0:04X}")]
    BadMagic(u16),

    #[error("frame truncated: {0}")]
    Truncated(&'static str),

    #[error("checksum mismatch (expected 0x{expected:04X}, got 0x{got:04X})")]
    ChecksumMismatch { expected: u16, got: u16 },

    #[error("unknown command 0x{0:04X}")]
    UnknownCommand(u16),

    #[error("terminal refused request (code {code}): {message}")]
    Refused { code: u16, message: String },

    #[error("malformed payload: {0}")]
    Malformed(&'static str),
}

/// One protocol frame, decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub command: Command,
    pub session_id: u16,
    pub reply_id: u16,
    pub payload: Vec<u8>,
}

impl Frame {
    pub fn new(command: Command, session_id: u16, reply_id: u16, payload: Vec<u8>) -> Self {
        Self {
            command,
            session_id,
            reply_id,
            payload,
        }
    }

    /// Serialize header + payload, computing the checksum over the frame
    /// with the checksum field zeroed.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(HEADER_LEN + self.payload.len());
        buf.extend_from_slice(&MAGIC.to_le_bytes());
        buf.extend_from_slice(&(self.command as u16).to_le_bytes());
        buf.extend_from_slice(&self.session_id.to_le_bytes());
        buf.extend_from_slice(&self.reply_id.to_le_bytes());
        buf.extend_from_slice(&[0, 0]); // checksum placeholder
        buf.extend_from_slice(&(self.payload.len() as u16).to_le_bytes());
        buf.extend_from_slice(&self.payload);

        let sum = checksum(&buf);
        buf[8..10].copy_from_slice(&sum.to_le_bytes());
        buf
    }

    /// Decode a full frame from `buf`. The caller must already have read
    /// exactly header + payload bytes off the wire.
    pub fn decode(buf: &[u8]) -> Result<Self, ProtocolError> {
        if buf.len() < HEADER_LEN {
            return Err(ProtocolError::Truncated("header"));
        }
        let magic = u16::from_le_bytes([buf[0], buf[1]]);
        if magic != MAGIC {
            return Err(ProtocolError::BadMagic(magic));
        }
        let raw_command = u16::from_le_bytes([buf[2], buf[3]]);
        let command =
            Command::from_u16(raw_command).ok_or(ProtocolError::UnknownCommand(raw_command))?;
        let session_id = u16::from_le_bytes([buf[4], buf[5]]);
        let reply_id = u16::from_le_bytes([buf[6], buf[7]]);
        let got = u16::from_le_bytes([buf[8], buf[9]]);
        let payload_len = u16::from_le_bytes([buf[10], buf[11]]) as usize;
        if buf.len() < HEADER_LEN + payload_len {
            return Err(ProtocolError::Truncated("payload"));
        }

        let mut zeroed = buf[..HEADER_LEN + payload_len].to_vec();
        zeroed[8] = 0;
        zeroed[9] = 0;
        let expected = checksum(&zeroed);
        if expected != got {
            return Err(ProtocolError::ChecksumMismatch { expected, got });
        }

        Ok(Self {
            command,
            session_id,
            reply_id,
            payload: buf[HEADER_LEN..HEADER_LEN + payload_len].to_vec(),
        })
    }
}

/// 16-bit ones'-complement sum over little-endian byte pairs.
pub fn checksum(buf: &[u8]) -> u16 {
    let mut sum: u32 = 0;
    let mut chunks = buf.chunks_exact(2);
    for pair in &mut chunks {
        sum += u32::from(u16::from_le_bytes([pair[0], pair[1]]));
    }
    if let [last] = chunks.remainder() {
        sum += u32::from(*last);
    }
    while sum > 0xFFFF {
        sum = (sum & 0xFFFF) + (sum >> 16);
    }
    !(sum as u16)
}

/// Payload for an Auth request: the device's communication key.
pub fn auth_payload(comm_key: u32) -> Vec<u8> {
    comm_key.to_le_bytes().to_vec()
}

/// Payload for a ReadAttLog request: lower-bound device timestamp as unix
/// seconds, 0 meaning "everything the terminal still holds".
pub fn att_log_request(since: Option<NaiveDateTime>) -> Vec<u8> {
    since
        .map(|t| t.and_utc().timestamp())
        .unwrap_or(0)
        .to_le_bytes()
        .to_vec()
}

/// Decode the code + message body of a Refuse frame.
pub fn parse_refusal(payload: &[u8]) -> ProtocolError {
    if payload.len() < 2 {
        return ProtocolError::Malformed("refusal shorter than code field");
    }
    let code = u16::from_le_bytes([payload[0], payload[1]]);
    let message = String::from_utf8_lossy(&payload[2..]).into_owned();
    ProtocolError::Refused { code, message }
}

/// Parse a ReadAttLog Ack payload into scan events.
///
/// Layout: `count: u32` then `count` 16-byte entries of
/// `bio_id: u32, timestamp: i64 (unix secs, device clock), verify: u8,
/// state: u8, pad: u16`.
pub fn parse_att_log(payload: &[u8]) -> Result<Vec<RawScanEvent>, ProtocolError> {
    let (count, body) = read_count(payload)?;
    if body.len() < count * ATT_ENTRY_LEN {
        return Err(ProtocolError::Truncated("attendance log entries"));
    }

    let mut scans = Vec::with_capacity(count);
    for entry in body.chunks_exact(ATT_ENTRY_LEN).take(count) {
        let bio_id = u32::from_le_bytes([entry[0], entry[1], entry[2], entry[3]]);
        let secs = i64::from_le_bytes([
            entry[4], entry[5], entry[6], entry[7], entry[8], entry[9], entry[10], entry[11],
        ]);
        let timestamp = DateTime::from_timestamp(secs, 0)
            .map(|t| t.naive_utc())
            .ok_or(ProtocolError::Malformed("timestamp out of range"))?;
        scans.push(RawScanEvent {
            bio_id,
            timestamp,
            verify_mode: VerifyMode::from_code(entry[12]),
            raw: entry.to_vec(),
        });
    }
    Ok(scans)
}

/// Parse a ReadUsers Ack payload into roster entries.
///
/// Layout: `count: u32` then `count` entries of `bio_id: u32` plus a
/// 24-byte null-padded name.
pub fn parse_users(payload: &[u8]) -> Result<Vec<RosterEntry>, ProtocolError> {
    let (count, body) = read_count(payload)?;
    if body.len() < count * USER_ENTRY_LEN {
        return Err(ProtocolError::Truncated("user entries"));
    }

    let mut entries = Vec::with_capacity(count);
    for entry in body.chunks_exact(USER_ENTRY_LEN).take(count) {
        let bio_id = u32::from_le_bytes([entry[0], entry[1], entry[2], entry[3]]);
        let name_bytes = &entry[4..];
        let end = name_bytes
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(USER_NAME_LEN);
        entries.push(RosterEntry {
            bio_id,
            name: String::from_utf8_lossy(&name_bytes[..end]).trim().to_string(),
        });
    }
    Ok(entries)
}

fn read_count(payload: &[u8]) -> Result<(usize, &[u8]), ProtocolError> {
    if payload.len() < 4 {
        return Err(ProtocolError::Truncated("entry count"));
    }
    let count = u32::from_le_bytes([payload[0], payload[1], payload[2], payload[3]]) as usize;
    Ok((count, &payload[4..]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn ts(s: &str) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 6, 3)
            .unwrap()
            .and_time(s.parse().unwrap())
    }

    #[test]
    fn frame_roundtrip() {
        let frame = Frame::new(Command::ReadAttLog, 7, 3, att_log_request(Some(ts("08:00:00"))));
        let decoded = Frame::decode(&frame.encode()).unwrap();
        assert_eq!(decoded, frame);
    }

    #[test]
    fn corrupted_frame_fails_checksum() {
        let mut bytes = Frame::new(Command::Connect, 0, 0, vec![]).encode();
        bytes[3] ^= 0x01;
        assert!(matches!(
            Frame::decode(&bytes),
            Err(ProtocolError::ChecksumMismatch { .. }) | Err(ProtocolError::UnknownCommand(_))
        ));
    }

    #[test]
    fn bad_magic_rejected() {
        let mut bytes = Frame::new(Command::Connect, 0, 0, vec![]).encode();
        bytes[0] = 0x00;
        bytes[1] = 0x00;
        assert!(matches!(Frame::decode(&bytes), Err(ProtocolError::BadMagic(0))));
    }

    #[test]
    fn att_log_parses_entries_in_order() {
        let mut payload = 2u32.to_le_bytes().to_vec();
        for (bio_id, secs, verify) in [(34u32, 1_717_400_000i64, 1u8), (35, 1_717_403_600, 15)] {
            payload.extend_from_slice(&bio_id.to_le_bytes());
            payload.extend_from_slice(&secs.to_le_bytes());
            payload.push(verify);
            payload.extend_from_slice(&[0, 0, 0]);
        }

        let scans = parse_att_log(&payload).unwrap();
        assert_eq!(scans.len(), 2);
        assert_eq!(scans[0].bio_id, 34);
        assert_eq!(scans[0].verify_mode, VerifyMode::Fingerprint);
        assert_eq!(scans[1].verify_mode, VerifyMode::Face);
        assert!(scans[0].timestamp < scans[1].timestamp);
        assert_eq!(scans[0].raw.len(), 16);
    }

    #[test]
    fn att_log_truncated_entries_rejected() {
        let mut payload = 3u32.to_le_bytes().to_vec();
        payload.extend_from_slice(&[0u8; 16]); // only one of three entries
        assert!(matches!(
            parse_att_log(&payload),
            Err(ProtocolError::Truncated(_))
        ));
    }

    #[test]
    fn users_parse_null_padded_names() {
        let mut payload = 1u32.to_le_bytes().to_vec();
        payload.extend_from_slice(&34u32.to_le_bytes());
        let mut name = [0u8; 24];
        name[..8].copy_from_slice(b"John Doe");
        payload.extend_from_slice(&name);

        let users = parse_users(&payload).unwrap();
        assert_eq!(
            users,
            vec![RosterEntry {
                bio_id: 34,
                name: "John Doe".into()
            }]
        );
    }

    #[test]
    fn refusal_carries_code_and_message() {
        let mut payload = 5u16.to_le_bytes().to_vec();
        payload.extend_from_slice(b"bad comm key");
        match parse_refusal(&payload) {
            ProtocolError::Refused { code, message } => {
                assert_eq!(code, 5);
                assert_eq!(message, "bad comm key");
            }
            other => panic!("unexpected: {other:?}"),
        }
    }
}
