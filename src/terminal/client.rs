use std::fmt::Display;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;

use super::TerminalLink;
use super::protocol::{
    self, Command, Frame, HEADER_LEN, ProtocolError, att_log_request, auth_payload,
};
use crate::error::{SyncError, SyncResult};
use crate::model::{Device, RawScanEvent, RosterEntry};

/// Production terminal link over TCP.
///
/// Stateless: each fetch opens its own session.
pub struct TcpTerminalLink;

#[async_trait]
impl TerminalLink for TcpTerminalLink {
    async fn fetch_roster(&self, device: &Device) -> SyncResult<Vec<RosterEntry>> {
        let mut session = Session::open(device).await?;
        let result = session.request(Command::ReadUsers, Vec::new()).await;
        session.close().await;

        let frame = result?;
        let users = protocol::parse_users(&frame.payload)
            .map_err(|e| unreachable_err(&device.addr(), e))?;
        tracing::debug!(device_id = device.id, count = users.len(), "Fetched roster");
        Ok(users)
    }

    async fn fetch_scans(
        &self,
        device: &Device,
        since: Option<NaiveDateTime>,
    ) -> SyncResult<Vec<RawScanEvent>> {
        let mut session = Session::open(device).await?;
        let result = session
            .request(Command::ReadAttLog, att_log_request(since))
            .await;
        session.close().await;

        let frame = result?;
        let mut scans = protocol::parse_att_log(&frame.payload)
            .map_err(|e| unreachable_err(&device.addr(), e))?;

        // The `since` bound and ordering are both in device-clock terms;
        // host time never enters the comparison.
        if let Some(since) = since {
            scans.retain(|s| s.timestamp > since);
        }
        scans.sort_by_key(|s| s.timestamp);

        tracing::debug!(device_id = device.id, count = scans.len(), "Fetched scan log");
        Ok(scans)
    }
}

fn unreachable_err(addr: &str, e: impl Display) -> SyncError {
    SyncError::DeviceUnreachable(format!("{addr}: {e}"))
}

/// One live protocol session. Dropped (via `close`) before any fetch
/// returns; never reused across calls.
struct Session {
    stream: TcpStream,
    addr: String,
    timeout: Duration,
    session_id: u16,
    reply_id: u16,
}

impl Session {
    async fn open(device: &Device) -> SyncResult<Session> {
        let addr = device.addr();
        let stream = timeout(device.timeout(), TcpStream::connect(&addr))
            .await
            .map_err(|_| unreachable_err(&addr, "connect timed out"))?
            .map_err(|e| unreachable_err(&addr, e))?;

        let mut session = Session {
            stream,
            addr,
            timeout: device.timeout(),
            session_id: 0,
            reply_id: 0,
        };

        let ack = session.request(Command::Connect, Vec::new()).await?;
        session.session_id = ack.session_id;

        if device.comm_key != 0 {
            session
                .request(Command::Auth, auth_payload(device.comm_key))
                .await?;
        }

        Ok(session)
    }

    /// Send one command frame and read its response, expecting an Ack.
    async fn request(&mut self, command: Command, payload: Vec<u8>) -> SyncResult<Frame> {
        self.reply_id = self.reply_id.wrapping_add(1);
        let frame = Frame::new(command, self.session_id, self.reply_id, payload);

        self.write_frame(&frame).await?;
        let reply = self.read_frame().await?;

        match reply.command {
            Command::Ack => Ok(reply),
            Command::Refuse => Err(unreachable_err(
                &self.addr,
                protocol::parse_refusal(&reply.payload),
            )),
            other => Err(unreachable_err(
                &self.addr,
                format!("unexpected reply {other:?} to {command:?}"),
            )),
        }
    }

    async fn write_frame(&mut self, frame: &Frame) -> SyncResult<()> {
        let bytes = frame.encode();
        timeout(self.timeout, self.stream.write_all(&bytes))
            .await
            .map_err(|_| unreachable_err(&self.addr, "write timed out"))?
            .map_err(|e| unreachable_err(&self.addr, e))?;
        Ok(())
    }

    async fn read_frame(&mut self) -> SyncResult<Frame> {
        let mut header = [0u8; HEADER_LEN];
        self.read_exact(&mut header).await?;

        let payload_len = u16::from_le_bytes([header[10], header[11]]) as usize;
        let mut buf = vec![0u8; HEADER_LEN + payload_len];
        buf[..HEADER_LEN].copy_from_slice(&header);
        self.read_exact(&mut buf[HEADER_LEN..]).await?;

        Frame::decode(&buf).map_err(|e: ProtocolError| unreachable_err(&self.addr, e))
    }

    async fn read_exact(&mut self, buf: &mut [u8]) -> SyncResult<()> {
        timeout(self.timeout, self.stream.read_exact(buf))
            .await
            .map_err(|_| unreachable_err(&self.addr, "read timed out"))?
            .map_err(|e| unreachable_err(&self.addr, e))?;
        Ok(())
    }

    /// Best-effort goodbye; the session is gone either way.
    async fn close(mut self) {
        let frame = Frame::new(
            Command::Disconnect,
            self.session_id,
            self.reply_id.wrapping_add(1),
            Vec::new(),
        );
        if let Err(e) = self.write_frame(&frame).await {
            tracing::debug!(addr = %self.addr, error = %e, "Disconnect frame not delivered");
        }
        let _ = self.stream.shutdown().await;
    }
}
