//! Realtime broadcaster: channel-grouped fan-out of change events to
//! permission-scoped subscribers.
//!
//! Transport-agnostic: a subscriber is just the sending half of an
//! unbounded mpsc channel of serialized payloads. Whatever owns the
//! actual socket forwards from the receiver and calls `disconnect` when
//! the peer goes away. Delivery is at-most-once, FIFO per connection.

use std::collections::{HashMap, HashSet};

use bytes::Bytes;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::{RwLock, mpsc};

use crate::model::{ChangeEvent, SyncStatus};

/// Caller role as reported by the identity service.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    strum_macros::Display,
    strum_macros::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Role {
    Admin,
    Manager,
    Employee,
}

/// Channel names follow `{domain}:{scope}`.
pub mod channels {
    pub const ATTENDANCE_ALL: &str = "attendance:all";
    pub const DEVICES_ALL: &str = "devices:all";

    pub fn attendance_employee(employee_id: u64) -> String {
        format!("attendance:employee:{employee_id}")
    }
}

/// The single permission rule, applied both at connect time and on every
/// explicit subscribe request.
pub fn channel_allowed(role: Role, employee_id: Option<u64>, channel: &str) -> bool {
    match role {
        Role::Admin | Role::Manager => true,
        Role::Employee => {
            employee_id.is_some_and(|id| channel == channels::attendance_employee(id))
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SubscribeError {
    #[error("role not authorized for channel {0}")]
    Denied(String),

    #[error("unknown connection {0}")]
    UnknownConnection(String),
}

struct Subscriber {
    role: Role,
    employee_id: Option<u64>,
    channels: HashSet<String>,
    sender: mpsc::UnboundedSender<Bytes>,
}

/// Explicitly constructed fan-out hub; wrap in `Arc` and pass to whatever
/// wiring needs it. Holds no state beyond live subscriptions.
#[derive(Default)]
pub struct Broadcaster {
    conns: RwLock<HashMap<String, Subscriber>>,
}

impl Broadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_conn_id() -> String {
        uuid::Uuid::new_v4().to_string()
    }

    /// Register a connection and seed its channel set from the caller's
    /// role. Returns the receiver half to forward to the transport.
    pub async fn connect(
        &self,
        conn_id: String,
        role: Role,
        employee_id: Option<u64>,
    ) -> mpsc::UnboundedReceiver<Bytes> {
        let mut initial = HashSet::new();
        match role {
            Role::Admin | Role::Manager => {
                initial.insert(channels::ATTENDANCE_ALL.to_string());
                initial.insert(channels::DEVICES_ALL.to_string());
            }
            Role::Employee => {
                if let Some(id) = employee_id {
                    initial.insert(channels::attendance_employee(id));
                }
            }
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let subscriber = Subscriber {
            role,
            employee_id,
            channels: initial,
            sender: tx,
        };
        self.conns.write().await.insert(conn_id, subscriber);
        rx
    }

    /// Add a channel, re-checking the same permission rule used at
    /// connect time. A client never gets a channel its role does not
    /// authorize, even if it asks.
    pub async fn subscribe(&self, conn_id: &str, channel: &str) -> Result<(), SubscribeError> {
        let mut conns = self.conns.write().await;
        let sub = conns
            .get_mut(conn_id)
            .ok_or_else(|| SubscribeError::UnknownConnection(conn_id.to_string()))?;

        if !channel_allowed(sub.role, sub.employee_id, channel) {
            tracing::warn!(conn_id, channel, role = %sub.role, "Subscription denied");
            return Err(SubscribeError::Denied(channel.to_string()));
        }
        sub.channels.insert(channel.to_string());
        Ok(())
    }

    pub async fn unsubscribe(&self, conn_id: &str, channel: &str) -> Result<(), SubscribeError> {
        let mut conns = self.conns.write().await;
        let sub = conns
            .get_mut(conn_id)
            .ok_or_else(|| SubscribeError::UnknownConnection(conn_id.to_string()))?;
        sub.channels.remove(channel);
        Ok(())
    }

    /// Drop all subscription state for a connection.
    pub async fn disconnect(&self, conn_id: &str) {
        self.conns.write().await.remove(conn_id);
    }

    pub async fn connection_count(&self) -> usize {
        self.conns.read().await.len()
    }

    /// Best-effort delivery to every subscriber of `channel`. A broken
    /// connection is pruned, never allowed to abort delivery to others.
    /// Returns the number of subscribers reached.
    pub async fn broadcast(&self, channel: &str, payload: Bytes) -> usize {
        let mut dead: Vec<String> = Vec::new();
        let mut delivered = 0;
        {
            let conns = self.conns.read().await;
            for (conn_id, sub) in conns.iter() {
                if !sub.channels.contains(channel) {
                    continue;
                }
                if sub.sender.send(payload.clone()).is_ok() {
                    delivered += 1;
                } else {
                    dead.push(conn_id.clone());
                }
            }
        }

        if !dead.is_empty() {
            let mut conns = self.conns.write().await;
            for conn_id in &dead {
                conns.remove(conn_id);
            }
            tracing::debug!(channel, pruned = dead.len(), "Removed broken subscribers");
        }
        delivered
    }

    /// Fan an attendance change out to the all-attendance channel and the
    /// owning employee's own channel.
    pub async fn publish_change(&self, event: &ChangeEvent) {
        let payload = event.to_bytes();
        self.broadcast(channels::ATTENDANCE_ALL, payload.clone())
            .await;
        self.broadcast(
            &channels::attendance_employee(event.employee_id),
            payload,
        )
        .await;
    }

    /// Announce a device health transition on `devices:all`.
    pub async fn publish_device_health(
        &self,
        device_id: u64,
        status: SyncStatus,
        error: Option<&str>,
    ) {
        let payload = serde_json::json!({
            "device_id": device_id,
            "status": status,
            "error": error,
            "at": Utc::now(),
        });
        self.broadcast(
            channels::DEVICES_ALL,
            Bytes::from(payload.to_string().into_bytes()),
        )
        .await;
    }

    /// Close every connection (drop all senders) during shutdown.
    pub async fn shutdown_all(&self) {
        let mut conns = self.conns.write().await;
        let count = conns.len();
        conns.clear();
        if count > 0 {
            tracing::info!(count, "Closed all realtime subscribers");
        }
    }
}
