//! Sync scheduler: one recurring timer per active device plus a global
//! sweep backstop.
//!
//! Each device runs its own cooperative task parked on a periodic timer;
//! a tick is not scheduled again until the previous one completes, so
//! two syncs for the same device never overlap. Different devices run
//! fully in parallel and share state only through the registry and the
//! reconciliation engine.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{Duration as ChronoDuration, NaiveDateTime, Utc};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::error::SyncResult;
use crate::model::{Device, DeviceSyncStatus, SyncStatus};
use crate::realtime::Broadcaster;
use crate::recon::{ReconEngine, SyncSummary};
use crate::registry::DeviceRegistry;
use crate::store::EmployeeStore;
use crate::terminal::TerminalLink;

#[derive(Debug, Clone, Copy)]
pub struct SchedulerConfig {
    /// Recency window for unattended scheduled syncs.
    pub narrow_lookback: ChronoDuration,
    /// Recency window for operator-forced syncs.
    pub wide_lookback: ChronoDuration,
    /// Cadence of the global backstop sweep.
    pub sweep_interval: std::time::Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            narrow_lookback: ChronoDuration::minutes(10),
            wide_lookback: ChronoDuration::days(7),
            sweep_interval: std::time::Duration::from_secs(300),
        }
    }
}

struct DeviceTimer {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// Owns all per-device timers. Explicitly constructed and shared via
/// `Arc`; holding the timer map here (not in globals) keeps multiple
/// scheduler instances independent in tests.
pub struct SyncScheduler {
    registry: Arc<dyn DeviceRegistry>,
    link: Arc<dyn TerminalLink>,
    engine: Arc<ReconEngine>,
    employees: Arc<dyn EmployeeStore>,
    broadcaster: Arc<Broadcaster>,
    config: SchedulerConfig,
    timers: Mutex<HashMap<u64, DeviceTimer>>,
    /// Per-device high-water mark of the newest device-clock timestamp
    /// reconciled so far. Device clocks are not trusted against host
    /// time, so the cursor lives entirely in device terms. Lost on
    /// restart; the sweep plus the idempotent upsert rule cover that.
    cursors: Mutex<HashMap<u64, NaiveDateTime>>,
    sweep: Mutex<Option<JoinHandle<()>>>,
    shutdown: CancellationToken,
}

impl SyncScheduler {
    pub fn new(
        registry: Arc<dyn DeviceRegistry>,
        link: Arc<dyn TerminalLink>,
        engine: Arc<ReconEngine>,
        employees: Arc<dyn EmployeeStore>,
        broadcaster: Arc<Broadcaster>,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            registry,
            link,
            engine,
            employees,
            broadcaster,
            config,
            timers: Mutex::new(HashMap::new()),
            cursors: Mutex::new(HashMap::new()),
            sweep: Mutex::new(None),
            shutdown: CancellationToken::new(),
        }
    }

    /// Start a timer for every active device plus the sweep task.
    pub async fn start(self: &Arc<Self>) -> SyncResult<()> {
        let devices = self.registry.list_active().await?;
        tracing::info!(count = devices.len(), "Starting device sync timers");
        for device in devices {
            self.start_device(device).await;
        }

        let scheduler = Arc::clone(self);
        let cancel = self.shutdown.child_token();
        *self.sweep.lock().await = Some(tokio::spawn(async move {
            scheduler.run_sweep(cancel).await;
        }));
        Ok(())
    }

    /// Start (or restart) the timer for one device.
    ///
    /// Any previous timer is fully stopped first (its in-flight tick is
    /// awaited) so two timers for the same device never coexist. This is
    /// also how a cadence change is applied.
    pub async fn start_device(self: &Arc<Self>, device: Device) {
        self.stop_device(device.id).await;
        if !device.is_active {
            return;
        }

        let cancel = self.shutdown.child_token();
        let scheduler = Arc::clone(self);
        let task_cancel = cancel.clone();
        let device_id = device.id;
        let handle = tokio::spawn(async move {
            scheduler.run_device_loop(device, task_cancel).await;
        });

        self.timers
            .lock()
            .await
            .insert(device_id, DeviceTimer { cancel, handle });
    }

    /// Stop a device's timer, letting an in-flight sync finish or time
    /// out rather than killing it mid-write.
    pub async fn stop_device(&self, device_id: u64) {
        let timer = self.timers.lock().await.remove(&device_id);
        if let Some(timer) = timer {
            timer.cancel.cancel();
            let _ = timer.handle.await;
            tracing::debug!(device_id, "Device timer stopped");
        }
    }

    /// Cancel all timers and the sweep; in-flight syncs drain first.
    pub async fn shutdown(&self) {
        self.shutdown.cancel();

        if let Some(handle) = self.sweep.lock().await.take() {
            let _ = handle.await;
        }

        let timers: Vec<DeviceTimer> = {
            let mut map = self.timers.lock().await;
            map.drain().map(|(_, t)| t).collect()
        };
        let count = timers.len();
        for timer in timers {
            timer.cancel.cancel();
            let _ = timer.handle.await;
        }
        tracing::info!(count, "Sync scheduler stopped");
    }

    async fn run_device_loop(self: Arc<Self>, device: Device, cancel: CancellationToken) {
        let mut interval = tokio::time::interval(device.sync_interval());
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tracing::info!(
            device_id = device.id,
            interval_secs = device.sync_interval_secs,
            "Device sync timer started"
        );

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = interval.tick() => {
                    if let Err(e) = self.sync_device(device.id, false).await {
                        tracing::debug!(device_id = device.id, error = %e, "Scheduled sync failed");
                    }
                }
            }
        }
    }

    /// Global backstop: restores timers lost to a crash/restart and
    /// restarts timers whose device has not attempted a sync for well
    /// past its cadence.
    async fn run_sweep(self: Arc<Self>, cancel: CancellationToken) {
        let mut interval = tokio::time::interval(self.config.sweep_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = interval.tick() => {
                    if let Err(e) = self.sweep_once().await {
                        tracing::error!(error = %e, "Sync sweep failed");
                    }
                }
            }
        }
    }

    async fn sweep_once(self: &Arc<Self>) -> SyncResult<()> {
        let devices = self.registry.list_active().await?;
        for device in devices {
            let has_timer = self.timers.lock().await.contains_key(&device.id);
            if !has_timer {
                tracing::warn!(device_id = device.id, "No timer for active device, starting one");
                self.start_device(device).await;
                continue;
            }

            let cadence = ChronoDuration::seconds(i64::from(device.sync_interval_secs.max(1)));
            let overdue = device
                .last_sync_time
                .is_none_or(|t| Utc::now() - t > cadence * 2);
            if overdue {
                // Restarting keeps the one-timer-per-device invariant
                // while forcing an immediate tick. The doubled threshold
                // leaves a live-but-slow timer alone.
                tracing::warn!(device_id = device.id, "Device overdue, restarting its timer");
                self.start_device(device).await;
            }
        }
        Ok(())
    }

    /// Run one sync pass for a device and record its health either way.
    ///
    /// `forced` is the operator path: roster sync first, wide look-back,
    /// and no cursor bound, so the whole retained log is considered.
    pub async fn sync_device(&self, device_id: u64, forced: bool) -> SyncResult<SyncSummary> {
        let device = self.registry.get(device_id).await?;

        let result = self.sync_pass(&device, forced).await;

        let at = Utc::now();
        let (status, error) = match &result {
            Ok(_) => (SyncStatus::Success, None),
            Err(e) => (SyncStatus::Failed, Some(e.to_string())),
        };
        // A failed health write is logged, never allowed to fail the
        // sync attempt itself.
        if let Err(e) = self
            .registry
            .record_sync_outcome(device_id, status, error.as_deref(), at)
            .await
        {
            tracing::error!(device_id, error = %e, "Failed to persist device health");
        }
        self.broadcaster
            .publish_device_health(device_id, status, error.as_deref())
            .await;

        if let Err(e) = &result {
            tracing::warn!(device_id, forced, error = %e, "Device sync failed");
        }
        result
    }

    async fn sync_pass(&self, device: &Device, forced: bool) -> SyncResult<SyncSummary> {
        if forced {
            self.roster_pass(device).await?;
        }

        let since = if forced {
            None
        } else {
            self.cursors.lock().await.get(&device.id).copied()
        };
        let lookback = if forced {
            self.config.wide_lookback
        } else {
            self.config.narrow_lookback
        };

        let batch = self.link.fetch_scans(device, since).await?;
        let newest = batch.last().map(|s| s.timestamp);

        let summary = self.engine.reconcile(device.id, batch, lookback).await?;

        if let Some(ts) = newest {
            self.cursors.lock().await.insert(device.id, ts);
        }
        Ok(summary)
    }

    /// Pull the device roster and upsert inert employee rows for any new
    /// or renamed entries. Returns how many employees were created.
    pub async fn sync_roster(&self, device_id: u64) -> SyncResult<u32> {
        let device = self.registry.get(device_id).await?;
        self.roster_pass(&device).await
    }

    async fn roster_pass(&self, device: &Device) -> SyncResult<u32> {
        let roster = self.link.fetch_roster(device).await?;

        let upserts = roster
            .iter()
            .map(|entry| self.employees.upsert_from_roster(entry.bio_id, &entry.name));
        let mut created = 0u32;
        for result in futures::future::join_all(upserts).await {
            if result? {
                created += 1;
            }
        }
        tracing::info!(
            device_id = device.id,
            roster = roster.len(),
            created,
            "Roster sync complete"
        );
        Ok(created)
    }

    /// Health snapshot for every active device.
    pub async fn status(&self) -> SyncResult<Vec<DeviceSyncStatus>> {
        let devices = self.registry.list_active().await?;
        Ok(devices.iter().map(DeviceSyncStatus::from).collect())
    }

    /// Number of live per-device timers.
    pub async fn timer_count(&self) -> usize {
        self.timers.lock().await.len()
    }
}
