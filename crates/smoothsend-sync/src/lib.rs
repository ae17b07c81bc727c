//! Background monitors for relayer-backed state.
//!
//! Resources polled:
//! - `balance`: the connected account's asset balance (minor units)
//! - `health`: relayer reachability, reduced to online/offline
//! - `stats`: relayer counters for the dashboard
//!
//! Each monitor publishes into a `tokio::sync::watch` slot. A monitor awaits
//! its fetch before scheduling the next one, so at most one request per
//! monitor is in flight.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use smoothsend_tx::{RelayerApi, RelayerStats};
use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Polling intervals.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    pub balance_interval: Duration,
    pub health_interval: Duration,
    pub stats_interval: Duration,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            balance_interval: Duration::from_secs(30),
            health_interval: Duration::from_secs(30),
            stats_interval: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RelayerStatus {
    #[default]
    Unknown,
    Online,
    Offline,
}

/// One periodically refreshed resource.
#[async_trait]
pub trait Monitor: Send + Sync + 'static {
    fn name(&self) -> &'static str;

    fn interval(&self) -> Duration;

    /// Fetch once and publish the result.
    async fn poll_step(&self);
}

/// Balance of one account.
pub struct BalanceMonitor {
    relayer: Arc<dyn RelayerApi>,
    address: String,
    interval: Duration,
    slot: watch::Sender<Option<u64>>,
}

impl BalanceMonitor {
    pub fn new(relayer: Arc<dyn RelayerApi>, address: &str, interval: Duration) -> Self {
        let (slot, _) = watch::channel(None);
        Self {
            relayer,
            address: address.to_string(),
            interval,
            slot,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<u64>> {
        self.slot.subscribe()
    }
}

#[async_trait]
impl Monitor for BalanceMonitor {
    fn name(&self) -> &'static str {
        "balance"
    }

    fn interval(&self) -> Duration {
        self.interval
    }

    async fn poll_step(&self) {
        match self.relayer.balance(&self.address).await {
            Ok(info) => {
                debug!(address = %self.address, amount = info.amount, "balance refreshed");
                self.slot.send_replace(Some(info.amount));
            }
            // keep the last known value
            Err(e) => warn!(address = %self.address, error = %e, "balance refresh failed"),
        }
    }
}

/// Relayer health.
pub struct HealthMonitor {
    relayer: Arc<dyn RelayerApi>,
    interval: Duration,
    slot: watch::Sender<RelayerStatus>,
}

impl HealthMonitor {
    pub fn new(relayer: Arc<dyn RelayerApi>, interval: Duration) -> Self {
        let (slot, _) = watch::channel(RelayerStatus::Unknown);
        Self {
            relayer,
            interval,
            slot,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<RelayerStatus> {
        self.slot.subscribe()
    }
}

#[async_trait]
impl Monitor for HealthMonitor {
    fn name(&self) -> &'static str {
        "health"
    }

    fn interval(&self) -> Duration {
        self.interval
    }

    async fn poll_step(&self) {
        let status = match self.relayer.health().await {
            Ok(report) if report.is_healthy() => RelayerStatus::Online,
            Ok(report) => {
                warn!(status = %report.status, "relayer reports unhealthy");
                RelayerStatus::Offline
            }
            Err(e) => {
                warn!(error = %e, "relayer health check failed");
                RelayerStatus::Offline
            }
        };
        let previous = self.slot.send_replace(status);
        if previous != status {
            info!(?previous, ?status, "relayer status changed");
        }
    }
}

/// Relayer counters.
pub struct StatsMonitor {
    relayer: Arc<dyn RelayerApi>,
    interval: Duration,
    slot: watch::Sender<Option<RelayerStats>>,
}

impl StatsMonitor {
    pub fn new(relayer: Arc<dyn RelayerApi>, interval: Duration) -> Self {
        let (slot, _) = watch::channel(None);
        Self {
            relayer,
            interval,
            slot,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<RelayerStats>> {
        self.slot.subscribe()
    }
}

#[async_trait]
impl Monitor for StatsMonitor {
    fn name(&self) -> &'static str {
        "stats"
    }

    fn interval(&self) -> Duration {
        self.interval
    }

    async fn poll_step(&self) {
        match self.relayer.stats().await {
            Ok(stats) => {
                self.slot.send_replace(Some(stats));
            }
            Err(e) => warn!(error = %e, "relayer stats refresh failed"),
        }
    }
}

/// Run `monitor` until `shutdown` fires. The first poll happens immediately.
pub async fn run<M: Monitor>(monitor: Arc<M>, refresh: Arc<Notify>, shutdown: CancellationToken) {
    info!(
        monitor = monitor.name(),
        interval_secs = monitor.interval().as_secs(),
        "monitor starting"
    );

    loop {
        tokio::select! {
            _ = monitor.poll_step() => {},
            _ = shutdown.cancelled() => break,
        }

        tokio::select! {
            _ = tokio::time::sleep(monitor.interval()) => {},
            _ = refresh.notified() => debug!(monitor = monitor.name(), "refresh requested"),
            _ = shutdown.cancelled() => break,
        }
    }

    info!(monitor = monitor.name(), "monitor shutting down");
}

/// Owns one running monitor task. Dropping the handle stops the task.
pub struct PollerHandle {
    shutdown: CancellationToken,
    refresh: Arc<Notify>,
    task: Option<JoinHandle<()>>,
}

impl PollerHandle {
    /// Spawn `monitor` on the current runtime.
    pub fn start<M: Monitor>(monitor: Arc<M>) -> Self {
        let shutdown = CancellationToken::new();
        let refresh = Arc::new(Notify::new());
        let task = tokio::spawn(run(monitor, refresh.clone(), shutdown.clone()));
        Self {
            shutdown,
            refresh,
            task: Some(task),
        }
    }

    /// Poll now instead of waiting out the interval.
    pub fn refresh(&self) {
        self.refresh.notify_one();
    }

    pub fn is_running(&self) -> bool {
        !self.shutdown.is_cancelled()
    }

    /// Cancel and wait for the task to exit.
    pub async fn stop(mut self) {
        self.shutdown.cancel();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!(error = %e, "monitor task ended abnormally");
            }
        }
    }
}

impl Drop for PollerHandle {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

/// Balance, health and stats monitors for one connected account.
pub struct Monitors {
    pub balance: watch::Receiver<Option<u64>>,
    pub status: watch::Receiver<RelayerStatus>,
    pub stats: watch::Receiver<Option<RelayerStats>>,
    balance_handle: PollerHandle,
    health_handle: PollerHandle,
    stats_handle: PollerHandle,
}

impl Monitors {
    pub fn start(config: &MonitorConfig, relayer: Arc<dyn RelayerApi>, address: &str) -> Self {
        let balance = Arc::new(BalanceMonitor::new(
            relayer.clone(),
            address,
            config.balance_interval,
        ));
        let health = Arc::new(HealthMonitor::new(relayer.clone(), config.health_interval));
        let stats = Arc::new(StatsMonitor::new(relayer, config.stats_interval));

        Self {
            balance: balance.subscribe(),
            status: health.subscribe(),
            stats: stats.subscribe(),
            balance_handle: PollerHandle::start(balance),
            health_handle: PollerHandle::start(health),
            stats_handle: PollerHandle::start(stats),
        }
    }

    /// Re-fetch the balance now, e.g. after a confirmed transfer.
    pub fn refresh_balance(&self) {
        self.balance_handle.refresh();
    }

    pub async fn stop(self) {
        self.balance_handle.stop().await;
        self.health_handle.stop().await;
        self.stats_handle.stop().await;
    }
}
