//! Periodic driver for the discovery and polling cycles.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::config::MonitorConfig;
use crate::service::MonitorService;

/// Runs the two monitor cycles on their own intervals until shutdown.
///
/// Each cycle runs to completion inside its own task before the next
/// tick is awaited, so cycles of the same kind never overlap; missed
/// ticks are skipped rather than bursted.
pub struct MonitorScheduler {
    service: Arc<MonitorService>,
    discovery_interval: Duration,
    poll_interval: Duration,
}

impl MonitorScheduler {
    pub fn new(service: Arc<MonitorService>, config: &MonitorConfig) -> Self {
        Self {
            service,
            discovery_interval: Duration::from_secs(config.discovery_interval_secs),
            poll_interval: Duration::from_secs(config.poll_interval_secs),
        }
    }

    /// Spawn both cycle loops. The first discovery tick fires
    /// immediately so polling has a snapshot to work from.
    pub fn spawn(self, shutdown: CancellationToken) -> Vec<JoinHandle<()>> {
        let discovery = {
            let service = Arc::clone(&self.service);
            let shutdown = shutdown.clone();
            let period = self.discovery_interval;
            tokio::spawn(async move {
                run_cycle_loop("discovery", period, shutdown, move || {
                    let service = Arc::clone(&service);
                    async move { service.run_discovery_cycle().await }
                })
                .await;
            })
        };

        let polling = {
            let service = Arc::clone(&self.service);
            let period = self.poll_interval;
            tokio::spawn(async move {
                run_cycle_loop("polling", period, shutdown, move || {
                    let service = Arc::clone(&service);
                    async move { service.run_polling_cycle().await }
                })
                .await;
            })
        };

        vec![discovery, polling]
    }
}

async fn run_cycle_loop<F, Fut>(
    name: &'static str,
    period: Duration,
    shutdown: CancellationToken,
    mut cycle: F,
) where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = ()>,
{
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    tracing::info!(cycle = name, period_secs = period.as_secs(), "Cycle loop started");

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                tracing::info!(cycle = name, "Cycle loop stopping");
                break;
            }
            _ = interval.tick() => {
                cycle().await;
            }
        }
    }
}
