//! Monitor orchestration: discovery and polling cycles over the fleet.
//!
//! The service owns the in-memory view of the fleet (last discovery
//! snapshot, per-device failure counters) and derives each device's
//! authoritative state from poll outcomes. All persistence goes
//! through [`StatusSync`].

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tokio::sync::{Mutex, RwLock};

use fleetmon_client::pool::DeviceClientPool;
use fleetmon_core::device::DeviceState;
use fleetmon_core::health::{
    state_for_failures, POLL_MAX_ATTEMPTS, POLL_RETRY_DELAYS_MS,
};
use fleetmon_core::retry::retry_with_delays;
use fleetmon_db::models::device::Device;
use fleetmon_db::repositories::device_repo::DeviceRepo;
use fleetmon_db::DbPool;

use crate::discovery::{DiscoveredEndpoint, DiscoveryOrchestrator};
use crate::sync::StatusSync;

/// Devices contacted at once per cycle.
const POLL_CONCURRENCY: usize = 16;

/// Retry shape for a single poll. Injectable so tests can run without
/// real backoff sleeps.
#[derive(Debug, Clone)]
pub struct PollPolicy {
    pub max_attempts: u32,
    pub delays: Vec<Duration>,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            max_attempts: POLL_MAX_ATTEMPTS,
            delays: POLL_RETRY_DELAYS_MS
                .iter()
                .map(|ms| Duration::from_millis(*ms))
                .collect(),
        }
    }
}

/// Drives the fleet through discovery and polling cycles.
pub struct MonitorService {
    pool: DbPool,
    discovery: DiscoveryOrchestrator,
    clients: Arc<DeviceClientPool>,
    sync: StatusSync,
    /// Endpoints from the most recent discovery cycle, keyed by host.
    latest_by_host: RwLock<HashMap<String, DiscoveredEndpoint>>,
    /// Polling is a no-op until the first discovery cycle completes;
    /// otherwise every known device would be marked unreachable.
    has_discovery_run: AtomicBool,
    /// Consecutive poll failures per MAC. Reset on success and on
    /// disappearance from discovery.
    failure_counts: Mutex<HashMap<String, u32>>,
    poll_policy: PollPolicy,
}

impl MonitorService {
    pub fn new(
        pool: DbPool,
        discovery: DiscoveryOrchestrator,
        clients: Arc<DeviceClientPool>,
    ) -> Self {
        Self {
            sync: StatusSync::new(pool.clone()),
            pool,
            discovery,
            clients,
            latest_by_host: RwLock::new(HashMap::new()),
            has_discovery_run: AtomicBool::new(false),
            failure_counts: Mutex::new(HashMap::new()),
            poll_policy: PollPolicy::default(),
        }
    }

    /// Replace the poll retry policy.
    pub fn with_poll_policy(mut self, policy: PollPolicy) -> Self {
        self.poll_policy = policy;
        self
    }

    // -----------------------------------------------------------------------
    // Discovery cycle
    // -----------------------------------------------------------------------

    /// Run one discovery cycle: find endpoints, ingest their current
    /// reports, then reconcile devices that have disappeared.
    pub async fn run_discovery_cycle(&self) {
        let endpoints = self.discovery.discover_devices().await;
        tracing::info!(count = endpoints.len(), "Discovery cycle found endpoints");

        futures::stream::iter(&endpoints)
            .for_each_concurrent(POLL_CONCURRENCY, |endpoint| async move {
                self.ingest_endpoint(endpoint).await;
            })
            .await;

        let snapshot: HashMap<String, DiscoveredEndpoint> = endpoints
            .into_iter()
            .map(|e| (e.host.clone(), e))
            .collect();
        *self.latest_by_host.write().await = snapshot;
        self.has_discovery_run.store(true, Ordering::SeqCst);

        self.reconcile_missing().await;
    }

    /// Fetch and persist the current report of one discovered endpoint.
    ///
    /// Failures here are expected (polling owns the failure state
    /// machine) and only logged.
    async fn ingest_endpoint(&self, endpoint: &DiscoveredEndpoint) {
        let report = match self.sync.fetch_status(&self.clients, &endpoint.host).await {
            Ok(report) => report,
            Err(e) => {
                tracing::debug!(
                    host = %endpoint.host,
                    error = %e,
                    "Discovered endpoint did not answer, deferring to polling",
                );
                return;
            }
        };

        match DeviceRepo::find_by_mac(&self.pool, &report.mac).await {
            Ok(Some(existing)) if existing.host != endpoint.host => {
                tracing::debug!(
                    mac = %report.mac,
                    from = %existing.host,
                    to = %endpoint.host,
                    "Device moved to a new host",
                );
            }
            Ok(_) => {}
            Err(e) => {
                tracing::error!(mac = %report.mac, error = %e, "Device lookup failed");
            }
        }

        // Discovery trusts the report's self-declared state; only the
        // polling success path forces online.
        if let Err(e) = self
            .sync
            .record_report(&report, &endpoint.host, report.state)
            .await
        {
            tracing::error!(mac = %report.mac, error = %e, "Failed to persist device snapshot");
        }
    }

    /// Mark devices whose host vanished from discovery as `Unknown`.
    async fn reconcile_missing(&self) {
        let devices = match DeviceRepo::list(&self.pool).await {
            Ok(devices) => devices,
            Err(e) => {
                tracing::error!(error = %e, "Device listing failed during reconciliation");
                return;
            }
        };

        let known_hosts = self.latest_by_host.read().await;
        for device in devices {
            if known_hosts.contains_key(&device.host) {
                continue;
            }
            self.failure_counts.lock().await.remove(&device.mac);
            if device.state == DeviceState::Unknown {
                continue;
            }
            tracing::info!(
                mac = %device.mac,
                host = %device.host,
                "Device no longer discoverable, marking unknown",
            );
            if let Err(e) = self.sync.record_state(&device.mac, DeviceState::Unknown).await {
                tracing::error!(mac = %device.mac, error = %e, "State update failed");
            }
        }
    }

    // -----------------------------------------------------------------------
    // Polling cycle
    // -----------------------------------------------------------------------

    /// Run one polling cycle over every persisted device.
    pub async fn run_polling_cycle(&self) {
        if !self.has_discovery_run.load(Ordering::SeqCst) {
            tracing::debug!("Skipping polling cycle, discovery has not run yet");
            return;
        }

        let devices = match DeviceRepo::list(&self.pool).await {
            Ok(devices) => devices,
            Err(e) => {
                tracing::error!(error = %e, "Device listing failed, skipping polling cycle");
                return;
            }
        };

        let snapshot = self.latest_by_host.read().await.clone();
        futures::stream::iter(devices)
            .for_each_concurrent(POLL_CONCURRENCY, |device| {
                let snapshot = &snapshot;
                async move {
                    self.poll_device(device, snapshot).await;
                }
            })
            .await;
    }

    async fn poll_device(
        &self,
        device: Device,
        snapshot: &HashMap<String, DiscoveredEndpoint>,
    ) {
        let Some(endpoint) = snapshot.get(&device.host) else {
            self.failure_counts.lock().await.remove(&device.mac);
            if device.state != DeviceState::Unknown {
                tracing::info!(
                    mac = %device.mac,
                    host = %device.host,
                    "Device not in discovery snapshot, marking unknown",
                );
                if let Err(e) = self.sync.record_state(&device.mac, DeviceState::Unknown).await {
                    tracing::error!(mac = %device.mac, error = %e, "State update failed");
                }
            }
            return;
        };

        let result = retry_with_delays(
            self.poll_policy.max_attempts,
            &self.poll_policy.delays,
            || self.sync.fetch_status(&self.clients, &endpoint.host),
        )
        .await;

        match result {
            Ok(report) => {
                self.failure_counts.lock().await.remove(&device.mac);
                if let Err(e) = self
                    .sync
                    .record_report(&report, &endpoint.host, DeviceState::Online)
                    .await
                {
                    tracing::error!(mac = %report.mac, error = %e, "Failed to persist device snapshot");
                }
            }
            Err(e) => {
                let failures = {
                    let mut counts = self.failure_counts.lock().await;
                    let entry = counts.entry(device.mac.clone()).or_insert(0);
                    *entry += 1;
                    *entry
                };
                let state = state_for_failures(failures);
                tracing::error!(
                    mac = %device.mac,
                    host = %device.host,
                    failures,
                    new_state = %state,
                    error = %e,
                    "Device poll failed after retries",
                );
                if device.state != state {
                    if let Err(e) = self.sync.record_state(&device.mac, state).await {
                        tracing::error!(mac = %device.mac, error = %e, "State update failed");
                    }
                }
            }
        }
    }
}
