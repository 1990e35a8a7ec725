//! Report verification and persistence with change suppression.
//!
//! `StatusSync` sits between polling and the device repository: it
//! verifies each report's digest, suppresses writes when nothing
//! relevant changed, and keeps its suppression cache honest across
//! state-only writes.

use std::collections::HashMap;

use chrono::Utc;
use tokio::sync::Mutex;

use fleetmon_client::pool::DeviceClientPool;
use fleetmon_client::transport::TransportError;
use fleetmon_core::checksum;
use fleetmon_core::device::{checksum_payload, DeviceState, StatusReport};
use fleetmon_db::models::device::{Device, UpsertDevice};
use fleetmon_db::repositories::device_repo::DeviceRepo;
use fleetmon_db::DbPool;

/// Writes device snapshots, skipping upserts whose composite key
/// (authoritative state + report checksum) matches the last write.
pub struct StatusSync {
    pool: DbPool,
    /// mac -> composite key of the last persisted snapshot. Process
    /// lifetime only; a restart re-writes one snapshot per device.
    last_written: Mutex<HashMap<String, String>>,
}

impl StatusSync {
    pub fn new(pool: DbPool) -> Self {
        Self {
            pool,
            last_written: Mutex::new(HashMap::new()),
        }
    }

    /// Fetch a fresh report from `host` through the client pool.
    pub async fn fetch_status(
        &self,
        clients: &DeviceClientPool,
        host: &str,
    ) -> Result<StatusReport, TransportError> {
        clients.get_status_for_endpoint(host).await
    }

    /// Verify and persist a report under an authoritative state.
    ///
    /// A digest mismatch is logged and the report is persisted anyway;
    /// the digest guards against transcription bugs, not bad devices.
    /// Returns whether a row was actually written.
    pub async fn record_report(
        &self,
        report: &StatusReport,
        host: &str,
        state: DeviceState,
    ) -> Result<bool, sqlx::Error> {
        let payload = checksum_payload(report);
        if !checksum::verify(&payload, &report.checksum).await {
            tracing::error!(
                mac = %report.mac,
                host,
                reported = %report.checksum,
                "Status report checksum mismatch",
            );
        }

        let key = composite_key(state, &report.checksum);
        {
            let last_written = self.last_written.lock().await;
            if last_written.get(&report.mac) == Some(&key) {
                tracing::debug!(mac = %report.mac, "Snapshot unchanged, skipping write");
                return Ok(false);
            }
        }

        let input = UpsertDevice::from_report(report, host, state, Utc::now());
        DeviceRepo::upsert(&self.pool, &input).await?;
        self.last_written
            .lock()
            .await
            .insert(report.mac.clone(), key);
        Ok(true)
    }

    /// Persist an authoritative state without a fresh report.
    ///
    /// Also drops the device's suppression entry, so the next full
    /// report is written even if its checksum matches the pre-failure
    /// one. Returns `None` when the MAC is unknown.
    pub async fn record_state(
        &self,
        mac: &str,
        state: DeviceState,
    ) -> Result<Option<Device>, sqlx::Error> {
        let device = DeviceRepo::update_state(&self.pool, mac, state).await?;
        self.last_written.lock().await.remove(mac);
        Ok(device)
    }
}

fn composite_key(state: DeviceState, report_checksum: &str) -> String {
    format!("{state}:{report_checksum}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn composite_key_includes_state_and_checksum() {
        assert_eq!(
            composite_key(DeviceState::Online, "abc123"),
            "online:abc123"
        );
        // Same report under a different authoritative state must not
        // be suppressed.
        assert_ne!(
            composite_key(DeviceState::Online, "abc123"),
            composite_key(DeviceState::Degraded, "abc123"),
        );
    }
}
