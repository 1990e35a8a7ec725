//! Device entity model and upsert DTO.

use serde::Serialize;
use sqlx::FromRow;

use fleetmon_core::device::{DeviceState, StatusReport};
use fleetmon_core::types::{DbId, Timestamp};

// ---------------------------------------------------------------------------
// Entity struct (matches the `devices` table)
// ---------------------------------------------------------------------------

/// A device row from the `devices` table.
///
/// `state` is authoritative (derived from poll outcomes); `checksum` is
/// the last report's self-declared digest.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Device {
    pub id: DbId,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    pub mac: String,
    pub name: String,
    pub model: String,
    pub shortname: String,
    pub ip: String,
    pub product_line: String,
    pub state: DeviceState,
    pub version: String,
    pub firmware_status: String,
    pub update_available: Option<String>,
    pub is_console: bool,
    pub is_managed: bool,
    pub startup_time: Timestamp,
    pub adoption_time: Option<Timestamp>,
    pub checksum: String,
    /// Endpoint host the device was last reached at.
    pub host: String,
    pub last_seen_at: Timestamp,
}

// ---------------------------------------------------------------------------
// Write DTO
// ---------------------------------------------------------------------------

/// DTO for upserting a device snapshot, keyed by `mac`.
#[derive(Debug, Clone)]
pub struct UpsertDevice {
    pub mac: String,
    pub name: String,
    pub model: String,
    pub shortname: String,
    pub ip: String,
    pub product_line: String,
    pub state: DeviceState,
    pub version: String,
    pub firmware_status: String,
    pub update_available: Option<String>,
    pub is_console: bool,
    pub is_managed: bool,
    pub startup_time: Timestamp,
    pub adoption_time: Option<Timestamp>,
    pub checksum: String,
    pub host: String,
    pub last_seen_at: Timestamp,
}

impl UpsertDevice {
    /// Build an upsert DTO from a fetched status report.
    ///
    /// `state` is the *authoritative* state, which may differ from the
    /// report's self-declared one.
    pub fn from_report(
        report: &StatusReport,
        host: &str,
        state: DeviceState,
        now: Timestamp,
    ) -> Self {
        Self {
            mac: report.mac.clone(),
            name: report.name.clone(),
            model: report.model.clone(),
            shortname: report.shortname.clone(),
            ip: report.ip.clone(),
            product_line: report.product_line.clone(),
            state,
            version: report.version.clone(),
            firmware_status: report.firmware_status.clone(),
            update_available: report.update_available.clone(),
            is_console: report.is_console,
            is_managed: report.is_managed,
            startup_time: report.startup_timestamp(),
            adoption_time: report.adoption_timestamp(),
            checksum: report.checksum.clone(),
            host: host.to_string(),
            last_seen_at: now,
        }
    }
}
