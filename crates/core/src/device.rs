//! Device domain types: health state and the status report wire format.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::Timestamp;

// ---------------------------------------------------------------------------
// DeviceState
// ---------------------------------------------------------------------------

/// Health state of a fleet device.
///
/// The persisted state is *authoritative*: it is derived from poll
/// outcomes and may override the state a device reports about itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "device_state", rename_all = "lowercase")]
pub enum DeviceState {
    /// Most recent poll succeeded.
    Online,
    /// 1-2 consecutive poll failures while still discoverable.
    Degraded,
    /// 3+ consecutive poll failures while still discoverable.
    Offline,
    /// Not currently discoverable.
    Unknown,
}

impl DeviceState {
    /// String representation matching the `device_state` database enum.
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceState::Online => "online",
            DeviceState::Degraded => "degraded",
            DeviceState::Offline => "offline",
            DeviceState::Unknown => "unknown",
        }
    }

    /// Parse from a string, defaulting to `Unknown` for unrecognized values.
    pub fn from_str(s: &str) -> Self {
        match s {
            "online" => DeviceState::Online,
            "degraded" => DeviceState::Degraded,
            "offline" => DeviceState::Offline,
            _ => DeviceState::Unknown,
        }
    }
}

impl std::fmt::Display for DeviceState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// StatusReport
// ---------------------------------------------------------------------------

/// Status payload returned by a device endpoint.
///
/// The wire form uses camelCase keys. `checksum` is computed by the
/// reporter over the canonical JSON form of every other field; see
/// [`checksum_payload`] for the exact payload that gets verified.
///
/// Timestamps stay as raw strings here: re-parsing and re-serializing
/// them would change the byte form the reporter hashed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusReport {
    pub mac: String,
    pub name: String,
    pub model: String,
    pub shortname: String,
    pub ip: String,
    pub product_line: String,
    /// Self-reported state. Advisory only; see [`DeviceState`].
    pub state: DeviceState,
    pub version: String,
    pub firmware_status: String,
    /// Not all firmware generations report this field.
    #[serde(default)]
    pub update_available: Option<String>,
    pub is_console: bool,
    pub is_managed: bool,
    /// RFC 3339 instant the device last booted.
    pub startup_time: String,
    /// RFC 3339 adoption instant; absent or empty when never adopted.
    #[serde(default)]
    pub adoption_time: Option<String>,
    /// Reporter-computed digest over all other fields.
    pub checksum: String,
}

impl StatusReport {
    /// Parse `startup_time`, falling back to `now` when malformed.
    pub fn startup_timestamp(&self) -> Timestamp {
        parse_rfc3339(&self.startup_time).unwrap_or_else(Utc::now)
    }

    /// Parse `adoption_time`; `None` when absent, empty, or malformed.
    pub fn adoption_timestamp(&self) -> Option<Timestamp> {
        self.adoption_time
            .as_deref()
            .filter(|s| !s.is_empty())
            .and_then(parse_rfc3339)
    }
}

fn parse_rfc3339(s: &str) -> Option<Timestamp> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Build the JSON payload a reporter's checksum covers.
///
/// Strips `checksum` and normalizes an absent `updateAvailable` to an
/// explicit JSON `null` -- older reporters omit the field entirely but
/// hash it as `null`.
pub fn checksum_payload(report: &StatusReport) -> serde_json::Value {
    let mut value = serde_json::to_value(report)
        .expect("StatusReport is always serialisable");

    if let Some(obj) = value.as_object_mut() {
        obj.remove("checksum");
        obj.entry("updateAvailable")
            .or_insert(serde_json::Value::Null);
    }

    value
}
