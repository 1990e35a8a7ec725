//! Repository for the `devices` table.

use sqlx::PgPool;

use fleetmon_core::device::DeviceState;

use crate::models::device::{Device, UpsertDevice};

/// Column list for `devices` queries.
const COLUMNS: &str = "\
    id, created_at, updated_at, mac, name, model, shortname, ip, \
    product_line, state, version, firmware_status, update_available, \
    is_console, is_managed, startup_time, adoption_time, checksum, \
    host, last_seen_at";

/// Provides read and upsert operations for device snapshots.
pub struct DeviceRepo;

impl DeviceRepo {
    // ── Queries ──────────────────────────────────────────────────────────

    /// List all devices ordered by name (the query surface).
    pub async fn list(pool: &PgPool) -> Result<Vec<Device>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM devices ORDER BY name ASC");
        sqlx::query_as::<_, Device>(&query).fetch_all(pool).await
    }

    /// Find a device by its MAC address.
    pub async fn find_by_mac(pool: &PgPool, mac: &str) -> Result<Option<Device>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM devices WHERE mac = $1");
        sqlx::query_as::<_, Device>(&query)
            .bind(mac)
            .fetch_optional(pool)
            .await
    }

    // ── Mutations ────────────────────────────────────────────────────────

    /// Insert a device snapshot, or replace all snapshot fields on
    /// `mac` conflict.
    pub async fn upsert(pool: &PgPool, input: &UpsertDevice) -> Result<Device, sqlx::Error> {
        let query = format!(
            "INSERT INTO devices (mac, name, model, shortname, ip, product_line, state, \
                version, firmware_status, update_available, is_console, is_managed, \
                startup_time, adoption_time, checksum, host, last_seen_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)
             ON CONFLICT (mac) DO UPDATE SET
                name = EXCLUDED.name,
                model = EXCLUDED.model,
                shortname = EXCLUDED.shortname,
                ip = EXCLUDED.ip,
                product_line = EXCLUDED.product_line,
                state = EXCLUDED.state,
                version = EXCLUDED.version,
                firmware_status = EXCLUDED.firmware_status,
                update_available = EXCLUDED.update_available,
                is_console = EXCLUDED.is_console,
                is_managed = EXCLUDED.is_managed,
                startup_time = EXCLUDED.startup_time,
                adoption_time = EXCLUDED.adoption_time,
                checksum = EXCLUDED.checksum,
                host = EXCLUDED.host,
                last_seen_at = EXCLUDED.last_seen_at,
                updated_at = NOW()
             RETURNING {COLUMNS}"
        );

        sqlx::query_as::<_, Device>(&query)
            .bind(&input.mac)
            .bind(&input.name)
            .bind(&input.model)
            .bind(&input.shortname)
            .bind(&input.ip)
            .bind(&input.product_line)
            .bind(input.state)
            .bind(&input.version)
            .bind(&input.firmware_status)
            .bind(&input.update_available)
            .bind(input.is_console)
            .bind(input.is_managed)
            .bind(input.startup_time)
            .bind(input.adoption_time)
            .bind(&input.checksum)
            .bind(&input.host)
            .bind(input.last_seen_at)
            .fetch_one(pool)
            .await
    }

    /// Update only the authoritative state of a device.
    ///
    /// Used by the failure and reconciliation paths, where no fresh
    /// report exists. Returns `None` when the MAC is unknown.
    pub async fn update_state(
        pool: &PgPool,
        mac: &str,
        state: DeviceState,
    ) -> Result<Option<Device>, sqlx::Error> {
        let query = format!(
            "UPDATE devices SET state = $2, updated_at = NOW() \
             WHERE mac = $1 RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Device>(&query)
            .bind(mac)
            .bind(state)
            .fetch_optional(pool)
            .await
    }
}
