//! Read-only device endpoints over the monitor's persisted snapshots.

use axum::extract::{Path, State};
use axum::{routing::get, Json, Router};

use fleetmon_db::models::device::Device;
use fleetmon_db::repositories::device_repo::DeviceRepo;

use crate::error::{AppError, AppResult};
use crate::state::AppState;

/// GET /api/v1/devices -- all devices ordered by name.
async fn list_devices(State(state): State<AppState>) -> AppResult<Json<Vec<Device>>> {
    let devices = DeviceRepo::list(&state.pool).await?;
    Ok(Json(devices))
}

/// GET /api/v1/devices/{mac} -- a single device by MAC address.
async fn get_device(
    State(state): State<AppState>,
    Path(mac): Path<String>,
) -> AppResult<Json<Device>> {
    let device = DeviceRepo::find_by_mac(&state.pool, &mac)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Device with mac {mac} not found")))?;
    Ok(Json(device))
}

/// Mount device routes under `/api/v1`.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/devices", get(list_devices))
        .route("/devices/{mac}", get(get_device))
}
