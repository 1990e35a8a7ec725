pub mod devices;
pub mod health;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /devices             list fleet devices
/// /devices/{mac}       single device by MAC address
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new().merge(devices::router())
}
