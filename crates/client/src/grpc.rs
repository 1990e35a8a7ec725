//! gRPC transport: `DeviceStatusService.GetStatus` over a lazily
//! connected [`tonic`] channel.

use std::time::Duration;

use async_trait::async_trait;
use tonic::transport::{Channel, Endpoint};

use fleetmon_core::device::{DeviceState, StatusReport};

use crate::proto::device_status_service_client::DeviceStatusServiceClient;
use crate::proto::{DeviceStatusReply, GetStatusRequest};

/// Per-call timeout. Devices answer status requests in well under this.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Timeout for establishing the underlying HTTP/2 connection.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// gRPC client for a single device endpoint.
///
/// The channel connects lazily on first use, so construction is cheap
/// and never performs I/O -- incapable hosts cost nothing until probed.
#[derive(Debug)]
pub struct GrpcTransport {
    client: DeviceStatusServiceClient<Channel>,
}

impl GrpcTransport {
    /// Create a transport for a device's gRPC address, e.g.
    /// `http://dev-1:50051`.
    pub fn new(url: &str) -> Result<Self, crate::transport::TransportError> {
        let endpoint = Endpoint::from_shared(url.to_string())
            .map_err(|e| {
                crate::transport::TransportError::InvalidEndpoint(format!("{url}: {e}"))
            })?
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(REQUEST_TIMEOUT);

        let channel = endpoint.connect_lazy();

        Ok(Self {
            client: DeviceStatusServiceClient::new(channel),
        })
    }
}

#[async_trait]
impl crate::transport::DeviceTransport for GrpcTransport {
    async fn fetch_status(&self) -> Result<StatusReport, crate::transport::TransportError> {
        // Tonic clients are cheap clones over the shared channel.
        let mut client = self.client.clone();
        let reply = client.get_status(GetStatusRequest {}).await?.into_inner();
        Ok(report_from_reply(reply))
    }
}

/// Map the protobuf reply into the shared wire struct.
///
/// Empty optional strings are treated as absent so the gRPC and REST
/// forms canonicalize identically for checksum verification.
fn report_from_reply(reply: DeviceStatusReply) -> StatusReport {
    StatusReport {
        mac: reply.mac,
        name: reply.name,
        model: reply.model,
        shortname: reply.shortname,
        ip: reply.ip,
        product_line: reply.product_line,
        state: DeviceState::from_str(&reply.state),
        version: reply.version,
        firmware_status: reply.firmware_status,
        update_available: reply.update_available.filter(|s| !s.is_empty()),
        is_console: reply.is_console,
        is_managed: reply.is_managed,
        startup_time: reply.startup_time,
        adoption_time: reply.adoption_time.filter(|s| !s.is_empty()),
        checksum: reply.checksum,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    use crate::transport::TransportError;

    #[test]
    fn reply_maps_to_status_report() {
        let reply = DeviceStatusReply {
            mac: "AA:BB".into(),
            name: "dev-1".into(),
            model: "UDM-Pro".into(),
            shortname: "udm".into(),
            ip: "10.0.0.2".into(),
            product_line: "network".into(),
            state: "degraded".into(),
            version: "4.1.13".into(),
            firmware_status: "upToDate".into(),
            update_available: Some(String::new()),
            is_console: true,
            is_managed: false,
            startup_time: "2024-06-01T08:30:00.000Z".into(),
            adoption_time: None,
            checksum: "abc123".into(),
        };

        let report = report_from_reply(reply);
        assert_eq!(report.state, DeviceState::Degraded);
        assert_eq!(report.update_available, None);
        assert_eq!(report.mac, "AA:BB");
    }

    #[test]
    fn invalid_url_is_rejected() {
        assert_matches!(
            GrpcTransport::new("not a url"),
            Err(TransportError::InvalidEndpoint(_))
        );
    }
}
