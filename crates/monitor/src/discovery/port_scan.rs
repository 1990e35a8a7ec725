//! Discovery by probing a port range on a single host. Intended for
//! local fleets where devices are published on sequential ports.

use std::time::Duration;

use async_trait::async_trait;
use futures::future::join_all;

use super::{DiscoveredEndpoint, DiscoveryStrategy};
use crate::config::MonitorConfig;

pub struct PortScanDiscovery {
    client: reqwest::Client,
    host: String,
    start_port: u16,
    end_port: u16,
    timeout: Duration,
    http_protocol: String,
}

impl PortScanDiscovery {
    pub fn new(config: &MonitorConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            host: config.port_scan_host.clone(),
            start_port: config.port_scan_start,
            end_port: config.port_scan_end,
            timeout: Duration::from_millis(config.port_scan_timeout_ms),
            http_protocol: config.device_http_protocol.clone(),
        }
    }

    /// Probe one port; `Some` when something answered the status route
    /// with a success code.
    async fn probe(&self, port: u16) -> Option<DiscoveredEndpoint> {
        let endpoint = self.endpoint_for(port);
        let response = self
            .client
            .get(format!("{}/v1/device/status", endpoint.url))
            .timeout(self.timeout)
            .send()
            .await
            .ok()?;

        if !response.status().is_success() {
            return None;
        }

        Some(endpoint)
    }

    /// Endpoint identity for a responsive port. The port stays part of
    /// the host so devices sharing the scan address remain distinct
    /// snapshot entries and are dialed on their own port.
    fn endpoint_for(&self, port: u16) -> DiscoveredEndpoint {
        let authority = format!("{}:{port}", self.host);
        DiscoveredEndpoint {
            id: authority.clone(),
            name: authority.clone(),
            url: format!("{}://{authority}", self.http_protocol),
            host: authority,
        }
    }
}

#[async_trait]
impl DiscoveryStrategy for PortScanDiscovery {
    fn name(&self) -> &'static str {
        "PortScanDiscovery"
    }

    async fn discover(&self) -> Vec<DiscoveredEndpoint> {
        if self.start_port > self.end_port {
            tracing::warn!(
                start = self.start_port,
                end = self.end_port,
                "Invalid port scan range, returning no endpoints",
            );
            return Vec::new();
        }

        let probes = (self.start_port..=self.end_port).map(|port| self.probe(port));
        join_all(probes)
            .await
            .into_iter()
            .flatten()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scanned_endpoints_keep_their_port_identity() {
        let strategy = PortScanDiscovery::new(&MonitorConfig::default());
        let a = strategy.endpoint_for(3005);
        let b = strategy.endpoint_for(3006);

        assert_eq!(a.host, "127.0.0.1:3005");
        assert_eq!(a.url, "http://127.0.0.1:3005");
        // Two responsive ports must never collapse into one endpoint.
        assert_ne!(a.host, b.host);
    }

    #[tokio::test]
    async fn inverted_range_yields_empty_list() {
        let config = MonitorConfig {
            port_scan_start: 3020,
            port_scan_end: 3001,
            ..Default::default()
        };
        let strategy = PortScanDiscovery::new(&config);
        assert!(strategy.discover().await.is_empty());
    }

    #[tokio::test]
    async fn unreachable_ports_are_skipped() {
        // Reserved TEST-NET-1 address, nothing listens there; probes
        // fail fast or time out and are filtered out.
        let config = MonitorConfig {
            port_scan_host: "192.0.2.1".into(),
            port_scan_start: 3001,
            port_scan_end: 3002,
            port_scan_timeout_ms: 100,
            ..Default::default()
        };
        let strategy = PortScanDiscovery::new(&config);
        assert!(strategy.discover().await.is_empty());
    }
}
