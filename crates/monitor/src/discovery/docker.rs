//! Discovery via the local Docker daemon: any running container
//! carrying the configured label is treated as a device.

use std::collections::HashMap;

use async_trait::async_trait;
use bollard::container::ListContainersOptions;
use bollard::models::ContainerSummary;
use bollard::Docker;

use super::{DiscoveredEndpoint, DiscoveryStrategy};
use crate::config::MonitorConfig;

/// Compose sets this on every container it manages; preferred as the
/// stable network hostname on the compose network.
const COMPOSE_SERVICE_LABEL: &str = "com.docker.compose.service";

pub struct DockerSocketDiscovery {
    socket_path: String,
    label_filter: String,
    http_port: u16,
    http_protocol: String,
}

impl DockerSocketDiscovery {
    pub fn new(config: &MonitorConfig) -> Self {
        Self {
            socket_path: config.docker_socket_path.clone(),
            label_filter: config.discovery_docker_label.clone(),
            http_port: config.device_http_port,
            http_protocol: config.device_http_protocol.clone(),
        }
    }

    fn endpoint_for(&self, container: &ContainerSummary) -> Option<DiscoveredEndpoint> {
        let container_name = container
            .names
            .as_ref()
            .and_then(|names| names.first())
            .map(|n| n.trim_start_matches('/').to_string())
            .filter(|n| !n.is_empty());

        let service = container
            .labels
            .as_ref()
            .and_then(|labels| labels.get(COMPOSE_SERVICE_LABEL))
            .filter(|s| !s.is_empty())
            .cloned();

        // The compose service name is the stable network hostname, but
        // the listing keeps the container's own name.
        let host = service
            .or_else(|| container_name.clone())
            .or_else(|| container.id.clone())?;
        let name = container_name.unwrap_or_else(|| host.clone());
        let id = container.id.clone().unwrap_or_else(|| host.clone());

        Some(DiscoveredEndpoint {
            id,
            name,
            url: format!("{}://{host}:{}", self.http_protocol, self.http_port),
            host,
        })
    }

    async fn list_labeled_containers(&self) -> Result<Vec<ContainerSummary>, bollard::errors::Error> {
        // Connect lazily each cycle so a daemon that comes up later is
        // picked up without restarting the monitor.
        let docker = Docker::connect_with_unix(
            &self.socket_path,
            5,
            bollard::API_DEFAULT_VERSION,
        )?;

        let mut filters = HashMap::new();
        filters.insert("label".to_string(), vec![self.label_filter.clone()]);

        docker
            .list_containers(Some(ListContainersOptions {
                filters,
                ..Default::default()
            }))
            .await
    }
}

#[async_trait]
impl DiscoveryStrategy for DockerSocketDiscovery {
    fn name(&self) -> &'static str {
        "DockerSocketDiscovery"
    }

    async fn discover(&self) -> Vec<DiscoveredEndpoint> {
        let containers = match self.list_labeled_containers().await {
            Ok(containers) => containers,
            Err(e) => {
                tracing::warn!(
                    socket = %self.socket_path,
                    error = %e,
                    "Docker discovery failed, returning no endpoints",
                );
                return Vec::new();
            }
        };

        containers
            .iter()
            .filter_map(|c| self.endpoint_for(c))
            .collect()
    }
}
