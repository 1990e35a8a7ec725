//! Device discovery: pluggable strategies plus the orchestrator that
//! selects, runs, and merges them.

pub mod docker;
pub mod port_scan;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::config::MonitorConfig;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// A reachable device endpoint produced by one discovery cycle.
///
/// Ephemeral: superseded wholesale by the next cycle, never persisted.
/// Identity for deduplication is `url`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredEndpoint {
    /// Strategy-specific identifier (container id, host:port, ...).
    pub id: String,
    pub name: String,
    /// Hostname the client pool dials.
    pub host: String,
    /// Full HTTP base URL; the natural identity of "where to reach
    /// this device".
    pub url: String,
}

/// One mechanism for finding currently reachable devices.
///
/// `discover` must never fail: strategies absorb their internal errors
/// (logging them) and return an empty list instead.
#[async_trait]
pub trait DiscoveryStrategy: Send + Sync {
    /// Strategy name as referenced by `DISCOVERY_STRATEGIES`.
    fn name(&self) -> &'static str;

    /// Produce the endpoints currently reachable via this mechanism.
    async fn discover(&self) -> Vec<DiscoveredEndpoint>;
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

/// Selects active strategies (or a static override list), runs them,
/// and merges the results.
pub struct DiscoveryOrchestrator {
    strategies: Vec<Arc<dyn DiscoveryStrategy>>,
    /// When non-empty, strategies are bypassed and this fixed list is
    /// returned every cycle.
    override_endpoints: Vec<DiscoveredEndpoint>,
}

impl DiscoveryOrchestrator {
    /// Wire the production strategies from configuration.
    pub fn from_config(config: &MonitorConfig) -> Self {
        let override_endpoints = config
            .device_list
            .iter()
            .map(|host| static_endpoint(host, config))
            .collect::<Vec<_>>();

        if !override_endpoints.is_empty() {
            tracing::info!(
                count = override_endpoints.len(),
                "Using static device list, discovery strategies disabled",
            );
            return Self {
                strategies: Vec::new(),
                override_endpoints,
            };
        }

        let available: Vec<Arc<dyn DiscoveryStrategy>> = vec![
            Arc::new(docker::DockerSocketDiscovery::new(config)),
            Arc::new(port_scan::PortScanDiscovery::new(config)),
        ];

        let mut strategies: Vec<Arc<dyn DiscoveryStrategy>> = available
            .iter()
            .filter(|s| config.discovery_strategies.iter().any(|n| n == s.name()))
            .cloned()
            .collect();

        if strategies.is_empty() {
            tracing::warn!(
                configured = ?config.discovery_strategies,
                "No valid discovery strategies enabled, falling back to Docker-socket discovery",
            );
            strategies.push(Arc::clone(&available[0]));
        }

        Self {
            strategies,
            override_endpoints: Vec::new(),
        }
    }

    /// Build an orchestrator from explicit parts (tests, embedding).
    pub fn new(
        strategies: Vec<Arc<dyn DiscoveryStrategy>>,
        override_endpoints: Vec<DiscoveredEndpoint>,
    ) -> Self {
        Self {
            strategies,
            override_endpoints,
        }
    }

    /// Run every enabled strategy and merge the results, deduplicating
    /// by endpoint url (last writer wins).
    ///
    /// Strategies run independently; one returning nothing does not
    /// block the others.
    pub async fn discover_devices(&self) -> Vec<DiscoveredEndpoint> {
        if !self.override_endpoints.is_empty() {
            return self.override_endpoints.clone();
        }

        let mut merged: Vec<DiscoveredEndpoint> = Vec::new();
        for strategy in &self.strategies {
            let endpoints = strategy.discover().await;
            tracing::info!(
                strategy = strategy.name(),
                count = endpoints.len(),
                "Discovery strategy finished",
            );
            merged.extend(endpoints);
        }

        let mut unique_by_url: HashMap<String, DiscoveredEndpoint> = HashMap::new();
        let mut order: Vec<String> = Vec::new();
        for endpoint in merged {
            if !unique_by_url.contains_key(&endpoint.url) {
                order.push(endpoint.url.clone());
            }
            unique_by_url.insert(endpoint.url.clone(), endpoint);
        }

        order
            .into_iter()
            .filter_map(|url| unique_by_url.remove(&url))
            .collect()
    }
}

fn static_endpoint(host: &str, config: &MonitorConfig) -> DiscoveredEndpoint {
    let host = host.trim().to_string();
    let url = format!(
        "{}://{host}:{}",
        config.device_http_protocol, config.device_http_port
    );
    DiscoveredEndpoint {
        id: host.clone(),
        name: host.clone(),
        host,
        url,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedStrategy {
        name: &'static str,
        endpoints: Vec<DiscoveredEndpoint>,
    }

    #[async_trait]
    impl DiscoveryStrategy for FixedStrategy {
        fn name(&self) -> &'static str {
            self.name
        }

        async fn discover(&self) -> Vec<DiscoveredEndpoint> {
            self.endpoints.clone()
        }
    }

    fn endpoint(id: &str, url: &str) -> DiscoveredEndpoint {
        DiscoveredEndpoint {
            id: id.to_string(),
            name: id.to_string(),
            host: id.to_string(),
            url: url.to_string(),
        }
    }

    #[tokio::test]
    async fn merges_and_dedups_by_url_last_writer_wins() {
        let a = Arc::new(FixedStrategy {
            name: "A",
            endpoints: vec![
                endpoint("a-1", "http://dev-1:3000"),
                endpoint("a-2", "http://dev-2:3000"),
            ],
        });
        let b = Arc::new(FixedStrategy {
            name: "B",
            endpoints: vec![endpoint("b-1", "http://dev-1:3000")],
        });

        let orchestrator = DiscoveryOrchestrator::new(vec![a, b], Vec::new());
        let result = orchestrator.discover_devices().await;

        assert_eq!(result.len(), 2);
        let dev1 = result
            .iter()
            .find(|e| e.url == "http://dev-1:3000")
            .unwrap();
        // The later strategy's entry replaced the earlier one.
        assert_eq!(dev1.id, "b-1");
    }

    #[tokio::test]
    async fn empty_strategy_does_not_block_others() {
        let empty = Arc::new(FixedStrategy {
            name: "Empty",
            endpoints: Vec::new(),
        });
        let full = Arc::new(FixedStrategy {
            name: "Full",
            endpoints: vec![endpoint("dev-1", "http://dev-1:3000")],
        });

        let orchestrator = DiscoveryOrchestrator::new(vec![empty, full], Vec::new());
        assert_eq!(orchestrator.discover_devices().await.len(), 1);
    }

    #[tokio::test]
    async fn override_list_bypasses_strategies() {
        let strategy = Arc::new(FixedStrategy {
            name: "A",
            endpoints: vec![endpoint("from-strategy", "http://dev-9:3000")],
        });
        let fixed = vec![endpoint("dev-1", "http://dev-1:3000")];

        let orchestrator = DiscoveryOrchestrator::new(vec![strategy], fixed.clone());
        assert_eq!(orchestrator.discover_devices().await, fixed);
    }

    #[test]
    fn from_config_falls_back_to_docker_on_unknown_names() {
        let config = MonitorConfig {
            discovery_strategies: vec!["NoSuchStrategy".into()],
            ..Default::default()
        };
        let orchestrator = DiscoveryOrchestrator::from_config(&config);
        assert_eq!(orchestrator.strategies.len(), 1);
        assert_eq!(orchestrator.strategies[0].name(), "DockerSocketDiscovery");
    }

    #[test]
    fn from_config_selects_named_strategies() {
        let config = MonitorConfig {
            discovery_strategies: vec!["PortScanDiscovery".into(), "DockerSocketDiscovery".into()],
            ..Default::default()
        };
        let orchestrator = DiscoveryOrchestrator::from_config(&config);
        assert_eq!(orchestrator.strategies.len(), 2);
    }

    #[test]
    fn from_config_prefers_static_device_list() {
        let config = MonitorConfig {
            device_list: vec!["dev-1".into(), "dev-2".into()],
            ..Default::default()
        };
        let orchestrator = DiscoveryOrchestrator::from_config(&config);
        assert!(orchestrator.strategies.is_empty());
        assert_eq!(orchestrator.override_endpoints.len(), 2);
        assert_eq!(orchestrator.override_endpoints[0].url, "http://dev-1:3000");
    }
}
