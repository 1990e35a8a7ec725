//! Monitor configuration loaded from environment variables.

/// Configuration for discovery, polling, and device transports.
///
/// All fields have defaults suitable for local development; override
/// via environment variables.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Enabled discovery strategy names, parsed from comma-separated
    /// `DISCOVERY_STRATEGIES`. Unknown or absent names fall back to
    /// Docker-socket discovery alone.
    pub discovery_strategies: Vec<String>,
    /// Static device host list. When non-empty, discovery strategies
    /// are bypassed entirely (manual / test fleets).
    pub device_list: Vec<String>,
    /// Seconds between discovery cycles (default: `30`).
    pub discovery_interval_secs: u64,
    /// Seconds between polling cycles (default: `10`).
    pub poll_interval_secs: u64,
    /// gRPC port devices listen on (default: `50051`).
    pub device_grpc_port: u16,
    /// HTTP port devices listen on (default: `3000`).
    pub device_http_port: u16,
    /// Scheme for device HTTP URLs (default: `http`).
    pub device_http_protocol: String,
    /// Docker daemon socket path (default: `/var/run/docker.sock`).
    pub docker_socket_path: String,
    /// Container label filter for Docker discovery (default:
    /// `device-monitor.enabled=true`).
    pub discovery_docker_label: String,
    /// Host the port-scan strategy probes (default: `127.0.0.1`).
    pub port_scan_host: String,
    /// First port of the scan range, inclusive (default: `3001`).
    pub port_scan_start: u16,
    /// Last port of the scan range, inclusive (default: `3020`).
    pub port_scan_end: u16,
    /// Per-probe timeout in milliseconds (default: `1000`).
    pub port_scan_timeout_ms: u64,
}

impl MonitorConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                   | Default                      |
    /// |---------------------------|------------------------------|
    /// | `DISCOVERY_STRATEGIES`    | (empty)                      |
    /// | `DISCOVERY_DEVICE_LIST`   | (empty)                      |
    /// | `DISCOVERY_INTERVAL_SECS` | `30`                         |
    /// | `POLL_INTERVAL_SECS`      | `10`                         |
    /// | `DEVICE_GRPC_PORT`        | `50051`                      |
    /// | `DEVICE_HTTP_PORT`        | `3000`                       |
    /// | `DEVICE_HTTP_PROTOCOL`    | `http`                       |
    /// | `DOCKER_SOCKET_PATH`      | `/var/run/docker.sock`       |
    /// | `DISCOVERY_DOCKER_LABEL`  | `device-monitor.enabled=true`|
    /// | `PORT_SCAN_HOST`          | `127.0.0.1`                  |
    /// | `PORT_SCAN_START`         | `3001`                       |
    /// | `PORT_SCAN_END`           | `3020`                       |
    /// | `PORT_SCAN_TIMEOUT_MS`    | `1000`                       |
    pub fn from_env() -> Self {
        Self {
            discovery_strategies: csv_var("DISCOVERY_STRATEGIES"),
            device_list: csv_var("DISCOVERY_DEVICE_LIST"),
            discovery_interval_secs: parsed_var("DISCOVERY_INTERVAL_SECS", 30),
            poll_interval_secs: parsed_var("POLL_INTERVAL_SECS", 10),
            device_grpc_port: parsed_var("DEVICE_GRPC_PORT", 50051),
            device_http_port: parsed_var("DEVICE_HTTP_PORT", 3000),
            device_http_protocol: string_var("DEVICE_HTTP_PROTOCOL", "http"),
            docker_socket_path: string_var("DOCKER_SOCKET_PATH", "/var/run/docker.sock"),
            discovery_docker_label: string_var(
                "DISCOVERY_DOCKER_LABEL",
                "device-monitor.enabled=true",
            ),
            port_scan_host: string_var("PORT_SCAN_HOST", "127.0.0.1"),
            port_scan_start: parsed_var("PORT_SCAN_START", 3001),
            port_scan_end: parsed_var("PORT_SCAN_END", 3020),
            port_scan_timeout_ms: parsed_var("PORT_SCAN_TIMEOUT_MS", 1000),
        }
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            discovery_strategies: Vec::new(),
            device_list: Vec::new(),
            discovery_interval_secs: 30,
            poll_interval_secs: 10,
            device_grpc_port: 50051,
            device_http_port: 3000,
            device_http_protocol: "http".into(),
            docker_socket_path: "/var/run/docker.sock".into(),
            discovery_docker_label: "device-monitor.enabled=true".into(),
            port_scan_host: "127.0.0.1".into(),
            port_scan_start: 3001,
            port_scan_end: 3020,
            port_scan_timeout_ms: 1000,
        }
    }
}

fn string_var(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.into())
}

fn csv_var(name: &str) -> Vec<String> {
    std::env::var(name)
        .unwrap_or_default()
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn parsed_var<T: std::str::FromStr + std::fmt::Display>(name: &str, default: T) -> T {
    match std::env::var(name) {
        Ok(raw) => raw
            .parse()
            .unwrap_or_else(|_| panic!("{name} must be a valid value (got {raw:?})")),
        Err(_) => default,
    }
}
